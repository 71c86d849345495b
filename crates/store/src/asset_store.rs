//! AssetStore - record store and file store behind one type.
//!
//! Every mutation touches both stores. There is no cross-store transaction,
//! so the ordering discipline is fixed. Asset creation commits the record
//! first (the unique name constraint doubles as the concurrency gate) and
//! rolls the record back if the file write then fails. Derived writes land
//! the file before the record, and deletes remove the record before the
//! file: a failed file delete leaves an orphaned file, which is logged and
//! left for an out-of-band sweep, never a record pointing at missing bytes.

use std::collections::BTreeSet;
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::database::{AssetRow, Database, RasterFormat};
use crate::error::{Result, StoreError};
use crate::storage::{FileStoreConfig, Storage};

/// Combined record + file store for original and derived image assets.
#[derive(Debug, Clone)]
pub struct AssetStore {
    db: Database,
    storage: Storage,
}

impl AssetStore {
    /// Create a new AssetStore with a file-based SQLite database.
    pub async fn new(db_path: &Path, config: FileStoreConfig) -> Result<Self> {
        let db = Database::new(db_path).await?;
        let storage = Storage::new(config).await?;
        Ok(Self { db, storage })
    }

    /// Create a new AssetStore backed by local filesystem.
    pub async fn new_local(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join("tierpix.db");
        let files_path = data_dir.join("files");
        let config = FileStoreConfig::Local { path: files_path };
        Self::new(&db_path, config).await
    }

    /// Create a fully ephemeral AssetStore (in-memory DB + in-memory files).
    pub async fn new_ephemeral() -> Result<Self> {
        let db = Database::in_memory().await?;
        let storage = Storage::new(FileStoreConfig::Memory).await?;
        Ok(Self { db, storage })
    }

    /// The underlying record store.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Filename a derived file is stored under: original stem + `.jpg`,
    /// since derived output is always JPEG.
    pub fn derived_filename(original_filename: &str) -> String {
        let stem = Path::new(original_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(original_filename);
        format!("{}.jpg", stem)
    }

    /// A value that is safe to embed in a storage path as one segment.
    /// Anything with a separator could alias a different owner's or
    /// asset's prefix.
    fn path_segment(value: &str) -> Result<&str> {
        let reserved = value == "." || value == "..";
        if value.is_empty() || reserved || value.contains(['/', '\\']) {
            return Err(StoreError::InvalidPathSegment(value.to_string()));
        }
        Ok(value)
    }

    /// Reduce an upload filename to its final component, dropping any
    /// directory part a client sent along.
    fn basename(filename: &str) -> &str {
        let trimmed = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
        if trimmed.is_empty() {
            "upload"
        } else {
            trimmed
        }
    }

    /// Store a new original asset: sniff the format, commit the record,
    /// then write the file. The record's `UNIQUE(owner, name)` constraint
    /// is the conflict gate, so a losing concurrent create never touches
    /// the file store at all.
    pub async fn create_asset(
        &self,
        owner: &str,
        name: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<AssetRow> {
        let owner = Self::path_segment(owner)?;
        let name = Self::path_segment(name)?;
        let filename = Self::basename(filename);
        let format = RasterFormat::sniff(&bytes).ok_or(StoreError::UnsupportedFormat)?;

        let id = self.db.insert_asset(owner, name, filename, format).await?;

        let path = Storage::original_path(owner, name, filename);
        let size = bytes.len();
        match self.storage.put(&path, Bytes::from(bytes)).await {
            Ok(()) => {
                info!(owner = %owner, asset = %name, size = size, "original stored");
                // insert_asset stamps created_at, so read the row back
                let row = self
                    .db
                    .get_asset_by_id(id)
                    .await?
                    .ok_or_else(|| StoreError::AssetNotFound(format!("{}/{}", owner, name)))?;
                Ok(row)
            }
            Err(e) => {
                // The reservation must not outlive its missing bytes
                if let Err(del) = self.db.delete_asset(id).await {
                    warn!(owner = %owner, asset = %name, error = %del, "dangling record after failed file write");
                }
                Err(e)
            }
        }
    }

    /// Read an asset's original bytes.
    pub async fn get_original(&self, asset: &AssetRow) -> Result<Option<Bytes>> {
        let path = Storage::original_path(&asset.owner, &asset.name, &asset.original_filename);
        self.storage.get(&path).await
    }

    /// Store one derived file and its record. File first, record second: a
    /// record must never point at bytes that were not persisted.
    pub async fn put_derived(&self, asset: &AssetRow, height: u32, bytes: Vec<u8>) -> Result<()> {
        let filename = Self::derived_filename(&asset.original_filename);
        let path = Storage::derived_path(&asset.owner, &asset.name, height, &filename);

        self.storage.put(&path, Bytes::from(bytes)).await?;
        self.db.insert_derived(asset.id, height, &filename).await?;

        debug!(owner = %asset.owner, asset = %asset.name, height = height, "derived stored");
        Ok(())
    }

    /// Store a set of derived files, committing their records in one
    /// transaction. Files land first; if the record commit then fails,
    /// nothing was recorded and the files are plain orphans, never a
    /// record without bytes.
    pub async fn put_derived_batch(
        &self,
        asset: &AssetRow,
        entries: Vec<(u32, Vec<u8>)>,
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let filename = Self::derived_filename(&asset.original_filename);
        let mut rows = Vec::with_capacity(entries.len());
        for (height, bytes) in entries {
            let path = Storage::derived_path(&asset.owner, &asset.name, height, &filename);
            self.storage.put(&path, Bytes::from(bytes)).await?;
            rows.push((height, filename.clone()));
        }

        self.db.insert_derived_batch(asset.id, &rows).await?;

        debug!(
            owner = %asset.owner,
            asset = %asset.name,
            heights = rows.len(),
            "derived batch stored"
        );
        Ok(())
    }

    /// Read one derived file's bytes. Returns None when no record exists.
    /// A record whose backing file is missing is record/file drift; it is
    /// logged and reported as absent so the reconciler can repair it.
    pub async fn get_derived(&self, asset: &AssetRow, height: u32) -> Result<Option<Bytes>> {
        let Some(record) = self.db.get_derived(asset.id, height).await? else {
            return Ok(None);
        };

        let path = Storage::derived_path(&asset.owner, &asset.name, height, &record.filename);
        let bytes = self.storage.get(&path).await?;
        if bytes.is_none() {
            warn!(
                owner = %asset.owner,
                asset = %asset.name,
                height = height,
                "derived record has no backing file"
            );
        }
        Ok(bytes)
    }

    /// The set of heights for which derived records exist.
    pub async fn derived_heights(&self, asset_id: i64) -> Result<BTreeSet<u32>> {
        let rows = self.db.list_derived(asset_id).await?;
        Ok(rows.into_iter().map(|r| r.height).collect())
    }

    /// Delete one derived record and its backing file. Record first.
    ///
    /// The height prefix itself needs no cleanup: object stores have no
    /// real directories, and the local backend's leftover empty directory
    /// is invisible to listings.
    pub async fn delete_derived(&self, asset: &AssetRow, height: u32) -> Result<bool> {
        let Some(record) = self.db.get_derived(asset.id, height).await? else {
            return Ok(false);
        };

        self.db.delete_derived(asset.id, height).await?;

        let path = Storage::derived_path(&asset.owner, &asset.name, height, &record.filename);
        if let Err(e) = self.storage.delete(&path).await {
            warn!(path = %path, error = %e, "orphaned file after derived record delete");
        }

        debug!(owner = %asset.owner, asset = %asset.name, height = height, "derived removed");
        Ok(true)
    }

    /// Delete an asset: record cascade first (derived rows and temporary
    /// links go with it), then every file under the asset's prefix.
    pub async fn delete_asset(&self, asset: &AssetRow) -> Result<bool> {
        if !self.db.delete_asset(asset.id).await? {
            return Ok(false);
        }

        let prefix = Storage::asset_prefix(&asset.owner, &asset.name);
        match self.storage.delete_prefix(&prefix).await {
            Ok(removed) => {
                info!(owner = %asset.owner, asset = %asset.name, files = removed, "asset deleted");
            }
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "orphaned files after asset record delete");
            }
        }
        Ok(true)
    }

    /// List every file path currently stored for an asset. Used by tests
    /// and drift inspection.
    pub async fn list_asset_files(&self, asset: &AssetRow) -> Result<Vec<String>> {
        let prefix = Storage::asset_prefix(&asset.owner, &asset.name);
        let paths = self.storage.list_prefix(&prefix).await?;
        Ok(paths.into_iter().map(|p| p.to_string()).collect())
    }
}
