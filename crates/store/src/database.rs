//! SQLite record store for tiers, profiles, assets, derived assets and
//! temporary links.

use std::path::Path;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
    Row,
};

use crate::error::{Result, StoreError};

/// The raster formats an original asset may be stored in.
///
/// Derived assets are always JPEG regardless of the original format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RasterFormat {
    Png,
    #[default]
    Jpeg,
}

impl RasterFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Jpeg => "jpeg",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "png" => RasterFormat::Png,
            _ => RasterFormat::Jpeg,
        }
    }

    /// Identify an upload by its magic bytes. Anything that is not PNG or
    /// JPEG is rejected.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(RasterFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(RasterFormat::Jpeg)
        } else {
            None
        }
    }

    /// Content type to serve the stored bytes with.
    pub fn content_type(&self) -> &'static str {
        match self {
            RasterFormat::Png => "image/png",
            RasterFormat::Jpeg => "image/jpeg",
        }
    }
}

/// A tier row joined with its required heights.
#[derive(Debug, Clone)]
pub struct TierRow {
    pub name: String,
    pub required_heights: Vec<u32>,
    pub allow_original: bool,
    pub allow_temporary_links: bool,
}

/// An owner profile row.
#[derive(Debug, Clone)]
pub struct ProfileRow {
    pub owner: String,
    pub tier: String,
}

/// An asset row.
#[derive(Debug, Clone)]
pub struct AssetRow {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub original_filename: String,
    pub original_format: RasterFormat,
    pub created_at: i64,
}

/// A derived-asset row.
#[derive(Debug, Clone)]
pub struct DerivedRow {
    pub asset_id: i64,
    pub height: u32,
    pub filename: String,
}

/// A temporary link row.
#[derive(Debug, Clone)]
pub struct LinkRow {
    pub slug: String,
    pub asset_id: i64,
    pub created_at: i64,
    pub duration_secs: i64,
}

impl LinkRow {
    /// A link is expired once `created_at + duration` has been reached.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.created_at + self.duration_secs
    }
}

/// SQLite database connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection from a file path.
    pub async fn new(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Create an in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- tiers --

    /// Insert or replace a tier and its required height set.
    pub async fn upsert_tier(
        &self,
        name: &str,
        required_heights: &[u32],
        allow_original: bool,
        allow_temporary_links: bool,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tiers (name, allow_original, allow_temporary_links)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                allow_original = excluded.allow_original,
                allow_temporary_links = excluded.allow_temporary_links
            "#,
        )
        .bind(name)
        .bind(allow_original)
        .bind(allow_temporary_links)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM tier_heights WHERE tier = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        for height in required_heights {
            sqlx::query("INSERT INTO tier_heights (tier, height) VALUES (?, ?)")
                .bind(name)
                .bind(*height as i64)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get a tier and its required heights by name.
    pub async fn get_tier(&self, name: &str) -> Result<Option<TierRow>> {
        let row = sqlx::query(
            r#"
            SELECT name, allow_original, allow_temporary_links
            FROM tiers WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let heights = sqlx::query(
            r#"
            SELECT height FROM tier_heights WHERE tier = ? ORDER BY height
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(TierRow {
            name: row.get("name"),
            required_heights: heights
                .iter()
                .map(|r| r.get::<i64, _>("height") as u32)
                .collect(),
            allow_original: row.get::<i32, _>("allow_original") != 0,
            allow_temporary_links: row.get::<i32, _>("allow_temporary_links") != 0,
        }))
    }

    /// List all tier names.
    pub async fn list_tiers(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM tiers ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("name")).collect())
    }

    // -- profiles --

    /// Insert or replace an owner profile.
    pub async fn upsert_profile(&self, owner: &str, tier: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (owner, tier) VALUES (?, ?)
            ON CONFLICT(owner) DO UPDATE SET tier = excluded.tier
            "#,
        )
        .bind(owner)
        .bind(tier)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get an owner profile.
    pub async fn get_profile(&self, owner: &str) -> Result<Option<ProfileRow>> {
        let row = sqlx::query("SELECT owner, tier FROM profiles WHERE owner = ?")
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| ProfileRow {
            owner: r.get("owner"),
            tier: r.get("tier"),
        }))
    }

    /// Commit a tier reassignment for an owner.
    ///
    /// This only updates the record; reconciliation fan-out happens after
    /// this returns successfully.
    pub async fn set_profile_tier(&self, owner: &str, tier: &str) -> Result<()> {
        let result = sqlx::query("UPDATE profiles SET tier = ? WHERE owner = ?")
            .bind(tier)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ProfileNotFound(owner.to_string()));
        }
        Ok(())
    }

    // -- assets --

    /// Insert a new asset record, returning its id.
    ///
    /// The `UNIQUE(owner, name)` constraint is the conflict gate: of two
    /// concurrent inserts for the same name, exactly one gets the row and
    /// the other gets `AssetExists`.
    pub async fn insert_asset(
        &self,
        owner: &str,
        name: &str,
        original_filename: &str,
        original_format: RasterFormat,
    ) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO assets (owner, name, original_filename, original_format, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(owner)
        .bind(name)
        .bind(original_filename)
        .bind(original_format.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                StoreError::AssetExists(format!("{}/{}", owner, name))
            }
            _ => StoreError::Database(e),
        })?;
        Ok(result.last_insert_rowid())
    }

    /// Get an asset by owner and name.
    pub async fn get_asset(&self, owner: &str, name: &str) -> Result<Option<AssetRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, name, original_filename, original_format, created_at
            FROM assets WHERE owner = ? AND name = ?
            "#,
        )
        .bind(owner)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::asset_from_row))
    }

    /// Get an asset by id.
    pub async fn get_asset_by_id(&self, id: i64) -> Result<Option<AssetRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, name, original_filename, original_format, created_at
            FROM assets WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::asset_from_row))
    }

    /// List all assets belonging to an owner.
    pub async fn list_assets(&self, owner: &str) -> Result<Vec<AssetRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, name, original_filename, original_format, created_at
            FROM assets WHERE owner = ? ORDER BY created_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::asset_from_row).collect())
    }

    /// Delete an asset record. Derived rows and temporary links cascade.
    pub async fn delete_asset(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    fn asset_from_row(r: sqlx::sqlite::SqliteRow) -> AssetRow {
        AssetRow {
            id: r.get("id"),
            owner: r.get("owner"),
            name: r.get("name"),
            original_filename: r.get("original_filename"),
            original_format: RasterFormat::parse(r.get("original_format")),
            created_at: r.get("created_at"),
        }
    }

    // -- derived assets --

    /// Insert a derived-asset record.
    pub async fn insert_derived(&self, asset_id: i64, height: u32, filename: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO derived (asset_id, height, filename) VALUES (?, ?, ?)
            ON CONFLICT(asset_id, height) DO UPDATE SET filename = excluded.filename
            "#,
        )
        .bind(asset_id)
        .bind(height as i64)
        .bind(filename)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a batch of derived-asset records in one transaction.
    ///
    /// All records commit or none do; a reconcile pass must never leave a
    /// partial record commit behind.
    pub async fn insert_derived_batch(
        &self,
        asset_id: i64,
        rows: &[(u32, String)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (height, filename) in rows {
            sqlx::query(
                r#"
                INSERT INTO derived (asset_id, height, filename) VALUES (?, ?, ?)
                ON CONFLICT(asset_id, height) DO UPDATE SET filename = excluded.filename
                "#,
            )
            .bind(asset_id)
            .bind(*height as i64)
            .bind(filename)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get one derived-asset record.
    pub async fn get_derived(&self, asset_id: i64, height: u32) -> Result<Option<DerivedRow>> {
        let row = sqlx::query(
            r#"
            SELECT asset_id, height, filename FROM derived
            WHERE asset_id = ? AND height = ?
            "#,
        )
        .bind(asset_id)
        .bind(height as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| DerivedRow {
            asset_id: r.get("asset_id"),
            height: r.get::<i64, _>("height") as u32,
            filename: r.get("filename"),
        }))
    }

    /// List the derived-asset records for an asset.
    pub async fn list_derived(&self, asset_id: i64) -> Result<Vec<DerivedRow>> {
        let rows = sqlx::query(
            r#"
            SELECT asset_id, height, filename FROM derived
            WHERE asset_id = ? ORDER BY height
            "#,
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| DerivedRow {
                asset_id: r.get("asset_id"),
                height: r.get::<i64, _>("height") as u32,
                filename: r.get("filename"),
            })
            .collect())
    }

    /// Delete a derived-asset record.
    pub async fn delete_derived(&self, asset_id: i64, height: u32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM derived WHERE asset_id = ? AND height = ?")
            .bind(asset_id)
            .bind(height as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -- temporary links --

    /// Insert a temporary link record.
    pub async fn insert_link(
        &self,
        slug: &str,
        asset_id: i64,
        created_at: i64,
        duration_secs: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO temporary_links (slug, asset_id, created_at, duration_secs)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(slug)
        .bind(asset_id)
        .bind(created_at)
        .bind(duration_secs)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a temporary link by slug.
    pub async fn get_link(&self, slug: &str) -> Result<Option<LinkRow>> {
        let row = sqlx::query(
            r#"
            SELECT slug, asset_id, created_at, duration_secs
            FROM temporary_links WHERE slug = ?
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| LinkRow {
            slug: r.get("slug"),
            asset_id: r.get("asset_id"),
            created_at: r.get("created_at"),
            duration_secs: r.get("duration_secs"),
        }))
    }

    /// List the temporary links for all assets of an owner.
    pub async fn list_links(&self, owner: &str) -> Result<Vec<LinkRow>> {
        let rows = sqlx::query(
            r#"
            SELECT l.slug, l.asset_id, l.created_at, l.duration_secs
            FROM temporary_links l
            JOIN assets a ON a.id = l.asset_id
            WHERE a.owner = ?
            ORDER BY l.created_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| LinkRow {
                slug: r.get("slug"),
                asset_id: r.get("asset_id"),
                created_at: r.get("created_at"),
                duration_secs: r.get("duration_secs"),
            })
            .collect())
    }

    /// Delete a temporary link by slug.
    pub async fn delete_link(&self, slug: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM temporary_links WHERE slug = ?")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every link whose expiry has been reached, returning the count.
    pub async fn delete_expired_links(&self, now: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM temporary_links WHERE created_at + duration_secs <= ?
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn db_with_profile() -> Database {
        let db = Database::in_memory().await.unwrap();
        db.upsert_tier("basic", &[200], false, false).await.unwrap();
        db.upsert_profile("alice", "basic").await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_tier_roundtrip() {
        let db = Database::in_memory().await.unwrap();

        db.upsert_tier("premium", &[200, 400], true, true)
            .await
            .unwrap();

        let tier = db.get_tier("premium").await.unwrap().unwrap();
        assert_eq!(tier.required_heights, vec![200, 400]);
        assert!(tier.allow_original);
        assert!(tier.allow_temporary_links);

        // Upsert replaces the height set
        db.upsert_tier("premium", &[400], true, false).await.unwrap();
        let tier = db.get_tier("premium").await.unwrap().unwrap();
        assert_eq!(tier.required_heights, vec![400]);
        assert!(!tier.allow_temporary_links);

        assert_eq!(db.list_tiers().await.unwrap(), vec!["premium"]);
        assert!(db.get_tier("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_tier_reassignment() {
        let db = db_with_profile().await;
        db.upsert_tier("premium", &[200, 400], true, true)
            .await
            .unwrap();

        db.set_profile_tier("alice", "premium").await.unwrap();
        let profile = db.get_profile("alice").await.unwrap().unwrap();
        assert_eq!(profile.tier, "premium");

        let err = db.set_profile_tier("nobody", "premium").await.unwrap_err();
        assert!(matches!(err, StoreError::ProfileNotFound(_)));
    }

    #[tokio::test]
    async fn test_asset_name_unique_per_owner() {
        let db = db_with_profile().await;

        db.insert_asset("alice", "photo", "photo.png", RasterFormat::Png)
            .await
            .unwrap();

        let err = db
            .insert_asset("alice", "photo", "other.jpg", RasterFormat::Jpeg)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AssetExists(_)));
    }

    #[tokio::test]
    async fn test_derived_batch_commits_all_or_nothing() {
        let db = db_with_profile().await;
        let id = db
            .insert_asset("alice", "photo", "photo.png", RasterFormat::Png)
            .await
            .unwrap();

        // Height 0 violates the schema CHECK; the whole batch must roll
        // back, including the valid first row.
        let rows = vec![(200, "photo.jpg".to_string()), (0, "photo.jpg".to_string())];
        db.insert_derived_batch(id, &rows).await.unwrap_err();
        assert!(db.list_derived(id).await.unwrap().is_empty());

        let rows = vec![(200, "photo.jpg".to_string()), (400, "photo.jpg".to_string())];
        db.insert_derived_batch(id, &rows).await.unwrap();
        let heights: Vec<u32> = db
            .list_derived(id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.height)
            .collect();
        assert_eq!(heights, vec![200, 400]);
    }

    #[tokio::test]
    async fn test_asset_delete_cascades_records() {
        let db = db_with_profile().await;

        let id = db
            .insert_asset("alice", "photo", "photo.png", RasterFormat::Png)
            .await
            .unwrap();
        db.insert_derived(id, 200, "photo.jpg").await.unwrap();
        db.insert_link("slug1", id, 0, 300).await.unwrap();

        assert!(db.delete_asset(id).await.unwrap());
        assert!(db.list_derived(id).await.unwrap().is_empty());
        assert!(db.get_link("slug1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_link_sweep() {
        let db = db_with_profile().await;
        let id = db
            .insert_asset("alice", "photo", "photo.png", RasterFormat::Png)
            .await
            .unwrap();

        db.insert_link("live", id, 1000, 300).await.unwrap();
        db.insert_link("dead", id, 0, 300).await.unwrap();

        let removed = db.delete_expired_links(1000).await.unwrap();
        assert_eq!(removed, 1);
        assert!(db.get_link("live").await.unwrap().is_some());
        assert!(db.get_link("dead").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_link_expiry_boundary() {
        let row = LinkRow {
            slug: "s".into(),
            asset_id: 1,
            created_at: 0,
            duration_secs: 300,
        };
        assert!(!row.is_expired_at(299));
        assert!(row.is_expired_at(300));
        assert!(row.is_expired_at(301));
    }
}
