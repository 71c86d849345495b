//! Temporary link manager.
//!
//! A temporary link is a time-bounded access grant to one asset. Expiry is
//! checked lazily on every resolution (an expired link is deleted as a
//! side effect of the read that finds it), and a `sweep` operation exists
//! for links that are created and never queried again, which the lazy
//! check alone would leak.

use rand::RngCore;
use tracing::{debug, info};

use store::{AssetRow, AssetStore, LinkRow, StoreError};

use crate::tier::TierError;

/// Inclusive lower bound on a link's lifetime, in seconds.
pub const MIN_DURATION_SECS: i64 = 300;
/// Inclusive upper bound on a link's lifetime, in seconds.
pub const MAX_DURATION_SECS: i64 = 30_000;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("tier error: {0}")]
    Tier(#[from] TierError),
    /// The asset owner's tier does not permit temporary links.
    #[error("tier of owner {0} does not permit temporary links")]
    Capability(String),
    /// Requested lifetime outside `[300, 30000]` seconds.
    #[error("duration {0}s out of bounds [{MIN_DURATION_SECS}, {MAX_DURATION_SECS}]")]
    Duration(i64),
    #[error("link not found: {0}")]
    NotFound(String),
    /// The link existed but its expiry had been reached. It has been
    /// deleted as a side effect of this resolution attempt.
    #[error("link expired: {0}")]
    Expired(String),
}

/// Issues, resolves, revokes and garbage-collects temporary links.
#[derive(Clone)]
pub struct LinkManager {
    store: AssetStore,
}

impl LinkManager {
    pub fn new(store: AssetStore) -> Self {
        Self { store }
    }

    fn new_slug() -> String {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Issue a link for an asset, valid for `duration_secs` from now.
    pub async fn issue(&self, asset: &AssetRow, duration_secs: i64) -> Result<LinkRow, LinkError> {
        self.issue_at(asset, duration_secs, chrono::Utc::now().timestamp())
            .await
    }

    /// Issue with an explicit creation timestamp. Capability and duration
    /// checks happen before anything is written.
    pub async fn issue_at(
        &self,
        asset: &AssetRow,
        duration_secs: i64,
        now: i64,
    ) -> Result<LinkRow, LinkError> {
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&duration_secs) {
            return Err(LinkError::Duration(duration_secs));
        }

        let db = self.store.database();
        let profile = db
            .get_profile(&asset.owner)
            .await?
            .ok_or_else(|| StoreError::ProfileNotFound(asset.owner.clone()))?;
        let tier = db
            .get_tier(&profile.tier)
            .await?
            .ok_or_else(|| StoreError::TierNotFound(profile.tier.clone()))?;
        if !tier.allow_temporary_links {
            return Err(LinkError::Capability(asset.owner.clone()));
        }

        let slug = Self::new_slug();
        db.insert_link(&slug, asset.id, now, duration_secs).await?;

        info!(owner = %asset.owner, asset = %asset.name, slug = %slug, duration = duration_secs, "link issued");
        Ok(LinkRow {
            slug,
            asset_id: asset.id,
            created_at: now,
            duration_secs,
        })
    }

    /// Resolve a slug to its asset.
    pub async fn resolve(&self, slug: &str) -> Result<AssetRow, LinkError> {
        self.resolve_at(slug, chrono::Utc::now().timestamp()).await
    }

    /// Resolve with an explicit clock. An expired link is deleted here,
    /// folding garbage collection into the read path.
    pub async fn resolve_at(&self, slug: &str, now: i64) -> Result<AssetRow, LinkError> {
        let db = self.store.database();
        let link = db
            .get_link(slug)
            .await?
            .ok_or_else(|| LinkError::NotFound(slug.to_string()))?;

        if link.is_expired_at(now) {
            db.delete_link(slug).await?;
            debug!(slug = %slug, "expired link removed on read");
            return Err(LinkError::Expired(slug.to_string()));
        }

        db.get_asset_by_id(link.asset_id)
            .await?
            .ok_or_else(|| LinkError::NotFound(slug.to_string()))
    }

    /// Explicitly revoke a link.
    pub async fn revoke(&self, slug: &str) -> Result<bool, LinkError> {
        Ok(self.store.database().delete_link(slug).await?)
    }

    /// Delete every expired link, returning how many were removed. Run
    /// periodically for links nobody ever reads.
    pub async fn sweep(&self) -> Result<u64, LinkError> {
        self.sweep_at(chrono::Utc::now().timestamp()).await
    }

    pub async fn sweep_at(&self, now: i64) -> Result<u64, LinkError> {
        let removed = self.store.database().delete_expired_links(now).await?;
        if removed > 0 {
            debug!(removed = removed, "swept expired links");
        }
        Ok(removed)
    }

    /// List an owner's links, sweeping expired ones first so the listing
    /// never shows a grant that can no longer resolve.
    pub async fn list(&self, owner: &str) -> Result<Vec<LinkRow>, LinkError> {
        self.sweep().await?;
        Ok(self.store.database().list_links(owner).await?)
    }
}
