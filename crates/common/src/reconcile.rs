//! Derived-asset reconciler.
//!
//! Makes an asset's derived set match its owner's tier: diff the required
//! heights against the existing records as sets, generate what is missing,
//! remove what is stale. Invoked on asset creation and on tier
//! reassignment (the latter fans out over every asset the owner holds).
//!
//! Reconciliation for a single asset is serialized behind a per-asset
//! async lock; distinct assets reconcile in parallel.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use store::{AssetRow, AssetStore, StoreError};

use crate::tier::{Tier, TierError};
use crate::transform::transform;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("tier error: {0}")]
    Tier(#[from] TierError),
    #[error("transform task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("original bytes missing for asset {0}")]
    OriginalMissing(String),
    #[error("consistency repair failed for asset {0}")]
    RepairFailed(String),
}

/// One height that could not be generated. The failure is isolated: the
/// remaining heights in the same pass still proceed.
#[derive(Debug, Clone)]
pub struct HeightFailure {
    pub height: u32,
    pub error: String,
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub added: BTreeSet<u32>,
    pub removed: BTreeSet<u32>,
    pub failed: Vec<HeightFailure>,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.failed.is_empty()
    }

    fn merge(&mut self, other: ReconcileOutcome) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
        self.failed.extend(other.failed);
    }

    fn failed_heights(&self) -> BTreeSet<u32> {
        self.failed.iter().map(|f| f.height).collect()
    }
}

/// Result of a tier-change fan-out for one asset.
#[derive(Debug)]
pub struct OwnerReconcileEntry {
    pub asset: String,
    pub result: Result<ReconcileOutcome, ReconcileError>,
}

/// Serializes reconciliation per asset and applies the diff through the
/// asset store.
#[derive(Clone)]
pub struct Reconciler {
    store: AssetStore,
    locks: Arc<parking_lot::Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>,
}

impl Reconciler {
    pub fn new(store: AssetStore) -> Self {
        Self {
            store,
            locks: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Load the tier currently governing an owner's assets.
    pub async fn tier_for_owner(&self, owner: &str) -> Result<Tier, ReconcileError> {
        let db = self.store.database();
        let profile = db
            .get_profile(owner)
            .await?
            .ok_or_else(|| StoreError::ProfileNotFound(owner.to_string()))?;
        let row = db
            .get_tier(&profile.tier)
            .await?
            .ok_or_else(|| StoreError::TierNotFound(profile.tier.clone()))?;
        Ok(Tier::try_from(row)?)
    }

    fn lock_for(&self, asset_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(asset_id).or_default().clone()
    }

    /// Reconcile one asset against a tier.
    ///
    /// Holds the asset's exclusive lock for the whole diff-and-apply
    /// sequence, then re-verifies the result as a set comparison. A
    /// mismatch is a consistency-repair event: logged, healed by one more
    /// diff pass, and only escalated if the repair pass leaves the stores
    /// still disagreeing.
    pub async fn reconcile(
        &self,
        asset: &AssetRow,
        tier: &Tier,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let lock = self.lock_for(asset.id);
        let result = {
            let _guard = lock.lock().await;
            self.reconcile_locked(asset, tier).await
        };
        drop(lock);
        self.evict_lock(asset.id);
        result
    }

    /// Drop the asset's lock-map entry once nobody else holds a clone,
    /// so the map does not accumulate entries for deleted assets.
    fn evict_lock(&self, asset_id: i64) {
        let mut locks = self.locks.lock();
        if let Some(entry) = locks.get(&asset_id) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(&asset_id);
            }
        }
    }

    async fn reconcile_locked(
        &self,
        asset: &AssetRow,
        tier: &Tier,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut outcome = self.apply_diff(asset, tier).await?;

        let existing = self.store.derived_heights(asset.id).await?;
        let expected: BTreeSet<u32> = tier
            .required_heights
            .difference(&outcome.failed_heights())
            .copied()
            .collect();

        if existing != expected {
            warn!(
                owner = %asset.owner,
                asset = %asset.name,
                existing = ?existing,
                expected = ?expected,
                "record/file state diverged after apply, repairing"
            );
            let repair = self.apply_diff(asset, tier).await?;
            outcome.merge(repair);

            let existing = self.store.derived_heights(asset.id).await?;
            let expected: BTreeSet<u32> = tier
                .required_heights
                .difference(&outcome.failed_heights())
                .copied()
                .collect();
            if existing != expected {
                return Err(ReconcileError::RepairFailed(format!(
                    "{}/{}",
                    asset.owner, asset.name
                )));
            }
        }

        if !outcome.is_noop() {
            info!(
                owner = %asset.owner,
                asset = %asset.name,
                added = ?outcome.added,
                removed = ?outcome.removed,
                failures = outcome.failed.len(),
                "reconciled"
            );
        }
        Ok(outcome)
    }

    /// Compute and apply one diff. Strictly set arithmetic; never ordered
    /// comparison.
    async fn apply_diff(
        &self,
        asset: &AssetRow,
        tier: &Tier,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let existing = self.store.derived_heights(asset.id).await?;
        let required = &tier.required_heights;

        let to_add: BTreeSet<u32> = required.difference(&existing).copied().collect();
        let to_remove: BTreeSet<u32> = existing.difference(required).copied().collect();

        let mut outcome = ReconcileOutcome::default();
        if to_add.is_empty() && to_remove.is_empty() {
            return Ok(outcome);
        }

        debug!(
            owner = %asset.owner,
            asset = %asset.name,
            to_add = ?to_add,
            to_remove = ?to_remove,
            "applying reconcile diff"
        );

        if !to_add.is_empty() {
            let original = self
                .store
                .get_original(asset)
                .await?
                .ok_or_else(|| {
                    ReconcileError::OriginalMissing(format!("{}/{}", asset.owner, asset.name))
                })?;

            let mut generated: Vec<(u32, Vec<u8>)> = Vec::new();
            for height in to_add {
                let source = original.clone();
                let result =
                    tokio::task::spawn_blocking(move || transform(&source, height)).await?;
                match result {
                    Ok(bytes) => generated.push((height, bytes)),
                    Err(e) => {
                        warn!(
                            owner = %asset.owner,
                            asset = %asset.name,
                            height = height,
                            error = %e,
                            "derived generation failed, skipping height"
                        );
                        outcome.failed.push(HeightFailure {
                            height,
                            error: e.to_string(),
                        });
                    }
                }
            }

            // One transaction for the pass's records: a record-store
            // failure here is fatal to the attempt and commits nothing,
            // leaving at worst orphaned files.
            for (height, _) in &generated {
                outcome.added.insert(*height);
            }
            self.store.put_derived_batch(asset, generated).await?;
        }

        for height in to_remove {
            self.store.delete_derived(asset, height).await?;
            outcome.removed.insert(height);
        }

        Ok(outcome)
    }

    /// Tier-change fan-out: reconcile every asset the owner holds against
    /// the owner's (already committed) tier. Each asset is reconciled
    /// independently; one asset failing does not roll back or block its
    /// siblings.
    pub async fn reconcile_owner(
        &self,
        owner: &str,
    ) -> Result<Vec<OwnerReconcileEntry>, ReconcileError> {
        let tier = self.tier_for_owner(owner).await?;
        let assets = self.store.database().list_assets(owner).await?;

        let tasks = assets.into_iter().map(|asset| {
            let reconciler = self.clone();
            let tier = tier.clone();
            async move {
                let result = reconciler.reconcile(&asset, &tier).await;
                OwnerReconcileEntry {
                    asset: asset.name,
                    result,
                }
            }
        });

        Ok(futures::future::join_all(tasks).await)
    }
}
