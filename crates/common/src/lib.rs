/**
 * Temporary link lifecycle: issuance, lazy
 *  expiry-on-read, revocation, and the sweep
 *  for links nobody reads again.
 */
pub mod links;
/**
 * The reconciler: keeps an asset's derived set
 *  equal to its owner's tier, with per-asset
 *  serialization and self-healing consistency
 *  checks.
 */
pub mod reconcile;
/**
 * Tier registry types: named height sets plus
 *  capability flags.
 */
pub mod tier;
/**
 * Pure raster transform: decode, scale down to
 *  a target height, flatten to RGB, encode JPEG.
 */
pub mod transform;

pub mod prelude {
    pub use crate::links::{LinkError, LinkManager, MAX_DURATION_SECS, MIN_DURATION_SECS};
    pub use crate::reconcile::{ReconcileError, ReconcileOutcome, Reconciler};
    pub use crate::tier::{Tier, TierError};
    pub use crate::transform::{transform, TransformError};
    pub use store::{AssetRow, AssetStore, RasterFormat, StoreError};
}
