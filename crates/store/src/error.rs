//! Error types for the asset store.

/// Errors that can occur when working with the asset store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Object storage error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tier not found
    #[error("tier not found: {0}")]
    TierNotFound(String),

    /// Owner profile not found
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// Asset not found
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// Asset name already taken for this owner
    #[error("asset already exists: {0}")]
    AssetExists(String),

    /// Owner id or asset name that is not a single path segment. Storage
    /// paths are built from these values, so a `/` would alias another
    /// owner's prefix.
    #[error("not a valid path segment: {0:?}")]
    InvalidPathSegment(String),

    /// Upload is not one of the accepted raster formats
    #[error("unsupported image format")]
    UnsupportedFormat,

    /// S3 bucket not found - must be created before use
    #[error("S3 bucket '{0}' does not exist. Create it before starting the service.")]
    BucketNotFound(String),
}

/// Result type alias for asset store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
