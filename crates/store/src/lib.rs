//! SQLite + Object Storage Backend for tiered image assets
//!
//! This crate owns the two stores that must be kept in agreement: a SQLite
//! record store (which derived sizes should exist, ownership, temporary
//! links) and a pluggable file store (the actual encoded image bytes, on
//! S3/MinIO/local filesystem/memory).
//!
//! # Features
//!
//! - Deterministic file paths derived purely from the record store
//! - SQLite for fast metadata queries
//! - Multiple storage backends: S3, MinIO, local filesystem, in-memory
//! - Cascading deletion with record-before-file ordering
//!
//! # Example
//!
//! ```rust,no_run
//! use store::AssetStore;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), store::StoreError> {
//! // Create a local file-based store
//! let store = AssetStore::new_local(Path::new("/tmp/tierpix")).await?;
//! # Ok(())
//! # }
//! ```

mod asset_store;
mod database;
mod error;
mod storage;

pub use asset_store::AssetStore;
pub use database::{AssetRow, Database, DerivedRow, LinkRow, ProfileRow, RasterFormat, TierRow};
pub use error::{Result, StoreError};
pub use storage::FileStoreConfig;
