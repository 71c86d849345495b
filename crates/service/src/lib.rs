//! Shared service infrastructure for the tierpix API server.
//!
//! This crate provides the components the gateway binary is assembled from:
//! - Config (storage paths, listen address, sweep interval)
//! - State management (asset store + reconciler + link manager)
//! - HTTP handlers (asset upload/retrieval, temporary links, tier
//!   administration, health checks)

pub mod config;
pub mod http;
pub mod state;

// Re-export key types for convenience
pub use config::Config;
pub use state::{State as ServiceState, StateSetupError};
