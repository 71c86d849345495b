use common::prelude::*;

use super::config::Config;

/// Main service state - orchestrates all components
#[derive(Clone)]
pub struct State {
    store: AssetStore,
    reconciler: Reconciler,
    links: LinkManager,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        // 1. Setup the combined record + file store
        let store = match config.data_dir {
            Some(ref path) => {
                tracing::info!(path = %path.display(), "opening asset store");
                AssetStore::new_local(path)
                    .await
                    .map_err(StateSetupError::Store)?
            }
            // otherwise run fully in memory
            None => {
                tracing::info!("no data directory configured, running ephemeral");
                AssetStore::new_ephemeral()
                    .await
                    .map_err(StateSetupError::Store)?
            }
        };

        // 2. Domain components share the store
        let reconciler = Reconciler::new(store.clone());
        let links = LinkManager::new(store.clone());

        Ok(Self {
            store,
            reconciler,
            links,
        })
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn links(&self) -> &LinkManager {
        &self.links
    }
}

impl AsRef<AssetStore> for State {
    fn as_ref(&self) -> &AssetStore {
        &self.store
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("asset store setup error: {0}")]
    Store(StoreError),
}
