use std::sync::Arc;

use jobboard_core::{ResourceKind, ResourceService, ResourceStore};

use crate::config::AppConfig;

/// Shared application state, passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    store: Arc<dyn ResourceStore>,
    config: AppConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn ResourceStore>, config: AppConfig) -> Self {
        Self {
            inner: Arc::new(InnerState { store, config }),
        }
    }

    pub fn store(&self) -> &dyn ResourceStore {
        self.inner.store.as_ref()
    }

    /// The service for one resource over the shared store.
    pub fn service(&self, kind: ResourceKind) -> ResourceService {
        ResourceService::new(
            kind,
            Arc::clone(&self.inner.store),
            self.inner.config.default_page_size,
        )
    }
}
