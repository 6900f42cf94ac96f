//! Shared handler state

use crate::auth::ApiToken;
use spaceapi_core::{KeepaliveWatchdog, KeyRegistry, StoreHandle};
use std::sync::Arc;

/// Everything a request handler needs, cheap to clone per request
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: StoreHandle,
    pub registry: Arc<KeyRegistry>,
    pub watchdog: Arc<KeepaliveWatchdog>,
    pub token: Arc<ApiToken>,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: StoreHandle,
        registry: KeyRegistry,
        watchdog: Arc<KeepaliveWatchdog>,
        token: ApiToken,
    ) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
            watchdog,
            token: Arc::new(token),
        }
    }
}
