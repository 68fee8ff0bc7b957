use std::sync::Arc;

use ephemera_store::EphemeralStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EphemeralStore>,
    pub public_base_url: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<EphemeralStore>, public_base_url: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into(),
        }
    }
}
