use std::sync::Arc;

use api::EmailVisibility;
use store::Backend;

/// Shared by every request. Holds no per-request data.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub email_visibility: EmailVisibility,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, email_visibility: EmailVisibility) -> Self {
        Self {
            backend,
            email_visibility,
        }
    }
}
