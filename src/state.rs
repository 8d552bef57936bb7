use std::sync::Arc;

use crate::identity::IdentityProvider;
use crate::services::ProvisioningService;
use crate::store::RecordStore;

/// Shared handles injected into routes and middleware. Both collaborators
/// sit behind trait objects so tests can swap in in-memory doubles.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub provisioning: ProvisioningService,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        let provisioning = ProvisioningService::new(store.clone());
        Self {
            store,
            identity,
            provisioning,
        }
    }
}
