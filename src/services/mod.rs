pub mod provisioning;

pub use provisioning::{ProvisioningError, ProvisioningService, ProvisioningStage};
