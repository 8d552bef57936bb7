use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::identity::Identity;
use crate::store::{NewOrganization, NewProfile, ProfileWithOrganization, RecordStore, StoreError};
use crate::store::models::ROLE_OWNER;

const SLUG_PREFIX: &str = "org";

/// Where in the protocol a failure occurred. Surfaced to callers so the
/// request gate can distinguish a failed lookup (fail closed, back to login)
/// from a failed creation (setup-error state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStage {
    LookupProfile,
    CreateOrganization,
    CreateProfile,
    FetchJoined,
}

#[derive(Debug, Error)]
#[error("provisioning failed at {stage:?}: {cause}")]
pub struct ProvisioningError {
    pub stage: ProvisioningStage,
    #[source]
    pub cause: StoreError,
}

impl ProvisioningError {
    fn at(stage: ProvisioningStage) -> impl FnOnce(StoreError) -> Self {
        move |cause| Self { stage, cause }
    }
}

/// Organization auto-provisioning protocol.
///
/// Guarantees that every authenticated identity ends up with exactly one
/// (organization, profile) pair. Policy: a NEW organization per first-time
/// identity; an existing organization is never reused. All race coordination
/// is pushed down to the profile primary-key constraint in the store; there
/// is no client-side transaction around the two inserts.
#[derive(Clone)]
pub struct ProvisioningService {
    store: Arc<dyn RecordStore>,
}

impl ProvisioningService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Idempotent: the first call creates the pair, every later call for the
    /// same identity is read-only and returns an equivalent profile.
    pub async fn ensure_provisioned(
        &self,
        identity: &Identity,
    ) -> Result<ProfileWithOrganization, ProvisioningError> {
        // Fast path: already provisioned, no writes.
        if let Some(existing) = self
            .store
            .profile_with_organization(identity.id)
            .await
            .map_err(ProvisioningError::at(ProvisioningStage::LookupProfile))?
        {
            return Ok(existing);
        }

        let organization = self
            .store
            .insert_organization(NewOrganization::free(
                organization_name(identity),
                generate_slug(),
            ))
            .await
            .map_err(ProvisioningError::at(ProvisioningStage::CreateOrganization))?;

        let profile = NewProfile {
            id: identity.id,
            first_name: identity.metadata.first_name().map(str::to_owned),
            last_name: identity.metadata.last_name().map(str::to_owned),
            organization_id: organization.id,
            role: ROLE_OWNER.to_string(),
        };

        match self.store.insert_profile(profile).await {
            Ok(_) => {}
            // Lost a first-request race: a concurrent call already created
            // the profile. Reconcile by removing the organization we just
            // created and returning the winner's row below.
            Err(StoreError::UniqueViolation(constraint)) => {
                tracing::info!(
                    identity = %identity.id,
                    constraint = %constraint,
                    "concurrent provisioning detected, reconciling"
                );
                if let Err(e) = self.store.delete_organization(organization.id).await {
                    tracing::warn!(
                        organization = %organization.id,
                        error = %e,
                        "failed to remove organization orphaned by lost provisioning race"
                    );
                }
            }
            Err(e) => {
                return Err(ProvisioningError {
                    stage: ProvisioningStage::CreateProfile,
                    cause: e,
                })
            }
        }

        // Return the fully joined view, whichever call created it.
        self.store
            .profile_with_organization(identity.id)
            .await
            .map_err(ProvisioningError::at(ProvisioningStage::FetchJoined))?
            .ok_or_else(|| ProvisioningError {
                stage: ProvisioningStage::FetchJoined,
                cause: StoreError::NotFound(format!(
                    "profile {} missing after provisioning",
                    identity.id
                )),
            })
    }
}

/// Display name for a first-time identity's organization: the company name
/// from signup metadata, else synthesized from the email local-part.
fn organization_name(identity: &Identity) -> String {
    if let Some(company) = identity.metadata.company_name() {
        return company.to_string();
    }
    let local_part = identity.email.split('@').next().unwrap_or(&identity.email);
    format!("Organization of {}", local_part)
}

/// Globally-unique URL-safe slug: fixed prefix, high-resolution timestamp,
/// random suffix. Never derived from the display name.
fn generate_slug() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", SLUG_PREFIX, nanos, &random[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{DEFAULT_QUOTA, PLAN_FREE};
    use crate::testing::{identity_with_company, identity_without_metadata, MemoryStore};
    use std::sync::atomic::Ordering;

    fn service(store: &Arc<MemoryStore>) -> ProvisioningService {
        ProvisioningService::new(store.clone())
    }

    #[tokio::test]
    async fn first_call_creates_organization_and_profile() {
        let store = Arc::new(MemoryStore::new());
        let identity = identity_with_company("claire@syndic.fr", "Syndic Lyon Centre");

        let provisioned = service(&store).ensure_provisioned(&identity).await.unwrap();

        assert_eq!(provisioned.profile.id, identity.id);
        assert_eq!(provisioned.profile.role, ROLE_OWNER);
        assert_eq!(provisioned.organization.name, "Syndic Lyon Centre");
        assert_eq!(provisioned.organization.plan, PLAN_FREE);
        assert_eq!(provisioned.organization.quota, DEFAULT_QUOTA);
        assert_eq!(store.organization_count(), 1);
        assert_eq!(store.profile_count(), 1);
    }

    #[tokio::test]
    async fn repeated_calls_are_idempotent_and_read_only() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let identity = identity_without_metadata("gardien@residence.fr");

        let first = svc.ensure_provisioned(&identity).await.unwrap();
        let inserts_after_first = store.profile_inserts.load(Ordering::SeqCst)
            + store.organization_inserts.load(Ordering::SeqCst);

        for _ in 0..3 {
            let again = svc.ensure_provisioned(&identity).await.unwrap();
            assert_eq!(again.profile.id, first.profile.id);
            assert_eq!(again.organization.id, first.organization.id);
        }

        let inserts_after_all = store.profile_inserts.load(Ordering::SeqCst)
            + store.organization_inserts.load(Ordering::SeqCst);
        assert_eq!(inserts_after_first, inserts_after_all, "fast path must not write");
        assert_eq!(store.organization_count(), 1);
        assert_eq!(store.profile_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_requests_converge_on_one_pair() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let identity = identity_with_company("syndic@copro.fr", "Copro Bellecour");

        // MemoryStore yields at every operation, so both calls observe
        // "no profile" before either insert lands.
        let (a, b) = tokio::join!(
            svc.ensure_provisioned(&identity),
            svc.ensure_provisioned(&identity)
        );

        let a = a.expect("losing the race must not surface an error");
        let b = b.expect("losing the race must not surface an error");

        assert_eq!(a.profile.id, b.profile.id);
        assert_eq!(a.organization.id, b.organization.id);
        assert_eq!(store.profile_count(), 1);
        assert_eq!(store.organization_count(), 1, "orphaned organization must be reconciled");
    }

    #[tokio::test]
    async fn profile_insert_failure_is_reported_with_stage() {
        let store = Arc::new(MemoryStore::new());
        store.fail_profile_inserts();
        let identity = identity_without_metadata("owner@copro.fr");

        let err = service(&store)
            .ensure_provisioned(&identity)
            .await
            .unwrap_err();

        assert_eq!(err.stage, ProvisioningStage::CreateProfile);
    }

    #[tokio::test]
    async fn organization_insert_failure_is_reported_with_stage() {
        let store = Arc::new(MemoryStore::new());
        store.fail_organization_inserts();
        let identity = identity_without_metadata("owner@copro.fr");

        let err = service(&store)
            .ensure_provisioned(&identity)
            .await
            .unwrap_err();

        assert_eq!(err.stage, ProvisioningStage::CreateOrganization);
    }

    #[test]
    fn organization_name_prefers_company_metadata() {
        let identity = identity_with_company("claire@syndic.fr", "Syndic Lyon Centre");
        assert_eq!(organization_name(&identity), "Syndic Lyon Centre");

        let identity = identity_without_metadata("claire@syndic.fr");
        assert_eq!(organization_name(&identity), "Organization of claire");
    }

    #[test]
    fn slugs_are_prefixed_and_unique() {
        let a = generate_slug();
        let b = generate_slug();
        assert!(a.starts_with("org-"));
        assert!(b.starts_with("org-"));
        assert_ne!(a, b);
    }
}
