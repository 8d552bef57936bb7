//! In-memory collaborator doubles for unit tests. The memory store mirrors
//! the uniqueness semantics of the Postgres schema (profile id is the
//! primary key) and yields at every operation so concurrent callers
//! interleave the way independent request handlers do.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::identity::{
    Identity, IdentityError, IdentityMetadata, IdentityProvider, Session,
};
use crate::state::AppState;
use crate::store::{
    NewOrganization, NewProfile, Organization, Profile, ProfileWithOrganization, RecordStore,
    StoreError,
};

#[derive(Default)]
pub struct MemoryStore {
    organizations: Mutex<HashMap<Uuid, Organization>>,
    profiles: Mutex<HashMap<Uuid, Profile>>,
    pub organization_inserts: AtomicUsize,
    pub profile_inserts: AtomicUsize,
    fail_profile_inserts: AtomicBool,
    fail_organization_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn organization_count(&self) -> usize {
        self.organizations.lock().unwrap().len()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.lock().unwrap().len()
    }

    /// Make every profile insert fail with a generic query error.
    pub fn fail_profile_inserts(&self) {
        self.fail_profile_inserts.store(true, Ordering::SeqCst);
    }

    /// Make every organization insert fail with a generic query error.
    pub fn fail_organization_inserts(&self) {
        self.fail_organization_inserts.store(true, Ordering::SeqCst);
    }

    /// Seed an already-provisioned identity.
    pub async fn provision(&self, identity: &Identity) {
        let organization = self
            .insert_organization(NewOrganization::free(
                format!("Organization of {}", identity.email),
                format!("org-seed-{}", Uuid::new_v4().simple()),
            ))
            .await
            .unwrap();
        self.insert_profile(NewProfile {
            id: identity.id,
            first_name: identity.metadata.first_name().map(str::to_owned),
            last_name: identity.metadata.last_name().map(str::to_owned),
            organization_id: organization.id,
            role: crate::store::ROLE_OWNER.to_string(),
        })
        .await
        .unwrap();
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn profile_with_organization(
        &self,
        identity_id: Uuid,
    ) -> Result<Option<ProfileWithOrganization>, StoreError> {
        tokio::task::yield_now().await;
        let profiles = self.profiles.lock().unwrap();
        let organizations = self.organizations.lock().unwrap();
        Ok(profiles.get(&identity_id).map(|profile| {
            let organization = organizations
                .get(&profile.organization_id)
                .expect("profile references a missing organization")
                .clone();
            ProfileWithOrganization {
                profile: profile.clone(),
                organization,
            }
        }))
    }

    async fn insert_organization(
        &self,
        organization: NewOrganization,
    ) -> Result<Organization, StoreError> {
        tokio::task::yield_now().await;
        if self.fail_organization_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::QueryError("organization insert refused".into()));
        }
        let row = Organization {
            id: Uuid::new_v4(),
            name: organization.name,
            slug: organization.slug,
            plan: organization.plan,
            quota: organization.quota,
            subscription_status: organization.subscription_status,
            created_at: Utc::now(),
        };
        self.organizations
            .lock()
            .unwrap()
            .insert(row.id, row.clone());
        self.organization_inserts.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    async fn delete_organization(&self, id: Uuid) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.organizations.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn insert_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        tokio::task::yield_now().await;
        if self.fail_profile_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::QueryError("profile insert refused".into()));
        }
        let mut profiles = self.profiles.lock().unwrap();
        if profiles.contains_key(&profile.id) {
            return Err(StoreError::UniqueViolation("profiles_pkey".into()));
        }
        let row = Profile {
            id: profile.id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            organization_id: profile.organization_id,
            role: profile.role,
            created_at: Utc::now(),
        };
        profiles.insert(row.id, row.clone());
        self.profile_inserts.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

enum StubBehavior {
    Unauthenticated,
    Authenticated(Identity),
    Failing,
}

pub struct StubIdentityProvider {
    behavior: StubBehavior,
    pub resolution_calls: AtomicUsize,
}

impl StubIdentityProvider {
    pub fn unauthenticated() -> Self {
        Self {
            behavior: StubBehavior::Unauthenticated,
            resolution_calls: AtomicUsize::new(0),
        }
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            behavior: StubBehavior::Authenticated(identity),
            resolution_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            behavior: StubBehavior::Failing,
            resolution_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    async fn current_identity(
        &self,
        _headers: &HeaderMap,
    ) -> Result<Option<Identity>, IdentityError> {
        self.resolution_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            StubBehavior::Unauthenticated => Ok(None),
            StubBehavior::Authenticated(identity) => Ok(Some(identity.clone())),
            StubBehavior::Failing => Err(IdentityError::Store(StoreError::QueryError(
                "identity provider unavailable".into(),
            ))),
        }
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        _metadata: IdentityMetadata,
    ) -> Result<Identity, IdentityError> {
        match &self.behavior {
            StubBehavior::Authenticated(identity) => Ok(identity.clone()),
            _ => Err(IdentityError::InvalidCredentials),
        }
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session, IdentityError> {
        Err(IdentityError::InvalidCredentials)
    }
}

pub fn identity_with_company(email: &str, company: &str) -> Identity {
    let mut metadata = IdentityMetadata::default();
    metadata.set_company_name(company);
    Identity {
        id: Uuid::new_v4(),
        email: email.to_string(),
        metadata,
    }
}

pub fn identity_without_metadata(email: &str) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: email.to_string(),
        metadata: IdentityMetadata::default(),
    }
}

pub fn test_state(store: Arc<MemoryStore>, provider: Arc<StubIdentityProvider>) -> AppState {
    AppState::new(store, provider)
}

pub fn unauthenticated_state() -> AppState {
    test_state(
        Arc::new(MemoryStore::new()),
        Arc::new(StubIdentityProvider::unauthenticated()),
    )
}
