pub mod models;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use models::{
    NewOrganization, NewProfile, Organization, Profile, ProfileWithOrganization, PLAN_FREE,
    ROLE_OWNER, STATUS_FREE,
};
pub use postgres::PgRecordStore;

/// Errors from the record store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

// Classify driver errors so callers can distinguish uniqueness conflicts.
// Postgres reports unique-constraint violations as SQLSTATE 23505.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err
                    .constraint()
                    .unwrap_or("unknown constraint")
                    .to_string();
                return StoreError::UniqueViolation(constraint);
            }
        }
        StoreError::Sqlx(err)
    }
}

/// Capability interface over the relational store. Single-row inserts return
/// the inserted row; inserts hitting a uniqueness constraint surface
/// `StoreError::UniqueViolation` rather than an opaque driver error.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a profile joined with its organization by identity id.
    async fn profile_with_organization(
        &self,
        identity_id: Uuid,
    ) -> Result<Option<ProfileWithOrganization>, StoreError>;

    async fn insert_organization(
        &self,
        organization: NewOrganization,
    ) -> Result<Organization, StoreError>;

    /// Remove an organization. Only used to reconcile a lost provisioning
    /// race, never exposed through the HTTP surface.
    async fn delete_organization(&self, id: Uuid) -> Result<(), StoreError>;

    async fn insert_profile(&self, profile: NewProfile) -> Result<Profile, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
