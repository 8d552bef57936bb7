use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use super::{
    NewOrganization, NewProfile, Organization, Profile, ProfileWithOrganization, RecordStore,
    StoreError,
};
use crate::config;

/// Postgres-backed record store. Row-level scoping by organization is
/// enforced by the queries themselves; this module never returns rows
/// across organizations.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

/// Flat row shape for the profile/organization join.
#[derive(sqlx::FromRow)]
struct ProfileOrganizationRow {
    id: Uuid,
    first_name: Option<String>,
    last_name: Option<String>,
    organization_id: Uuid,
    role: String,
    created_at: DateTime<Utc>,
    org_name: String,
    org_slug: String,
    org_plan: String,
    org_quota: i32,
    org_subscription_status: String,
    org_created_at: DateTime<Utc>,
}

impl From<ProfileOrganizationRow> for ProfileWithOrganization {
    fn from(row: ProfileOrganizationRow) -> Self {
        ProfileWithOrganization {
            profile: Profile {
                id: row.id,
                first_name: row.first_name,
                last_name: row.last_name,
                organization_id: row.organization_id,
                role: row.role,
                created_at: row.created_at,
            },
            organization: Organization {
                id: row.organization_id,
                name: row.org_name,
                slug: row.org_slug,
                plan: row.org_plan,
                quota: row.org_quota,
                subscription_status: row.org_subscription_status,
                created_at: row.org_created_at,
            },
        }
    }
}

impl PgRecordStore {
    /// Build a store against DATABASE_URL. Connections are established
    /// lazily so the server can start (and report degraded health) while
    /// the database is unreachable.
    pub fn connect_lazy() -> Result<Self, StoreError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::ConfigMissing("DATABASE_URL"))?;
        let db = &config::config().database;

        let pool = PgPoolOptions::new()
            .max_connections(db.max_connections)
            .acquire_timeout(Duration::from_secs(db.connection_timeout))
            .connect_lazy(&url)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn profile_with_organization(
        &self,
        identity_id: Uuid,
    ) -> Result<Option<ProfileWithOrganization>, StoreError> {
        let row = sqlx::query_as::<_, ProfileOrganizationRow>(
            r#"
            SELECT p.id, p.first_name, p.last_name, p.organization_id, p.role, p.created_at,
                   o.name AS org_name,
                   o.slug AS org_slug,
                   o.plan AS org_plan,
                   o.quota AS org_quota,
                   o.subscription_status AS org_subscription_status,
                   o.created_at AS org_created_at
            FROM profiles p
            JOIN organizations o ON o.id = p.organization_id
            WHERE p.id = $1
            "#,
        )
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ProfileWithOrganization::from))
    }

    async fn insert_organization(
        &self,
        organization: NewOrganization,
    ) -> Result<Organization, StoreError> {
        let row = sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (id, name, slug, plan, quota, subscription_status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, slug, plan, quota, subscription_status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&organization.name)
        .bind(&organization.slug)
        .bind(&organization.plan)
        .bind(organization.quota)
        .bind(&organization.subscription_status)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete_organization(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        let row = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, first_name, last_name, organization_id, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, first_name, last_name, organization_id, role, created_at
            "#,
        )
        .bind(profile.id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(profile.organization_id)
        .bind(&profile.role)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
