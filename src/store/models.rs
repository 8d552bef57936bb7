use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MEMBER: &str = "member";

pub const PLAN_FREE: &str = "free";
pub const STATUS_FREE: &str = "free";

/// Default number of active devis a free organization may hold.
pub const DEFAULT_QUOTA: i32 = 5;

/// One customer account (tenant). The slug is generated server-side and is
/// globally unique; it is never derived from the user-supplied name.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub quota: i32,
    pub subscription_status: String,
    pub created_at: DateTime<Utc>,
}

/// Membership binding one identity to exactly one organization. The profile
/// id IS the identity id; the primary key is what makes a second insert for
/// the same identity fail instead of silently duplicating.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileWithOrganization {
    pub profile: Profile,
    pub organization: Organization,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub quota: i32,
    pub subscription_status: String,
}

impl NewOrganization {
    /// Free-tier organization with server defaults.
    pub fn free(name: String, slug: String) -> Self {
        Self {
            name,
            slug,
            plan: PLAN_FREE.to_string(),
            quota: DEFAULT_QUOTA,
            subscription_status: STATUS_FREE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization_id: Uuid,
    pub role: String,
}
