//! Tenant and course (parent aggregate) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state shared by sections and courses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// Accepting joins
    Active,
    /// Temporarily closed
    Inactive,
    /// Terminal; also used for any status string this core does not know
    Archived,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Active => "active",
            ResourceStatus::Inactive => "inactive",
            ResourceStatus::Archived => "archived",
        }
    }

    /// Parse a stored status. Unknown values are never treated as active.
    pub fn from_db(s: &str) -> Self {
        match s {
            "active" => ResourceStatus::Active,
            "inactive" => ResourceStatus::Inactive,
            _ => ResourceStatus::Archived,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ResourceStatus::Active)
    }
}

/// An owning organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: String, slug: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            slug,
            created_at: Utc::now(),
        }
    }
}

/// A course: the parent aggregate whose quota every section join consumes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub status: ResourceStatus,
    /// None means unbounded
    pub capacity_total: Option<u32>,
    pub capacity_taken: u32,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Course {
    pub fn new(tenant_id: Uuid, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name,
            status: ResourceStatus::Active,
            capacity_total: None,
            capacity_taken: 0,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity_total = Some(capacity);
        self
    }
}
