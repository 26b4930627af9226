//! Section model - the capacity-limited unit members join

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ResourceStatus;

/// A class section. Join-code secrets are never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    /// Human-readable slug, used to make member codes memorable
    pub slug: String,
    pub status: ResourceStatus,
    /// None means unbounded
    pub capacity: Option<u32>,
    /// Active members currently holding a seat
    pub active_count: u32,
    #[serde(skip)]
    pub member_code: Option<String>,
    #[serde(skip)]
    pub member_code_hash: Option<String>,
    #[serde(skip)]
    pub member_code_fingerprint: Option<String>,
    pub member_code_set_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub supervisor_code_hash: Option<String>,
    #[serde(skip)]
    pub supervisor_code_fingerprint: Option<String>,
    pub supervisor_code_set_at: Option<DateTime<Utc>>,
    pub primary_supervisor_id: Option<Uuid>,
    pub assistant_supervisor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Section {
    pub fn new(tenant_id: Uuid, course_id: Uuid, name: String) -> Self {
        let slug = name.to_lowercase().replace(' ', "-");
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            course_id,
            name,
            slug,
            status: ResourceStatus::Active,
            capacity: None,
            active_count: 0,
            member_code: None,
            member_code_hash: None,
            member_code_fingerprint: None,
            member_code_set_at: None,
            supervisor_code_hash: None,
            supervisor_code_fingerprint: None,
            supervisor_code_set_at: None,
            primary_supervisor_id: None,
            assistant_supervisor_id: None,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_slug(mut self, slug: String) -> Self {
        self.slug = slug;
        self
    }

    /// Which supervisor slot (if any) this member holds
    pub fn supervisor_slot_of(&self, member_id: Uuid) -> Option<SupervisorSlot> {
        if self.primary_supervisor_id == Some(member_id) {
            Some(SupervisorSlot::Primary)
        } else if self.assistant_supervisor_id == Some(member_id) {
            Some(SupervisorSlot::Assistant)
        } else {
            None
        }
    }
}

/// Supervisory seats on a section, filled in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorSlot {
    Primary,
    Assistant,
}

impl SupervisorSlot {
    /// Slots in fill order
    pub fn fill_order() -> &'static [SupervisorSlot] {
        &[SupervisorSlot::Primary, SupervisorSlot::Assistant]
    }
}

impl std::fmt::Display for SupervisorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorSlot::Primary => write!(f, "primary"),
            SupervisorSlot::Assistant => write!(f, "assistant"),
        }
    }
}
