//! Global profiles and tenant-scoped member identities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Denormalized display fields copied from a global profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub contact_links: Vec<String>,
    pub guardian_name: Option<String>,
    pub guardian_contact: Option<String>,
    pub student_code: Option<String>,
}

impl ProfileSnapshot {
    pub fn named(display_name: &str) -> Self {
        Self {
            display_name: Some(display_name.to_string()),
            ..Self::default()
        }
    }

    /// Overlay the non-empty fields of `hint` onto this snapshot.
    /// Existing values are never replaced by empty ones.
    pub fn top_up(&mut self, hint: &ProfileSnapshot) {
        fn merge(target: &mut Option<String>, source: &Option<String>) {
            if let Some(value) = non_empty(source) {
                *target = Some(value.to_string());
            }
        }

        merge(&mut self.display_name, &hint.display_name);
        merge(&mut self.avatar_url, &hint.avatar_url);
        if !hint.contact_links.is_empty() {
            self.contact_links = hint.contact_links.clone();
        }
        merge(&mut self.guardian_name, &hint.guardian_name);
        merge(&mut self.guardian_contact, &hint.guardian_contact);
        merge(&mut self.student_code, &hint.student_code);
    }
}

/// Treat `Some("")` and whitespace-only values like `None`
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// A global (cross-tenant) profile, owned by the profile service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub snapshot: ProfileSnapshot,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(snapshot: ProfileSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            snapshot,
            updated_at: Utc::now(),
        }
    }
}

/// A tenant-scoped identity, one per (tenant, profile) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberIdentity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub profile_id: Uuid,
    pub snapshot: ProfileSnapshot,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemberIdentity {
    pub fn new(tenant_id: Uuid, profile_id: Uuid, snapshot: ProfileSnapshot) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            profile_id,
            snapshot,
            created_at: now,
            updated_at: now,
        }
    }
}
