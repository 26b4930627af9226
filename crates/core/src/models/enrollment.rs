//! Enrollment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MemberIdentity, Section};

/// Enrollment lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Inactive,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Inactive => "inactive",
            EnrollmentStatus::Completed => "completed",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "active" => EnrollmentStatus::Active,
            "completed" => EnrollmentStatus::Completed,
            _ => EnrollmentStatus::Inactive,
        }
    }
}

/// How an active enrollment ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseOutcome {
    /// Member left or was unassigned
    Withdrawn,
    /// Member finished the section
    Completed,
}

impl CloseOutcome {
    pub fn status(&self) -> EnrollmentStatus {
        match self {
            CloseOutcome::Withdrawn => EnrollmentStatus::Inactive,
            CloseOutcome::Completed => EnrollmentStatus::Completed,
        }
    }
}

/// Display fields frozen into the enrollment at join time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentSnapshot {
    pub member_name: Option<String>,
    pub member_avatar_url: Option<String>,
    #[serde(default)]
    pub member_contact_links: Vec<String>,
    pub guardian_name: Option<String>,
    pub guardian_contact: Option<String>,
    pub student_code: Option<String>,
    pub section_name: String,
}

/// A member's seat in a section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub course_id: Uuid,
    pub section_id: Uuid,
    pub member_id: Uuid,
    pub status: EnrollmentStatus,
    pub snapshot: EnrollmentSnapshot,
    pub assigned_at: DateTime<Utc>,
    pub unassigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    /// New active enrollment with the member and section fields frozen as of now
    pub fn new(section: &Section, member: &MemberIdentity) -> Self {
        let profile = &member.snapshot;
        Self {
            id: Uuid::new_v4(),
            tenant_id: section.tenant_id,
            course_id: section.course_id,
            section_id: section.id,
            member_id: member.id,
            status: EnrollmentStatus::Active,
            snapshot: EnrollmentSnapshot {
                member_name: profile.display_name.clone(),
                member_avatar_url: profile.avatar_url.clone(),
                member_contact_links: profile.contact_links.clone(),
                guardian_name: profile.guardian_name.clone(),
                guardian_contact: profile.guardian_contact.clone(),
                student_code: profile.student_code.clone(),
                section_name: section.name.clone(),
            },
            assigned_at: Utc::now(),
            unassigned_at: None,
            completed_at: None,
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active && self.deleted_at.is_none()
    }
}
