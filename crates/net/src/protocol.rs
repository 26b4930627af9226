//! Network protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire.
//! A connection carries any number of request/reply pairs in sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use enrol_core::{Conflict, Enrollment, EnrollmentSnapshot, ErrorKind, SupervisorSlot};

/// Which code class the caller is presenting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRole {
    Member,
    Supervisor,
}

/// Failure class reported to callers (mirrors the core error kinds but decoupled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectKind {
    Authentication,
    Validation,
    Conflict,
    Internal,
}

impl From<ErrorKind> for RejectKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Authentication => RejectKind::Authentication,
            ErrorKind::Validation => RejectKind::Validation,
            ErrorKind::Conflict => RejectKind::Conflict,
            ErrorKind::Internal => RejectKind::Internal,
        }
    }
}

impl std::fmt::Display for RejectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectKind::Authentication => write!(f, "authentication"),
            RejectKind::Validation => write!(f, "validation"),
            RejectKind::Conflict => write!(f, "conflict"),
            RejectKind::Internal => write!(f, "internal"),
        }
    }
}

/// An enrollment as sent to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetEnrollment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub section_id: Uuid,
    pub member_id: Uuid,
    pub snapshot: EnrollmentSnapshot,
    pub assigned_at: DateTime<Utc>,
}

impl From<&Enrollment> for NetEnrollment {
    fn from(enrollment: &Enrollment) -> Self {
        Self {
            id: enrollment.id,
            course_id: enrollment.course_id,
            section_id: enrollment.section_id,
            member_id: enrollment.member_id,
            snapshot: enrollment.snapshot.clone(),
            assigned_at: enrollment.assigned_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrolled {
    pub tenant_id: Uuid,
    pub enrollment: NetEnrollment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorAssigned {
    pub tenant_id: Uuid,
    pub section_id: Uuid,
    pub slot: SupervisorSlot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectKind,
    pub reason: String,
    /// Set for conflicts so callers can branch without parsing `reason`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<Conflict>,
}

impl Rejection {
    /// Build the caller-facing rejection for a core error.
    /// Internal failures carry a generic reason; the detail stays in the log.
    pub fn from_error(error: &enrol_core::Error) -> Self {
        let kind = RejectKind::from(error.kind());
        let reason = match error {
            enrol_core::Error::Conflict(c) => c.message().to_string(),
            enrol_core::Error::Authentication(m)
            | enrol_core::Error::Validation(m)
            | enrol_core::Error::NotFound(m) => m.clone(),
            enrol_core::Error::Cancelled => "request took too long, try again".to_string(),
            _ => "internal error".to_string(),
        };
        Self {
            kind,
            reason,
            conflict: error.conflict(),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

/// Network protocol messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Client presents a join code on behalf of an authenticated profile
    Join {
        profile_id: Uuid,
        code: String,
        role: JoinRole,
    },

    /// Member join succeeded
    Enrolled(Enrolled),

    /// Supervisor join succeeded
    SupervisorAssigned(SupervisorAssigned),

    /// Request refused
    Rejected(Rejection),

    /// Ping to keep connection alive
    Ping,

    /// Pong response to ping
    Pong,
}

impl Message {
    /// Serialize message to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize message from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
