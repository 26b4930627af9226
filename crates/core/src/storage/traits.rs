//! Storage-facing collaborator traits
//!
//! These traits define the boundary to services this core does not own,
//! allowing for different implementations (SQLite, fixed test data, a
//! remote profile service).

use uuid::Uuid;

use crate::error::Result;
use crate::models::ProfileSnapshot;

/// Read-only source of the display fields frozen into enrollments
pub trait ProfileProvider {
    /// Current snapshot for a global profile, or None if the profile does not exist
    fn snapshot(&self, profile_id: Uuid) -> Result<Option<ProfileSnapshot>>;
}

