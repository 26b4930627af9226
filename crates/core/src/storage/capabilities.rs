//! Schema capability probing
//!
//! Older databases may lack some optional snapshot columns on `enrollments`.
//! Capabilities are probed once at startup and handed to the components
//! that write or read those columns.

use std::collections::HashSet;

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// Which optional enrollment snapshot columns exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaCapabilities {
    pub enrollment_avatar: bool,
    pub enrollment_contact_links: bool,
    /// Both `guardian_name` and `guardian_contact`
    pub enrollment_guardian: bool,
    pub enrollment_student_code: bool,
}

impl SchemaCapabilities {
    /// Every optional column present (current schema)
    pub fn full() -> Self {
        Self {
            enrollment_avatar: true,
            enrollment_contact_links: true,
            enrollment_guardian: true,
            enrollment_student_code: true,
        }
    }

    /// Inspect the live `enrollments` table
    #[instrument(skip(conn))]
    pub fn probe(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare("PRAGMA table_info(enrollments)")?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;

        let caps = Self {
            enrollment_avatar: columns.contains("member_avatar_url"),
            enrollment_contact_links: columns.contains("member_contact_links"),
            enrollment_guardian: columns.contains("guardian_name")
                && columns.contains("guardian_contact"),
            enrollment_student_code: columns.contains("student_code"),
        };

        if caps != Self::full() {
            info!(?caps, "Enrollment table lacks optional snapshot columns");
        }

        Ok(caps)
    }
}

impl Default for SchemaCapabilities {
    fn default() -> Self {
        Self::full()
    }
}
