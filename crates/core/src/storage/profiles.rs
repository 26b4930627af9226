//! Global profile storage
//!
//! The profile service owns these rows. The join core only reads them
//! through [`ProfileProvider`](super::ProfileProvider).

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{encode_links, parse_datetime, parse_links, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{Profile, ProfileSnapshot};

pub struct ProfileStore<'a> {
    conn: &'a Connection,
}

impl<'a> ProfileStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or replace a profile
    #[instrument(skip(self, profile), fields(profile_id = %profile.id))]
    pub fn upsert(&self, profile: &Profile) -> Result<()> {
        let s = &profile.snapshot;
        self.conn.execute(
            "INSERT INTO profiles (id, display_name, avatar_url, contact_links, guardian_name, guardian_contact, student_code, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                avatar_url = excluded.avatar_url,
                contact_links = excluded.contact_links,
                guardian_name = excluded.guardian_name,
                guardian_contact = excluded.guardian_contact,
                student_code = excluded.student_code,
                updated_at = excluded.updated_at",
            params![
                profile.id.to_string(),
                s.display_name,
                s.avatar_url,
                encode_links(&s.contact_links),
                s.guardian_name,
                s.guardian_contact,
                s.student_code,
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find profile by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, display_name, avatar_url, contact_links, guardian_name, guardian_contact, student_code, updated_at
                 FROM profiles WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(Profile {
                        id: parse_uuid(&row.get::<_, String>(0)?)?,
                        snapshot: ProfileSnapshot {
                            display_name: row.get(1)?,
                            avatar_url: row.get(2)?,
                            contact_links: parse_links(row.get(3)?)?,
                            guardian_name: row.get(4)?,
                            guardian_contact: row.get(5)?,
                            student_code: row.get(6)?,
                        },
                        updated_at: parse_datetime(&row.get::<_, String>(7)?)?,
                    })
                },
            )
            .optional()?;

        Ok(profile)
    }
}
