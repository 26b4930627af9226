//! Section storage operations
//!
//! Metadata writes here are administrative helpers; the join core relies on
//! the code lookups, code updates and supervisor slot claims.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    parse_capacity, parse_datetime, parse_datetime_opt, parse_uuid, parse_uuid_opt, OptionalExt,
};
use crate::error::Result;
use crate::models::{ResourceStatus, Section, SupervisorSlot};

const SECTION_COLUMNS: &str = "id, tenant_id, course_id, name, slug, status, capacity, active_count,
     member_code, member_code_hash, member_code_fingerprint, member_code_set_at,
     supervisor_code_hash, supervisor_code_fingerprint, supervisor_code_set_at,
     primary_supervisor_id, assistant_supervisor_id, created_at, deleted_at";

fn section_from_row(row: &Row<'_>) -> rusqlite::Result<Section> {
    Ok(Section {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        tenant_id: parse_uuid(&row.get::<_, String>(1)?)?,
        course_id: parse_uuid(&row.get::<_, String>(2)?)?,
        name: row.get(3)?,
        slug: row.get(4)?,
        status: ResourceStatus::from_db(&row.get::<_, String>(5)?),
        capacity: parse_capacity(row.get(6)?),
        active_count: row.get(7)?,
        member_code: row.get(8)?,
        member_code_hash: row.get(9)?,
        member_code_fingerprint: row.get(10)?,
        member_code_set_at: parse_datetime_opt(row.get::<_, Option<String>>(11)?)?,
        supervisor_code_hash: row.get(12)?,
        supervisor_code_fingerprint: row.get(13)?,
        supervisor_code_set_at: parse_datetime_opt(row.get::<_, Option<String>>(14)?)?,
        primary_supervisor_id: parse_uuid_opt(row.get::<_, Option<String>>(15)?)?,
        assistant_supervisor_id: parse_uuid_opt(row.get::<_, Option<String>>(16)?)?,
        created_at: parse_datetime(&row.get::<_, String>(17)?)?,
        deleted_at: parse_datetime_opt(row.get::<_, Option<String>>(18)?)?,
    })
}

/// A section whose stored hash may match a submitted code
#[derive(Debug, Clone)]
pub struct HashCandidate {
    pub section_id: Uuid,
    pub hash: String,
}

pub struct SectionStore<'a> {
    conn: &'a Connection,
}

impl<'a> SectionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new section
    #[instrument(skip(self, section), fields(section_id = %section.id))]
    pub fn create(&self, section: &Section) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sections (id, tenant_id, course_id, name, slug, status, capacity, active_count,
                member_code, member_code_hash, member_code_fingerprint, member_code_set_at,
                supervisor_code_hash, supervisor_code_fingerprint, supervisor_code_set_at,
                primary_supervisor_id, assistant_supervisor_id, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                section.id.to_string(),
                section.tenant_id.to_string(),
                section.course_id.to_string(),
                section.name,
                section.slug,
                section.status.as_str(),
                section.capacity,
                section.active_count,
                section.member_code,
                section.member_code_hash,
                section.member_code_fingerprint,
                section.member_code_set_at.map(|t| t.to_rfc3339()),
                section.supervisor_code_hash,
                section.supervisor_code_fingerprint,
                section.supervisor_code_set_at.map(|t| t.to_rfc3339()),
                section.primary_supervisor_id.map(|id| id.to_string()),
                section.assistant_supervisor_id.map(|id| id.to_string()),
                section.created_at.to_rfc3339(),
                section.deleted_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Find a non-deleted section by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Section>> {
        let sql = format!(
            "SELECT {} FROM sections WHERE id = ?1 AND deleted_at IS NULL",
            SECTION_COLUMNS
        );
        let section = self
            .conn
            .query_row(&sql, params![id.to_string()], section_from_row)
            .optional()?;

        Ok(section)
    }

    /// Exact, case-sensitive plaintext member-code lookup across all tenants
    #[instrument(skip_all)]
    pub fn find_by_member_code(&self, code: &str) -> Result<Option<Section>> {
        let sql = format!(
            "SELECT {} FROM sections
             WHERE member_code = ?1 AND deleted_at IS NULL
             ORDER BY created_at, id
             LIMIT 1",
            SECTION_COLUMNS
        );
        let section = self
            .conn
            .query_row(&sql, params![code], section_from_row)
            .optional()?;

        Ok(section)
    }

    /// Sections with a member-code hash in the given fingerprint bucket.
    /// Rows without a fingerprint are always included.
    #[instrument(skip(self))]
    pub fn member_hash_candidates(&self, fingerprint: &str) -> Result<Vec<HashCandidate>> {
        self.hash_candidates(
            "SELECT id, member_code_hash FROM sections
             WHERE deleted_at IS NULL
               AND member_code_hash IS NOT NULL AND member_code_hash != ''
               AND (member_code_fingerprint = ?1 OR member_code_fingerprint IS NULL)
             ORDER BY created_at, id",
            fingerprint,
        )
    }

    /// Sections with a supervisor-code hash in the given fingerprint bucket
    #[instrument(skip(self))]
    pub fn supervisor_hash_candidates(&self, fingerprint: &str) -> Result<Vec<HashCandidate>> {
        self.hash_candidates(
            "SELECT id, supervisor_code_hash FROM sections
             WHERE deleted_at IS NULL
               AND supervisor_code_hash IS NOT NULL AND supervisor_code_hash != ''
               AND (supervisor_code_fingerprint = ?1 OR supervisor_code_fingerprint IS NULL)
             ORDER BY created_at, id",
            fingerprint,
        )
    }

    fn hash_candidates(&self, sql: &str, fingerprint: &str) -> Result<Vec<HashCandidate>> {
        let mut stmt = self.conn.prepare(sql)?;
        let candidates = stmt
            .query_map(params![fingerprint], |row| {
                Ok(HashCandidate {
                    section_id: parse_uuid(&row.get::<_, String>(0)?)?,
                    hash: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(candidates)
    }

    /// Replace the member code. `plaintext` is None when plaintext retention is off.
    #[instrument(skip(self, plaintext, hash, fingerprint))]
    pub fn set_member_code(
        &self,
        id: Uuid,
        plaintext: Option<&str>,
        hash: &str,
        fingerprint: &str,
        set_at: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE sections
             SET member_code = ?1, member_code_hash = ?2, member_code_fingerprint = ?3, member_code_set_at = ?4
             WHERE id = ?5 AND deleted_at IS NULL",
            params![plaintext, hash, fingerprint, set_at.to_rfc3339(), id.to_string()],
        )?;
        Ok(updated == 1)
    }

    /// Replace the supervisor code hash
    #[instrument(skip(self, hash, fingerprint))]
    pub fn set_supervisor_code(
        &self,
        id: Uuid,
        hash: &str,
        fingerprint: &str,
        set_at: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE sections
             SET supervisor_code_hash = ?1, supervisor_code_fingerprint = ?2, supervisor_code_set_at = ?3
             WHERE id = ?4 AND deleted_at IS NULL",
            params![hash, fingerprint, set_at.to_rfc3339(), id.to_string()],
        )?;
        Ok(updated == 1)
    }

    /// Put a member into a supervisor slot only if the slot is still empty
    #[instrument(skip(self))]
    pub fn claim_supervisor_slot(
        &self,
        id: Uuid,
        slot: SupervisorSlot,
        member_id: Uuid,
    ) -> Result<bool> {
        let sql = match slot {
            SupervisorSlot::Primary => {
                "UPDATE sections SET primary_supervisor_id = ?1
                 WHERE id = ?2 AND deleted_at IS NULL AND primary_supervisor_id IS NULL"
            }
            SupervisorSlot::Assistant => {
                "UPDATE sections SET assistant_supervisor_id = ?1
                 WHERE id = ?2 AND deleted_at IS NULL AND assistant_supervisor_id IS NULL"
            }
        };
        let updated = self
            .conn
            .execute(sql, params![member_id.to_string(), id.to_string()])?;
        Ok(updated == 1)
    }

    /// Change section status
    #[instrument(skip(self))]
    pub fn set_status(&self, id: Uuid, status: ResourceStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE sections SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )?;
        Ok(())
    }

    /// Soft delete a section
    #[instrument(skip(self))]
    pub fn soft_delete(&self, id: Uuid) -> Result<()> {
        self.conn.execute(
            "UPDATE sections SET deleted_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }
}
