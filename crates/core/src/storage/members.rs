//! Member identity storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{encode_links, encode_links_opt, parse_datetime, parse_links, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{non_empty, MemberIdentity, ProfileSnapshot};

const MEMBER_COLUMNS: &str = "id, tenant_id, profile_id, display_name, avatar_url, contact_links,
     guardian_name, guardian_contact, student_code, created_at, updated_at";

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<MemberIdentity> {
    Ok(MemberIdentity {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        tenant_id: parse_uuid(&row.get::<_, String>(1)?)?,
        profile_id: parse_uuid(&row.get::<_, String>(2)?)?,
        snapshot: ProfileSnapshot {
            display_name: row.get(3)?,
            avatar_url: row.get(4)?,
            contact_links: parse_links(row.get(5)?)?,
            guardian_name: row.get(6)?,
            guardian_contact: row.get(7)?,
            student_code: row.get(8)?,
        },
        created_at: parse_datetime(&row.get::<_, String>(9)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(10)?)?,
    })
}

pub struct MemberStore<'a> {
    conn: &'a Connection,
}

impl<'a> MemberStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a new identity. Fails with a unique violation if the
    /// (tenant, profile) pair already has one.
    #[instrument(skip(self, member), fields(tenant_id = %member.tenant_id, profile_id = %member.profile_id))]
    pub fn insert(&self, member: &MemberIdentity) -> rusqlite::Result<()> {
        let s = &member.snapshot;
        self.conn.execute(
            "INSERT INTO members (id, tenant_id, profile_id, display_name, avatar_url, contact_links,
                guardian_name, guardian_contact, student_code, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                member.id.to_string(),
                member.tenant_id.to_string(),
                member.profile_id.to_string(),
                non_empty(&s.display_name),
                non_empty(&s.avatar_url),
                encode_links(&s.contact_links),
                non_empty(&s.guardian_name),
                non_empty(&s.guardian_contact),
                non_empty(&s.student_code),
                member.created_at.to_rfc3339(),
                member.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find member by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<MemberIdentity>> {
        let sql = format!("SELECT {} FROM members WHERE id = ?1", MEMBER_COLUMNS);
        let member = self
            .conn
            .query_row(&sql, params![id.to_string()], member_from_row)
            .optional()?;

        Ok(member)
    }

    /// Find the identity for a (tenant, profile) pair
    #[instrument(skip(self))]
    pub fn find_by_profile(&self, tenant_id: Uuid, profile_id: Uuid) -> Result<Option<MemberIdentity>> {
        let sql = format!(
            "SELECT {} FROM members WHERE tenant_id = ?1 AND profile_id = ?2",
            MEMBER_COLUMNS
        );
        let member = self
            .conn
            .query_row(
                &sql,
                params![tenant_id.to_string(), profile_id.to_string()],
                member_from_row,
            )
            .optional()?;

        Ok(member)
    }

    /// Overwrite snapshot fields with the non-empty values of `hint`.
    /// Empty hint values leave the stored value untouched.
    #[instrument(skip(self, hint))]
    pub fn top_up(&self, id: Uuid, hint: &ProfileSnapshot, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE members SET
                display_name = COALESCE(?1, display_name),
                avatar_url = COALESCE(?2, avatar_url),
                contact_links = COALESCE(?3, contact_links),
                guardian_name = COALESCE(?4, guardian_name),
                guardian_contact = COALESCE(?5, guardian_contact),
                student_code = COALESCE(?6, student_code),
                updated_at = ?7
             WHERE id = ?8",
            params![
                non_empty(&hint.display_name),
                non_empty(&hint.avatar_url),
                encode_links_opt(&hint.contact_links),
                non_empty(&hint.guardian_name),
                non_empty(&hint.guardian_contact),
                non_empty(&hint.student_code),
                at.to_rfc3339(),
                id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Number of identities for a tenant
    pub fn count_for_tenant(&self, tenant_id: Uuid) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM members WHERE tenant_id = ?1",
            params![tenant_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
