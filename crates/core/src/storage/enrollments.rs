//! Enrollment storage operations

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::capabilities::SchemaCapabilities;
use super::parse::{encode_links_opt, parse_datetime, parse_datetime_opt, parse_links, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{Enrollment, EnrollmentSnapshot, EnrollmentStatus};

fn enrollment_from_row(row: &Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        tenant_id: parse_uuid(&row.get::<_, String>(1)?)?,
        course_id: parse_uuid(&row.get::<_, String>(2)?)?,
        section_id: parse_uuid(&row.get::<_, String>(3)?)?,
        member_id: parse_uuid(&row.get::<_, String>(4)?)?,
        status: EnrollmentStatus::from_db(&row.get::<_, String>(5)?),
        snapshot: EnrollmentSnapshot {
            member_name: row.get(6)?,
            member_avatar_url: row.get(7)?,
            member_contact_links: parse_links(row.get(8)?)?,
            guardian_name: row.get(9)?,
            guardian_contact: row.get(10)?,
            student_code: row.get(11)?,
            section_name: row.get(12)?,
        },
        assigned_at: parse_datetime(&row.get::<_, String>(13)?)?,
        unassigned_at: parse_datetime_opt(row.get::<_, Option<String>>(14)?)?,
        completed_at: parse_datetime_opt(row.get::<_, Option<String>>(15)?)?,
        deleted_at: parse_datetime_opt(row.get::<_, Option<String>>(16)?)?,
    })
}

pub struct EnrollmentStore<'a> {
    conn: &'a Connection,
    caps: SchemaCapabilities,
}

impl<'a> EnrollmentStore<'a> {
    pub fn new(conn: &'a Connection, caps: SchemaCapabilities) -> Self {
        Self { conn, caps }
    }

    /// Column list for SELECTs; absent optional columns read as NULL
    fn select_columns(&self) -> String {
        let optional = |present: bool, column: &str| {
            if present {
                column.to_string()
            } else {
                format!("NULL AS {}", column)
            }
        };

        [
            "id, tenant_id, course_id, section_id, member_id, status, member_name".to_string(),
            optional(self.caps.enrollment_avatar, "member_avatar_url"),
            optional(self.caps.enrollment_contact_links, "member_contact_links"),
            optional(self.caps.enrollment_guardian, "guardian_name"),
            optional(self.caps.enrollment_guardian, "guardian_contact"),
            optional(self.caps.enrollment_student_code, "student_code"),
            "section_name, assigned_at, unassigned_at, completed_at, deleted_at".to_string(),
        ]
        .join(", ")
    }

    /// Insert an enrollment, writing only the snapshot columns the schema has.
    /// A concurrent duplicate surfaces as a unique violation.
    #[instrument(skip(self, enrollment), fields(enrollment_id = %enrollment.id, section_id = %enrollment.section_id))]
    pub fn insert(&self, enrollment: &Enrollment) -> rusqlite::Result<()> {
        let s = &enrollment.snapshot;
        let mut columns: Vec<&str> = Vec::with_capacity(17);
        let mut values: Vec<Value> = Vec::with_capacity(17);
        let mut push = |column: &'static str, value: Value| {
            columns.push(column);
            values.push(value);
        };

        push("id", enrollment.id.to_string().into());
        push("tenant_id", enrollment.tenant_id.to_string().into());
        push("course_id", enrollment.course_id.to_string().into());
        push("section_id", enrollment.section_id.to_string().into());
        push("member_id", enrollment.member_id.to_string().into());
        push("status", enrollment.status.as_str().to_string().into());
        push("member_name", s.member_name.clone().into());
        if self.caps.enrollment_avatar {
            push("member_avatar_url", s.member_avatar_url.clone().into());
        }
        if self.caps.enrollment_contact_links {
            push(
                "member_contact_links",
                encode_links_opt(&s.member_contact_links).into(),
            );
        }
        if self.caps.enrollment_guardian {
            push("guardian_name", s.guardian_name.clone().into());
            push("guardian_contact", s.guardian_contact.clone().into());
        }
        if self.caps.enrollment_student_code {
            push("student_code", s.student_code.clone().into());
        }
        push("section_name", s.section_name.clone().into());
        push("assigned_at", enrollment.assigned_at.to_rfc3339().into());
        push(
            "unassigned_at",
            enrollment.unassigned_at.map(|t| t.to_rfc3339()).into(),
        );
        push(
            "completed_at",
            enrollment.completed_at.map(|t| t.to_rfc3339()).into(),
        );
        push(
            "deleted_at",
            enrollment.deleted_at.map(|t| t.to_rfc3339()).into(),
        );

        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO enrollments ({}) VALUES ({})",
            columns.join(", "),
            placeholders
        );

        self.conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    /// Find enrollment by ID (including closed ones)
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Enrollment>> {
        let sql = format!(
            "SELECT {} FROM enrollments WHERE id = ?1",
            self.select_columns()
        );
        let enrollment = self
            .conn
            .query_row(&sql, params![id.to_string()], enrollment_from_row)
            .optional()?;

        Ok(enrollment)
    }

    /// The live active enrollment for (tenant, section, member), if any
    #[instrument(skip(self))]
    pub fn find_active(
        &self,
        tenant_id: Uuid,
        section_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<Enrollment>> {
        let sql = format!(
            "SELECT {} FROM enrollments
             WHERE tenant_id = ?1 AND section_id = ?2 AND member_id = ?3
               AND status = 'active' AND deleted_at IS NULL",
            self.select_columns()
        );
        let enrollment = self
            .conn
            .query_row(
                &sql,
                params![
                    tenant_id.to_string(),
                    section_id.to_string(),
                    member_id.to_string()
                ],
                enrollment_from_row,
            )
            .optional()?;

        Ok(enrollment)
    }

    /// Close an active enrollment. Returns false if it was not active.
    #[instrument(skip(self))]
    pub fn close(&self, id: Uuid, status: EnrollmentStatus, at: DateTime<Utc>) -> Result<bool> {
        let at = at.to_rfc3339();
        let (unassigned_at, completed_at) = match status {
            EnrollmentStatus::Completed => (None, Some(at)),
            _ => (Some(at), None),
        };

        let updated = self.conn.execute(
            "UPDATE enrollments
             SET status = ?1,
                 unassigned_at = COALESCE(?2, unassigned_at),
                 completed_at = COALESCE(?3, completed_at)
             WHERE id = ?4 AND status = 'active' AND deleted_at IS NULL",
            params![status.as_str(), unassigned_at, completed_at, id.to_string()],
        )?;
        Ok(updated == 1)
    }

    /// Count live active enrollments in a section
    pub fn count_active_for_section(&self, section_id: Uuid) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM enrollments
             WHERE section_id = ?1 AND status = 'active' AND deleted_at IS NULL",
            params![section_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Count every enrollment row in a section, whatever its status
    pub fn count_for_section(&self, section_id: Uuid) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM enrollments WHERE section_id = ?1",
            params![section_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
