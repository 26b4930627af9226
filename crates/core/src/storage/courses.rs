//! Course (parent aggregate) storage operations
//!
//! Courses are managed by administrative flows; the join core only reads
//! them and moves `capacity_taken` through the capacity guard.

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_capacity, parse_datetime, parse_datetime_opt, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{Course, ResourceStatus};

const COURSE_COLUMNS: &str =
    "id, tenant_id, name, status, capacity_total, capacity_taken, created_at, deleted_at";

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        tenant_id: parse_uuid(&row.get::<_, String>(1)?)?,
        name: row.get(2)?,
        status: ResourceStatus::from_db(&row.get::<_, String>(3)?),
        capacity_total: parse_capacity(row.get(4)?),
        capacity_taken: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?)?,
        deleted_at: parse_datetime_opt(row.get::<_, Option<String>>(7)?)?,
    })
}

pub struct CourseStore<'a> {
    conn: &'a Connection,
}

impl<'a> CourseStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new course
    #[instrument(skip(self, course), fields(course_id = %course.id))]
    pub fn create(&self, course: &Course) -> Result<()> {
        self.conn.execute(
            "INSERT INTO courses (id, tenant_id, name, status, capacity_total, capacity_taken, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                course.id.to_string(),
                course.tenant_id.to_string(),
                course.name,
                course.status.as_str(),
                course.capacity_total,
                course.capacity_taken,
                course.created_at.to_rfc3339(),
                course.deleted_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Find a non-deleted course by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Course>> {
        let sql = format!(
            "SELECT {} FROM courses WHERE id = ?1 AND deleted_at IS NULL",
            COURSE_COLUMNS
        );
        let course = self
            .conn
            .query_row(&sql, params![id.to_string()], course_from_row)
            .optional()?;

        Ok(course)
    }

    /// Change course status
    #[instrument(skip(self))]
    pub fn set_status(&self, id: Uuid, status: ResourceStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE courses SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )?;
        Ok(())
    }

    /// Soft delete a course
    #[instrument(skip(self))]
    pub fn soft_delete(&self, id: Uuid) -> Result<()> {
        self.conn.execute(
            "UPDATE courses SET deleted_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }
}
