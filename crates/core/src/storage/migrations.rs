//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Tenants (schools, mosques, ...)
            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            -- Global profiles, owned by the profile service
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                display_name TEXT,
                avatar_url TEXT,
                -- JSON array of strings
                contact_links TEXT NOT NULL DEFAULT '[]',
                guardian_name TEXT,
                guardian_contact TEXT,
                student_code TEXT,
                updated_at TEXT NOT NULL
            );

            -- Courses (parent aggregates of sections)
            CREATE TABLE IF NOT EXISTS courses (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                capacity_total INTEGER,
                capacity_taken INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                deleted_at TEXT,
                FOREIGN KEY (tenant_id) REFERENCES tenants(id) ON DELETE CASCADE
            );

            -- Sections
            CREATE TABLE IF NOT EXISTS sections (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                course_id TEXT NOT NULL,
                name TEXT NOT NULL,
                slug TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'active',
                capacity INTEGER,
                active_count INTEGER NOT NULL DEFAULT 0,
                member_code TEXT,
                member_code_hash TEXT,
                member_code_set_at TEXT,
                supervisor_code_hash TEXT,
                supervisor_code_set_at TEXT,
                created_at TEXT NOT NULL,
                deleted_at TEXT,
                FOREIGN KEY (tenant_id) REFERENCES tenants(id) ON DELETE CASCADE,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );

            -- Tenant-scoped member identities
            CREATE TABLE IF NOT EXISTS members (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                profile_id TEXT NOT NULL,
                display_name TEXT,
                avatar_url TEXT,
                contact_links TEXT NOT NULL DEFAULT '[]',
                guardian_name TEXT,
                guardian_contact TEXT,
                student_code TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (tenant_id) REFERENCES tenants(id) ON DELETE CASCADE,
                -- profile_id is owned by the profile service, no FK
                UNIQUE(tenant_id, profile_id)
            );

            -- Enrollments with frozen snapshot fields
            CREATE TABLE IF NOT EXISTS enrollments (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                course_id TEXT NOT NULL,
                section_id TEXT NOT NULL,
                member_id TEXT NOT NULL,
                -- active, inactive, completed
                status TEXT NOT NULL DEFAULT 'active',
                member_name TEXT,
                member_avatar_url TEXT,
                member_contact_links TEXT,
                guardian_name TEXT,
                guardian_contact TEXT,
                student_code TEXT,
                section_name TEXT NOT NULL,
                assigned_at TEXT NOT NULL,
                unassigned_at TEXT,
                completed_at TEXT,
                deleted_at TEXT,
                FOREIGN KEY (tenant_id) REFERENCES tenants(id) ON DELETE CASCADE,
                FOREIGN KEY (section_id) REFERENCES sections(id) ON DELETE CASCADE,
                FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for join lookups",
        sql: r#"
            -- Fast path of code resolution
            CREATE INDEX IF NOT EXISTS idx_sections_member_code ON sections(member_code);
            CREATE INDEX IF NOT EXISTS idx_sections_tenant ON sections(tenant_id);
            CREATE INDEX IF NOT EXISTS idx_sections_course ON sections(course_id);
            CREATE INDEX IF NOT EXISTS idx_courses_tenant ON courses(tenant_id);

            -- At most one live active enrollment per (tenant, section, member)
            CREATE UNIQUE INDEX IF NOT EXISTS idx_enrollments_active_unique
                ON enrollments(tenant_id, section_id, member_id)
                WHERE status = 'active' AND deleted_at IS NULL;
            CREATE INDEX IF NOT EXISTS idx_enrollments_section ON enrollments(section_id);
            CREATE INDEX IF NOT EXISTS idx_enrollments_member ON enrollments(member_id);
        "#,
    },
    Migration {
        version: 3,
        description: "Add code fingerprints for bucketed hash lookup",
        sql: r#"
            -- Short non-secret buckets that narrow the slow-hash fallback scan
            ALTER TABLE sections ADD COLUMN member_code_fingerprint TEXT;
            ALTER TABLE sections ADD COLUMN supervisor_code_fingerprint TEXT;

            CREATE INDEX IF NOT EXISTS idx_sections_member_fp
                ON sections(member_code_fingerprint);
            CREATE INDEX IF NOT EXISTS idx_sections_supervisor_fp
                ON sections(supervisor_code_fingerprint);
        "#,
    },
    Migration {
        version: 4,
        description: "Add supervisor slots to sections",
        sql: r#"
            ALTER TABLE sections ADD COLUMN primary_supervisor_id TEXT
                REFERENCES members(id) ON DELETE SET NULL;
            ALTER TABLE sections ADD COLUMN assistant_supervisor_id TEXT
                REFERENCES members(id) ON DELETE SET NULL;
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap_or(None);
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            conn.execute_batch(migration.sql)?;
            record_migration(conn, migration)?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Get the latest migration version (test helper)
    fn latest_version() -> u32 {
        MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
    }

    #[test]
    fn test_migrations_run() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run twice
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(
                migration.version as usize,
                i + 1,
                "Migration {} should have version {}",
                migration.description,
                i + 1
            );
        }
    }

    #[test]
    fn test_active_enrollment_index_is_partial() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let sql: String = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE name = 'idx_enrollments_active_unique'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(sql.contains("WHERE status = 'active'"));
    }
}
