//! SQLite storage layer for Enrol

mod capabilities;
mod courses;
mod enrollments;
mod members;
mod migrations;
mod parse;
mod profiles;
mod sections;
mod tenants;
mod traits;

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::models::ProfileSnapshot;

pub use capabilities::SchemaCapabilities;
pub use courses::CourseStore;
pub use enrollments::EnrollmentStore;
pub use members::MemberStore;
pub use parse::is_unique_violation;
pub use profiles::ProfileStore;
pub use sections::{HashCandidate, SectionStore};
pub use tenants::TenantStore;
pub use traits::ProfileProvider;

/// Default time a connection waits on another writer's lock
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Main database handle
///
/// Wraps a single connection. Concurrent units of work each use their own
/// `Database` against the same file.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path and run migrations
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Self::connect(path, DEFAULT_BUSY_TIMEOUT)?;
        db.init()?;
        Ok(db)
    }

    /// Open an additional connection to an already-migrated database
    pub fn connect<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::configure(&conn, busy_timeout)?;
        Ok(Self { conn })
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn, DEFAULT_BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn configure(conn: &Connection, busy_timeout: Duration) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        conn.busy_timeout(busy_timeout)?;
        // Readers never block the single writer in WAL mode
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(journal_mode = %mode, "Connection configured");
        Ok(())
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Probe optional schema columns
    pub fn capabilities(&self) -> Result<SchemaCapabilities> {
        SchemaCapabilities::probe(&self.conn)
    }

    /// Begin a write transaction that takes the database write lock up front.
    /// Dropping the transaction without committing rolls everything back.
    pub fn begin_immediate(&self) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Raw connection access
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get tenant store
    pub fn tenants(&self) -> TenantStore<'_> {
        TenantStore::new(&self.conn)
    }

    /// Get course store
    pub fn courses(&self) -> CourseStore<'_> {
        CourseStore::new(&self.conn)
    }

    /// Get section store
    pub fn sections(&self) -> SectionStore<'_> {
        SectionStore::new(&self.conn)
    }

    /// Get profile store
    pub fn profiles(&self) -> ProfileStore<'_> {
        ProfileStore::new(&self.conn)
    }

    /// Get member identity store
    pub fn members(&self) -> MemberStore<'_> {
        MemberStore::new(&self.conn)
    }

    /// Get enrollment store for the given schema capabilities
    pub fn enrollments(&self, caps: SchemaCapabilities) -> EnrollmentStore<'_> {
        EnrollmentStore::new(&self.conn, caps)
    }
}

// The profiles table doubles as the default snapshot provider
impl ProfileProvider for Database {
    fn snapshot(&self, profile_id: Uuid) -> Result<Option<ProfileSnapshot>> {
        Ok(self.profiles().find_by_id(profile_id)?.map(|p| p.snapshot))
    }
}
