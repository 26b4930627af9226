//! Shared fixtures for unit tests

use std::path::PathBuf;

use tempfile::TempDir;

use crate::config::CodeConfig;
use crate::models::{Course, Profile, ProfileSnapshot, Section, Tenant};
use crate::storage::{Database, DEFAULT_BUSY_TIMEOUT};

/// Argon2 cost low enough for tests
pub fn fast_code_config() -> CodeConfig {
    CodeConfig {
        hash_memory_kib: 64,
        hash_iterations: 1,
        ..CodeConfig::default()
    }
}

/// One tenant with one course and one section
pub struct Fixture {
    pub db: Database,
    pub tenant: Tenant,
    pub course: Course,
    pub section: Section,
    dir: Option<TempDir>,
}

impl Fixture {
    /// Unbounded section and course in an in-memory database
    pub fn new() -> Self {
        Self::with_capacities(None, None)
    }

    pub fn with_capacities(section_capacity: Option<u32>, course_capacity: Option<u32>) -> Self {
        let db = Database::open_in_memory().unwrap();
        Self::seed(db, None, section_capacity, course_capacity)
    }

    /// File-backed, so other threads can open their own connections
    pub fn on_disk(section_capacity: Option<u32>, course_capacity: Option<u32>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("enrol.db")).unwrap();
        Self::seed(db, Some(dir), section_capacity, course_capacity)
    }

    fn seed(
        db: Database,
        dir: Option<TempDir>,
        section_capacity: Option<u32>,
        course_capacity: Option<u32>,
    ) -> Self {
        let tenant = Tenant::new("Northside Academy".into(), "northside".into());
        db.tenants().create(&tenant).unwrap();

        let mut course = Course::new(tenant.id, "Chemistry".into());
        course.capacity_total = course_capacity;
        db.courses().create(&course).unwrap();

        let mut section = Section::new(tenant.id, course.id, "Chem A".into());
        section.capacity = section_capacity;
        db.sections().create(&section).unwrap();

        Self {
            db,
            tenant,
            course,
            section,
            dir,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir
            .as_ref()
            .map(|d| d.path().join("enrol.db"))
            .expect("fixture is in memory")
    }

    /// Another connection to the same file
    pub fn connect(&self) -> Database {
        Database::connect(self.path(), DEFAULT_BUSY_TIMEOUT).unwrap()
    }

    /// Another section in the fixture's course
    pub fn add_section(&self, name: &str, capacity: Option<u32>) -> Section {
        let mut section = Section::new(self.tenant.id, self.course.id, name.into());
        section.capacity = capacity;
        self.db.sections().create(&section).unwrap();
        section
    }

    pub fn add_profile(&self, name: &str) -> Profile {
        let profile = Profile::new(ProfileSnapshot::named(name));
        self.db.profiles().upsert(&profile).unwrap();
        profile
    }
}
