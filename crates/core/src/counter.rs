//! Capacity-guarded counters
//!
//! A seat is taken by one conditional `UPDATE`: the row changes only if the
//! resource is live, active and under its limit. One changed row means the
//! seat was taken; zero means it was not, and the caller must abort.

use rusqlite::{params, Connection};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::Result;

/// Counter/limit pairs guarded by [`CapacityGuard`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedCounter {
    /// `sections.active_count` against `sections.capacity`
    Section,
    /// `courses.capacity_taken` against `courses.capacity_total`
    Course,
}

impl GuardedCounter {
    fn increment_sql(&self) -> &'static str {
        match self {
            GuardedCounter::Section => {
                "UPDATE sections SET active_count = active_count + 1
                 WHERE id = ?1 AND status = 'active' AND deleted_at IS NULL
                   AND (capacity IS NULL OR active_count < capacity)"
            }
            GuardedCounter::Course => {
                "UPDATE courses SET capacity_taken = capacity_taken + 1
                 WHERE id = ?1 AND status = 'active' AND deleted_at IS NULL
                   AND (capacity_total IS NULL OR capacity_taken < capacity_total)"
            }
        }
    }

    fn decrement_sql(&self) -> &'static str {
        match self {
            GuardedCounter::Section => {
                "UPDATE sections SET active_count = active_count - 1
                 WHERE id = ?1 AND deleted_at IS NULL AND active_count > 0"
            }
            GuardedCounter::Course => {
                "UPDATE courses SET capacity_taken = capacity_taken - 1
                 WHERE id = ?1 AND deleted_at IS NULL AND capacity_taken > 0"
            }
        }
    }
}

impl std::fmt::Display for GuardedCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardedCounter::Section => write!(f, "section"),
            GuardedCounter::Course => write!(f, "course"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Applied,
    Rejected,
}

impl GuardOutcome {
    fn from_changed(rows: usize) -> Self {
        if rows == 1 {
            GuardOutcome::Applied
        } else {
            GuardOutcome::Rejected
        }
    }

    pub fn is_applied(&self) -> bool {
        *self == GuardOutcome::Applied
    }
}

pub struct CapacityGuard<'a> {
    conn: &'a Connection,
}

impl<'a> CapacityGuard<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Take one seat if the resource is active and below capacity
    #[instrument(skip(self))]
    pub fn try_increment(&self, target: GuardedCounter, id: Uuid) -> Result<GuardOutcome> {
        let changed = self
            .conn
            .execute(target.increment_sql(), params![id.to_string()])?;
        let outcome = GuardOutcome::from_changed(changed);
        debug!(?outcome, "Capacity guard evaluated");
        Ok(outcome)
    }

    /// Return one seat; never goes below zero
    #[instrument(skip(self))]
    pub fn decrement(&self, target: GuardedCounter, id: Uuid) -> Result<GuardOutcome> {
        let changed = self
            .conn
            .execute(target.decrement_sql(), params![id.to_string()])?;
        Ok(GuardOutcome::from_changed(changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceStatus;
    use crate::test_support::Fixture;

    fn section_count(fx: &Fixture) -> u32 {
        fx.db.sections().find_by_id(fx.section.id).unwrap().unwrap().active_count
    }

    #[test]
    fn test_increment_stops_at_capacity() {
        let fx = Fixture::with_capacities(Some(2), None);
        let guard = CapacityGuard::new(fx.db.connection());

        assert!(guard.try_increment(GuardedCounter::Section, fx.section.id).unwrap().is_applied());
        assert!(guard.try_increment(GuardedCounter::Section, fx.section.id).unwrap().is_applied());
        assert_eq!(
            guard.try_increment(GuardedCounter::Section, fx.section.id).unwrap(),
            GuardOutcome::Rejected
        );
        assert_eq!(section_count(&fx), 2);
    }

    #[test]
    fn test_unbounded_capacity() {
        let fx = Fixture::new();
        let guard = CapacityGuard::new(fx.db.connection());

        for _ in 0..50 {
            assert!(guard.try_increment(GuardedCounter::Course, fx.course.id).unwrap().is_applied());
        }
        let course = fx.db.courses().find_by_id(fx.course.id).unwrap().unwrap();
        assert_eq!(course.capacity_taken, 50);
    }

    #[test]
    fn test_inactive_or_missing_resource_rejects() {
        let fx = Fixture::new();
        let guard = CapacityGuard::new(fx.db.connection());

        fx.db.sections().set_status(fx.section.id, ResourceStatus::Inactive).unwrap();
        assert_eq!(
            guard.try_increment(GuardedCounter::Section, fx.section.id).unwrap(),
            GuardOutcome::Rejected
        );
        assert_eq!(
            guard.try_increment(GuardedCounter::Course, Uuid::new_v4()).unwrap(),
            GuardOutcome::Rejected
        );
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let fx = Fixture::with_capacities(Some(1), None);
        let guard = CapacityGuard::new(fx.db.connection());

        assert_eq!(
            guard.decrement(GuardedCounter::Section, fx.section.id).unwrap(),
            GuardOutcome::Rejected
        );

        guard.try_increment(GuardedCounter::Section, fx.section.id).unwrap();
        fx.db.sections().set_status(fx.section.id, ResourceStatus::Archived).unwrap();
        // Seats come back even from a section that stopped accepting joins
        assert!(guard.decrement(GuardedCounter::Section, fx.section.id).unwrap().is_applied());
        assert_eq!(section_count(&fx), 0);
    }
}
