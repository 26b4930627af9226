//! Enrollment transaction coordinator
//!
//! A join is one unit of work inside a single `BEGIN IMMEDIATE` transaction:
//!
//! ```text
//! resolve code -> lock section -> validate -> resolve identity
//!   -> duplicate check -> insert enrollment -> section guard
//!   -> course guard -> commit
//! ```
//!
//! Any failure returns before `commit`; dropping the transaction rolls back
//! every write made so far. Nothing is compensated by hand.
//!
//! SQLite has no row locks. `BEGIN IMMEDIATE` takes the database-wide write
//! lock, so joins to different sections serialize as well; they are short,
//! and seat and duplicate safety rest on the conditional updates and the
//! partial unique index rather than on the lock.

mod deadline;
mod stage;

use chrono::Utc;
use rusqlite::Transaction;
use serde::Serialize;
use tracing::{error, field, info, instrument, warn, Span};
use uuid::Uuid;

use crate::counter::{CapacityGuard, GuardOutcome, GuardedCounter};
use crate::error::{Conflict, Error, Result};
use crate::identity::{MemberIdentityResolver, ResolvedIdentity};
use crate::invariants::{
    assert_course_invariants, assert_enrollment_invariants, assert_section_invariants,
};
use crate::models::{CloseOutcome, Enrollment, MemberIdentity, Section, SupervisorSlot};
use crate::resolver::{CodeKind, CodeResolver};
use crate::storage::{
    is_unique_violation, CourseStore, Database, EnrollmentStore, ProfileProvider,
    SchemaCapabilities, SectionStore,
};

pub use deadline::Deadline;
pub use stage::JoinStage;

/// Result of a successful member join
#[derive(Debug, Clone, Serialize)]
pub struct JoinReceipt {
    pub tenant_id: Uuid,
    pub enrollment: Enrollment,
    pub member: MemberIdentity,
    /// The member identity was created by this join
    pub identity_created: bool,
}

/// Result of a successful supervisor join
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorReceipt {
    pub tenant_id: Uuid,
    pub section_id: Uuid,
    pub member_id: Uuid,
    pub slot: SupervisorSlot,
}

pub struct EnrollmentCoordinator<'a> {
    db: &'a Database,
    profiles: &'a dyn ProfileProvider,
    caps: SchemaCapabilities,
}

impl<'a> EnrollmentCoordinator<'a> {
    pub fn new(db: &'a Database, profiles: &'a dyn ProfileProvider, caps: SchemaCapabilities) -> Self {
        Self { db, profiles, caps }
    }

    /// Join the section unlocked by a member code
    #[instrument(skip(self, code, deadline), fields(stage = field::Empty, section_id = field::Empty))]
    pub fn join(&self, code: &str, profile_id: Uuid, deadline: Deadline) -> Result<JoinReceipt> {
        let mut stage = JoinStage::Start;
        let result = self.run_join(code, profile_id, &deadline, &mut stage);
        finish("join", stage, &result);
        result
    }

    /// Claim the first open supervisor slot of the section unlocked by a supervisor code
    #[instrument(skip(self, code, deadline), fields(stage = field::Empty, section_id = field::Empty))]
    pub fn join_as_supervisor(
        &self,
        code: &str,
        profile_id: Uuid,
        deadline: Deadline,
    ) -> Result<SupervisorReceipt> {
        let mut stage = JoinStage::Start;
        let result = self.run_supervisor_join(code, profile_id, &deadline, &mut stage);
        finish("supervisor_join", stage, &result);
        result
    }

    /// Close an active enrollment and give its seat back
    #[instrument(skip(self))]
    pub fn close_enrollment(&self, enrollment_id: Uuid, outcome: CloseOutcome) -> Result<Enrollment> {
        let tx = self.db.begin_immediate()?;
        let enrollments = EnrollmentStore::new(&tx, self.caps);

        let enrollment = enrollments
            .find_by_id(enrollment_id)?
            .ok_or_else(|| Error::NotFound(format!("enrollment {}", enrollment_id)))?;
        if !enrollments.close(enrollment_id, outcome.status(), Utc::now())? {
            info!(enrollment_id = %enrollment_id, "Enrollment already closed");
            return Err(Conflict::EnrollmentNotActive.into());
        }

        let guard = CapacityGuard::new(&tx);
        for (target, id) in [
            (GuardedCounter::Section, enrollment.section_id),
            (GuardedCounter::Course, enrollment.course_id),
        ] {
            if guard.decrement(target, id)? == GuardOutcome::Rejected {
                warn!(counter = %target, id = %id, "Seat counter was already zero");
            }
        }

        let closed = enrollments
            .find_by_id(enrollment_id)?
            .ok_or_else(|| Error::NotFound(format!("enrollment {}", enrollment_id)))?;
        tx.commit()?;

        info!(
            enrollment_id = %enrollment_id,
            section_id = %closed.section_id,
            status = closed.status.as_str(),
            "Enrollment closed"
        );
        Ok(closed)
    }

    fn run_join(
        &self,
        code: &str,
        profile_id: Uuid,
        deadline: &Deadline,
        stage: &mut JoinStage,
    ) -> Result<JoinReceipt> {
        deadline.check()?;
        // Hash verification is slow; do it before taking the write lock
        let resolved = CodeResolver::new(self.db.connection()).resolve(code, CodeKind::Member)?;
        Span::current().record("section_id", field::display(resolved.section.id));

        let tx = self.db.begin_immediate()?;
        let section = lock_section(&tx, resolved.section.id)?;
        advance(stage, JoinStage::SectionLocked, deadline)?;

        self.validate(&tx, &section)?;
        advance(stage, JoinStage::Validated, deadline)?;

        let identity = self.resolve_identity(&tx, &section, profile_id)?;
        advance(stage, JoinStage::IdentityResolved, deadline)?;

        let enrollments = EnrollmentStore::new(&tx, self.caps);
        if enrollments
            .find_active(section.tenant_id, section.id, identity.member.id)?
            .is_some()
        {
            return Err(Conflict::AlreadyEnrolled.into());
        }
        advance(stage, JoinStage::DuplicateChecked, deadline)?;

        let enrollment = Enrollment::new(&section, &identity.member);
        assert_enrollment_invariants(&enrollment);
        enrollments.insert(&enrollment).map_err(|e| {
            if is_unique_violation(&e) {
                Error::from(Conflict::AlreadyEnrolled)
            } else {
                Error::from(e)
            }
        })?;
        advance(stage, JoinStage::EnrollmentWritten, deadline)?;

        let guard = CapacityGuard::new(&tx);
        if !guard.try_increment(GuardedCounter::Section, section.id)?.is_applied() {
            return Err(Conflict::SectionFull.into());
        }
        advance(stage, JoinStage::SectionCounterGuarded, deadline)?;

        if !guard.try_increment(GuardedCounter::Course, section.course_id)?.is_applied() {
            return Err(Conflict::ParentQuotaFull.into());
        }
        advance(stage, JoinStage::ParentCounterGuarded, deadline)?;

        tx.commit()?;
        *stage = JoinStage::Committed;

        info!(
            enrollment_id = %enrollment.id,
            member_id = %identity.member.id,
            tenant_id = %section.tenant_id,
            "Member enrolled"
        );
        Ok(JoinReceipt {
            tenant_id: section.tenant_id,
            enrollment,
            member: identity.member,
            identity_created: identity.created,
        })
    }

    fn run_supervisor_join(
        &self,
        code: &str,
        profile_id: Uuid,
        deadline: &Deadline,
        stage: &mut JoinStage,
    ) -> Result<SupervisorReceipt> {
        deadline.check()?;
        let resolved = CodeResolver::new(self.db.connection()).resolve(code, CodeKind::Supervisor)?;
        Span::current().record("section_id", field::display(resolved.section.id));

        let tx = self.db.begin_immediate()?;
        let section = lock_section(&tx, resolved.section.id)?;
        advance(stage, JoinStage::SectionLocked, deadline)?;

        self.validate(&tx, &section)?;
        advance(stage, JoinStage::Validated, deadline)?;

        let identity = self.resolve_identity(&tx, &section, profile_id)?;
        advance(stage, JoinStage::IdentityResolved, deadline)?;

        let member_id = identity.member.id;
        if section.supervisor_slot_of(member_id).is_some() {
            return Err(Conflict::AlreadySupervising.into());
        }

        let sections = SectionStore::new(&tx);
        let mut claimed = None;
        for slot in SupervisorSlot::fill_order() {
            if sections.claim_supervisor_slot(section.id, *slot, member_id)? {
                claimed = Some(*slot);
                break;
            }
        }
        let slot = claimed.ok_or(Error::Conflict(Conflict::NoSupervisorSlot))?;
        advance(stage, JoinStage::SupervisorSlotClaimed, deadline)?;

        tx.commit()?;
        *stage = JoinStage::Committed;

        info!(member_id = %member_id, slot = %slot, "Supervisor assigned");
        Ok(SupervisorReceipt {
            tenant_id: section.tenant_id,
            section_id: section.id,
            member_id,
            slot,
        })
    }

    /// Section and its course must both be accepting members
    fn validate(&self, tx: &Transaction<'_>, section: &Section) -> Result<()> {
        if !section.status.is_active() {
            return Err(Conflict::SectionInactive.into());
        }
        let Some(course) = CourseStore::new(tx).find_by_id(section.course_id)? else {
            return Err(Conflict::SectionInactive.into());
        };
        assert_course_invariants(&course);
        if !course.status.is_active() {
            return Err(Conflict::SectionInactive.into());
        }
        Ok(())
    }

    fn resolve_identity(
        &self,
        tx: &Transaction<'_>,
        section: &Section,
        profile_id: Uuid,
    ) -> Result<ResolvedIdentity> {
        let hint = self
            .profiles
            .snapshot(profile_id)?
            .ok_or_else(|| Error::Validation("complete your profile first".to_string()))?;
        MemberIdentityResolver::new(tx).resolve(section.tenant_id, profile_id, &hint)
    }
}

/// Re-read the section under the write lock
fn lock_section(tx: &Transaction<'_>, section_id: Uuid) -> Result<Section> {
    let section = SectionStore::new(tx)
        .find_by_id(section_id)?
        .ok_or_else(|| Error::Authentication("invalid join code".to_string()))?;
    assert_section_invariants(&section);
    Ok(section)
}

fn advance(stage: &mut JoinStage, next: JoinStage, deadline: &Deadline) -> Result<()> {
    *stage = next;
    deadline.check()
}

fn finish<T>(operation: &'static str, stage: JoinStage, result: &Result<T>) {
    Span::current().record("stage", field::display(stage));
    let Err(e) = result else {
        return;
    };

    match e {
        Error::Cancelled => warn!(operation, %stage, "Join cancelled by deadline"),
        e if e.is_expected() => info!(operation, %stage, reason = %e, "Join refused"),
        e => error!(operation, %stage, error = %e, "Join failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::codes::{CodeHasher, JoinCodeRegistry};
    use crate::config::CodeConfig;
    use crate::models::{EnrollmentStatus, Profile, ProfileSnapshot, ResourceStatus};
    use crate::test_support::{fast_code_config, Fixture};

    /// Profiles held in memory instead of the profiles table
    struct FixedProfiles(HashMap<Uuid, ProfileSnapshot>);

    impl ProfileProvider for FixedProfiles {
        fn snapshot(&self, profile_id: Uuid) -> Result<Option<ProfileSnapshot>> {
            Ok(self.0.get(&profile_id).cloned())
        }
    }

    fn member_code(fx: &Fixture, section_id: Uuid) -> String {
        let config = fast_code_config();
        let hasher = CodeHasher::new(&config).unwrap();
        JoinCodeRegistry::new(&fx.db, &hasher, &config)
            .ensure_member_code(section_id)
            .unwrap()
    }

    fn supervisor_code(fx: &Fixture) -> String {
        let config = fast_code_config();
        let hasher = CodeHasher::new(&config).unwrap();
        JoinCodeRegistry::new(&fx.db, &hasher, &config)
            .rotate_supervisor_code(fx.section.id)
            .unwrap()
    }

    fn coordinator(db: &Database) -> EnrollmentCoordinator<'_> {
        EnrollmentCoordinator::new(db, db, SchemaCapabilities::full())
    }

    fn counters(fx: &Fixture, section_id: Uuid) -> (u32, u32) {
        let section = fx.db.sections().find_by_id(section_id).unwrap().unwrap();
        let course = fx.db.courses().find_by_id(fx.course.id).unwrap().unwrap();
        (section.active_count, course.capacity_taken)
    }

    #[test]
    fn test_join_creates_enrollment_with_frozen_snapshot() {
        let fx = Fixture::with_capacities(Some(10), Some(10));
        let code = member_code(&fx, fx.section.id);
        let profile = Profile::new(ProfileSnapshot {
            display_name: Some("Maryam Idris".into()),
            contact_links: vec!["https://wa.me/447700900000".into()],
            guardian_name: Some("Idris Bello".into()),
            student_code: Some("C-118".into()),
            ..ProfileSnapshot::default()
        });
        fx.db.profiles().upsert(&profile).unwrap();

        let receipt = coordinator(&fx.db)
            .join(&code, profile.id, Deadline::none())
            .unwrap();

        assert_eq!(receipt.tenant_id, fx.tenant.id);
        assert!(receipt.identity_created);
        assert_eq!(receipt.enrollment.section_id, fx.section.id);
        assert_eq!(receipt.enrollment.member_id, receipt.member.id);
        assert_eq!(receipt.enrollment.snapshot.member_name.as_deref(), Some("Maryam Idris"));
        assert_eq!(receipt.enrollment.snapshot.section_name, "Chem A");
        assert_eq!(counters(&fx, fx.section.id), (1, 1));

        // Later profile edits do not reach the stored enrollment
        let mut edited = profile.clone();
        edited.snapshot.display_name = Some("Maryam I. Bello".into());
        fx.db.profiles().upsert(&edited).unwrap();

        let stored = fx
            .db
            .enrollments(SchemaCapabilities::full())
            .find_by_id(receipt.enrollment.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.snapshot, receipt.enrollment.snapshot);
        assert_eq!(stored.status, EnrollmentStatus::Active);
    }

    #[test]
    fn test_second_join_is_duplicate_conflict() {
        let fx = Fixture::new();
        let code = member_code(&fx, fx.section.id);
        let profile = fx.add_profile("Tariq");
        let coordinator = coordinator(&fx.db);

        coordinator.join(&code, profile.id, Deadline::none()).unwrap();
        let second = coordinator.join(&code, profile.id, Deadline::none());

        assert_eq!(second.unwrap_err().conflict(), Some(Conflict::AlreadyEnrolled));
        let store = fx.db.enrollments(SchemaCapabilities::full());
        assert_eq!(store.count_for_section(fx.section.id).unwrap(), 1);
        assert_eq!(counters(&fx, fx.section.id), (1, 1));
    }

    #[test]
    fn test_parent_quota_failure_rolls_back_everything() {
        let fx = Fixture::with_capacities(None, Some(1));
        let other = fx.add_section("Chem B", None);
        let code_a = member_code(&fx, fx.section.id);
        let code_b = member_code(&fx, other.id);
        let coordinator = coordinator(&fx.db);

        coordinator
            .join(&code_a, fx.add_profile("First").id, Deadline::none())
            .unwrap();
        let late = fx.add_profile("Second");
        let result = coordinator.join(&code_b, late.id, Deadline::none());

        assert_eq!(result.unwrap_err().conflict(), Some(Conflict::ParentQuotaFull));
        let store = fx.db.enrollments(SchemaCapabilities::full());
        assert_eq!(store.count_for_section(other.id).unwrap(), 0);
        assert_eq!(counters(&fx, other.id), (0, 1));
        // The identity created inside the aborted join is gone too
        assert!(fx.db.members().find_by_profile(fx.tenant.id, late.id).unwrap().is_none());
    }

    #[test]
    fn test_section_full() {
        let fx = Fixture::with_capacities(Some(1), Some(5));
        let code = member_code(&fx, fx.section.id);
        let coordinator = coordinator(&fx.db);

        coordinator
            .join(&code, fx.add_profile("One").id, Deadline::none())
            .unwrap();
        let result = coordinator.join(&code, fx.add_profile("Two").id, Deadline::none());

        assert_eq!(result.unwrap_err().conflict(), Some(Conflict::SectionFull));
        assert_eq!(counters(&fx, fx.section.id), (1, 1));
    }

    #[test]
    fn test_invalid_code_is_authentication_failure() {
        let fx = Fixture::new();
        member_code(&fx, fx.section.id);
        let profile = fx.add_profile("Noor");

        let err = coordinator(&fx.db)
            .join("chema-0000-NOPE22", profile.id, Deadline::none())
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_missing_profile_is_validation_failure() {
        let fx = Fixture::new();
        let code = member_code(&fx, fx.section.id);

        let err = coordinator(&fx.db)
            .join(&code, Uuid::new_v4(), Deadline::none())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg.contains("complete your profile")));
        assert_eq!(counters(&fx, fx.section.id), (0, 0));
    }

    #[test]
    fn test_inactive_section_or_course_refuses() {
        let fx = Fixture::new();
        let code = member_code(&fx, fx.section.id);
        let profile = fx.add_profile("Iman");
        let coordinator = coordinator(&fx.db);

        fx.db.sections().set_status(fx.section.id, ResourceStatus::Inactive).unwrap();
        let err = coordinator.join(&code, profile.id, Deadline::none()).unwrap_err();
        assert_eq!(err.conflict(), Some(Conflict::SectionInactive));

        fx.db.sections().set_status(fx.section.id, ResourceStatus::Active).unwrap();
        fx.db.courses().set_status(fx.course.id, ResourceStatus::Archived).unwrap();
        let err = coordinator.join(&code, profile.id, Deadline::none()).unwrap_err();
        assert_eq!(err.conflict(), Some(Conflict::SectionInactive));
    }

    #[test]
    fn test_expired_deadline_leaves_no_trace() {
        let fx = Fixture::new();
        let code = member_code(&fx, fx.section.id);
        let profile = fx.add_profile("Sami");

        let err = coordinator(&fx.db)
            .join(&code, profile.id, Deadline::after(Duration::ZERO))
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        let store = fx.db.enrollments(SchemaCapabilities::full());
        assert_eq!(store.count_for_section(fx.section.id).unwrap(), 0);
        assert_eq!(counters(&fx, fx.section.id), (0, 0));
        assert_eq!(fx.db.members().count_for_tenant(fx.tenant.id).unwrap(), 0);
    }

    #[test]
    fn test_hash_only_member_code_joins() {
        let fx = Fixture::new();
        let config = CodeConfig {
            retain_member_plaintext: false,
            ..fast_code_config()
        };
        let hasher = CodeHasher::new(&config).unwrap();
        let code = JoinCodeRegistry::new(&fx.db, &hasher, &config)
            .ensure_member_code(fx.section.id)
            .unwrap();

        let receipt = coordinator(&fx.db)
            .join(&code, fx.add_profile("Hadi").id, Deadline::none())
            .unwrap();
        assert_eq!(receipt.enrollment.section_id, fx.section.id);
    }

    #[test]
    fn test_custom_profile_provider() {
        let fx = Fixture::new();
        let code = member_code(&fx, fx.section.id);
        let profile_id = Uuid::new_v4();
        let profiles = FixedProfiles(HashMap::from([(
            profile_id,
            ProfileSnapshot::named("External Person"),
        )]));

        let receipt = EnrollmentCoordinator::new(&fx.db, &profiles, SchemaCapabilities::full())
            .join(&code, profile_id, Deadline::none())
            .unwrap();
        assert_eq!(
            receipt.member.snapshot.display_name.as_deref(),
            Some("External Person")
        );
    }

    #[test]
    fn test_join_on_schema_without_optional_columns() {
        let fx = Fixture::new();
        fx.db
            .connection()
            .execute_batch(
                "ALTER TABLE enrollments DROP COLUMN student_code;
                 ALTER TABLE enrollments DROP COLUMN member_avatar_url;",
            )
            .unwrap();
        let caps = fx.db.capabilities().unwrap();
        assert!(!caps.enrollment_student_code);
        assert!(!caps.enrollment_avatar);

        let code = member_code(&fx, fx.section.id);
        let profile = Profile::new(ProfileSnapshot {
            display_name: Some("Omar".into()),
            avatar_url: Some("https://cdn.example/o.png".into()),
            student_code: Some("X-1".into()),
            ..ProfileSnapshot::default()
        });
        fx.db.profiles().upsert(&profile).unwrap();

        let receipt = EnrollmentCoordinator::new(&fx.db, &fx.db, caps)
            .join(&code, profile.id, Deadline::none())
            .unwrap();
        let stored = fx
            .db
            .enrollments(caps)
            .find_by_id(receipt.enrollment.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.snapshot.member_name.as_deref(), Some("Omar"));
        assert!(stored.snapshot.student_code.is_none());
        assert!(stored.snapshot.member_avatar_url.is_none());
    }

    #[test]
    fn test_close_frees_seat_and_allows_rejoin() {
        let fx = Fixture::with_capacities(Some(1), Some(1));
        let code = member_code(&fx, fx.section.id);
        let first = fx.add_profile("First");
        let second = fx.add_profile("Second");
        let coordinator = coordinator(&fx.db);

        let receipt = coordinator.join(&code, first.id, Deadline::none()).unwrap();
        assert_eq!(
            coordinator
                .join(&code, second.id, Deadline::none())
                .unwrap_err()
                .conflict(),
            Some(Conflict::SectionFull)
        );

        let closed = coordinator
            .close_enrollment(receipt.enrollment.id, CloseOutcome::Withdrawn)
            .unwrap();
        assert_eq!(closed.status, EnrollmentStatus::Inactive);
        assert!(closed.unassigned_at.is_some());
        assert_eq!(counters(&fx, fx.section.id), (0, 0));

        coordinator.join(&code, second.id, Deadline::none()).unwrap();
        assert_eq!(
            coordinator
                .close_enrollment(receipt.enrollment.id, CloseOutcome::Completed)
                .unwrap_err()
                .conflict(),
            Some(Conflict::EnrollmentNotActive)
        );
    }

    #[test]
    fn test_completed_member_can_rejoin() {
        let fx = Fixture::new();
        let code = member_code(&fx, fx.section.id);
        let profile = fx.add_profile("Zain");
        let coordinator = coordinator(&fx.db);

        let first = coordinator.join(&code, profile.id, Deadline::none()).unwrap();
        let closed = coordinator
            .close_enrollment(first.enrollment.id, CloseOutcome::Completed)
            .unwrap();
        assert_eq!(closed.status, EnrollmentStatus::Completed);
        assert!(closed.completed_at.is_some());

        let again = coordinator.join(&code, profile.id, Deadline::none()).unwrap();
        assert_ne!(again.enrollment.id, first.enrollment.id);
        assert_eq!(again.member.id, first.member.id);
        assert!(!again.identity_created);
    }

    #[test]
    fn test_close_unknown_enrollment() {
        let fx = Fixture::new();
        assert!(matches!(
            coordinator(&fx.db).close_enrollment(Uuid::new_v4(), CloseOutcome::Withdrawn),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_supervisor_slots_fill_in_order() {
        let fx = Fixture::new();
        let code = supervisor_code(&fx);
        let coordinator = coordinator(&fx.db);
        let lead = fx.add_profile("Lead");
        let assistant = fx.add_profile("Assistant");
        let extra = fx.add_profile("Extra");

        let receipt = coordinator
            .join_as_supervisor(&code, lead.id, Deadline::none())
            .unwrap();
        assert_eq!(receipt.slot, SupervisorSlot::Primary);
        assert_eq!(receipt.section_id, fx.section.id);

        assert_eq!(
            coordinator
                .join_as_supervisor(&code, lead.id, Deadline::none())
                .unwrap_err()
                .conflict(),
            Some(Conflict::AlreadySupervising)
        );

        let receipt = coordinator
            .join_as_supervisor(&code, assistant.id, Deadline::none())
            .unwrap();
        assert_eq!(receipt.slot, SupervisorSlot::Assistant);

        assert_eq!(
            coordinator
                .join_as_supervisor(&code, extra.id, Deadline::none())
                .unwrap_err()
                .conflict(),
            Some(Conflict::NoSupervisorSlot)
        );

        let section = fx.db.sections().find_by_id(fx.section.id).unwrap().unwrap();
        let lead_member = fx.db.members().find_by_profile(fx.tenant.id, lead.id).unwrap().unwrap();
        assert_eq!(section.primary_supervisor_id, Some(lead_member.id));
        assert_eq!(section.active_count, 0);
        let store = fx.db.enrollments(SchemaCapabilities::full());
        assert_eq!(store.count_for_section(fx.section.id).unwrap(), 0);
    }

    #[test]
    fn test_member_code_cannot_claim_supervisor_slot() {
        let fx = Fixture::new();
        let code = member_code(&fx, fx.section.id);
        supervisor_code(&fx);

        let err = coordinator(&fx.db)
            .join_as_supervisor(&code, fx.add_profile("Sneaky").id, Deadline::none())
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    /// Run one join per profile, each on its own connection, all at once
    fn join_concurrently(fx: &Fixture, code: &str, profiles: &[Uuid]) -> Vec<Result<JoinReceipt>> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = profiles
                .iter()
                .map(|profile_id| {
                    let db = fx.connect();
                    let profile_id = *profile_id;
                    scope.spawn(move || {
                        let coordinator = coordinator(&db);
                        coordinator.join(code, profile_id, Deadline::none())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_concurrent_joins_never_exceed_capacity() {
        let fx = Fixture::on_disk(Some(3), None);
        let code = member_code(&fx, fx.section.id);
        let profiles: Vec<Uuid> = (0..10)
            .map(|i| fx.add_profile(&format!("Student {}", i)).id)
            .collect();

        let results = join_concurrently(&fx, &code, &profiles);

        let enrolled = results.iter().filter(|r| r.is_ok()).count();
        let full = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.conflict() == Some(Conflict::SectionFull)))
            .count();
        assert_eq!(enrolled, 3);
        assert_eq!(full, 7);

        let store = fx.db.enrollments(SchemaCapabilities::full());
        assert_eq!(store.count_active_for_section(fx.section.id).unwrap(), 3);
        assert_eq!(store.count_for_section(fx.section.id).unwrap(), 3);
        assert_eq!(counters(&fx, fx.section.id), (3, 3));
    }

    #[test]
    fn test_two_racers_for_last_seat() {
        let fx = Fixture::on_disk(Some(1), Some(5));
        let code = member_code(&fx, fx.section.id);
        let profiles = [fx.add_profile("Racer A").id, fx.add_profile("Racer B").id];

        let results = join_concurrently(&fx, &code, &profiles);

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let conflicts: Vec<_> = results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .map(|e| e.conflict())
            .collect();
        assert_eq!(conflicts, vec![Some(Conflict::SectionFull)]);
        assert_eq!(counters(&fx, fx.section.id), (1, 1));
    }

    #[test]
    fn test_concurrent_duplicate_joins_enroll_once() {
        let fx = Fixture::on_disk(None, None);
        let code = member_code(&fx, fx.section.id);
        let profile = fx.add_profile("Eager").id;

        let results = join_concurrently(&fx, &code, &[profile; 6]);

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.conflict() == Some(Conflict::AlreadyEnrolled)));
        assert_eq!(counters(&fx, fx.section.id), (1, 1));
        assert_eq!(fx.db.members().count_for_tenant(fx.tenant.id).unwrap(), 1);
    }
}
