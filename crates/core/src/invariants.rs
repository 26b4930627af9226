//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use uuid::Uuid;

use crate::models::{Course, Enrollment, Section};

/// Validate that a section's seat counter is within its capacity
pub fn assert_section_invariants(section: &Section) {
    if let Some(capacity) = section.capacity {
        debug_assert!(
            section.active_count <= capacity,
            "Section {} has {} active members but capacity {}",
            section.id,
            section.active_count,
            capacity
        );
    }

    // One member cannot hold both supervisor slots
    debug_assert!(
        section.primary_supervisor_id.is_none()
            || section.primary_supervisor_id != section.assistant_supervisor_id,
        "Section {} has the same member in both supervisor slots",
        section.id
    );
}

/// Validate that a course's aggregate counter is within its quota
pub fn assert_course_invariants(course: &Course) {
    if let Some(total) = course.capacity_total {
        debug_assert!(
            course.capacity_taken <= total,
            "Course {} has {} seats taken but quota {}",
            course.id,
            course.capacity_taken,
            total
        );
    }
}

/// Validate that an enrollment references real rows and is internally consistent
pub fn assert_enrollment_invariants(enrollment: &Enrollment) {
    assert_id_valid(enrollment.tenant_id, "enrollment tenant");
    assert_id_valid(enrollment.section_id, "enrollment section");
    assert_id_valid(enrollment.member_id, "enrollment member");

    debug_assert!(
        !(enrollment.is_active() && (enrollment.unassigned_at.is_some() || enrollment.completed_at.is_some())),
        "Enrollment {} is active but has a close timestamp",
        enrollment.id
    );
}

/// Validate that an ID is not nil
pub fn assert_id_valid(id: Uuid, context: &str) {
    debug_assert!(id != Uuid::nil(), "Nil id in context: {}", context);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemberIdentity, ProfileSnapshot};

    #[test]
    fn test_valid_section() {
        let mut section = Section::new(Uuid::new_v4(), Uuid::new_v4(), "Chem A".into()).with_capacity(2);
        section.active_count = 2;
        assert_section_invariants(&section);
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn test_overfull_section() {
        let mut section = Section::new(Uuid::new_v4(), Uuid::new_v4(), "Chem A".into()).with_capacity(1);
        section.active_count = 2;
        assert_section_invariants(&section);
    }

    #[test]
    #[should_panic(expected = "both supervisor slots")]
    fn test_duplicate_supervisor() {
        let mut section = Section::new(Uuid::new_v4(), Uuid::new_v4(), "Chem A".into());
        let member = Uuid::new_v4();
        section.primary_supervisor_id = Some(member);
        section.assistant_supervisor_id = Some(member);
        assert_section_invariants(&section);
    }

    #[test]
    fn test_valid_course() {
        let mut course = Course::new(Uuid::new_v4(), "Chemistry".into()).with_capacity(3);
        course.capacity_taken = 3;
        assert_course_invariants(&course);
        assert_course_invariants(&Course::new(Uuid::new_v4(), "Open".into()));
    }

    #[test]
    #[should_panic(expected = "quota")]
    fn test_over_quota_course() {
        let mut course = Course::new(Uuid::new_v4(), "Chemistry".into()).with_capacity(2);
        course.capacity_taken = 3;
        assert_course_invariants(&course);
    }

    #[test]
    fn test_valid_enrollment() {
        let section = Section::new(Uuid::new_v4(), Uuid::new_v4(), "Chem A".into());
        let member = MemberIdentity::new(section.tenant_id, Uuid::new_v4(), ProfileSnapshot::named("Ana"));
        assert_enrollment_invariants(&Enrollment::new(&section, &member));
    }

    #[test]
    #[should_panic(expected = "Nil id")]
    fn test_nil_id() {
        assert_id_valid(Uuid::nil(), "test");
    }
}
