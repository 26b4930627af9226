//! Progress markers for a join

/// Furthest point a join reached. Recorded on the tracing span and in abort logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JoinStage {
    Start,
    SectionLocked,
    Validated,
    IdentityResolved,
    DuplicateChecked,
    EnrollmentWritten,
    SectionCounterGuarded,
    ParentCounterGuarded,
    SupervisorSlotClaimed,
    Committed,
}

impl JoinStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinStage::Start => "start",
            JoinStage::SectionLocked => "section-locked",
            JoinStage::Validated => "validated",
            JoinStage::IdentityResolved => "identity-resolved",
            JoinStage::DuplicateChecked => "duplicate-checked",
            JoinStage::EnrollmentWritten => "enrollment-written",
            JoinStage::SectionCounterGuarded => "section-counter-guarded",
            JoinStage::ParentCounterGuarded => "parent-counter-guarded",
            JoinStage::SupervisorSlotClaimed => "supervisor-slot-claimed",
            JoinStage::Committed => "committed",
        }
    }
}

impl std::fmt::Display for JoinStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
