//! Enrol Core Library
//!
//! Join-code enrollment for multi-tenant class sections: code issuance and
//! resolution, capacity-guarded seat counters, tenant-scoped member
//! identities, and the transaction that ties them together.

pub mod codes;
pub mod config;
pub mod coordinator;
pub mod counter;
pub mod error;
pub mod identity;
pub mod invariants;
pub mod models;
pub mod resolver;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use codes::{CodeHasher, JoinCodeRegistry};
pub use config::EnrolConfig;
pub use coordinator::{Deadline, EnrollmentCoordinator, JoinReceipt, JoinStage, SupervisorReceipt};
pub use counter::{CapacityGuard, GuardOutcome, GuardedCounter};
pub use error::{Conflict, Error, ErrorKind, Result};
pub use identity::{MemberIdentityResolver, ResolvedIdentity};
pub use models::*;
pub use resolver::{CodeKind, CodeResolver, LookupPath, ResolvedSection};
pub use storage::{Database, ProfileProvider, SchemaCapabilities};
