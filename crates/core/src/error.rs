//! Error types for Enrol Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(Conflict),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Hashing error: {0}")]
    Hashing(String),

    #[error("Operation cancelled: deadline exceeded")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Expected, user-facing reasons a join or close can be refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conflict {
    SectionInactive,
    AlreadyEnrolled,
    SectionFull,
    ParentQuotaFull,
    AlreadySupervising,
    NoSupervisorSlot,
    EnrollmentNotActive,
}

impl Conflict {
    pub fn message(&self) -> &'static str {
        match self {
            Conflict::SectionInactive => "section is not accepting members",
            Conflict::AlreadyEnrolled => "already enrolled in this section",
            Conflict::SectionFull => "section full",
            Conflict::ParentQuotaFull => "parent quota full",
            Conflict::AlreadySupervising => "already supervising this section",
            Conflict::NoSupervisorSlot => "no open supervisor slot",
            Conflict::EnrollmentNotActive => "enrollment is not active",
        }
    }
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl From<Conflict> for Error {
    fn from(conflict: Conflict) -> Self {
        Error::Conflict(conflict)
    }
}

/// Coarse failure classes reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Validation,
    Conflict,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication(_) => ErrorKind::Authentication,
            Error::Validation(_) | Error::NotFound(_) => ErrorKind::Validation,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Database(_)
            | Error::Hashing(_)
            | Error::Cancelled
            | Error::Config(_)
            | Error::Io(_)
            | Error::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Expected outcomes are logged quietly; everything else is an operator problem
    pub fn is_expected(&self) -> bool {
        self.kind() != ErrorKind::Internal
    }

    /// The conflict reason, if this is a conflict
    pub fn conflict(&self) -> Option<Conflict> {
        match self {
            Error::Conflict(c) => Some(*c),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
