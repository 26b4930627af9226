//! Code resolver: maps an untrusted join code to the section it unlocks
//!
//! Member codes try the indexed plaintext column first and fall back to
//! verifying stored hashes. Supervisor codes only exist as hashes.

use rusqlite::Connection;
use tracing::{debug, instrument, warn};

use crate::codes::{fingerprint, verify_code};
use crate::error::{Error, Result};
use crate::models::Section;
use crate::storage::{HashCandidate, SectionStore};

/// Longest code accepted before any lookup is attempted
pub const MAX_CODE_LEN: usize = 128;

/// Which code class is being presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Member,
    Supervisor,
}

impl std::fmt::Display for CodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeKind::Member => write!(f, "member"),
            CodeKind::Supervisor => write!(f, "supervisor"),
        }
    }
}

/// How a code was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPath {
    /// Indexed equality on the retained plaintext
    Plaintext,
    /// Slow verification against a stored hash
    Hash,
}

#[derive(Debug, Clone)]
pub struct ResolvedSection {
    pub section: Section,
    pub path: LookupPath,
}

pub struct CodeResolver<'a> {
    sections: SectionStore<'a>,
}

impl<'a> CodeResolver<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            sections: SectionStore::new(conn),
        }
    }

    /// Resolve a raw code. Any miss is an authentication failure.
    #[instrument(skip(self, raw))]
    pub fn resolve(&self, raw: &str, kind: CodeKind) -> Result<ResolvedSection> {
        let code = raw.trim();
        if code.is_empty() || code.len() > MAX_CODE_LEN {
            return Err(invalid_code());
        }

        if kind == CodeKind::Member {
            if let Some(section) = self.sections.find_by_member_code(code)? {
                debug!(section_id = %section.id, "Code matched plaintext");
                return Ok(ResolvedSection {
                    section,
                    path: LookupPath::Plaintext,
                });
            }
        }

        let bucket = fingerprint(code);
        let candidates = match kind {
            CodeKind::Member => self.sections.member_hash_candidates(&bucket)?,
            CodeKind::Supervisor => self.sections.supervisor_hash_candidates(&bucket)?,
        };
        debug!(candidates = candidates.len(), "Scanning code hashes");

        match first_match(code, &candidates) {
            Some(section_id) => {
                let section = self
                    .sections
                    .find_by_id(section_id)?
                    .ok_or_else(invalid_code)?;
                debug!(section_id = %section.id, "Code matched hash");
                Ok(ResolvedSection {
                    section,
                    path: LookupPath::Hash,
                })
            }
            None => Err(invalid_code()),
        }
    }
}

fn invalid_code() -> Error {
    Error::Authentication("invalid join code".to_string())
}

fn first_match(code: &str, candidates: &[HashCandidate]) -> Option<uuid::Uuid> {
    for candidate in candidates {
        match verify_code(code, &candidate.hash) {
            Ok(true) => return Some(candidate.section_id),
            Ok(false) => {}
            Err(e) => {
                warn!(section_id = %candidate.section_id, error = %e, "Skipping unreadable code hash");
            }
        }
    }
    None
}
