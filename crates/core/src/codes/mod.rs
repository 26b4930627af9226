//! Join code registry
//!
//! Each section carries two code classes:
//!
//! - **Member code**: shared with a whole class. Stored as a slow hash and,
//!   while `codes.retain_member_plaintext` is on, also as plaintext so staff
//!   can re-display it and lookups take the indexed fast path.
//! - **Supervisor code**: stored only as a hash. The plaintext is returned
//!   once by [`JoinCodeRegistry::rotate_supervisor_code`] and can never be
//!   recovered; losing it means rotating again.

mod generate;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::CodeConfig;
use crate::error::{Error, Result};
use crate::models::{non_empty, Section};
use crate::storage::{Database, SectionStore};

pub use generate::{fingerprint, member_code, random_suffix, supervisor_code, verify_code, CodeHasher};

/// A freshly generated code with its stored forms
struct IssuedCode {
    plaintext: String,
    hash: String,
    fingerprint: String,
}

impl IssuedCode {
    fn new(plaintext: String, hasher: &CodeHasher) -> Result<Self> {
        Ok(Self {
            hash: hasher.hash(&plaintext)?,
            fingerprint: fingerprint(&plaintext),
            plaintext,
        })
    }
}

/// Generates, stores and rotates section join codes
pub struct JoinCodeRegistry<'a> {
    db: &'a Database,
    hasher: &'a CodeHasher,
    config: &'a CodeConfig,
}

impl<'a> JoinCodeRegistry<'a> {
    pub fn new(db: &'a Database, hasher: &'a CodeHasher, config: &'a CodeConfig) -> Self {
        Self { db, hasher, config }
    }

    fn load(&self, store: &SectionStore<'_>, section_id: Uuid) -> Result<Section> {
        store
            .find_by_id(section_id)?
            .ok_or_else(|| Error::NotFound(format!("section {}", section_id)))
    }

    /// An issued member code that was not retained cannot be shown again
    fn check_recoverable(&self, section: &Section) -> Result<()> {
        if !self.config.retain_member_plaintext && non_empty(&section.member_code_hash).is_some() {
            return Err(Error::Validation(
                "member code was issued without plaintext retention; rotate to reissue".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the section's member code, issuing one if it has none.
    ///
    /// Concurrent callers agree on a single code: the loser of the race
    /// discards its candidate and returns the winner's.
    #[instrument(skip(self))]
    pub fn ensure_member_code(&self, section_id: Uuid) -> Result<String> {
        let section = self.load(&self.db.sections(), section_id)?;
        if let Some(code) = non_empty(&section.member_code) {
            return Ok(code.to_string());
        }
        self.check_recoverable(&section)?;

        // Hash before taking the write lock; Argon2 is deliberately slow
        let issued = IssuedCode::new(member_code(&section, self.config.suffix_len), self.hasher)?;

        let tx = self.db.begin_immediate()?;
        let store = SectionStore::new(&tx);
        let current = self.load(&store, section_id)?;
        if let Some(code) = non_empty(&current.member_code) {
            return Ok(code.to_string());
        }
        self.check_recoverable(&current)?;

        let plaintext = self
            .config
            .retain_member_plaintext
            .then_some(issued.plaintext.as_str());
        store.set_member_code(
            section_id,
            plaintext,
            &issued.hash,
            &issued.fingerprint,
            Utc::now(),
        )?;
        tx.commit()?;

        info!(
            section_id = %section_id,
            retained = self.config.retain_member_plaintext,
            "Member code issued"
        );
        Ok(issued.plaintext)
    }

    /// Replace the member code unconditionally; the old code stops working
    #[instrument(skip(self))]
    pub fn rotate_member_code(&self, section_id: Uuid) -> Result<String> {
        let section = self.load(&self.db.sections(), section_id)?;
        let issued = IssuedCode::new(member_code(&section, self.config.suffix_len), self.hasher)?;

        let plaintext = self
            .config
            .retain_member_plaintext
            .then_some(issued.plaintext.as_str());
        let updated = self.db.sections().set_member_code(
            section_id,
            plaintext,
            &issued.hash,
            &issued.fingerprint,
            Utc::now(),
        )?;
        if !updated {
            return Err(Error::NotFound(format!("section {}", section_id)));
        }

        info!(section_id = %section_id, "Member code rotated");
        Ok(issued.plaintext)
    }

    /// Issue a new supervisor code, invalidating any previous one.
    /// The returned plaintext is the only copy.
    #[instrument(skip(self))]
    pub fn rotate_supervisor_code(&self, section_id: Uuid) -> Result<String> {
        self.load(&self.db.sections(), section_id)?;
        let issued = IssuedCode::new(supervisor_code(self.config.supervisor_len), self.hasher)?;

        let updated = self.db.sections().set_supervisor_code(
            section_id,
            &issued.hash,
            &issued.fingerprint,
            Utc::now(),
        )?;
        if !updated {
            return Err(Error::NotFound(format!("section {}", section_id)));
        }

        info!(section_id = %section_id, "Supervisor code rotated");
        Ok(issued.plaintext)
    }
}
