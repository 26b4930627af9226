//! Member identity resolution
//!
//! Maps a global profile onto its tenant-scoped member identity, creating
//! the identity on first contact and topping up its snapshot afterwards.

use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{MemberIdentity, ProfileSnapshot};
use crate::storage::{is_unique_violation, MemberStore};

#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub member: MemberIdentity,
    /// True when this call created the identity
    pub created: bool,
}

pub struct MemberIdentityResolver<'a> {
    members: MemberStore<'a>,
}

impl<'a> MemberIdentityResolver<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            members: MemberStore::new(conn),
        }
    }

    /// Get or create the identity for `(tenant, profile)`.
    /// Safe to call repeatedly and from concurrent connections.
    #[instrument(skip(self, hint))]
    pub fn resolve(
        &self,
        tenant_id: Uuid,
        profile_id: Uuid,
        hint: &ProfileSnapshot,
    ) -> Result<ResolvedIdentity> {
        match self.members.find_by_profile(tenant_id, profile_id)? {
            Some(existing) => Ok(ResolvedIdentity {
                member: self.top_up(existing, hint)?,
                created: false,
            }),
            None => self.create_or_fetch(tenant_id, profile_id, hint),
        }
    }

    /// Insert a new identity; losing a creation race falls back to the winner's row
    fn create_or_fetch(
        &self,
        tenant_id: Uuid,
        profile_id: Uuid,
        hint: &ProfileSnapshot,
    ) -> Result<ResolvedIdentity> {
        let mut snapshot = ProfileSnapshot::default();
        snapshot.top_up(hint);
        let candidate = MemberIdentity::new(tenant_id, profile_id, snapshot);

        match self.members.insert(&candidate) {
            Ok(()) => {
                info!(member_id = %candidate.id, "Member identity created");
                Ok(ResolvedIdentity {
                    member: candidate,
                    created: true,
                })
            }
            Err(e) if is_unique_violation(&e) => {
                debug!("Identity created concurrently, reusing it");
                let existing = self
                    .members
                    .find_by_profile(tenant_id, profile_id)?
                    .ok_or(Error::Database(e))?;
                Ok(ResolvedIdentity {
                    member: self.top_up(existing, hint)?,
                    created: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn top_up(&self, mut member: MemberIdentity, hint: &ProfileSnapshot) -> Result<MemberIdentity> {
        let now = Utc::now();
        self.members.top_up(member.id, hint, now)?;
        member.snapshot.top_up(hint);
        member.updated_at = now;
        Ok(member)
    }
}
