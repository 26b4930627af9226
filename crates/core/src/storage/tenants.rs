//! Tenant storage operations

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::Tenant;

pub struct TenantStore<'a> {
    conn: &'a Connection,
}

impl<'a> TenantStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new tenant
    #[instrument(skip(self, tenant), fields(tenant_slug = %tenant.slug))]
    pub fn create(&self, tenant: &Tenant) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tenants (id, name, slug, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                tenant.id.to_string(),
                tenant.name,
                tenant.slug,
                tenant.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find tenant by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>> {
        let tenant = self
            .conn
            .query_row(
                "SELECT id, name, slug, created_at FROM tenants WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(Tenant {
                        id: parse_uuid(&row.get::<_, String>(0)?)?,
                        name: row.get(1)?,
                        slug: row.get(2)?,
                        created_at: parse_datetime(&row.get::<_, String>(3)?)?,
                    })
                },
            )
            .optional()?;

        Ok(tenant)
    }
}
