use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::VendorId;

/// Vendor - a car wash chain or brand
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    /// Primary web domain (e.g. "shell.com"), used for name cleanup and
    /// chain-location discovery
    pub domain: Option<String>,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vendor {
    pub async fn find_by_id(id: VendorId, pool: &PgPool) -> Result<Self> {
        let vendor = sqlx::query_as::<_, Vendor>("SELECT * FROM vendors WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(vendor)
    }

    /// IDs of vendors with a known domain, in stable order.
    pub async fn ids_with_domain(pool: &PgPool) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM vendors WHERE domain IS NOT NULL ORDER BY name, id",
        )
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    /// Rename a vendor. Returns the previous name.
    pub async fn rename(id: VendorId, new_name: &str, pool: &PgPool) -> Result<String> {
        let old = sqlx::query_scalar::<_, String>(
            "UPDATE vendors v SET name = $1, updated_at = NOW()
             FROM (SELECT name FROM vendors WHERE id = $2) prev
             WHERE v.id = $2
             RETURNING prev.name",
        )
        .bind(new_name)
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(old)
    }
}
