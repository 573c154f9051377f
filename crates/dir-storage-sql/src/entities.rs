//! Database entity types for `SQLx`.
//!
//! These types map directly to database rows and are converted
//! to/from domain models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dir_model::LocalAccount;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for accounts.
///
/// `username`, `guid`, `domain` and `password` are indexed projections of
/// the configured columns; `fields` holds every column value.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub username: Option<String>,
    pub guid: Option<String>,
    pub domain: Option<String>,
    pub password: Option<String>,
    pub fields: sqlx::types::Json<BTreeMap<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<AccountRow> for LocalAccount {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            fields: row.fields.0,
            persisted: true,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
