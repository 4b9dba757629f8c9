//! # Repository Module
//!
//! One repository per aggregate, each a thin handle around the pool.
//!
//! ## Connection Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Public methods take &self and acquire from the pool:                   │
//! │                                                                         │
//! │      db.invoices().get_by_id(id).await?                                 │
//! │                                                                         │
//! │  Crate-internal `fetch`/`save` helpers take &mut SqliteConnection so    │
//! │  services can run several of them inside one transaction:              │
//! │                                                                         │
//! │      let mut tx = pool.begin().await?;                                  │
//! │      InvoiceRepository::fetch(&mut tx, id).await?;                      │
//! │      CustomerRepository::save(&mut tx, &mut customer).await?;           │
//! │      tx.commit().await?;                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Versioned Writes
//! Every `UPDATE` is `... SET version = version + 1 WHERE id = ? AND
//! version = ? AND deleted_at IS NULL`. Zero affected rows is resolved by
//! [`ensure_updated`] into `NotFound` or a core `ConcurrentModification`.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteQueryResult;
use sqlx::SqliteConnection;

use crate::error::{DbError, DbResult};
use garage_core::EntityMeta;

pub mod catalog;
pub mod customer;
pub mod invoice;
pub mod job;
pub mod order;
pub mod price_control;
pub mod vehicle;

/// The envelope columns every table carries.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MetaRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl From<MetaRow> for EntityMeta {
    fn from(row: MetaRow) -> Self {
        EntityMeta {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
            version: row.version,
        }
    }
}

/// Turns a zero-row versioned `UPDATE` into the right error.
pub(crate) async fn ensure_updated(
    conn: &mut SqliteConnection,
    result: SqliteQueryResult,
    table: &'static str,
    entity: &'static str,
    meta: &EntityMeta,
) -> DbResult<()> {
    if result.rows_affected() > 0 {
        return Ok(());
    }

    let live: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT version FROM {table} WHERE id = ?1 AND deleted_at IS NULL"
    ))
    .bind(&meta.id)
    .fetch_optional(&mut *conn)
    .await?;

    match live {
        None => Err(DbError::not_found(entity, &meta.id)),
        Some(_) => Err(DbError::stale(entity, &meta.id, meta.version)),
    }
}

/// Tombstones a row. Deleting an already-deleted row is `NotFound`.
pub(crate) async fn soft_delete(
    conn: &mut SqliteConnection,
    table: &'static str,
    entity: &'static str,
    id: &str,
) -> DbResult<()> {
    let now = Utc::now();
    let result = sqlx::query(&format!(
        "UPDATE {table} SET deleted_at = ?2, updated_at = ?2, version = version + 1 \
         WHERE id = ?1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(entity, id));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::pool::{Database, DbConfig};

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }
}
