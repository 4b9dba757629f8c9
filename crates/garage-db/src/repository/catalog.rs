//! # Catalog Repository
//!
//! Parts inventory and the task list.
//!
//! ## Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Stock changes go through the core Part methods, then one versioned   │
//! │  UPDATE:                                                               │
//! │                                                                         │
//! │    load part (v3, qty 5) ──► part.consume(2) ──► qty 3                  │
//! │                                                    │                    │
//! │    UPDATE parts SET quantity = 3, version = 4                           │
//! │    WHERE id = ? AND version = 3                                         │
//! │                                                                         │
//! │  A concurrent sale that already moved the row to v4 makes this write  │
//! │  fail with ConcurrentModification instead of overselling.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::{ensure_updated, soft_delete, MetaRow};
use crate::error::{DbError, DbResult};
use garage_core::catalog::{Catalog, Part, Task};
use garage_core::Money;

#[derive(Debug, sqlx::FromRow)]
struct PartRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    code: String,
    name: String,
    manufacturer: String,
    vehicle_type: String,
    years: String,
    price: Money,
    quantity: i64,
    low_level_threshold: i64,
}

impl From<PartRow> for Part {
    fn from(row: PartRow) -> Self {
        Part {
            meta: row.meta.into(),
            name: row.name,
            manufacturer: row.manufacturer,
            vehicle_type: row.vehicle_type,
            years: row.years,
            price: row.price,
            code: row.code,
            quantity: row.quantity,
            low_level_threshold: row.low_level_threshold,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    task_number: i64,
    description: String,
    estimated_secs: i64,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            meta: row.meta.into(),
            task_number: row.task_number,
            description: row.description,
            estimated_secs: row.estimated_secs,
        }
    }
}

const PART_COLUMNS: &str = "id, code, name, manufacturer, vehicle_type, years, price, quantity, \
     low_level_threshold, created_at, updated_at, deleted_at, version";

const TASK_COLUMNS: &str =
    "id, task_number, description, estimated_secs, created_at, updated_at, deleted_at, version";

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Parts
    // =========================================================================

    pub async fn insert_part(&self, part: &Part) -> DbResult<()> {
        debug!(id = %part.meta.id, code = %part.code, "Inserting part");

        sqlx::query(
            r#"
            INSERT INTO parts (
                id, code, name, manufacturer, vehicle_type, years,
                price, quantity, low_level_threshold,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&part.meta.id)
        .bind(&part.code)
        .bind(&part.name)
        .bind(&part.manufacturer)
        .bind(&part.vehicle_type)
        .bind(&part.years)
        .bind(part.price)
        .bind(part.quantity)
        .bind(part.low_level_threshold)
        .bind(part.meta.created_at)
        .bind(part.meta.updated_at)
        .bind(part.meta.deleted_at)
        .bind(part.meta.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Looks a part up by id, tombstoned or not.
    pub(crate) async fn fetch_part(conn: &mut SqliteConnection, id: &str) -> DbResult<Part> {
        let row: Option<PartRow> =
            sqlx::query_as(&format!("SELECT {PART_COLUMNS} FROM parts WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        row.map(Part::from)
            .ok_or_else(|| DbError::not_found("Part", id))
    }

    pub async fn get_part(&self, id: &str) -> DbResult<Part> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_part(&mut conn, id).await
    }

    pub async fn get_part_by_code(&self, code: &str) -> DbResult<Option<Part>> {
        let row: Option<PartRow> = sqlx::query_as(&format!(
            "SELECT {PART_COLUMNS} FROM parts WHERE code = ?1 AND deleted_at IS NULL"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Part::from))
    }

    /// Writes a part back with a version check and bumps the caller's copy.
    pub(crate) async fn save_part(conn: &mut SqliteConnection, part: &mut Part) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE parts SET
                name = ?3, manufacturer = ?4, vehicle_type = ?5, years = ?6,
                price = ?7, quantity = ?8, low_level_threshold = ?9,
                updated_at = ?10, version = version + 1
            WHERE id = ?1 AND version = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(&part.meta.id)
        .bind(part.meta.version)
        .bind(&part.name)
        .bind(&part.manufacturer)
        .bind(&part.vehicle_type)
        .bind(&part.years)
        .bind(part.price)
        .bind(part.quantity)
        .bind(part.low_level_threshold)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        ensure_updated(conn, result, "parts", "Part", &part.meta).await?;
        part.meta.bump(now);
        Ok(())
    }

    pub async fn update_part(&self, part: &mut Part) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::save_part(&mut conn, part).await
    }

    /// Takes `qty` from stock. Fails with `InsufficientStock` when short.
    pub(crate) async fn consume_stock(
        conn: &mut SqliteConnection,
        part_id: &str,
        qty: i64,
    ) -> DbResult<Part> {
        let mut part = Self::fetch_part(conn, part_id).await?;
        part.consume(qty)?;
        Self::save_part(conn, &mut part).await?;

        if part.is_low_stock() {
            warn!(code = %part.code, quantity = part.quantity, "Part at or below reorder level");
        }
        Ok(part)
    }

    pub(crate) async fn restock(conn: &mut SqliteConnection, part_id: &str, qty: i64) -> DbResult<Part> {
        let mut part = Self::fetch_part(conn, part_id).await?;
        part.restock(qty)?;
        Self::save_part(conn, &mut part).await?;
        Ok(part)
    }

    /// Overwrites the quantity after a stock take.
    pub async fn set_stock(&self, part_id: &str, qty: i64) -> DbResult<Part> {
        let mut conn = self.pool.acquire().await?;
        let mut part = Self::fetch_part(&mut conn, part_id).await?;
        let before = part.quantity;
        part.set_quantity(qty)?;
        Self::save_part(&mut conn, &mut part).await?;

        info!(code = %part.code, before, after = qty, "Stock level set");
        Ok(part)
    }

    pub async fn delete_part(&self, id: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        soft_delete(&mut conn, "parts", "Part", id).await
    }

    /// Live parts at or below their reorder threshold, by code.
    pub async fn low_stock(&self) -> DbResult<Vec<Part>> {
        let rows: Vec<PartRow> = sqlx::query_as(&format!(
            "SELECT {PART_COLUMNS} FROM parts \
             WHERE deleted_at IS NULL AND quantity <= low_level_threshold \
             ORDER BY code"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Part::from).collect())
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub async fn insert_task(&self, task: &Task) -> DbResult<()> {
        debug!(id = %task.meta.id, task_number = task.task_number, "Inserting task");

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, task_number, description, estimated_secs,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&task.meta.id)
        .bind(task.task_number)
        .bind(&task.description)
        .bind(task.estimated_secs)
        .bind(task.meta.created_at)
        .bind(task.meta.updated_at)
        .bind(task.meta.deleted_at)
        .bind(task.meta.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_task(&self, id: &str) -> DbResult<Task> {
        let row: Option<TaskRow> =
            sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Task::from)
            .ok_or_else(|| DbError::not_found("Task", id))
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    /// Loads every part and task, tombstoned ones included, so historical
    /// jobs still price.
    pub(crate) async fn load(conn: &mut SqliteConnection) -> DbResult<Catalog> {
        let parts: Vec<PartRow> = sqlx::query_as(&format!("SELECT {PART_COLUMNS} FROM parts"))
            .fetch_all(&mut *conn)
            .await?;
        let tasks: Vec<TaskRow> = sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks"))
            .fetch_all(&mut *conn)
            .await?;

        let mut catalog = Catalog::from_parts(parts.into_iter().map(Part::from));
        for task in tasks {
            catalog.insert_task(task.into());
        }
        debug!(parts = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    pub async fn snapshot(&self) -> DbResult<Catalog> {
        let mut conn = self.pool.acquire().await?;
        Self::load(&mut conn).await
    }
}
