//! Price control storage: the single live VAT/markup record.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::MetaRow;
use crate::error::DbResult;
use garage_core::catalog::PriceControl;
use garage_core::Percent;

#[derive(Debug, sqlx::FromRow)]
struct PriceControlRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    vat: Percent,
    markup: Percent,
}

impl From<PriceControlRow> for PriceControl {
    fn from(row: PriceControlRow) -> Self {
        PriceControl {
            meta: row.meta.into(),
            vat: row.vat,
            markup: row.markup,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PriceControlRepository {
    pool: SqlitePool,
}

impl PriceControlRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PriceControlRepository { pool }
    }

    pub async fn insert(&self, controls: &PriceControl) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_with(&mut conn, controls).await
    }

    async fn insert_with(conn: &mut SqliteConnection, controls: &PriceControl) -> DbResult<()> {
        debug!(id = %controls.meta.id, vat = %controls.vat, markup = %controls.markup, "Inserting price control");

        sqlx::query(
            r#"
            INSERT INTO price_controls (id, vat, markup, created_at, updated_at, deleted_at, version)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&controls.meta.id)
        .bind(controls.vat)
        .bind(controls.markup)
        .bind(controls.meta.created_at)
        .bind(controls.meta.updated_at)
        .bind(controls.meta.deleted_at)
        .bind(controls.meta.version)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Every non-tombstoned record.
    pub(crate) async fn fetch_live(conn: &mut SqliteConnection) -> DbResult<Vec<PriceControl>> {
        let rows: Vec<PriceControlRow> = sqlx::query_as(
            r#"
            SELECT id, vat, markup, created_at, updated_at, deleted_at, version
            FROM price_controls
            WHERE deleted_at IS NULL
            ORDER BY created_at
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(PriceControl::from).collect())
    }

    /// Resolves the single active record.
    ///
    /// ## When This Occurs
    /// `Core(Configuration)` when zero or several live records exist.
    pub(crate) async fn fetch_active(conn: &mut SqliteConnection) -> DbResult<PriceControl> {
        let records = Self::fetch_live(conn).await?;
        Ok(PriceControl::resolve_active(&records)?.clone())
    }

    pub async fn active(&self) -> DbResult<PriceControl> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_active(&mut conn).await
    }

    /// Tombstones every live record and inserts the new rates, atomically.
    pub async fn replace(&self, vat: Percent, markup: Percent) -> DbResult<PriceControl> {
        let controls = PriceControl::new(vat, markup)?;
        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let retired = sqlx::query(
            r#"
            UPDATE price_controls
            SET deleted_at = ?1, updated_at = ?1, version = version + 1
            WHERE deleted_at IS NULL
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        Self::insert_with(&mut tx, &controls).await?;
        tx.commit().await?;

        info!(retired, vat = %vat, markup = %markup, "Price control replaced");
        Ok(controls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::db;
    use garage_core::CoreError;

    #[tokio::test]
    async fn test_missing_price_control_is_configuration_error() {
        let db = db().await;
        let err = db.price_controls().active().await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_two_live_records_are_ambiguous() {
        let db = db().await;
        let repo = db.price_controls();
        repo.insert(&PriceControl::new(Percent::from_bps(2_000), Percent::from_bps(1_000)).unwrap())
            .await
            .unwrap();
        repo.insert(&PriceControl::new(Percent::from_bps(1_750), Percent::from_bps(1_000)).unwrap())
            .await
            .unwrap();

        assert!(matches!(
            repo.active().await,
            Err(DbError::Core(CoreError::Configuration(_)))
        ));
    }

    #[tokio::test]
    async fn test_replace_leaves_one_active() {
        let db = db().await;
        let repo = db.price_controls();
        repo.insert(&PriceControl::new(Percent::from_bps(1_750), Percent::from_bps(500)).unwrap())
            .await
            .unwrap();

        repo.replace(Percent::from_bps(2_000), Percent::from_bps(1_000))
            .await
            .unwrap();

        let active = repo.active().await.unwrap();
        assert_eq!(active.vat, Percent::from_bps(2_000));
        assert_eq!(active.markup, Percent::from_bps(1_000));
    }
}
