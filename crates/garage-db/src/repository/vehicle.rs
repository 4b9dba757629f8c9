//! Vehicle and MOT reminder storage.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{ensure_updated, soft_delete, MetaRow};
use crate::error::{DbError, DbResult};
use garage_core::vehicle::{MotReminder, Vehicle};
use garage_core::VehicleType;

#[derive(Debug, sqlx::FromRow)]
struct VehicleRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    reg_number: String,
    make: String,
    model: String,
    engine_serial: String,
    chassis_number: String,
    colour: String,
    vehicle_type: VehicleType,
    mot_base_date: Option<NaiveDate>,
    customer_id: String,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Vehicle {
            meta: row.meta.into(),
            reg_number: row.reg_number,
            make: row.make,
            model: row.model,
            engine_serial: row.engine_serial,
            chassis_number: row.chassis_number,
            colour: row.colour,
            vehicle_type: row.vehicle_type,
            mot_base_date: row.mot_base_date,
            customer_id: row.customer_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MotReminderRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    vehicle_id: String,
    issue_date: NaiveDate,
    renewal_test_date: NaiveDate,
}

impl From<MotReminderRow> for MotReminder {
    fn from(row: MotReminderRow) -> Self {
        MotReminder {
            meta: row.meta.into(),
            vehicle_id: row.vehicle_id,
            issue_date: row.issue_date,
            renewal_test_date: row.renewal_test_date,
        }
    }
}

const VEHICLE_COLUMNS: &str = "id, reg_number, make, model, engine_serial, chassis_number, colour, \
     vehicle_type, mot_base_date, customer_id, created_at, updated_at, deleted_at, version";

#[derive(Debug, Clone)]
pub struct VehicleRepository {
    pool: SqlitePool,
}

impl VehicleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VehicleRepository { pool }
    }

    pub async fn insert(&self, vehicle: &Vehicle) -> DbResult<()> {
        debug!(id = %vehicle.meta.id, reg = %vehicle.reg_number, "Inserting vehicle");

        sqlx::query(
            r#"
            INSERT INTO vehicles (
                id, reg_number, make, model, engine_serial, chassis_number, colour,
                vehicle_type, mot_base_date, customer_id,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&vehicle.meta.id)
        .bind(&vehicle.reg_number)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(&vehicle.engine_serial)
        .bind(&vehicle.chassis_number)
        .bind(&vehicle.colour)
        .bind(vehicle.vehicle_type)
        .bind(vehicle.mot_base_date)
        .bind(&vehicle.customer_id)
        .bind(vehicle.meta.created_at)
        .bind(vehicle.meta.updated_at)
        .bind(vehicle.meta.deleted_at)
        .bind(vehicle.meta.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Vehicle> {
        let row: Option<VehicleRow> = sqlx::query_as(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(Vehicle::from)
            .ok_or_else(|| DbError::not_found("Vehicle", id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Vehicle> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    pub async fn get_by_reg(&self, reg_number: &str) -> DbResult<Option<Vehicle>> {
        let row: Option<VehicleRow> = sqlx::query_as(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles \
             WHERE reg_number = ?1 AND deleted_at IS NULL"
        ))
        .bind(reg_number.trim().to_uppercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Vehicle::from))
    }

    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Vehicle>> {
        let rows: Vec<VehicleRow> = sqlx::query_as(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles \
             WHERE customer_id = ?1 AND deleted_at IS NULL ORDER BY reg_number"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Vehicle::from).collect())
    }

    pub async fn update(&self, vehicle: &mut Vehicle) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE vehicles SET
                make = ?3, model = ?4, engine_serial = ?5, chassis_number = ?6,
                colour = ?7, vehicle_type = ?8, mot_base_date = ?9, customer_id = ?10,
                updated_at = ?11, version = version + 1
            WHERE id = ?1 AND version = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(&vehicle.meta.id)
        .bind(vehicle.meta.version)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(&vehicle.engine_serial)
        .bind(&vehicle.chassis_number)
        .bind(&vehicle.colour)
        .bind(vehicle.vehicle_type)
        .bind(vehicle.mot_base_date)
        .bind(&vehicle.customer_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        ensure_updated(&mut conn, result, "vehicles", "Vehicle", &vehicle.meta).await?;
        vehicle.meta.bump(now);
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        soft_delete(&mut conn, "vehicles", "Vehicle", id).await
    }

    // =========================================================================
    // MOT Reminders
    // =========================================================================

    pub async fn insert_mot_reminder(&self, reminder: &MotReminder) -> DbResult<()> {
        debug!(vehicle = %reminder.vehicle_id, renewal = %reminder.renewal_test_date, "Recording MOT reminder");

        sqlx::query(
            r#"
            INSERT INTO mot_reminders (
                id, vehicle_id, issue_date, renewal_test_date,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&reminder.meta.id)
        .bind(&reminder.vehicle_id)
        .bind(reminder.issue_date)
        .bind(reminder.renewal_test_date)
        .bind(reminder.meta.created_at)
        .bind(reminder.meta.updated_at)
        .bind(reminder.meta.deleted_at)
        .bind(reminder.meta.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Live reminders issued on or after `since`.
    pub(crate) async fn mot_reminders_since(
        conn: &mut SqliteConnection,
        since: NaiveDate,
    ) -> DbResult<Vec<MotReminder>> {
        let rows: Vec<MotReminderRow> = sqlx::query_as(
            r#"
            SELECT id, vehicle_id, issue_date, renewal_test_date,
                   created_at, updated_at, deleted_at, version
            FROM mot_reminders
            WHERE deleted_at IS NULL AND issue_date >= ?1
            ORDER BY issue_date
            "#,
        )
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(MotReminder::from).collect())
    }

    pub async fn mot_reminders_for(&self, vehicle_id: &str) -> DbResult<Vec<MotReminder>> {
        let rows: Vec<MotReminderRow> = sqlx::query_as(
            r#"
            SELECT id, vehicle_id, issue_date, renewal_test_date,
                   created_at, updated_at, deleted_at, version
            FROM mot_reminders
            WHERE deleted_at IS NULL AND vehicle_id = ?1
            ORDER BY issue_date
            "#,
        )
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MotReminder::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::db;
    use garage_core::customer::{Contact, Customer};

    async fn owner(db: &crate::pool::Database) -> Customer {
        let customer = Customer::dropin(Contact::new("Sam", "Lee"));
        db.customers().insert(&customer).await.unwrap();
        customer
    }

    #[tokio::test]
    async fn test_vehicle_lookup_by_registration() {
        let db = db().await;
        let customer = owner(&db).await;
        let repo = db.vehicles();

        let van = Vehicle::new("AB12 CDE", "Ford", "Transit", VehicleType::Van, &customer.meta.id)
            .unwrap();
        repo.insert(&van).await.unwrap();

        let found = repo.get_by_reg("ab12 cde").await.unwrap().unwrap();
        assert_eq!(found.meta.id, van.meta.id);
        assert_eq!(found.vehicle_type, VehicleType::Van);
        assert_eq!(repo.list_for_customer(&customer.meta.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deleted_vehicle_is_not_found() {
        let db = db().await;
        let customer = owner(&db).await;
        let repo = db.vehicles();

        let car = Vehicle::new("LM70 PQR", "Kia", "Picanto", VehicleType::Car, &customer.meta.id)
            .unwrap();
        repo.insert(&car).await.unwrap();
        repo.delete(&car.meta.id).await.unwrap();

        assert!(repo.get_by_id(&car.meta.id).await.unwrap_err().is_not_found());
        assert!(repo.get_by_reg("LM70 PQR").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_vehicle_needs_existing_owner() {
        let db = db().await;
        let car = Vehicle::new("XY99 ZZZ", "Mini", "Cooper", VehicleType::Car, "nobody").unwrap();
        assert!(matches!(
            db.vehicles().insert(&car).await,
            Err(DbError::ConstraintViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_and_reminders() {
        let db = db().await;
        let customer = owner(&db).await;
        let repo = db.vehicles();

        let mut car = Vehicle::new("XY99 ZZZ", "Mini", "Cooper", VehicleType::Car, &customer.meta.id)
            .unwrap();
        repo.insert(&car).await.unwrap();
        car.colour = "Red".to_string();
        repo.update(&mut car).await.unwrap();
        assert_eq!(repo.get_by_id(&car.meta.id).await.unwrap().colour, "Red");

        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        repo.insert_mot_reminder(&MotReminder::new(&car.meta.id, d(1, 10), d(2, 10)))
            .await
            .unwrap();
        repo.insert_mot_reminder(&MotReminder::new(&car.meta.id, d(3, 1), d(4, 1)))
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let since = VehicleRepository::mot_reminders_since(&mut conn, d(2, 1)).await.unwrap();
        assert_eq!(since.len(), 1);
        drop(conn);

        assert_eq!(repo.mot_reminders_for(&car.meta.id).await.unwrap().len(), 2);
    }
}
