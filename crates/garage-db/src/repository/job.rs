//! # Job Repository
//!
//! Mechanics, jobs and the task/part joins hanging off each job.
//!
//! ## Part Allocation
//! ```text
//! allocate_part(job, part, qty)
//!      │
//!      ├─ stock ≥ qty ─► consume stock, join.sufficient_quantity = true
//!      │
//!      └─ stock < qty ─► stock untouched, join.sufficient_quantity = false
//!                        (flagged for reorder, job can still be priced)
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::catalog::CatalogRepository;
use super::{ensure_updated, soft_delete, MetaRow};
use crate::error::{DbError, DbResult};
use garage_core::job::{Job, JobPart, JobTask, Mechanic};
use garage_core::{CustomerKind, JobType, Money, WorkStatus};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct MechanicRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    forename: String,
    surname: String,
    hourly_pay: Money,
}

impl From<MechanicRow> for Mechanic {
    fn from(row: MechanicRow) -> Self {
        Mechanic {
            meta: row.meta.into(),
            forename: row.forename,
            surname: row.surname,
            hourly_pay: row.hourly_pay,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    job_number: i64,
    vehicle_id: String,
    mechanic_id: Option<String>,
    job_type: JobType,
    booked_at: DateTime<Utc>,
    work_carried_out: String,
}

#[derive(Debug, sqlx::FromRow)]
struct JobTaskRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    task_id: String,
    status: WorkStatus,
    duration_secs: Option<i64>,
}

impl From<JobTaskRow> for JobTask {
    fn from(row: JobTaskRow) -> Self {
        JobTask {
            meta: row.meta.into(),
            task_id: row.task_id,
            status: row.status,
            duration_secs: row.duration_secs,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobPartRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    part_id: String,
    quantity: i64,
    sufficient_quantity: bool,
}

impl From<JobPartRow> for JobPart {
    fn from(row: JobPartRow) -> Self {
        JobPart {
            meta: row.meta.into(),
            part_id: row.part_id,
            quantity: row.quantity,
            sufficient_quantity: row.sufficient_quantity,
        }
    }
}

const JOB_COLUMNS: &str = "id, job_number, vehicle_id, mechanic_id, job_type, booked_at, \
     work_carried_out, created_at, updated_at, deleted_at, version";

const MECHANIC_COLUMNS: &str =
    "id, forename, surname, hourly_pay, created_at, updated_at, deleted_at, version";

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        JobRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Mechanics
    // -------------------------------------------------------------------------

    pub async fn insert_mechanic(&self, mechanic: &Mechanic) -> DbResult<()> {
        debug!(id = %mechanic.meta.id, name = %mechanic.full_name(), "Inserting mechanic");

        sqlx::query(
            r#"
            INSERT INTO mechanics (
                id, forename, surname, hourly_pay,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&mechanic.meta.id)
        .bind(&mechanic.forename)
        .bind(&mechanic.surname)
        .bind(mechanic.hourly_pay)
        .bind(mechanic.meta.created_at)
        .bind(mechanic.meta.updated_at)
        .bind(mechanic.meta.deleted_at)
        .bind(mechanic.meta.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub(crate) async fn fetch_mechanic(conn: &mut SqliteConnection, id: &str) -> DbResult<Mechanic> {
        let row: Option<MechanicRow> =
            sqlx::query_as(&format!("SELECT {MECHANIC_COLUMNS} FROM mechanics WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        row.map(Mechanic::from)
            .ok_or_else(|| DbError::not_found("Mechanic", id))
    }

    pub async fn get_mechanic(&self, id: &str) -> DbResult<Mechanic> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_mechanic(&mut conn, id).await
    }

    /// Every mechanic, former staff included, so old jobs still report.
    pub(crate) async fn all_mechanics(conn: &mut SqliteConnection) -> DbResult<Vec<Mechanic>> {
        let rows: Vec<MechanicRow> = sqlx::query_as(&format!(
            "SELECT {MECHANIC_COLUMNS} FROM mechanics ORDER BY surname, forename"
        ))
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(Mechanic::from).collect())
    }

    pub async fn list_mechanics(&self) -> DbResult<Vec<Mechanic>> {
        let mut conn = self.pool.acquire().await?;
        let mechanics = Self::all_mechanics(&mut conn).await?;
        Ok(mechanics.into_iter().filter(|m| m.meta.is_live()).collect())
    }

    pub async fn delete_mechanic(&self, id: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        soft_delete(&mut conn, "mechanics", "Mechanic", id).await
    }

    // -------------------------------------------------------------------------
    // Jobs
    // -------------------------------------------------------------------------

    /// Inserts a job with its joins. Part joins are allocated against stock
    /// and their `sufficient_quantity` flags updated on the caller's copy.
    /// The stored status is recomputed from the task joins.
    pub async fn insert(&self, job: &mut Job) -> DbResult<()> {
        job.update_status();
        debug!(id = %job.meta.id, job_number = job.job_number, job_type = %job.job_type, "Inserting job");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, job_number, vehicle_id, mechanic_id, job_type, status,
                booked_at, work_carried_out,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&job.meta.id)
        .bind(job.job_number)
        .bind(&job.vehicle_id)
        .bind(&job.mechanic_id)
        .bind(job.job_type)
        .bind(job.status())
        .bind(job.booked_at)
        .bind(&job.work_carried_out)
        .bind(job.meta.created_at)
        .bind(job.meta.updated_at)
        .bind(job.meta.deleted_at)
        .bind(job.meta.version)
        .execute(&mut *tx)
        .await?;

        for join in &job.tasks {
            insert_task_join(&mut tx, &job.meta.id, join).await?;
        }
        for join in &mut job.parts {
            join.sufficient_quantity = allocate(&mut tx, &join.part_id, join.quantity).await?;
            insert_part_join(&mut tx, &job.meta.id, join).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Loads a live job and all of its joins.
    pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Job> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        let row = row.ok_or_else(|| DbError::not_found("Job", id))?;
        with_joins(conn, row).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Job> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    pub async fn get_by_number(&self, job_number: i64) -> DbResult<Job> {
        let mut conn = self.pool.acquire().await?;
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM jobs WHERE job_number = ?1 AND deleted_at IS NULL")
                .bind(job_number)
                .fetch_optional(&mut *conn)
                .await?;
        let id = id.ok_or_else(|| DbError::not_found("Job", job_number.to_string()))?;
        Self::fetch(&mut conn, &id).await
    }

    /// Versioned write of the job's own columns. Joins are written
    /// separately, so the caller's task list is reloaded from storage and
    /// the stored status recomputed from it.
    pub(crate) async fn save(conn: &mut SqliteConnection, job: &mut Job) -> DbResult<()> {
        job.tasks = load_tasks(conn, &job.meta.id).await?;
        job.update_status();
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                mechanic_id = ?3, status = ?4, work_carried_out = ?5,
                updated_at = ?6, version = version + 1
            WHERE id = ?1 AND version = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(&job.meta.id)
        .bind(job.meta.version)
        .bind(&job.mechanic_id)
        .bind(job.status())
        .bind(&job.work_carried_out)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        ensure_updated(conn, result, "jobs", "Job", &job.meta).await?;
        job.meta.bump(now);
        Ok(())
    }

    pub async fn update(&self, job: &mut Job) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::save(&mut conn, job).await
    }

    pub async fn assign_mechanic(&self, job_id: &str, mechanic_id: &str) -> DbResult<Job> {
        let mut tx = self.pool.begin().await?;
        Self::fetch_mechanic(&mut tx, mechanic_id).await?;
        let mut job = Self::fetch(&mut tx, job_id).await?;
        job.mechanic_id = Some(mechanic_id.to_string());
        Self::save(&mut tx, &mut job).await?;
        tx.commit().await?;

        info!(job_number = job.job_number, mechanic = %mechanic_id, "Mechanic assigned");
        Ok(job)
    }

    /// Adds a task from the task list to a job.
    pub async fn add_task(&self, job_id: &str, task_id: &str) -> DbResult<JobTask> {
        let join = JobTask::new(task_id);
        let mut conn = self.pool.acquire().await?;
        insert_task_join(&mut conn, job_id, &join).await?;
        Ok(join)
    }

    /// Records progress on one task and recomputes the job's status, in one
    /// transaction.
    pub async fn record_task(
        &self,
        job_id: &str,
        join_id: &str,
        status: WorkStatus,
        duration_secs: Option<i64>,
    ) -> DbResult<Job> {
        let mut tx = self.pool.begin().await?;
        let mut job = Self::fetch(&mut tx, job_id).await?;

        let join = job
            .tasks
            .iter_mut()
            .find(|t| t.meta.id == join_id && t.meta.is_live())
            .ok_or_else(|| DbError::not_found("JobTask", join_id))?;
        join.status = status;
        join.duration_secs = duration_secs;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE job_tasks SET
                status = ?3, duration_secs = ?4,
                updated_at = ?5, version = version + 1
            WHERE id = ?1 AND version = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(&join.meta.id)
        .bind(join.meta.version)
        .bind(join.status)
        .bind(join.duration_secs)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        ensure_updated(&mut tx, result, "job_tasks", "JobTask", &join.meta).await?;
        join.meta.bump(now);

        let before = job.status();
        let after = job.update_status();
        Self::save(&mut tx, &mut job).await?;
        tx.commit().await?;

        if before != after {
            info!(job_number = job.job_number, from = ?before, to = ?after, "Job status changed");
        }
        Ok(job)
    }

    /// Uses `qty` of a part on a job.
    pub async fn allocate_part(&self, job_id: &str, part_id: &str, qty: i64) -> DbResult<JobPart> {
        let mut join = JobPart::new(part_id, qty)?;
        let mut tx = self.pool.begin().await?;
        join.sufficient_quantity = allocate(&mut tx, part_id, qty).await?;
        insert_part_join(&mut tx, job_id, &join).await?;
        tx.commit().await?;
        Ok(join)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        soft_delete(&mut conn, "jobs", "Job", id).await
    }

    /// Live jobs booked at or after `since`, with joins.
    pub(crate) async fn booked_since(
        conn: &mut SqliteConnection,
        since: DateTime<Utc>,
    ) -> DbResult<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE deleted_at IS NULL AND booked_at >= ?1 ORDER BY booked_at"
        ))
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            jobs.push(with_joins(conn, row).await?);
        }
        Ok(jobs)
    }

    /// Kind of the customer owning each live job's vehicle, for jobs booked
    /// at or after `since`.
    pub(crate) async fn customer_kinds_since(
        conn: &mut SqliteConnection,
        since: DateTime<Utc>,
    ) -> DbResult<HashMap<String, CustomerKind>> {
        let rows: Vec<(String, CustomerKind)> = sqlx::query_as(
            r#"
            SELECT j.id, c.kind
            FROM jobs j
            JOIN vehicles v ON v.id = j.vehicle_id
            JOIN customers c ON c.id = v.customer_id
            WHERE j.deleted_at IS NULL AND j.booked_at >= ?1
            "#,
        )
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Highest job number in use, or 0.
    pub async fn last_job_number(&self) -> DbResult<i64> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(job_number) FROM jobs")
            .fetch_one(&self.pool)
            .await?;
        Ok(max.unwrap_or(0))
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn load_tasks(conn: &mut SqliteConnection, job_id: &str) -> DbResult<Vec<JobTask>> {
    let rows: Vec<JobTaskRow> = sqlx::query_as(
        r#"
        SELECT id, task_id, status, duration_secs,
               created_at, updated_at, deleted_at, version
        FROM job_tasks WHERE job_id = ?1 ORDER BY created_at
        "#,
    )
    .bind(job_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(JobTask::from).collect())
}

/// Status is never read back from the `jobs` row; it is rebuilt from the
/// task joins.
async fn with_joins(conn: &mut SqliteConnection, row: JobRow) -> DbResult<Job> {
    let tasks = load_tasks(conn, &row.meta.id).await?;

    let parts: Vec<JobPartRow> = sqlx::query_as(
        r#"
        SELECT id, part_id, quantity, sufficient_quantity,
               created_at, updated_at, deleted_at, version
        FROM job_parts WHERE job_id = ?1 ORDER BY created_at
        "#,
    )
    .bind(&row.meta.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut job = Job::new(row.job_number, &row.vehicle_id, row.job_type, row.booked_at);
    job.meta = row.meta.into();
    job.mechanic_id = row.mechanic_id;
    job.work_carried_out = row.work_carried_out;
    job.tasks = tasks;
    job.parts = parts.into_iter().map(JobPart::from).collect();
    job.update_status();
    Ok(job)
}

/// Takes stock when it covers `qty`. Returns whether it did.
async fn allocate(conn: &mut SqliteConnection, part_id: &str, qty: i64) -> DbResult<bool> {
    let part = CatalogRepository::fetch_part(conn, part_id).await?;
    if part.quantity < qty {
        warn!(code = %part.code, available = part.quantity, requested = qty, "Insufficient stock for job");
        return Ok(false);
    }
    CatalogRepository::consume_stock(conn, part_id, qty).await?;
    Ok(true)
}

async fn insert_task_join(conn: &mut SqliteConnection, job_id: &str, join: &JobTask) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO job_tasks (
            id, job_id, task_id, status, duration_secs,
            created_at, updated_at, deleted_at, version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&join.meta.id)
    .bind(job_id)
    .bind(&join.task_id)
    .bind(join.status)
    .bind(join.duration_secs)
    .bind(join.meta.created_at)
    .bind(join.meta.updated_at)
    .bind(join.meta.deleted_at)
    .bind(join.meta.version)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_part_join(conn: &mut SqliteConnection, job_id: &str, join: &JobPart) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO job_parts (
            id, job_id, part_id, quantity, sufficient_quantity,
            created_at, updated_at, deleted_at, version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&join.meta.id)
    .bind(job_id)
    .bind(&join.part_id)
    .bind(join.quantity)
    .bind(join.sufficient_quantity)
    .bind(join.meta.created_at)
    .bind(join.meta.updated_at)
    .bind(join.meta.deleted_at)
    .bind(join.meta.version)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pool::Database;
    use crate::repository::test_support::db;
    use chrono::TimeZone;
    use garage_core::catalog::{Part, Task};
    use garage_core::customer::{Contact, Customer};
    use garage_core::vehicle::Vehicle;
    use garage_core::report::{AggregateResult, ReportFilter, ReportKind, ReportPeriod};
    use garage_core::{EntityMeta, VehicleType};

    /// A drop-in customer with one car, a mechanic, a task and a part.
    pub(crate) struct Workshop {
        pub vehicle: Vehicle,
        pub mechanic: Mechanic,
        pub task: Task,
        pub part: Part,
    }

    pub(crate) async fn workshop(db: &Database) -> Workshop {
        let customer = Customer::dropin(Contact::new("Sam", "Lee"));
        db.customers().insert(&customer).await.unwrap();
        let vehicle =
            Vehicle::new("AB12 CDE", "Ford", "Fiesta", VehicleType::Car, &customer.meta.id).unwrap();
        db.vehicles().insert(&vehicle).await.unwrap();

        let mechanic = Mechanic::new("Jo", "Bloggs", Money::from_pence(10_000)).unwrap();
        db.jobs().insert_mechanic(&mechanic).await.unwrap();

        let task = Task {
            meta: EntityMeta::new(),
            task_number: 1,
            description: "Replace brake pads".to_string(),
            estimated_secs: 3_600,
        };
        db.catalog().insert_task(&task).await.unwrap();

        let part = Part::new("BRK-1", "Brake pads", Money::from_pence(2_000), 4, 1).unwrap();
        db.catalog().insert_part(&part).await.unwrap();

        Workshop {
            vehicle,
            mechanic,
            task,
            part,
        }
    }

    fn booked() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_insert_allocates_stock() {
        let db = db().await;
        let w = workshop(&db).await;

        let mut job = Job::new(1, &w.vehicle.meta.id, JobType::Repair, booked());
        job.tasks.push(JobTask::new(&w.task.meta.id));
        job.parts.push(JobPart::new(&w.part.meta.id, 3).unwrap());
        job.parts.push(JobPart::new(&w.part.meta.id, 3).unwrap());
        db.jobs().insert(&mut job).await.unwrap();

        assert!(job.parts[0].sufficient_quantity);
        assert!(!job.parts[1].sufficient_quantity);
        assert_eq!(db.catalog().get_part(&w.part.meta.id).await.unwrap().quantity, 1);

        let loaded = db.jobs().get_by_number(1).await.unwrap();
        assert_eq!(loaded.tasks.len(), 1);
        assert!(!loaded.has_sufficient_parts());
    }

    #[tokio::test]
    async fn test_record_task_drives_status() {
        let db = db().await;
        let w = workshop(&db).await;
        let repo = db.jobs();

        let mut job = Job::new(7, &w.vehicle.meta.id, JobType::Repair, booked());
        db.jobs().insert(&mut job).await.unwrap();
        let first = repo.add_task(&job.meta.id, &w.task.meta.id).await.unwrap();
        let second = repo.add_task(&job.meta.id, &w.task.meta.id).await.unwrap();

        let job = repo
            .record_task(&job.meta.id, &first.meta.id, WorkStatus::Complete, Some(1_800))
            .await
            .unwrap();
        assert_eq!(job.status(), WorkStatus::Started);

        let job = repo
            .record_task(&job.meta.id, &second.meta.id, WorkStatus::Complete, Some(3_600))
            .await
            .unwrap();
        assert!(job.is_complete());
        assert_eq!(job.duration().hundredths(), 150);
        assert_eq!(job.meta.version, 2);
    }

    async fn stored_status(db: &Database, job_id: &str) -> WorkStatus {
        sqlx::query_scalar("SELECT status FROM jobs WHERE id = ?1")
            .bind(job_id)
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_pending_task_keeps_job_open() {
        let db = db().await;
        let w = workshop(&db).await;
        let repo = db.jobs();

        let mut job = Job::new(4, &w.vehicle.meta.id, JobType::Repair, booked());
        job.mechanic_id = Some(w.mechanic.meta.id.clone());
        job.tasks.push(JobTask::new(&w.task.meta.id));
        repo.insert(&mut job).await.unwrap();
        assert_eq!(stored_status(&db, &job.meta.id).await, WorkStatus::Pending);

        // Completing the task only on this copy does not reach the join row.
        job.tasks[0].status = WorkStatus::Complete;
        job.tasks[0].duration_secs = Some(3_600);
        job.update_status();
        assert!(job.is_complete());
        repo.update(&mut job).await.unwrap();

        assert_eq!(job.status(), WorkStatus::Pending);
        assert_eq!(stored_status(&db, &job.meta.id).await, WorkStatus::Pending);
        assert!(!repo.get_by_id(&job.meta.id).await.unwrap().is_complete());

        let period = ReportPeriod::new(booked().date_naive(), booked().date_naive()).unwrap();
        let result = db
            .reporting()
            .run_report(ReportKind::Time, &period, &ReportFilter::default())
            .await
            .unwrap();
        match result {
            AggregateResult::Time(report) => assert_eq!(report.job_count, 0),
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deleted_job_is_not_found() {
        let db = db().await;
        let w = workshop(&db).await;
        let repo = db.jobs();

        let mut job = Job::new(5, &w.vehicle.meta.id, JobType::Mot, booked());
        repo.insert(&mut job).await.unwrap();
        repo.delete(&job.meta.id).await.unwrap();

        assert!(repo.get_by_id(&job.meta.id).await.unwrap_err().is_not_found());
        assert!(repo.get_by_number(5).await.unwrap_err().is_not_found());
        assert!(repo
            .assign_mechanic(&job.meta.id, &w.mechanic.meta.id)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_assign_mechanic_and_unknown_mechanic() {
        let db = db().await;
        let w = workshop(&db).await;
        let repo = db.jobs();

        let mut job = Job::new(3, &w.vehicle.meta.id, JobType::Mot, booked());
        repo.insert(&mut job).await.unwrap();

        let job = repo.assign_mechanic(&job.meta.id, &w.mechanic.meta.id).await.unwrap();
        assert_eq!(job.mechanic_id.as_deref(), Some(w.mechanic.meta.id.as_str()));
        assert!(repo
            .assign_mechanic(&job.meta.id, "ghost")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_booked_since_and_customer_kinds() {
        let db = db().await;
        let w = workshop(&db).await;
        let repo = db.jobs();

        let mut old = Job::new(1, &w.vehicle.meta.id, JobType::Mot, booked() - chrono::Duration::days(60));
        let mut new = Job::new(2, &w.vehicle.meta.id, JobType::Annual, booked());
        repo.insert(&mut old).await.unwrap();
        repo.insert(&mut new).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let since = booked() - chrono::Duration::days(1);
        let jobs = JobRepository::booked_since(&mut conn, since).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_number, 2);

        let kinds = JobRepository::customer_kinds_since(&mut conn, since).await.unwrap();
        assert_eq!(kinds.get(&new.meta.id), Some(&CustomerKind::Dropin));
        drop(conn);

        assert_eq!(repo.last_job_number().await.unwrap(), 2);
    }
}
