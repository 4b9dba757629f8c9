//! Reporting service: loads everything dated on or after the period start,
//! then hands it to the core aggregators.

use chrono::{NaiveTime, TimeZone, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::repository::catalog::CatalogRepository;
use crate::repository::job::JobRepository;
use crate::repository::order::OrderRepository;
use crate::repository::vehicle::VehicleRepository;
use garage_core::report::{self, AggregateResult, ReportData, ReportFilter, ReportKind, ReportPeriod};

#[derive(Debug, Clone)]
pub struct ReportingService {
    pool: SqlitePool,
}

impl ReportingService {
    pub fn new(pool: SqlitePool) -> Self {
        ReportingService { pool }
    }

    /// Runs one report.
    ///
    /// Activity after `period.end` is loaded too: the stock report needs it
    /// to work opening stock back from today's quantities.
    ///
    /// ## When This Occurs
    /// `Core(DivisionGuard)` for a response-rate report over a period with
    /// no MOT reminders.
    pub async fn run_report(
        &self,
        kind: ReportKind,
        period: &ReportPeriod,
        filter: &ReportFilter,
    ) -> DbResult<AggregateResult> {
        let mut conn = self.pool.acquire().await?;
        let since = Utc.from_utc_datetime(&period.start.and_time(NaiveTime::default()));

        let data = ReportData {
            jobs: JobRepository::booked_since(&mut conn, since).await?,
            mechanics: JobRepository::all_mechanics(&mut conn).await?,
            catalog: CatalogRepository::load(&mut conn).await?,
            job_customers: JobRepository::customer_kinds_since(&mut conn, since).await?,
            parts_orders: OrderRepository::parts_orders_since(&mut conn, period.start).await?,
            supplier_orders: OrderRepository::supplier_orders_since(&mut conn, period.start).await?,
            mot_reminders: VehicleRepository::mot_reminders_since(&mut conn, period.start).await?,
        };

        let result = report::run(kind, period, filter, &data)?;
        info!(?kind, period = %period.label(), jobs = data.jobs.len(), "Report generated");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::job::tests::workshop;
    use crate::repository::test_support::db;
    use chrono::{DateTime, NaiveDate};
    use garage_core::job::{Job, JobPart, JobTask};
    use garage_core::vehicle::MotReminder;
    use garage_core::{CoreError, JobType, WorkStatus};

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn at(m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, m, d, 10, 0, 0).unwrap()
    }

    fn march() -> ReportPeriod {
        ReportPeriod::new(day(3, 1), day(3, 31)).unwrap()
    }

    #[tokio::test]
    async fn test_empty_database_reports_zero_averages() {
        let db = db().await;
        let result = db
            .reporting()
            .run_report(ReportKind::Price, &march(), &ReportFilter::default())
            .await
            .unwrap();
        match result {
            AggregateResult::Price(report) => {
                assert_eq!(report.job_count, 0);
                assert!(report.by_mechanic.is_empty());
                assert_eq!(report.average_total.pence(), 0);
            }
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_response_rate_guard_and_value() {
        let db = db().await;
        let w = workshop(&db).await;
        let reporting = db.reporting();

        let err = reporting
            .run_report(ReportKind::ResponseRate, &march(), &ReportFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::DivisionGuard { .. })));

        for d in 1..=4 {
            db.vehicles()
                .insert_mot_reminder(&MotReminder::new(&w.vehicle.meta.id, day(3, d), day(4, d)))
                .await
                .unwrap();
        }
        let mut mot = Job::new(1, &w.vehicle.meta.id, JobType::Mot, at(3, 20));
        db.jobs().insert(&mut mot).await.unwrap();

        let result = reporting
            .run_report(ReportKind::ResponseRate, &march(), &ReportFilter::default())
            .await
            .unwrap();
        match result {
            AggregateResult::ResponseRate(r) => {
                assert_eq!(r.mot_reminders_sent, 4);
                assert_eq!(r.mot_jobs, 1);
                assert_eq!(r.response_rate.bps(), 2_500);
            }
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stock_report_works_back_from_current_quantity() {
        let db = db().await;
        let w = workshop(&db).await;

        // Part starts at 4. One used in March, one in April.
        let mut march_job = Job::new(1, &w.vehicle.meta.id, JobType::Repair, at(3, 10));
        march_job.parts.push(JobPart::new(&w.part.meta.id, 1).unwrap());
        db.jobs().insert(&mut march_job).await.unwrap();
        let mut april_job = Job::new(2, &w.vehicle.meta.id, JobType::Repair, at(4, 10));
        april_job.parts.push(JobPart::new(&w.part.meta.id, 1).unwrap());
        db.jobs().insert(&mut april_job).await.unwrap();

        let result = db
            .reporting()
            .run_report(ReportKind::SparePartsStock, &march(), &ReportFilter::default())
            .await
            .unwrap();
        match result {
            AggregateResult::SparePartsStock(report) => {
                let row = &report.rows[0];
                assert_eq!(row.initial_stock, 4);
                assert_eq!(row.used, 1);
                assert_eq!(row.new_stock, 3);
            }
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_time_report_counts_completed_jobs() {
        let db = db().await;
        let w = workshop(&db).await;

        let mut job = Job::new(1, &w.vehicle.meta.id, JobType::Annual, at(3, 12));
        job.mechanic_id = Some(w.mechanic.meta.id.clone());
        let mut task = JobTask::new(&w.task.meta.id);
        task.status = WorkStatus::Complete;
        task.duration_secs = Some(5_400);
        job.tasks.push(task);
        job.update_status();
        db.jobs().insert(&mut job).await.unwrap();

        let result = db
            .reporting()
            .run_report(ReportKind::Time, &march(), &ReportFilter::default())
            .await
            .unwrap();
        assert_eq!(result.kind(), ReportKind::Time);
        match result {
            AggregateResult::Time(report) => {
                assert_eq!(report.job_count, 1);
                assert_eq!(report.average.hundredths(), 150);
                assert_eq!(report.by_mechanic[0].mechanic_id, w.mechanic.meta.id);
            }
            other => panic!("unexpected report {other:?}"),
        }
    }
}
