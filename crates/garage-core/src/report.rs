//! # Reporting Aggregators
//!
//! Batch figures over an inclusive date range. The caller loads a
//! [`ReportData`] snapshot (everything dated on or after the period start)
//! and [`run`] dispatches to the requested aggregator.
//!
//! ## Report Kinds
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────────────────┐
//! │ Price            │ avg labour / avg subtotal, overall and per mechanic  │
//! │ Time             │ avg duration overall, per mechanic, per job type,    │
//! │                  │ per mechanic × job type                              │
//! │ VehicleVolume    │ jobs booked per job type × drop-in / account holder  │
//! │ ResponseRate     │ 100 × MOT jobs / MOT reminders sent                  │
//! │ SparePartsStock  │ initial, used, delivered, new stock and their cost   │
//! └──────────────────┴──────────────────────────────────────────────────────┘
//! ```
//!
//! Price and time figures consider only live, completed jobs. An empty
//! selection averages to zero. The response rate is the one ratio with no
//! zero fallback: no reminders sent is a `DivisionGuard` error.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::job::{Job, Mechanic};
use crate::money::{Hours, Money, Percent};
use crate::order::{CustomerPartsOrder, SupplierOrder};
use crate::pricing::job_cost;
use crate::types::{CustomerKind, JobType};
use crate::vehicle::MotReminder;

// =============================================================================
// Inputs
// =============================================================================

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        if start > end {
            return Err(ValidationError::InvalidFormat {
                field: "period".to_string(),
                reason: format!("start {start} is after end {end}"),
            }
            .into());
        }
        Ok(ReportPeriod { start, end })
    }

    /// The calendar month containing `day`.
    pub fn month_of(day: NaiveDate) -> Self {
        let start = day.with_day(1).unwrap_or(day);
        let next = if start.month() == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
        };
        let end = next.and_then(|d| d.pred_opt()).unwrap_or(day);
        ReportPeriod { start, end }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// `dd/mm/yyyy-dd/mm/yyyy`
    pub fn label(&self) -> String {
        format!("{}-{}", self.start.format("%d/%m/%Y"), self.end.format("%d/%m/%Y"))
    }
}

/// Optional narrowing applied to job-based reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub mechanic_id: Option<String>,
    pub job_type: Option<JobType>,
}

impl ReportFilter {
    fn admits(&self, job: &Job) -> bool {
        self.job_type.map_or(true, |t| t == job.job_type)
            && self
                .mechanic_id
                .as_deref()
                .map_or(true, |id| job.mechanic_id.as_deref() == Some(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Price,
    Time,
    VehicleVolume,
    ResponseRate,
    SparePartsStock,
}

/// Everything the aggregators read, dated on or after the period start.
#[derive(Debug, Clone, Default)]
pub struct ReportData {
    pub jobs: Vec<Job>,
    pub mechanics: Vec<Mechanic>,
    /// Parts with current quantities.
    pub catalog: Catalog,
    /// Kind of the customer owning each job's vehicle, by job id.
    pub job_customers: HashMap<String, CustomerKind>,
    pub parts_orders: Vec<CustomerPartsOrder>,
    pub supplier_orders: Vec<SupplierOrder>,
    pub mot_reminders: Vec<MotReminder>,
}

impl ReportData {
    fn mechanic(&self, id: &str) -> Option<&Mechanic> {
        self.mechanics.iter().find(|m| m.meta.id == id)
    }

    /// Live jobs booked inside `period`.
    fn jobs_in<'a>(&'a self, period: &'a ReportPeriod) -> impl Iterator<Item = &'a Job> + 'a {
        self.jobs
            .iter()
            .filter(move |j| j.meta.is_live() && period.contains(j.booked_at.date_naive()))
    }

    /// Live completed jobs booked inside `period` that pass `filter`.
    fn completed_jobs<'a>(
        &'a self,
        period: &'a ReportPeriod,
        filter: &'a ReportFilter,
    ) -> impl Iterator<Item = &'a Job> + 'a {
        self.jobs_in(period)
            .filter(move |j| j.is_complete() && filter.admits(j))
    }
}

// =============================================================================
// Outputs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MechanicPrice {
    pub mechanic_id: String,
    pub name: String,
    pub job_count: usize,
    pub average_labour: Money,
    pub average_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceReport {
    pub job_count: usize,
    pub average_labour: Money,
    pub average_total: Money,
    pub by_mechanic: Vec<MechanicPrice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTypeTime {
    pub job_type: JobType,
    pub job_count: usize,
    pub average: Hours,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MechanicTime {
    pub mechanic_id: String,
    pub name: String,
    pub job_count: usize,
    pub average: Hours,
    pub by_job_type: Vec<JobTypeTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeReport {
    pub job_count: usize,
    pub average: Hours,
    pub by_job_type: Vec<JobTypeTime>,
    pub by_mechanic: Vec<MechanicTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRow {
    pub job_type: JobType,
    pub dropin: u64,
    pub account_holder: u64,
}

impl VolumeRow {
    pub fn overall(&self) -> u64 {
        self.dropin + self.account_holder
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleVolumeReport {
    pub rows: Vec<VolumeRow>,
}

impl VehicleVolumeReport {
    pub fn dropin_overall(&self) -> u64 {
        self.rows.iter().map(|r| r.dropin).sum()
    }

    pub fn account_holders_overall(&self) -> u64 {
        self.rows.iter().map(|r| r.account_holder).sum()
    }

    pub fn overall(&self) -> u64 {
        self.dropin_overall() + self.account_holders_overall()
    }

    pub fn row(&self, job_type: JobType) -> Option<&VolumeRow> {
        self.rows.iter().find(|r| r.job_type == job_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRateReport {
    pub mot_reminders_sent: u64,
    pub mot_jobs: u64,
    pub response_rate: Percent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRow {
    pub part_id: String,
    pub code: String,
    pub name: String,
    pub initial_stock: i64,
    pub used: i64,
    pub delivered: i64,
    pub new_stock: i64,
    pub initial_cost: Money,
    pub stock_cost: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReport {
    pub rows: Vec<StockRow>,
    pub total_initial_cost: Money,
    pub total_stock_cost: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "report", rename_all = "snake_case")]
pub enum AggregateResult {
    Price(PriceReport),
    Time(TimeReport),
    VehicleVolume(VehicleVolumeReport),
    ResponseRate(ResponseRateReport),
    SparePartsStock(StockReport),
}

impl AggregateResult {
    pub fn kind(&self) -> ReportKind {
        match self {
            AggregateResult::Price(_) => ReportKind::Price,
            AggregateResult::Time(_) => ReportKind::Time,
            AggregateResult::VehicleVolume(_) => ReportKind::VehicleVolume,
            AggregateResult::ResponseRate(_) => ReportKind::ResponseRate,
            AggregateResult::SparePartsStock(_) => ReportKind::SparePartsStock,
        }
    }

    /// Pretty-printed JSON for export.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// =============================================================================
// Aggregators
// =============================================================================

/// Runs one report over `period`.
pub fn run(
    kind: ReportKind,
    period: &ReportPeriod,
    filter: &ReportFilter,
    data: &ReportData,
) -> CoreResult<AggregateResult> {
    Ok(match kind {
        ReportKind::Price => AggregateResult::Price(price_report(period, filter, data)?),
        ReportKind::Time => AggregateResult::Time(time_report(period, filter, data)),
        ReportKind::VehicleVolume => {
            AggregateResult::VehicleVolume(vehicle_volume(period, filter, data))
        }
        ReportKind::ResponseRate => {
            let sent = data
                .mot_reminders
                .iter()
                .filter(|r| r.meta.is_live() && period.contains(r.issue_date))
                .count() as u64;
            let booked = data
                .jobs_in(period)
                .filter(|j| j.job_type == JobType::Mot)
                .count() as u64;
            AggregateResult::ResponseRate(response_rate(sent, booked)?)
        }
        ReportKind::SparePartsStock => {
            AggregateResult::SparePartsStock(stock_report(period, data))
        }
    })
}

/// `100 * mot_jobs / mot_reminders_sent`, rounded to two decimals.
///
/// ## When This Occurs
/// `DivisionGuard` when no reminders were sent.
pub fn response_rate(mot_reminders_sent: u64, mot_jobs: u64) -> CoreResult<ResponseRateReport> {
    let response_rate = Percent::ratio(mot_jobs, mot_reminders_sent)
        .ok_or_else(|| CoreError::division_guard("MOT response rate"))?;
    Ok(ResponseRateReport {
        mot_reminders_sent,
        mot_jobs,
        response_rate,
    })
}

/// Average labour and subtotal of completed jobs.
///
/// Jobs with no mechanic assigned cannot be costed and are left out.
pub fn price_report(
    period: &ReportPeriod,
    filter: &ReportFilter,
    data: &ReportData,
) -> CoreResult<PriceReport> {
    // mechanic id -> (jobs, labour, total)
    let mut per_mechanic: BTreeMap<&str, (usize, Money, Money)> = BTreeMap::new();

    for job in data.completed_jobs(period, filter) {
        let Some(mechanic) = job.mechanic_id.as_deref().and_then(|id| data.mechanic(id)) else {
            continue;
        };
        let cost = job_cost(job, Some(mechanic), &data.catalog)?;
        let entry = per_mechanic
            .entry(mechanic.meta.id.as_str())
            .or_insert((0, Money::zero(), Money::zero()));
        entry.0 += 1;
        entry.1 += cost.labour;
        entry.2 += cost.subtotal;
    }

    let job_count = per_mechanic.values().map(|e| e.0).sum();
    let labour: Money = per_mechanic.values().map(|e| e.1).sum();
    let total: Money = per_mechanic.values().map(|e| e.2).sum();

    let by_mechanic = per_mechanic
        .into_iter()
        .filter_map(|(id, (count, labour, total))| {
            let mechanic = data.mechanic(id)?;
            Some(MechanicPrice {
                mechanic_id: id.to_string(),
                name: mechanic.full_name(),
                job_count: count,
                average_labour: Money::checked_average(labour, count).unwrap_or_default(),
                average_total: Money::checked_average(total, count).unwrap_or_default(),
            })
        })
        .collect();

    Ok(PriceReport {
        job_count,
        average_labour: Money::checked_average(labour, job_count).unwrap_or_default(),
        average_total: Money::checked_average(total, job_count).unwrap_or_default(),
        by_mechanic,
    })
}

fn average_by_type<'a>(jobs: impl Iterator<Item = &'a Job>) -> Vec<JobTypeTime> {
    let mut sums: BTreeMap<JobType, (usize, Hours)> = BTreeMap::new();
    for job in jobs {
        let entry = sums.entry(job.job_type).or_insert((0, Hours::zero()));
        entry.0 += 1;
        entry.1 = entry.1 + job.duration();
    }
    JobType::ALL
        .iter()
        .map(|&job_type| {
            let (count, total) = sums.get(&job_type).copied().unwrap_or((0, Hours::zero()));
            JobTypeTime {
                job_type,
                job_count: count,
                average: Hours::checked_average(total, count).unwrap_or_default(),
            }
        })
        .collect()
}

/// Average time worked on completed jobs.
pub fn time_report(period: &ReportPeriod, filter: &ReportFilter, data: &ReportData) -> TimeReport {
    let jobs: Vec<&Job> = data.completed_jobs(period, filter).collect();
    let total: Hours = jobs.iter().map(|j| j.duration()).sum();

    let mut by_mechanic = Vec::new();
    for mechanic in &data.mechanics {
        if filter.mechanic_id.as_deref().is_some_and(|id| id != mechanic.meta.id) {
            continue;
        }
        let own: Vec<&Job> = jobs
            .iter()
            .copied()
            .filter(|j| j.mechanic_id.as_deref() == Some(mechanic.meta.id.as_str()))
            .collect();
        // Former staff appear only for work they did in the period.
        if !mechanic.meta.is_live() && own.is_empty() {
            continue;
        }
        let own_total: Hours = own.iter().map(|j| j.duration()).sum();
        by_mechanic.push(MechanicTime {
            mechanic_id: mechanic.meta.id.clone(),
            name: mechanic.full_name(),
            job_count: own.len(),
            average: Hours::checked_average(own_total, own.len()).unwrap_or_default(),
            by_job_type: average_by_type(own.into_iter()),
        });
    }

    TimeReport {
        job_count: jobs.len(),
        average: Hours::checked_average(total, jobs.len()).unwrap_or_default(),
        by_job_type: average_by_type(jobs.into_iter()),
        by_mechanic,
    }
}

/// Jobs booked in the period, any status, by job type and customer class.
/// Business customers count as account holders.
pub fn vehicle_volume(
    period: &ReportPeriod,
    filter: &ReportFilter,
    data: &ReportData,
) -> VehicleVolumeReport {
    let mut rows: Vec<VolumeRow> = JobType::ALL
        .iter()
        .map(|&job_type| VolumeRow {
            job_type,
            dropin: 0,
            account_holder: 0,
        })
        .collect();

    for job in data.jobs_in(period).filter(|j| filter.admits(j)) {
        let Some(kind) = data.job_customers.get(&job.meta.id) else {
            continue;
        };
        if let Some(row) = rows.iter_mut().find(|r| r.job_type == job.job_type) {
            if kind.has_account() {
                row.account_holder += 1;
            } else {
                row.dropin += 1;
            }
        }
    }

    VehicleVolumeReport { rows }
}

/// Stock movement per live part over the period.
///
/// Initial stock is worked back from the current quantity using every
/// movement since the period start, so activity after the period end is
/// accounted for. Joins that stock could not cover never left the shelf
/// and are not counted.
pub fn stock_report(period: &ReportPeriod, data: &ReportData) -> StockReport {
    #[derive(Default, Clone, Copy)]
    struct Movement {
        used_in: i64,
        delivered_in: i64,
        used_after: i64,
        delivered_after: i64,
    }

    let mut moves: HashMap<&str, Movement> = HashMap::new();

    for job in data.jobs.iter().filter(|j| j.meta.is_live()) {
        let day = job.booked_at.date_naive();
        for join in job.live_parts().filter(|p| p.sufficient_quantity) {
            let m = moves.entry(join.part_id.as_str()).or_default();
            if period.contains(day) {
                m.used_in += join.quantity;
            } else if day > period.end {
                m.used_after += join.quantity;
            }
        }
    }
    for order in data.parts_orders.iter().filter(|o| o.meta.is_live()) {
        for line in order.live_lines().filter(|l| l.sufficient_quantity) {
            let m = moves.entry(line.part_id.as_str()).or_default();
            if period.contains(order.order_date) {
                m.used_in += line.quantity;
            } else if order.order_date > period.end {
                m.used_after += line.quantity;
            }
        }
    }
    for order in data.supplier_orders.iter().filter(|o| o.meta.is_live()) {
        for line in order.live_lines() {
            let m = moves.entry(line.part_id.as_str()).or_default();
            if period.contains(order.order_date) {
                m.delivered_in += line.quantity;
            } else if order.order_date > period.end {
                m.delivered_after += line.quantity;
            }
        }
    }

    let mut parts: Vec<_> = data.catalog.live_parts().collect();
    parts.sort_by(|a, b| a.code.cmp(&b.code));

    let rows: Vec<StockRow> = parts
        .into_iter()
        .map(|part| {
            let m = moves.get(part.meta.id.as_str()).copied().unwrap_or_default();
            let new_stock = part.quantity + m.used_after - m.delivered_after;
            let initial_stock = new_stock + m.used_in - m.delivered_in;
            StockRow {
                part_id: part.meta.id.clone(),
                code: part.code.clone(),
                name: part.name.clone(),
                initial_stock,
                used: m.used_in,
                delivered: m.delivered_in,
                new_stock,
                initial_cost: part.price.multiply_quantity(initial_stock),
                stock_cost: part.price.multiply_quantity(new_stock),
            }
        })
        .collect();

    StockReport {
        total_initial_cost: rows.iter().map(|r| r.initial_cost).sum(),
        total_stock_cost: rows.iter().map(|r| r.stock_cost).sum(),
        rows,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Part;
    use crate::job::{JobPart, JobTask};
    use crate::order::{SellLine, SupplierOrderLine};
    use crate::types::WorkStatus;
    use chrono::{TimeZone, Utc};

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn march() -> ReportPeriod {
        ReportPeriod::new(day(3, 1), day(3, 31)).unwrap()
    }

    fn job_on(m: u32, d: u32, job_type: JobType, mechanic: &Mechanic, secs: i64) -> Job {
        let booked = Utc.with_ymd_and_hms(2026, m, d, 9, 0, 0).unwrap();
        let mut job = Job::new(1, "v", job_type, booked);
        job.mechanic_id = Some(mechanic.meta.id.clone());
        let mut task = JobTask::new("t");
        task.status = WorkStatus::Complete;
        task.duration_secs = Some(secs);
        job.tasks.push(task);
        job.update_status();
        job
    }

    fn mechanics() -> (Mechanic, Mechanic) {
        (
            Mechanic::new("Jo", "Bloggs", Money::from_pence(4_000)).unwrap(),
            Mechanic::new("Al", "Ng", Money::from_pence(3_000)).unwrap(),
        )
    }

    #[test]
    fn test_empty_period_averages_to_zero() {
        let data = ReportData::default();
        let price = price_report(&march(), &ReportFilter::default(), &data).unwrap();
        assert_eq!(price.job_count, 0);
        assert!(price.average_labour.is_zero());
        assert!(price.average_total.is_zero());

        let time = time_report(&march(), &ReportFilter::default(), &data);
        assert_eq!(time.average, Hours::zero());
        assert!(time.by_job_type.iter().all(|t| t.average == Hours::zero()));
    }

    #[test]
    fn test_price_report_overall_and_per_mechanic() {
        let (jo, al) = mechanics();
        let data = ReportData {
            jobs: vec![
                job_on(3, 2, JobType::Repair, &jo, 3_600),  // £40.00
                job_on(3, 20, JobType::Mot, &jo, 7_200),    // £80.00
                job_on(3, 31, JobType::Annual, &al, 3_600), // £30.00
                job_on(4, 1, JobType::Mot, &al, 36_000),    // outside
            ],
            mechanics: vec![jo.clone(), al.clone()],
            ..ReportData::default()
        };

        let report = price_report(&march(), &ReportFilter::default(), &data).unwrap();
        assert_eq!(report.job_count, 3);
        assert_eq!(report.average_labour.pence(), 5_000);
        assert_eq!(report.average_total.pence(), 5_000);

        let jo_row = report.by_mechanic.iter().find(|r| r.mechanic_id == jo.meta.id).unwrap();
        assert_eq!(jo_row.job_count, 2);
        assert_eq!(jo_row.average_labour.pence(), 6_000);
    }

    #[test]
    fn test_incomplete_and_deleted_jobs_are_ignored() {
        let (jo, _) = mechanics();
        let mut pending = job_on(3, 3, JobType::Repair, &jo, 3_600);
        pending.tasks.push(JobTask::new("t2"));
        pending.update_status();
        let mut deleted = job_on(3, 4, JobType::Repair, &jo, 3_600);
        deleted.meta.deleted_at = Some(Utc::now());
        let data = ReportData {
            jobs: vec![pending, deleted],
            mechanics: vec![jo],
            ..ReportData::default()
        };
        let time = time_report(&march(), &ReportFilter::default(), &data);
        assert_eq!(time.job_count, 0);
    }

    #[test]
    fn test_time_report_groupings() {
        let (jo, al) = mechanics();
        let data = ReportData {
            jobs: vec![
                job_on(3, 2, JobType::Mot, &jo, 3_600),
                job_on(3, 3, JobType::Mot, &jo, 5_400),
                job_on(3, 4, JobType::Repair, &al, 9_000),
            ],
            mechanics: vec![jo.clone(), al],
            ..ReportData::default()
        };

        let report = time_report(&march(), &ReportFilter::default(), &data);
        // (1.00 + 1.50 + 2.50) / 3 = 1.6666
        assert_eq!(report.average.hundredths(), 167);
        let mot = report.by_job_type.iter().find(|t| t.job_type == JobType::Mot).unwrap();
        assert_eq!(mot.average.hundredths(), 125);

        let jo_row = report.by_mechanic.iter().find(|m| m.mechanic_id == jo.meta.id).unwrap();
        assert_eq!(jo_row.job_count, 2);
        let jo_repair = jo_row.by_job_type.iter().find(|t| t.job_type == JobType::Repair).unwrap();
        assert_eq!(jo_repair.job_count, 0);
        assert_eq!(jo_repair.average, Hours::zero());

        let only_repairs = ReportFilter { job_type: Some(JobType::Repair), ..ReportFilter::default() };
        assert_eq!(time_report(&march(), &only_repairs, &data).job_count, 1);
    }

    #[test]
    fn test_former_mechanics_keep_their_rows() {
        let (mut jo, mut al) = mechanics();
        jo.meta.deleted_at = Some(Utc::now());
        al.meta.deleted_at = Some(Utc::now());
        let data = ReportData {
            jobs: vec![job_on(3, 2, JobType::Repair, &jo, 3_600)],
            mechanics: vec![jo.clone(), al.clone()],
            ..ReportData::default()
        };

        let price = price_report(&march(), &ReportFilter::default(), &data).unwrap();
        let time = time_report(&march(), &ReportFilter::default(), &data);
        assert_eq!(price.by_mechanic.len(), 1);
        assert_eq!(time.by_mechanic.len(), 1);
        assert_eq!(time.by_mechanic[0].mechanic_id, jo.meta.id);
        assert_eq!(time.by_mechanic[0].name, price.by_mechanic[0].name);
    }

    #[test]
    fn test_response_rate() {
        let report = response_rate(50, 20).unwrap();
        assert_eq!(report.response_rate, Percent::from_bps(4_000));
        assert!(matches!(response_rate(0, 3), Err(CoreError::DivisionGuard { .. })));
    }

    #[test]
    fn test_response_rate_through_run() {
        let (jo, _) = mechanics();
        let mut reminders: Vec<MotReminder> = (0..4)
            .map(|_| MotReminder::new("v", day(3, 1), day(3, 28)))
            .collect();
        reminders.push(MotReminder::new("v", day(4, 2), day(4, 30)));
        let data = ReportData {
            jobs: vec![job_on(3, 10, JobType::Mot, &jo, 60), job_on(3, 11, JobType::Repair, &jo, 60)],
            mot_reminders: reminders,
            ..ReportData::default()
        };
        let result = run(ReportKind::ResponseRate, &march(), &ReportFilter::default(), &data).unwrap();
        let AggregateResult::ResponseRate(report) = result else {
            panic!("wrong report kind");
        };
        assert_eq!(report.mot_reminders_sent, 4);
        assert_eq!(report.mot_jobs, 1);
        assert_eq!(report.response_rate.bps(), 2_500);
    }

    #[test]
    fn test_result_exports_as_tagged_json() {
        let result = AggregateResult::ResponseRate(response_rate(50, 20).unwrap());
        assert_eq!(result.kind(), ReportKind::ResponseRate);
        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["kind"], "response_rate");
        assert_eq!(json["report"]["mot_jobs"], 20);
    }

    #[test]
    fn test_vehicle_volume_counts_business_as_account_holder() {
        let (jo, _) = mechanics();
        let a = job_on(3, 2, JobType::Mot, &jo, 60);
        let b = job_on(3, 3, JobType::Mot, &jo, 60);
        let c = job_on(3, 4, JobType::Annual, &jo, 60);
        let job_customers = HashMap::from([
            (a.meta.id.clone(), CustomerKind::Dropin),
            (b.meta.id.clone(), CustomerKind::Business),
            (c.meta.id.clone(), CustomerKind::AccountHolder),
        ]);
        let data = ReportData {
            jobs: vec![a, b, c],
            job_customers,
            ..ReportData::default()
        };
        let report = vehicle_volume(&march(), &ReportFilter::default(), &data);
        let mot = report.row(JobType::Mot).unwrap();
        assert_eq!((mot.dropin, mot.account_holder, mot.overall()), (1, 1, 2));
        assert_eq!(report.dropin_overall(), 1);
        assert_eq!(report.account_holders_overall(), 2);
        assert_eq!(report.overall(), 3);
    }

    #[test]
    fn test_stock_report_works_back_from_current_quantity() {
        let (jo, _) = mechanics();
        // 10 on hand today
        let part = Part::new("OIL-5W30", "Engine oil", Money::from_pence(1_500), 10, 3).unwrap();
        let id = part.meta.id.clone();

        let mut march_job = job_on(3, 5, JobType::Annual, &jo, 60);
        march_job.parts.push(JobPart::new(&id, 2).unwrap());
        let mut april_job = job_on(4, 5, JobType::Annual, &jo, 60);
        april_job.parts.push(JobPart::new(&id, 1).unwrap());

        let mut sale = CustomerPartsOrder::new("c", day(3, 12));
        sale.lines.push(SellLine::new(&id, 1).unwrap());

        let mut delivery = SupplierOrder::new("s", day(3, 15));
        delivery.lines.push(SupplierOrderLine::new(&id, 6).unwrap());

        let data = ReportData {
            jobs: vec![march_job, april_job],
            catalog: Catalog::from_parts(vec![part]),
            parts_orders: vec![sale],
            supplier_orders: vec![delivery],
            ..ReportData::default()
        };

        let report = stock_report(&march(), &data);
        let row = &report.rows[0];
        assert_eq!(row.used, 3);
        assert_eq!(row.delivered, 6);
        assert_eq!(row.new_stock, 11);
        assert_eq!(row.initial_stock, 8);
        assert_eq!(row.initial_cost.pence(), 12_000);
        assert_eq!(row.stock_cost.pence(), 16_500);
        assert_eq!(report.total_stock_cost.pence(), 16_500);
    }

    #[test]
    fn test_period_helpers() {
        assert!(ReportPeriod::new(day(3, 2), day(3, 1)).is_err());
        let feb = ReportPeriod::month_of(day(2, 14));
        assert_eq!(feb.end, day(2, 28));
        let dec = ReportPeriod::month_of(NaiveDate::from_ymd_opt(2025, 12, 9).unwrap());
        assert_eq!(dec.end, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert_eq!(march().label(), "01/03/2026-31/03/2026");
    }
}
