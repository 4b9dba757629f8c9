//! # Jobs
//!
//! A job is a booked visit for one vehicle. Work is recorded as task joins
//! (with the seconds actually spent) and part joins (with quantities).
//!
//! ```text
//! Job ─┬── JobTask { task_id, status, duration_secs }  × n
//!      └── JobPart { part_id, quantity, sufficient }    × n
//!
//! duration  = round(Σ live duration_secs / 3600, 2)   → Hours
//! status    = Complete once every live task is Complete
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::CoreResult;
use crate::money::{Hours, Money};
use crate::types::{EntityMeta, JobType, WorkStatus};
use crate::validation::{validate_name, validate_price, validate_quantity};

// =============================================================================
// Mechanic
// =============================================================================

/// A member of staff who carries out jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mechanic {
    pub meta: EntityMeta,
    pub forename: String,
    pub surname: String,
    pub hourly_pay: Money,
}

impl Mechanic {
    pub fn new(forename: &str, surname: &str, hourly_pay: Money) -> CoreResult<Self> {
        validate_name("forename", forename, 50)?;
        validate_name("surname", surname, 50)?;
        validate_price("hourly_pay", hourly_pay)?;

        Ok(Mechanic {
            meta: EntityMeta::new(),
            forename: forename.trim().to_string(),
            surname: surname.trim().to_string(),
            hourly_pay,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.forename, self.surname)
    }
}

// =============================================================================
// Joins
// =============================================================================

/// A task carried out as part of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTask {
    pub meta: EntityMeta,
    pub task_id: String,
    pub status: WorkStatus,
    /// Seconds actually spent; `None` until the task is started.
    pub duration_secs: Option<i64>,
}

impl JobTask {
    pub fn new(task_id: &str) -> Self {
        JobTask {
            meta: EntityMeta::new(),
            task_id: task_id.to_string(),
            status: WorkStatus::Pending,
            duration_secs: None,
        }
    }
}

/// A part used on a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPart {
    pub meta: EntityMeta,
    pub part_id: String,
    pub quantity: i64,
    /// Whether stock covered the quantity when the part was allocated.
    pub sufficient_quantity: bool,
}

impl JobPart {
    pub fn new(part_id: &str, quantity: i64) -> CoreResult<Self> {
        validate_quantity(quantity)?;
        Ok(JobPart {
            meta: EntityMeta::new(),
            part_id: part_id.to_string(),
            quantity,
            sufficient_quantity: true,
        })
    }
}

// =============================================================================
// Job
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub meta: EntityMeta,
    pub job_number: i64,
    pub vehicle_id: String,
    pub mechanic_id: Option<String>,
    pub job_type: JobType,
    /// Derived from the live task joins. Read through [`Job::status`].
    status: WorkStatus,
    pub booked_at: DateTime<Utc>,
    pub work_carried_out: String,
    pub tasks: Vec<JobTask>,
    pub parts: Vec<JobPart>,
}

impl Job {
    pub fn new(job_number: i64, vehicle_id: &str, job_type: JobType, booked_at: DateTime<Utc>) -> Self {
        Job {
            meta: EntityMeta::new(),
            job_number,
            vehicle_id: vehicle_id.to_string(),
            mechanic_id: None,
            job_type,
            status: WorkStatus::Pending,
            booked_at,
            work_carried_out: String::new(),
            tasks: Vec::new(),
            parts: Vec::new(),
        }
    }

    pub fn live_tasks(&self) -> impl Iterator<Item = &JobTask> {
        self.tasks.iter().filter(|t| t.meta.is_live())
    }

    pub fn live_parts(&self) -> impl Iterator<Item = &JobPart> {
        self.parts.iter().filter(|p| p.meta.is_live())
    }

    /// Time actually worked: seconds summed first, then rounded to hours.
    pub fn duration(&self) -> Hours {
        let seconds: i64 = self.live_tasks().filter_map(|t| t.duration_secs).sum();
        Hours::from_seconds(seconds)
    }

    /// Planned time from the task list's estimates.
    pub fn estimated_time(&self, catalog: &Catalog) -> CoreResult<Hours> {
        let mut seconds = 0;
        for join in self.live_tasks() {
            seconds += catalog.task(&join.task_id)?.estimated_secs;
        }
        Ok(Hours::from_seconds(seconds))
    }

    /// Recomputes the job status from its tasks and returns it.
    ///
    /// Complete once every live task is complete, Started once any task has
    /// moved off Pending, Pending otherwise (including a job with no tasks).
    pub fn update_status(&mut self) -> WorkStatus {
        let mut any = false;
        let mut all_complete = true;
        let mut any_started = false;
        for task in self.live_tasks() {
            any = true;
            all_complete &= task.status == WorkStatus::Complete;
            any_started |= task.status != WorkStatus::Pending;
        }

        self.status = if any && all_complete {
            WorkStatus::Complete
        } else if any_started {
            WorkStatus::Started
        } else {
            WorkStatus::Pending
        };
        self.status
    }

    pub fn status(&self) -> WorkStatus {
        self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status == WorkStatus::Complete
    }

    /// True when every live part join was covered by stock.
    pub fn has_sufficient_parts(&self) -> bool {
        self.live_parts().all(|p| p.sufficient_quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Task;

    fn task_done(secs: i64) -> JobTask {
        let mut t = JobTask::new("t");
        t.status = WorkStatus::Complete;
        t.duration_secs = Some(secs);
        t
    }

    fn job() -> Job {
        Job::new(1, "v-1", JobType::Repair, Utc::now())
    }

    #[test]
    fn test_duration_sums_seconds_before_rounding() {
        let mut job = job();
        // 3 × 1000s = 3000s = 0.8333h → 0.83, not 3 × 0.28 = 0.84
        job.tasks = vec![task_done(1_000), task_done(1_000), task_done(1_000)];
        assert_eq!(job.duration().hundredths(), 83);
    }

    #[test]
    fn test_duration_ignores_tombstoned_tasks() {
        let mut job = job();
        let mut gone = task_done(3_600);
        gone.meta.deleted_at = Some(Utc::now());
        job.tasks = vec![task_done(9_000), gone];
        assert_eq!(job.duration().hundredths(), 250);
    }

    #[test]
    fn test_status_follows_tasks() {
        let mut job = job();
        assert_eq!(job.update_status(), WorkStatus::Pending);

        job.tasks = vec![JobTask::new("a"), JobTask::new("b")];
        assert_eq!(job.update_status(), WorkStatus::Pending);

        job.tasks[0].status = WorkStatus::Complete;
        assert_eq!(job.update_status(), WorkStatus::Started);

        job.tasks[1].status = WorkStatus::Complete;
        assert_eq!(job.update_status(), WorkStatus::Complete);
        assert!(job.is_complete());

        job.tasks.push(JobTask::new("c"));
        assert_eq!(job.update_status(), WorkStatus::Started);
        assert!(!job.is_complete());

        job.tasks.clear();
        assert_eq!(job.update_status(), WorkStatus::Pending);
    }

    #[test]
    fn test_sufficient_parts() {
        let mut job = job();
        assert!(job.has_sufficient_parts());
        let mut short = JobPart::new("p", 2).unwrap();
        short.sufficient_quantity = false;
        job.parts = vec![JobPart::new("q", 1).unwrap(), short];
        assert!(!job.has_sufficient_parts());
        assert!(JobPart::new("p", 0).is_err());
    }

    #[test]
    fn test_estimated_time_uses_task_estimates() {
        let task = Task {
            meta: EntityMeta::new(),
            task_number: 7,
            description: "Replace brake pads".to_string(),
            estimated_secs: 5_400,
        };
        let mut catalog = Catalog::new();
        let mut join = JobTask::new(&task.meta.id);
        join.duration_secs = Some(60);
        catalog.insert_task(task);

        let mut job = job();
        job.tasks = vec![join];
        assert_eq!(job.estimated_time(&catalog).unwrap().hundredths(), 150);
        assert_eq!(job.duration().hundredths(), 2);
    }

    #[test]
    fn test_mechanic_validation() {
        let m = Mechanic::new("Jo", "Bloggs", Money::from_pence(4_000)).unwrap();
        assert_eq!(m.full_name(), "Jo Bloggs");
        assert!(Mechanic::new("Jo", "Bloggs", Money::from_pence(-1)).is_err());
    }
}
