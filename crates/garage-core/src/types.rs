//! # Domain Types
//!
//! Shared building blocks used by every garage entity.
//!
//! ## Entity Envelope
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         EntityMeta                                      │
//! │                                                                         │
//! │  id          UUID v4, assigned once at creation, never changes         │
//! │  created_at  set at creation                                           │
//! │  updated_at  moved on every successful write                           │
//! │  deleted_at  tombstone; rows are never physically removed              │
//! │  version     optimistic concurrency counter, +1 on every write         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for relations
//! - Business ID: (part code, job number, invoice number, registration) -
//!   human-readable, unique

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Entity Metadata
// =============================================================================

/// Identity, timestamps, tombstone and version shared by all entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl EntityMeta {
    /// Creates metadata for a brand-new entity.
    pub fn new() -> Self {
        let now = Utc::now();
        EntityMeta {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: 0,
        }
    }

    /// Returns true while the entity has not been soft-deleted.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Records a successful write: moves `updated_at` and bumps the version.
    ///
    /// Storage calls this after its version-checked `UPDATE` succeeds so the
    /// in-memory copy matches the row.
    pub fn bump(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }
}

impl Default for EntityMeta {
    fn default() -> Self {
        EntityMeta::new()
    }
}

// =============================================================================
// Customer Kind
// =============================================================================

/// Discriminant of the closed customer variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CustomerKind {
    /// Casual walk-in customer. Never has a discount plan.
    Dropin,
    /// Customer with an account, address and optional discount plan.
    AccountHolder,
    /// Account holder trading as a company.
    Business,
}

impl CustomerKind {
    /// Returns true for account holders and business customers.
    pub fn has_account(&self) -> bool {
        !matches!(self, CustomerKind::Dropin)
    }
}

// =============================================================================
// Job Type & Status
// =============================================================================

/// The service a job was booked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Statutory roadworthiness test.
    Mot,
    Repair,
    /// Annual service.
    Annual,
}

impl JobType {
    pub const ALL: [JobType; 3] = [JobType::Mot, JobType::Repair, JobType::Annual];
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Mot => write!(f, "MOT"),
            JobType::Repair => write!(f, "Repair"),
            JobType::Annual => write!(f, "Annual"),
        }
    }
}

/// Progress of a job, or of one task within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    Complete,
    Started,
    Pending,
}

impl Default for WorkStatus {
    fn default() -> Self {
        WorkStatus::Pending
    }
}

// =============================================================================
// Vehicle Type
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    /// Van or light goods vehicle.
    Van,
    Car,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_meta_is_live_at_version_zero() {
        let meta = EntityMeta::new();
        assert!(meta.is_live());
        assert_eq!(meta.version, 0);
        assert_eq!(meta.created_at, meta.updated_at);
        assert!(uuid::Uuid::parse_str(&meta.id).is_ok());
    }

    #[test]
    fn test_bump_moves_version_not_id() {
        let mut meta = EntityMeta::new();
        let id = meta.id.clone();
        meta.bump(Utc::now());
        meta.bump(Utc::now());
        assert_eq!(meta.version, 2);
        assert_eq!(meta.id, id);
    }

    #[test]
    fn test_work_status_default() {
        assert_eq!(WorkStatus::default(), WorkStatus::Pending);
    }

    #[test]
    fn test_customer_kind_account() {
        assert!(!CustomerKind::Dropin.has_account());
        assert!(CustomerKind::AccountHolder.has_account());
        assert!(CustomerKind::Business.has_account());
    }

    #[test]
    fn test_job_type_serde() {
        let json = serde_json::to_string(&JobType::Mot).unwrap();
        assert_eq!(json, "\"mot\"");
        assert_eq!(JobType::Annual.to_string(), "Annual");
    }
}
