//! # garage-db: Storage and Services for the Garage Back Office
//!
//! SQLite persistence for every garage-core entity, plus the services that
//! run pricing, invoice commits and reports against stored data.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Garage Data Flow                                 │
//! │                                                                         │
//! │  Booking desk / scheduler / seed binary                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    garage-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Services    │    │ Repositories  │    │  Migrations  │  │   │
//! │  │   │               │    │               │    │  (embedded)  │  │   │
//! │  │   │ Billing       │───►│ Customer      │    │              │  │   │
//! │  │   │ Reporting     │    │ Job, Invoice  │    │ 001_initial  │  │   │
//! │  │   │               │    │ Catalog, ...  │    │ ...          │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           │ pure calls         │                               │   │
//! │  │           ▼                    ▼                               │   │
//! │  │      garage-core          SqlitePool (pool.rs)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/com.garage.backoffice/garage.db                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use garage_db::{Database, GarageConfig};
//!
//! let config = GarageConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let committed = db.billing().commit_quote(&invoice_id, Utc::now()).await?;
//! let report = db.reporting().run_report(kind, &period, &filter).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, GarageConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::catalog::CatalogRepository;
pub use repository::customer::CustomerRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::job::JobRepository;
pub use repository::order::OrderRepository;
pub use repository::price_control::PriceControlRepository;
pub use repository::vehicle::VehicleRepository;

pub use service::billing::BillingService;
pub use service::reporting::ReportingService;
