//! # garage-core: Pricing and Invoicing Rules for the Garage Back Office
//!
//! Everything that decides what a customer pays lives here, as pure
//! functions over plain values. Loading and saving is `garage-db`'s job.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Garage Back Office                                  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │         Callers (booking desk, parts counter, schedulers)       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   garage-db services: price, commit_quote, advance_reminder,    │   │
//! │  │   mark_paid, record_payment, run_report                         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ garage-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   catalog ──► discount ──► pricing ──► invoice                  │   │
//! │  │      │           ▲            │                                 │   │
//! │  │      │       customer         └──► report                      │   │
//! │  │      │                                                          │   │
//! │  │   money · types · validation · error                           │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO LOGGING                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` (pence), `Percent` (basis points), `Hours`
//! - [`catalog`] - Price control, parts, tasks
//! - [`customer`] - Drop-in, account holder and business customers
//! - [`discount`] - Fixed / Flexible / Variable plans and the resolver
//! - [`job`], [`order`], [`vehicle`] - The things that get billed
//! - [`pricing`] - Quotes and price breakdowns
//! - [`invoice`] - Reminder state machine, quote commits, payments
//! - [`report`] - Price, time, volume, response-rate and stock reports
//!
//! ## Example Usage
//!
//! ```rust
//! use garage_core::money::{Money, Percent};
//!
//! // £156.00 less a 10% fixed discount
//! let grand_total = Money::from_pence(15_600);
//! let final_total = grand_total.apply_percentage_discount(Percent::from_bps(1_000));
//! assert_eq!(final_total.pence(), 14_040);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod customer;
pub mod discount;
pub mod error;
pub mod invoice;
pub mod job;
pub mod money;
pub mod order;
pub mod pricing;
pub mod report;
pub mod types;
pub mod validation;
pub mod vehicle;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Hours, Money, Percent};
pub use types::*;
