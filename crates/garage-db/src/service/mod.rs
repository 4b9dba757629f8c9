//! # Services
//!
//! Operations that span several repositories. Each one loads what the
//! core needs, calls the pure core function, and writes the outcome back.
//!
//! ```text
//! ┌──────────────┐   load    ┌──────────────┐   pure    ┌──────────────┐
//! │ repositories │ ────────► │   service    │ ────────► │ garage-core  │
//! │  (SQLite)    │ ◄──────── │ (this module)│ ◄──────── │  pricing,    │
//! └──────────────┘   write   └──────────────┘  result   │  reporting   │
//!                                                        └──────────────┘
//! ```

pub mod billing;
pub mod reporting;
