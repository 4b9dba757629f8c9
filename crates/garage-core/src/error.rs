//! # Error Types
//!
//! Domain-specific error types for garage-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  garage-core errors (this file)                                        │
//! │  ├── CoreError        - Pricing, invoicing and reporting failures      │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  garage-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → calling service         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The core never logs, retries or swallows an error. Every variant
//! propagates to the caller; the only local recovery is the zero-count
//! policy of the reporting aggregators, which never raises at all.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Price control is missing or ambiguous.
    ///
    /// ## When This Occurs
    /// - No live price control record exists
    /// - More than one live price control record exists
    ///
    /// Any computation that reads VAT or markup fails with this.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An invoice does not reference exactly one of job / parts order.
    #[error("Invoice {invoice} is invalid: {reason}")]
    InvalidInvoiceState { invoice: String, reason: String },

    /// A referenced entity is absent under the given identifier.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A write carried a version that is no longer current.
    ///
    /// ## User Workflow
    /// ```text
    /// Receptionist A reads Invoice v3      Receptionist B reads Invoice v3
    ///      │                                    │
    ///      ▼                                    ▼
    /// advance_reminder → writes v4         mark_paid → expects v3
    ///                                           │
    ///                                           ▼
    ///                               ConcurrentModification { version: 3 }
    /// ```
    #[error("{entity} {id} was modified concurrently (expected version {expected_version})")]
    ConcurrentModification {
        entity: String,
        id: String,
        expected_version: i64,
    },

    /// An average or ratio was requested over zero records without the
    /// zero-fallback policy.
    #[error("Cannot compute {measure} over zero records")]
    DivisionGuard { measure: String },

    /// Not enough parts on hand for the requested adjustment.
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidInvoiceState error.
    pub fn invalid_invoice(invoice: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidInvoiceState {
            invoice: invoice.into(),
            reason: reason.into(),
        }
    }

    /// Creates a DivisionGuard error.
    pub fn division_guard(measure: impl Into<String>) -> Self {
        CoreError::DivisionGuard {
            measure: measure.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            code: "BRK-PAD-01".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for BRK-PAD-01: available 3, requested 5"
        );

        let err = CoreError::not_found("Mechanic", "abc");
        assert_eq!(err.to_string(), "Mechanic not found: abc");
    }

    #[test]
    fn test_concurrent_modification_message() {
        let err = CoreError::ConcurrentModification {
            entity: "Invoice".to_string(),
            id: "inv-1".to_string(),
            expected_version: 3,
        };
        assert_eq!(
            err.to_string(),
            "Invoice inv-1 was modified concurrently (expected version 3)"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
