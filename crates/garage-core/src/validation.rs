//! # Validation Module
//!
//! Input validation for the records that feed the pricing engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Calling service (booking desk, parts counter)                │
//! │  └── Form-level checks, immediate feedback                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Domain constructors                                          │
//! │  └── THIS MODULE: business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE / CHECK constraints                             │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use garage_core::validation::{validate_part_code, validate_quantity};
//!
//! validate_part_code("BRK-PAD-01").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::{Money, Percent};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a part code.
///
/// ## Rules
/// - Must not be empty
/// - At most 20 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use garage_core::validation::validate_part_code;
///
/// assert!(validate_part_code("OIL-FLT-9").is_ok());
/// assert!(validate_part_code("").is_err());
/// assert!(validate_part_code("has space").is_err());
/// ```
pub fn validate_part_code(code: &str) -> ValidationResult<()> {
    validate_required("code", code, 20)?;

    if !code
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (part, task description, company).
pub fn validate_name(field: &str, name: &str, max: usize) -> ValidationResult<()> {
    validate_required(field, name, max)
}

/// Validates a vehicle registration number.
///
/// Letters, digits and single spaces, at most 10 characters.
pub fn validate_reg_number(reg: &str) -> ValidationResult<()> {
    validate_required("reg_number", reg, 10)?;

    if !reg
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ')
    {
        return Err(ValidationError::InvalidFormat {
            field: "reg_number".to_string(),
            reason: "must contain only letters, digits and spaces".to_string(),
        });
    }

    Ok(())
}

/// Validates a UK phone number: a leading `0` followed by 7 to 10 digits.
///
/// ## Example
/// ```rust
/// use garage_core::validation::validate_phone_number;
///
/// assert!(validate_phone_number("02079460000").is_ok());
/// assert!(validate_phone_number("2079460000").is_err());
/// assert!(validate_phone_number("0123").is_err());
/// ```
pub fn validate_phone_number(phone: &str) -> ValidationResult<()> {
    let invalid = || ValidationError::InvalidFormat {
        field: "phone_number".to_string(),
        reason: "must be entered in the format '0xxxxxxxxxx' (up to 10 digits after the 0)"
            .to_string(),
    };

    let rest = phone.strip_prefix('0').ok_or_else(invalid)?;
    if !(7..=10).contains(&rest.len()) || !rest.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    Ok(())
}

/// Validates an email address (shape only, at most 120 characters).
pub fn validate_email(email: &str) -> ValidationResult<()> {
    validate_required("email", email, 120)?;

    let valid = match email.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(())
}

/// Validates a postcode (at most 8 characters, may be empty).
pub fn validate_postcode(postcode: &str) -> ValidationResult<()> {
    if postcode.trim().chars().count() > 8 {
        return Err(ValidationError::TooLong {
            field: "postcode".to_string(),
            max: 8,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity on a job, order or supplier line.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a price or pay rate. Zero is allowed.
pub fn validate_price(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a percentage rate (VAT, markup, discount): 0.00% to 100.00%.
///
/// ## Example
/// ```rust
/// use garage_core::money::Percent;
/// use garage_core::validation::validate_percent;
///
/// assert!(validate_percent("vat", Percent::from_bps(2_000)).is_ok());
/// assert!(validate_percent("vat", Percent::from_bps(10_001)).is_err());
/// ```
pub fn validate_percent(field: &str, rate: Percent) -> ValidationResult<()> {
    if rate > Percent::MAX {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

/// Validates a UUID string.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
