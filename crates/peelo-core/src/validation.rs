//! # Validation Module
//!
//! Client-side checks that run before any request leaves the process.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (client)                                         │
//! │  ├── Empty / length checks                                             │
//! │  └── Fails fast with ValidationError, no request sent                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: REST API                                                     │
//! │  └── Authoritative checks, surfaced as ServerRejected                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest full name the profile endpoint accepts.
pub const MAX_FULL_NAME_LEN: usize = 150;

/// Validates the login identifier (email or phone number).
///
/// Only emptiness is checked here; the identifier is otherwise sent as typed.
pub fn validate_identifier(identifier: &str) -> ValidationResult<()> {
    if identifier.trim().is_empty() {
        return Err(ValidationError::required("email_or_phone"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }
    Ok(())
}

/// Validates a profile full name.
///
/// ## Rules
/// - Must not be blank
/// - At most 150 characters
///
/// ## Example
/// ```rust
/// use peelo_core::validation::validate_full_name;
///
/// assert!(validate_full_name("Asha Rao").is_ok());
/// assert!(validate_full_name("   ").is_err());
/// ```
pub fn validate_full_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("full_name"));
    }

    if name.chars().count() > MAX_FULL_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "full_name".to_string(),
            max: MAX_FULL_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a quantity passed to `add`. Zero and negatives are rejected.
pub fn validate_quantity(quantity: i64) -> ValidationResult<u32> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(u32::try_from(quantity).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("asha@example.com").is_ok());
        assert!(validate_identifier("9876543210").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("   ").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("hunter2").is_ok());
        assert_eq!(
            validate_password("").unwrap_err(),
            ValidationError::required("password")
        );
    }

    #[test]
    fn test_validate_full_name() {
        assert!(validate_full_name("Asha Rao").is_ok());
        assert!(validate_full_name("").is_err());
        assert!(validate_full_name(&"a".repeat(150)).is_ok());
        assert!(matches!(
            validate_full_name(&"a".repeat(151)),
            Err(ValidationError::TooLong { max: 150, .. })
        ));
    }

    #[test]
    fn test_validate_quantity() {
        assert_eq!(validate_quantity(3).unwrap(), 3);
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert_eq!(validate_quantity(i64::MAX).unwrap(), u32::MAX);
    }
}
