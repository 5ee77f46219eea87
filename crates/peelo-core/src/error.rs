//! # Error Types
//!
//! Domain-specific error types for peelo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  peelo-core errors (this file)                                         │
//! │  ├── CoreError        - Cart rule violations                           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  peelo-client errors (separate crate)                                  │
//! │  ├── ApiError         - What a page branches on (toast text)           │
//! │  ├── ConfigError      - storefront.toml problems                       │
//! │  └── StorageError     - Persisted state problems                       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → Toast                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule violations raised by the pure cart logic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A quantity change targeted a product that has no cart line.
    ///
    /// ## When This Occurs
    /// - A stale quantity stepper fires after the line was removed
    /// - A second view removed the line first
    #[error("Product {0} is not in the cart")]
    ProductNotInCart(i64),

    /// The product is flagged unavailable or its known stock is zero.
    #[error("Product {0} is out of stock")]
    OutOfStock(i64),

    /// Validation error (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These block an operation before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
