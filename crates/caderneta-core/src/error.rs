//! # Error Types
//!
//! Domain-specific error types for caderneta-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caderneta-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule / ledger failures                │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  caderneta-db errors (separate crate)                                  │
//! │  └── DbError          - Storage failures, wraps CoreError as Domain    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → adapter layer           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product name, amounts, etc.)
//! 3. Errors are enum variants, never String
//! 4. A failed invariant check surfaces loudly as `Inconsistent`; it is
//!    never logged-and-continued past

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or ledger failures.
/// Every operation that raises one of these aborts with no visible state
/// change; the adapter layer translates them to user-facing messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (missing or soft-deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Account receivable not found.
    #[error("Account receivable not found: {0}")]
    ReceivableNotFound(String),

    /// Insufficient stock to complete a sale or outflow movement.
    ///
    /// ## When This Occurs
    /// - A cart line requests more than the available stock
    /// - A manual `saida` movement exceeds the on-hand quantity
    ///
    /// Raised for the failing line, and it aborts the WHOLE enclosing
    /// sale: no partial stock change, no partial sale rows.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Payment or movement amount is invalid (zero, negative, or exceeds
    /// the remaining balance of a single receivable).
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// A lump customer payment exceeds the customer's total outstanding
    /// balance. No partial over-application is permitted.
    #[error(
        "Payment of {requested_cents} centavos exceeds total due of {total_due_cents} centavos"
    )]
    AmountExceedsDue {
        requested_cents: i64,
        total_due_cents: i64,
    },

    /// The customer has no receivable open for payment.
    #[error("Customer {customer_id} has no outstanding accounts")]
    NoOutstandingAccounts { customer_id: String },

    /// Sale is not in a state that allows the requested operation.
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    /// A ledger invariant would be violated. This is a data-integrity or
    /// programming bug, surfaced loudly and never silently patched.
    #[error("Ledger inconsistency: {message}")]
    Inconsistent { message: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an `Inconsistent` error.
    pub fn inconsistent(message: impl Into<String>) -> Self {
        CoreError::Inconsistent {
            message: message.into(),
        }
    }

    /// Creates an `InvalidAmount` error.
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before ledger logic runs.
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

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in the allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Arroz 5kg".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Arroz 5kg: available 3, requested 5"
        );

        let err = CoreError::AmountExceedsDue {
            requested_cents: 9000,
            total_due_cents: 8000,
        };
        assert!(err.to_string().contains("9000"));
        assert!(err.to_string().contains("8000"));
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "customer_id".to_string(),
        };
        assert_eq!(err.to_string(), "customer_id is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "customer_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
