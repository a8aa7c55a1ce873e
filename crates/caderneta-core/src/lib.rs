//! # caderneta-core: Pure Business Logic for Caderneta POS
//!
//! This crate is the **heart** of Caderneta POS. It contains all business
//! logic as pure functions with zero I/O dependencies: the domain types,
//! integer money arithmetic, the receivable status state machine, and the
//! deferred-credit payment policy.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Caderneta POS Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Adapter layer (HTTP API, notifications)            │   │
//! │  │        create_sale, apply_customer_payment, stock moves        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ caderneta-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌─────────────┐  ┌──────────┐ │   │
//! │  │   │   types   │  │   money   │  │   status    │  │validation│ │   │
//! │  │   │  Product  │  │   Money   │  │  machine    │  │  rules   │ │   │
//! │  │   │   Sale    │  │  (cents)  │  │ (receivable)│  │  checks  │ │   │
//! │  │   └───────────┘  └───────────┘  └─────────────┘  └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 caderneta-db (Database Layer)                   │   │
//! │  │        SQLite queries, transactions, migrations, repos          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, AccountReceivable, Payment, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in centavos (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use caderneta_core::Money` instead of
// `use caderneta_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default payment term for deferred ("fiado") sales, in days.
///
/// When a deferred sale is created without an explicit due date, the
/// receivable falls due this many days after the sale.
pub const DEFAULT_DUE_DAYS: i64 = 30;

/// Maximum line items allowed in a single sale cart.
///
/// ## Business Reason
/// Prevents runaway carts and ensures reasonable transaction sizes.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single item in a cart line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 9999;
