//! # caderneta-db: Database Layer for Caderneta POS
//!
//! This crate provides storage for the Caderneta POS core: the sale
//! processor, the inventory ledger, and the receivables ledger with its
//! FIFO payment allocator. It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Caderneta POS Data Flow                            │
//! │                                                                         │
//! │  Adapter call (create_sale, apply_customer_payment, ...)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   caderneta-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │ │   │
//! │  │   │               │    │ ProductRepo    │    │              │ │   │
//! │  │   │ SqlitePool    │◄───│ SaleRepo       │    │ 001_init.sql │ │   │
//! │  │   │ Transactions  │    │ ReceivableRepo │    │ ...          │ │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘ │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL mode, foreign keys on)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, sale, receivable)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caderneta_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/caderneta.db")).await?;
//!
//! // Commit a cart as a sale (atomic: stock + sale + receivable)
//! let sale = db.sales().create_sale(new_sale).await?;
//!
//! // Later, allocate a lump payment oldest-due-first
//! let payments = db
//!     .receivables()
//!     .apply_customer_payment("customer-1", 4000, PaymentMethod::Pix, None, "user-1")
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::product::ProductRepository;
pub use repository::receivable::{OverdueSummary, ReceivableRepository};
pub use repository::sale::{DailySummary, MethodBreakdown, SaleRepository};
