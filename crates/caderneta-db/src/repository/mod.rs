//! # Repository Implementations
//!
//! One repository per aggregate, mirroring the component split:
//!
//! - [`product`] - Inventory Ledger: stock quantities, guarded
//!   decrements, stock-movement audit trail
//! - [`sale`] - Sale Processor: atomic cart-to-sale commit
//! - [`receivable`] - Receivables Ledger and FIFO Payment Allocator
//!
//! ## Transaction Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every externally triggered unit of work (sale creation, payment       │
//! │  application, standalone stock movement) runs its reads-then-writes    │
//! │  inside ONE sqlx transaction. Helpers that participate in a larger    │
//! │  unit of work take `&mut SqliteConnection` so the caller's            │
//! │  transaction is the only transaction.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod product;
pub mod receivable;
pub mod sale;
