//! # Domain Types
//!
//! Core domain types used throughout Caderneta POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌───────────────────┐    │
//! │  │    Product      │   │      Sale       │   │ AccountReceivable │    │
//! │  │  ─────────────  │   │  ─────────────  │   │  ───────────────  │    │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)        │    │
//! │  │  price_cents    │   │  status         │   │  sale_id (1:1)    │    │
//! │  │  stock_quantity │   │  total_amount   │   │  amount / paid    │    │
//! │  │  unit           │   │  payment_method │   │  due_date, status │    │
//! │  └─────────────────┘   └─────────────────┘   └───────────────────┘    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌───────────────────┐    │
//! │  │    SaleItem     │   │    Payment      │   │  StockMovement    │    │
//! │  │  price snapshot │   │  append-only    │   │  append-only      │    │
//! │  └─────────────────┘   └─────────────────┘   └───────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ledger Invariants
//! 1. `Product.stock_quantity >= 0`, always.
//! 2. `AccountReceivable.paid_amount_cents == Σ Payment.amount_cents` and
//!    `paid_amount_cents <= amount_cents`.
//! 3. `AccountReceivable.status` is a pure function of
//!    `(paid_amount, amount, due_date, now)`, see [`ReceivableStatus::derive`].
//! 4. `Sale.total_amount_cents == Σ SaleItem.total_price_cents`, computed at
//!    commit time and never recomputed later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Deferred sale awaiting settlement of its receivable.
    Pending,
    /// Sale has been paid in full.
    Completed,
    /// Sale was cancelled. Inventory and receivables are NOT reversed.
    Cancelled,
}

// =============================================================================
// Receivable Status
// =============================================================================

/// The status of an account receivable.
///
/// Transitions are monotonic on `paid_amount` increasing:
/// `pending → partial → paid`, where `pending` is reported as `overdue`
/// once the due date passes. `paid` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReceivableStatus {
    /// Nothing paid yet, not past due.
    Pending,
    /// Partially paid (0 < paid < amount).
    Partial,
    /// Nothing paid and past due.
    Overdue,
    /// Fully paid. Terminal.
    Paid,
}

impl ReceivableStatus {
    /// Recomputes the status from ledger values.
    ///
    /// This is THE canonical recompute rule, applied after every mutation
    /// of `paid_amount` or `due_date`. Precedence is fixed:
    /// **paid > partial > overdue > pending**.
    ///
    /// ```text
    /// if paid_amount >= amount:   paid
    /// elif paid_amount > 0:       partial
    /// elif due_date < now:        overdue
    /// else:                       pending
    /// ```
    ///
    /// Note that a partially paid receivable past its due date reports
    /// `partial`, not `overdue`: the partial branch wins.
    pub fn derive(
        paid_amount_cents: i64,
        amount_cents: i64,
        due_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        if paid_amount_cents >= amount_cents {
            ReceivableStatus::Paid
        } else if paid_amount_cents > 0 {
            ReceivableStatus::Partial
        } else if due_date < now {
            ReceivableStatus::Overdue
        } else {
            ReceivableStatus::Pending
        }
    }

    /// Whether the receivable still accepts payments.
    #[inline]
    pub const fn is_open(&self) -> bool {
        !matches!(self, ReceivableStatus::Paid)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale (or a receivable payment) was tendered.
///
/// ## Deferred-Credit Policy
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Payment method classification                                          │
/// │                                                                         │
/// │  IMMEDIATE (sale completes now)     DEFERRED (creates a receivable)    │
/// │  ──────────────────────────────     ──────────────────────────────     │
/// │  Dinheiro (cash)                    Fiado   (store credit notebook)    │
/// │  Cartao   (card)                    Credito (credit arrangement)       │
/// │  Pix      (instant transfer)        APrazo  (installment term)         │
/// │                                                                         │
/// │  The classification is a closed enum policy, not substring matching:   │
/// │  a new method can never silently fall on the wrong side.               │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash.
    Dinheiro,
    /// Card on an external terminal.
    Cartao,
    /// PIX instant transfer.
    Pix,
    /// The classic notebook credit ("caderneta de fiado").
    Fiado,
    /// Credit arrangement with the customer.
    Credito,
    /// Installment term ("a prazo").
    APrazo,
}

impl PaymentMethod {
    /// Whether this method denotes deferred credit.
    ///
    /// A deferred sale is committed with status `pending` and produces
    /// exactly one [`AccountReceivable`]; an immediate sale completes on
    /// the spot.
    #[inline]
    pub const fn is_deferred(&self) -> bool {
        matches!(
            self,
            PaymentMethod::Fiado | PaymentMethod::Credito | PaymentMethod::APrazo
        )
    }

    /// Canonical storage/wire string for this method.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Dinheiro => "dinheiro",
            PaymentMethod::Cartao => "cartao",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Fiado => "fiado",
            PaymentMethod::Credito => "credito",
            PaymentMethod::APrazo => "a_prazo",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive parse accepting the spellings the original data
/// carries, accents included ("cartão", "crédito", "a prazo").
impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dinheiro" => Ok(PaymentMethod::Dinheiro),
            "cartao" | "cartão" => Ok(PaymentMethod::Cartao),
            "pix" => Ok(PaymentMethod::Pix),
            "fiado" => Ok(PaymentMethod::Fiado),
            "credito" | "crédito" => Ok(PaymentMethod::Credito),
            "a prazo" | "a_prazo" | "aprazo" => Ok(PaymentMethod::APrazo),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: vec![
                    "dinheiro".to_string(),
                    "cartao".to_string(),
                    "pix".to_string(),
                    "fiado".to_string(),
                    "credito".to_string(),
                    "a_prazo".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// Stock Movement Type
// =============================================================================

/// Kind of stock movement, audited on every change to a product's
/// on-hand quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Replenishment: adds to stock.
    Entrada,
    /// Outflow (sale or manual removal): subtracts from stock.
    Saida,
    /// Correction: overwrites the absolute stock quantity.
    Ajuste,
    /// Transfer between locations: audit-only, net stock unchanged.
    Transferencia,
}

impl MovementType {
    /// Canonical storage/wire string (unaccented).
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entrada => "entrada",
            MovementType::Saida => "saida",
            MovementType::Ajuste => "ajuste",
            MovementType::Transferencia => "transferencia",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "entrada" => Ok(MovementType::Entrada),
            "saida" | "saída" => Ok(MovementType::Saida),
            "ajuste" => Ok(MovementType::Ajuste),
            "transferencia" | "transferência" => Ok(MovementType::Transferencia),
            _ => Err(ValidationError::NotAllowed {
                field: "movement_type".to_string(),
                allowed: vec![
                    "entrada".to_string(),
                    "saida".to_string(),
                    "ajuste".to_string(),
                    "transferencia".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// `stock_quantity` is owned by the inventory ledger: it changes only
/// through guarded decrement/replenish/adjust operations, never through
/// a plain field update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Sale unit price in centavos.
    pub price_cents: i64,

    /// Cost price in centavos (for margin reporting).
    pub cost_price_cents: Option<i64>,

    /// Current on-hand quantity. Never negative.
    pub stock_quantity: i64,

    /// Restock threshold: at or below this, the product is low-stock.
    pub min_stock: i64,

    /// Sale unit ("unidade", "kg", ...).
    pub unit: String,

    /// Optional category label.
    pub category: Option<String>,

    /// Supplier identity, owned by external supplier management.
    pub supplier_id: Option<String>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the sale price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether the requested quantity is in stock.
    #[inline]
    pub fn has_stock(&self, quantity: i64) -> bool {
        self.stock_quantity >= quantity
    }

    /// Whether the product is at or below its restock threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock
    }
}

/// Explicit update set for a product's mutable catalog fields.
///
/// Only fields that are `Some` are applied. `stock_quantity` is
/// deliberately absent: stock changes only through the inventory ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub cost_price_cents: Option<i64>,
    pub min_stock: Option<i64>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub supplier_id: Option<String>,
}

impl ProductUpdate {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price_cents.is_none()
            && self.cost_price_cents.is_none()
            && self.min_stock.is_none()
            && self.unit.is_none()
            && self.category.is_none()
            && self.supplier_id.is_none()
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale transaction.
///
/// Immutable once its items are committed, except for `status`/`paid_at`
/// transitions driven by the receivables ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// Customer identity; `None` for walk-in sales. Required for deferred
    /// payment methods (a receivable needs a debtor).
    pub customer_id: Option<String>,
    /// Authenticated seller principal, recorded verbatim.
    pub seller_id: String,
    pub payment_method: PaymentMethod,
    /// Sum of line totals, server-computed at commit time.
    pub total_amount_cents: i64,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Sale {
    /// Returns the total as Money.
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses the snapshot pattern: `unit_price_cents` freezes the product price
/// at sale time and is never re-read from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Quantity sold. Always positive.
    pub quantity: i64,
    /// Unit price in centavos at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Line total: `quantity × unit_price_cents`.
    pub total_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

/// One requested line of a sale cart: what the caller asks for.
/// Prices are NEVER accepted from the caller; the processor snapshots
/// the catalog price server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A requested sale, as handed to the sale processor.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub seller_id: String,
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub items: Vec<CartLine>,
    /// Due date for the receivable when the method is deferred.
    /// Defaults to `now + DEFAULT_DUE_DAYS`.
    pub due_date: Option<DateTime<Utc>>,
}

// =============================================================================
// Account Receivable
// =============================================================================

/// A tracked amount owed by a customer for one deferred sale.
///
/// 1:1 with its sale (`sale_id` is unique). `amount_cents` is frozen at
/// creation; `paid_amount_cents` only ever grows, and always equals the
/// sum of the receivable's payments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AccountReceivable {
    pub id: String,
    pub sale_id: String,
    pub customer_id: String,
    /// Total owed, in centavos. Frozen at creation.
    pub amount_cents: i64,
    /// Total received so far. Monotonically non-decreasing,
    /// `0 <= paid_amount_cents <= amount_cents`.
    pub paid_amount_cents: i64,
    pub due_date: DateTime<Utc>,
    pub status: ReceivableStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Stamped exactly once, when `paid_amount_cents` reaches
    /// `amount_cents`.
    pub paid_at: Option<DateTime<Utc>>,
}

impl AccountReceivable {
    /// Amount still owed, in centavos.
    #[inline]
    pub fn remaining_cents(&self) -> i64 {
        self.amount_cents - self.paid_amount_cents
    }

    /// Amount still owed as Money.
    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_cents(self.remaining_cents())
    }

    /// Total owed as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Total received as Money.
    #[inline]
    pub fn paid_amount(&self) -> Money {
        Money::from_cents(self.paid_amount_cents)
    }
}

/// Explicit update set for a receivable's mutable fields.
///
/// `paid_amount` is deliberately absent: it moves only when payments
/// are recorded, keeping the payments-sum invariant intact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceivableUpdate {
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl ReceivableUpdate {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.due_date.is_none() && self.notes.is_none()
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment recorded against a receivable. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub account_receivable_id: String,
    /// Amount in centavos. Always positive.
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub payment_date: DateTime<Utc>,
    pub notes: Option<String>,
    /// Authenticated principal who recorded the payment.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// A requested payment against a single receivable.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    /// When the money actually changed hands; defaults to now.
    pub payment_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: String,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Append-only audit record of a stock change. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    /// Principal who caused the movement.
    pub user_id: String,
    pub movement_type: MovementType,
    /// For `entrada`/`saida`: the delta. For `ajuste`: the new absolute
    /// quantity. For `transferencia`: the quantity moved between
    /// locations.
    pub quantity: i64,
    pub reason: Option<String>,
    pub source_location_id: Option<String>,
    pub destination_location_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
