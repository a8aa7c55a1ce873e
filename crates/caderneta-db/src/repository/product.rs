//! # Product Repository (Inventory Ledger)
//!
//! Database operations for products and stock movements.
//!
//! ## The One Rule of Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Guarded Read-Modify-Write                              │
//! │                                                                         │
//! │  ❌ WRONG: read stock, check in Rust, then blind UPDATE                │
//! │     Two concurrent sales both read stock=1, both pass the check,       │
//! │     both decrement → stock = -1                                        │
//! │                                                                         │
//! │  ✅ CORRECT: guard inside the UPDATE itself                            │
//! │     UPDATE products SET stock_quantity = stock_quantity - ?            │
//! │     WHERE id = ? AND stock_quantity >= ?                               │
//! │                                                                         │
//! │     rows_affected = 0 → InsufficientStock, abort the enclosing         │
//! │     transaction. SQLite serializes writers, so the guard and the       │
//! │     subtraction are one atomic step.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every stock change appends a [`StockMovement`] audit row in the same
//! transaction: `saida` subtracts, `entrada` adds, `ajuste` overwrites,
//! `transferencia` is audit-only (net stock unchanged).

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use caderneta_core::validation::{
    validate_price_cents, validate_product_name, validate_quantity,
};
use caderneta_core::{
    CoreError, MovementType, Product, ProductUpdate, StockMovement, ValidationError,
};

const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, cost_price_cents, \
     stock_quantity, min_stock, unit, category, supplier_id, is_active, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, product_id, user_id, movement_type, quantity, reason, \
     source_location_id, destination_location_id, created_at";

/// Repository for product and stock-movement database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists active products at or below their restock threshold.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND stock_quantity <= min_stock ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Arguments
    /// * `product` - Product to insert (id generated beforehand, see
    ///   [`generate_product_id`])
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        validate_product_name(&product.name)?;
        validate_price_cents(product.price_cents)?;

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            "INSERT INTO products (\
                 id, name, description, price_cents, cost_price_cents, \
                 stock_quantity, min_stock, unit, category, supplier_id, \
                 is_active, created_at, updated_at\
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.cost_price_cents)
        .bind(product.stock_quantity)
        .bind(product.min_stock)
        .bind(&product.unit)
        .bind(&product.category)
        .bind(&product.supplier_id)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Applies an explicit update set to a product's catalog fields.
    ///
    /// `stock_quantity` is not reachable from here: stock changes only
    /// through [`register_movement`](Self::register_movement) and the
    /// sale processor's decrements.
    pub async fn update(&self, id: &str, update: &ProductUpdate) -> DbResult<Product> {
        if update.is_empty() {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", id));
        }

        if let Some(name) = &update.name {
            validate_product_name(name)?;
        }
        if let Some(price_cents) = update.price_cents {
            validate_price_cents(price_cents)?;
        }

        debug!(id = %id, "Updating product");

        let mut tx = self.pool.begin().await?;

        let mut product = fetch_product(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        if let Some(name) = &update.name {
            product.name = name.clone();
        }
        if let Some(description) = &update.description {
            product.description = Some(description.clone());
        }
        if let Some(price_cents) = update.price_cents {
            product.price_cents = price_cents;
        }
        if let Some(cost_price_cents) = update.cost_price_cents {
            product.cost_price_cents = Some(cost_price_cents);
        }
        if let Some(min_stock) = update.min_stock {
            product.min_stock = min_stock;
        }
        if let Some(unit) = &update.unit {
            product.unit = unit.clone();
        }
        if let Some(category) = &update.category {
            product.category = Some(category.clone());
        }
        if let Some(supplier_id) = &update.supplier_id {
            product.supplier_id = Some(supplier_id.clone());
        }
        product.updated_at = Utc::now();

        sqlx::query(
            "UPDATE products SET \
                 name = ?2, description = ?3, price_cents = ?4, \
                 cost_price_cents = ?5, min_stock = ?6, unit = ?7, \
                 category = ?8, supplier_id = ?9, updated_at = ?10 \
             WHERE id = ?1",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.cost_price_cents)
        .bind(product.min_stock)
        .bind(&product.unit)
        .bind(&product.category)
        .bind(&product.supplier_id)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(product)
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// Historical sales reference this product; hard deletion would break
    /// their line items. Deactivated products no longer sell.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Atomically reserves and decrements stock for a sale line.
    ///
    /// ## Contract
    /// Reads current stock and applies the decrement as a single atomic
    /// step relative to other concurrent decrements on the same product.
    /// Appends a `saida` movement in the same transaction.
    ///
    /// ## Failures
    /// * `Domain(ProductNotFound)` - Product missing or inactive
    /// * `Domain(InsufficientStock)` - `quantity > stock_quantity`; the
    ///   caller must abort the whole enclosing sale
    pub async fn reserve_and_decrement(
        &self,
        product_id: &str,
        quantity: i64,
        user_id: &str,
    ) -> DbResult<()> {
        validate_quantity(quantity)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let product = fetch_active_product(&mut tx, product_id).await?;
        decrement_stock(&mut tx, &product, quantity, now).await?;

        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            user_id: user_id.to_string(),
            movement_type: MovementType::Saida,
            quantity,
            reason: None,
            source_location_id: None,
            destination_location_id: None,
            created_at: now,
        };
        insert_movement(&mut tx, &movement).await?;

        tx.commit().await?;

        debug!(product_id = %product_id, quantity = %quantity, "Stock decremented");
        Ok(())
    }

    /// Registers a manual stock movement.
    ///
    /// ## Semantics
    /// * `Entrada` - adds `quantity` to stock
    /// * `Saida` - subtracts `quantity`, failing on insufficient stock
    /// * `Ajuste` - overwrites the absolute stock quantity
    /// * `Transferencia` - audit row between locations, net stock
    ///   unchanged; requires source and destination
    pub async fn register_movement(
        &self,
        product_id: &str,
        movement_type: MovementType,
        quantity: i64,
        reason: Option<String>,
        user_id: &str,
        source_location_id: Option<String>,
        destination_location_id: Option<String>,
    ) -> DbResult<StockMovement> {
        match movement_type {
            // Ajuste sets an absolute quantity, so zero is legal
            MovementType::Ajuste => {
                if quantity < 0 {
                    return Err(ValidationError::MustBePositive {
                        field: "quantity".to_string(),
                    }
                    .into());
                }
            }
            _ => validate_quantity(quantity)?,
        }

        if movement_type == MovementType::Transferencia
            && (source_location_id.is_none() || destination_location_id.is_none())
        {
            return Err(ValidationError::Required {
                field: "source/destination location".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let product = fetch_active_product(&mut tx, product_id).await?;

        match movement_type {
            MovementType::Entrada => {
                sqlx::query(
                    "UPDATE products SET \
                         stock_quantity = stock_quantity + ?2, updated_at = ?3 \
                     WHERE id = ?1",
                )
                .bind(product_id)
                .bind(quantity)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            MovementType::Saida => {
                decrement_stock(&mut tx, &product, quantity, now).await?;
            }
            MovementType::Ajuste => {
                sqlx::query(
                    "UPDATE products SET stock_quantity = ?2, updated_at = ?3 WHERE id = ?1",
                )
                .bind(product_id)
                .bind(quantity)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            MovementType::Transferencia => {
                // Net stock unchanged; the row below is the whole effect.
            }
        }

        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            user_id: user_id.to_string(),
            movement_type,
            quantity,
            reason,
            source_location_id,
            destination_location_id,
            created_at: now,
        };
        insert_movement(&mut tx, &movement).await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            movement_type = %movement_type,
            quantity = %quantity,
            "Stock movement registered"
        );

        Ok(movement)
    }

    /// Gets the movement audit trail for a product, newest first.
    pub async fn movements_for_product(
        &self,
        product_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE product_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction Participants
// =============================================================================
// These take `&mut SqliteConnection` so the sale processor can run them
// inside ITS transaction: the guard, the subtraction, and the audit row
// all commit or roll back together with the sale.

/// Fetches a product by id on the given connection.
pub(crate) async fn fetch_product(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(product)
}

/// Fetches a product that must exist and be active (sellable).
pub(crate) async fn fetch_active_product(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Product> {
    match fetch_product(conn, id).await? {
        Some(product) if product.is_active => Ok(product),
        _ => Err(CoreError::ProductNotFound(id.to_string()).into()),
    }
}

/// Applies a guarded stock decrement on the given connection.
///
/// The `stock_quantity >= ?` guard lives inside the UPDATE, so the check
/// and the subtraction are one atomic step; zero rows affected means the
/// stock ran out between any earlier read and now.
pub(crate) async fn decrement_stock(
    conn: &mut SqliteConnection,
    product: &Product,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE products SET \
             stock_quantity = stock_quantity - ?2, updated_at = ?3 \
         WHERE id = ?1 AND stock_quantity >= ?2",
    )
    .bind(&product.id)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock_quantity,
            requested: quantity,
        }
        .into());
    }

    Ok(())
}

/// Appends a stock-movement audit row on the given connection.
pub(crate) async fn insert_movement(
    conn: &mut SqliteConnection,
    movement: &StockMovement,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO stock_movements (\
             id, product_id, user_id, movement_type, quantity, reason, \
             source_location_id, destination_location_id, created_at\
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(&movement.user_id)
    .bind(movement.movement_type)
    .bind(movement.quantity)
    .bind(&movement.reason)
    .bind(&movement.source_location_id)
    .bind(&movement.destination_location_id)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
