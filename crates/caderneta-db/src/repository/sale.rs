//! # Sale Repository (Sale Processor)
//!
//! Converts a requested cart into a committed sale.
//!
//! ## One Sale, One Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      create_sale pipeline                               │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    │                                                                    │
//! │    ├─ 1. validate cart shape (non-empty, positive quantities,          │
//! │    │     deferred method ⇒ customer present)                           │
//! │    │                                                                    │
//! │    ├─ 2. per line: look up product, snapshot unit price,               │
//! │    │     guarded stock decrement + saida movement                      │
//! │    │         └── InsufficientStock? → ROLLBACK (nothing persists)      │
//! │    │                                                                    │
//! │    ├─ 3. classify payment method:                                      │
//! │    │       immediate → status=completed, paid_at=now                   │
//! │    │       deferred  → status=pending,   paid_at=NULL                  │
//! │    │                                                                    │
//! │    ├─ 4. INSERT sale + sale_items                                      │
//! │    │                                                                    │
//! │    └─ 5. deferred only: INSERT account_receivable                      │
//! │          (amount = total, due = caller's date or now + 30 days)        │
//! │    │                                                                    │
//! │  COMMIT ← all six steps visible together, or none at all               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no retry logic here: a failed call leaves no visible state
//! change and the adapter layer decides what to do next.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::product::{decrement_stock, fetch_active_product, insert_movement};
use crate::repository::receivable::insert_receivable;
use caderneta_core::validation::validate_new_sale;
use caderneta_core::{
    AccountReceivable, CoreError, MovementType, Money, NewSale, PaymentMethod, ReceivableStatus,
    Sale, SaleItem, SaleStatus, StockMovement, DEFAULT_DUE_DAYS,
};

const SALE_COLUMNS: &str =
    "id, customer_id, seller_id, payment_method, total_amount_cents, status, created_at, paid_at";

const SALE_ITEM_COLUMNS: &str =
    "id, sale_id, product_id, quantity, unit_price_cents, total_price_cents, created_at";

// =============================================================================
// Summary DTOs
// =============================================================================

/// Per-method slice of a day's sales.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodBreakdown {
    pub method: PaymentMethod,
    pub total_cents: i64,
    pub count: i64,
}

/// Totals for one calendar day (UTC), cancelled sales excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: chrono::NaiveDate,
    pub total_cents: i64,
    pub sale_count: i64,
    pub by_method: Vec<MethodBreakdown>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Commits a requested cart as a sale. See the module docs for the
    /// full pipeline; everything happens in one transaction.
    ///
    /// ## Failures
    /// * `Domain(Validation(..))` - empty cart, bad quantity, deferred
    ///   method without a customer
    /// * `Domain(ProductNotFound)` - a cart line references a missing or
    ///   deactivated product
    /// * `Domain(InsufficientStock)` - any line exceeds available stock;
    ///   the WHOLE sale aborts with zero stock change
    pub async fn create_sale(&self, new_sale: NewSale) -> DbResult<Sale> {
        validate_new_sale(&new_sale)?;

        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();

        debug!(
            sale_id = %sale_id,
            seller_id = %new_sale.seller_id,
            lines = new_sale.items.len(),
            "Creating sale"
        );

        let mut tx = self.pool.begin().await?;

        // Walk the cart: snapshot prices and decrement stock per line.
        // Any failure unwinds the whole transaction.
        let mut total = Money::zero();
        let mut items = Vec::with_capacity(new_sale.items.len());

        for line in &new_sale.items {
            let product = fetch_active_product(&mut tx, &line.product_id).await?;

            let unit_price = product.price();
            let line_total = unit_price.multiply_quantity(line.quantity);
            total += line_total;

            decrement_stock(&mut tx, &product, line.quantity, now).await?;

            let movement = StockMovement {
                id: Uuid::new_v4().to_string(),
                product_id: product.id.clone(),
                user_id: new_sale.seller_id.clone(),
                movement_type: MovementType::Saida,
                quantity: line.quantity,
                reason: Some(format!("venda {sale_id}")),
                source_location_id: None,
                destination_location_id: None,
                created_at: now,
            };
            insert_movement(&mut tx, &movement).await?;

            items.push(SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: product.id,
                quantity: line.quantity,
                unit_price_cents: unit_price.cents(),
                total_price_cents: line_total.cents(),
                created_at: now,
            });
        }

        // Deferred credit leaves the sale pending until its receivable
        // settles; anything else completes on the spot.
        let deferred = new_sale.payment_method.is_deferred();
        let (status, paid_at) = if deferred {
            (SaleStatus::Pending, None)
        } else {
            (SaleStatus::Completed, Some(now))
        };

        let sale = Sale {
            id: sale_id.clone(),
            customer_id: new_sale.customer_id.clone(),
            seller_id: new_sale.seller_id.clone(),
            payment_method: new_sale.payment_method,
            total_amount_cents: total.cents(),
            status,
            created_at: now,
            paid_at,
        };

        sqlx::query(
            "INSERT INTO sales (\
                 id, customer_id, seller_id, payment_method, \
                 total_amount_cents, status, created_at, paid_at\
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&sale.id)
        .bind(&sale.customer_id)
        .bind(&sale.seller_id)
        .bind(sale.payment_method)
        .bind(sale.total_amount_cents)
        .bind(sale.status)
        .bind(sale.created_at)
        .bind(sale.paid_at)
        .execute(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                "INSERT INTO sale_items (\
                     id, sale_id, product_id, quantity, \
                     unit_price_cents, total_price_cents, created_at\
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.total_price_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        if deferred {
            // validate_new_sale guarantees the customer is present here
            let customer_id = new_sale
                .customer_id
                .clone()
                .ok_or_else(|| CoreError::inconsistent("deferred sale without customer"))?;

            let due_date = new_sale
                .due_date
                .unwrap_or_else(|| now + Duration::days(DEFAULT_DUE_DAYS));

            let receivable = AccountReceivable {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                customer_id,
                amount_cents: total.cents(),
                paid_amount_cents: 0,
                due_date,
                status: ReceivableStatus::derive(0, total.cents(), due_date, now),
                notes: None,
                created_at: now,
                paid_at: None,
            };
            insert_receivable(&mut tx, &receivable).await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            total = %total,
            items = items.len(),
            deferred = deferred,
            "Sale committed"
        );

        Ok(sale)
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets all items for a sale, in cart order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {SALE_ITEM_COLUMNS} FROM sale_items \
             WHERE sale_id = ?1 ORDER BY rowid"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists sales, newest first.
    pub async fn list_recent(&self, limit: u32, offset: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Cancels a sale.
    ///
    /// Cancellation does NOT reverse the stock decrement and does NOT
    /// void an attached receivable. Adapters needing reversal must
    /// register a compensating `entrada` movement explicitly.
    pub async fn cancel_sale(&self, sale_id: &str) -> DbResult<Sale> {
        let sale = self
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

        if sale.status == SaleStatus::Cancelled {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: sale_id.to_string(),
                current_status: "cancelled".to_string(),
            }
            .into());
        }

        sqlx::query("UPDATE sales SET status = ?2 WHERE id = ?1")
            .bind(sale_id)
            .bind(SaleStatus::Cancelled)
            .execute(&self.pool)
            .await?;

        info!(sale_id = %sale_id, "Sale cancelled");

        Ok(Sale {
            status: SaleStatus::Cancelled,
            ..sale
        })
    }

    /// Totals for one UTC calendar day, grouped by payment method.
    /// Cancelled sales are excluded.
    pub async fn daily_summary(&self, date: chrono::NaiveDate) -> DbResult<DailySummary> {
        let day_start = DateTime::<Utc>::from_naive_utc_and_offset(
            date.and_time(NaiveTime::MIN),
            Utc,
        );
        let day_end = day_start + Duration::days(1);

        let rows = sqlx::query_as::<_, (PaymentMethod, i64, i64)>(
            "SELECT payment_method, SUM(total_amount_cents), COUNT(*) \
             FROM sales \
             WHERE created_at >= ?1 AND created_at < ?2 AND status != 'cancelled' \
             GROUP BY payment_method",
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.pool)
        .await?;

        let by_method: Vec<MethodBreakdown> = rows
            .into_iter()
            .map(|(method, total_cents, count)| MethodBreakdown {
                method,
                total_cents,
                count,
            })
            .collect();

        let total_cents = by_method.iter().map(|m| m.total_cents).sum();
        let sale_count = by_method.iter().map(|m| m.count).sum();

        Ok(DailySummary {
            date,
            total_cents,
            sale_count,
            by_method,
        })
    }
}

// =============================================================================
// Transaction Participants
// =============================================================================

/// Completes a pending sale once its receivable is fully paid.
///
/// Runs on the caller's connection so the sale transition commits with
/// the payment that caused it. A sale that is no longer pending is left
/// untouched (already completed, or cancelled out-of-band).
pub(crate) async fn complete_sale(
    conn: &mut SqliteConnection,
    sale_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE sales SET status = ?2, paid_at = ?3 \
         WHERE id = ?1 AND status = ?4",
    )
    .bind(sale_id)
    .bind(SaleStatus::Completed)
    .bind(now)
    .bind(SaleStatus::Pending)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        debug!(sale_id = %sale_id, "Sale not pending, skipping completion sync");
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::generate_product_id;
    use caderneta_core::{CartLine, Product};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, name: &str, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            name: name.to_string(),
            description: None,
            price_cents,
            cost_price_cents: None,
            stock_quantity: stock,
            min_stock: 0,
            unit: "unidade".to_string(),
            category: None,
            supplier_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap()
    }

    fn cash_sale(lines: Vec<CartLine>) -> NewSale {
        NewSale {
            seller_id: "seller-1".to_string(),
            customer_id: None,
            payment_method: PaymentMethod::Dinheiro,
            items: lines,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn test_cash_sale_completes_immediately() {
        let db = test_db().await;
        let product = seed_product(&db, "Café 500g", 1550, 10).await;

        let sale = db
            .sales()
            .create_sale(cash_sale(vec![CartLine {
                product_id: product.id.clone(),
                quantity: 2,
            }]))
            .await
            .unwrap();

        assert_eq!(sale.status, SaleStatus::Completed);
        assert!(sale.paid_at.is_some());
        assert_eq!(sale.total_amount_cents, 3100);

        // stock decremented, items persisted with price snapshot
        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 8);

        let items = db.sales().get_items(&sale.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_price_cents, 1550);
        assert_eq!(items[0].total_price_cents, 3100);

        // no receivable for an immediate sale
        assert!(db
            .receivables()
            .get_by_sale(&sale.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_total_is_server_computed() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Açúcar 1kg", 450, 10).await;
        let p2 = seed_product(&db, "Óleo 900ml", 780, 10).await;

        let sale = db
            .sales()
            .create_sale(cash_sale(vec![
                CartLine {
                    product_id: p1.id.clone(),
                    quantity: 3,
                },
                CartLine {
                    product_id: p2.id.clone(),
                    quantity: 2,
                },
            ]))
            .await
            .unwrap();

        // 3×450 + 2×780
        assert_eq!(sale.total_amount_cents, 2910);

        let items = db.sales().get_items(&sale.id).await.unwrap();
        let sum: i64 = items.iter().map(|i| i.total_price_cents).sum();
        assert_eq!(sum, sale.total_amount_cents);
    }

    #[tokio::test]
    async fn test_fiado_sale_creates_receivable() {
        let db = test_db().await;
        let product = seed_product(&db, "Leite 1L", 560, 10).await;

        let due = Utc::now() + Duration::days(30);
        let sale = db
            .sales()
            .create_sale(NewSale {
                seller_id: "seller-1".to_string(),
                customer_id: Some("customer-1".to_string()),
                payment_method: PaymentMethod::Fiado,
                items: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: 4,
                }],
                due_date: Some(due),
            })
            .await
            .unwrap();

        assert_eq!(sale.status, SaleStatus::Pending);
        assert!(sale.paid_at.is_none());
        assert_eq!(sale.total_amount_cents, 4 * 560);

        let receivable = db
            .receivables()
            .get_by_sale(&sale.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receivable.amount_cents, sale.total_amount_cents);
        assert_eq!(receivable.paid_amount_cents, 0);
        assert_eq!(receivable.status, ReceivableStatus::Pending);
        assert_eq!(receivable.customer_id, "customer-1");

        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 6);
    }

    #[tokio::test]
    async fn test_fiado_sale_defaults_due_date() {
        let db = test_db().await;
        let product = seed_product(&db, "Pão", 80, 10).await;

        let before = Utc::now();
        let sale = db
            .sales()
            .create_sale(NewSale {
                seller_id: "seller-1".to_string(),
                customer_id: Some("customer-1".to_string()),
                payment_method: PaymentMethod::Credito,
                items: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: 1,
                }],
                due_date: None,
            })
            .await
            .unwrap();

        let receivable = db
            .receivables()
            .get_by_sale(&sale.id)
            .await
            .unwrap()
            .unwrap();
        let min_due = before + Duration::days(DEFAULT_DUE_DAYS) - Duration::minutes(1);
        assert!(receivable.due_date > min_due);
    }

    #[tokio::test]
    async fn test_fiado_without_customer_rejected() {
        let db = test_db().await;
        let product = seed_product(&db, "Sabão", 350, 10).await;

        let err = db
            .sales()
            .create_sale(NewSale {
                seller_id: "seller-1".to_string(),
                customer_id: None,
                payment_method: PaymentMethod::Fiado,
                items: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: 1,
                }],
                due_date: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        // nothing persisted
        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_all_or_nothing_on_insufficient_second_line() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Arroz 5kg", 2590, 10).await;
        let p2 = seed_product(&db, "Feijão 1kg", 890, 1).await;

        let err = db
            .sales()
            .create_sale(cash_sale(vec![
                CartLine {
                    product_id: p1.id.clone(),
                    quantity: 2,
                },
                CartLine {
                    product_id: p2.id.clone(),
                    quantity: 5, // only 1 in stock
                },
            ]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));

        // zero stock change on BOTH products, zero sale rows
        let l1 = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        let l2 = db.products().get_by_id(&p2.id).await.unwrap().unwrap();
        assert_eq!(l1.stock_quantity, 10);
        assert_eq!(l2.stock_quantity, 1);

        assert!(db.sales().list_recent(10, 0).await.unwrap().is_empty());
        assert!(db
            .products()
            .movements_for_product(&p1.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_aborts_sale() {
        let db = test_db().await;
        let product = seed_product(&db, "Macarrão", 420, 10).await;

        let err = db
            .sales()
            .create_sale(cash_sale(vec![
                CartLine {
                    product_id: product.id.clone(),
                    quantity: 1,
                },
                CartLine {
                    product_id: "missing".to_string(),
                    quantity: 1,
                },
            ]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::ProductNotFound(_))
        ));

        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let db = test_db().await;

        let err = db.sales().create_sale(cash_sale(vec![])).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cancel_sale_does_not_restock() {
        let db = test_db().await;
        let product = seed_product(&db, "Farinha", 610, 10).await;

        let sale = db
            .sales()
            .create_sale(cash_sale(vec![CartLine {
                product_id: product.id.clone(),
                quantity: 3,
            }]))
            .await
            .unwrap();

        let cancelled = db.sales().cancel_sale(&sale.id).await.unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);

        // stock stays decremented: no invented reversal semantics
        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 7);

        // cancelling twice is an error
        let err = db.sales().cancel_sale(&sale.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidSaleStatus { .. })
        ));
    }

    /// Stock non-negativity under concurrent sales: with stock 5 and 12
    /// concurrent single-unit sales, exactly 5 succeed and the final
    /// stock is 0. Uses a file-backed database so the tasks really race
    /// on separate connections; losers of a write race retry on
    /// `ConcurrencyConflict` exactly as an adapter would.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caderneta_test.db");
        let db = Database::new(DbConfig::new(&path).max_connections(8))
            .await
            .unwrap();

        let product = seed_product(&db, "Carvão 3kg", 1200, 5).await;

        let mut handles = Vec::new();
        for _ in 0..12 {
            let db = db.clone();
            let product_id = product.id.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let result = db
                        .sales()
                        .create_sale(cash_sale(vec![CartLine {
                            product_id: product_id.clone(),
                            quantity: 1,
                        }]))
                        .await;
                    match result {
                        Ok(_) => return true,
                        Err(DbError::ConcurrencyConflict(_)) => continue,
                        Err(DbError::Domain(CoreError::InsufficientStock { .. })) => {
                            return false
                        }
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 5);

        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 0);

        // initial minus the sum of quantities from sales that succeeded
        let sales = db.sales().list_recent(100, 0).await.unwrap();
        assert_eq!(sales.len(), 5);
    }

    #[tokio::test]
    async fn test_daily_summary() {
        let db = test_db().await;
        let product = seed_product(&db, "Refrigerante 2L", 999, 100).await;

        for _ in 0..3 {
            db.sales()
                .create_sale(cash_sale(vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: 1,
                }]))
                .await
                .unwrap();
        }
        db.sales()
            .create_sale(NewSale {
                seller_id: "seller-1".to_string(),
                customer_id: Some("customer-1".to_string()),
                payment_method: PaymentMethod::Fiado,
                items: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: 2,
                }],
                due_date: None,
            })
            .await
            .unwrap();

        let summary = db
            .sales()
            .daily_summary(Utc::now().date_naive())
            .await
            .unwrap();

        assert_eq!(summary.sale_count, 4);
        assert_eq!(summary.total_cents, 3 * 999 + 2 * 999);
        assert_eq!(summary.by_method.len(), 2);

        let fiado = summary
            .by_method
            .iter()
            .find(|m| m.method == PaymentMethod::Fiado)
            .unwrap();
        assert_eq!(fiado.count, 1);
        assert_eq!(fiado.total_cents, 2 * 999);
    }
}
