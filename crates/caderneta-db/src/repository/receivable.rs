//! # Receivable Repository (Receivables Ledger + Payment Allocator)
//!
//! Maintains the per-customer receivables ledger: one receivable per
//! deferred sale, payments appended against it, status recomputed after
//! every mutation.
//!
//! ## FIFO Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            apply_customer_payment(customer, R$40.00)                    │
//! │                                                                         │
//! │  Open receivables, oldest due date first:                              │
//! │                                                                         │
//! │    R1  due 2024-01-01  remaining R$30.00  ──► pay R$30.00 → PAID       │
//! │    R2  due 2024-02-01  remaining R$50.00  ──► pay R$10.00 → PARTIAL    │
//! │    R3  due 2024-03-01  remaining R$20.00  ──► untouched                │
//! │                                                                         │
//! │  Failures happen BEFORE any write:                                     │
//! │    no open receivables        → NoOutstandingAccounts                  │
//! │    amount > Σ remaining       → AmountExceedsDue                       │
//! │                                                                         │
//! │  The walk commits as ONE transaction: payments, paid_amount bumps,     │
//! │  status recomputes and sale completions all land together.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Recompute
//! Every `paid_amount`/`due_date` mutation re-runs
//! [`ReceivableStatus::derive`] with the canonical precedence
//! paid > partial > overdue > pending. `paid_at` is stamped exactly once,
//! and reaching `paid` completes the owning sale in the same transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::sale::complete_sale;
use caderneta_core::validation::validate_payment_amount;
use caderneta_core::{
    AccountReceivable, CoreError, NewPayment, Payment, PaymentMethod, ReceivableStatus,
    ReceivableUpdate,
};

const RECEIVABLE_COLUMNS: &str = "id, sale_id, customer_id, amount_cents, paid_amount_cents, \
     due_date, status, notes, created_at, paid_at";

const PAYMENT_COLUMNS: &str = "id, account_receivable_id, amount_cents, payment_method, \
     payment_date, notes, created_by, created_at";

// =============================================================================
// Summary DTO
// =============================================================================

/// Totals over open receivables past their due date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverdueSummary {
    pub overdue_count: i64,
    pub total_remaining_cents: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for receivable and payment database operations.
#[derive(Debug, Clone)]
pub struct ReceivableRepository {
    pool: SqlitePool,
}

impl ReceivableRepository {
    /// Creates a new ReceivableRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReceivableRepository { pool }
    }

    /// Gets a receivable by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<AccountReceivable>> {
        let mut conn = self.pool.acquire().await?;
        fetch_receivable(&mut conn, id).await
    }

    /// Gets the receivable attached to a sale, if any.
    pub async fn get_by_sale(&self, sale_id: &str) -> DbResult<Option<AccountReceivable>> {
        let receivable = sqlx::query_as::<_, AccountReceivable>(&format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM account_receivables WHERE sale_id = ?1"
        ))
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(receivable)
    }

    /// Lists all of a customer's receivables, oldest due date first.
    pub async fn list_by_customer(&self, customer_id: &str) -> DbResult<Vec<AccountReceivable>> {
        let receivables = sqlx::query_as::<_, AccountReceivable>(&format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM account_receivables \
             WHERE customer_id = ?1 ORDER BY due_date ASC, rowid ASC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(receivables)
    }

    /// Lists a customer's open receivables (pending/partial/overdue) in
    /// allocation order: ascending due date, ledger insertion order on
    /// ties.
    pub async fn list_open_for_customer(
        &self,
        customer_id: &str,
    ) -> DbResult<Vec<AccountReceivable>> {
        let mut conn = self.pool.acquire().await?;
        fetch_open_for_customer(&mut conn, customer_id).await
    }

    /// Gets the payments recorded against a receivable, newest first.
    pub async fn payments_for_account(&self, account_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE account_receivable_id = ?1 ORDER BY payment_date DESC, rowid DESC"
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Manually attaches a receivable to an existing sale.
    ///
    /// The sale processor already does this for deferred sales; this
    /// path exists for migrating ledgers and correcting imports. The
    /// `sale_id` UNIQUE constraint enforces the one-receivable-per-sale
    /// rule.
    pub async fn create_for_sale(
        &self,
        sale_id: &str,
        due_date: DateTime<Utc>,
        notes: Option<String>,
    ) -> DbResult<AccountReceivable> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let sale = sqlx::query_as::<_, caderneta_core::Sale>(
            "SELECT id, customer_id, seller_id, payment_method, total_amount_cents, \
                    status, created_at, paid_at \
             FROM sales WHERE id = ?1",
        )
        .bind(sale_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::Domain(CoreError::SaleNotFound(sale_id.to_string())))?;

        let customer_id = sale.customer_id.ok_or_else(|| {
            DbError::Domain(CoreError::invalid_amount(
                "sale has no customer to owe the receivable",
            ))
        })?;

        let receivable = AccountReceivable {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.to_string(),
            customer_id,
            amount_cents: sale.total_amount_cents,
            paid_amount_cents: 0,
            due_date,
            status: ReceivableStatus::derive(0, sale.total_amount_cents, due_date, now),
            notes,
            created_at: now,
            paid_at: None,
        };
        insert_receivable(&mut tx, &receivable).await?;

        tx.commit().await?;

        Ok(receivable)
    }

    /// Records a payment against a single receivable.
    ///
    /// ## Failures
    /// * `Domain(ReceivableNotFound)` - no such receivable
    /// * `Domain(Validation(..))` - amount is zero or negative
    /// * `Domain(InvalidAmount)` - amount exceeds the remaining balance
    ///   (a paid receivable has remaining 0, so it rejects everything)
    pub async fn record_payment(
        &self,
        account_id: &str,
        payment: NewPayment,
    ) -> DbResult<Payment> {
        validate_payment_amount(payment.amount_cents)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let account = fetch_receivable(&mut tx, account_id)
            .await?
            .ok_or_else(|| {
                DbError::Domain(CoreError::ReceivableNotFound(account_id.to_string()))
            })?;

        if payment.amount_cents > account.remaining_cents() {
            return Err(CoreError::invalid_amount(format!(
                "payment of {} centavos exceeds remaining balance of {} centavos",
                payment.amount_cents,
                account.remaining_cents()
            ))
            .into());
        }

        let paid = apply_payment(
            &mut tx,
            &account,
            payment.amount_cents,
            payment.payment_method,
            payment.payment_date.unwrap_or(now),
            payment.notes,
            &payment.created_by,
            now,
        )
        .await?;

        tx.commit().await?;

        info!(
            account_id = %account_id,
            amount_cents = payment.amount_cents,
            "Payment recorded"
        );

        Ok(paid)
    }

    /// Applies a lump customer payment across open receivables, oldest
    /// due date first (FIFO). See the module docs for the walk.
    ///
    /// ## Failures (all before any write)
    /// * `Domain(Validation(..))` - amount is zero or negative
    /// * `Domain(NoOutstandingAccounts)` - customer has nothing open
    /// * `Domain(AmountExceedsDue)` - amount exceeds the total due
    pub async fn apply_customer_payment(
        &self,
        customer_id: &str,
        amount_cents: i64,
        payment_method: PaymentMethod,
        notes: Option<String>,
        created_by: &str,
    ) -> DbResult<Vec<Payment>> {
        validate_payment_amount(amount_cents)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let open = fetch_open_for_customer(&mut tx, customer_id).await?;
        if open.is_empty() {
            return Err(CoreError::NoOutstandingAccounts {
                customer_id: customer_id.to_string(),
            }
            .into());
        }

        let total_due: i64 = open.iter().map(|a| a.remaining_cents()).sum();
        if amount_cents > total_due {
            return Err(CoreError::AmountExceedsDue {
                requested_cents: amount_cents,
                total_due_cents: total_due,
            }
            .into());
        }

        debug!(
            customer_id = %customer_id,
            amount_cents = amount_cents,
            open_accounts = open.len(),
            total_due_cents = total_due,
            "Allocating customer payment"
        );

        let mut remaining = amount_cents;
        let mut payments = Vec::new();

        for account in &open {
            if remaining == 0 {
                break;
            }

            let applied = remaining.min(account.remaining_cents());
            let payment = apply_payment(
                &mut tx,
                account,
                applied,
                payment_method,
                now,
                notes.clone(),
                created_by,
                now,
            )
            .await?;
            payments.push(payment);
            remaining -= applied;
        }

        if remaining != 0 {
            // total_due covered the amount, so the walk must consume it all
            return Err(CoreError::inconsistent(format!(
                "allocation left {remaining} centavos unapplied"
            ))
            .into());
        }

        tx.commit().await?;

        info!(
            customer_id = %customer_id,
            amount_cents = amount_cents,
            payments = payments.len(),
            "Customer payment allocated"
        );

        Ok(payments)
    }

    /// Applies an explicit update set to a receivable, then re-runs the
    /// canonical status recompute.
    ///
    /// `paid_amount` is not reachable from here: it moves only through
    /// payments, keeping paid_amount == Σ payments intact.
    pub async fn update(
        &self,
        account_id: &str,
        update: &ReceivableUpdate,
    ) -> DbResult<AccountReceivable> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut account = fetch_receivable(&mut tx, account_id)
            .await?
            .ok_or_else(|| {
                DbError::Domain(CoreError::ReceivableNotFound(account_id.to_string()))
            })?;

        if let Some(due_date) = update.due_date {
            account.due_date = due_date;
        }
        if let Some(notes) = &update.notes {
            account.notes = Some(notes.clone());
        }

        account.status = ReceivableStatus::derive(
            account.paid_amount_cents,
            account.amount_cents,
            account.due_date,
            now,
        );

        sqlx::query(
            "UPDATE account_receivables \
             SET due_date = ?2, notes = ?3, status = ?4 \
             WHERE id = ?1",
        )
        .bind(&account.id)
        .bind(account.due_date)
        .bind(&account.notes)
        .bind(account.status)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(account)
    }

    /// Sweeps pending receivables past their due date to `overdue`.
    ///
    /// Status is a pure function of `(paid, amount, due_date, now)`, and
    /// `now` moves on its own: this re-derives the stored column so
    /// queries over `status` see fresh values. Returns how many rows
    /// transitioned.
    pub async fn refresh_overdue(&self) -> DbResult<u64> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE account_receivables SET status = ?1 \
             WHERE status = ?2 AND due_date < ?3",
        )
        .bind(ReceivableStatus::Overdue)
        .bind(ReceivableStatus::Pending)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let transitioned = result.rows_affected();
        if transitioned > 0 {
            info!(count = transitioned, "Receivables marked overdue");
        }

        Ok(transitioned)
    }

    /// Totals over open receivables past their due date, partial ones
    /// included.
    pub async fn overdue_summary(&self) -> DbResult<OverdueSummary> {
        let now = Utc::now();

        let (overdue_count, total_remaining_cents): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(amount_cents - paid_amount_cents), 0) \
             FROM account_receivables \
             WHERE status != ?1 AND due_date < ?2",
        )
        .bind(ReceivableStatus::Paid)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(OverdueSummary {
            overdue_count,
            total_remaining_cents,
        })
    }
}

// =============================================================================
// Transaction Participants
// =============================================================================

/// Fetches a receivable by id on the given connection.
pub(crate) async fn fetch_receivable(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<AccountReceivable>> {
    let receivable = sqlx::query_as::<_, AccountReceivable>(&format!(
        "SELECT {RECEIVABLE_COLUMNS} FROM account_receivables WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(receivable)
}

/// Fetches a customer's open receivables in allocation order on the
/// given connection.
async fn fetch_open_for_customer(
    conn: &mut SqliteConnection,
    customer_id: &str,
) -> DbResult<Vec<AccountReceivable>> {
    let receivables = sqlx::query_as::<_, AccountReceivable>(&format!(
        "SELECT {RECEIVABLE_COLUMNS} FROM account_receivables \
         WHERE customer_id = ?1 AND status IN (?2, ?3, ?4) \
         ORDER BY due_date ASC, rowid ASC"
    ))
    .bind(customer_id)
    .bind(ReceivableStatus::Pending)
    .bind(ReceivableStatus::Partial)
    .bind(ReceivableStatus::Overdue)
    .fetch_all(&mut *conn)
    .await?;

    Ok(receivables)
}

/// Inserts a receivable row on the given connection.
pub(crate) async fn insert_receivable(
    conn: &mut SqliteConnection,
    receivable: &AccountReceivable,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO account_receivables (\
             id, sale_id, customer_id, amount_cents, paid_amount_cents, \
             due_date, status, notes, created_at, paid_at\
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )
    .bind(&receivable.id)
    .bind(&receivable.sale_id)
    .bind(&receivable.customer_id)
    .bind(receivable.amount_cents)
    .bind(receivable.paid_amount_cents)
    .bind(receivable.due_date)
    .bind(receivable.status)
    .bind(&receivable.notes)
    .bind(receivable.created_at)
    .bind(receivable.paid_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Applies one payment to one receivable on the caller's connection.
///
/// Inserts the payment row, bumps `paid_amount`, re-runs the canonical
/// status recompute, stamps `paid_at` once, and completes the owning
/// sale on full settlement. The UPDATE is guarded on the previously
/// read `paid_amount`: if a concurrent writer moved it, zero rows are
/// affected and the whole transaction aborts with a conflict.
#[allow(clippy::too_many_arguments)]
async fn apply_payment(
    conn: &mut SqliteConnection,
    account: &AccountReceivable,
    amount_cents: i64,
    payment_method: PaymentMethod,
    payment_date: DateTime<Utc>,
    notes: Option<String>,
    created_by: &str,
    now: DateTime<Utc>,
) -> DbResult<Payment> {
    let new_paid = account.paid_amount_cents + amount_cents;
    if new_paid > account.amount_cents {
        return Err(CoreError::inconsistent(format!(
            "paid_amount {new_paid} would exceed amount {} on receivable {}",
            account.amount_cents, account.id
        ))
        .into());
    }

    let new_status = ReceivableStatus::derive(
        new_paid,
        account.amount_cents,
        account.due_date,
        now,
    );
    let paid_stamp = (new_status == ReceivableStatus::Paid).then_some(now);

    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        account_receivable_id: account.id.clone(),
        amount_cents,
        payment_method,
        payment_date,
        notes,
        created_by: created_by.to_string(),
        created_at: now,
    };

    sqlx::query(
        "INSERT INTO payments (\
             id, account_receivable_id, amount_cents, payment_method, \
             payment_date, notes, created_by, created_at\
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(&payment.id)
    .bind(&payment.account_receivable_id)
    .bind(payment.amount_cents)
    .bind(payment.payment_method)
    .bind(payment.payment_date)
    .bind(&payment.notes)
    .bind(&payment.created_by)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;

    let result = sqlx::query(
        "UPDATE account_receivables \
         SET paid_amount_cents = ?2, status = ?3, paid_at = COALESCE(paid_at, ?4) \
         WHERE id = ?1 AND paid_amount_cents = ?5",
    )
    .bind(&account.id)
    .bind(new_paid)
    .bind(new_status)
    .bind(paid_stamp)
    .bind(account.paid_amount_cents)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::ConcurrencyConflict(format!(
            "receivable {} changed while applying payment",
            account.id
        )));
    }

    debug!(
        account_id = %account.id,
        amount_cents = amount_cents,
        status = ?new_status,
        "Payment applied to receivable"
    );

    if new_status == ReceivableStatus::Paid {
        complete_sale(conn, &account.sale_id, now).await?;
    }

    Ok(payment)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::generate_product_id;
    use caderneta_core::{CartLine, NewSale, Product, Sale, SaleStatus};
    use chrono::Duration;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            name: "Cesta básica".to_string(),
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

    /// Creates a fiado sale and returns (sale, receivable).
    async fn fiado_sale(
        db: &Database,
        customer_id: &str,
        product: &Product,
        quantity: i64,
        due_date: DateTime<Utc>,
    ) -> (Sale, AccountReceivable) {
        let sale = db
            .sales()
            .create_sale(NewSale {
                seller_id: "seller-1".to_string(),
                customer_id: Some(customer_id.to_string()),
                payment_method: caderneta_core::PaymentMethod::Fiado,
                items: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity,
                }],
                due_date: Some(due_date),
            })
            .await
            .unwrap();
        let receivable = db
            .receivables()
            .get_by_sale(&sale.id)
            .await
            .unwrap()
            .unwrap();
        (sale, receivable)
    }

    fn pix_payment(amount_cents: i64) -> NewPayment {
        NewPayment {
            amount_cents,
            payment_method: PaymentMethod::Pix,
            payment_date: None,
            notes: None,
            created_by: "user-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_full_payment_settles_receivable_and_sale() {
        let db = test_db().await;
        let product = seed_product(&db, 2500, 10).await;
        let due = Utc::now() + Duration::days(30);

        // Product P has stock 10; sale of 4 units on fiado
        let (sale, receivable) = fiado_sale(&db, "customer-1", &product, 4, due).await;
        assert_eq!(sale.status, SaleStatus::Pending);
        assert_eq!(receivable.amount_cents, 4 * 2500);
        assert_eq!(
            db.products()
                .get_by_id(&product.id)
                .await
                .unwrap()
                .unwrap()
                .stock_quantity,
            6
        );

        // paying the full amount settles everything
        db.receivables()
            .record_payment(&receivable.id, pix_payment(receivable.amount_cents))
            .await
            .unwrap();

        let settled = db
            .receivables()
            .get_by_id(&receivable.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settled.status, ReceivableStatus::Paid);
        assert_eq!(settled.paid_amount_cents, settled.amount_cents);
        assert!(settled.paid_at.is_some());

        let sale = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Completed);
        assert!(sale.paid_at.is_some());
    }

    #[tokio::test]
    async fn test_partial_payment_and_conservation() {
        let db = test_db().await;
        let product = seed_product(&db, 1000, 10).await;
        let due = Utc::now() + Duration::days(30);

        let (_, receivable) = fiado_sale(&db, "customer-1", &product, 5, due).await;
        assert_eq!(receivable.amount_cents, 5000);

        db.receivables()
            .record_payment(&receivable.id, pix_payment(2000))
            .await
            .unwrap();
        db.receivables()
            .record_payment(&receivable.id, pix_payment(1500))
            .await
            .unwrap();

        let account = db
            .receivables()
            .get_by_id(&receivable.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.status, ReceivableStatus::Partial);
        assert_eq!(account.paid_amount_cents, 3500);
        assert!(account.paid_at.is_none());

        // ledger conservation: paid_amount == Σ payments
        let payments = db
            .receivables()
            .payments_for_account(&receivable.id)
            .await
            .unwrap();
        let sum: i64 = payments.iter().map(|p| p.amount_cents).sum();
        assert_eq!(sum, account.paid_amount_cents);
    }

    #[tokio::test]
    async fn test_payment_exceeding_remaining_rejected() {
        let db = test_db().await;
        let product = seed_product(&db, 1000, 10).await;
        let due = Utc::now() + Duration::days(30);

        let (_, receivable) = fiado_sale(&db, "customer-1", &product, 3, due).await;

        let err = db
            .receivables()
            .record_payment(&receivable.id, pix_payment(3001))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidAmount { .. })
        ));

        // no write happened
        let account = db
            .receivables()
            .get_by_id(&receivable.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.paid_amount_cents, 0);
        assert!(db
            .receivables()
            .payments_for_account(&receivable.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_paid_receivable_is_terminal() {
        let db = test_db().await;
        let product = seed_product(&db, 1000, 10).await;
        let due = Utc::now() + Duration::days(30);

        let (_, receivable) = fiado_sale(&db, "customer-1", &product, 2, due).await;
        db.receivables()
            .record_payment(&receivable.id, pix_payment(2000))
            .await
            .unwrap();

        let first_paid_at = db
            .receivables()
            .get_by_id(&receivable.id)
            .await
            .unwrap()
            .unwrap()
            .paid_at
            .unwrap();

        // any further payment is rejected: remaining is zero
        let err = db
            .receivables()
            .record_payment(&receivable.id, pix_payment(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidAmount { .. })
        ));

        // paid_at did not move
        let account = db
            .receivables()
            .get_by_id(&receivable.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.paid_at.unwrap(), first_paid_at);
    }

    #[tokio::test]
    async fn test_fifo_allocation_scenario() {
        let db = test_db().await;
        let product = seed_product(&db, 1000, 100).await;
        let now = Utc::now();

        // R1 due earlier remaining 30.00, R2 due later remaining 50.00
        let (_, r1) = fiado_sale(&db, "customer-1", &product, 3, now + Duration::days(1)).await;
        let (_, r2) = fiado_sale(&db, "customer-1", &product, 5, now + Duration::days(31)).await;

        // lump payment of 40.00
        let payments = db
            .receivables()
            .apply_customer_payment(
                "customer-1",
                4000,
                PaymentMethod::Dinheiro,
                Some("pagamento no balcão".to_string()),
                "user-1",
            )
            .await
            .unwrap();

        // two payment rows: 30.00 against R1, 10.00 against R2
        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].account_receivable_id, r1.id);
        assert_eq!(payments[0].amount_cents, 3000);
        assert_eq!(payments[1].account_receivable_id, r2.id);
        assert_eq!(payments[1].amount_cents, 1000);

        let r1 = db.receivables().get_by_id(&r1.id).await.unwrap().unwrap();
        assert_eq!(r1.status, ReceivableStatus::Paid);

        let r2 = db.receivables().get_by_id(&r2.id).await.unwrap().unwrap();
        assert_eq!(r2.status, ReceivableStatus::Partial);
        assert_eq!(r2.remaining_cents(), 4000);
    }

    #[tokio::test]
    async fn test_fifo_order_strictly_by_due_date() {
        let db = test_db().await;
        let product = seed_product(&db, 1000, 100).await;
        let now = Utc::now();

        // inserted out of due-date order on purpose
        let (_, r3) = fiado_sale(&db, "customer-1", &product, 2, now + Duration::days(60)).await;
        let (_, r1) = fiado_sale(&db, "customer-1", &product, 2, now + Duration::days(10)).await;
        let (_, r2) = fiado_sale(&db, "customer-1", &product, 2, now + Duration::days(30)).await;

        // enough to satisfy r1 fully and start r2; r3 must stay untouched
        let payments = db
            .receivables()
            .apply_customer_payment("customer-1", 2500, PaymentMethod::Pix, None, "user-1")
            .await
            .unwrap();

        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].account_receivable_id, r1.id);
        assert_eq!(payments[0].amount_cents, 2000);
        assert_eq!(payments[1].account_receivable_id, r2.id);
        assert_eq!(payments[1].amount_cents, 500);

        let r3 = db.receivables().get_by_id(&r3.id).await.unwrap().unwrap();
        assert_eq!(r3.paid_amount_cents, 0);
    }

    #[tokio::test]
    async fn test_fifo_tie_break_keeps_insertion_order() {
        let db = test_db().await;
        let product = seed_product(&db, 1000, 100).await;
        let due = Utc::now() + Duration::days(15);

        let (_, first) = fiado_sale(&db, "customer-1", &product, 2, due).await;
        let (_, second) = fiado_sale(&db, "customer-1", &product, 2, due).await;

        let payments = db
            .receivables()
            .apply_customer_payment("customer-1", 3000, PaymentMethod::Pix, None, "user-1")
            .await
            .unwrap();

        assert_eq!(payments[0].account_receivable_id, first.id);
        assert_eq!(payments[0].amount_cents, 2000);
        assert_eq!(payments[1].account_receivable_id, second.id);
        assert_eq!(payments[1].amount_cents, 1000);
    }

    #[tokio::test]
    async fn test_lump_payment_exceeding_total_due_writes_nothing() {
        let db = test_db().await;
        let product = seed_product(&db, 1000, 100).await;
        let due = Utc::now() + Duration::days(30);

        let (_, receivable) = fiado_sale(&db, "customer-1", &product, 3, due).await;

        let err = db
            .receivables()
            .apply_customer_payment("customer-1", 3001, PaymentMethod::Pix, None, "user-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::AmountExceedsDue {
                requested_cents: 3001,
                total_due_cents: 3000,
            })
        ));

        let account = db
            .receivables()
            .get_by_id(&receivable.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.paid_amount_cents, 0);
    }

    #[tokio::test]
    async fn test_no_outstanding_accounts() {
        let db = test_db().await;

        let err = db
            .receivables()
            .apply_customer_payment("customer-1", 1000, PaymentMethod::Pix, None, "user-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NoOutstandingAccounts { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_due_date_recomputes_status() {
        let db = test_db().await;
        let product = seed_product(&db, 1000, 10).await;

        let (_, receivable) =
            fiado_sale(&db, "customer-1", &product, 2, Utc::now() + Duration::days(30)).await;
        assert_eq!(receivable.status, ReceivableStatus::Pending);

        // pull the due date into the past: pending → overdue
        let updated = db
            .receivables()
            .update(
                &receivable.id,
                &ReceivableUpdate {
                    due_date: Some(Utc::now() - Duration::days(1)),
                    notes: Some("cliente avisado".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, ReceivableStatus::Overdue);
        assert_eq!(updated.notes.as_deref(), Some("cliente avisado"));
        // the open set still includes it, so allocation keeps working
        let open = db
            .receivables()
            .list_open_for_customer("customer-1")
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_overdue_sweep() {
        let db = test_db().await;
        let product = seed_product(&db, 1000, 10).await;

        // create with a future due date, then move it into the past
        // without touching status
        let (_, receivable) =
            fiado_sale(&db, "customer-1", &product, 2, Utc::now() + Duration::days(30)).await;

        sqlx::query("UPDATE account_receivables SET due_date = ?2 WHERE id = ?1")
            .bind(&receivable.id)
            .bind(Utc::now() - Duration::days(2))
            .execute(db.pool())
            .await
            .unwrap();

        let transitioned = db.receivables().refresh_overdue().await.unwrap();
        assert_eq!(transitioned, 1);

        let account = db
            .receivables()
            .get_by_id(&receivable.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.status, ReceivableStatus::Overdue);

        let summary = db.receivables().overdue_summary().await.unwrap();
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.total_remaining_cents, 2000);
    }

    #[tokio::test]
    async fn test_one_receivable_per_sale() {
        let db = test_db().await;
        let product = seed_product(&db, 1000, 10).await;
        let due = Utc::now() + Duration::days(30);

        let (sale, _) = fiado_sale(&db, "customer-1", &product, 2, due).await;

        // the sale already carries its receivable: a second one violates
        // the UNIQUE constraint
        let err = db
            .receivables()
            .create_for_sale(&sale.id, due, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_overdue_receivable_still_accepts_payment() {
        let db = test_db().await;
        let product = seed_product(&db, 1000, 10).await;

        let (_, receivable) =
            fiado_sale(&db, "customer-1", &product, 2, Utc::now() - Duration::days(5)).await;
        // created already past due
        assert_eq!(receivable.status, ReceivableStatus::Overdue);

        db.receivables()
            .record_payment(&receivable.id, pix_payment(500))
            .await
            .unwrap();

        let account = db
            .receivables()
            .get_by_id(&receivable.id)
            .await
            .unwrap()
            .unwrap();
        // partial wins over overdue in the canonical precedence
        assert_eq!(account.status, ReceivableStatus::Partial);
    }
}
