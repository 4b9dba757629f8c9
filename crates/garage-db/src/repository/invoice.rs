//! # Invoice Repository
//!
//! Invoices, their reminder history and the payments made against them.
//!
//! The committed price snapshot is stored as JSON in
//! `invoices.committed_quote`; a non-NULL value is the marker that the
//! quote (and any spend effect) has already been applied.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{ensure_updated, MetaRow};
use crate::error::{DbError, DbResult};
use garage_core::invoice::{
    CommittedQuote, Invoice, InvoiceReminder, InvoiceSubject, Payment, PaymentMethod, ReminderPhase,
};
use garage_core::Money;

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    invoice_number: i64,
    job_id: Option<String>,
    parts_order_id: Option<String>,
    issue_date: NaiveDate,
    reminder_phase: ReminderPhase,
    paid: bool,
    committed_quote: Option<String>,
}

impl InvoiceRow {
    fn into_invoice(self) -> DbResult<Invoice> {
        let subject = InvoiceSubject::from_columns(&self.meta.id, self.job_id, self.parts_order_id)?;
        let committed: Option<CommittedQuote> = self
            .committed_quote
            .as_deref()
            .map(serde_json::from_str::<CommittedQuote>)
            .transpose()?;

        Ok(Invoice::restore(
            self.meta.into(),
            self.invoice_number,
            subject,
            self.issue_date,
            self.reminder_phase,
            self.paid,
            committed,
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReminderRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    invoice_id: String,
    phase: ReminderPhase,
    issue_date: NaiveDate,
}

impl From<ReminderRow> for InvoiceReminder {
    fn from(row: ReminderRow) -> Self {
        InvoiceReminder {
            meta: row.meta.into(),
            invoice_id: row.invoice_id,
            phase: row.phase,
            issue_date: row.issue_date,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    invoice_id: String,
    amount: Money,
    method: String,
    card_last_four: Option<String>,
    paid_on: NaiveDate,
}

impl PaymentRow {
    fn into_payment(self) -> DbResult<Payment> {
        Ok(Payment {
            meta: self.meta.into(),
            invoice_id: self.invoice_id,
            amount: self.amount,
            method: PaymentMethod::from_tag(&self.method, self.card_last_four)?,
            paid_on: self.paid_on,
        })
    }
}

const INVOICE_COLUMNS: &str = "id, invoice_number, job_id, parts_order_id, issue_date, \
     reminder_phase, paid, committed_quote, created_at, updated_at, deleted_at, version";

#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    pub async fn insert(&self, invoice: &Invoice) -> DbResult<()> {
        debug!(id = %invoice.meta.id, number = invoice.invoice_number, "Inserting invoice");

        let committed = invoice
            .committed
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, job_id, parts_order_id, issue_date,
                reminder_phase, paid, committed_quote,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&invoice.meta.id)
        .bind(invoice.invoice_number)
        .bind(invoice.subject().job_id())
        .bind(invoice.subject().parts_order_id())
        .bind(invoice.issue_date)
        .bind(invoice.reminder_phase)
        .bind(invoice.paid)
        .bind(committed)
        .bind(invoice.meta.created_at)
        .bind(invoice.meta.updated_at)
        .bind(invoice.meta.deleted_at)
        .bind(invoice.meta.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Loads a live invoice.
    ///
    /// ## When This Occurs
    /// - `NotFound` for a missing or tombstoned invoice
    /// - `Core(InvalidInvoiceState)` when the row bills neither or both
    ///   subjects
    pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Invoice> {
        let row: Option<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.ok_or_else(|| DbError::not_found("Invoice", id))?
            .into_invoice()
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Invoice> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    pub async fn get_by_number(&self, invoice_number: i64) -> DbResult<Invoice> {
        let row: Option<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE invoice_number = ?1 AND deleted_at IS NULL"
        ))
        .bind(invoice_number)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| DbError::not_found("Invoice", invoice_number.to_string()))?
            .into_invoice()
    }

    /// Versioned write of the lifecycle columns and the committed snapshot.
    pub(crate) async fn save(conn: &mut SqliteConnection, invoice: &mut Invoice) -> DbResult<()> {
        let now = Utc::now();
        let committed = invoice
            .committed
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                reminder_phase = ?3, paid = ?4, committed_quote = ?5,
                updated_at = ?6, version = version + 1
            WHERE id = ?1 AND version = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(&invoice.meta.id)
        .bind(invoice.meta.version)
        .bind(invoice.reminder_phase)
        .bind(invoice.paid)
        .bind(committed)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        ensure_updated(conn, result, "invoices", "Invoice", &invoice.meta).await?;
        invoice.meta.bump(now);
        Ok(())
    }

    /// Unpaid live invoices billed to a customer, through their vehicles'
    /// jobs or their parts orders. Oldest first.
    pub(crate) async fn unpaid_for_customer(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<Vec<Invoice>> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT i.id, i.invoice_number, i.job_id, i.parts_order_id, i.issue_date,
                   i.reminder_phase, i.paid, i.committed_quote,
                   i.created_at, i.updated_at, i.deleted_at, i.version
            FROM invoices i
            LEFT JOIN jobs j ON j.id = i.job_id
            LEFT JOIN vehicles v ON v.id = j.vehicle_id
            LEFT JOIN parts_orders o ON o.id = i.parts_order_id
            WHERE i.deleted_at IS NULL
              AND i.paid = 0
              AND (v.customer_id = ?1 OR o.customer_id = ?1)
            ORDER BY i.issue_date, i.invoice_number
            "#,
        )
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(InvoiceRow::into_invoice).collect()
    }

    pub async fn next_invoice_number(&self) -> DbResult<i64> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(invoice_number) FROM invoices")
            .fetch_one(&self.pool)
            .await?;
        Ok(max.unwrap_or(0) + 1)
    }

    // =========================================================================
    // Reminders
    // =========================================================================

    pub(crate) async fn insert_reminder(
        conn: &mut SqliteConnection,
        reminder: &InvoiceReminder,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoice_reminders (
                id, invoice_id, phase, issue_date,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&reminder.meta.id)
        .bind(&reminder.invoice_id)
        .bind(reminder.phase)
        .bind(reminder.issue_date)
        .bind(reminder.meta.created_at)
        .bind(reminder.meta.updated_at)
        .bind(reminder.meta.deleted_at)
        .bind(reminder.meta.version)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn reminders_for(&self, invoice_id: &str) -> DbResult<Vec<InvoiceReminder>> {
        let rows: Vec<ReminderRow> = sqlx::query_as(
            r#"
            SELECT id, invoice_id, phase, issue_date,
                   created_at, updated_at, deleted_at, version
            FROM invoice_reminders
            WHERE invoice_id = ?1 AND deleted_at IS NULL
            ORDER BY issue_date, created_at
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InvoiceReminder::from).collect())
    }

    // =========================================================================
    // Payments
    // =========================================================================

    pub(crate) async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, invoice_id, amount, method, card_last_four, paid_on,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&payment.meta.id)
        .bind(&payment.invoice_id)
        .bind(payment.amount)
        .bind(payment.method.tag())
        .bind(payment.method.last_four())
        .bind(payment.paid_on)
        .bind(payment.meta.created_at)
        .bind(payment.meta.updated_at)
        .bind(payment.meta.deleted_at)
        .bind(payment.meta.version)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub(crate) async fn payments_for(
        conn: &mut SqliteConnection,
        invoice_id: &str,
    ) -> DbResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT id, invoice_id, amount, method, card_last_four, paid_on,
                   created_at, updated_at, deleted_at, version
            FROM payments
            WHERE invoice_id = ?1 AND deleted_at IS NULL
            ORDER BY paid_on, created_at
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    pub async fn payments(&self, invoice_id: &str) -> DbResult<Vec<Payment>> {
        let mut conn = self.pool.acquire().await?;
        Self::payments_for(&mut conn, invoice_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::db;
    use garage_core::customer::{Contact, Customer};
    use garage_core::order::CustomerPartsOrder;
    use garage_core::pricing::{PriceBreakdown, Quote};
    use garage_core::CoreError;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    async fn order_invoice(db: &crate::pool::Database) -> (Customer, Invoice) {
        let customer = Customer::dropin(Contact::new("Sam", "Lee"));
        db.customers().insert(&customer).await.unwrap();
        let mut order = CustomerPartsOrder::new(&customer.meta.id, day(1));
        db.orders().insert_parts_order(&mut order).await.unwrap();

        let invoice = Invoice::new(100, InvoiceSubject::PartsOrder(order.meta.id.clone()), day(1));
        db.invoices().insert(&invoice).await.unwrap();
        (customer, invoice)
    }

    #[tokio::test]
    async fn test_committed_snapshot_round_trips() {
        let db = db().await;
        let (_, invoice) = order_invoice(&db).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let mut loaded = InvoiceRepository::fetch(&mut conn, &invoice.meta.id).await.unwrap();
        assert!(!loaded.is_committed());

        let quote = Quote {
            breakdown: PriceBreakdown {
                final_total: Money::from_pence(12_345),
                ..PriceBreakdown::default()
            },
            spend_effect: None,
        };
        loaded.commit(&quote, Utc::now());
        InvoiceRepository::save(&mut conn, &mut loaded).await.unwrap();

        let again = InvoiceRepository::fetch(&mut conn, &invoice.meta.id).await.unwrap();
        assert_eq!(again.committed, loaded.committed);
        assert_eq!(again.meta.version, 1);
    }

    #[tokio::test]
    async fn test_stale_invoice_write_is_rejected() {
        let db = db().await;
        let (_, invoice) = order_invoice(&db).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let mut first = InvoiceRepository::fetch(&mut conn, &invoice.meta.id).await.unwrap();
        let mut second = first.clone();

        assert!(first.mark_paid());
        InvoiceRepository::save(&mut conn, &mut first).await.unwrap();

        assert!(second.advance_reminder());
        let err = InvoiceRepository::save(&mut conn, &mut second).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::ConcurrentModification { expected_version: 0, .. })
        ));
        assert_eq!(second.meta.version, 0);

        let stored = InvoiceRepository::fetch(&mut conn, &invoice.meta.id).await.unwrap();
        assert!(stored.paid);
        assert_eq!(stored.reminder_phase, first.reminder_phase);
        assert_eq!(stored.meta.version, 1);
    }

    #[tokio::test]
    async fn test_row_without_subject_is_rejected() {
        let db = db().await;
        let (_, invoice) = order_invoice(&db).await;

        // Bypass the CHECK to leave the row billing nothing.
        sqlx::query("PRAGMA ignore_check_constraints = ON")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("UPDATE invoices SET parts_order_id = NULL WHERE id = ?1")
            .bind(&invoice.meta.id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.invoices().get_by_id(&invoice.meta.id).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidInvoiceState { .. })));
    }

    #[tokio::test]
    async fn test_unpaid_invoices_for_customer() {
        let db = db().await;
        let (customer, invoice) = order_invoice(&db).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let unpaid = InvoiceRepository::unpaid_for_customer(&mut conn, &customer.meta.id)
            .await
            .unwrap();
        assert_eq!(unpaid.len(), 1);

        let mut paid = unpaid[0].clone();
        paid.mark_paid();
        InvoiceRepository::save(&mut conn, &mut paid).await.unwrap();
        assert!(InvoiceRepository::unpaid_for_customer(&mut conn, &customer.meta.id)
            .await
            .unwrap()
            .is_empty());
        drop(conn);

        assert_eq!(db.invoices().get_by_number(100).await.unwrap().meta.id, invoice.meta.id);
        assert_eq!(db.invoices().next_invoice_number().await.unwrap(), 101);
    }

    #[tokio::test]
    async fn test_card_payment_keeps_last_four_only() {
        let db = db().await;
        let (_, invoice) = order_invoice(&db).await;

        let payment = Payment::new(
            &invoice.meta.id,
            Money::from_pence(5_000),
            PaymentMethod::card("4929 1234 5678 9012").unwrap(),
            day(3),
        )
        .unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        InvoiceRepository::insert_payment(&mut conn, &payment).await.unwrap();
        drop(conn);

        let stored = db.invoices().payments(&invoice.meta.id).await.unwrap();
        assert_eq!(stored[0].method.last_four(), Some("9012"));
    }
}
