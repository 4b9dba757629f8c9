//! # Billing Service
//!
//! Quoting, committing quotes, reminders and payments.
//!
//! ## Committing A Quote
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    invoice = fetch(invoice_id)                                          │
//! │    invoice.committed?  ── yes ──► return the stored snapshot           │
//! │         │ no                                                            │
//! │    quote = core::quote(subject, catalog, price control, plan)           │
//! │    effect = invoice.commit(quote)                                       │
//! │    effect = Some(spend)? ──► account.record_spend(spend), save account │
//! │    save invoice                     (versioned: a racing commit fails)  │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The committed marker and the spend live in the same transaction, so a
//! Flexible holder's monthly spend moves at most once per invoice.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::catalog::CatalogRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::job::JobRepository;
use crate::repository::order::OrderRepository;
use crate::repository::price_control::PriceControlRepository;
use crate::repository::vehicle::VehicleRepository;
use garage_core::customer::Customer;
use garage_core::discount::{self, DiscountPlan};
use garage_core::invoice::{CommittedQuote, Invoice, InvoiceReminder, InvoiceSubject, Payment, PaymentMethod};
use garage_core::pricing::{self, PricingTarget, Quote};
use garage_core::Money;

#[derive(Debug, Clone)]
pub struct BillingService {
    pool: SqlitePool,
}

impl BillingService {
    pub fn new(pool: SqlitePool) -> Self {
        BillingService { pool }
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Prices a job or parts order without changing anything.
    ///
    /// ## When This Occurs
    /// - `Core(Configuration)` without exactly one live price control
    /// - `NotFound` for a missing job, order, customer, part or mechanic
    pub async fn price(&self, subject: &InvoiceSubject) -> DbResult<Quote> {
        let mut conn = self.pool.acquire().await?;
        let quote = quote_with(&mut conn, subject).await?;
        debug!(?subject, final_total = %quote.breakdown.final_total, "Priced");
        Ok(quote)
    }

    /// Prices whatever an invoice bills.
    pub async fn price_invoice(&self, invoice_id: &str) -> DbResult<Quote> {
        let mut conn = self.pool.acquire().await?;
        let invoice = InvoiceRepository::fetch(&mut conn, invoice_id).await?;
        quote_with(&mut conn, invoice.subject()).await
    }

    /// The discount plan that applies to a customer, if any.
    pub async fn resolve_discount(&self, customer_id: &str) -> DbResult<Option<DiscountPlan>> {
        let mut conn = self.pool.acquire().await?;
        let customer = CustomerRepository::fetch(&mut conn, customer_id).await?;
        Ok(discount::resolve(&customer).cloned())
    }

    /// Prices an invoice and fixes that price on it, applying any spend
    /// effect to the customer's account. Calling it again returns the
    /// snapshot taken the first time.
    pub async fn commit_quote(&self, invoice_id: &str, now: DateTime<Utc>) -> DbResult<CommittedQuote> {
        let mut tx = self.pool.begin().await?;
        let mut invoice = InvoiceRepository::fetch(&mut tx, invoice_id).await?;

        if let Some(existing) = invoice.committed {
            debug!(number = invoice.invoice_number, "Quote already committed");
            return Ok(existing);
        }

        let quote = quote_with(&mut tx, invoice.subject()).await?;
        if let Some(spend) = invoice.commit(&quote, now) {
            let mut customer = customer_of(&mut tx, invoice.subject()).await?;
            let running = customer
                .account_mut()
                .map(|account| account.record_spend(spend, now.date_naive()));
            CustomerRepository::save(&mut tx, &mut customer).await?;
            info!(customer = %customer.meta.id, %spend, running = ?running, "Monthly spend accrued");
        }
        InvoiceRepository::save(&mut tx, &mut invoice).await?;
        tx.commit().await?;

        let committed = invoice
            .committed
            .ok_or_else(|| DbError::Internal("commit left no snapshot".to_string()))?;
        info!(number = invoice.invoice_number, final_total = %committed.breakdown.final_total, "Quote committed");
        Ok(committed)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Moves an unpaid invoice to its next reminder phase and records the
    /// reminder. A no-op once paid or at the final warning.
    pub async fn advance_reminder(&self, invoice_id: &str, on: NaiveDate) -> DbResult<Invoice> {
        let mut tx = self.pool.begin().await?;
        let mut invoice = InvoiceRepository::fetch(&mut tx, invoice_id).await?;

        if !invoice.advance_reminder() {
            debug!(number = invoice.invoice_number, state = ?invoice.state(), "Reminder not advanced");
            return Ok(invoice);
        }

        InvoiceRepository::save(&mut tx, &mut invoice).await?;
        InvoiceRepository::insert_reminder(&mut tx, &InvoiceReminder::for_invoice(&invoice, on)).await?;
        tx.commit().await?;

        info!(number = invoice.invoice_number, phase = ?invoice.reminder_phase, "Reminder issued");
        Ok(invoice)
    }

    pub async fn mark_paid(&self, invoice_id: &str) -> DbResult<Invoice> {
        let mut conn = self.pool.acquire().await?;
        let mut invoice = InvoiceRepository::fetch(&mut conn, invoice_id).await?;
        if invoice.mark_paid() {
            InvoiceRepository::save(&mut conn, &mut invoice).await?;
            info!(number = invoice.invoice_number, "Invoice paid");
        }
        Ok(invoice)
    }

    /// Records a payment. An invoice whose committed total is fully covered
    /// is marked paid in the same transaction.
    pub async fn record_payment(
        &self,
        invoice_id: &str,
        amount: Money,
        method: PaymentMethod,
        paid_on: NaiveDate,
    ) -> DbResult<Payment> {
        let payment = Payment::new(invoice_id, amount, method, paid_on)?;

        let mut tx = self.pool.begin().await?;
        let mut invoice = InvoiceRepository::fetch(&mut tx, invoice_id).await?;
        InvoiceRepository::insert_payment(&mut tx, &payment).await?;

        let payments = InvoiceRepository::payments_for(&mut tx, invoice_id).await?;
        let settled = invoice.is_committed() && invoice.outstanding(&payments).is_zero();
        if settled && invoice.mark_paid() {
            InvoiceRepository::save(&mut tx, &mut invoice).await?;
        }
        tx.commit().await?;

        info!(number = invoice.invoice_number, %amount, method = payment.method.tag(), settled, "Payment recorded");
        Ok(payment)
    }

    pub async fn outstanding_balance(&self, invoice_id: &str) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        let invoice = InvoiceRepository::fetch(&mut conn, invoice_id).await?;
        let payments = InvoiceRepository::payments_for(&mut conn, invoice_id).await?;
        Ok(invoice.outstanding(&payments))
    }

    pub async fn unpaid_invoices(&self, customer_id: &str) -> DbResult<Vec<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        CustomerRepository::fetch(&mut conn, customer_id).await?;
        InvoiceRepository::unpaid_for_customer(&mut conn, customer_id).await
    }
}

// =============================================================================
// Loading
// =============================================================================

async fn customer_of(conn: &mut SqliteConnection, subject: &InvoiceSubject) -> DbResult<Customer> {
    let customer_id = match subject {
        InvoiceSubject::Job(job_id) => {
            let job = JobRepository::fetch(conn, job_id).await?;
            VehicleRepository::fetch(conn, &job.vehicle_id).await?.customer_id
        }
        InvoiceSubject::PartsOrder(order_id) => {
            OrderRepository::fetch_parts_order(conn, order_id).await?.customer_id
        }
    };
    CustomerRepository::fetch(conn, &customer_id).await
}

/// Loads every pricing input for `subject` and quotes it.
async fn quote_with(conn: &mut SqliteConnection, subject: &InvoiceSubject) -> DbResult<Quote> {
    let controls = PriceControlRepository::fetch_active(conn).await?;
    let catalog = CatalogRepository::load(conn).await?;
    let customer = customer_of(conn, subject).await?;
    let plan = discount::resolve(&customer);

    let quote = match subject {
        InvoiceSubject::Job(job_id) => {
            let job = JobRepository::fetch(conn, job_id).await?;
            let mechanic = match job.mechanic_id.as_deref() {
                Some(id) => match JobRepository::fetch_mechanic(conn, id).await {
                    Ok(mechanic) => Some(mechanic),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(e),
                },
                None => None,
            };
            pricing::quote(
                PricingTarget::Job {
                    job: &job,
                    mechanic: mechanic.as_ref(),
                },
                &catalog,
                &controls,
                plan,
            )?
        }
        InvoiceSubject::PartsOrder(order_id) => {
            let order = OrderRepository::fetch_parts_order(conn, order_id).await?;
            pricing::quote(PricingTarget::Order(&order), &catalog, &controls, plan)?
        }
    };
    Ok(quote)
}
