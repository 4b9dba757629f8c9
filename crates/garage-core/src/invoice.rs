//! # Invoice Lifecycle
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Unpaid@Sent ──► Unpaid@Reminder1 ──► Unpaid@Reminder2 ──►              │
//! │       │                 │                    │                          │
//! │       │                 │                    │      Unpaid@Reminder3Warning
//! │       │                 │                    │          │   ▲           │
//! │       │                 │                    │          │   └─ advance  │
//! │       │ mark_paid       │ mark_paid          │ mark_paid│      (no-op)  │
//! │       ▼                 ▼                    ▼          ▼               │
//! │  ┌──────────────────────────────────────────────────────────┐          │
//! │  │                         Paid                             │ terminal │
//! │  └──────────────────────────────────────────────────────────┘          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Subject
//! An invoice bills exactly one job or exactly one parts order. The pair of
//! nullable storage columns is collapsed into [`InvoiceSubject`] on load, so
//! an invoice value with neither or both cannot exist.
//!
//! ## Committing A Quote
//! [`Invoice::commit`] records the price snapshot once. The first call
//! returns the quote's spend effect for the caller to apply; every later
//! call returns `None`, so the Flexible spend accrues at most once.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing::{PriceBreakdown, Quote};
use crate::types::EntityMeta;
use crate::validation::validate_price;

// =============================================================================
// Subject
// =============================================================================

/// What an invoice bills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum InvoiceSubject {
    Job(String),
    PartsOrder(String),
}

impl InvoiceSubject {
    /// Builds the subject from the two nullable references stored on an
    /// invoice row.
    ///
    /// ## When This Occurs
    /// `InvalidInvoiceState` when neither or both references are set.
    pub fn from_columns(
        invoice: &str,
        job_done: Option<String>,
        part_order: Option<String>,
    ) -> CoreResult<Self> {
        match (job_done, part_order) {
            (Some(job), None) => Ok(InvoiceSubject::Job(job)),
            (None, Some(order)) => Ok(InvoiceSubject::PartsOrder(order)),
            (None, None) => Err(CoreError::invalid_invoice(
                invoice,
                "neither a job nor a parts order is set",
            )),
            (Some(_), Some(_)) => Err(CoreError::invalid_invoice(
                invoice,
                "both a job and a parts order are set",
            )),
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            InvoiceSubject::Job(id) => Some(id),
            InvoiceSubject::PartsOrder(_) => None,
        }
    }

    pub fn parts_order_id(&self) -> Option<&str> {
        match self {
            InvoiceSubject::PartsOrder(id) => Some(id),
            InvoiceSubject::Job(_) => None,
        }
    }
}

// =============================================================================
// Reminder Phase & State
// =============================================================================

/// Unpaid follow-up escalation step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReminderPhase {
    /// Invoice sent, no reminders yet.
    #[default]
    Sent,
    Reminder1,
    Reminder2,
    /// Third reminder carrying a final warning.
    Reminder3Warning,
}

impl ReminderPhase {
    /// The following phase, or `None` at the final warning.
    pub fn next(self) -> Option<ReminderPhase> {
        match self {
            ReminderPhase::Sent => Some(ReminderPhase::Reminder1),
            ReminderPhase::Reminder1 => Some(ReminderPhase::Reminder2),
            ReminderPhase::Reminder2 => Some(ReminderPhase::Reminder3Warning),
            ReminderPhase::Reminder3Warning => None,
        }
    }

    /// 1-based phase number as printed on reminder letters.
    pub fn number(self) -> u8 {
        match self {
            ReminderPhase::Sent => 1,
            ReminderPhase::Reminder1 => 2,
            ReminderPhase::Reminder2 => 3,
            ReminderPhase::Reminder3Warning => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceState {
    Unpaid(ReminderPhase),
    Paid,
}

// =============================================================================
// Invoice
// =============================================================================

/// The price snapshot taken when a quote is committed against an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedQuote {
    pub breakdown: PriceBreakdown,
    /// Spend accrued to the customer's month by this commit.
    pub spend_applied: Money,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub meta: EntityMeta,
    pub invoice_number: i64,
    subject: InvoiceSubject,
    pub issue_date: NaiveDate,
    pub reminder_phase: ReminderPhase,
    pub paid: bool,
    pub committed: Option<CommittedQuote>,
}

impl Invoice {
    pub fn new(invoice_number: i64, subject: InvoiceSubject, issue_date: NaiveDate) -> Self {
        Invoice {
            meta: EntityMeta::new(),
            invoice_number,
            subject,
            issue_date,
            reminder_phase: ReminderPhase::Sent,
            paid: false,
            committed: None,
        }
    }

    /// Reassembles an invoice loaded from storage.
    pub fn restore(
        meta: EntityMeta,
        invoice_number: i64,
        subject: InvoiceSubject,
        issue_date: NaiveDate,
        reminder_phase: ReminderPhase,
        paid: bool,
        committed: Option<CommittedQuote>,
    ) -> Self {
        Invoice {
            meta,
            invoice_number,
            subject,
            issue_date,
            reminder_phase,
            paid,
            committed,
        }
    }

    /// The billed job or order. Fixed at construction.
    pub fn subject(&self) -> &InvoiceSubject {
        &self.subject
    }

    pub fn state(&self) -> InvoiceState {
        if self.paid {
            InvoiceState::Paid
        } else {
            InvoiceState::Unpaid(self.reminder_phase)
        }
    }

    /// Moves one reminder phase forward.
    ///
    /// Returns `true` when the phase changed; a paid invoice or one at the
    /// final warning is left alone and returns `false`.
    pub fn advance_reminder(&mut self) -> bool {
        if self.paid {
            return false;
        }
        match self.reminder_phase.next() {
            Some(next) => {
                self.reminder_phase = next;
                true
            }
            None => false,
        }
    }

    /// Marks the invoice paid. Returns `false` if it already was.
    pub fn mark_paid(&mut self) -> bool {
        let changed = !self.paid;
        self.paid = true;
        changed
    }

    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    /// Records `quote` as this invoice's price.
    ///
    /// Returns the spend effect to apply on the first commit and `None` on
    /// every commit after it, leaving the original snapshot in place.
    pub fn commit(&mut self, quote: &Quote, now: DateTime<Utc>) -> Option<Money> {
        if self.committed.is_some() {
            return None;
        }
        self.committed = Some(CommittedQuote {
            breakdown: quote.breakdown,
            spend_applied: quote.spend_effect.unwrap_or_default(),
            committed_at: now,
        });
        quote.spend_effect
    }

    /// Amount still owed: committed final total less payments, never
    /// negative. An uncommitted invoice owes nothing yet.
    pub fn outstanding(&self, payments: &[Payment]) -> Money {
        let Some(committed) = &self.committed else {
            return Money::zero();
        };
        let paid: Money = payments
            .iter()
            .filter(|p| p.meta.is_live() && p.invoice_id == self.meta.id)
            .map(|p| p.amount)
            .sum();
        let owed = committed.breakdown.final_total - paid;
        if owed.is_negative() {
            Money::zero()
        } else {
            owed
        }
    }
}

/// History row written whenever a reminder phase is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceReminder {
    pub meta: EntityMeta,
    pub invoice_id: String,
    pub phase: ReminderPhase,
    pub issue_date: NaiveDate,
}

impl InvoiceReminder {
    pub fn for_invoice(invoice: &Invoice, issue_date: NaiveDate) -> Self {
        InvoiceReminder {
            meta: EntityMeta::new(),
            invoice_id: invoice.meta.id.clone(),
            phase: invoice.reminder_phase,
            issue_date,
        }
    }
}

// =============================================================================
// Payments
// =============================================================================

/// How an invoice was settled. Only the last four card digits are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card { last_four: String },
    Cheque,
}

impl PaymentMethod {
    /// Builds a card method from a full or partial card number.
    pub fn card(card_number: &str) -> CoreResult<Self> {
        let digits: String = card_number.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.len() < 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "card_number".to_string(),
                reason: "must contain at least four digits".to_string(),
            }
            .into());
        }
        Ok(PaymentMethod::Card {
            last_four: digits[digits.len() - 4..].to_string(),
        })
    }

    /// Storage tag: `cash`, `card` or `cheque`.
    pub fn tag(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card { .. } => "card",
            PaymentMethod::Cheque => "cheque",
        }
    }

    pub fn last_four(&self) -> Option<&str> {
        match self {
            PaymentMethod::Card { last_four } => Some(last_four),
            _ => None,
        }
    }

    /// Inverse of [`PaymentMethod::tag`].
    pub fn from_tag(tag: &str, last_four: Option<String>) -> CoreResult<Self> {
        match (tag, last_four) {
            ("cash", _) => Ok(PaymentMethod::Cash),
            ("cheque", _) => Ok(PaymentMethod::Cheque),
            ("card", Some(last_four)) => Ok(PaymentMethod::Card { last_four }),
            _ => Err(ValidationError::NotAllowed {
                field: "method".to_string(),
                allowed: vec!["cash".to_string(), "card".to_string(), "cheque".to_string()],
            }
            .into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub meta: EntityMeta,
    pub invoice_id: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
}

impl Payment {
    pub fn new(invoice_id: &str, amount: Money, method: PaymentMethod, paid_on: NaiveDate) -> CoreResult<Self> {
        validate_price("amount", amount)?;
        if amount.is_zero() {
            return Err(ValidationError::MustBePositive {
                field: "amount".to_string(),
            }
            .into());
        }
        Ok(Payment {
            meta: EntityMeta::new(),
            invoice_id: invoice_id.to_string(),
            amount,
            method,
            paid_on,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
    }

    fn invoice() -> Invoice {
        Invoice::new(1001, InvoiceSubject::Job("job-1".to_string()), today())
    }

    fn quote(final_pence: i64, spend: Option<i64>) -> Quote {
        Quote {
            breakdown: PriceBreakdown {
                final_total: Money::from_pence(final_pence),
                ..PriceBreakdown::default()
            },
            spend_effect: spend.map(Money::from_pence),
        }
    }

    #[test]
    fn test_subject_requires_exactly_one() {
        assert_eq!(
            InvoiceSubject::from_columns("1", Some("j".into()), None).unwrap(),
            InvoiceSubject::Job("j".into())
        );
        assert_eq!(
            InvoiceSubject::from_columns("1", None, Some("o".into())).unwrap(),
            InvoiceSubject::PartsOrder("o".into())
        );
        assert!(matches!(
            InvoiceSubject::from_columns("1", None, None),
            Err(CoreError::InvalidInvoiceState { .. })
        ));
        assert!(matches!(
            InvoiceSubject::from_columns("1", Some("j".into()), Some("o".into())),
            Err(CoreError::InvalidInvoiceState { .. })
        ));
    }

    #[test]
    fn test_reminders_advance_then_stop() {
        let mut inv = invoice();
        assert_eq!(ReminderPhase::default(), ReminderPhase::Sent);
        assert_eq!(inv.reminder_phase, ReminderPhase::default());
        assert_eq!(inv.state(), InvoiceState::Unpaid(ReminderPhase::Sent));
        assert!(inv.advance_reminder());
        assert!(inv.advance_reminder());
        assert!(inv.advance_reminder());
        assert_eq!(inv.state(), InvoiceState::Unpaid(ReminderPhase::Reminder3Warning));
        assert!(!inv.advance_reminder());
        assert!(!inv.advance_reminder());
        assert_eq!(inv.reminder_phase.number(), 4);
    }

    #[test]
    fn test_paid_is_terminal() {
        let mut inv = invoice();
        inv.advance_reminder();
        assert!(inv.mark_paid());
        assert!(!inv.mark_paid());
        assert!(!inv.advance_reminder());
        assert_eq!(inv.state(), InvoiceState::Paid);
        assert_eq!(inv.reminder_phase, ReminderPhase::Reminder1);
    }

    #[test]
    fn test_commit_applies_spend_once() {
        let mut inv = invoice();
        let q = quote(14_820, Some(15_600));
        assert_eq!(inv.commit(&q, Utc::now()), Some(Money::from_pence(15_600)));
        assert_eq!(inv.commit(&q, Utc::now()), None);
        assert_eq!(inv.commit(&quote(1, Some(1)), Utc::now()), None);

        let committed = inv.committed.unwrap();
        assert_eq!(committed.breakdown.final_total.pence(), 14_820);
        assert_eq!(committed.spend_applied.pence(), 15_600);
    }

    #[test]
    fn test_outstanding_balance() {
        let mut inv = invoice();
        assert!(inv.outstanding(&[]).is_zero());

        inv.commit(&quote(10_000, None), Utc::now());
        let p1 = Payment::new(&inv.meta.id, Money::from_pence(4_000), PaymentMethod::Cash, today()).unwrap();
        assert_eq!(inv.outstanding(&[p1.clone()]).pence(), 6_000);

        let p2 = Payment::new(&inv.meta.id, Money::from_pence(7_000), PaymentMethod::Cheque, today()).unwrap();
        assert!(inv.outstanding(&[p1, p2]).is_zero());
    }

    #[test]
    fn test_card_keeps_last_four_only() {
        let method = PaymentMethod::card("4111 1111 1111 1234").unwrap();
        assert_eq!(method.last_four(), Some("1234"));
        assert_eq!(method.tag(), "card");
        assert!(PaymentMethod::card("12a").is_err());
        assert_eq!(
            PaymentMethod::from_tag("card", Some("1234".into())).unwrap(),
            method
        );
        assert!(PaymentMethod::from_tag("card", None).is_err());
    }

    #[test]
    fn test_payment_must_be_positive() {
        assert!(Payment::new("i", Money::zero(), PaymentMethod::Cash, today()).is_err());
        assert!(Payment::new("i", Money::from_pence(-5), PaymentMethod::Cash, today()).is_err());
    }

    #[test]
    fn test_reminder_history_row_records_phase() {
        let mut inv = invoice();
        inv.advance_reminder();
        let row = InvoiceReminder::for_invoice(&inv, today());
        assert_eq!(row.phase, ReminderPhase::Reminder1);
        assert_eq!(row.invoice_id, inv.meta.id);
    }
}
