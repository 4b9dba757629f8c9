//! # Pricing Engine
//!
//! Turns a completed job or a parts order into a [`PriceBreakdown`].
//! Quoting is pure: the Flexible plan's spend accrual is returned as a
//! [`Quote::spend_effect`] for the caller to commit against an invoice,
//! never applied here.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Job                                    CustomerPartsOrder              │
//! │   │                                      │                              │
//! │   ├─ duration = round(Σ secs / 3600, 2)  │                              │
//! │   ├─ labour   = round(duration × pay, 2) │                              │
//! │   └─ parts    = Σ raw price × qty        └─ parts = Σ marked-up × qty   │
//! │                  │                                  │                   │
//! │                  └──────────► subtotal ◄────────────┘                   │
//! │                                  │                                      │
//! │                    vat = round(subtotal × vat%, 2)                      │
//! │                    grand_total = subtotal + vat                         │
//! │                                  │                                      │
//! │             rate = plan.rate_for(job type | parts), 0 with no plan      │
//! │             final_total = grand_total − round(grand_total × rate, 2)    │
//! │             discount_value = grand_total − final_total                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, PriceControl};
use crate::discount::{DiscountBasis, DiscountPlan};
use crate::error::{CoreError, CoreResult};
use crate::job::{Job, Mechanic};
use crate::money::{Hours, Money, Percent};
use crate::order::CustomerPartsOrder;

/// What is being priced.
#[derive(Debug, Clone, Copy)]
pub enum PricingTarget<'a> {
    /// A job and the mechanic assigned to it.
    Job {
        job: &'a Job,
        mechanic: Option<&'a Mechanic>,
    },
    Order(&'a CustomerPartsOrder),
}

impl PricingTarget<'_> {
    pub fn discount_basis(&self) -> DiscountBasis {
        match self {
            PricingTarget::Job { job, .. } => DiscountBasis::Job(job.job_type),
            PricingTarget::Order(_) => DiscountBasis::Parts,
        }
    }
}

/// Every stage of a priced invoice, each rounded to the penny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub labour: Money,
    pub parts: Money,
    pub subtotal: Money,
    pub vat: Money,
    pub grand_total: Money,
    pub discount_rate: Percent,
    pub discount_value: Money,
    pub final_total: Money,
}

/// A priced target, plus the monthly spend it would accrue once committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub breakdown: PriceBreakdown,
    /// Pre-discount grand total owed to a Flexible plan holder's monthly
    /// spend. `None` for every other plan.
    pub spend_effect: Option<Money>,
}

/// Pre-VAT cost of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobCost {
    pub duration: Hours,
    pub labour: Money,
    pub parts: Money,
    pub subtotal: Money,
}

/// Costs a job: labour at the mechanic's rate plus parts at raw price.
///
/// ## When This Occurs
/// `NotFound` when the job has no mechanic assigned, when the supplied
/// mechanic is missing or is not the one assigned, or when a part join
/// names a part absent from `catalog`.
pub fn job_cost(job: &Job, mechanic: Option<&Mechanic>, catalog: &Catalog) -> CoreResult<JobCost> {
    let assigned = job
        .mechanic_id
        .as_deref()
        .ok_or_else(|| CoreError::not_found("Mechanic", format!("<unassigned on job {}>", job.job_number)))?;
    let mechanic = mechanic
        .filter(|m| m.meta.id == assigned)
        .ok_or_else(|| CoreError::not_found("Mechanic", assigned))?;

    let duration = job.duration();
    let labour = duration.times_rate(mechanic.hourly_pay);

    let mut parts = Money::zero();
    for join in job.live_parts() {
        parts += catalog.part(&join.part_id)?.price.multiply_quantity(join.quantity);
    }

    Ok(JobCost {
        duration,
        labour,
        parts,
        subtotal: labour + parts,
    })
}

/// Costs a parts order at marked-up prices.
pub fn order_cost(
    order: &CustomerPartsOrder,
    catalog: &Catalog,
    controls: &PriceControl,
) -> CoreResult<Money> {
    let mut total = Money::zero();
    for line in order.live_lines() {
        let part = catalog.part(&line.part_id)?;
        total += part.marked_up_price(controls).multiply_quantity(line.quantity);
    }
    Ok(total)
}

/// Prices a target under the active price control and the customer's
/// resolved discount plan.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use garage_core::catalog::{Catalog, Part, PriceControl};
/// use garage_core::money::{Money, Percent};
/// use garage_core::order::{CustomerPartsOrder, SellLine};
/// use garage_core::pricing::{quote, PricingTarget};
///
/// let controls = PriceControl::new(Percent::from_bps(2_000), Percent::from_bps(1_000)).unwrap();
/// let part = Part::new("BRK-01", "Brake pads", Money::from_pence(10_000), 5, 1).unwrap();
/// let mut order = CustomerPartsOrder::new("c-1", NaiveDate::from_ymd_opt(2026, 5, 1).unwrap());
/// order.lines.push(SellLine::new(&part.meta.id, 1).unwrap());
/// let catalog = Catalog::from_parts(vec![part]);
///
/// let q = quote(PricingTarget::Order(&order), &catalog, &controls, None).unwrap();
/// assert_eq!(q.breakdown.subtotal.pence(), 11_000);
/// assert_eq!(q.breakdown.final_total.pence(), 13_200);
/// ```
pub fn quote(
    target: PricingTarget<'_>,
    catalog: &Catalog,
    controls: &PriceControl,
    plan: Option<&DiscountPlan>,
) -> CoreResult<Quote> {
    let (labour, parts) = match target {
        PricingTarget::Job { job, mechanic } => {
            let cost = job_cost(job, mechanic, catalog)?;
            (cost.labour, cost.parts)
        }
        PricingTarget::Order(order) => (Money::zero(), order_cost(order, catalog, controls)?),
    };

    let subtotal = labour + parts;
    let vat = subtotal.percentage(controls.vat);
    let grand_total = subtotal + vat;

    let discount_rate = plan
        .map(|p| p.rate_for(target.discount_basis()))
        .unwrap_or_default();
    let final_total = grand_total.apply_percentage_discount(discount_rate);

    let spend_effect = plan.filter(|p| p.accrues_spend()).map(|_| grand_total);

    Ok(Quote {
        breakdown: PriceBreakdown {
            labour,
            parts,
            subtotal,
            vat,
            grand_total,
            discount_rate,
            discount_value: grand_total - final_total,
            final_total,
        },
        spend_effect,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
