//! # Discount Plans
//!
//! The three discount plan variants and the resolver that picks the one
//! (if any) that applies to a customer.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      resolve(customer)                                  │
//! │                                                                         │
//! │  Customer.profile                                                       │
//! │     │                                                                   │
//! │     ├── Dropin ──────────────────────────────► None                     │
//! │     │                                                                   │
//! │     ├── AccountHolder(account) ─┐                                       │
//! │     │                           ├──► account.discount                   │
//! │     └── Business { account } ───┘       │                               │
//! │                                         ├── None ──────────► None       │
//! │                                         ├── Some(tombstoned) ► None     │
//! │                                         └── Some(plan) ─────► plan      │
//! │                                                                         │
//! │  One match, no probing: an account holds at most one plan because      │
//! │  there is exactly one Option to put it in.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::customer::{Customer, CustomerProfile};
use crate::error::{CoreResult, ValidationError};
use crate::money::{Money, Percent};
use crate::types::{EntityMeta, JobType};
use crate::validation::validate_percent;

/// Discriminant stored alongside a plan row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    Fixed,
    Flexible,
    Variable,
}

/// What is being priced, as far as a discount rate is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountBasis {
    Job(JobType),
    Parts,
}

/// Per-service rates of a variable plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRates {
    pub mot: Percent,
    pub repair: Percent,
    pub annual: Percent,
    pub parts: Percent,
}

impl VariableRates {
    pub fn rate_for(&self, basis: DiscountBasis) -> Percent {
        match basis {
            DiscountBasis::Job(JobType::Mot) => self.mot,
            DiscountBasis::Job(JobType::Repair) => self.repair,
            DiscountBasis::Job(JobType::Annual) => self.annual,
            DiscountBasis::Parts => self.parts,
        }
    }
}

/// The terms of a discount plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DiscountScheme {
    /// One rate for everything.
    Fixed { rate: Percent },
    /// One rate, plus the pre-discount total accrues to the holder's
    /// monthly spend. `lower`/`upper` are kept with the plan but play no
    /// part in pricing.
    Flexible {
        rate: Percent,
        lower: Money,
        upper: Money,
    },
    /// A rate per job type, and one for parts orders.
    Variable(VariableRates),
}

/// A discount plan attached to an account holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountPlan {
    pub meta: EntityMeta,
    pub scheme: DiscountScheme,
}

impl DiscountPlan {
    pub fn fixed(rate: Percent) -> CoreResult<Self> {
        validate_percent("discount", rate)?;
        Ok(Self::with_scheme(DiscountScheme::Fixed { rate }))
    }

    pub fn flexible(rate: Percent, lower: Money, upper: Money) -> CoreResult<Self> {
        validate_percent("discount", rate)?;
        if lower > upper {
            return Err(ValidationError::OutOfRange {
                field: "lower_range".to_string(),
                min: 0,
                max: upper.pence(),
            }
            .into());
        }
        Ok(Self::with_scheme(DiscountScheme::Flexible { rate, lower, upper }))
    }

    pub fn variable(rates: VariableRates) -> CoreResult<Self> {
        validate_percent("mot_discount", rates.mot)?;
        validate_percent("repair_discount", rates.repair)?;
        validate_percent("annual_discount", rates.annual)?;
        validate_percent("parts_discount", rates.parts)?;
        Ok(Self::with_scheme(DiscountScheme::Variable(rates)))
    }

    fn with_scheme(scheme: DiscountScheme) -> Self {
        DiscountPlan {
            meta: EntityMeta::new(),
            scheme,
        }
    }

    pub fn kind(&self) -> DiscountKind {
        match self.scheme {
            DiscountScheme::Fixed { .. } => DiscountKind::Fixed,
            DiscountScheme::Flexible { .. } => DiscountKind::Flexible,
            DiscountScheme::Variable(_) => DiscountKind::Variable,
        }
    }

    /// The rate applied to a job of the given type, or to a parts order.
    pub fn rate_for(&self, basis: DiscountBasis) -> Percent {
        match &self.scheme {
            DiscountScheme::Fixed { rate } => *rate,
            DiscountScheme::Flexible { rate, .. } => *rate,
            DiscountScheme::Variable(rates) => rates.rate_for(basis),
        }
    }

    /// True when pricing under this plan accrues the holder's monthly spend.
    pub fn accrues_spend(&self) -> bool {
        matches!(self.scheme, DiscountScheme::Flexible { .. })
    }
}

/// Returns the discount plan that applies to `customer`, if any.
///
/// ## Example
/// ```rust
/// use garage_core::customer::{Contact, Customer};
/// use garage_core::discount::resolve;
///
/// let walk_in = Customer::dropin(Contact::new("Sam", "Lee"));
/// assert!(resolve(&walk_in).is_none());
/// ```
pub fn resolve(customer: &Customer) -> Option<&DiscountPlan> {
    let account = match &customer.profile {
        CustomerProfile::Dropin => return None,
        CustomerProfile::AccountHolder(account) => account,
        CustomerProfile::Business { account, .. } => account,
    };

    account.discount.as_ref().filter(|plan| plan.meta.is_live())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::{Account, Company, Contact};
    use chrono::Utc;

    fn rates() -> VariableRates {
        VariableRates {
            mot: Percent::from_bps(500),
            repair: Percent::from_bps(750),
            annual: Percent::from_bps(1_000),
            parts: Percent::from_bps(250),
        }
    }

    fn holder_with(plan: Option<DiscountPlan>) -> Customer {
        let mut account = Account::new("1 High St", "AB1 2CD").unwrap();
        account.discount = plan;
        Customer::account_holder(Contact::new("Ann", "Hill"), account)
    }

    #[test]
    fn test_dropin_resolves_to_none() {
        let customer = Customer::dropin(Contact::new("Sam", "Lee"));
        assert!(resolve(&customer).is_none());
    }

    #[test]
    fn test_account_without_plan_resolves_to_none() {
        assert!(resolve(&holder_with(None)).is_none());
    }

    #[test]
    fn test_each_variant_resolves_directly() {
        let fixed = holder_with(Some(DiscountPlan::fixed(Percent::from_bps(1_000)).unwrap()));
        assert_eq!(resolve(&fixed).map(|p| p.kind()), Some(DiscountKind::Fixed));

        let flexible = holder_with(Some(
            DiscountPlan::flexible(Percent::from_bps(300), Money::zero(), Money::from_pence(100_000))
                .unwrap(),
        ));
        assert_eq!(resolve(&flexible).map(|p| p.kind()), Some(DiscountKind::Flexible));

        let variable = holder_with(Some(DiscountPlan::variable(rates()).unwrap()));
        assert_eq!(resolve(&variable).map(|p| p.kind()), Some(DiscountKind::Variable));
    }

    #[test]
    fn test_business_customer_uses_its_account_plan() {
        let mut account = Account::new("Unit 4", "ZX9 8YW").unwrap();
        account.discount = Some(DiscountPlan::fixed(Percent::from_bps(1_500)).unwrap());
        let customer = Customer::business(
            Contact::new("Raj", "Patel"),
            account,
            Company::new("Patel Haulage", "Fleet manager").unwrap(),
        );
        let plan = resolve(&customer).unwrap();
        assert_eq!(plan.rate_for(DiscountBasis::Parts), Percent::from_bps(1_500));
    }

    #[test]
    fn test_tombstoned_plan_is_ignored() {
        let mut plan = DiscountPlan::fixed(Percent::from_bps(1_000)).unwrap();
        plan.meta.deleted_at = Some(Utc::now());
        assert!(resolve(&holder_with(Some(plan))).is_none());
    }

    #[test]
    fn test_variable_rate_selection() {
        let plan = DiscountPlan::variable(rates()).unwrap();
        assert_eq!(plan.rate_for(DiscountBasis::Job(JobType::Mot)).bps(), 500);
        assert_eq!(plan.rate_for(DiscountBasis::Job(JobType::Repair)).bps(), 750);
        assert_eq!(plan.rate_for(DiscountBasis::Job(JobType::Annual)).bps(), 1_000);
        assert_eq!(plan.rate_for(DiscountBasis::Parts).bps(), 250);
    }

    #[test]
    fn test_flexible_range_must_be_ordered() {
        let err = DiscountPlan::flexible(
            Percent::from_bps(300),
            Money::from_pence(5_000),
            Money::from_pence(1_000),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_only_flexible_accrues_spend() {
        assert!(!DiscountPlan::fixed(Percent::zero()).unwrap().accrues_spend());
        assert!(!DiscountPlan::variable(rates()).unwrap().accrues_spend());
        assert!(DiscountPlan::flexible(Percent::zero(), Money::zero(), Money::zero())
            .unwrap()
            .accrues_spend());
    }
}
