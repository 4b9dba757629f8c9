//! # Customers
//!
//! One struct for every customer, with the kind-specific data held in a
//! closed [`CustomerProfile`] enum.
//!
//! ```text
//! Customer { meta, contact, registered_on, profile }
//!                                            │
//!        ┌───────────────────────────────────┼──────────────────────────┐
//!        ▼                                   ▼                          ▼
//!     Dropin                      AccountHolder(Account)     Business { account, company }
//!                                  address, postcode,
//!                                  suspended, monthly spend,
//!                                  discount: Option<DiscountPlan>
//! ```

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::discount::DiscountPlan;
use crate::error::CoreResult;
use crate::money::Money;
use crate::types::{CustomerKind, EntityMeta};
use crate::validation::{validate_email, validate_name, validate_phone_number, validate_postcode};

// =============================================================================
// Contact
// =============================================================================

/// Contact details every customer kind shares.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contact {
    pub forename: String,
    pub surname: String,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
}

impl Contact {
    pub fn new(forename: &str, surname: &str) -> Self {
        Contact {
            forename: forename.trim().to_string(),
            surname: surname.trim().to_string(),
            emails: Vec::new(),
            phone_numbers: Vec::new(),
        }
    }

    pub fn add_email(&mut self, email: &str) -> CoreResult<()> {
        validate_email(email)?;
        self.emails.push(email.trim().to_string());
        Ok(())
    }

    pub fn add_phone_number(&mut self, phone: &str) -> CoreResult<()> {
        validate_phone_number(phone)?;
        self.phone_numbers.push(phone.to_string());
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.forename, self.surname)
    }
}

// =============================================================================
// Account
// =============================================================================

/// Account data held by account holders and business customers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub postcode: String,
    pub suspended: bool,
    /// Running pre-discount spend for `spend_month`.
    pub spent_this_month: Money,
    /// First day of the month `spent_this_month` belongs to.
    pub spend_month: Option<NaiveDate>,
    pub discount: Option<DiscountPlan>,
}

impl Account {
    pub fn new(address: &str, postcode: &str) -> CoreResult<Self> {
        validate_postcode(postcode)?;
        Ok(Account {
            address: address.trim().to_string(),
            postcode: postcode.trim().to_uppercase(),
            ..Account::default()
        })
    }

    /// Returns `address, postcode`.
    pub fn full_address(&self) -> String {
        format!("{}, {}", self.address, self.postcode)
    }

    /// Spend accrued in the month containing `on`.
    pub fn spend_in_month_of(&self, on: NaiveDate) -> Money {
        if self.spend_month == Some(month_start(on)) {
            self.spent_this_month
        } else {
            Money::zero()
        }
    }

    /// Adds `amount` to the month containing `on`, starting the month over
    /// when the last recorded spend belongs to an earlier one.
    ///
    /// Returns the new running total.
    pub fn record_spend(&mut self, amount: Money, on: NaiveDate) -> Money {
        let month = month_start(on);
        if self.spend_month != Some(month) {
            self.spend_month = Some(month);
            self.spent_this_month = Money::zero();
        }
        self.spent_this_month += amount;
        self.spent_this_month
    }
}

fn month_start(on: NaiveDate) -> NaiveDate {
    on.with_day(1).unwrap_or(on)
}

/// Company identity of a business customer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Company {
    pub company_name: String,
    pub rep_role: String,
}

impl Company {
    pub fn new(company_name: &str, rep_role: &str) -> CoreResult<Self> {
        validate_name("company_name", company_name, 100)?;
        Ok(Company {
            company_name: company_name.trim().to_string(),
            rep_role: rep_role.trim().to_string(),
        })
    }
}

// =============================================================================
// Customer
// =============================================================================

/// Kind-specific customer data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomerProfile {
    Dropin,
    AccountHolder(Account),
    Business { account: Account, company: Company },
}

/// A garage customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub meta: EntityMeta,
    pub contact: Contact,
    pub registered_on: NaiveDate,
    pub profile: CustomerProfile,
}

impl Customer {
    fn with_profile(contact: Contact, profile: CustomerProfile) -> Self {
        Customer {
            meta: EntityMeta::new(),
            contact,
            registered_on: Utc::now().date_naive(),
            profile,
        }
    }

    pub fn dropin(contact: Contact) -> Self {
        Self::with_profile(contact, CustomerProfile::Dropin)
    }

    pub fn account_holder(contact: Contact, account: Account) -> Self {
        Self::with_profile(contact, CustomerProfile::AccountHolder(account))
    }

    pub fn business(contact: Contact, account: Account, company: Company) -> Self {
        Self::with_profile(contact, CustomerProfile::Business { account, company })
    }

    pub fn kind(&self) -> CustomerKind {
        match self.profile {
            CustomerProfile::Dropin => CustomerKind::Dropin,
            CustomerProfile::AccountHolder(_) => CustomerKind::AccountHolder,
            CustomerProfile::Business { .. } => CustomerKind::Business,
        }
    }

    pub fn account(&self) -> Option<&Account> {
        match &self.profile {
            CustomerProfile::Dropin => None,
            CustomerProfile::AccountHolder(account) => Some(account),
            CustomerProfile::Business { account, .. } => Some(account),
        }
    }

    pub fn account_mut(&mut self) -> Option<&mut Account> {
        match &mut self.profile {
            CustomerProfile::Dropin => None,
            CustomerProfile::AccountHolder(account) => Some(account),
            CustomerProfile::Business { account, .. } => Some(account),
        }
    }

    pub fn company(&self) -> Option<&Company> {
        match &self.profile {
            CustomerProfile::Business { company, .. } => Some(company),
            _ => None,
        }
    }

    pub fn full_name(&self) -> String {
        self.contact.full_name()
    }

    /// Company name for business customers, full name otherwise.
    pub fn display_name(&self) -> String {
        match self.company() {
            Some(company) => company.company_name.clone(),
            None => self.full_name(),
        }
    }

    /// `Forename Surname, Role` of a business customer's representative.
    pub fn rep(&self) -> Option<String> {
        self.company()
            .map(|company| format!("{}, {}", self.full_name(), company.rep_role))
    }

    /// All email addresses separated by `; `.
    pub fn list_emails(&self) -> String {
        self.contact.emails.join("; ")
    }

    /// All phone numbers separated by `, `.
    pub fn list_phones(&self) -> String {
        self.contact.phone_numbers.join(", ")
    }

    pub fn full_address(&self) -> Option<String> {
        self.account().map(Account::full_address)
    }

    /// Replaces the discount plan. Drop-in customers cannot hold one.
    pub fn set_discount(&mut self, plan: Option<DiscountPlan>) -> CoreResult<()> {
        match self.account_mut() {
            Some(account) => {
                account.discount = plan;
                Ok(())
            }
            None => Err(crate::error::ValidationError::NotAllowed {
                field: "discount".to_string(),
                allowed: vec!["account_holder".to_string(), "business".to_string()],
            }
            .into()),
        }
    }
}
