//! # Customer Repository
//!
//! Customers, their contact lists and their discount plans.
//!
//! ## Storage Layout
//! ```text
//! ┌──────────────────┐      ┌──────────────────┐
//! │ customers        │─────►│ discount_plans   │  0..1, UNIQUE fk
//! │  kind            │      └──────────────────┘
//! │  account columns │      ┌──────────────────┐
//! │  company columns │◄─────│ customer_emails  │  0..n
//! └──────────────────┘      └──────────────────┘
//!          ▲                ┌──────────────────┐
//!          └────────────────│ customer_phones  │  0..n
//!                           └──────────────────┘
//! ```
//!
//! Account and company columns are NULL for drop-in customers. The row is
//! folded back into [`CustomerProfile`] on load.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{ensure_updated, soft_delete, MetaRow};
use crate::error::{DbError, DbResult};
use garage_core::customer::{Account, Company, Contact, Customer, CustomerProfile};
use garage_core::discount::{DiscountKind, DiscountPlan, DiscountScheme, VariableRates};
use garage_core::{CustomerKind, EntityMeta, Money, Percent};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    kind: CustomerKind,
    forename: String,
    surname: String,
    registered_on: NaiveDate,
    address: Option<String>,
    postcode: Option<String>,
    suspended: bool,
    spent_this_month: Money,
    spend_month: Option<NaiveDate>,
    discount_plan_id: Option<String>,
    company_name: Option<String>,
    rep_role: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    #[sqlx(flatten)]
    meta: MetaRow,
    kind: DiscountKind,
    rate: Percent,
    lower_range: Money,
    upper_range: Money,
    mot_rate: Percent,
    repair_rate: Percent,
    annual_rate: Percent,
    parts_rate: Percent,
}

impl From<PlanRow> for DiscountPlan {
    fn from(row: PlanRow) -> Self {
        let scheme = match row.kind {
            DiscountKind::Fixed => DiscountScheme::Fixed { rate: row.rate },
            DiscountKind::Flexible => DiscountScheme::Flexible {
                rate: row.rate,
                lower: row.lower_range,
                upper: row.upper_range,
            },
            DiscountKind::Variable => DiscountScheme::Variable(VariableRates {
                mot: row.mot_rate,
                repair: row.repair_rate,
                annual: row.annual_rate,
                parts: row.parts_rate,
            }),
        };
        DiscountPlan {
            meta: row.meta.into(),
            scheme,
        }
    }
}

/// Flattens a scheme into the plan table's columns.
struct PlanColumns {
    rate: Percent,
    lower: Money,
    upper: Money,
    rates: VariableRates,
}

impl PlanColumns {
    fn of(plan: &DiscountPlan) -> Self {
        let none = VariableRates {
            mot: Percent::zero(),
            repair: Percent::zero(),
            annual: Percent::zero(),
            parts: Percent::zero(),
        };
        match &plan.scheme {
            DiscountScheme::Fixed { rate } => PlanColumns {
                rate: *rate,
                lower: Money::zero(),
                upper: Money::zero(),
                rates: none,
            },
            DiscountScheme::Flexible { rate, lower, upper } => PlanColumns {
                rate: *rate,
                lower: *lower,
                upper: *upper,
                rates: none,
            },
            DiscountScheme::Variable(rates) => PlanColumns {
                rate: Percent::zero(),
                lower: Money::zero(),
                upper: Money::zero(),
                rates: *rates,
            },
        }
    }
}

const CUSTOMER_COLUMNS: &str = "id, kind, forename, surname, registered_on, address, postcode, \
     suspended, spent_this_month, spend_month, discount_plan_id, company_name, rep_role, \
     created_at, updated_at, deleted_at, version";

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Inserts a customer with its plan, emails and phone numbers in one
    /// transaction.
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.meta.id, kind = ?customer.kind(), "Inserting customer");

        let mut tx = self.pool.begin().await?;

        let plan = customer.account().and_then(|a| a.discount.as_ref());
        if let Some(plan) = plan {
            insert_plan(&mut tx, plan).await?;
        }

        let account = customer.account();
        let company = customer.company();

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, kind, forename, surname, registered_on,
                address, postcode, suspended, spent_this_month, spend_month,
                discount_plan_id, company_name, rep_role,
                created_at, updated_at, deleted_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&customer.meta.id)
        .bind(customer.kind())
        .bind(&customer.contact.forename)
        .bind(&customer.contact.surname)
        .bind(customer.registered_on)
        .bind(account.map(|a| a.address.as_str()))
        .bind(account.map(|a| a.postcode.as_str()))
        .bind(account.is_some_and(|a| a.suspended))
        .bind(account.map(|a| a.spent_this_month).unwrap_or_default())
        .bind(account.and_then(|a| a.spend_month))
        .bind(plan.map(|p| p.meta.id.as_str()))
        .bind(company.map(|c| c.company_name.as_str()))
        .bind(company.map(|c| c.rep_role.as_str()))
        .bind(customer.meta.created_at)
        .bind(customer.meta.updated_at)
        .bind(customer.meta.deleted_at)
        .bind(customer.meta.version)
        .execute(&mut *tx)
        .await?;

        for email in &customer.contact.emails {
            insert_contact_line(&mut tx, "customer_emails", "address", &customer.meta.id, email)
                .await?;
        }
        for phone in &customer.contact.phone_numbers {
            insert_contact_line(&mut tx, "customer_phones", "phone_number", &customer.meta.id, phone)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Loads a live customer with plan and contact lists.
    pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Customer> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        let row = row.ok_or_else(|| DbError::not_found("Customer", id))?;

        let discount = match &row.discount_plan_id {
            Some(plan_id) => Some(fetch_plan(conn, plan_id).await?),
            None => None,
        };

        let emails: Vec<String> = sqlx::query_scalar(
            "SELECT address FROM customer_emails \
             WHERE customer_id = ?1 AND deleted_at IS NULL ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let phone_numbers: Vec<String> = sqlx::query_scalar(
            "SELECT phone_number FROM customer_phones \
             WHERE customer_id = ?1 AND deleted_at IS NULL ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let contact = Contact {
            forename: row.forename,
            surname: row.surname,
            emails,
            phone_numbers,
        };

        let account = || Account {
            address: row.address.clone().unwrap_or_default(),
            postcode: row.postcode.clone().unwrap_or_default(),
            suspended: row.suspended,
            spent_this_month: row.spent_this_month,
            spend_month: row.spend_month,
            discount: discount.clone(),
        };

        let profile = match row.kind {
            CustomerKind::Dropin => CustomerProfile::Dropin,
            CustomerKind::AccountHolder => CustomerProfile::AccountHolder(account()),
            CustomerKind::Business => CustomerProfile::Business {
                account: account(),
                company: Company {
                    company_name: row.company_name.clone().unwrap_or_default(),
                    rep_role: row.rep_role.clone().unwrap_or_default(),
                },
            },
        };

        Ok(Customer {
            meta: row.meta.into(),
            contact,
            registered_on: row.registered_on,
            profile,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Customer> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Live customers, optionally of one kind, by surname.
    pub async fn list(&self, kind: Option<CustomerKind>) -> DbResult<Vec<Customer>> {
        let mut conn = self.pool.acquire().await?;
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM customers \
             WHERE deleted_at IS NULL AND (?1 IS NULL OR kind = ?1) \
             ORDER BY surname, forename",
        )
        .bind(kind)
        .fetch_all(&mut *conn)
        .await?;

        let mut customers = Vec::with_capacity(ids.len());
        for id in ids {
            customers.push(Self::fetch(&mut conn, &id).await?);
        }
        Ok(customers)
    }

    /// Versioned write of the name, account and company columns.
    ///
    /// The plan reference is written as held by the account; the plan row
    /// itself must already exist.
    pub(crate) async fn save(conn: &mut SqliteConnection, customer: &mut Customer) -> DbResult<()> {
        let now = Utc::now();
        let account = customer.account();
        let company = customer.company();

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                forename = ?3, surname = ?4,
                address = ?5, postcode = ?6, suspended = ?7,
                spent_this_month = ?8, spend_month = ?9, discount_plan_id = ?10,
                company_name = ?11, rep_role = ?12,
                updated_at = ?13, version = version + 1
            WHERE id = ?1 AND version = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(&customer.meta.id)
        .bind(customer.meta.version)
        .bind(&customer.contact.forename)
        .bind(&customer.contact.surname)
        .bind(account.map(|a| a.address.as_str()))
        .bind(account.map(|a| a.postcode.as_str()))
        .bind(account.is_some_and(|a| a.suspended))
        .bind(account.map(|a| a.spent_this_month).unwrap_or_default())
        .bind(account.and_then(|a| a.spend_month))
        .bind(account.and_then(|a| a.discount.as_ref()).map(|p| p.meta.id.as_str()))
        .bind(company.map(|c| c.company_name.as_str()))
        .bind(company.map(|c| c.rep_role.as_str()))
        .bind(now)
        .execute(&mut *conn)
        .await?;

        ensure_updated(conn, result, "customers", "Customer", &customer.meta).await?;
        customer.meta.bump(now);
        Ok(())
    }

    pub async fn update(&self, customer: &mut Customer) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::save(&mut conn, customer).await
    }

    /// Swaps the customer's discount plan. The old plan row is tombstoned.
    ///
    /// ## When This Occurs
    /// `Core(Validation(NotAllowed))` for a drop-in customer.
    pub async fn set_discount(
        &self,
        customer_id: &str,
        plan: Option<DiscountPlan>,
    ) -> DbResult<Customer> {
        let mut tx = self.pool.begin().await?;
        let mut customer = Self::fetch(&mut tx, customer_id).await?;

        let previous = customer
            .account()
            .and_then(|a| a.discount.as_ref())
            .map(|p| p.meta.id.clone());
        let new_kind = plan.as_ref().map(DiscountPlan::kind);

        customer.set_discount(plan.clone())?;

        if let Some(new_plan) = &plan {
            insert_plan(&mut tx, new_plan).await?;
        }
        Self::save(&mut tx, &mut customer).await?;
        if let Some(old_id) = previous {
            soft_delete(&mut tx, "discount_plans", "DiscountPlan", &old_id).await?;
        }

        tx.commit().await?;
        info!(customer = %customer_id, plan = ?new_kind, "Discount plan replaced");
        Ok(customer)
    }

    pub async fn add_email(&self, customer_id: &str, email: &str) -> DbResult<()> {
        garage_core::validation::validate_email(email)?;
        let mut conn = self.pool.acquire().await?;
        insert_contact_line(&mut conn, "customer_emails", "address", customer_id, email.trim()).await
    }

    pub async fn add_phone_number(&self, customer_id: &str, phone: &str) -> DbResult<()> {
        garage_core::validation::validate_phone_number(phone)?;
        let mut conn = self.pool.acquire().await?;
        insert_contact_line(&mut conn, "customer_phones", "phone_number", customer_id, phone).await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        soft_delete(&mut conn, "customers", "Customer", id).await
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn insert_plan(conn: &mut SqliteConnection, plan: &DiscountPlan) -> DbResult<()> {
    let cols = PlanColumns::of(plan);

    sqlx::query(
        r#"
        INSERT INTO discount_plans (
            id, kind, rate, lower_range, upper_range,
            mot_rate, repair_rate, annual_rate, parts_rate,
            created_at, updated_at, deleted_at, version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&plan.meta.id)
    .bind(plan.kind())
    .bind(cols.rate)
    .bind(cols.lower)
    .bind(cols.upper)
    .bind(cols.rates.mot)
    .bind(cols.rates.repair)
    .bind(cols.rates.annual)
    .bind(cols.rates.parts)
    .bind(plan.meta.created_at)
    .bind(plan.meta.updated_at)
    .bind(plan.meta.deleted_at)
    .bind(plan.meta.version)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn fetch_plan(conn: &mut SqliteConnection, id: &str) -> DbResult<DiscountPlan> {
    let row: Option<PlanRow> = sqlx::query_as(
        r#"
        SELECT id, kind, rate, lower_range, upper_range,
               mot_rate, repair_rate, annual_rate, parts_rate,
               created_at, updated_at, deleted_at, version
        FROM discount_plans
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(DiscountPlan::from)
        .ok_or_else(|| DbError::not_found("DiscountPlan", id))
}

async fn insert_contact_line(
    conn: &mut SqliteConnection,
    table: &'static str,
    column: &'static str,
    customer_id: &str,
    value: &str,
) -> DbResult<()> {
    let meta = EntityMeta::new();
    sqlx::query(&format!(
        "INSERT INTO {table} (id, customer_id, {column}, created_at, updated_at, deleted_at, version) \
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, 0)"
    ))
    .bind(&meta.id)
    .bind(customer_id)
    .bind(value)
    .bind(meta.created_at)
    .bind(meta.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
