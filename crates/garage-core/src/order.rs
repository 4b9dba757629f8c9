//! Parts sold over the counter, and parts bought in from suppliers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::CoreResult;
use crate::money::Money;
use crate::types::EntityMeta;
use crate::validation::{validate_name, validate_phone_number, validate_quantity};

// =============================================================================
// Customer Parts Order
// =============================================================================

/// One line of a counter sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellLine {
    pub meta: EntityMeta,
    pub part_id: String,
    pub quantity: i64,
    pub sufficient_quantity: bool,
}

impl SellLine {
    pub fn new(part_id: &str, quantity: i64) -> CoreResult<Self> {
        validate_quantity(quantity)?;
        Ok(SellLine {
            meta: EntityMeta::new(),
            part_id: part_id.to_string(),
            quantity,
            sufficient_quantity: true,
        })
    }
}

/// Parts sold directly to a customer of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerPartsOrder {
    pub meta: EntityMeta,
    pub customer_id: String,
    pub order_date: NaiveDate,
    pub lines: Vec<SellLine>,
}

impl CustomerPartsOrder {
    pub fn new(customer_id: &str, order_date: NaiveDate) -> Self {
        CustomerPartsOrder {
            meta: EntityMeta::new(),
            customer_id: customer_id.to_string(),
            order_date,
            lines: Vec::new(),
        }
    }

    pub fn live_lines(&self) -> impl Iterator<Item = &SellLine> {
        self.lines.iter().filter(|l| l.meta.is_live())
    }
}

// =============================================================================
// Suppliers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub meta: EntityMeta,
    pub company_name: String,
    pub address: String,
    pub postcode: String,
    pub phone_number: String,
    pub email: String,
}

impl Supplier {
    pub fn new(company_name: &str, phone_number: &str) -> CoreResult<Self> {
        validate_name("company_name", company_name, 100)?;
        validate_phone_number(phone_number)?;
        Ok(Supplier {
            meta: EntityMeta::new(),
            company_name: company_name.trim().to_string(),
            address: String::new(),
            postcode: String::new(),
            phone_number: phone_number.to_string(),
            email: String::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierOrderLine {
    pub meta: EntityMeta,
    pub part_id: String,
    pub quantity: i64,
}

impl SupplierOrderLine {
    pub fn new(part_id: &str, quantity: i64) -> CoreResult<Self> {
        validate_quantity(quantity)?;
        Ok(SupplierOrderLine {
            meta: EntityMeta::new(),
            part_id: part_id.to_string(),
            quantity,
        })
    }
}

/// A delivery of parts from a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierOrder {
    pub meta: EntityMeta,
    pub supplier_id: String,
    pub order_date: NaiveDate,
    pub lines: Vec<SupplierOrderLine>,
}

impl SupplierOrder {
    pub fn new(supplier_id: &str, order_date: NaiveDate) -> Self {
        SupplierOrder {
            meta: EntityMeta::new(),
            supplier_id: supplier_id.to_string(),
            order_date,
            lines: Vec::new(),
        }
    }

    pub fn live_lines(&self) -> impl Iterator<Item = &SupplierOrderLine> {
        self.lines.iter().filter(|l| l.meta.is_live())
    }

    /// Cost of the delivery at the parts' raw (pre-markup) price.
    pub fn total_price(&self, catalog: &Catalog) -> CoreResult<Money> {
        let mut total = Money::zero();
        for line in self.live_lines() {
            total += catalog.part(&line.part_id)?.price.multiply_quantity(line.quantity);
        }
        Ok(total)
    }
}
