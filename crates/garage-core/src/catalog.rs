//! # Catalog
//!
//! Price control, parts inventory and the task list.
//!
//! ## Price Control
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  price_controls table                                                   │
//! │                                                                         │
//! │   vat     markup   deleted_at                                           │
//! │   17.50   12.00    2025-03-31   ← tombstoned, ignored                   │
//! │   20.00   10.00    NULL         ← THE active record                     │
//! │                                                                         │
//! │  0 live records  → ConfigurationError                                  │
//! │  2+ live records → ConfigurationError                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Percent};
use crate::types::EntityMeta;
use crate::validation::{validate_name, validate_part_code, validate_percent, validate_price, validate_quantity};

// =============================================================================
// Price Control
// =============================================================================

/// The garage-wide VAT and parts markup rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceControl {
    pub meta: EntityMeta,
    pub vat: Percent,
    pub markup: Percent,
}

impl PriceControl {
    /// Creates a new price control record after validating both rates.
    pub fn new(vat: Percent, markup: Percent) -> CoreResult<Self> {
        validate_percent("vat", vat)?;
        validate_percent("markup", markup)?;

        Ok(PriceControl {
            meta: EntityMeta::new(),
            vat,
            markup,
        })
    }

    /// Picks the single live record out of everything storage returned.
    ///
    /// ## Example
    /// ```rust
    /// use garage_core::catalog::PriceControl;
    /// use garage_core::money::Percent;
    ///
    /// let only = PriceControl::new(Percent::from_bps(2_000), Percent::from_bps(1_000)).unwrap();
    /// let records = vec![only];
    /// assert!(PriceControl::resolve_active(&records).is_ok());
    /// assert!(PriceControl::resolve_active(&[]).is_err());
    /// ```
    pub fn resolve_active(records: &[PriceControl]) -> CoreResult<&PriceControl> {
        let mut live = records.iter().filter(|r| r.meta.is_live());

        match (live.next(), live.next()) {
            (Some(active), None) => Ok(active),
            (None, _) => Err(CoreError::Configuration(
                "no active price control record".to_string(),
            )),
            (Some(_), Some(_)) => Err(CoreError::Configuration(format!(
                "{} active price control records, expected exactly one",
                records.iter().filter(|r| r.meta.is_live()).count()
            ))),
        }
    }
}

// =============================================================================
// Part
// =============================================================================

/// A spare part held in stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub meta: EntityMeta,
    pub name: String,
    pub manufacturer: String,
    pub vehicle_type: String,
    /// Model years the part fits, e.g. `2009-2014`.
    pub years: String,
    /// Unit price before markup.
    pub price: Money,
    /// Unique business code.
    pub code: String,
    /// Quantity on hand.
    pub quantity: i64,
    pub low_level_threshold: i64,
}

impl Part {
    /// Creates a part after validating its code, name and price.
    pub fn new(
        code: &str,
        name: &str,
        price: Money,
        quantity: i64,
        low_level_threshold: i64,
    ) -> CoreResult<Self> {
        validate_part_code(code)?;
        validate_name("name", name, 100)?;
        validate_price("price", price)?;
        if quantity < 0 || low_level_threshold < 0 {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }

        Ok(Part {
            meta: EntityMeta::new(),
            name: name.trim().to_string(),
            manufacturer: String::new(),
            vehicle_type: String::new(),
            years: String::new(),
            price,
            code: code.trim().to_string(),
            quantity,
            low_level_threshold,
        })
    }

    /// Returns the price charged to customers under the given price control.
    ///
    /// Computed on every call, so a change of markup applies immediately.
    pub fn marked_up_price(&self, controls: &PriceControl) -> Money {
        self.price.marked_up(controls.markup)
    }

    /// True when stock has fallen to (or below) the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_level_threshold
    }

    /// Adds delivered stock.
    pub fn restock(&mut self, qty: i64) -> CoreResult<i64> {
        validate_quantity(qty)?;
        self.quantity += qty;
        Ok(self.quantity)
    }

    /// Takes stock for a job or a sale.
    pub fn consume(&mut self, qty: i64) -> CoreResult<i64> {
        validate_quantity(qty)?;
        if qty > self.quantity {
            return Err(CoreError::InsufficientStock {
                code: self.code.clone(),
                available: self.quantity,
                requested: qty,
            });
        }
        self.quantity -= qty;
        Ok(self.quantity)
    }

    /// Overwrites the quantity after a stock take.
    pub fn set_quantity(&mut self, qty: i64) -> CoreResult<i64> {
        if qty < 0 {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }
        self.quantity = qty;
        Ok(self.quantity)
    }
}

// =============================================================================
// Task
// =============================================================================

/// A unit of work that can be attached to jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub meta: EntityMeta,
    pub task_number: i64,
    pub description: String,
    /// Planning estimate in seconds. Never used for pricing.
    pub estimated_secs: i64,
}

// =============================================================================
// Catalog
// =============================================================================

/// Parts and tasks indexed by id, as loaded for one pricing or reporting run.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    parts: HashMap<String, Part>,
    tasks: HashMap<String, Task>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from parts alone.
    pub fn from_parts(parts: impl IntoIterator<Item = Part>) -> Self {
        let mut catalog = Catalog::new();
        for part in parts {
            catalog.insert_part(part);
        }
        catalog
    }

    pub fn insert_part(&mut self, part: Part) {
        self.parts.insert(part.meta.id.clone(), part);
    }

    pub fn insert_task(&mut self, task: Task) {
        self.tasks.insert(task.meta.id.clone(), task);
    }

    /// Looks up a part; tombstoned parts still price historical jobs.
    pub fn part(&self, id: &str) -> CoreResult<&Part> {
        self.parts
            .get(id)
            .ok_or_else(|| CoreError::not_found("Part", id))
    }

    pub fn task(&self, id: &str) -> CoreResult<&Task> {
        self.tasks
            .get(id)
            .ok_or_else(|| CoreError::not_found("Task", id))
    }

    /// Iterates over the live parts.
    pub fn live_parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values().filter(|p| p.meta.is_live())
    }

    /// Live parts at or below their reorder threshold, sorted by code.
    pub fn low_stock(&self) -> Vec<&Part> {
        let mut low: Vec<&Part> = self.live_parts().filter(|p| p.is_low_stock()).collect();
        low.sort_by(|a, b| a.code.cmp(&b.code));
        low
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn controls(vat: u32, markup: u32) -> PriceControl {
        PriceControl::new(Percent::from_bps(vat), Percent::from_bps(markup)).unwrap()
    }

    #[test]
    fn test_marked_up_price() {
        let pc = controls(2_000, 1_000);
        let part = Part::new("BRK-01", "Brake pads", Money::from_pence(10_000), 4, 2).unwrap();
        assert_eq!(part.marked_up_price(&pc), Money::from_pence(11_000));
    }

    #[test]
    fn test_marked_up_price_follows_current_markup() {
        let part = Part::new("BRK-01", "Brake pads", Money::from_pence(10_000), 4, 2).unwrap();
        assert_eq!(part.marked_up_price(&controls(2_000, 1_000)).pence(), 11_000);
        assert_eq!(part.marked_up_price(&controls(2_000, 1_250)).pence(), 11_250);
    }

    #[test]
    fn test_resolve_active_requires_exactly_one() {
        assert!(matches!(
            PriceControl::resolve_active(&[]),
            Err(CoreError::Configuration(_))
        ));

        let two = vec![controls(2_000, 1_000), controls(1_750, 1_000)];
        assert!(matches!(
            PriceControl::resolve_active(&two),
            Err(CoreError::Configuration(_))
        ));

        let mut retired = controls(1_750, 1_000);
        retired.meta.deleted_at = Some(Utc::now());
        let records = vec![retired, controls(2_000, 1_000)];
        let active = PriceControl::resolve_active(&records).unwrap();
        assert_eq!(active.vat, Percent::from_bps(2_000));
    }

    #[test]
    fn test_price_control_rejects_rates_over_100() {
        assert!(PriceControl::new(Percent::from_bps(10_001), Percent::zero()).is_err());
    }

    #[test]
    fn test_stock_adjustments() {
        let mut part = Part::new("FLT-9", "Oil filter", Money::from_pence(550), 3, 2).unwrap();
        assert!(!part.is_low_stock());

        assert_eq!(part.consume(1).unwrap(), 2);
        assert!(part.is_low_stock());

        let err = part.consume(5).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { available: 2, requested: 5, .. }));

        assert_eq!(part.restock(10).unwrap(), 12);
        assert_eq!(part.set_quantity(0).unwrap(), 0);
        assert!(part.set_quantity(-1).is_err());
    }

    #[test]
    fn test_catalog_lookup_and_low_stock() {
        let a = Part::new("B-2", "Bulb", Money::from_pence(199), 1, 5).unwrap();
        let b = Part::new("A-1", "Wiper", Money::from_pence(899), 0, 2).unwrap();
        let c = Part::new("C-3", "Tyre", Money::from_pence(6_000), 20, 4).unwrap();
        let a_id = a.meta.id.clone();

        let catalog = Catalog::from_parts(vec![a, b, c]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.part(&a_id).unwrap().code, "B-2");
        assert!(matches!(catalog.part("missing"), Err(CoreError::NotFound { .. })));

        let low: Vec<&str> = catalog.low_stock().iter().map(|p| p.code.as_str()).collect();
        assert_eq!(low, vec!["A-1", "B-2"]);
    }
}
