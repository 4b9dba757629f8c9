//! Vehicles and MOT renewal reminders.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::types::{EntityMeta, VehicleType};
use crate::validation::validate_reg_number;

/// A customer's vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub meta: EntityMeta,
    /// Registration number, unique across the garage.
    pub reg_number: String,
    pub make: String,
    pub model: String,
    pub engine_serial: String,
    pub chassis_number: String,
    pub colour: String,
    pub vehicle_type: VehicleType,
    /// Date the MOT cycle is counted from.
    pub mot_base_date: Option<NaiveDate>,
    pub customer_id: String,
}

impl Vehicle {
    pub fn new(
        reg_number: &str,
        make: &str,
        model: &str,
        vehicle_type: VehicleType,
        customer_id: &str,
    ) -> CoreResult<Self> {
        validate_reg_number(reg_number)?;

        Ok(Vehicle {
            meta: EntityMeta::new(),
            reg_number: reg_number.trim().to_uppercase(),
            make: make.trim().to_string(),
            model: model.trim().to_string(),
            engine_serial: String::new(),
            chassis_number: String::new(),
            colour: String::new(),
            vehicle_type,
            mot_base_date: None,
            customer_id: customer_id.to_string(),
        })
    }

    /// `MAKE MODEL (REG)`, as printed on invoices.
    pub fn description(&self) -> String {
        format!("{} {} ({})", self.make, self.model, self.reg_number)
    }
}

/// A reminder sent to the owner that the vehicle's MOT is due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotReminder {
    pub meta: EntityMeta,
    pub vehicle_id: String,
    pub issue_date: NaiveDate,
    pub renewal_test_date: NaiveDate,
}

impl MotReminder {
    pub fn new(vehicle_id: &str, issue_date: NaiveDate, renewal_test_date: NaiveDate) -> Self {
        MotReminder {
            meta: EntityMeta::new(),
            vehicle_id: vehicle_id.to_string(),
            issue_date,
            renewal_test_date,
        }
    }

    /// Days between issuing the reminder and the renewal test. Negative when
    /// the reminder went out late.
    pub fn days_remaining(&self) -> i64 {
        (self.renewal_test_date - self.issue_date).num_days()
    }
}
