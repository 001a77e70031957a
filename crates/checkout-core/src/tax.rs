//! # Taxes

use crate::error::{CheckoutError, CheckoutResult};
use serde::{Deserialize, Serialize};

/// A tax rate that can be attached to cart items and payment methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    pub id: u32,
    pub name: String,
    /// Percentage in the range 0..=100
    pub percentage: f64,
    #[serde(default)]
    pub is_default: bool,
}

impl Tax {
    /// Create a tax, rejecting percentages outside 0..=100
    pub fn new(id: u32, name: impl Into<String>, percentage: f64) -> CheckoutResult<Self> {
        let tax = Self {
            id,
            name: name.into(),
            percentage,
            is_default: false,
        };
        tax.validate()?;
        Ok(tax)
    }

    /// Builder: flag as default
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn validate(&self) -> CheckoutResult<()> {
        if self.name.trim().is_empty() {
            return Err(CheckoutError::invalid("name", "The name field is required."));
        }
        if !(0.0..=100.0).contains(&self.percentage) {
            return Err(CheckoutError::invalid(
                "percentage",
                "The percentage must be between 0 and 100.",
            ));
        }
        Ok(())
    }

    /// Percentage as a factor (10% -> 0.1)
    pub fn decimal(&self) -> f64 {
        self.percentage / 100.0
    }
}

/// Sum of the percentages of a tax set
pub fn total_percentage(taxes: &[Tax]) -> f64 {
    taxes.iter().map(|t| t.percentage).sum()
}
