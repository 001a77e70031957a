//! # Cart Items
//!
//! A line in the cart. Monetary values derived from price, quantity and
//! taxes (`subtotal`, `tax_amount`, `total`) are computed on every call and
//! never stored, so they cannot drift from their inputs.

use crate::currency::round_minor;
use crate::tax::{total_percentage, Tax};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a line represents. Declaration order is the display order:
/// items, then discounts, then service fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Item,
    Discount,
    Service,
}

impl Default for ItemKind {
    fn default() -> Self {
        ItemKind::Item
    }
}

/// A line item in a cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Stable code used by `Cart::ensure` to find an existing line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub kind: ItemKind,

    /// Unit price in the smallest currency unit (may be negative for discounts)
    pub price: i64,

    /// `None` until the item is added to a cart
    #[serde(default)]
    pub quantity: Option<u32>,

    /// Taxes are added on top of the price
    #[serde(default)]
    pub is_before_tax: bool,

    #[serde(default)]
    pub is_tax_free: bool,

    #[serde(default)]
    pub taxes: Vec<Tax>,

    #[serde(default)]
    pub sort_order: i32,

    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl CartItem {
    /// Create a regular item; `price` is in minor units
    pub fn new(name: impl Into<String>, price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            code: None,
            description: None,
            kind: ItemKind::Item,
            price,
            quantity: None,
            is_before_tax: false,
            is_tax_free: false,
            taxes: Vec::new(),
            sort_order: 0,
            meta: serde_json::Value::Null,
        }
    }

    /// Create a tax-free discount line
    pub fn discount(name: impl Into<String>, price: i64) -> Self {
        Self::new(name, price).with_kind(ItemKind::Discount).tax_free()
    }

    /// Create a service fee line (shipping, handling, ...)
    pub fn service(name: impl Into<String>, price: i64) -> Self {
        Self::new(name, price).with_kind(ItemKind::Service)
    }

    pub fn with_kind(mut self, kind: ItemKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_tax(mut self, tax: Tax) -> Self {
        self.taxes.push(tax);
        self
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }

    /// Taxes are added on top of the price instead of being included in it
    pub fn before_tax(mut self) -> Self {
        self.is_before_tax = true;
        self
    }

    pub fn tax_free(mut self) -> Self {
        self.is_tax_free = true;
        self
    }

    pub fn quantity(&self) -> u32 {
        self.quantity.unwrap_or(0)
    }

    /// Sum of attached tax percentages as a factor; 0 for tax-free items
    pub fn tax_factor(&self) -> f64 {
        if self.is_tax_free {
            return 0.0;
        }
        total_percentage(&self.taxes) / 100.0
    }

    /// `quantity × price`
    pub fn subtotal(&self) -> i64 {
        self.quantity() as i64 * self.price
    }

    /// Tax part of this line, rounded once
    pub fn tax_amount(&self) -> i64 {
        let subtotal = self.subtotal() as f64;
        let factor = self.tax_factor();
        let tax = if self.is_before_tax {
            subtotal * factor
        } else {
            subtotal / (1.0 + factor) * factor
        };
        round_minor(tax)
    }

    /// Amount the customer pays for this line
    pub fn total(&self) -> i64 {
        if self.is_before_tax {
            self.subtotal() + self.tax_amount()
        } else {
            self.subtotal()
        }
    }

    /// Sort key inside a cart
    pub(crate) fn order_key(&self) -> (ItemKind, i32) {
        (self.kind, self.sort_order)
    }
}
