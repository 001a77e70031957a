//! # Cart
//!
//! The cart owns its items and the customer's checkout details. All methods
//! here are in-memory mutations; persisting the cart is the caller's job
//! (see [`crate::store::CartRepository`]).

use crate::currency::Currency;
use crate::error::{CheckoutError, CheckoutResult};
use crate::item::{CartItem, ItemKind};
use crate::payment_method::PaymentMethod;
use crate::state::PaymentState;
use crate::tax::Tax;
use crate::totals::Totals;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A postal address as entered at checkout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    /// Street lines, newline separated
    #[serde(default)]
    pub lines: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

impl Address {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
            .trim()
            .to_string()
    }

    /// Non-empty address parts, top to bottom
    pub fn lines_for_display(&self, reverse_zip: bool) -> Vec<String> {
        let locality = if reverse_zip {
            format!("{} {}", self.city, self.zip)
        } else {
            format!("{} {}", self.zip, self.city)
        };
        [
            self.company.clone(),
            self.full_name(),
            self.lines.clone(),
            locality.trim().to_string(),
            self.country.clone(),
        ]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect()
    }

    /// Street lines split on newlines
    pub fn street_lines(&self) -> Vec<&str> {
        self.lines.lines().collect()
    }
}

/// Contact and address details collected at checkout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub shipping: Address,
    #[serde(default)]
    pub billing: Address,
    #[serde(default)]
    pub billing_differs: bool,
}

impl Customer {
    /// Billing address if it differs, the shipping address otherwise
    pub fn billing_address(&self) -> &Address {
        if self.billing_differs {
            &self.billing
        } else {
            &self.shipping
        }
    }

    /// Billing name with a fallback to the shipping name
    pub fn display_name(&self) -> String {
        let first = non_empty_or(&self.billing.firstname, &self.shipping.firstname);
        let last = non_empty_or(&self.billing.lastname, &self.shipping.lastname);
        format!("{} {}", first, last).trim().to_string()
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// A shopping cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,

    /// Anonymous session the cart belongs to
    pub session_id: String,

    /// Kept ordered by kind, then sort order
    #[serde(default)]
    pub items: Vec<CartItem>,

    /// Set once, never changed afterwards
    #[serde(default)]
    currency: Option<Currency>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_state: Option<PaymentState>,

    /// Id of the latest payment log written for this cart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<Uuid>,

    #[serde(default)]
    pub customer: Customer,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Create an empty cart for a session
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            items: Vec::new(),
            currency: None,
            payment_method: None,
            payment_state: None,
            payment_id: None,
            customer: Customer::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn currency(&self) -> Option<Currency> {
        self.currency
    }

    /// Set the cart currency. Changing it once set is a configuration error.
    pub fn set_currency(&mut self, currency: Currency) -> CheckoutResult<()> {
        match self.currency {
            Some(existing) if existing != currency => Err(CheckoutError::Configuration(format!(
                "Cart {} is already priced in {}, refusing to switch to {}",
                self.id, existing, currency
            ))),
            _ => {
                self.currency = Some(currency);
                Ok(())
            }
        }
    }

    /// Builder: set currency on a fresh cart
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    /// Currency, or a configuration error if none was ever set
    pub fn require_currency(&self) -> CheckoutResult<Currency> {
        self.currency.ok_or_else(|| {
            CheckoutError::Configuration(
                "Set a default currency before using the cart".to_string(),
            )
        })
    }

    pub fn set_payment_method(&mut self, method: PaymentMethod) {
        self.payment_method = Some(method);
        self.touch();
    }

    /// A cart with a payment state no longer accepts item changes
    pub fn is_closed(&self) -> bool {
        self.payment_state.is_some()
    }

    /// Add an item. `quantity` is applied only if the item has none yet.
    pub fn add(&mut self, item: CartItem, quantity: u32) -> Uuid {
        self.add_with_default_tax(item, quantity, None)
    }

    /// Add an item, attaching `default_tax` when the item is taxable but
    /// carries no taxes of its own.
    pub fn add_with_default_tax(
        &mut self,
        mut item: CartItem,
        quantity: u32,
        default_tax: Option<&Tax>,
    ) -> Uuid {
        if item.quantity.is_none() {
            item.quantity = Some(quantity);
        }
        if !item.is_tax_free && item.taxes.is_empty() {
            if let Some(tax) = default_tax {
                item.taxes.push(tax.clone());
            }
        }
        let id = item.id;
        self.items.push(item);
        self.sort_items();
        self.touch();
        id
    }

    /// Add several items with a quantity of 1 (unless they carry one)
    pub fn add_many(&mut self, items: impl IntoIterator<Item = CartItem>, default_tax: Option<&Tax>) {
        for item in items {
            self.add_with_default_tax(item, 1, default_tax);
        }
    }

    /// Make sure an item with the given code is in the cart exactly once.
    ///
    /// An existing line is updated in place (its quantity is kept unless
    /// `quantity` is given), otherwise the item is added.
    pub fn ensure(&mut self, item: CartItem, quantity: Option<u32>) -> CheckoutResult<Uuid> {
        let code = item.code.clone().ok_or_else(|| {
            CheckoutError::invalid("code", "Only cart items with a code can be ensured")
        })?;

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.code.as_deref() == Some(code.as_str()))
        {
            existing.name = item.name;
            existing.description = item.description;
            existing.kind = item.kind;
            existing.price = item.price;
            existing.is_before_tax = item.is_before_tax;
            existing.is_tax_free = item.is_tax_free;
            existing.taxes = item.taxes;
            existing.sort_order = item.sort_order;
            existing.meta = item.meta;
            if let Some(q) = quantity {
                existing.quantity = Some(q);
            }
            let id = existing.id;
            self.sort_items();
            self.touch();
            return Ok(id);
        }

        Ok(self.add(item, quantity.unwrap_or(1)))
    }

    /// Remove an item by id
    pub fn remove(&mut self, item_id: Uuid) -> CheckoutResult<CartItem> {
        let index = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| CheckoutError::not_found("cart item", item_id))?;
        self.touch();
        Ok(self.items.remove(index))
    }

    /// Remove every item with the given code; returns how many were removed
    pub fn remove_by_code(&mut self, code: &str) -> usize {
        let before = self.items.len();
        self.items.retain(|i| i.code.as_deref() != Some(code));
        let removed = before - self.items.len();
        if removed > 0 {
            self.touch();
        }
        removed
    }

    pub fn set_quantity(&mut self, item_id: Uuid, quantity: u32) -> CheckoutResult<()> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| CheckoutError::not_found("cart item", item_id))?;
        item.quantity = Some(quantity);
        self.touch();
        Ok(())
    }

    pub fn item(&self, item_id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn items_of_kind(&self, kind: ItemKind) -> impl Iterator<Item = &CartItem> {
        self.items.iter().filter(move |i| i.kind == kind)
    }

    pub fn list_items(&self) -> impl Iterator<Item = &CartItem> {
        self.items_of_kind(ItemKind::Item)
    }

    pub fn discounts(&self) -> impl Iterator<Item = &CartItem> {
        self.items_of_kind(ItemKind::Discount)
    }

    pub fn service_fees(&self) -> impl Iterator<Item = &CartItem> {
        self.items_of_kind(ItemKind::Service)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Freshly computed totals; nothing is cached
    pub fn totals(&self) -> Totals {
        Totals::compute(self)
    }

    pub fn shipping_address_lines(&self, reverse_zip: bool) -> Vec<String> {
        self.customer.shipping.lines_for_display(reverse_zip)
    }

    pub fn billing_address_lines(&self, reverse_zip: bool) -> Vec<String> {
        self.customer.billing.lines_for_display(reverse_zip)
    }

    /// JSON snapshot stored on payment logs
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn sort_items(&mut self) {
        self.items.sort_by_key(CartItem::order_key);
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
