//! # Payment Methods
//!
//! A payment method is what the customer picks at checkout. It points to a
//! registered payment provider and carries the fee the shop passes on.

use crate::error::{CheckoutError, CheckoutResult};
use crate::tax::{total_percentage, Tax};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: u32,
    pub name: String,

    /// Slug of the name, used by templates
    #[serde(default)]
    pub code: String,

    /// Flat fee in the smallest currency unit
    #[serde(default)]
    pub price: i64,

    /// Percentage fee the provider deducts (2.9 = 2.9%)
    #[serde(default)]
    pub percentage: f64,

    #[serde(default)]
    pub taxes: Vec<Tax>,

    /// Identifier of the payment provider handling this method
    pub payment_provider: String,

    #[serde(default)]
    pub is_default: bool,
}

impl PaymentMethod {
    pub fn new(id: u32, name: impl Into<String>, payment_provider: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            code: slugify(&name),
            name,
            price: 0,
            percentage: 0.0,
            taxes: Vec::new(),
            payment_provider: payment_provider.into(),
            is_default: false,
        }
    }

    /// Builder: flat fee in minor units
    pub fn with_price(mut self, price: i64) -> Self {
        self.price = price;
        self
    }

    /// Builder: percentage fee
    pub fn with_percentage(mut self, percentage: f64) -> Self {
        self.percentage = percentage;
        self
    }

    pub fn with_tax(mut self, tax: Tax) -> Self {
        self.taxes.push(tax);
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn tax_percentage(&self) -> f64 {
        total_percentage(&self.taxes)
    }

    /// Label stored on payment logs
    pub fn log_label(&self) -> String {
        format!("{} (ID {})", self.name, self.id)
    }

    pub fn validate(&self) -> CheckoutResult<()> {
        let mut errors = crate::error::FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "The name field is required.");
        }
        if self.payment_provider.trim().is_empty() {
            errors.add("payment_provider", "The payment provider field is required.");
        }
        if !(0.0..100.0).contains(&self.percentage) {
            errors.add("percentage", "The percentage must be at least 0 and below 100.");
        }
        errors.into_result()
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Look up a method by id
pub fn find_method(methods: &[PaymentMethod], id: u32) -> CheckoutResult<&PaymentMethod> {
    methods
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| CheckoutError::not_found("payment method", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_builder() {
        let method = PaymentMethod::new(3, "Credit Card (Stripe)", "stripe")
            .with_price(30)
            .with_percentage(2.9)
            .with_tax(Tax::new(1, "10%", 10.0).unwrap());

        assert_eq!(method.code, "credit-card-stripe");
        assert_eq!(method.tax_percentage(), 10.0);
        assert_eq!(method.log_label(), "Credit Card (Stripe) (ID 3)");
        assert!(method.validate().is_ok());
    }

    #[test]
    fn test_method_validation() {
        let method = PaymentMethod::new(1, "", "").with_percentage(100.0);
        let err = method.validate().unwrap_err();
        match err {
            CheckoutError::Validation(fields) => {
                assert_eq!(
                    fields.fields().collect::<Vec<_>>(),
                    vec!["name", "payment_provider", "percentage"]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_find_method() {
        let methods = vec![PaymentMethod::new(1, "Invoice", "offline")];
        assert!(find_method(&methods, 1).is_ok());
        assert!(matches!(
            find_method(&methods, 2),
            Err(CheckoutError::NotFound { .. })
        ));
    }
}
