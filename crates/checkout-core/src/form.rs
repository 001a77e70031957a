//! # Checkout Form
//!
//! The form posted when the customer clicks "order". Field names are flat
//! (`shipping_firstname`, `billing_zip`, ...) so the form can be read
//! straight from `application/x-www-form-urlencoded`. Unknown fields are
//! kept as provider data (a card token, for example).

use crate::cart::{Address, Cart};
use crate::catalog::MemoryCatalog;
use crate::error::{CheckoutError, CheckoutResult, FieldErrors};
use crate::payment_method::PaymentMethod;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

const REQUIRED: &str = "This field is required.";

/// Provider-specific data submitted with the checkout form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentData(BTreeMap<String, String>);

impl PaymentData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        let fields = value
            .as_object()
            .map(|object| {
                object
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Self(fields)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CheckoutForm {
    #[serde(default)]
    #[validate(
        length(min = 1, message = "This field is required."),
        email(message = "Enter a valid email address.")
    )]
    pub email: String,

    #[serde(default)]
    pub shipping_company: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub shipping_firstname: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub shipping_lastname: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub shipping_lines: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub shipping_zip: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub shipping_city: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub shipping_country: String,

    /// Checkbox; any of `1`, `on`, `true` means checked
    #[serde(default)]
    pub billing_differs: String,
    #[serde(default)]
    pub billing_company: String,
    #[serde(default)]
    pub billing_firstname: String,
    #[serde(default)]
    pub billing_lastname: String,
    #[serde(default)]
    pub billing_lines: String,
    #[serde(default)]
    pub billing_zip: String,
    #[serde(default)]
    pub billing_city: String,
    #[serde(default)]
    pub billing_country: String,

    #[serde(default)]
    #[validate(custom(function = "validate_method_id"))]
    pub payment_method_id: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

fn validate_method_id(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(field_error("required", REQUIRED));
    }
    if value.trim().parse::<u32>().is_err() {
        return Err(field_error("invalid", "Choose one of the listed payment methods."));
    }
    Ok(())
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

impl CheckoutForm {
    pub fn billing_differs(&self) -> bool {
        matches!(
            self.billing_differs.trim().to_ascii_lowercase().as_str(),
            "1" | "on" | "true" | "yes"
        )
    }

    /// Run every field rule; returns all failures at once
    pub fn check(&self) -> CheckoutResult<()> {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => FieldErrors::from(e),
        };

        if self.billing_differs() {
            let billing = [
                ("billing_firstname", &self.billing_firstname),
                ("billing_lastname", &self.billing_lastname),
                ("billing_lines", &self.billing_lines),
                ("billing_zip", &self.billing_zip),
                ("billing_city", &self.billing_city),
                ("billing_country", &self.billing_country),
            ];
            for (field, value) in billing {
                if value.trim().is_empty() {
                    errors.add(field, REQUIRED);
                }
            }
        }

        errors.into_result()
    }

    pub fn payment_method_id(&self) -> CheckoutResult<u32> {
        self.payment_method_id.trim().parse().map_err(|_| {
            CheckoutError::invalid("payment_method_id", "Choose one of the listed payment methods.")
        })
    }

    /// The selected method; an unknown id is a validation error on the field
    pub async fn payment_method(&self, catalog: &MemoryCatalog) -> CheckoutResult<PaymentMethod> {
        let id = self.payment_method_id()?;
        catalog.payment_method(id).await.map_err(|err| match err {
            CheckoutError::NotFound { .. } => CheckoutError::invalid(
                "payment_method_id",
                "Choose one of the listed payment methods.",
            ),
            other => other,
        })
    }

    pub fn payment_data(&self) -> PaymentData {
        PaymentData(self.extra.clone())
    }

    /// Copy the customer details onto the cart
    pub fn apply_to(&self, cart: &mut Cart) {
        cart.customer.email = Some(self.email.trim().to_string());
        cart.customer.shipping = Address {
            company: self.shipping_company.clone(),
            firstname: self.shipping_firstname.clone(),
            lastname: self.shipping_lastname.clone(),
            lines: self.shipping_lines.clone(),
            zip: self.shipping_zip.clone(),
            city: self.shipping_city.clone(),
            country: self.shipping_country.clone(),
        };
        cart.customer.billing_differs = self.billing_differs();
        cart.customer.billing = if cart.customer.billing_differs {
            Address {
                company: self.billing_company.clone(),
                firstname: self.billing_firstname.clone(),
                lastname: self.billing_lastname.clone(),
                lines: self.billing_lines.clone(),
                zip: self.billing_zip.clone(),
                city: self.billing_city.clone(),
                country: self.billing_country.clone(),
            }
        } else {
            Address::default()
        };
    }
}
