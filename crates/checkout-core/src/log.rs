//! # Payment Log
//!
//! One immutable audit record per payment attempt.

use crate::cart::Cart;
use crate::error::CheckoutError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a provider answered, reduced to a message and a code.
///
/// Raw provider payloads end up here and in the log, never in anything
/// shown to the customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ProviderResponse {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Keep a JSON body verbatim as the message
    pub fn from_json(value: &serde_json::Value) -> Self {
        Self {
            message: Some(value.to_string()),
            code: None,
        }
    }
}

impl From<&CheckoutError> for ProviderResponse {
    fn from(err: &CheckoutError) -> Self {
        ProviderResponse::new(err.to_string()).with_code(err.status_code().to_string())
    }
}

impl From<CheckoutError> for ProviderResponse {
    fn from(err: CheckoutError) -> Self {
        ProviderResponse::from(&err)
    }
}

/// Audit record of one payment attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLog {
    pub id: Uuid,

    /// Random opaque reference, safe to show to customers and support
    pub reference: String,

    pub failed: bool,

    /// Request data sent to or received from the provider
    pub data: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    pub payment_provider: String,

    /// `"<method name> (ID <id>)"`
    pub payment_method: String,

    pub cart_id: Uuid,

    /// Cart as it was at the time of the attempt
    pub cart_data: serde_json::Value,

    pub session_id: String,

    pub created_at: DateTime<Utc>,
}

impl PaymentLog {
    pub fn new(
        failed: bool,
        provider: impl Into<String>,
        cart: &Cart,
        data: serde_json::Value,
        response: &ProviderResponse,
    ) -> Self {
        let payment_method = cart
            .payment_method
            .as_ref()
            .map(|m| m.log_label())
            .unwrap_or_default();

        Self {
            id: Uuid::new_v4(),
            reference: new_reference(),
            failed,
            data,
            message: response.message.clone(),
            code: response.code.clone(),
            payment_provider: provider.into(),
            payment_method,
            cart_id: cart.id,
            cart_data: cart.snapshot(),
            session_id: cart.session_id.clone(),
            created_at: Utc::now(),
        }
    }

    /// The message decoded as JSON when it is JSON, as a string otherwise
    pub fn message_value(&self) -> serde_json::Value {
        match &self.message {
            None => serde_json::Value::String(String::new()),
            Some(raw) => serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.clone())),
        }
    }
}

/// 16 uppercase alphanumeric characters
fn new_reference() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment_method::PaymentMethod;
    use serde_json::json;

    #[test]
    fn test_log_snapshot() {
        let mut cart = Cart::new("sess");
        cart.set_payment_method(PaymentMethod::new(4, "Invoice", "offline"));

        let log = PaymentLog::new(
            true,
            "offline",
            &cart,
            json!({"token": "x"}),
            &ProviderResponse::new("declined").with_code("card_declined"),
        );

        assert!(log.failed);
        assert_eq!(log.reference.len(), 16);
        assert_eq!(log.payment_method, "Invoice (ID 4)");
        assert_eq!(log.cart_id, cart.id);
        assert_eq!(log.cart_data["session_id"], "sess");
        assert_eq!(log.code.as_deref(), Some("card_declined"));
    }

    #[test]
    fn test_message_value() {
        let cart = Cart::new("sess");
        let json_log = PaymentLog::new(
            false,
            "stripe",
            &cart,
            json!({}),
            &ProviderResponse::from_json(&json!({"id": "ch_1"})),
        );
        assert_eq!(json_log.message_value()["id"], "ch_1");

        let text_log = PaymentLog::new(false, "stripe", &cart, json!({}), &ProviderResponse::new("ok"));
        assert_eq!(text_log.message_value(), json!("ok"));
    }

    #[test]
    fn test_response_from_error() {
        let response = ProviderResponse::from(CheckoutError::Network("timed out".into()));
        assert_eq!(response.message.as_deref(), Some("Network error: timed out"));
        assert_eq!(response.code.as_deref(), Some("503"));
    }
}
