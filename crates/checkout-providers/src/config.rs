//! # Stripe Configuration
//!
//! Keys for the two Stripe providers, read through a [`SettingsStore`].
//! Each provider has its own key set: `stripe` reads `stripe_api_key`,
//! `stripe-checkout` reads `stripe_checkout_api_key`. An optional
//! `<prefix>_api_base` points the client at a mock server.

use checkout_core::{CheckoutError, CheckoutResult, SettingsStore};
use std::fmt;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const STRIPE_API_VERSION: &str = "2024-12-18.acacia";

/// Stripe API configuration
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_test_... or sk_live_...)
    pub secret_key: String,

    /// Publishable key (pk_test_... or pk_live_...), handed to Stripe.js
    pub publishable_key: Option<String>,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// Sent as the `Stripe-Version` header
    pub api_version: String,
}

impl StripeConfig {
    /// Load `<prefix>_api_key`, `<prefix>_publishable_key` and
    /// `<prefix>_api_base`.
    pub fn from_settings(settings: &dyn SettingsStore, prefix: &str) -> CheckoutResult<Self> {
        let key_name = format!("{}_api_key", prefix);
        let secret_key = settings.require(&key_name)?;

        if !secret_key.starts_with("sk_test_") && !secret_key.starts_with("sk_live_") {
            return Err(CheckoutError::Configuration(format!(
                "Setting '{}' must start with sk_test_ or sk_live_",
                key_name
            )));
        }

        let publishable_name = format!("{}_publishable_key", prefix);
        let publishable_key = non_empty(settings.get(&publishable_name));
        if let Some(key) = &publishable_key {
            if !key.starts_with("pk_test_") && !key.starts_with("pk_live_") {
                return Err(CheckoutError::Configuration(format!(
                    "Setting '{}' must start with pk_test_ or pk_live_",
                    publishable_name
                )));
            }
        }

        let mut config = Self::new(secret_key);
        config.publishable_key = publishable_key;
        if let Some(base) = non_empty(settings.get(&format!("{}_api_base", prefix))) {
            config = config.with_api_base_url(base);
        }
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            publishable_key: None,
            api_base_url: STRIPE_API_BASE.to_string(),
            api_version: STRIPE_API_VERSION.to_string(),
        }
    }

    pub fn is_test_mode(&self) -> bool {
        self.secret_key.starts_with("sk_test_")
    }

    pub fn is_live_mode(&self) -> bool {
        self.secret_key.starts_with("sk_live_")
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    pub fn headers(&self) -> [(&'static str, String); 1] {
        [("Stripe-Version", self.api_version.clone())]
    }
}

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"***")
            .field("publishable_key", &self.publishable_key)
            .field("api_base_url", &self.api_base_url)
            .field("api_version", &self.api_version)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `error.message` and `error.code` from a Stripe error body
pub(crate) fn stripe_error(body: &serde_json::Value) -> Option<(String, Option<String>)> {
    let error = body.get("error")?;
    let message = error.get("message")?.as_str()?.to_string();
    let code = error
        .get("code")
        .or_else(|| error.get("type"))
        .and_then(|c| c.as_str())
        .map(str::to_string);
    Some((message, code))
}
