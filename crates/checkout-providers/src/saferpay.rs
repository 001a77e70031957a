//! # SIX Saferpay
//!
//! Saferpay Payment Page, JSON API. `process` initializes a payment page
//! and redirects the customer to it. After the customer returns, `complete`
//! asserts the payment with the token Saferpay handed out on initialize.

use crate::http::{ApiError, HttpClient};
use async_trait::async_trait;
use checkout_core::{
    Address, CheckoutError, CheckoutResult, OffSiteProvider, PaymentContext, PaymentProvider,
    PaymentResult, ProviderResponse, SettingField, SettingsStore,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub const SAFERPAY_API_BASE: &str = "https://www.saferpay.com/api";
pub const SPEC_VERSION: &str = "1.10";

/// Session key holding the payment page token between redirect and return
pub const TOKEN_KEY: &str = "saferpay.token";

#[derive(Clone)]
struct SaferpayConfig {
    customer_id: String,
    terminal_id: String,
    api_key: String,
    api_secret: String,
    api_base_url: String,
}

impl fmt::Debug for SaferpayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaferpayConfig")
            .field("customer_id", &self.customer_id)
            .field("terminal_id", &self.terminal_id)
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl SaferpayConfig {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    fn request_header(&self) -> RequestHeader {
        RequestHeader {
            spec_version: SPEC_VERSION,
            customer_id: self.customer_id.clone(),
            request_id: Uuid::new_v4().simple().to_string(),
            retry_indicator: 0,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RequestHeader {
    spec_version: &'static str,
    customer_id: String,
    request_id: String,
    retry_indicator: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitializeRequest {
    request_header: RequestHeader,
    terminal_id: String,
    payment: Payment,
    payer: Payer,
    return_urls: ReturnUrls,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Payment {
    amount: Amount,
    order_id: String,
    description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Amount {
    /// Minor units, as a string
    value: String,
    currency_code: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Payer {
    language_code: &'static str,
    delivery_address: PayerAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    billing_address: Option<PayerAddress>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PayerAddress {
    first_name: String,
    last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    company: Option<String>,
    street: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    street2: Option<String>,
    zip: String,
    city: String,
    country_code: String,
}

impl From<&Address> for PayerAddress {
    fn from(address: &Address) -> Self {
        let street = address.street_lines();
        let company = address.company.trim();
        Self {
            first_name: address.firstname.clone(),
            last_name: address.lastname.clone(),
            company: (!company.is_empty()).then(|| company.to_string()),
            street: street.first().copied().unwrap_or_default().to_string(),
            street2: street.get(1..).filter(|rest| !rest.is_empty()).map(|rest| rest.join(", ")),
            zip: address.zip.clone(),
            city: address.city.clone(),
            country_code: address.country.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReturnUrls {
    success: String,
    fail: String,
    abort: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssertRequest {
    request_header: RequestHeader,
    token: String,
}

/// `ErrorMessage` and `ErrorName` from a Saferpay error body
fn saferpay_error(body: &serde_json::Value) -> Option<(String, Option<String>)> {
    let message = body.get("ErrorMessage")?.as_str()?.to_string();
    let name = body.get("ErrorName").and_then(|n| n.as_str()).map(str::to_string);
    Some((message, name))
}

/// Log data for a failed call: name, message and details when Saferpay sent them
fn error_data(err: &ApiError) -> serde_json::Value {
    let body = err.body();
    if body.get("ErrorName").is_none() {
        return body;
    }
    json!({
        "name": body["ErrorName"],
        "msg": body["ErrorMessage"],
        "detail": body.get("ErrorDetail").cloned().unwrap_or_else(|| json!([])),
    })
}

#[derive(Debug, Clone, Default)]
pub struct SixSaferpay {
    http: HttpClient,
    config: Option<SaferpayConfig>,
}

impl SixSaferpay {
    pub fn new(http: HttpClient) -> Self {
        Self { http, config: None }
    }

    fn config(&self) -> CheckoutResult<&SaferpayConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| CheckoutError::Logic("Saferpay provider is not initialized".into()))
    }

    fn initialize_request(
        &self,
        config: &SaferpayConfig,
        ctx: &PaymentContext,
    ) -> CheckoutResult<InitializeRequest> {
        let currency = ctx.cart.require_currency()?;
        let customer = &ctx.cart.customer;

        Ok(InitializeRequest {
            request_header: config.request_header(),
            terminal_id: config.terminal_id.clone(),
            payment: Payment {
                amount: Amount {
                    value: ctx.amount().to_string(),
                    currency_code: currency.code(),
                },
                order_id: ctx.cart.id.to_string(),
                description: format!("Order {}", ctx.cart.id),
            },
            payer: Payer {
                language_code: "en",
                delivery_address: PayerAddress::from(&customer.shipping),
                billing_address: customer
                    .billing_differs
                    .then(|| PayerAddress::from(&customer.billing)),
            },
            return_urls: ReturnUrls {
                success: ctx.urls.return_url(),
                fail: ctx.urls.fail_url(),
                abort: ctx.urls.cancel_url(),
            },
        })
    }
}

#[async_trait]
impl PaymentProvider for SixSaferpay {
    fn identifier(&self) -> &'static str {
        "six-saferpay"
    }

    fn name(&self) -> &'static str {
        "SIX SaferPay"
    }

    fn settings(&self) -> Vec<SettingField> {
        vec![
            SettingField::text("six_customer_id", "Customer ID"),
            SettingField::text("six_terminal_id", "Terminal ID"),
            SettingField::text("six_api_key", "API Username"),
            SettingField::password("six_api_secret", "API Password"),
        ]
    }

    fn encrypted_settings(&self) -> Vec<&'static str> {
        vec!["six_api_secret"]
    }

    fn init(&mut self, settings: &dyn SettingsStore) -> CheckoutResult<()> {
        let api_base_url = settings
            .get("six_api_base")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| SAFERPAY_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        self.config = Some(SaferpayConfig {
            customer_id: settings.require("six_customer_id")?,
            terminal_id: settings.require("six_terminal_id")?,
            api_key: settings.require("six_api_key")?,
            api_secret: settings.require("six_api_secret")?,
            api_base_url,
        });
        Ok(())
    }

    #[instrument(skip(self, ctx, result), fields(cart_id = %ctx.cart.id, amount = ctx.amount()))]
    async fn process(&self, ctx: &PaymentContext, result: PaymentResult) -> PaymentResult {
        let prepared = self
            .config()
            .and_then(|config| self.initialize_request(config, ctx).map(|req| (config, req)));
        let (config, request) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                let response = ProviderResponse::from(&e);
                return result.fail(ctx.cart.snapshot(), response).await;
            }
        };

        let response = match self
            .http
            .post_json(
                &config.url("/Payment/v1/PaymentPage/Initialize"),
                &config.api_key,
                &config.api_secret,
                &request,
                saferpay_error,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => return result.fail(error_data(&e), ProviderResponse::from(&e)).await,
        };

        let (Some(token), Some(url)) = (
            response["Token"].as_str(),
            response["RedirectUrl"].as_str(),
        ) else {
            warn!("Saferpay initialize answered without token or redirect URL");
            let response_msg = ProviderResponse::new("Saferpay did not return a payment page");
            return result.fail(response, response_msg).await;
        };

        debug!("Saferpay payment page initialized");
        ctx.session.put_provider_value(TOKEN_KEY, token);
        ctx.session.set_callback(self.identifier());

        result.redirect(url)
    }

    fn off_site(&self) -> Option<&dyn OffSiteProvider> {
        Some(self)
    }
}

#[async_trait]
impl OffSiteProvider for SixSaferpay {
    #[instrument(skip(self, ctx, result), fields(cart_id = %ctx.cart.id))]
    async fn complete(&self, ctx: &PaymentContext, result: PaymentResult) -> PaymentResult {
        let config = match self.config() {
            Ok(config) => config,
            Err(e) => return result.fail(ctx.cart.snapshot(), ProviderResponse::from(&e)).await,
        };
        let Some(token) = ctx.session.pull_provider_value(TOKEN_KEY) else {
            let e = CheckoutError::Logic("No Saferpay token to assert".into());
            return result.fail(ctx.cart.snapshot(), ProviderResponse::from(&e)).await;
        };

        let request = AssertRequest {
            request_header: config.request_header(),
            token,
        };

        let response = match self
            .http
            .post_json(
                &config.url("/Payment/v1/PaymentPage/Assert"),
                &config.api_key,
                &config.api_secret,
                &request,
                saferpay_error,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => return result.fail(error_data(&e), ProviderResponse::from(&e)).await,
        };

        let transaction_id = response["Transaction"]["Id"].as_str().map(str::to_string);
        match transaction_id {
            Some(id) => {
                let status = response["Transaction"]["Status"].as_str().unwrap_or("UNKNOWN");
                info!(transaction_id = %id, status, "Saferpay payment asserted");
                let provider_response = ProviderResponse::new(id.clone()).with_code(status);
                result.success(json!({ "id": id }), provider_response).await
            }
            None => {
                warn!("Saferpay assert answered without a transaction");
                let provider_response = ProviderResponse::new("Saferpay returned no transaction");
                result.fail(response, provider_response).await
            }
        }
    }
}
