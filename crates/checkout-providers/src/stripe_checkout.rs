//! # Stripe Checkout
//!
//! Hosted payment page. `process` creates a Checkout Session and redirects
//! the customer to it; `complete` runs when the customer comes back and
//! retrieves the session to see whether it was paid.
//!
//! The cart is sent as a single line item for the amount due, so fees and
//! discounts computed here are exactly what Stripe charges.

use crate::config::{stripe_error, StripeConfig};
use crate::http::{ApiError, HttpClient};
use async_trait::async_trait;
use checkout_core::{
    format_money, Cart, CheckoutError, CheckoutResult, Currency, OffSiteProvider, PaymentContext,
    PaymentProvider, PaymentResult, ProviderResponse, SettingField, SettingsStore,
};
use tracing::{debug, info, instrument, warn};

/// Session key holding the Checkout Session id between redirect and return
pub const SESSION_ID_KEY: &str = "stripe_checkout.session_id";

#[derive(Debug, Clone, Default)]
pub struct StripeCheckout {
    http: HttpClient,
    config: Option<StripeConfig>,
}

impl StripeCheckout {
    pub fn new(http: HttpClient) -> Self {
        Self { http, config: None }
    }

    /// Builder: skip [`PaymentProvider::init`] (for testing)
    pub fn with_config(mut self, config: StripeConfig) -> Self {
        self.config = Some(config);
        self
    }

    fn config(&self) -> CheckoutResult<&StripeConfig> {
        self.config.as_ref().ok_or_else(|| {
            CheckoutError::Logic("Stripe Checkout provider is not initialized".into())
        })
    }

    fn session_params(
        &self,
        ctx: &PaymentContext,
        currency: Currency,
    ) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), ctx.urls.return_url()),
            ("cancel_url".to_string(), ctx.urls.cancel_url()),
            ("client_reference_id".to_string(), ctx.cart.id.to_string()),
            ("metadata[cart_id]".to_string(), ctx.cart.id.to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                currency.as_lower(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                ctx.amount().to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                format!("Cart {}", ctx.cart.id),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
        ];

        let summary = item_summary(&ctx.cart, currency);
        if !summary.is_empty() {
            params.push((
                "line_items[0][price_data][product_data][description]".to_string(),
                summary,
            ));
        }
        if let Some(email) = &ctx.cart.customer.email {
            params.push(("customer_email".to_string(), email.clone()));
        }
        params
    }
}

/// "2 x Book (50.00 EUR), 1 x Pen (3.00 EUR)"
fn item_summary(cart: &Cart, currency: Currency) -> String {
    cart.list_items()
        .map(|item| {
            format!(
                "{} x {} ({})",
                item.quantity(),
                item.name,
                format_money(item.total(), currency)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl PaymentProvider for StripeCheckout {
    fn identifier(&self) -> &'static str {
        "stripe-checkout"
    }

    fn name(&self) -> &'static str {
        "Stripe Checkout"
    }

    fn settings(&self) -> Vec<SettingField> {
        vec![
            SettingField::password("stripe_checkout_api_key", "Stripe Checkout API Key")
                .with_comment("Secret key, sk_test_... or sk_live_..."),
            SettingField::text("stripe_checkout_publishable_key", "Stripe Checkout Publishable Key"),
        ]
    }

    fn encrypted_settings(&self) -> Vec<&'static str> {
        vec!["stripe_checkout_api_key"]
    }

    fn init(&mut self, settings: &dyn SettingsStore) -> CheckoutResult<()> {
        self.config = Some(StripeConfig::from_settings(settings, "stripe_checkout")?);
        Ok(())
    }

    #[instrument(skip(self, ctx, result), fields(cart_id = %ctx.cart.id, amount = ctx.amount()))]
    async fn process(&self, ctx: &PaymentContext, result: PaymentResult) -> PaymentResult {
        let prepared = self
            .config()
            .and_then(|config| ctx.cart.require_currency().map(|c| (config, c)));
        let (config, currency) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                let response = ProviderResponse::from(&e);
                return result.fail(ctx.cart.snapshot(), response).await;
            }
        };

        let session = match self
            .http
            .post_form(
                &config.url("/v1/checkout/sessions"),
                &config.secret_key,
                &[
                    ("Stripe-Version", config.api_version.clone()),
                    ("Idempotency-Key", ctx.urls.token().to_string()),
                ],
                &self.session_params(ctx, currency),
                stripe_error,
            )
            .await
        {
            Ok(session) => session,
            Err(e) => return result.fail(e.body(), ProviderResponse::from(&e)).await,
        };

        let (Some(session_id), Some(url)) = (session["id"].as_str(), session["url"].as_str())
        else {
            warn!("Checkout Session without id or url");
            let response = ProviderResponse::new("Stripe did not return a checkout URL");
            return result.fail(session, response).await;
        };

        debug!(session_id, "Checkout Session created");
        ctx.session.put_provider_value(SESSION_ID_KEY, session_id);
        ctx.session.set_callback(self.identifier());

        result.redirect(url)
    }

    fn off_site(&self) -> Option<&dyn OffSiteProvider> {
        Some(self)
    }
}

#[async_trait]
impl OffSiteProvider for StripeCheckout {
    #[instrument(skip(self, ctx, result), fields(cart_id = %ctx.cart.id))]
    async fn complete(&self, ctx: &PaymentContext, result: PaymentResult) -> PaymentResult {
        let config = match self.config() {
            Ok(config) => config,
            Err(e) => return result.fail(ctx.cart.snapshot(), ProviderResponse::from(&e)).await,
        };
        let Some(session_id) = ctx.session.pull_provider_value(SESSION_ID_KEY) else {
            let e = CheckoutError::Logic("No Checkout Session to complete".into());
            return result.fail(ctx.cart.snapshot(), ProviderResponse::from(&e)).await;
        };

        let session = match self
            .http
            .get(
                &config.url(&format!("/v1/checkout/sessions/{}", session_id)),
                &config.secret_key,
                &config.headers(),
                stripe_error,
            )
            .await
        {
            Ok(session) => session,
            Err(e) => return result.fail(e.body(), ProviderResponse::from(&e)).await,
        };

        let cart_id = ctx.cart.id.to_string();
        if session["client_reference_id"].as_str() != Some(cart_id.as_str()) {
            warn!(session_id = %session_id, "Checkout Session belongs to another cart");
            let e = ApiError::Decode("Checkout Session does not match the cart".into());
            return result.fail(session, ProviderResponse::from(&e)).await;
        }

        let status = session["payment_status"].as_str().unwrap_or("unknown").to_string();
        if status == "paid" {
            info!(session_id = %session_id, "Checkout Session paid");
            result
                .success(session, ProviderResponse::new(session_id).with_code(status))
                .await
        } else {
            warn!(session_id = %session_id, status = %status, "Checkout Session not paid");
            let response = ProviderResponse::new("The checkout session was not paid").with_code(status);
            result.fail(session, response).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;
    use checkout_core::{CartRepository, MemorySettings, PaymentState};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> StripeCheckout {
        StripeCheckout::default()
            .with_config(StripeConfig::new("sk_test_abc").with_api_base_url(server.uri()))
    }

    #[test]
    fn test_identity() {
        let provider = StripeCheckout::default();
        assert_eq!(provider.identifier(), "stripe-checkout");
        assert!(provider.off_site().is_some());
        assert_eq!(provider.encrypted_settings(), vec!["stripe_checkout_api_key"]);
    }

    #[test]
    fn test_init_uses_own_key_set() {
        let mut provider = StripeCheckout::default();
        let settings = MemorySettings::new().with("stripe_api_key", "sk_test_direct");
        assert!(provider.init(&settings).is_err());

        let settings = settings.with("stripe_checkout_api_key", "sk_test_hosted");
        provider.init(&settings).unwrap();
        assert_eq!(provider.config().unwrap().secret_key, "sk_test_hosted");
    }

    #[test]
    fn test_item_summary() {
        let f = fixture("stripe-checkout");
        assert_eq!(item_summary(&f.ctx.cart, Currency::EUR), "2 x Book (50.00 EUR)");
    }

    #[tokio::test]
    async fn test_process_redirects_to_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(body_string_contains("mode=payment"))
            .and(body_string_contains("unit_amount%5D=5000"))
            .and(body_string_contains("customer_email=ada%40example.com"))
            .and(body_string_contains("return%3Dreturn"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let f = fixture("stripe-checkout");
        let result = provider(&server).process(&f.ctx, f.result("stripe-checkout")).await;

        assert!(result.needs_redirect());
        assert_eq!(
            result.redirect_url(),
            Some("https://checkout.stripe.com/c/pay/cs_test_1")
        );
        assert_eq!(f.session.pull_callback().as_deref(), Some("stripe-checkout"));
        assert_eq!(
            f.session.pull_provider_value(SESSION_ID_KEY).as_deref(),
            Some("cs_test_1")
        );
    }

    #[tokio::test]
    async fn test_missing_url_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cs_test_1"})))
            .mount(&server)
            .await;

        let f = fixture("stripe-checkout");
        let result = provider(&server).process(&f.ctx, f.result("stripe-checkout")).await;

        assert!(!result.needs_redirect());
        assert!(!result.is_successful());
        assert!(f.session.pull_callback().is_none());
        assert_eq!(f.logs.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_paid_session() {
        let server = MockServer::start().await;
        let f = fixture("stripe-checkout");
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "payment_status": "paid",
                "client_reference_id": f.ctx.cart.id.to_string(),
            })))
            .expect(1)
            .mount(&server)
            .await;
        f.session.put_provider_value(SESSION_ID_KEY, "cs_test_1");

        let result = provider(&server).complete(&f.ctx, f.result("stripe-checkout")).await;

        assert!(result.is_successful());
        let cart = f.carts.load(f.ctx.cart.id).await.unwrap();
        assert_eq!(cart.payment_state, Some(PaymentState::Paid));
        assert!(f.session.pull_provider_value(SESSION_ID_KEY).is_none());
    }

    #[tokio::test]
    async fn test_complete_unpaid_session_fails() {
        let server = MockServer::start().await;
        let f = fixture("stripe-checkout");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "payment_status": "unpaid",
                "client_reference_id": f.ctx.cart.id.to_string(),
            })))
            .mount(&server)
            .await;
        f.session.put_provider_value(SESSION_ID_KEY, "cs_test_1");

        let result = provider(&server).complete(&f.ctx, f.result("stripe-checkout")).await;

        assert!(!result.is_successful());
        assert_eq!(f.logs.all().await[0].code.as_deref(), Some("unpaid"));
    }

    #[tokio::test]
    async fn test_complete_rejects_foreign_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "payment_status": "paid",
                "client_reference_id": "someone-else",
            })))
            .mount(&server)
            .await;
        let f = fixture("stripe-checkout");
        f.session.put_provider_value(SESSION_ID_KEY, "cs_test_1");

        let result = provider(&server).complete(&f.ctx, f.result("stripe-checkout")).await;

        assert!(!result.is_successful());
    }

    #[tokio::test]
    async fn test_complete_without_session_id_fails() {
        let server = MockServer::start().await;
        let f = fixture("stripe-checkout");

        let result = provider(&server).complete(&f.ctx, f.result("stripe-checkout")).await;

        assert!(!result.is_successful());
    }
}
