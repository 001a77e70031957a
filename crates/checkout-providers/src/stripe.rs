//! # Stripe
//!
//! Direct card payments. Stripe.js tokenizes the card in the browser and the
//! checkout form submits the token. The charge then happens server side:
//! a customer is created from the token, and the customer's card is charged
//! for the amount due.

use crate::config::{stripe_error, StripeConfig};
use crate::http::{ApiError, HttpClient};
use async_trait::async_trait;
use checkout_core::{
    Cart, CheckoutError, CheckoutResult, PaymentContext, PaymentData, PaymentProvider,
    PaymentResult, ProviderResponse, SettingField, SettingsStore,
};
use tracing::{debug, info, instrument, warn};

/// `tok_` followed by 24 alphanumerics
pub const TOKEN_LENGTH: usize = 28;

/// Card payments through the Stripe charges API
#[derive(Debug, Clone, Default)]
pub struct Stripe {
    http: HttpClient,
    config: Option<StripeConfig>,
}

impl Stripe {
    pub fn new(http: HttpClient) -> Self {
        Self { http, config: None }
    }

    /// Builder: skip [`PaymentProvider::init`] (for testing)
    pub fn with_config(mut self, config: StripeConfig) -> Self {
        self.config = Some(config);
        self
    }

    fn config(&self) -> CheckoutResult<&StripeConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| CheckoutError::Logic("Stripe provider is not initialized".into()))
    }
}

pub fn is_valid_token(token: &str) -> bool {
    token.len() == TOKEN_LENGTH
        && token
            .strip_prefix("tok_")
            .map(|rest| rest.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or(false)
}

/// Form for `POST /v1/customers`
fn customer_params(cart: &Cart, token: &str) -> Vec<(String, String)> {
    let customer = &cart.customer;
    let shipping = &customer.shipping;
    let name = customer.display_name();

    let mut shipping_name = shipping.full_name();
    if !shipping.company.trim().is_empty() {
        shipping_name = format!("{} ({})", shipping_name, shipping.company.trim());
    }

    let street = shipping.street_lines();
    let line1 = street.first().copied().unwrap_or_default();
    let line2 = street.get(1..).map(|rest| rest.join(", ")).unwrap_or_default();

    let mut params: Vec<(String, String)> = vec![
        ("name".to_string(), name.clone()),
        ("description".to_string(), format!("Customer for Cart ID {}", cart.id)),
        ("source".to_string(), token.to_string()),
        ("shipping[name]".to_string(), shipping_name),
        ("shipping[address][line1]".to_string(), line1.to_string()),
        ("shipping[address][line2]".to_string(), line2),
        ("shipping[address][city]".to_string(), shipping.city.clone()),
        ("shipping[address][country]".to_string(), shipping.country.clone()),
        ("shipping[address][postal_code]".to_string(), shipping.zip.clone()),
        ("metadata[name]".to_string(), name),
        ("metadata[cart_id]".to_string(), cart.id.to_string()),
    ];
    if let Some(email) = &customer.email {
        params.push(("email".to_string(), email.clone()));
    }
    params
}

fn charge_succeeded(charge: &serde_json::Value) -> bool {
    charge["status"].as_str() == Some("succeeded") || charge["paid"].as_bool() == Some(true)
}

/// Failure details Stripe puts on a declined charge
fn charge_failure(charge: &serde_json::Value) -> ProviderResponse {
    let message = charge["failure_message"]
        .as_str()
        .or_else(|| charge["outcome"]["seller_message"].as_str())
        .unwrap_or("The charge was not successful");
    let code = charge["failure_code"]
        .as_str()
        .or_else(|| charge["status"].as_str())
        .unwrap_or("unknown");
    ProviderResponse::new(message).with_code(code)
}

#[async_trait]
impl PaymentProvider for Stripe {
    fn identifier(&self) -> &'static str {
        "stripe"
    }

    fn name(&self) -> &'static str {
        "Stripe"
    }

    fn settings(&self) -> Vec<SettingField> {
        vec![
            SettingField::password("stripe_api_key", "Stripe API Key")
                .with_comment("Secret key, sk_test_... or sk_live_..."),
            SettingField::text("stripe_publishable_key", "Stripe Publishable Key")
                .with_comment("Used by Stripe.js to tokenize the card"),
        ]
    }

    fn encrypted_settings(&self) -> Vec<&'static str> {
        vec!["stripe_api_key"]
    }

    fn init(&mut self, settings: &dyn SettingsStore) -> CheckoutResult<()> {
        self.config = Some(StripeConfig::from_settings(settings, "stripe")?);
        Ok(())
    }

    fn validate(&self, data: &PaymentData) -> CheckoutResult<()> {
        match data.get("token") {
            Some(token) if is_valid_token(token) => Ok(()),
            _ => Err(CheckoutError::invalid("token", "Invalid card token")),
        }
    }

    #[instrument(skip(self, ctx, result), fields(cart_id = %ctx.cart.id, amount = ctx.amount()))]
    async fn process(&self, ctx: &PaymentContext, result: PaymentResult) -> PaymentResult {
        let prepared = self
            .config()
            .and_then(|config| self.validate(&ctx.data).map(|_| config))
            .and_then(|config| ctx.cart.require_currency().map(|c| (config, c)));
        let (config, currency) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                let response = ProviderResponse::from(&e);
                return result.fail(ctx.cart.snapshot(), response).await;
            }
        };
        let token = ctx.data.get("token").unwrap_or_default();

        let customer = match self
            .http
            .post_form(
                &config.url("/v1/customers"),
                &config.secret_key,
                &config.headers(),
                &customer_params(&ctx.cart, token),
                stripe_error,
            )
            .await
        {
            Ok(customer) => customer,
            Err(e) => return fail_with(result, &e).await,
        };

        let Some(customer_id) = customer["id"].as_str() else {
            let e = ApiError::Decode("Customer response has no id".into());
            return result.fail(customer, ProviderResponse::from(&e)).await;
        };
        debug!(customer_id, "Stripe customer created");

        let mut params: Vec<(String, String)> = vec![
            ("amount".to_string(), ctx.amount().to_string()),
            ("currency".to_string(), currency.as_lower()),
            ("description".to_string(), format!("Payment for Cart ID {}", ctx.cart.id)),
            ("customer".to_string(), customer_id.to_string()),
            ("metadata[cart_id]".to_string(), ctx.cart.id.to_string()),
        ];
        if let Some(card) = customer["default_source"].as_str() {
            params.push(("source".to_string(), card.to_string()));
        }

        let charge = match self
            .http
            .post_form(
                &config.url("/v1/charges"),
                &config.secret_key,
                &[
                    ("Stripe-Version", config.api_version.clone()),
                    ("Idempotency-Key", ctx.urls.token().to_string()),
                ],
                &params,
                stripe_error,
            )
            .await
        {
            Ok(charge) => charge,
            Err(e) => return fail_with(result, &e).await,
        };

        if charge_succeeded(&charge) {
            let charge_id = charge["id"].as_str().unwrap_or_default().to_string();
            info!(charge_id = %charge_id, "Stripe charge succeeded");
            result
                .success(charge, ProviderResponse::new(charge_id).with_code("succeeded"))
                .await
        } else {
            let response = charge_failure(&charge);
            warn!(code = ?response.code, "Stripe charge not successful");
            result.fail(charge, response).await
        }
    }
}

async fn fail_with(result: PaymentResult, err: &ApiError) -> PaymentResult {
    result.fail(err.body(), ProviderResponse::from(err)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture_with_data;
    use checkout_core::{CartRepository, MemorySettings, PaymentState};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "tok_1234567890abcdefghijABCD";

    fn provider(server: &MockServer) -> Stripe {
        Stripe::default().with_config(StripeConfig::new("sk_test_abc").with_api_base_url(server.uri()))
    }

    async fn mount_customer(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .and(header("authorization", "Bearer sk_test_abc"))
            .and(body_string_contains("source=tok_1234567890abcdefghijABCD"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "cus_1", "default_source": "card_1"})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_token_format() {
        assert!(is_valid_token(TOKEN));
        assert!(!is_valid_token("tok_short"));
        assert!(!is_valid_token("pm_1234567890abcdefghijABCDEF"));
        assert!(!is_valid_token("tok_1234567890abcdefghij-BCD"));
    }

    #[test]
    fn test_validate_reports_token_field() {
        let err = Stripe::default().validate(&PaymentData::new()).unwrap_err();
        match err {
            CheckoutError::Validation(fields) => assert!(fields.get("token").is_some()),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(Stripe::default()
            .validate(&PaymentData::new().with("token", TOKEN))
            .is_ok());
    }

    #[test]
    fn test_init_reads_settings() {
        let mut stripe = Stripe::default();
        assert!(stripe.init(&MemorySettings::new()).is_err());

        let settings = MemorySettings::new().with("stripe_api_key", "sk_test_abc");
        stripe.init(&settings).unwrap();
        assert!(stripe.config().is_ok());
        assert_eq!(stripe.encrypted_settings(), vec!["stripe_api_key"]);
    }

    #[test]
    fn test_customer_params() {
        let f = fixture_with_data("stripe", PaymentData::new().with("token", TOKEN));
        let params = customer_params(&f.ctx.cart, TOKEN);
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };

        assert_eq!(get("name"), "Ada Lovelace");
        assert_eq!(get("shipping[name]"), "Ada Lovelace (Analytical Engines Ltd)");
        assert_eq!(get("shipping[address][line1]"), "Main Street 1");
        assert_eq!(get("shipping[address][line2]"), "Floor 2");
        assert_eq!(get("shipping[address][postal_code]"), "8000");
        assert_eq!(get("email"), "ada@example.com");
    }

    #[tokio::test]
    async fn test_successful_charge() {
        let server = MockServer::start().await;
        mount_customer(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/charges"))
            .and(body_string_contains("amount=5000"))
            .and(body_string_contains("currency=eur"))
            .and(body_string_contains("customer=cus_1"))
            .and(body_string_contains("source=card_1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "ch_1", "status": "succeeded", "paid": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let f = fixture_with_data("stripe", PaymentData::new().with("token", TOKEN));
        let result = provider(&server).process(&f.ctx, f.result("stripe")).await;

        assert!(result.is_successful());
        let cart = f.carts.load(f.ctx.cart.id).await.unwrap();
        assert_eq!(cart.payment_state, Some(PaymentState::Paid));
        let logs = f.logs.all().await;
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].failed);
        assert_eq!(logs[0].data["id"], "ch_1");
    }

    #[tokio::test]
    async fn test_declined_card_fails() {
        let server = MockServer::start().await;
        mount_customer(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/charges"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": {"message": "Your card was declined.", "code": "card_declined"}
            })))
            .mount(&server)
            .await;

        let f = fixture_with_data("stripe", PaymentData::new().with("token", TOKEN));
        let result = provider(&server).process(&f.ctx, f.result("stripe")).await;

        assert!(!result.is_successful());
        let logs = f.logs.all().await;
        assert!(logs[0].failed);
        assert_eq!(logs[0].code.as_deref(), Some("card_declined"));
        assert_eq!(logs[0].message.as_deref(), Some("Your card was declined."));
    }

    #[tokio::test]
    async fn test_invalid_token_never_calls_stripe() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let f = fixture_with_data("stripe", PaymentData::new().with("token", "tok_bad"));
        let result = provider(&server).process(&f.ctx, f.result("stripe")).await;

        assert!(!result.is_successful());
    }

    #[tokio::test]
    async fn test_uninitialized_provider_fails() {
        let f = fixture_with_data("stripe", PaymentData::new().with("token", TOKEN));
        let result = Stripe::default().process(&f.ctx, f.result("stripe")).await;

        assert!(!result.is_successful());
        assert_eq!(f.logs.all().await[0].code.as_deref(), Some("500"));
    }
}
