//! # Routes
//!
//! Axum router configuration for the checkout API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Checkout (browser, form posts and redirects):
///   - POST /checkout - Submit the checkout form
///   - GET  /checkout/return - Return from a provider's payment page
///   - GET  /checkout/result - Result page
///
/// - API v1:
///   - GET    /api/v1/cart - Cart with totals
///   - POST   /api/v1/cart/items - Add an item
///   - PUT    /api/v1/cart/items/{item_id} - Change an item's quantity
///   - DELETE /api/v1/cart/items/{item_id} - Remove an item
///   - PUT    /api/v1/cart/payment-method - Select a payment method
///   - GET    /api/v1/payment-methods - Selectable payment methods
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let checkout_routes = Router::new()
        .route("/", post(handlers::submit_checkout))
        .route("/return", get(handlers::payment_return))
        .route("/result", get(handlers::checkout_result));

    let api_routes = Router::new()
        .route("/cart", get(handlers::get_cart))
        .route("/cart/items", post(handlers::add_item))
        .route(
            "/cart/items/{item_id}",
            put(handlers::update_quantity).delete(handlers::remove_item),
        )
        .route("/cart/payment-method", put(handlers::select_payment_method))
        .route("/payment-methods", get(handlers::list_payment_methods))
        .layer(cors);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/checkout", checkout_routes)
        .nest("/api/v1", api_routes)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppConfig;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use checkout_core::{
        MemoryCatalog, MemorySettings, PaymentState, SettingsStore, Stores,
    };
    use checkout_providers::{default_registry, HttpClient};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CATALOG: &str = r#"
currency = "EUR"

[[taxes]]
id = 1
name = "VAT 20%"
percentage = 20.0
is_default = true

[[payment_methods]]
id = 1
name = "Invoice"
provider = "offline"
is_default = true

[[payment_methods]]
id = 2
name = "Card"
provider = "stripe-checkout"

[[payment_methods]]
id = 3
name = "Not installed"
provider = "paypal"
"#;

    fn config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: "http://shop.test".to_string(),
            environment: "test".to_string(),
            catalog_path: "unused".to_string(),
            session_idle: crate::state::DEFAULT_SESSION_IDLE,
        }
    }

    fn server_with(settings: impl SettingsStore + 'static) -> (TestServer, AppState) {
        let state = AppState::with_parts(
            config(),
            default_registry(HttpClient::new()).unwrap(),
            Arc::new(settings),
            Stores::memory(),
            MemoryCatalog::from_toml(CATALOG).unwrap(),
        )
        .unwrap();

        let mut server = TestServer::new(create_router(state.clone())).unwrap();
        server.save_cookies();
        (server, state)
    }

    fn checkout_form(method_id: &str) -> Vec<(&'static str, String)> {
        vec![
            ("email", "ada@example.com".to_string()),
            ("shipping_firstname", "Ada".to_string()),
            ("shipping_lastname", "Lovelace".to_string()),
            ("shipping_lines", "Main Street 1".to_string()),
            ("shipping_zip", "8000".to_string()),
            ("shipping_city", "Zurich".to_string()),
            ("shipping_country", "CH".to_string()),
            ("payment_method_id", method_id.to_string()),
        ]
    }

    async fn add_book(server: &TestServer) -> Value {
        let response = server
            .post("/api/v1/cart/items")
            .json(&json!({"name": "Book", "price": 2500, "quantity": 2, "before_tax": true}))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()
    }

    fn location(response: &axum_test::TestResponse) -> String {
        response
            .header("location")
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (server, _) = server_with(MemorySettings::new());

        let body = server.get("/health").await.json::<Value>();

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["providers"][0], "offline");
    }

    #[tokio::test]
    async fn test_cart_applies_default_tax() {
        let (server, _) = server_with(MemorySettings::new());

        let body = add_book(&server).await;

        assert_eq!(body["amount_due"], 6000);
        assert_eq!(body["formatted_total"], "60.00 EUR");

        let body = server.get("/api/v1/cart").await.json::<Value>();
        assert_eq!(body["cart"]["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cookieless_reads_leave_no_session() {
        let (_, state) = server_with(MemorySettings::new());
        let server = TestServer::new(create_router(state.clone())).unwrap();

        for _ in 0..50 {
            server.get("/api/v1/cart").await.assert_status_ok();
        }
        server
            .get("/checkout/return?return=return&payment_id=x")
            .await
            .assert_status(StatusCode::SEE_OTHER);

        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_writes_create_one_session() {
        let (server, state) = server_with(MemorySettings::new());

        add_book(&server).await;
        server.get("/api/v1/cart").await.assert_status_ok();
        add_book(&server).await;

        assert_eq!(state.sessions.len(), 1);
        let body = server.get("/api/v1/cart").await.json::<Value>();
        assert_eq!(body["cart"]["items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_unknown_item() {
        let (server, _) = server_with(MemorySettings::new());

        server
            .delete(&format!("/api/v1/cart/items/{}", uuid::Uuid::new_v4()))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_change_quantity() {
        let (server, _) = server_with(MemorySettings::new());
        let item_id = add_book(&server).await["cart"]["items"][0]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let body = server
            .put(&format!("/api/v1/cart/items/{}", item_id))
            .json(&json!({"quantity": 3}))
            .await
            .json::<Value>();
        assert_eq!(body["amount_due"], 9000);

        server
            .put(&format!("/api/v1/cart/items/{}", item_id))
            .json(&json!({"quantity": 0}))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        server
            .put(&format!("/api/v1/cart/items/{}", uuid::Uuid::new_v4()))
            .json(&json!({"quantity": 1}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_select_payment_method() {
        let (server, _) = server_with(MemorySettings::new());
        add_book(&server).await;

        let body = server
            .put("/api/v1/cart/payment-method")
            .json(&json!({"payment_method_id": 2}))
            .await
            .json::<Value>();
        assert_eq!(body["cart"]["payment_method"]["payment_provider"], "stripe-checkout");

        server
            .put("/api/v1/cart/payment-method")
            .json(&json!({"payment_method_id": 3}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .put("/api/v1/cart/payment-method")
            .json(&json!({"payment_method_id": 42}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_payment_methods_hide_missing_providers() {
        let (server, _) = server_with(MemorySettings::new());

        let body = server.get("/api/v1/payment-methods").await.json::<Value>();

        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn test_invalid_form_is_rejected() {
        let (server, _) = server_with(MemorySettings::new());
        add_book(&server).await;

        let response = server
            .post("/checkout")
            .form(&[("email", "not-an-email"), ("payment_method_id", "1")])
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body = response.json::<Value>();
        assert!(body["fields"]["email"].is_array());
        assert!(body["fields"]["shipping_city"].is_array());
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let (server, _) = server_with(MemorySettings::new());

        let response = server.post("/checkout").form(&checkout_form("1")).await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.json::<Value>()["fields"]["cart"].is_array());
    }

    #[tokio::test]
    async fn test_unavailable_provider_is_bad_request() {
        let (server, _) = server_with(MemorySettings::new());
        add_book(&server).await;

        let response = server.post("/checkout").form(&checkout_form("3")).await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_offline_checkout_succeeds() {
        let (server, state) = server_with(MemorySettings::new());
        let cart_id: uuid::Uuid = add_book(&server).await["cart"]["id"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();

        let response = server.post("/checkout").form(&checkout_form("1")).await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            format!("http://shop.test/checkout/result?result=succeeded&cart={}", cart_id)
        );

        let cart = state.stores.carts.load(cart_id).await.unwrap();
        assert_eq!(cart.payment_state, Some(PaymentState::Pending));
        assert_eq!(cart.customer.email.as_deref(), Some("ada@example.com"));

        // Paid carts are detached from the session
        let body = server.get("/api/v1/cart").await.json::<Value>();
        assert_ne!(body["cart"]["id"], cart_id.to_string());
        assert!(body["cart"]["items"].as_array().unwrap().is_empty());

        let page = server
            .get(&format!("/checkout/result?result=succeeded&cart={}", cart_id))
            .await;
        page.assert_status_ok();
        assert!(page.text().contains("60.00 EUR"));
    }

    #[tokio::test]
    async fn test_return_with_forged_token_fails() {
        let (server, state) = server_with(MemorySettings::new());

        let response = server
            .get("/checkout/return")
            .add_query_param("return", "return")
            .add_query_param("payment_id", "forged")
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            "http://shop.test/checkout/result?result=failed"
        );
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_result_page() {
        let (server, _) = server_with(MemorySettings::new());

        server
            .get("/checkout/result?result=maybe")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pending_result_page() {
        let (server, _) = server_with(MemorySettings::new());

        let pending = server.get("/checkout/result?result=pending").await;
        pending.assert_status_ok();
        assert!(pending.text().contains("being processed"));

        // No result at all is shown as pending
        let missing = server.get("/checkout/result").await;
        missing.assert_status_ok();
        assert!(missing.text().contains("being processed"));

        server
            .get("/checkout/result?result=")
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_stripe_checkout_round_trip() {
        let stripe = MockServer::start().await;
        let settings = MemorySettings::new()
            .with("stripe_checkout_api_key", "sk_test_abc")
            .with("stripe_checkout_api_base", stripe.uri());
        let (server, state) = server_with(settings);
        let cart_id: uuid::Uuid = add_book(&server).await["cart"]["id"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1"
            })))
            .expect(1)
            .mount(&stripe)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "payment_status": "paid",
                "client_reference_id": cart_id.to_string(),
            })))
            .expect(1)
            .mount(&stripe)
            .await;

        let response = server.post("/checkout").form(&checkout_form("2")).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "https://checkout.stripe.com/c/pay/cs_test_1");

        // The success URL Stripe was given carries the attempt token
        let requests = stripe.received_requests().await.unwrap();
        let success_url = url::form_urlencoded::parse(&requests[0].body)
            .find(|(key, _)| key == "success_url")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        let success_url = Url::parse(&success_url).unwrap();
        assert_eq!(success_url.path(), "/checkout/return");

        let response = server
            .get(&format!("/checkout/return?{}", success_url.query().unwrap()))
            .await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            format!("http://shop.test/checkout/result?result=succeeded&cart={}", cart_id)
        );

        let cart = state.stores.carts.load(cart_id).await.unwrap();
        assert_eq!(cart.payment_state, Some(PaymentState::Paid));

        // Replaying the return URL is rejected
        let replay = server
            .get(&format!("/checkout/return?{}", success_url.query().unwrap()))
            .await;
        assert_eq!(
            location(&replay),
            "http://shop.test/checkout/result?result=failed"
        );
    }
}
