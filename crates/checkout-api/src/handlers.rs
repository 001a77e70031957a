//! # Request Handlers
//!
//! Axum request handlers for the checkout endpoints and the cart API.

use crate::session::BrowserSession;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use checkout_core::{
    format_money, Cart, CartItem, CheckoutError, CheckoutForm, CheckoutOutcome,
    CheckoutResult, DefaultPaymentGateway, FieldErrors, PaymentGateway, PaymentService,
    ReturnType, Totals,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Add an item to the cart
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub name: String,
    /// Unit price in minor units
    pub price: i64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Taxes are added on top of `price`
    #[serde(default)]
    pub before_tax: bool,
}

fn default_quantity() -> u32 {
    1
}

/// Change the quantity of a cart line
#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

/// Select the payment method shown in the cart totals
#[derive(Debug, Deserialize)]
pub struct PaymentMethodRequest {
    pub payment_method_id: u32,
}

/// Cart with its computed totals
#[derive(Debug, Serialize)]
pub struct CartView {
    pub cart: Cart,
    pub totals: Totals,
    pub amount_due: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_total: Option<String>,
}

impl CartView {
    pub fn new(cart: Cart) -> Self {
        let totals = cart.totals();
        let amount_due = totals.amount_due();
        let formatted_total = cart.currency().map(|c| format_money(amount_due, c));
        Self {
            cart,
            totals,
            amount_due,
            formatted_total,
        }
    }
}

/// Off-site return parameters
#[derive(Debug, Deserialize)]
pub struct ReturnQuery {
    #[serde(rename = "return", default)]
    pub return_type: String,
    #[serde(default)]
    pub payment_id: Option<String>,
}

/// Result page parameters
#[derive(Debug, Deserialize)]
pub struct ResultQuery {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub cart: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            fields: None,
        }
    }

    pub fn with_fields(mut self, fields: FieldErrors) -> Self {
        self.fields = Some(fields);
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn checkout_error_to_response(err: CheckoutError) -> ApiError {
    let code = err.status_code();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let response = match err {
        CheckoutError::Validation(fields) => {
            ErrorResponse::new("Validation failed", code).with_fields(fields)
        }
        other => ErrorResponse::new(other.to_string(), code),
    };
    (status, Json(response))
}

fn set_cookie(session: &BrowserSession) -> AppendHeaders<[(axum::http::HeaderName, String); 1]> {
    AppendHeaders([(SET_COOKIE, session.cookie())])
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let providers: Vec<&str> = state.registry.providers().iter().map(|(id, _)| *id).collect();
    Json(serde_json::json!({
        "status": "healthy",
        "service": "checkout-rs",
        "version": env!("CARGO_PKG_VERSION"),
        "providers": providers,
    }))
}

/// Current cart with totals
pub async fn get_cart(
    State(state): State<AppState>,
    browser: BrowserSession,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.read_session(&browser.id);
    let cart = state
        .open_cart(&session)
        .await
        .map_err(checkout_error_to_response)?;

    Ok((set_cookie(&browser), Json(CartView::new(cart))))
}

/// Add an item, with the default tax when configured
#[instrument(skip(state, browser, request), fields(name = %request.name))]
pub async fn add_item(
    State(state): State<AppState>,
    browser: BrowserSession,
    Json(request): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = FieldErrors::new();
    if request.name.trim().is_empty() {
        errors.add("name", "This field is required.");
    }
    if request.quantity == 0 {
        errors.add("quantity", "Quantity must be at least 1.");
    }
    errors.into_result().map_err(checkout_error_to_response)?;

    let session = state.session(&browser.id);
    let mut cart = state
        .open_cart(&session)
        .await
        .map_err(checkout_error_to_response)?;

    let mut item = CartItem::new(request.name.trim(), request.price);
    if let Some(code) = request.code {
        item = item.with_code(code);
    }
    if let Some(description) = request.description {
        item = item.with_description(description);
    }
    if request.before_tax {
        item = item.before_tax();
    }
    state.catalog.add_item(&mut cart, item, request.quantity).await;
    state
        .stores
        .carts
        .save(&cart)
        .await
        .map_err(checkout_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        set_cookie(&browser),
        Json(CartView::new(cart)),
    ))
}

/// Remove an item from the cart
pub async fn remove_item(
    State(state): State<AppState>,
    browser: BrowserSession,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session(&browser.id);
    let mut cart = state
        .open_cart(&session)
        .await
        .map_err(checkout_error_to_response)?;

    cart.remove(item_id).map_err(checkout_error_to_response)?;
    state
        .stores
        .carts
        .save(&cart)
        .await
        .map_err(checkout_error_to_response)?;

    Ok((set_cookie(&browser), Json(CartView::new(cart))))
}

/// Change the quantity of an item
pub async fn update_quantity(
    State(state): State<AppState>,
    browser: BrowserSession,
    Path(item_id): Path<Uuid>,
    Json(request): Json<QuantityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.quantity == 0 {
        return Err(checkout_error_to_response(CheckoutError::invalid(
            "quantity",
            "Quantity must be at least 1.",
        )));
    }

    let session = state.session(&browser.id);
    let mut cart = state
        .open_cart(&session)
        .await
        .map_err(checkout_error_to_response)?;

    cart.set_quantity(item_id, request.quantity)
        .map_err(checkout_error_to_response)?;
    state
        .stores
        .carts
        .save(&cart)
        .await
        .map_err(checkout_error_to_response)?;

    Ok((set_cookie(&browser), Json(CartView::new(cart))))
}

/// Select a payment method so its fee shows up in the totals
pub async fn select_payment_method(
    State(state): State<AppState>,
    browser: BrowserSession,
    Json(request): Json<PaymentMethodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let method = state
        .catalog
        .payment_method(request.payment_method_id)
        .await
        .map_err(checkout_error_to_response)?;
    if !state.registry.contains(&method.payment_provider) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                format!("The payment method '{}' is unavailable", method.name),
                StatusCode::BAD_REQUEST.as_u16(),
            )),
        ));
    }

    let session = state.session(&browser.id);
    let mut cart = state
        .open_cart(&session)
        .await
        .map_err(checkout_error_to_response)?;

    cart.set_payment_method(method);
    state
        .stores
        .carts
        .save(&cart)
        .await
        .map_err(checkout_error_to_response)?;

    Ok((set_cookie(&browser), Json(CartView::new(cart))))
}

/// Payment methods whose provider is available
pub async fn list_payment_methods(State(state): State<AppState>) -> impl IntoResponse {
    let methods: Vec<_> = state
        .catalog
        .payment_methods()
        .await
        .into_iter()
        .filter(|m| state.registry.contains(&m.payment_provider))
        .collect();

    Json(serde_json::json!({
        "payment_methods": methods,
        "count": methods.len()
    }))
}

/// Checkout form submit. Redirects to the provider or the result page.
#[instrument(skip(state, browser, form))]
pub async fn submit_checkout(
    State(state): State<AppState>,
    browser: BrowserSession,
    Form(form): Form<CheckoutForm>,
) -> Response {
    match checkout(&state, &browser, form).await {
        Ok(location) => (set_cookie(&browser), Redirect::to(&location)).into_response(),
        Err(err) => {
            warn!(error = %err, "Checkout rejected");
            // The selected method cannot be paid with right now
            let (status, body) = match err {
                CheckoutError::Configuration(message) => (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new(message, StatusCode::BAD_REQUEST.as_u16())),
                ),
                other => checkout_error_to_response(other),
            };
            (status, set_cookie(&browser), body).into_response()
        }
    }
}

async fn checkout(
    state: &AppState,
    browser: &BrowserSession,
    form: CheckoutForm,
) -> CheckoutResult<String> {
    form.check()?;

    let session = state.session(&browser.id);
    let mut cart = state.open_cart(&session).await?;
    if cart.is_empty() {
        return Err(CheckoutError::invalid("cart", "Your cart is empty."));
    }

    let method = form.payment_method(&state.catalog).await?;
    form.apply_to(&mut cart);
    cart.set_payment_method(method.clone());

    let mut gateway = DefaultPaymentGateway::new(
        state.registry.clone(),
        state.settings.clone(),
        session.clone(),
        state.stores.clone(),
        state.return_endpoint().clone(),
    );
    gateway.init(&method, form.payment_data())?;

    info!(cart_id = %cart.id, method = %method.log_label(), "Checkout submitted");

    let redirector = state.redirector(session.clone());
    let redirect = PaymentService::new(gateway, session, state.stores.clone())
        .checkout(cart, &redirector)
        .await?;

    Ok(redirect.location)
}

/// The customer came back from a provider's payment page
#[instrument(skip(state, browser, query), fields(return_type = %query.return_type))]
pub async fn payment_return(
    State(state): State<AppState>,
    browser: BrowserSession,
    Query(query): Query<ReturnQuery>,
) -> impl IntoResponse {
    // Without a stored session there is no attempt token to match
    let session = state.read_session(&browser.id);
    let redirect = state
        .redirector(session)
        .handle_off_site_return(
            ReturnType::parse(&query.return_type),
            query.payment_id.as_deref(),
        )
        .await;

    (set_cookie(&browser), Redirect::to(&redirect.location))
}

/// Result value for payments that are still being confirmed; also used
/// when the page is opened without a result
pub const RESULT_PENDING: &str = "pending";

/// Result page every checkout ends on
pub async fn checkout_result(
    State(state): State<AppState>,
    Query(query): Query<ResultQuery>,
) -> impl IntoResponse {
    let result = match query.result.trim() {
        "" => RESULT_PENDING,
        other => other,
    };

    let (icon, title) = match CheckoutOutcome::parse(result) {
        Some(CheckoutOutcome::Succeeded) => ("✅", "Thank you for your order!"),
        Some(CheckoutOutcome::Failed) => ("❌", "Payment failed"),
        Some(CheckoutOutcome::Cancelled) => ("↩️", "Payment cancelled"),
        None if result == RESULT_PENDING => ("⏳", "Your payment is being processed"),
        None => {
            return (StatusCode::BAD_REQUEST, Html(page("❓", "Unknown checkout result", "")));
        }
    };

    let cart_id = query.cart.as_deref().and_then(|id| id.parse::<Uuid>().ok());
    let cart = match cart_id {
        Some(id) => state.stores.carts.find(id).await.ok().flatten(),
        None => None,
    };
    let summary = cart
        .map(|cart| {
            let total = cart
                .currency()
                .map(|c| format_money(cart.totals().amount_due(), c))
                .unwrap_or_default();
            format!("<p>Order <code>{}</code></p><p>{}</p>", cart.id, total)
        })
        .unwrap_or_default();

    (StatusCode::OK, Html(page(icon, title, &summary)))
}

fn page(icon: &str, title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{title}</title></head>
<body style="font-family: system-ui; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #f4f4f6;">
    <div style="background: white; padding: 60px; border-radius: 16px; text-align: center;">
        <div style="font-size: 60px;">{icon}</div>
        <h1>{title}</h1>
        {body}
    </div>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400);
        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, 400);
        assert!(err.fields.is_none());
    }

    #[test]
    fn test_checkout_error_conversion() {
        let (status, body) = checkout_error_to_response(CheckoutError::invalid("email", "Required"));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.fields.as_ref().unwrap().get("email").is_some());

        let (status, _) = checkout_error_to_response(CheckoutError::Concurrency("busy".into()));
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = checkout_error_to_response(CheckoutError::not_found("cart item", "x"));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_cart_view_formats_total() {
        let mut cart = Cart::new("s").with_currency(checkout_core::Currency::EUR);
        cart.add(CartItem::new("Book", 2500), 2);

        let view = CartView::new(cart);

        assert_eq!(view.amount_due, 5000);
        assert_eq!(view.formatted_total.as_deref(), Some("50.00 EUR"));
    }

    #[test]
    fn test_page_contains_title() {
        assert!(page("✅", "Done", "<p>x</p>").contains("<h1>Done</h1>"));
    }
}
