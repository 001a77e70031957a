//! # Payment Result
//!
//! Outcome of one payment attempt. Providers turn a fresh result into a
//! final one by calling exactly one of [`PaymentResult::success`],
//! [`PaymentResult::pending`], [`PaymentResult::fail`] or
//! [`PaymentResult::redirect`].
//!
//! | transition | successful | cart state | log       |
//! |------------|------------|------------|-----------|
//! | success    | yes        | Paid       | ok        |
//! | pending    | yes        | Pending    | none      |
//! | fail       | no         | unchanged  | failed    |
//! | redirect   | no         | unchanged  | none      |
//!
//! Once money has moved, storage problems never change the outcome. They
//! are logged so the payment can be reconciled by hand.

use crate::cart::Cart;
use crate::log::{PaymentLog, ProviderResponse};
use crate::state::PaymentState;
use crate::store::Stores;
use tracing::{error, warn};
use uuid::Uuid;

pub struct PaymentResult {
    provider: String,
    cart: Cart,
    stores: Stores,
    successful: bool,
    redirect_url: Option<String>,
    log_id: Option<Uuid>,
    message: Option<String>,
}

impl PaymentResult {
    pub fn new(provider: impl Into<String>, cart: Cart, stores: Stores) -> Self {
        Self {
            provider: provider.into(),
            cart,
            stores,
            successful: false,
            redirect_url: None,
            log_id: None,
            message: None,
        }
    }

    /// Money has been captured
    pub async fn success(mut self, data: serde_json::Value, response: ProviderResponse) -> Self {
        self.successful = true;

        match self.write_log(false, data, &response).await {
            Ok(id) => self.cart.payment_id = Some(id),
            Err(e) => error!(
                cart_id = %self.cart.id,
                provider = %self.provider,
                error = %e,
                "Could not log successful payment"
            ),
        }

        self.set_state(PaymentState::Paid);
        self.save("Could not mark paid cart as paid").await;
        self
    }

    /// The payment will be confirmed later (e.g. bank transfer)
    pub async fn pending(mut self) -> Self {
        self.successful = true;
        self.set_state(PaymentState::Pending);
        self.save("Could not mark pending cart as pending").await;
        self
    }

    /// The payment did not go through; the cart stays open for a retry
    pub async fn fail(mut self, data: serde_json::Value, response: ProviderResponse) -> Self {
        self.successful = false;
        self.message = response.message.clone();

        warn!(
            cart_id = %self.cart.id,
            provider = %self.provider,
            message = response.message.as_deref().unwrap_or(""),
            code = response.code.as_deref().unwrap_or(""),
            "A payment failed"
        );

        match self.write_log(true, data, &response).await {
            Ok(id) => {
                self.cart.payment_id = Some(id);
                self.save("Could not attach failed payment to cart").await;
            }
            Err(e) => error!(
                cart_id = %self.cart.id,
                provider = %self.provider,
                error = %e,
                "Could not log failed payment"
            ),
        }
        self
    }

    /// The customer has to continue on the provider's site
    pub fn redirect(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    pub fn is_successful(&self) -> bool {
        self.successful
    }

    pub fn needs_redirect(&self) -> bool {
        self.redirect_url.is_some()
    }

    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    /// Identifier of the provider that produced this result
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn into_cart(self) -> Cart {
        self.cart
    }

    /// Id of the payment log written for this attempt
    pub fn log_id(&self) -> Option<Uuid> {
        self.log_id
    }

    /// Provider message of a failed attempt; for logs and support only
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    async fn write_log(
        &mut self,
        failed: bool,
        data: serde_json::Value,
        response: &ProviderResponse,
    ) -> crate::error::CheckoutResult<Uuid> {
        let log = PaymentLog::new(failed, self.provider.clone(), &self.cart, data, response);
        let id = self.stores.logs.insert(log).await?;
        self.log_id = Some(id);
        Ok(id)
    }

    fn set_state(&mut self, next: PaymentState) {
        if let Some(current) = self.cart.payment_state {
            if current != next && !current.can_transition_to(next) {
                warn!(
                    cart_id = %self.cart.id,
                    from = %current,
                    to = %next,
                    "Unexpected payment state transition"
                );
            }
        }
        self.cart.payment_state = Some(next);
    }

    async fn save(&self, context: &'static str) {
        if let Err(e) = self.stores.carts.save(&self.cart).await {
            error!(
                severity = "critical",
                cart_id = %self.cart.id,
                provider = %self.provider,
                error = %e,
                "{}",
                context
            );
        }
    }
}

impl std::fmt::Debug for PaymentResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentResult")
            .field("provider", &self.provider)
            .field("cart_id", &self.cart.id)
            .field("successful", &self.successful)
            .field("redirect_url", &self.redirect_url)
            .field("log_id", &self.log_id)
            .finish()
    }
}
