//! # Payment Service
//!
//! Top-level entry point of a checkout click. Holds the per-session lock
//! for the whole attempt, so a double click cannot charge twice.

use crate::cart::Cart;
use crate::error::CheckoutResult;
use crate::log::ProviderResponse;
use crate::payment::gateway::PaymentGateway;
use crate::payment::redirector::{PaymentRedirector, Redirect};
use crate::payment::result::PaymentResult;
use crate::session::CheckoutSession;
use crate::store::Stores;
use tracing::{error, instrument};

pub struct PaymentService<G: PaymentGateway> {
    gateway: G,
    session: CheckoutSession,
    stores: Stores,
}

impl<G: PaymentGateway> PaymentService<G> {
    pub fn new(gateway: G, session: CheckoutSession, stores: Stores) -> Self {
        Self {
            gateway,
            session,
            stores,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Run the payment attempt.
    ///
    /// Fails only if another checkout of the same session is running. Any
    /// other error is turned into a failed result.
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn process(&mut self, cart: Cart) -> CheckoutResult<PaymentResult> {
        let _lock = self.session.lock()?;
        self.session.set_processing_cart(cart.id);

        let result = match self.gateway.process(cart.clone()).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Payment processing aborted");
                let provider = self
                    .gateway
                    .active_provider()
                    .map(|p| p.identifier())
                    .unwrap_or("unknown");
                let data = cart.snapshot();
                PaymentResult::new(provider, cart, self.stores.clone())
                    .fail(data, ProviderResponse::from(&e))
                    .await
            }
        };

        Ok(result)
    }

    /// Process and turn the result into the browser redirect
    pub async fn checkout(
        &mut self,
        cart: Cart,
        redirector: &PaymentRedirector,
    ) -> CheckoutResult<Redirect> {
        let result = self.process(cart).await?;
        Ok(redirector.handle_payment_result(result))
    }
}
