//! # Payment Redirector
//!
//! Turns payment results into browser redirects and resumes checkouts
//! that were sent to an external payment page.
//!
//! ```text
//!  POST /checkout ──► result ──┬── redirect ──► provider page
//!                              ├── success  ──► result?result=succeeded
//!                              └── failure  ──► result?result=failed
//!
//!  provider page ──► GET /checkout/return?return=..&payment_id=..
//!                     │
//!                     ├── token mismatch ──► failed     (resume state cleared)
//!                     ├── cancel         ──► cancelled  (resume state cleared)
//!                     ├── callback set   ──► provider.complete() ──► (as above)
//!                     └── no callback    ──► succeeded
//! ```

use crate::error::{CheckoutError, CheckoutResult};
use crate::form::PaymentData;
use crate::log::ProviderResponse;
use crate::payment::provider::{PaymentContext, ProviderRegistry};
use crate::payment::result::PaymentResult;
use crate::payment::urls::{result_url, CallbackUrls};
use crate::session::CheckoutSession;
use crate::settings::SettingsStore;
use crate::store::Stores;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Final outcome shown on the result page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

impl CheckoutOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutOutcome::Succeeded => "succeeded",
            CheckoutOutcome::Failed => "failed",
            CheckoutOutcome::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "succeeded" => Some(CheckoutOutcome::Succeeded),
            "failed" => Some(CheckoutOutcome::Failed),
            "cancelled" => Some(CheckoutOutcome::Cancelled),
            _ => None,
        }
    }
}

/// Why the customer came back from the provider's page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Return,
    Fail,
    Cancel,
}

impl ReturnType {
    /// Unknown values count as a failure
    pub fn parse(value: &str) -> Self {
        match value {
            "return" => ReturnType::Return,
            "cancel" => ReturnType::Cancel,
            _ => ReturnType::Fail,
        }
    }
}

/// Where to send the browser next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    /// `None` while the customer is sent off-site
    pub outcome: Option<CheckoutOutcome>,
}

/// Notified when a checkout ends
#[allow(unused_variables)]
pub trait CheckoutListener: Send + Sync {
    fn on_failed(&self, result: Option<&PaymentResult>) {
        warn!(
            cart_id = ?result.map(|r| r.cart().id),
            "Checkout failed"
        );
    }

    fn on_cancelled(&self, result: Option<&PaymentResult>) {
        info!("Checkout cancelled");
    }

    fn on_succeeded(&self, result: Option<&PaymentResult>) {
        info!(
            cart_id = ?result.map(|r| r.cart().id),
            "Checkout succeeded"
        );
    }
}

/// Listener that only logs
pub struct LoggingCheckoutListener;

impl CheckoutListener for LoggingCheckoutListener {}

fn dispatch(listener: &dyn CheckoutListener, outcome: CheckoutOutcome, result: Option<&PaymentResult>) {
    match outcome {
        CheckoutOutcome::Failed => listener.on_failed(result),
        CheckoutOutcome::Cancelled => listener.on_cancelled(result),
        CheckoutOutcome::Succeeded => listener.on_succeeded(result),
    }
}

pub struct PaymentRedirector {
    session: CheckoutSession,
    registry: Arc<ProviderRegistry>,
    settings: Arc<dyn SettingsStore>,
    stores: Stores,
    result_page: Url,
    return_endpoint: Url,
    listeners: Vec<Arc<dyn CheckoutListener>>,
}

impl PaymentRedirector {
    pub fn new(
        session: CheckoutSession,
        registry: Arc<ProviderRegistry>,
        settings: Arc<dyn SettingsStore>,
        stores: Stores,
        result_page: Url,
        return_endpoint: Url,
    ) -> Self {
        Self {
            session,
            registry,
            settings,
            stores,
            result_page,
            return_endpoint,
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn CheckoutListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn handle_payment_result(&self, result: PaymentResult) -> Redirect {
        if let Some(url) = result.redirect_url() {
            return Redirect {
                location: url.to_string(),
                outcome: None,
            };
        }

        if result.is_successful() {
            self.session.rotate_cart_session_id();
            return self.final_redirect(CheckoutOutcome::Succeeded, Some(&result));
        }

        self.final_redirect(CheckoutOutcome::Failed, Some(&result))
    }

    /// Notify listeners and send the customer to the result page
    pub fn final_redirect(&self, outcome: CheckoutOutcome, result: Option<&PaymentResult>) -> Redirect {
        for listener in &self.listeners {
            dispatch(listener.as_ref(), outcome, result);
        }

        Redirect {
            location: result_url(
                &self.result_page,
                outcome.as_str(),
                self.session.pull_processing_cart(),
            ),
            outcome: Some(outcome),
        }
    }

    /// Resume a checkout after the customer came back from an external page
    #[instrument(skip(self, token))]
    pub async fn handle_off_site_return(
        &self,
        return_type: ReturnType,
        token: Option<&str>,
    ) -> Redirect {
        let expected = self.session.pull_attempt_token();
        let expected = match (expected, token) {
            (Some(expected), Some(given)) if expected == given => expected,
            _ => {
                warn!("Payment return with unknown or expired token");
                self.session.clear_resume_state();
                return self.final_redirect(CheckoutOutcome::Failed, None);
            }
        };

        if return_type == ReturnType::Cancel {
            self.session.clear_resume_state();
            return self.final_redirect(CheckoutOutcome::Cancelled, None);
        }

        let Some(provider_id) = self.session.pull_callback() else {
            return self.final_redirect(CheckoutOutcome::Succeeded, None);
        };

        match self.complete(&provider_id, expected).await {
            Ok(result) => self.handle_payment_result(result),
            Err(e) => {
                error!(provider = %provider_id, error = %e, "Could not complete off-site payment");
                self.final_redirect(CheckoutOutcome::Failed, None)
            }
        }
    }

    async fn complete(&self, provider_id: &str, token: String) -> CheckoutResult<PaymentResult> {
        let mut provider = self.registry.create(provider_id)?;

        let cart_id = self.session.pull_payment_cart().ok_or_else(|| {
            CheckoutError::Logic("No cart stored for the payment in progress".to_string())
        })?;
        let cart = self.stores.carts.load(cart_id).await?;
        let data = self
            .session
            .pull_payment_data()
            .map(|value| PaymentData::from_json(&value))
            .unwrap_or_default();

        let result = PaymentResult::new(provider.identifier(), cart.clone(), self.stores.clone());

        if let Err(e) = provider.init(self.settings.as_ref()) {
            return Ok(result.fail(data.to_json(), ProviderResponse::from(&e)).await);
        }

        let Some(off_site) = provider.off_site() else {
            let e = CheckoutError::Logic(format!(
                "Payment provider '{}' redirects off-site but cannot complete payments",
                provider_id
            ));
            return Ok(result.fail(data.to_json(), ProviderResponse::from(&e)).await);
        };

        let ctx = PaymentContext::new(
            cart,
            data,
            CallbackUrls::new(self.return_endpoint.clone(), token),
            self.session.clone(),
        );
        Ok(off_site.complete(&ctx, result).await)
    }
}
