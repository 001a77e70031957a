//! # Payment Gateway
//!
//! Picks the provider for the selected payment method and runs one payment
//! attempt with it.

use crate::cart::Cart;
use crate::error::{CheckoutError, CheckoutResult};
use crate::form::PaymentData;
use crate::payment::provider::{PaymentContext, PaymentProvider, ProviderFactory, ProviderRegistry};
use crate::payment::result::PaymentResult;
use crate::payment::urls::CallbackUrls;
use crate::payment_method::PaymentMethod;
use crate::session::CheckoutSession;
use crate::settings::SettingsStore;
use crate::store::Stores;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};
use url::Url;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Add a provider. Identifiers must be unique.
    fn register_provider(&mut self, factory: ProviderFactory) -> CheckoutResult<()>;

    /// Select the provider of `method` and validate `data` against it
    fn init(&mut self, method: &PaymentMethod, data: PaymentData) -> CheckoutResult<()>;

    /// Run the payment attempt with the provider selected in `init`
    async fn process(&mut self, cart: Cart) -> CheckoutResult<PaymentResult>;

    /// `(identifier, name)` of every available provider
    fn providers(&self) -> Vec<(&'static str, &'static str)>;

    /// Fresh instance of a provider
    fn provider_by_id(&self, identifier: &str) -> CheckoutResult<Box<dyn PaymentProvider>>;

    fn active_provider(&self) -> Option<&dyn PaymentProvider>;
}

/// Gateway backed by a [`ProviderRegistry`]; one instance per checkout request
pub struct DefaultPaymentGateway {
    registry: Arc<ProviderRegistry>,
    settings: Arc<dyn SettingsStore>,
    session: CheckoutSession,
    stores: Stores,
    return_endpoint: Url,
    active: Option<Box<dyn PaymentProvider>>,
    data: PaymentData,
}

impl DefaultPaymentGateway {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        settings: Arc<dyn SettingsStore>,
        session: CheckoutSession,
        stores: Stores,
        return_endpoint: Url,
    ) -> Self {
        Self {
            registry,
            settings,
            session,
            stores,
            return_endpoint,
            active: None,
            data: PaymentData::default(),
        }
    }
}

#[async_trait]
impl PaymentGateway for DefaultPaymentGateway {
    fn register_provider(&mut self, factory: ProviderFactory) -> CheckoutResult<()> {
        Arc::make_mut(&mut self.registry).register(factory)
    }

    fn init(&mut self, method: &PaymentMethod, data: PaymentData) -> CheckoutResult<()> {
        let provider = self.registry.create(&method.payment_provider)?;
        self.session.set_payment_data(&data.to_json());
        provider.validate(&data)?;

        self.data = data;
        self.active = Some(provider);
        Ok(())
    }

    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    async fn process(&mut self, cart: Cart) -> CheckoutResult<PaymentResult> {
        let provider = self.active.as_mut().ok_or_else(|| {
            CheckoutError::Logic(
                "Missing data for payment. Call init() before process()".to_string(),
            )
        })?;

        provider.init(self.settings.as_ref())?;

        let token = self.session.begin_attempt();
        self.session.set_payment_cart(cart.id);
        self.stores.carts.save(&cart).await?;

        info!(
            provider = provider.identifier(),
            amount = cart.totals().amount_due(),
            "Processing payment"
        );

        let ctx = PaymentContext::new(
            cart.clone(),
            self.data.clone(),
            CallbackUrls::new(self.return_endpoint.clone(), token),
            self.session.clone(),
        );
        let result = PaymentResult::new(provider.identifier(), cart, self.stores.clone());

        Ok(provider.process(&ctx, result).await)
    }

    fn providers(&self) -> Vec<(&'static str, &'static str)> {
        self.registry.providers()
    }

    fn provider_by_id(&self, identifier: &str) -> CheckoutResult<Box<dyn PaymentProvider>> {
        self.registry.create(identifier)
    }

    fn active_provider(&self) -> Option<&dyn PaymentProvider> {
        self.active.as_deref()
    }
}
