//! # Payment Providers
//!
//! One [`PaymentProvider`] per external payment integration. Providers that
//! send the customer to an external page also implement
//! [`OffSiteProvider`] to finish the payment when the customer returns.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                PaymentProvider (trait)               │
//! │  ├── init()       load settings                      │
//! │  ├── validate()   check submitted data               │
//! │  ├── process()    charge, or redirect off-site       │
//! │  └── off_site() ─► OffSiteProvider::complete()       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Providers are registered explicitly with a [`ProviderRegistry`], which
//! keeps factories rather than instances: every payment attempt and every
//! return from an external page works on a fresh provider.

use crate::cart::Cart;
use crate::error::{CheckoutError, CheckoutResult};
use crate::form::PaymentData;
use crate::payment::result::PaymentResult;
use crate::payment::urls::CallbackUrls;
use crate::session::CheckoutSession;
use crate::settings::{SettingField, SettingsStore};
use crate::totals::Totals;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Everything a provider needs to charge a cart
pub struct PaymentContext {
    pub cart: Cart,
    pub totals: Totals,
    pub data: PaymentData,
    pub urls: CallbackUrls,
    pub session: CheckoutSession,
}

impl PaymentContext {
    pub fn new(cart: Cart, data: PaymentData, urls: CallbackUrls, session: CheckoutSession) -> Self {
        let totals = cart.totals();
        Self {
            cart,
            totals,
            data,
            urls,
            session,
        }
    }

    /// Amount to charge in minor units
    pub fn amount(&self) -> i64 {
        self.totals.amount_due()
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Unique identifier, referenced by payment methods
    fn identifier(&self) -> &'static str;

    /// Display name
    fn name(&self) -> &'static str;

    /// Settings this provider reads in [`PaymentProvider::init`]
    fn settings(&self) -> Vec<SettingField> {
        Vec::new()
    }

    /// Setting keys that must be stored encrypted
    fn encrypted_settings(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Load configuration. Missing required settings are configuration errors.
    fn init(&mut self, _settings: &dyn SettingsStore) -> CheckoutResult<()> {
        Ok(())
    }

    /// Check the data submitted with the checkout form
    fn validate(&self, _data: &PaymentData) -> CheckoutResult<()> {
        Ok(())
    }

    /// Charge the cart or ask for a redirect.
    ///
    /// Transport and API failures end in [`PaymentResult::fail`], never in
    /// a panic or an error.
    async fn process(&self, ctx: &PaymentContext, result: PaymentResult) -> PaymentResult;

    /// Completion step for providers that redirect off-site
    fn off_site(&self) -> Option<&dyn OffSiteProvider> {
        None
    }
}

#[async_trait]
pub trait OffSiteProvider: Send + Sync {
    /// Finish a payment after the customer returned from the provider's page
    async fn complete(&self, ctx: &PaymentContext, result: PaymentResult) -> PaymentResult;
}

/// Builds a fresh provider
pub type ProviderFactory = Arc<dyn Fn() -> Box<dyn PaymentProvider> + Send + Sync>;

#[derive(Clone)]
struct RegisteredProvider {
    identifier: &'static str,
    name: &'static str,
    factory: ProviderFactory,
}

/// The providers available to this shop
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// Register a factory. A second provider with the same identifier is
    /// rejected.
    pub fn register(&mut self, factory: ProviderFactory) -> CheckoutResult<()> {
        let sample = factory();
        let identifier = sample.identifier();
        if self.contains(identifier) {
            return Err(CheckoutError::Configuration(format!(
                "Payment provider '{}' is registered twice",
                identifier
            )));
        }
        debug!(provider = identifier, "Payment provider registered");
        self.providers.push(RegisteredProvider {
            identifier,
            name: sample.name(),
            factory,
        });
        Ok(())
    }

    /// Fresh instance of a registered provider
    pub fn create(&self, identifier: &str) -> CheckoutResult<Box<dyn PaymentProvider>> {
        self.providers
            .iter()
            .find(|p| p.identifier == identifier)
            .map(|p| (p.factory)())
            .ok_or_else(|| {
                CheckoutError::Configuration(format!(
                    "The selected payment provider '{}' is unavailable",
                    identifier
                ))
            })
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.providers.iter().any(|p| p.identifier == identifier)
    }

    /// `(identifier, name)` of every provider, in registration order
    pub fn providers(&self) -> Vec<(&'static str, &'static str)> {
        self.providers.iter().map(|p| (p.identifier, p.name)).collect()
    }

    /// Setting descriptors of every provider
    pub fn settings(&self) -> Vec<(&'static str, Vec<SettingField>)> {
        self.providers
            .iter()
            .map(|p| (p.identifier, (p.factory)().settings()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[derive(Default)]
pub struct ProviderRegistryBuilder {
    factories: Vec<ProviderFactory>,
}

impl ProviderRegistryBuilder {
    /// Register a provider built with `Default`
    pub fn provider<P>(self) -> Self
    where
        P: PaymentProvider + Default + 'static,
    {
        self.factory(|| Box::new(P::default()) as Box<dyn PaymentProvider>)
    }

    /// Register a provider built by a closure
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn PaymentProvider> + Send + Sync + 'static,
    {
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn build(self) -> CheckoutResult<ProviderRegistry> {
        let mut registry = ProviderRegistry::default();
        for factory in self.factories {
            registry.register(factory)?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Cash;

    #[async_trait]
    impl PaymentProvider for Cash {
        fn identifier(&self) -> &'static str {
            "cash"
        }

        fn name(&self) -> &'static str {
            "Cash"
        }

        fn settings(&self) -> Vec<SettingField> {
            vec![SettingField::text("cash_note", "Note")]
        }

        async fn process(&self, _ctx: &PaymentContext, result: PaymentResult) -> PaymentResult {
            result.pending().await
        }
    }

    #[test]
    fn test_registry_builder() {
        let registry = ProviderRegistry::builder().provider::<Cash>().build().unwrap();

        assert_eq!(registry.providers(), vec![("cash", "Cash")]);
        assert_eq!(registry.settings()[0].1[0].key, "cash_note");
        assert!(registry.create("cash").is_ok());
        assert!(registry.create("cash").unwrap().off_site().is_none());
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let result = ProviderRegistry::builder()
            .provider::<Cash>()
            .provider::<Cash>()
            .build();

        assert!(matches!(result, Err(CheckoutError::Configuration(_))));
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::default();
        assert!(matches!(
            registry.create("paypal"),
            Err(CheckoutError::Configuration(_))
        ));
    }
}
