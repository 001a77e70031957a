//! # checkout-providers
//!
//! Payment providers for checkout-rs.
//!
//! | Identifier        | Provider          | Flow                               |
//! |-------------------|-------------------|------------------------------------|
//! | `offline`         | [`Offline`]       | Marks the cart pending             |
//! | `stripe`          | [`Stripe`]        | Card token, charged server side    |
//! | `stripe-checkout` | [`StripeCheckout`]| Hosted page, completed on return   |
//! | `six-saferpay`    | [`SixSaferpay`]   | Payment page, asserted on return   |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkout_providers::{default_registry, HttpClient};
//!
//! // Every provider shares one connection pool
//! let registry = default_registry(HttpClient::new())?;
//!
//! let mut gateway = DefaultPaymentGateway::new(
//!     Arc::new(registry),
//!     Arc::new(EnvSettings::load()),
//!     session,
//!     stores,
//!     return_url,
//! );
//! ```
//!
//! Provider secrets are read through a `SettingsStore` when the provider is
//! initialized, never at registration.

pub mod config;
pub mod http;
pub mod offline;
pub mod saferpay;
pub mod stripe;
pub mod stripe_checkout;

#[cfg(test)]
mod testing;

use checkout_core::{CheckoutResult, PaymentProvider, ProviderRegistry};

// Re-exports
pub use config::StripeConfig;
pub use http::{ApiError, HttpClient};
pub use offline::Offline;
pub use saferpay::SixSaferpay;
pub use stripe::Stripe;
pub use stripe_checkout::StripeCheckout;

/// Registry with every bundled provider
pub fn default_registry(http: HttpClient) -> CheckoutResult<ProviderRegistry> {
    let stripe = http.clone();
    let stripe_checkout = http.clone();

    ProviderRegistry::builder()
        .provider::<Offline>()
        .factory(move || Box::new(Stripe::new(stripe.clone())) as Box<dyn PaymentProvider>)
        .factory(move || {
            Box::new(StripeCheckout::new(stripe_checkout.clone())) as Box<dyn PaymentProvider>
        })
        .factory(move || Box::new(SixSaferpay::new(http.clone())) as Box<dyn PaymentProvider>)
        .build()
}
