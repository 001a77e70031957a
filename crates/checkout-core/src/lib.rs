//! # checkout-core
//!
//! Cart totals and payment orchestration for checkout-rs.
//!
//! This crate provides:
//! - `Cart`, `CartItem`, `Tax` and `PaymentMethod`, the priced data model
//! - `Totals`, computed on demand from a cart
//! - `PaymentProvider` trait and `ProviderRegistry` for payment integrations
//! - `PaymentGateway`, `PaymentService` and `PaymentRedirector` for the
//!   checkout flow, including off-site redirects
//! - `SessionStore`, `CartRepository` and `PaymentLogStore` seams
//! - `CheckoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkout_core::*;
//!
//! let registry = Arc::new(ProviderRegistry::builder().provider::<Offline>().build()?);
//!
//! let mut gateway = DefaultPaymentGateway::new(registry, settings, session.clone(), stores.clone(), return_url);
//! gateway.init(&method, form.payment_data())?;
//!
//! let redirect = PaymentService::new(gateway, session, stores)
//!     .checkout(cart, &redirector)
//!     .await?;
//!
//! // Send the browser to redirect.location
//! ```

pub mod cart;
pub mod catalog;
pub mod currency;
pub mod error;
pub mod form;
pub mod item;
pub mod log;
pub mod payment;
pub mod payment_method;
pub mod session;
pub mod settings;
pub mod state;
pub mod store;
pub mod tax;
pub mod totals;

// Re-exports for convenience
pub use cart::{Address, Cart, Customer};
pub use catalog::{CatalogFile, MemoryCatalog, PaymentMethodEntry};
pub use currency::{format_money, Currency, DefaultMoneyFormatter, MoneyFormatter};
pub use error::{CheckoutError, CheckoutResult, FieldErrors};
pub use form::{CheckoutForm, PaymentData};
pub use item::{CartItem, ItemKind};
pub use log::{PaymentLog, ProviderResponse};
pub use payment::{
    CallbackUrls, CheckoutListener, CheckoutOutcome, DefaultPaymentGateway,
    LoggingCheckoutListener, OffSiteProvider, PaymentContext, PaymentGateway, PaymentProvider,
    PaymentRedirector, PaymentResult, PaymentService, ProviderFactory, ProviderRegistry,
    Redirect, ReturnType,
};
pub use payment_method::PaymentMethod;
pub use session::{
    CheckoutLock, CheckoutSession, MemorySessionStore, PersistedCheckout, SessionKey, SessionStore,
};
pub use settings::{EnvSettings, MemorySettings, SettingField, SettingKind, SettingsStore};
pub use state::PaymentState;
pub use store::{
    CartRepository, MemoryCartStore, MemoryPaymentLogStore, PaymentLogStore, Stores,
};
pub use tax::Tax;
pub use totals::{Subtotal, Totals};
