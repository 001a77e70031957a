//! # Payment Orchestration
//!
//! ```text
//!  PaymentService ──► PaymentGateway ──► PaymentProvider ──► PaymentResult
//!        │                                                        │
//!        └────────────────────► PaymentRedirector ◄───────────────┘
//! ```

pub mod gateway;
pub mod provider;
pub mod redirector;
pub mod result;
pub mod service;
pub mod urls;

pub use gateway::{DefaultPaymentGateway, PaymentGateway};
pub use provider::{
    OffSiteProvider, PaymentContext, PaymentProvider, ProviderFactory, ProviderRegistry,
    ProviderRegistryBuilder,
};
pub use redirector::{
    CheckoutListener, CheckoutOutcome, LoggingCheckoutListener, PaymentRedirector, Redirect,
    ReturnType,
};
pub use result::PaymentResult;
pub use service::PaymentService;
pub use urls::CallbackUrls;
