//! Shared fixtures for provider tests

use checkout_core::{
    Address, CallbackUrls, Cart, CartItem, CheckoutSession, Currency, MemoryCartStore,
    MemoryPaymentLogStore, MemorySessionStore, PaymentContext, PaymentData, PaymentMethod,
    PaymentResult, Stores,
};
use std::sync::Arc;
use url::Url;

pub struct Fixture {
    pub ctx: PaymentContext,
    pub stores: Stores,
    pub carts: MemoryCartStore,
    pub logs: MemoryPaymentLogStore,
    pub session: CheckoutSession,
}

impl Fixture {
    pub fn result(&self, provider: &str) -> PaymentResult {
        PaymentResult::new(provider, self.ctx.cart.clone(), self.stores.clone())
    }
}

pub fn fixture(provider: &str) -> Fixture {
    fixture_with_data(provider, PaymentData::new())
}

/// Cart of 2 x 25.00 EUR, no taxes and no payment fee
pub fn fixture_with_data(provider: &str, data: PaymentData) -> Fixture {
    let mut cart = Cart::new("sess").with_currency(Currency::EUR);
    cart.add(CartItem::new("Book", 2500).with_description("Paperback"), 2);
    cart.set_payment_method(PaymentMethod::new(1, "Method", provider));
    cart.customer.email = Some("ada@example.com".into());
    cart.customer.shipping = Address {
        company: "Analytical Engines Ltd".into(),
        firstname: "Ada".into(),
        lastname: "Lovelace".into(),
        lines: "Main Street 1\nFloor 2".into(),
        zip: "8000".into(),
        city: "Zurich".into(),
        country: "CH".into(),
    };

    let carts = MemoryCartStore::new();
    let logs = MemoryPaymentLogStore::new();
    let stores = Stores::new(Arc::new(carts.clone()), Arc::new(logs.clone()));
    let session = CheckoutSession::new(Arc::new(MemorySessionStore::new()));
    let token = session.begin_attempt();

    let urls = CallbackUrls::new(
        Url::parse("https://shop.example/checkout/return").unwrap(),
        token,
    );

    Fixture {
        ctx: PaymentContext::new(cart, data, urls, session.clone()),
        stores,
        carts,
        logs,
        session,
    }
}
