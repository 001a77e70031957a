//! # Totals
//!
//! All monetary aggregates of a cart, derived from a snapshot of its items
//! and payment method. Computing totals has no side effects.
//!
//! ```text
//!  sub*      = items + discounts
//!  service*  = service fees
//!  cart*     = sub* + service*
//!  payment*  = fee grossed up so the provider's cut still leaves the flat fee
//!  grand*    = cart* + payment*
//! ```

use crate::cart::Cart;
use crate::currency::round_minor;
use crate::item::{CartItem, ItemKind};
use crate::payment_method::PaymentMethod;
use serde::{Deserialize, Serialize};

/// Pre-tax, tax and post-tax amount of one group, in minor units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtotal {
    pub pre_taxes: i64,
    pub taxes: i64,
    pub post_taxes: i64,
}

impl Subtotal {
    fn add_item(&mut self, item: &CartItem) {
        self.pre_taxes += item.subtotal();
        self.taxes += item.tax_amount();
        self.post_taxes += item.total();
    }

    fn plus(self, other: Subtotal) -> Subtotal {
        Subtotal {
            pre_taxes: self.pre_taxes + other.pre_taxes,
            taxes: self.taxes + other.taxes,
            post_taxes: self.post_taxes + other.post_taxes,
        }
    }
}

/// Cart totals, all in minor units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Items and discounts
    pub sub: Subtotal,
    /// Service fees
    pub service: Subtotal,
    /// Items, discounts and service fees
    pub cart: Subtotal,
    /// Payment method fee
    pub payment: Subtotal,
    /// Everything
    pub grand: Subtotal,
}

impl Totals {
    pub fn compute(cart: &Cart) -> Self {
        let mut sub = Subtotal::default();
        let mut service = Subtotal::default();

        for item in &cart.items {
            match item.kind {
                ItemKind::Item | ItemKind::Discount => sub.add_item(item),
                ItemKind::Service => service.add_item(item),
            }
        }

        let cart_totals = sub.plus(service);
        let payment = cart
            .payment_method
            .as_ref()
            .map(|method| payment_fee(cart_totals.pre_taxes, method))
            .unwrap_or_default();

        Totals {
            sub,
            service,
            cart: cart_totals,
            payment,
            grand: cart_totals.plus(payment),
        }
    }

    /// The amount to charge the customer
    pub fn amount_due(&self) -> i64 {
        self.grand.post_taxes
    }
}

/// Fee for `method` on top of `base`.
///
/// The charge is solved so that after the provider keeps its percentage of
/// the whole charge, `base + flat` remains.
pub fn payment_fee(base: i64, method: &PaymentMethod) -> Subtotal {
    let percentage = method.percentage / 100.0;
    let flat = method.price as f64;
    let base = base as f64;

    let charge = (base + flat) / (1.0 - percentage);
    let pre_taxes = round_minor(charge - base);
    let taxes = round_minor(pre_taxes as f64 * (method.tax_percentage() / 100.0));

    Subtotal {
        pre_taxes,
        taxes,
        post_taxes: pre_taxes + taxes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::Tax;

    fn fixture_cart(before_tax: bool) -> Cart {
        let low = Tax::new(1, "10%", 10.0).unwrap().as_default();
        let high = Tax::new(2, "100%", 100.0).unwrap();

        let method = PaymentMethod::new(1, "Test method", "stripe")
            .with_price(30)
            .with_percentage(2.9)
            .with_tax(low.clone());

        let mode = |item: CartItem| if before_tax { item.before_tax() } else { item };

        let mut cart = Cart::new("testing");
        cart.add_many(
            vec![
                mode(CartItem::new("A", 1000)),
                mode(CartItem::new("B", 1000).with_quantity(5)),
                mode(CartItem::new("C", 10000).with_quantity(2).with_tax(high)),
                mode(CartItem::discount("Discount", -10000)),
                mode(CartItem::service("Shipping", 5000)),
                mode(CartItem::service("Handling", 1000)),
            ],
            Some(&low),
        );
        cart.set_payment_method(method);
        cart
    }

    #[test]
    fn test_totals_with_tax_excluded() {
        let totals = fixture_cart(true).totals();

        assert_eq!(totals.sub, Subtotal { pre_taxes: 16000, taxes: 20600, post_taxes: 36600 });
        assert_eq!(totals.service, Subtotal { pre_taxes: 6000, taxes: 600, post_taxes: 6600 });
        assert_eq!(totals.cart, Subtotal { pre_taxes: 22000, taxes: 21200, post_taxes: 43200 });
        assert_eq!(totals.payment, Subtotal { pre_taxes: 688, taxes: 69, post_taxes: 757 });
        assert_eq!(totals.grand, Subtotal { pre_taxes: 22688, taxes: 21269, post_taxes: 43957 });
        assert_eq!(totals.amount_due(), 43957);
    }

    #[test]
    fn test_totals_with_tax_included() {
        let totals = fixture_cart(false).totals();

        assert_eq!(totals.sub, Subtotal { pre_taxes: 16000, taxes: 10546, post_taxes: 16000 });
        assert_eq!(totals.service, Subtotal { pre_taxes: 6000, taxes: 546, post_taxes: 6000 });
        assert_eq!(totals.cart, Subtotal { pre_taxes: 22000, taxes: 11092, post_taxes: 22000 });
        assert_eq!(totals.payment, Subtotal { pre_taxes: 688, taxes: 69, post_taxes: 757 });
        assert_eq!(totals.grand, Subtotal { pre_taxes: 22688, taxes: 11161, post_taxes: 22757 });
    }

    #[test]
    fn test_no_payment_method_means_no_fee() {
        let mut cart = fixture_cart(true);
        cart.payment_method = None;
        let totals = cart.totals();

        assert_eq!(totals.payment, Subtotal::default());
        assert_eq!(totals.grand, totals.cart);
    }

    #[test]
    fn test_compute_is_pure_and_never_stale() {
        let mut cart = fixture_cart(true);
        assert_eq!(cart.totals(), cart.totals());

        let shipping = cart.service_fees().next().unwrap().id;
        cart.set_quantity(shipping, 2).unwrap();
        let totals = cart.totals();

        assert_eq!(totals.service.pre_taxes, 11000);
        assert_eq!(totals.service.taxes, 1100);
        assert_eq!(totals.cart.pre_taxes, 27000);
    }

    #[test]
    fn test_empty_cart_without_method_is_zero() {
        assert_eq!(Cart::new("empty").totals(), Totals::default());
    }
}
