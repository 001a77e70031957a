//! # Offline Payments
//!
//! Invoice, bank transfer, cash on delivery. Nothing is charged; the cart
//! is marked pending until the shop confirms the payment by hand.

use async_trait::async_trait;
use checkout_core::{PaymentContext, PaymentProvider, PaymentResult};
use tracing::{info, instrument};

#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

#[async_trait]
impl PaymentProvider for Offline {
    fn identifier(&self) -> &'static str {
        "offline"
    }

    fn name(&self) -> &'static str {
        "Offline"
    }

    #[instrument(skip(self, ctx, result), fields(cart_id = %ctx.cart.id))]
    async fn process(&self, ctx: &PaymentContext, result: PaymentResult) -> PaymentResult {
        info!(amount = ctx.amount(), "Awaiting offline payment");
        result.pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;
    use checkout_core::{CartRepository, PaymentState};

    #[tokio::test]
    async fn test_offline_marks_pending() {
        let f = fixture("offline");

        let result = Offline.process(&f.ctx, f.result("offline")).await;

        assert!(result.is_successful());
        assert!(!result.needs_redirect());
        assert_eq!(
            f.carts.load(f.ctx.cart.id).await.unwrap().payment_state,
            Some(PaymentState::Pending)
        );
        assert!(f.logs.all().await.is_empty());
    }
}
