//! # Storage
//!
//! Persistence seams for carts and payment logs. The in-memory
//! implementations back tests and the development server.

use crate::cart::Cart;
use crate::error::{CheckoutError, CheckoutResult};
use crate::log::PaymentLog;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find(&self, id: Uuid) -> CheckoutResult<Option<Cart>>;

    async fn save(&self, cart: &Cart) -> CheckoutResult<()>;

    /// Most recent cart of a session that has not been paid for
    async fn find_open_by_session(&self, session_id: &str) -> CheckoutResult<Option<Cart>>;

    async fn load(&self, id: Uuid) -> CheckoutResult<Cart> {
        self.find(id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("cart", id))
    }
}

#[async_trait]
pub trait PaymentLogStore: Send + Sync {
    /// Store a log and return its id
    async fn insert(&self, log: PaymentLog) -> CheckoutResult<Uuid>;

    async fn get(&self, id: Uuid) -> CheckoutResult<Option<PaymentLog>>;

    /// Logs of one cart, oldest first
    async fn for_cart(&self, cart_id: Uuid) -> CheckoutResult<Vec<PaymentLog>>;
}

/// The stores a payment attempt writes to
#[derive(Clone)]
pub struct Stores {
    pub carts: Arc<dyn CartRepository>,
    pub logs: Arc<dyn PaymentLogStore>,
}

impl Stores {
    pub fn new(carts: Arc<dyn CartRepository>, logs: Arc<dyn PaymentLogStore>) -> Self {
        Self { carts, logs }
    }

    /// Fresh in-memory stores
    pub fn memory() -> Self {
        Self::new(
            Arc::new(MemoryCartStore::new()),
            Arc::new(MemoryPaymentLogStore::new()),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCartStore {
    carts: Arc<RwLock<HashMap<Uuid, Cart>>>,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.carts.read().await.len()
    }
}

#[async_trait]
impl CartRepository for MemoryCartStore {
    async fn find(&self, id: Uuid) -> CheckoutResult<Option<Cart>> {
        Ok(self.carts.read().await.get(&id).cloned())
    }

    async fn save(&self, cart: &Cart) -> CheckoutResult<()> {
        self.carts.write().await.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn find_open_by_session(&self, session_id: &str) -> CheckoutResult<Option<Cart>> {
        let carts = self.carts.read().await;
        Ok(carts
            .values()
            .filter(|c| c.session_id == session_id && !c.is_closed())
            .max_by_key(|c| c.updated_at)
            .cloned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPaymentLogStore {
    logs: Arc<RwLock<Vec<PaymentLog>>>,
}

impl MemoryPaymentLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<PaymentLog> {
        self.logs.read().await.clone()
    }
}

#[async_trait]
impl PaymentLogStore for MemoryPaymentLogStore {
    async fn insert(&self, log: PaymentLog) -> CheckoutResult<Uuid> {
        let id = log.id;
        self.logs.write().await.push(log);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> CheckoutResult<Option<PaymentLog>> {
        Ok(self.logs.read().await.iter().find(|l| l.id == id).cloned())
    }

    async fn for_cart(&self, cart_id: Uuid) -> CheckoutResult<Vec<PaymentLog>> {
        Ok(self
            .logs
            .read()
            .await
            .iter()
            .filter(|l| l.cart_id == cart_id)
            .cloned()
            .collect())
    }
}
