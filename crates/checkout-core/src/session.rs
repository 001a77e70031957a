//! # Session State
//!
//! The redirect flow suspends a checkout on one request and resumes it on a
//! later, unrelated one. Everything needed to resume lives in the user's
//! session, accessed through [`SessionStore`].
//!
//! Values written for the resume step are read with `pull` (read and
//! delete) so a return URL cannot be replayed.

use crate::error::{CheckoutError, CheckoutResult};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Well-known session keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Set while a checkout is running for this session
    CheckoutLocked,
    /// Cart id shown on the result page
    ProcessingCartId,
    /// Token of the current payment attempt
    PaymentId,
    /// Identifier of the provider that must complete an off-site payment
    PaymentCallback,
    /// Cart being paid, reloaded after an off-site return
    PaymentCart,
    /// Submitted checkout data (JSON)
    PaymentData,
    /// Anonymous cart session identifier
    CartSessionId,
    /// Keys of the provider values written for the current attempt
    ProviderKeys,
}

impl SessionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::CheckoutLocked => "checkout.locked",
            SessionKey::ProcessingCartId => "processing_cart.id",
            SessionKey::PaymentId => "payment.id",
            SessionKey::PaymentCallback => "payment.callback",
            SessionKey::PaymentCart => "payment.cart",
            SessionKey::PaymentData => "payment.data",
            SessionKey::CartSessionId => "cart_session_id",
            SessionKey::ProviderKeys => "payment.provider_keys",
        }
    }
}

/// Key-value storage scoped to one user session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, value: String);

    fn forget(&self, key: &str);

    /// Read and delete
    fn pull(&self, key: &str) -> Option<String> {
        let value = self.get(key);
        self.forget(key);
        value
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Store `value` only if `key` is absent. Returns whether it was stored.
    fn put_if_absent(&self, key: &str, value: String) -> bool {
        if self.has(key) {
            return false;
        }
        self.put(key, value);
        true
    }
}

/// In-memory session, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    values: Arc<DashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.value().clone())
    }

    fn put(&self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    fn forget(&self, key: &str) {
        self.values.remove(key);
    }

    fn pull(&self, key: &str) -> Option<String> {
        self.values.remove(key).map(|(_, v)| v)
    }

    fn put_if_absent(&self, key: &str, value: String) -> bool {
        match self.values.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }
}

/// What a suspended checkout left behind for the return request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistedCheckout {
    pub attempt_token: Option<String>,
    pub cart_id: Option<Uuid>,
    pub callback_provider_id: Option<String>,
    /// Provider-owned values, e.g. `stripe_checkout.session_id`
    pub provider_data: BTreeMap<String, String>,
}

/// Typed access to the checkout keys of a session
#[derive(Clone)]
pub struct CheckoutSession {
    store: Arc<dyn SessionStore>,
}

impl CheckoutSession {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Take the per-session checkout lock.
    ///
    /// Fails with [`CheckoutError::Concurrency`] if another checkout holds it.
    /// The lock is released when the returned guard is dropped.
    pub fn lock(&self) -> CheckoutResult<CheckoutLock> {
        let key = SessionKey::CheckoutLocked.as_str();
        if !self.store.put_if_absent(key, "1".to_string()) {
            return Err(CheckoutError::Concurrency(
                "A checkout is already in progress".to_string(),
            ));
        }
        debug!("Checkout lock acquired");
        Ok(CheckoutLock {
            store: Arc::clone(&self.store),
        })
    }

    pub fn is_locked(&self) -> bool {
        self.store.has(SessionKey::CheckoutLocked.as_str())
    }

    /// Start a new payment attempt and return its token
    pub fn begin_attempt(&self) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.store.put(SessionKey::PaymentId.as_str(), token.clone());
        token
    }

    pub fn attempt_token(&self) -> Option<String> {
        self.store.get(SessionKey::PaymentId.as_str())
    }

    pub fn pull_attempt_token(&self) -> Option<String> {
        self.store.pull(SessionKey::PaymentId.as_str())
    }

    pub fn set_processing_cart(&self, cart_id: Uuid) {
        self.store
            .put(SessionKey::ProcessingCartId.as_str(), cart_id.to_string());
    }

    pub fn pull_processing_cart(&self) -> Option<Uuid> {
        self.pull_uuid(SessionKey::ProcessingCartId)
    }

    pub fn set_payment_cart(&self, cart_id: Uuid) {
        self.store.put(SessionKey::PaymentCart.as_str(), cart_id.to_string());
    }

    pub fn pull_payment_cart(&self) -> Option<Uuid> {
        self.pull_uuid(SessionKey::PaymentCart)
    }

    pub fn set_payment_data(&self, data: &serde_json::Value) {
        self.store.put(SessionKey::PaymentData.as_str(), data.to_string());
    }

    pub fn pull_payment_data(&self) -> Option<serde_json::Value> {
        self.store
            .pull(SessionKey::PaymentData.as_str())
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Remember which provider has to complete the payment after the redirect
    pub fn set_callback(&self, provider_id: &str) {
        self.store
            .put(SessionKey::PaymentCallback.as_str(), provider_id.to_string());
    }

    pub fn pull_callback(&self) -> Option<String> {
        self.store.pull(SessionKey::PaymentCallback.as_str())
    }

    pub fn forget_callback(&self) {
        self.store.forget(SessionKey::PaymentCallback.as_str());
    }

    /// Provider-owned transient value, keyed `<provider>.<name>`
    /// (e.g. `stripe_checkout.session_id`)
    pub fn put_provider_value(&self, key: &str, value: impl Into<String>) {
        self.store.put(key, value.into());

        let mut keys = self.provider_keys();
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
            self.set_provider_keys(&keys);
        }
    }

    pub fn pull_provider_value(&self, key: &str) -> Option<String> {
        let keys: Vec<String> = self
            .provider_keys()
            .into_iter()
            .filter(|k| k != key)
            .collect();
        self.set_provider_keys(&keys);
        self.store.pull(key)
    }

    /// Drop everything a suspended checkout left for the return request.
    /// The processing cart id stays, the result page still needs it.
    pub fn clear_resume_state(&self) {
        for key in [
            SessionKey::PaymentId,
            SessionKey::PaymentCallback,
            SessionKey::PaymentCart,
            SessionKey::PaymentData,
        ] {
            self.store.forget(key.as_str());
        }
        for key in self.provider_keys() {
            self.store.forget(&key);
        }
        self.store.forget(SessionKey::ProviderKeys.as_str());
    }

    fn provider_keys(&self) -> Vec<String> {
        self.store
            .get(SessionKey::ProviderKeys.as_str())
            .map(|raw| {
                raw.split(',')
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set_provider_keys(&self, keys: &[String]) {
        if keys.is_empty() {
            self.store.forget(SessionKey::ProviderKeys.as_str());
        } else {
            self.store
                .put(SessionKey::ProviderKeys.as_str(), keys.join(","));
        }
    }

    pub fn cart_session_id(&self) -> Option<String> {
        self.store.get(SessionKey::CartSessionId.as_str())
    }

    /// Replace the anonymous cart session id, detaching the paid cart
    pub fn rotate_cart_session_id(&self) -> String {
        let id = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        self.store.put(SessionKey::CartSessionId.as_str(), id.clone());
        id
    }

    /// Non-destructive view of the resume state
    pub fn persisted(&self) -> PersistedCheckout {
        PersistedCheckout {
            attempt_token: self.attempt_token(),
            cart_id: self
                .store
                .get(SessionKey::PaymentCart.as_str())
                .and_then(|raw| raw.parse().ok()),
            callback_provider_id: self.store.get(SessionKey::PaymentCallback.as_str()),
            provider_data: self
                .provider_keys()
                .into_iter()
                .filter_map(|key| self.store.get(&key).map(|value| (key, value)))
                .collect(),
        }
    }

    fn pull_uuid(&self, key: SessionKey) -> Option<Uuid> {
        self.store
            .pull(key.as_str())
            .and_then(|raw| raw.parse().ok())
    }
}

/// Held while a checkout runs; dropping it releases the session lock on
/// every exit path, unwinding included.
pub struct CheckoutLock {
    store: Arc<dyn SessionStore>,
}

impl Drop for CheckoutLock {
    fn drop(&mut self) {
        self.store.forget(SessionKey::CheckoutLocked.as_str());
        debug!("Checkout lock released");
    }
}
