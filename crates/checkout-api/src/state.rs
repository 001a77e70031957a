//! # Application State
//!
//! Shared state for the Axum application: configuration, the provider
//! registry, stores, the shop catalog and one session store per browser.
//!
//! Browser sessions are created only when a request writes to them and are
//! evicted after `SESSION_IDLE_MINUTES` without a request.

use anyhow::Context;
use checkout_core::{
    Cart, CheckoutResult, CheckoutSession, Currency, EnvSettings,
    LoggingCheckoutListener, MemoryCatalog, MemorySessionStore, PaymentRedirector,
    ProviderRegistry, SettingsStore, Stores,
};
use checkout_providers::{default_registry, HttpClient};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_CATALOG_PATH: &str = "config/checkout.toml";

/// Default idle time before a browser session is dropped
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(2 * 60 * 60);

/// How often idle sessions are swept
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, used for provider return URLs
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Catalog file (currency, taxes, payment methods)
    pub catalog_path: String,
    /// Sessions without a request for this long are evicted
    pub session_idle: Duration,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            catalog_path: std::env::var("CHECKOUT_CONFIG")
                .unwrap_or_else(|_| DEFAULT_CATALOG_PATH.to_string()),
            session_idle: std::env::var("SESSION_IDLE_MINUTES")
                .ok()
                .and_then(|m| m.parse::<u64>().ok())
                .map(|m| Duration::from_secs(m * 60))
                .unwrap_or(DEFAULT_SESSION_IDLE),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Where providers send the customer back to
    pub fn return_endpoint(&self) -> anyhow::Result<Url> {
        self.url("/checkout/return")
    }

    /// Where every checkout ends
    pub fn result_page(&self) -> anyhow::Result<Url> {
        self.url("/checkout/result")
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        let base = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        Url::parse(&base).with_context(|| format!("Invalid BASE_URL {}", self.base_url))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Session values of one browser and when it was last seen
#[derive(Debug, Clone)]
pub struct SessionSlot {
    store: MemorySessionStore,
    last_seen: Instant,
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self {
            store: MemorySessionStore::new(),
            last_seen: Instant::now(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Available payment providers
    pub registry: Arc<ProviderRegistry>,
    /// Provider secrets
    pub settings: Arc<dyn SettingsStore>,
    /// Carts and payment logs
    pub stores: Stores,
    /// Currency, taxes and payment methods
    pub catalog: MemoryCatalog,
    /// Session values, keyed by the `checkout_session` cookie
    pub sessions: Arc<DashMap<String, SessionSlot>>,
    return_endpoint: Url,
    result_page: Url,
}

impl AppState {
    /// Build the state from the environment and the catalog file
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let catalog = load_catalog(&config.catalog_path)?;
        let registry = default_registry(HttpClient::new())?;

        Self::with_parts(
            config,
            registry,
            Arc::new(EnvSettings::load()),
            Stores::memory(),
            catalog,
        )
    }

    pub fn with_parts(
        config: AppConfig,
        registry: ProviderRegistry,
        settings: Arc<dyn SettingsStore>,
        stores: Stores,
        catalog: MemoryCatalog,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            return_endpoint: config.return_endpoint()?,
            result_page: config.result_page()?,
            config,
            registry: Arc::new(registry),
            settings,
            stores,
            catalog,
            sessions: Arc::new(DashMap::new()),
        })
    }

    pub fn return_endpoint(&self) -> &Url {
        &self.return_endpoint
    }

    pub fn result_page(&self) -> &Url {
        &self.result_page
    }

    /// Checkout session of a browser, created on first use
    pub fn session(&self, session_id: &str) -> CheckoutSession {
        let mut slot = self.sessions.entry(session_id.to_string()).or_default();
        slot.last_seen = Instant::now();
        CheckoutSession::new(Arc::new(slot.store.clone()))
    }

    /// Checkout session of a browser if it has one
    pub fn existing_session(&self, session_id: &str) -> Option<CheckoutSession> {
        let mut slot = self.sessions.get_mut(session_id)?;
        slot.last_seen = Instant::now();
        Some(CheckoutSession::new(Arc::new(slot.store.clone())))
    }

    /// Session for requests that only read. Unknown browsers get a
    /// throwaway session that is never stored.
    pub fn read_session(&self, session_id: &str) -> CheckoutSession {
        self.existing_session(session_id)
            .unwrap_or_else(|| CheckoutSession::new(Arc::new(MemorySessionStore::new())))
    }

    /// Drop sessions idle for longer than `session_idle`. Sessions with a
    /// running checkout are kept. Returns how many were dropped.
    pub fn evict_idle_sessions(&self) -> usize {
        let idle = self.config.session_idle;
        let before = self.sessions.len();
        self.sessions.retain(|_, slot| {
            slot.last_seen.elapsed() < idle
                || CheckoutSession::new(Arc::new(slot.store.clone())).is_locked()
        });
        before.saturating_sub(self.sessions.len())
    }

    /// Sweep idle sessions in the background
    pub fn spawn_session_sweeper(&self) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let evicted = state.evict_idle_sessions();
                if evicted > 0 {
                    debug!(evicted, remaining = state.sessions.len(), "Idle sessions evicted");
                }
            }
        })
    }

    pub fn redirector(&self, session: CheckoutSession) -> PaymentRedirector {
        PaymentRedirector::new(
            session,
            self.registry.clone(),
            self.settings.clone(),
            self.stores.clone(),
            self.result_page.clone(),
            self.return_endpoint.clone(),
        )
        .with_listener(Arc::new(LoggingCheckoutListener))
    }

    /// The open cart of a session; a new, unsaved cart if there is none
    pub async fn open_cart(&self, session: &CheckoutSession) -> CheckoutResult<Cart> {
        let cart_session_id = session
            .cart_session_id()
            .unwrap_or_else(|| session.rotate_cart_session_id());

        if let Some(cart) = self.stores.carts.find_open_by_session(&cart_session_id).await? {
            return Ok(cart);
        }
        Ok(Cart::new(cart_session_id).with_currency(self.catalog.currency().await))
    }
}

/// Load the catalog, falling back to an empty EUR catalog when no file exists
fn load_catalog(path: &str) -> anyhow::Result<MemoryCatalog> {
    let candidates = [path.to_string(), format!("../{}", path), format!("../../{}", path)];

    for candidate in &candidates {
        if std::path::Path::new(candidate).exists() {
            let catalog = MemoryCatalog::from_path(candidate)
                .with_context(|| format!("Failed to load catalog {}", candidate))?;
            info!(path = %candidate, "Catalog loaded");
            return Ok(catalog);
        }
    }

    warn!(path, "No catalog found, using an empty EUR catalog");
    Ok(MemoryCatalog::new(Currency::EUR))
}
