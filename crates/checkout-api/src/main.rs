//! # checkout-rs
//!
//! Cart and checkout server.
//!
//! ## Usage
//!
//! ```bash
//! # Provider secrets, only for the providers you use
//! export STRIPE_API_KEY=sk_test_...
//! export STRIPE_CHECKOUT_API_KEY=sk_test_...
//! export SIX_CUSTOMER_ID=... SIX_TERMINAL_ID=... SIX_API_KEY=... SIX_API_SECRET=...
//!
//! # Shop catalog and session lifetime
//! export CHECKOUT_CONFIG=config/checkout.toml
//! export SESSION_IDLE_MINUTES=120
//!
//! # Run the server
//! checkout-rs
//! ```

use checkout_api::{routes, state::AppState};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Currency: {}", state.catalog.currency().await);
    info!(
        "Payment methods: {}",
        state.catalog.payment_methods().await.len()
    );
    info!("Payment providers: {:?}", state.registry.providers());
    info!(
        "Idle sessions expire after {} min",
        state.config.session_idle.as_secs() / 60
    );

    let sweeper = state.spawn_session_sweeper();
    let app = routes::create_router(state);

    info!("checkout-rs starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Cart: GET http://{}/api/v1/cart", addr);
        info!("Checkout: POST http://{}/checkout", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("checkout-rs stopped");
    Ok(())
}

/// Resolves on Ctrl+C; in-flight checkouts finish before the server exits
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

fn print_banner() {
    println!(
        r#"
  checkout-rs
  ━━━━━━━━━━━━━━━━━━━━━━━
  Cart & payment checkout
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
