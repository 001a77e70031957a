//! # checkout-api
//!
//! HTTP layer for checkout-rs.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - The browser checkout flow: form submit, provider return, result page
//! - A small JSON API for the cart
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/checkout` | Submit the checkout form (303 redirect) |
//! | GET | `/checkout/return` | Return from a payment page |
//! | GET | `/checkout/result` | Result page |
//! | GET | `/api/v1/cart` | Cart with totals |
//! | POST | `/api/v1/cart/items` | Add an item |
//! | PUT | `/api/v1/cart/items/{id}` | Change an item's quantity |
//! | DELETE | `/api/v1/cart/items/{id}` | Remove an item |
//! | PUT | `/api/v1/cart/payment-method` | Select a payment method |
//! | GET | `/api/v1/payment-methods` | Selectable payment methods |

pub mod handlers;
pub mod routes;
pub mod session;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
