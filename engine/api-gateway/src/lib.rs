//! ApiGateway - REST and WebSocket API for Forex Arena
//!
//! This crate exposes the account and market-feed crates over HTTP: JSON
//! endpoints for quotes, plans, tournaments, positions and funded accounts,
//! bearer-token authentication, and a WebSocket that streams instrument
//! snapshots after every simulator tick.

pub mod auth;
pub mod config;
pub mod error;
pub mod rest_api;
pub mod websocket_handler;

pub use auth::{AuthenticatedUser, Claims, TokenValidator};
pub use config::{AuthConfig, GatewayConfig, ServerConfig};
pub use error::{GatewayError, GatewayResult};
pub use rest_api::{create_routes, ApiContext};

/// Version of the ApiGateway
pub const VERSION: &str = "0.1.0";
