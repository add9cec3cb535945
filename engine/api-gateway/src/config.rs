//! Configuration for the ApiGateway

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::{GatewayError, GatewayResult};

/// Main configuration for the ApiGateway
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Authentication configuration
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Largest accepted JSON request body in bytes
    pub max_body_bytes: u64,
}

/// Bearer token validation settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 shared secret
    pub jwt_secret: String,

    /// Required `aud` claim, if any
    pub audience: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 5000, max_body_bytes: 16 * 1024 }
    }
}

impl GatewayConfig {
    /// Get the server address
    pub fn server_addr(&self) -> GatewayResult<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("invalid server address: {}", e)))
    }

    pub fn validate(&self) -> GatewayResult<()> {
        self.server_addr()?;
        if self.auth.jwt_secret.is_empty() {
            return Err(GatewayError::Config("jwt secret must be set".to_string()));
        }
        if self.server.max_body_bytes == 0 {
            return Err(GatewayError::Config("max_body_bytes must be positive".to_string()));
        }
        Ok(())
    }
}
