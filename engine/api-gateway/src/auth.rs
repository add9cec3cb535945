//! Bearer token authentication

use account_service::UpsertUser;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use warp::{Filter, Rejection};

use crate::config::AuthConfig;
use crate::error::{reject, GatewayError, GatewayResult};

const BEARER_PREFIX: &str = "Bearer ";

/// JWT claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Expiration time
    pub exp: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

/// Caller identity extracted from a valid token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub claims: Claims,
}

impl AuthenticatedUser {
    /// Profile fields to store on login
    pub fn profile(&self) -> UpsertUser {
        UpsertUser {
            id: self.user_id.clone(),
            email: self.claims.email.clone(),
            first_name: self.claims.first_name.clone(),
            last_name: self.claims.last_name.clone(),
            profile_image_url: self.claims.profile_image_url.clone(),
        }
    }
}

/// Validates HS256 bearer tokens against a shared secret
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }

        Self { key: DecodingKey::from_secret(config.jwt_secret.as_bytes()), validation }
    }

    /// Check a token's signature and expiry and return the caller
    pub fn authenticate(&self, token: &str) -> GatewayResult<AuthenticatedUser> {
        let token_data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| GatewayError::Unauthorized(format!("Invalid token: {}", e)))?;

        let claims = token_data.claims;
        if claims.sub.is_empty() {
            return Err(GatewayError::Unauthorized("Token has no subject".to_string()));
        }

        Ok(AuthenticatedUser { user_id: claims.sub.clone(), claims })
    }

    /// Authenticate the value of an `Authorization` header
    pub fn authenticate_header(&self, header: Option<&str>) -> GatewayResult<AuthenticatedUser> {
        let header =
            header.ok_or_else(|| GatewayError::Unauthorized("Missing Authorization header".to_string()))?;
        let token = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or_else(|| GatewayError::Unauthorized("Expected a bearer token".to_string()))?;
        self.authenticate(token.trim())
    }
}

/// Filter that extracts the authenticated caller or rejects with 401
pub fn with_auth(
    validator: Arc<TokenValidator>,
) -> impl Filter<Extract = (AuthenticatedUser,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let validator = validator.clone();
        async move {
            validator.authenticate_header(header.as_deref()).map_err(|e| {
                debug!("Rejected request: {}", e);
                reject(e)
            })
        }
    })
}
