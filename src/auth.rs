use std::sync::Arc;

use acas_core::{Role, User};
use axum::{
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use crate::{
    config::{AuthConfig, ConfigError},
    error::{LedgerError, LedgerResult},
    services::SystemAdmin,
};

/// Authenticated caller identity, available to handlers via request extensions.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub name: String,
    pub role: Role,
}

impl CallerIdentity {
    pub fn require(&self, role: Role) -> LedgerResult<()> {
        if self.role < role {
            tracing::warn!(caller = %self.name, role = %self.role, required = %role, "Insufficient role");
            return Err(LedgerError::Forbidden(format!("{} role required", role)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 bearer tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_minutes: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_minutes,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_minutes * 60
    }

    pub fn issue(&self, user: &User) -> LedgerResult<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: user.username.clone(),
            role: user.role,
            iat: now,
            exp: now + self.ttl_seconds(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| LedgerError::Unauthorized(format!("cannot issue token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> LedgerResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| LedgerError::Unauthorized(format!("invalid token: {}", e)))
    }
}

struct ApiKey {
    name: String,
    key: String,
    role: Role,
}

/// Everything the auth middleware needs, shared across requests.
pub struct AuthState {
    enabled: bool,
    api_keys: Vec<ApiKey>,
    pub tokens: TokenIssuer,
    system: Arc<SystemAdmin>,
}

impl AuthState {
    pub fn new(config: &AuthConfig, system: Arc<SystemAdmin>) -> Result<Self, ConfigError> {
        let api_keys = config
            .api_keys
            .iter()
            .map(|entry| {
                let role = entry.role.parse::<Role>().map_err(|_| ConfigError::UnknownRole {
                    name: entry.name.clone(),
                    role: entry.role.clone(),
                })?;
                Ok(ApiKey {
                    name: entry.name.clone(),
                    key: entry.key.clone(),
                    role,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            enabled: config.enabled,
            api_keys,
            tokens: TokenIssuer::new(&config.jwt_secret, config.token_ttl_minutes),
            system,
        })
    }

    fn api_key(&self, presented: &str) -> Option<CallerIdentity> {
        self.api_keys
            .iter()
            .find(|entry| entry.key.as_bytes().ct_eq(presented.as_bytes()).into())
            .map(|entry| CallerIdentity {
                name: entry.name.clone(),
                role: entry.role,
            })
    }

    /// Resolves an API key or a bearer token. Tokens of users that have
    /// since been deactivated are refused.
    pub fn identify(&self, credential: &str) -> LedgerResult<CallerIdentity> {
        if let Some(caller) = self.api_key(credential) {
            return Ok(caller);
        }
        let claims = self.tokens.verify(credential)?;
        match self.system.get_user(&claims.sub) {
            Ok(user) if user.active => Ok(CallerIdentity {
                name: user.username,
                role: user.role,
            }),
            Ok(_) | Err(LedgerError::NotFound { .. }) => {
                Err(LedgerError::Unauthorized("user is no longer active".to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

pub async fn auth_middleware<B>(
    Extension(auth): Extension<Arc<AuthState>>,
    mut req: Request<B>,
    next: Next<B>,
) -> Response {
    if !auth.enabled {
        req.extensions_mut().insert(CallerIdentity {
            name: "anonymous".to_string(),
            role: Role::Admin,
        });
        return next.run(req).await;
    }

    let credential = req
        .headers()
        .get("X-API-Key")
        .or_else(|| req.headers().get(header::AUTHORIZATION))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).to_string());

    match credential {
        Some(credential) => match auth.identify(&credential) {
            Ok(caller) => {
                tracing::debug!(caller = %caller.name, role = %caller.role, "Authenticated request");
                req.extensions_mut().insert(caller);
                next.run(req).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejected credentials");
                e.into_response()
            }
        },
        None => LedgerError::Unauthorized(
            "missing credentials. Provide X-API-Key or Authorization: Bearer <token>".to_string(),
        )
        .into_response(),
    }
}
