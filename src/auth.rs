//! Session authentication
//!
//! JWT bearer tokens (HS256) carrying the user id, email and role;
//! bcrypt for password storage. Claims validated by the middleware are
//! stashed in request extensions so handlers get an explicit session
//! object instead of ambient auth state.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::entities::user::UserRole;
use crate::domain::errors::DomainError;
use crate::persistence::models::UserRecord;

/// JWT claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub role: UserRole,
    pub exp: usize, // expiration timestamp
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Issues and validates session tokens.
pub struct TokenAuthority {
    secret: String,
    ttl_hours: i64,
}

impl TokenAuthority {
    pub fn new(secret: String, ttl_hours: i64) -> Self {
        Self { secret, ttl_hours }
    }

    /// Generate a session token for a user.
    ///
    /// Returns the encoded token and its lifetime in seconds.
    pub fn issue_token(&self, user: &UserRecord) -> Result<(String, usize), DomainError> {
        let expiration = Utc::now()
            .checked_add_signed(chrono::Duration::hours(self.ttl_hours))
            .ok_or_else(|| DomainError::Upstream("Invalid timestamp".to_string()))?
            .timestamp() as usize;

        let role = UserRole::parse(&user.role).ok_or_else(|| {
            DomainError::Upstream(format!("Unrecognized role on user {}", user.id))
        })?;

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role,
            exp: expiration,
        };

        debug!(
            "Issuing session token for {} ({}), expires in {}h",
            user.email, user.id, self.ttl_hours
        );

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| DomainError::Upstream(format!("Failed to sign token: {}", e)))?;

        Ok((token, (self.ttl_hours * 3600) as usize))
    }

    /// Validate a token and extract its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, DomainError> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| DomainError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(decoded.claims)
    }
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, DomainError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| DomainError::Upstream(format!("Failed to hash password: {}", e)))
}

/// Check a password against its stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, DomainError> {
    bcrypt::verify(password, hash)
        .map_err(|e| DomainError::Upstream(format!("Failed to verify password: {}", e)))
}

/// Middleware requiring a valid bearer token on every request.
pub async fn require_auth(
    State(state): State<crate::application::AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.to_string());

    let token = match token {
        Some(token) => token,
        None => {
            warn!("Missing or malformed Authorization header");
            return Err(unauthorized("Missing authorization token"));
        }
    };

    match state.tokens.validate_token(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(_) => {
            warn!("Rejected invalid session token");
            Err(unauthorized("Invalid or expired token"))
        }
    }
}

/// Middleware for the admin back-office. Runs after `require_auth`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, Response> {
    let is_admin = request
        .extensions()
        .get::<Claims>()
        .map(|c| c.is_admin())
        .unwrap_or(false);

    if !is_admin {
        warn!("Non-admin caller rejected from admin route");
        return Err((
            StatusCode::FORBIDDEN,
            axum::Json(serde_json::json!({ "error": "Administrator access required" })),
        )
            .into_response());
    }

    Ok(next.run(request).await)
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
