// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError, models::user::Role};

/// Distinguishes short-lived access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID.
    pub sub: String,
    /// User's role at signing time.
    pub role: Role,
    pub kind: TokenKind,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

/// Claims of the caller on routes where authentication is optional.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Claims>);

/// Access and refresh token pair handed out on login, registration and refresh.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs a new JWT for the user.
pub fn sign_jwt(
    id: &str,
    role: Role,
    kind: TokenKind,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_owned(),
        role,
        kind,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Signs a fresh access/refresh pair.
pub fn issue_tokens(id: &str, role: Role, config: &Config) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access_token: sign_jwt(id, role, TokenKind::Access, &config.jwt_secret, config.jwt_expiration)?,
        refresh_token: sign_jwt(
            id,
            role,
            TokenKind::Refresh,
            &config.jwt_secret,
            config.refresh_expiration,
        )?,
    })
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Not authorized, token failed".to_string()))?;

    Ok(token_data.claims)
}

fn bearer(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Axum Middleware: Authentication.
///
/// Intercepts requests, validates the 'Authorization: Bearer <token>' header.
/// If valid, injects `Claims` into the request extensions for handlers to use.
/// Refresh tokens are not accepted here.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer(&req).ok_or(AppError::AuthError("Not authorized, no token".to_string()))?;

    let claims = verify_jwt(token, &config.jwt_secret)?;
    if claims.kind != TokenKind::Access {
        return Err(AppError::AuthError("Not authorized, token failed".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Axum Middleware: Optional authentication.
///
/// Always injects a `Viewer`; it holds claims only when a valid access token was sent.
pub async fn optional_auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let claims = bearer(&req)
        .and_then(|token| verify_jwt(token, &config.jwt_secret).ok())
        .filter(|claims| claims.kind == TokenKind::Access);

    req.extensions_mut().insert(Viewer(claims));
    next.run(req).await
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Checks if the injected `Claims` has the admin role.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(AppError::AuthError("Not authorized".to_string()))?;

    if claims.role != Role::Admin {
        return Err(AppError::Forbidden("Not authorized as an admin".to_string()));
    }

    Ok(next.run(req).await)
}
