// src/handlers/auth.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use serde_json::json;
use url::Url;
use validator::Validate;

use crate::{
    config::{Config, RESET_TOKEN_MINUTES},
    error::AppError,
    extract::{AppJson, AppPath},
    handlers::current_user,
    models::user::{
        AuthResponse, ForgotPasswordRequest, LoginRequest, PublicUser, RefreshRequest,
        RegisterRequest, ResetPasswordRequest, User, normalize_email,
    },
    providers::Mailer,
    state::Store,
    store::{self, StoreError},
    utils::{
        hash::{hash_password, one_time_token, token_digest, verify_password},
        jwt::{Claims, TokenKind, TokenPair, issue_tokens, verify_jwt},
    },
};

fn auth_response(user: &User, tokens: TokenPair) -> AuthResponse {
    AuthResponse {
        id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        subscription: user.subscription,
        role: user.role,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }
}

/// Builds `<FRONTEND_URL>/<segments...>`.
fn frontend_link(base: &str, segments: &[&str]) -> Result<String, AppError> {
    let mut url = Url::parse(base)
        .map_err(|e| AppError::InternalServerError(format!("Invalid FRONTEND_URL: {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| AppError::InternalServerError("FRONTEND_URL cannot be a base".to_string()))?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url.to_string())
}

async fn find_by_email(store: &Store, email: &str) -> Result<Option<store::Versioned<User>>, AppError> {
    Ok(store::find_one::<User>(store.as_ref(), &json!({ "email": normalize_email(email) })).await?)
}

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it and emails a
/// verification link. A failed email does not fail the registration.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    State(store): State<Store>,
    State(config): State<Config>,
    State(mailer): State<Arc<dyn Mailer>>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if find_by_email(&store, &payload.email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;
    let mut user = User::new(payload.name.trim().to_string(), &payload.email, Some(hashed_password));
    let (token, digest) = one_time_token();
    user.verification_token = Some(digest);

    store::create(store.as_ref(), &user).await.map_err(|e| match e {
        StoreError::Duplicate { .. } => AppError::Conflict("User already exists".to_string()),
        other => {
            tracing::error!("Failed to register user: {}", other);
            AppError::from(other)
        }
    })?;

    tracing::info!("Registered user {}", user.id);

    let link = frontend_link(&config.frontend_url, &["verify-email", token.as_str()])?;
    let html = format!(
        "<h1>Welcome to ExamRedi, {}!</h1>\
         <p>Please confirm your email address by opening the link below:</p>\
         <a href=\"{link}\">{link}</a>",
        crate::utils::html::escape(&user.name)
    );
    if let Err(e) = mailer.send(&user.email, "Verify your ExamRedi account", &html).await {
        tracing::warn!("Verification email to {} failed: {}", user.email, e);
    }

    let tokens = issue_tokens(&user.id, user.role, &config)?;
    Ok((StatusCode::CREATED, Json(auth_response(&user, tokens))))
}

/// Authenticates a user and returns an access/refresh token pair.
///
/// Unknown email, wrong password and password-less (Google) accounts all
/// get the same answer.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(store): State<Store>,
    State(config): State<Config>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let invalid = || AppError::BadRequest("Invalid credentials".to_string());

    let user = find_by_email(&store, &payload.email).await?.ok_or_else(invalid)?.doc;
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;

    if !verify_password(&payload.password, hash)? {
        return Err(invalid());
    }

    let tokens = issue_tokens(&user.id, user.role, &config)?;
    Ok(Json(auth_response(&user, tokens)))
}

/// Exchanges a refresh token for a new pair. The refresh token is rotated.
pub async fn refresh(
    State(store): State<Store>,
    State(config): State<Config>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = payload
        .token
        .filter(|t| !t.is_empty())
        .ok_or(AppError::AuthError("No refresh token provided".to_string()))?;

    let claims = verify_jwt(&token, &config.jwt_secret)
        .map_err(|_| AppError::Forbidden("Invalid or expired refresh token".to_string()))?;
    if claims.kind != TokenKind::Refresh {
        return Err(AppError::Forbidden("Invalid or expired refresh token".to_string()));
    }

    let user = store::load::<User>(store.as_ref(), claims.user_id())
        .await?
        .ok_or(AppError::Forbidden("Invalid token: User not found".to_string()))?
        .doc;

    Ok(Json(issue_tokens(&user.id, user.role, &config)?))
}

/// Tokens are stateless; the client forgets them.
pub async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn profile(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(store.as_ref(), claims.user_id()).await?.doc;
    Ok(Json(PublicUser::from(user)))
}

/// Emails a password reset link valid for a few minutes.
pub async fn forgot_password(
    State(store): State<Store>,
    State(config): State<Config>,
    State(mailer): State<Arc<dyn Mailer>>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = find_by_email(&store, &payload.email)
        .await?
        .ok_or(AppError::NotFound("There is no user with that email".to_string()))?
        .doc;

    let (token, digest) = one_time_token();
    let expires = Utc::now() + Duration::minutes(RESET_TOKEN_MINUTES);
    store::modify::<User, _, _>(store.as_ref(), &user.id, |u| {
        u.reset_password_token = Some(digest.clone());
        u.reset_password_expire = Some(expires);
        Ok(())
    })
    .await?;

    let link = frontend_link(&config.frontend_url, &["reset-password", token.as_str()])?;
    let html = format!(
        "<h1>Password reset</h1>\
         <p>You requested a password reset. Open the link below within {RESET_TOKEN_MINUTES} minutes:</p>\
         <a href=\"{link}\">{link}</a>\
         <p>If you did not request this, ignore this email.</p>"
    );

    if let Err(e) = mailer.send(&user.email, "Password Reset Request", &html).await {
        tracing::error!("Reset email to {} failed: {}", user.email, e);
        store::modify::<User, _, _>(store.as_ref(), &user.id, |u| {
            u.reset_password_token = None;
            u.reset_password_expire = None;
            Ok(())
        })
        .await?;
        return Err(AppError::Upstream("Email could not be sent".to_string()));
    }

    Ok(Json(json!({ "message": "Email sent" })))
}

/// Sets a new password from a reset link and logs the user in.
pub async fn reset_password(
    State(store): State<Store>,
    State(config): State<Config>,
    AppPath(token): AppPath<String>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let invalid = || AppError::BadRequest("Invalid or expired token".to_string());
    let digest = token_digest(&token);

    let found = store::find_one::<User>(store.as_ref(), &json!({ "resetPasswordToken": digest }))
        .await?
        .ok_or_else(invalid)?;
    let still_valid = found
        .doc
        .reset_password_expire
        .is_some_and(|expires| expires > Utc::now());
    if !still_valid {
        return Err(invalid());
    }

    let hashed_password = hash_password(&payload.password)?;
    let (user, ()) = store::modify::<User, _, _>(store.as_ref(), &found.id, |u| {
        if u.reset_password_token.as_deref() != Some(digest.as_str()) {
            return Err(invalid());
        }
        u.password_hash = Some(hashed_password.clone());
        u.reset_password_token = None;
        u.reset_password_expire = None;
        Ok(())
    })
    .await?;

    let tokens = issue_tokens(&user.id, user.role, &config)?;
    Ok(Json(auth_response(&user, tokens)))
}

pub async fn verify_email(
    State(store): State<Store>,
    AppPath(token): AppPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let digest = token_digest(&token);
    let found = store::find_one::<User>(store.as_ref(), &json!({ "verificationToken": digest }))
        .await?
        .ok_or(AppError::BadRequest("Invalid verification token".to_string()))?;

    store::modify::<User, _, _>(store.as_ref(), &found.id, |u| {
        u.is_verified = true;
        u.verification_token = None;
        Ok(())
    })
    .await?;

    Ok(Json(json!({ "message": "Email verified successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_links_append_segments() {
        assert_eq!(
            frontend_link("http://localhost:5173", &["reset-password", "abc"]).unwrap(),
            "http://localhost:5173/reset-password/abc"
        );
        assert_eq!(
            frontend_link("https://examredi.com/app/", &["verify-email", "t1"]).unwrap(),
            "https://examredi.com/app/verify-email/t1"
        );
    }
}
