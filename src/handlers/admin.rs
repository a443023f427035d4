// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    extract::{AppJson, AppPath},
    models::{
        guide::{CreateGuideRequest, StudyGuide, UpdateGuideRequest},
        paper::{CreatePaperRequest, Paper, UpdatePaperRequest},
        user::{PublicUser, Role, Subscription, User, normalize_email},
    },
    state::Store,
    store::{self, Collection, StoreError},
    utils::{hash::hash_password, jwt::Claims},
};

/// Document counts for the dashboard.
/// Admin only.
pub async fn stats(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    let users = store.count(Collection::Users).await?;
    let guides = store.count(Collection::Guides).await?;
    let papers = store::find_all::<Paper>(store.as_ref(), &json!({})).await?;
    let questions: usize = papers.iter().map(|p| p.doc.questions.len()).sum();

    Ok(Json(json!({
        "users": users,
        "papers": papers.len(),
        "questions": questions,
        "guides": guides,
    })))
}

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    let users: Vec<PublicUser> = store::find_all::<User>(store.as_ref(), &json!({}))
        .await?
        .into_iter()
        .map(|v| PublicUser::from(v.doc))
        .collect();

    Ok(Json(users))
}

/// DTO for Admin creating a user (can specify role and plan).
#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name length must be between 1 and 100 characters."))]
    pub name: String,
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "Password length must be between 6 and 128 characters."))]
    pub password: String,
    pub role: Option<Role>,
    pub subscription: Option<Subscription>,
}

/// Creates a new user with specific role.
/// Admin only.
pub async fn create_user(
    State(store): State<Store>,
    AppJson(payload): AppJson<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;
    let mut user = User::new(payload.name.trim().to_string(), &payload.email, Some(hashed_password));
    user.role = payload.role.unwrap_or_default();
    user.set_subscription(payload.subscription.unwrap_or_default());
    // Accounts created by an admin skip email verification.
    user.is_verified = true;

    store::create(store.as_ref(), &user).await.map_err(|e| match e {
        StoreError::Duplicate { .. } => {
            AppError::Conflict(format!("User '{}' already exists", user.email))
        }
        other => {
            tracing::error!("Failed to create user: {}", other);
            AppError::from(other)
        }
    })?;

    Ok((StatusCode::CREATED, Json(PublicUser::from(user))))
}

/// DTO for updating a user. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub role: Option<Role>,
    pub subscription: Option<Subscription>,
}

/// Updates user information.
/// Admin only.
pub async fn update_user(
    State(store): State<Store>,
    AppPath(id): AppPath<String>,
    AppJson(payload): AppJson<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (user, ()) = store::modify::<User, _, _>(store.as_ref(), &id, |user| {
        if let Some(name) = &payload.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = &payload.email {
            user.email = normalize_email(email);
        }
        if let Some(role) = payload.role {
            user.role = role;
        }
        if let Some(subscription) = payload.subscription {
            user.set_subscription(subscription);
        }
        Ok(())
    })
    .await?;

    Ok(Json(PublicUser::from(user)))
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<String>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id() {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
    }

    if !store::remove::<User>(store.as_ref(), &id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!("Admin {} deleted user {}", claims.user_id(), id);
    Ok(Json(json!({ "message": "User removed" })))
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub subscription: String,
}

/// Switches a user between free and pro; pro comes with a fresh credit grant.
/// Admin only.
pub async fn update_subscription(
    State(store): State<Store>,
    AppPath(id): AppPath<String>,
    AppJson(payload): AppJson<SubscriptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = match payload.subscription.trim().to_ascii_lowercase().as_str() {
        "free" => Subscription::Free,
        "pro" => Subscription::Pro,
        _ => return Err(AppError::BadRequest("Invalid subscription type".to_string())),
    };

    let (user, ()) = store::modify::<User, _, _>(store.as_ref(), &id, |user| {
        if user.role == Role::Admin {
            return Err(AppError::Forbidden(
                "Cannot change the subscription of an admin".to_string(),
            ));
        }
        user.set_subscription(subscription);
        Ok(())
    })
    .await?;

    Ok(Json(PublicUser::from(user)))
}

/// Imports a paper. One paper per subject and year.
/// Admin only.
pub async fn create_paper(
    State(store): State<Store>,
    AppJson(payload): AppJson<CreatePaperRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let paper = Paper::new(&payload.subject, payload.year, payload.exam_type, payload.questions);
    store::create(store.as_ref(), &paper).await.map_err(|e| match e {
        StoreError::Duplicate { .. } => AppError::Conflict(format!(
            "A paper for {} {} already exists",
            paper.subject, paper.year
        )),
        other => AppError::from(other),
    })?;

    tracing::info!(
        "Created paper {} ({} {}, {} questions)",
        paper.id,
        paper.subject,
        paper.year,
        paper.questions.len()
    );
    Ok((StatusCode::CREATED, Json(paper)))
}

/// Admin only.
pub async fn update_paper(
    State(store): State<Store>,
    AppPath(id): AppPath<String>,
    AppJson(payload): AppJson<UpdatePaperRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (paper, ()) = store::modify::<Paper, _, _>(store.as_ref(), &id, |paper| {
        if let Some(subject) = &payload.subject {
            paper.set_subject(subject);
        }
        if let Some(year) = payload.year {
            paper.year = year;
        }
        if let Some(exam_type) = &payload.exam_type {
            paper.exam_type = exam_type.clone();
        }
        if let Some(questions) = &payload.questions {
            paper.questions = questions.clone();
        }
        Ok(())
    })
    .await?;

    Ok(Json(paper))
}

/// Admin only.
pub async fn delete_paper(
    State(store): State<Store>,
    AppPath(id): AppPath<String>,
) -> Result<impl IntoResponse, AppError> {
    if !store::remove::<Paper>(store.as_ref(), &id).await? {
        return Err(AppError::NotFound("Paper not found".to_string()));
    }
    Ok(Json(json!({ "message": "Paper removed" })))
}

/// Admin only. Content is sanitized before storage.
pub async fn create_guide(
    State(store): State<Store>,
    AppJson(payload): AppJson<CreateGuideRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let guide = payload.into_guide();
    store::create(store.as_ref(), &guide).await?;

    Ok((StatusCode::CREATED, Json(guide)))
}

/// Admin only.
pub async fn update_guide(
    State(store): State<Store>,
    AppPath(id): AppPath<String>,
    AppJson(payload): AppJson<UpdateGuideRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (guide, ()) = store::modify::<StudyGuide, _, _>(store.as_ref(), &id, |guide| {
        payload.clone().apply(guide);
        Ok(())
    })
    .await?;

    Ok(Json(guide))
}

/// Admin only.
pub async fn delete_guide(
    State(store): State<Store>,
    AppPath(id): AppPath<String>,
) -> Result<impl IntoResponse, AppError> {
    if !store::remove::<StudyGuide>(store.as_ref(), &id).await? {
        return Err(AppError::NotFound("Guide not found".to_string()));
    }
    Ok(Json(json!({ "message": "Guide removed" })))
}
