// src/handlers/user.rs

use axum::{
    Json,
    extract::{Extension, State},
    response::IntoResponse,
};
use chrono::{Local, Utc};
use validator::Validate;

use crate::{
    error::AppError,
    extract::AppJson,
    handlers::current_user,
    models::{
        progress::{DismissNudgeRequest, ProgressResponse, ProgressUpdateRequest},
        user::{PublicUser, UpdateProfileRequest, User},
    },
    services::progress::reconcile,
    state::Store,
    store,
    utils::jwt::Claims,
};

fn progress_response(user: &User) -> ProgressResponse {
    ProgressResponse {
        streak: user.streak.current,
        longest_streak: user.streak.longest,
        streak_history: user.streak.history.clone(),
        recent_activity: user.recent_activity.clone(),
    }
}

/// Updates the caller's name and/or study plan (merged field by field).
pub async fn update_profile(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (user, ()) = store::modify::<User, _, _>(store.as_ref(), claims.user_id(), |user| {
        if let Some(name) = &payload.name {
            user.name = name.trim().to_string();
        }
        if let Some(plan) = &payload.study_plan {
            if let Some(target) = plan.target_score {
                user.study_plan.target_score = target;
            }
            if let Some(weak) = &plan.weak_subjects {
                user.study_plan.weak_subjects = weak.clone();
            }
            if let Some(goal) = plan.daily_goal {
                user.study_plan.daily_goal = goal;
            }
        }
        Ok(())
    })
    .await?;

    Ok(Json(PublicUser::from(user)))
}

#[utoipa::path(
    get,
    path = "/api/user/progress",
    responses(
        (status = 200, description = "Streak and recent activity", body = ProgressResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "user"
)]
pub async fn get_progress(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(store.as_ref(), claims.user_id()).await?.doc;
    Ok(Json(progress_response(&user)))
}

/// Records activity for today: advances the streak and merges activities.
///
/// Concurrent updates to the same user are retried; a new activity
/// missing its type, title or status is rejected as a whole.
#[utoipa::path(
    put,
    path = "/api/user/progress",
    request_body = ProgressUpdateRequest,
    responses(
        (status = 200, description = "Progress after the update", body = ProgressResponse),
        (status = 400, description = "Incomplete new activity"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "user"
)]
pub async fn update_progress(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<ProgressUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let today = Local::now().date_naive();
    let now = Utc::now();

    let (user, ()) = store::modify::<User, _, _>(store.as_ref(), claims.user_id(), |user| {
        let next = reconcile(user, today, now, payload.recent_activity.as_deref())
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        next.apply_to(user);
        Ok(())
    })
    .await?;

    tracing::debug!(
        "Progress for {}: streak {} ({} activities)",
        user.id,
        user.streak.current,
        user.recent_activity.len()
    );

    Ok(Json(progress_response(&user)))
}

/// Marks a nudge as dismissed. Repeating the call is harmless.
pub async fn dismiss_nudge(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<DismissNudgeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let nudge = payload.nudge_id.trim();
    if nudge.is_empty() {
        return Err(AppError::BadRequest("Nudge ID is required".to_string()));
    }

    let (user, ()) = store::modify::<User, _, _>(store.as_ref(), claims.user_id(), |user| {
        user.engagement.dismissed_nudges.insert(nudge.to_string());
        Ok(())
    })
    .await?;

    Ok(Json(user.engagement))
}
