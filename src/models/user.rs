// src/models/user.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    models::progress::{Activity, Engagement, Streak},
    store::{Collection, Document},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Subscription {
    #[default]
    Free,
    Pro,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudyPlan {
    pub target_score: u32,
    pub weak_subjects: Vec<String>,
    pub daily_goal: u32,
}

impl Default for StudyPlan {
    fn default() -> Self {
        Self {
            target_score: 250,
            weak_subjects: Vec::new(),
            daily_goal: 10,
        }
    }
}

/// A user document in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,

    /// Unique, stored lower-cased.
    pub email: String,

    /// Argon2 password hash. `None` for accounts created through Google.
    #[serde(default)]
    pub password_hash: Option<String>,

    #[serde(default)]
    pub google_id: Option<String>,

    #[serde(default)]
    pub subscription: Subscription,

    #[serde(default)]
    pub role: Role,

    #[serde(default)]
    pub ai_credits: u32,

    #[serde(default)]
    pub daily_message_count: u32,

    #[serde(default)]
    pub last_message_date: Option<NaiveDate>,

    #[serde(default)]
    pub study_plan: StudyPlan,

    #[serde(default)]
    pub streak: Streak,

    /// Most recent first, at most `progress::ACTIVITY_LIMIT` entries.
    #[serde(default)]
    pub recent_activity: Vec<Activity>,

    #[serde(default)]
    pub engagement: Engagement,

    #[serde(default)]
    pub is_verified: bool,

    /// blake3 digest of the emailed verification token.
    #[serde(default)]
    pub verification_token: Option<String>,

    /// blake3 digest of the emailed password reset token.
    #[serde(default)]
    pub reset_password_token: Option<String>,

    #[serde(default)]
    pub reset_password_expire: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: &str, password_hash: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email: normalize_email(email),
            password_hash,
            google_id: None,
            subscription: Subscription::Free,
            role: Role::User,
            ai_credits: 0,
            daily_message_count: 0,
            last_message_date: None,
            study_plan: StudyPlan::default(),
            streak: Streak::default(),
            recent_activity: Vec::new(),
            engagement: Engagement::default(),
            is_verified: false,
            verification_token: None,
            reset_password_token: None,
            reset_password_expire: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the subscription and the matching AI credit balance.
    pub fn set_subscription(&mut self, subscription: Subscription) {
        self.subscription = subscription;
        self.ai_credits = match subscription {
            Subscription::Pro => crate::config::PRO_AI_CREDITS,
            Subscription::Free => 0,
        };
    }
}

impl Document for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> &str {
        &self.id
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.email.clone())
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User as returned to clients: no password hash or token digests.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub subscription: Subscription,
    pub role: Role,
    pub ai_credits: u32,
    pub daily_message_count: u32,
    pub last_message_date: Option<NaiveDate>,
    pub study_plan: StudyPlan,
    pub streak: Streak,
    pub recent_activity: Vec<Activity>,
    pub engagement: Engagement,
    pub is_verified: bool,
    pub has_google: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            subscription: user.subscription,
            role: user.role,
            ai_credits: user.ai_credits,
            daily_message_count: user.daily_message_count,
            last_message_date: user.last_message_date,
            study_plan: user.study_plan,
            streak: user.streak,
            recent_activity: user.recent_activity,
            engagement: user.engagement,
            is_verified: user.is_verified,
            has_google: user.google_id.is_some(),
            created_at: user.created_at,
        }
    }
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name length must be between 1 and 100 characters."
    ))]
    pub name: String,
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Response for register and login.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub subscription: Subscription,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlanUpdate {
    pub target_score: Option<u32>,
    pub weak_subjects: Option<Vec<String>>,
    pub daily_goal: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub study_plan: Option<StudyPlanUpdate>,
}
