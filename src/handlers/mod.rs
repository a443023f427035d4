// src/handlers/mod.rs

pub mod admin;
pub mod ai;
pub mod auth;
pub mod data;
pub mod flashcards;
pub mod user;

use crate::{
    error::AppError,
    models::user::User,
    store::{self, DocumentStore, Versioned},
};

/// Loads the account behind a token; a deleted account is a 404.
pub(crate) async fn current_user(
    store: &dyn DocumentStore,
    user_id: &str,
) -> Result<Versioned<User>, AppError> {
    store::load::<User>(store, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}
