// src/handlers/flashcards.rs

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    extract::{AppJson, AppPath},
    models::content::{Deck, DeckDocument},
    state::Store,
    store::{self, StoreError},
    utils::jwt::Claims,
};

/// Returns the caller's decks in creation order.
pub async fn get_decks(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let decks: Vec<Deck> =
        store::find_all::<DeckDocument>(store.as_ref(), &json!({ "userId": claims.user_id() }))
            .await?
            .into_iter()
            .map(|v| v.doc.deck)
            .collect();

    Ok(Json(decks))
}

/// Creates the deck, or replaces the caller's deck with the same id.
pub async fn save_deck(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    AppJson(deck): AppJson<Deck>,
) -> Result<impl IntoResponse, AppError> {
    if deck.id.trim().is_empty() || deck.name.trim().is_empty() {
        return Err(AppError::BadRequest("Deck ID and Name are required".to_string()));
    }

    let key = DeckDocument::key_for(claims.user_id(), &deck.id);
    let replace = |doc: &mut DeckDocument| -> Result<(), AppError> {
        doc.deck = deck.clone();
        Ok(())
    };

    match store::load::<DeckDocument>(store.as_ref(), &key).await? {
        Some(_) => {
            store::modify::<DeckDocument, _, _>(store.as_ref(), &key, replace).await?;
        }
        None => match store::create(store.as_ref(), &DeckDocument::new(claims.user_id(), deck.clone())).await {
            Ok(()) => {}
            // Lost a race with a concurrent save of the same deck.
            Err(StoreError::Duplicate { .. }) => {
                store::modify::<DeckDocument, _, _>(store.as_ref(), &key, replace).await?;
            }
            Err(e) => return Err(e.into()),
        },
    }

    Ok((StatusCode::CREATED, Json(deck)))
}

pub async fn delete_deck(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let key = DeckDocument::key_for(claims.user_id(), &id);
    store::remove::<DeckDocument>(store.as_ref(), &key).await?;

    Ok(Json(json!({ "message": "Deck deleted" })))
}
