// src/handlers/ai.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    config::{CHAT_HISTORY_LIMIT, CHAT_IDLE_DAYS, FREE_TIER_DAILY_MESSAGES},
    error::AppError,
    extract::{AppJson, AppPath},
    models::{
        chat::{ChatHistory, ChatRequest, ChatRole},
        content::TopicCache,
        user::{Subscription, User},
    },
    providers::{AiProvider, ProviderError},
    state::Store,
    store::{self, DocumentStore, StoreError, Versioned},
    utils::jwt::Claims,
};

const TUTOR_INSTRUCTION: &str = "You are Ai-buddy, a friendly and encouraging AI tutor for ExamRedi. \
Your goal is to help students understand complex topics and prepare for their exams. \
Keep your tone positive and supportive. Format responses using markdown.";

const GUIDE_INSTRUCTION: &str = "You are an expert educator. Create a concise, easy-to-understand study guide. \
Use clear headings, bullet points, and simple language. Use markdown for formatting.";

const ADVISOR_INSTRUCTION: &str = "You are a knowledgeable career and academic advisor for Nigerian students. \
Provide accurate, detailed, and encouraging information. Use markdown formatting.";

/// Rejects the request before any quota or credit is spent when the
/// provider has no API key.
fn require_configured(ai: &dyn AiProvider) -> Result<(), AppError> {
    if ai.is_configured() {
        Ok(())
    } else {
        Err(ProviderError::NotConfigured("AI provider").into_app_error(""))
    }
}

/// Counts one chat message against a free user's daily allowance.
async fn consume_daily_message(store: &dyn DocumentStore, user_id: &str) -> Result<(), AppError> {
    let today = Utc::now().date_naive();
    store::modify::<User, _, _>(store, user_id, |user| {
        if user.subscription != Subscription::Free {
            return Ok(());
        }
        if user.last_message_date != Some(today) {
            user.daily_message_count = 0;
            user.last_message_date = Some(today);
        }
        if user.daily_message_count >= FREE_TIER_DAILY_MESSAGES {
            return Err(AppError::Forbidden(
                "You have reached your daily message limit.".to_string(),
            ));
        }
        user.daily_message_count += 1;
        Ok(())
    })
    .await?;
    Ok(())
}

/// Deducts `cost` credits from a pro user.
async fn spend_credits(store: &dyn DocumentStore, user_id: &str, cost: u32) -> Result<(), AppError> {
    store::modify::<User, _, _>(store, user_id, |user| {
        if user.subscription == Subscription::Free {
            return Err(AppError::Forbidden("This feature is for Pro users only.".to_string()));
        }
        if user.ai_credits < cost {
            return Err(AppError::Forbidden("Insufficient AI credits.".to_string()));
        }
        user.ai_credits -= cost;
        Ok(())
    })
    .await?;
    Ok(())
}

/// Loads a conversation owned by `user_id`. Other users' conversations do not exist.
async fn owned_conversation(
    store: &dyn DocumentStore,
    id: &str,
    user_id: &str,
) -> Result<Versioned<ChatHistory>, AppError> {
    store::load::<ChatHistory>(store, id)
        .await?
        .filter(|c| c.doc.user_id == user_id)
        .ok_or(AppError::NotFound("Conversation not found.".to_string()))
}

/// Sends one message to the tutor.
///
/// With a `conversationId` the stored history is used and both turns are
/// appended to it; otherwise the client-supplied history is used as is.
pub async fn chat(
    State(store): State<Store>,
    State(ai): State<Arc<dyn AiProvider>>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let conversation = match payload.conversation_id.as_deref() {
        Some(id) => Some(owned_conversation(store.as_ref(), id, claims.user_id()).await?),
        None => None,
    };

    require_configured(ai.as_ref())?;
    consume_daily_message(store.as_ref(), claims.user_id()).await?;

    let history = match &conversation {
        Some(c) => &c.doc.messages[..],
        None => {
            let skip = payload.history.len().saturating_sub(CHAT_HISTORY_LIMIT);
            &payload.history[skip..]
        }
    };

    let reply = ai
        .chat(history, &payload.message, Some(TUTOR_INSTRUCTION))
        .await
        .map_err(|e| e.into_app_error("Error communicating with AI service."))?;

    if let Some(conversation) = &conversation {
        let now = Utc::now();
        store::modify::<ChatHistory, _, _>(store.as_ref(), &conversation.id, |c| {
            c.add_message(ChatRole::User, &payload.message, now);
            c.add_message(ChatRole::Model, &reply, now);
            Ok(())
        })
        .await?;
    }

    Ok(Json(json!({
        "reply": reply,
        "conversationId": conversation.map(|c| c.id),
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateGuideRequest {
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(length(min = 1, max = 200))]
    pub topic: String,
}

/// Pro only; costs one credit.
pub async fn generate_guide(
    State(store): State<Store>,
    State(ai): State<Arc<dyn AiProvider>>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<GenerateGuideRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    require_configured(ai.as_ref())?;
    spend_credits(store.as_ref(), claims.user_id(), 1).await?;

    let prompt = format!(
        "Generate a study guide for the subject \"{}\" on the topic \"{}\".",
        payload.subject, payload.topic
    );
    let guide = ai
        .generate(&prompt, Some(GUIDE_INSTRUCTION))
        .await
        .map_err(|e| e.into_app_error("Error generating study guide."))?;

    Ok(Json(json!({ "guide": guide })))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    /// `university` or `course`.
    pub search_type: String,
    #[validate(length(min = 1, max = 200))]
    pub query: String,
}

/// Pro only; costs one credit.
pub async fn research(
    State(store): State<Store>,
    State(ai): State<Arc<dyn AiProvider>>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<ResearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    require_configured(ai.as_ref())?;
    spend_credits(store.as_ref(), claims.user_id(), 1).await?;

    let prompt = if payload.search_type == "university" {
        format!(
            "Provide a detailed overview of the Nigerian university: \"{}\". Include its history, \
             notable alumni, faculties, admission requirements, and student life.",
            payload.query
        )
    } else {
        format!(
            "Generate a guide for a Nigerian student considering a career in \"{}\". Include required \
             JAMB subjects, top Nigerian universities offering it, career paths, and necessary skills.",
            payload.query
        )
    };

    let result = ai
        .generate(&prompt, Some(ADVISOR_INSTRUCTION))
        .await
        .map_err(|e| e.into_app_error("Error researching topic."))?;

    Ok(Json(json!({ "result": result })))
}

#[derive(Debug, Deserialize)]
pub struct TopicKeywordsRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub subject: String,
}

/// Pulls the first `[...]` span out of a model reply and keeps its non-empty strings.
fn extract_keywords(reply: &str) -> Vec<String> {
    let (Some(start), Some(end)) = (reply.find('['), reply.rfind(']')) else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<Value>>(&reply[start..=end]) {
        Ok(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
        Err(e) => {
            tracing::warn!("Keyword reply is not a JSON array: {}", e);
            Vec::new()
        }
    }
}

/// Search keywords for a topic, cached per (topic, subject).
///
/// Never fails on provider trouble: the topic itself is the fallback keyword.
pub async fn topic_keywords(
    State(store): State<Store>,
    State(ai): State<Arc<dyn AiProvider>>,
    AppJson(payload): AppJson<TopicKeywordsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let topic = payload.topic.trim();
    let subject = payload.subject.trim();
    if topic.is_empty() || subject.is_empty() {
        return Err(AppError::BadRequest("Topic and subject are required.".to_string()));
    }

    let cache_id = TopicCache::cache_id(topic, subject);
    if let Some(hit) = store::load::<TopicCache>(store.as_ref(), &cache_id).await? {
        tracing::debug!("Topic cache hit for {}", cache_id);
        return Ok(Json(json!({ "keywords": hit.doc.keywords })));
    }

    let prompt = format!(
        "For the student subject \"{subject}\", provide a JSON array of 8-12 diverse keywords or short \
         phrases that are highly relevant to the specific topic \"{topic}\". Include synonyms, related \
         sub-concepts, and key terms typically found in past questions. Output ONLY the JSON array. \
         Example: [\"Chlorophyll\", \"Mitochondria\", ...]"
    );

    let keywords = match ai.generate(&prompt, None).await {
        Ok(reply) => extract_keywords(&reply),
        Err(e) => {
            tracing::error!("Keyword generation failed: {}", e);
            Vec::new()
        }
    };

    if keywords.is_empty() {
        return Ok(Json(json!({ "keywords": [topic] })));
    }

    let entry = TopicCache::new(topic, subject, keywords);
    match store::create(store.as_ref(), &entry).await {
        Ok(()) => tracing::info!("Cached keywords for {}", cache_id),
        // Another request cached the same topic first.
        Err(StoreError::Duplicate { .. }) => {}
        Err(e) => tracing::warn!("Failed to cache keywords for {}: {}", cache_id, e),
    }

    Ok(Json(json!({ "keywords": entry.keywords })))
}

pub async fn create_conversation(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let conversation = ChatHistory::new(claims.user_id());
    store::create(store.as_ref(), &conversation).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "conversationId": conversation.conversation_id })),
    ))
}

/// Lists the caller's conversations, most recently used first.
///
/// Conversations idle for longer than the retention window are purged here.
pub async fn list_conversations(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let cutoff = Utc::now() - Duration::days(CHAT_IDLE_DAYS);
    let all = store::find_all::<ChatHistory>(store.as_ref(), &json!({ "userId": claims.user_id() })).await?;

    let mut live = Vec::with_capacity(all.len());
    for conversation in all {
        if conversation.doc.last_accessed_at < cutoff {
            store::remove::<ChatHistory>(store.as_ref(), &conversation.id).await?;
        } else {
            live.push(conversation.doc);
        }
    }

    live.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
    let previews: Vec<_> = live
        .iter()
        .take(CHAT_HISTORY_LIMIT)
        .map(ChatHistory::preview)
        .collect();

    Ok(Json(json!({ "conversations": previews })))
}

pub async fn get_conversation(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let found = owned_conversation(store.as_ref(), &id, claims.user_id()).await?;

    let now = Utc::now();
    let (conversation, ()) = store::modify::<ChatHistory, _, _>(store.as_ref(), &found.id, |c| {
        c.last_accessed_at = now;
        Ok(())
    })
    .await?;

    Ok(Json(json!({
        "conversationId": conversation.conversation_id,
        "messages": conversation.messages,
        "createdAt": conversation.created_at,
        "updatedAt": conversation.updated_at,
    })))
}

pub async fn delete_conversation(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let found = owned_conversation(store.as_ref(), &id, claims.user_id()).await?;
    store::remove::<ChatHistory>(store.as_ref(), &found.id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Conversation deleted successfully."
    })))
}
