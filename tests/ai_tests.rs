// tests/ai_tests.rs

mod common;

use common::{StubAi, spawn_app, spawn_app_with};
use examredi::{
    models::{
        content::TopicCache,
        user::{Role, Subscription},
    },
    store,
};
use serde_json::{Value, json};

#[tokio::test]
async fn free_users_get_five_messages_a_day() {
    // Arrange
    let app = spawn_app().await;
    let token = app.free_user().await;

    // Act
    for _ in 0..5 {
        let response = app
            .post("/api/ai/chat", Some(&token), &json!({ "message": "Explain osmosis" }))
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }
    let response = app
        .post("/api/ai/chat", Some(&token), &json!({ "message": "One more" }))
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "You have reached your daily message limit.");
}

#[tokio::test]
async fn pro_users_chat_without_limit() {
    let app = spawn_app().await;
    let token = app.seeded_user(Role::User, Subscription::Pro).await;

    for _ in 0..7 {
        let response = app
            .post("/api/ai/chat", Some(&token), &json!({ "message": "Explain osmosis" }))
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }
}

#[tokio::test]
async fn chat_uses_client_history_without_conversation() {
    let app = spawn_app().await;
    let token = app.free_user().await;

    let response = app
        .post(
            "/api/ai/chat",
            Some(&token),
            &json!({
                "message": "And then?",
                "history": [
                    { "role": "user", "text": "What is ATP?" },
                    { "role": "model", "text": "The energy currency of the cell." }
                ]
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["reply"], "Happy to help! (2 earlier)");
    assert!(body["conversationId"].is_null());
}

#[tokio::test]
async fn conversation_keeps_history() {
    // Arrange
    let app = spawn_app().await;
    let token = app.free_user().await;
    let created: Value = app
        .post("/api/ai/conversations/new", Some(&token), &json!({}))
        .await
        .json()
        .await
        .unwrap();
    let id = created["conversationId"].as_str().unwrap();

    // Act
    for message in ["What is ATP?", "Where is it made?"] {
        let response = app
            .post(
                "/api/ai/chat",
                Some(&token),
                &json!({ "message": message, "conversationId": id }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    // Assert
    let conversation: Value = app
        .get(&format!("/api/ai/conversations/{id}"), Some(&token))
        .await
        .json()
        .await
        .unwrap();
    let messages = conversation["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "model");
    // The second reply saw the first exchange
    assert_eq!(messages[3]["text"], "Happy to help! (2 earlier)");

    let listed: Value = app.get("/api/ai/conversations", Some(&token)).await.json().await.unwrap();
    let previews = listed["conversations"].as_array().unwrap();
    assert_eq!(previews.len(), 1);
    assert_eq!(previews[0]["messageCount"], 4);
}

#[tokio::test]
async fn conversations_are_private() {
    let app = spawn_app().await;
    let owner = app.free_user().await;
    let other = app.free_user().await;
    let created: Value = app
        .post("/api/ai/conversations/new", Some(&owner), &json!({}))
        .await
        .json()
        .await
        .unwrap();
    let id = created["conversationId"].as_str().unwrap();

    let response = app.get(&format!("/api/ai/conversations/{id}"), Some(&other)).await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app
        .post(
            "/api/ai/chat",
            Some(&other),
            &json!({ "message": "Hi", "conversationId": id }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app.delete(&format!("/api/ai/conversations/{id}"), Some(&other)).await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app.delete(&format!("/api/ai/conversations/{id}"), Some(&owner)).await;
    assert_eq!(response.status().as_u16(), 200);
    let response = app.get(&format!("/api/ai/conversations/{id}"), Some(&owner)).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn guide_generation_spends_credits() {
    // Arrange
    let app = spawn_app().await;
    let free = app.free_user().await;
    let pro = app.seeded_user(Role::User, Subscription::Pro).await;
    let request = json!({ "subject": "Biology", "topic": "Photosynthesis" });

    // Free users are turned away
    let response = app.post("/api/ai/generate-guide", Some(&free), &request).await;
    assert_eq!(response.status().as_u16(), 403);

    // Act
    let response = app.post("/api/ai/generate-guide", Some(&pro), &request).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["guide"], "Happy to help!");

    let profile: Value = app.get("/api/auth/profile", Some(&pro)).await.json().await.unwrap();
    assert_eq!(profile["aiCredits"], 9);
}

#[tokio::test]
async fn research_stops_when_credits_run_out() {
    let app = spawn_app().await;
    let pro = app.seeded_user(Role::User, Subscription::Pro).await;
    let request = json!({ "searchType": "course", "query": "Medicine" });

    for _ in 0..10 {
        let response = app.post("/api/ai/research", Some(&pro), &request).await;
        assert_eq!(response.status().as_u16(), 200);
    }

    let response = app.post("/api/ai/research", Some(&pro), &request).await;
    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Insufficient AI credits.");
}

#[tokio::test]
async fn unconfigured_ai_reports_server_error() {
    let app = spawn_app_with(StubAi::unconfigured()).await;
    let token = app.free_user().await;

    let response = app
        .post("/api/ai/chat", Some(&token), &json!({ "message": "Hello" }))
        .await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "The AI service is not configured on the server.");
}

#[tokio::test]
async fn unconfigured_ai_spends_no_quota() {
    // Arrange
    let app = spawn_app_with(StubAi::unconfigured()).await;
    let free = app.free_user().await;
    let pro = app.seeded_user(Role::User, Subscription::Pro).await;

    // Act
    let mut statuses = Vec::new();
    for _ in 0..6 {
        let response = app
            .post("/api/ai/chat", Some(&free), &json!({ "message": "Hello" }))
            .await;
        statuses.push(response.status().as_u16());
    }
    let guide = app
        .post(
            "/api/ai/generate-guide",
            Some(&pro),
            &json!({ "subject": "Biology", "topic": "Photosynthesis" }),
        )
        .await;
    let research = app
        .post(
            "/api/ai/research",
            Some(&pro),
            &json!({ "searchType": "course", "query": "Medicine" }),
        )
        .await;

    // Assert
    assert_eq!(statuses, [500; 6]);
    assert_eq!(guide.status().as_u16(), 500);
    assert_eq!(research.status().as_u16(), 500);

    let profile: Value = app.get("/api/auth/profile", Some(&free)).await.json().await.unwrap();
    assert_eq!(profile["dailyMessageCount"], 0);
    let profile: Value = app.get("/api/auth/profile", Some(&pro)).await.json().await.unwrap();
    assert_eq!(profile["aiCredits"], 10);
}

#[tokio::test]
async fn topic_keywords_are_extracted_and_cached() {
    // Arrange
    let app = spawn_app_with(StubAi::replying(
        "Sure! ```json\n[\"Chlorophyll\", \"Light reaction\", \" \", \"Stomata\"]\n```",
    ))
    .await;
    let token = app.free_user().await;
    let request = json!({ "topic": "Photosynthesis", "subject": "Biology" });

    // Act
    let response = app.post("/api/ai/topic-keywords", Some(&token), &request).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["keywords"], json!(["Chlorophyll", "Light reaction", "Stomata"]));

    let cached = store::load::<TopicCache>(
        app.store.as_ref(),
        &TopicCache::cache_id("photosynthesis", "biology"),
    )
    .await
    .unwrap();
    assert!(cached.is_some());

    // A second call is served from the cache
    let response = app.post("/api/ai/topic-keywords", Some(&token), &request).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["keywords"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn topic_keywords_fall_back_to_topic() {
    let app = spawn_app_with(StubAi::unconfigured()).await;
    let token = app.free_user().await;

    let response = app
        .post(
            "/api/ai/topic-keywords",
            Some(&token),
            &json!({ "topic": "Osmosis", "subject": "Biology" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["keywords"], json!(["Osmosis"]));

    // Fallbacks are not cached
    let cached = store::load::<TopicCache>(
        app.store.as_ref(),
        &TopicCache::cache_id("Osmosis", "Biology"),
    )
    .await
    .unwrap();
    assert!(cached.is_none());

    let response = app
        .post("/api/ai/topic-keywords", Some(&token), &json!({ "topic": "", "subject": "Biology" }))
        .await;
    assert_eq!(response.status().as_u16(), 400);
}
