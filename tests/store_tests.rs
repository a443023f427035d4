// tests/store_tests.rs

//! Postgres tests run when `DATABASE_URL` is set and are skipped otherwise.

mod common;

use common::ConflictingStore;
use examredi::{
    error::AppError,
    models::user::User,
    store::{self, Collection, DocumentStore, PgStore, StoreError},
};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;

async fn pg_store() -> Option<PgStore> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres store test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    Some(PgStore::new(pool))
}

fn unique_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[tokio::test]
async fn replace_checks_version() {
    let Some(pg) = pg_store().await else { return };
    let id = unique_id();

    pg.insert(Collection::Literature, &id, None, &json!({ "title": "Lekki Headmaster" }))
        .await
        .unwrap();

    let read = pg.get(Collection::Literature, &id).await.unwrap().unwrap();
    assert_eq!(read.version, 1);

    let version = pg
        .replace(Collection::Literature, &id, 1, None, &json!({ "title": "The Life Changer" }))
        .await
        .unwrap();
    assert_eq!(version, 2);

    // A writer still holding version 1 loses
    let stale = pg
        .replace(Collection::Literature, &id, 1, None, &json!({ "title": "Stale" }))
        .await;
    assert!(matches!(stale, Err(StoreError::VersionConflict { .. })));

    let missing = pg
        .replace(Collection::Literature, &unique_id(), 1, None, &json!({}))
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound { .. })));

    assert!(pg.delete(Collection::Literature, &id).await.unwrap());
}

#[tokio::test]
async fn unique_email_is_enforced() {
    let Some(pg) = pg_store().await else { return };
    let email = format!("{}@example.com", unique_id());

    let first = User::new("First".to_string(), &email, None);
    store::create(&pg, &first).await.unwrap();

    let second = User::new("Second".to_string(), &email.to_uppercase(), None);
    let result = store::create(&pg, &second).await;
    assert!(matches!(result, Err(StoreError::Duplicate { .. })));

    let found = store::find_one::<User>(&pg, &json!({ "email": email })).await.unwrap();
    assert_eq!(found.unwrap().doc.name, "First");

    store::remove::<User>(&pg, &first.id).await.unwrap();
}

#[tokio::test]
async fn modify_survives_concurrent_writers() {
    let Some(pg) = pg_store().await else { return };
    let user = User::new("Counter".to_string(), &format!("{}@example.com", unique_id()), None);
    store::create(&pg, &user).await.unwrap();

    let bump = || async {
        store::modify::<User, _, _>(&pg, &user.id, |u| {
            u.ai_credits += 1;
            Ok::<_, AppError>(())
        })
        .await
    };
    let (a, b, c) = tokio::join!(bump(), bump(), bump());
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    let stored = store::load::<User>(&pg, &user.id).await.unwrap().unwrap();
    assert_eq!(stored.doc.ai_credits, 3);

    store::remove::<User>(&pg, &user.id).await.unwrap();
}

#[tokio::test]
async fn modify_gives_up_after_three_conflicts() {
    let conflicting = ConflictingStore::new();
    let user = User::new("Contended".to_string(), "contended@example.com", None);
    store::create(&conflicting, &user).await.unwrap();
    conflicting.arm();

    let result = store::modify::<User, _, _>(&conflicting, &user.id, |u| {
        u.ai_credits += 1;
        Ok::<_, AppError>(())
    })
    .await;

    assert!(matches!(result, Err(AppError::InternalServerError(_))));
    assert_eq!(conflicting.replace_calls(), 3);

    conflicting.disarm();
    let stored = store::load::<User>(&conflicting, &user.id).await.unwrap().unwrap();
    assert_eq!(stored.doc.ai_credits, user.ai_credits);
}
