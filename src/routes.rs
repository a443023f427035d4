// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, ai, auth, data, flashcards, user},
    openapi,
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, optional_auth_middleware},
};

/// Per-IP limiter: `burst` requests, then one more every `period_secs`.
fn rate_limited(router: Router<AppState>, period_secs: u64, burst: u32) -> Router<AppState> {
    match GovernorConfigBuilder::default()
        .per_second(period_secs)
        .burst_size(burst)
        .finish()
    {
        Some(conf) => router.layer(GovernorLayer::new(Arc::new(conf))),
        None => {
            tracing::warn!("Invalid rate limit settings, continuing without a limiter");
            router
        }
    }
}

/// Assembles the main application router.
///
/// * Nests the resource routers under `/api`.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store, config, providers).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = [
        state.config.frontend_url.as_str(),
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ]
    .iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let mut login = Router::new().route("/login", post(auth::login));
    let mut register = Router::new().route("/register", post(auth::register));
    if state.config.rate_limit {
        login = rate_limited(login, 180, 5);
        register = rate_limited(register, 720, 5);
    }

    let auth_routes = Router::new()
        .merge(login)
        .merge(register)
        .route("/refresh", post(auth::refresh))
        .route("/forgotpassword", post(auth::forgot_password))
        .route("/resetpassword/{token}", put(auth::reset_password))
        .route("/verifyemail/{token}", put(auth::verify_email))
        .merge(
            Router::new()
                .route("/logout", post(auth::logout))
                .route("/profile", get(auth::profile))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let data_routes = Router::new()
        .route("/search", get(data::search))
        .route("/guides", get(data::get_guides))
        .route("/guides/{id}", get(data::get_guide))
        .route(
            "/leaderboard",
            get(data::get_leaderboard).merge(
                post(data::add_leaderboard_score)
                    .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
            ),
        )
        .route("/literature", get(data::get_literature))
        .merge(
            Router::new()
                .route("/papers", get(data::get_papers))
                .layer(middleware::from_fn_with_state(state.clone(), optional_auth_middleware)),
        )
        // Protected data routes
        .merge(
            Router::new()
                .route(
                    "/performance",
                    get(data::get_performance).post(data::add_performance),
                )
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let ai_routes = Router::new()
        .route("/chat", post(ai::chat))
        .route("/generate-guide", post(ai::generate_guide))
        .route("/research", post(ai::research))
        .route("/topic-keywords", post(ai::topic_keywords))
        .route("/conversations", get(ai::list_conversations))
        .route("/conversations/new", post(ai::create_conversation))
        .route(
            "/conversations/{id}",
            get(ai::get_conversation).delete(ai::delete_conversation),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/stats", get(admin::stats))
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/users/{id}/subscription", put(admin::update_subscription))
        .route("/papers", post(admin::create_paper))
        .route(
            "/papers/{id}",
            delete(admin::delete_paper).put(admin::update_paper),
        )
        .route("/guides", post(admin::create_guide))
        .route(
            "/guides/{id}",
            delete(admin::delete_guide).put(admin::update_guide),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let user_routes = Router::new()
        .route("/profile", put(user::update_profile))
        .route(
            "/progress",
            get(user::get_progress).put(user::update_progress),
        )
        .route("/engagement/dismiss", post(user::dismiss_nudge))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let flashcard_routes = Router::new()
        .route("/", get(flashcards::get_decks).post(flashcards::save_deck))
        .route("/{id}", delete(flashcards::delete_deck))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(|| async { "ExamRedi API is running..." }))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/api/auth", auth_routes)
        .nest("/api/data", data_routes)
        .nest("/api/ai", ai_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/user", user_routes)
        .nest("/api/flashcards", flashcard_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
