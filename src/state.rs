// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    providers::{AiProvider, Mailer},
    store::DocumentStore,
};

/// Shared handle to the document backend.
pub type Store = Arc<dyn DocumentStore>;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Config,
    pub ai: Arc<dyn AiProvider>,
    pub mailer: Arc<dyn Mailer>,
}

impl FromRef<AppState> for Store {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn AiProvider> {
    fn from_ref(state: &AppState) -> Self {
        state.ai.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Mailer> {
    fn from_ref(state: &AppState) -> Self {
        state.mailer.clone()
    }
}
