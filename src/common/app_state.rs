use std::sync::Arc;

use crate::{lobby::registry::LobbyRegistry, question::models::QuestionPool};

pub struct AppState {
    registry: LobbyRegistry,
}

impl AppState {
    pub fn new(pool: Arc<QuestionPool>, expiry: chrono::Duration) -> Arc<Self> {
        Arc::new(Self {
            registry: LobbyRegistry::new(pool, expiry),
        })
    }

    pub fn get_registry(&self) -> &LobbyRegistry {
        &self.registry
    }
}
