//! The façade's shipped [`SessionStorage`] implementation: an in-memory map.
//! A deployment that needs durability across restarts supplies its own.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use agent_core::{Result, SessionState, SessionStorage};

#[derive(Default)]
pub struct MemoryStorage {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, state: &SessionState) -> Result<()> {
        self.sessions
            .write()
            .insert(session_id.to_string(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let storage = MemoryStorage::new();
        let state = SessionState::default();
        storage.save("s1", &state).await.unwrap();
        let loaded = storage.load("s1").await.unwrap();
        assert_eq!(loaded, Some(state));
    }

    #[tokio::test]
    async fn unknown_session_loads_as_none() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load("ghost").await.unwrap(), None);
    }
}
