use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;

use crate::model::{Appearance, StoryCredit};
use crate::normalization::NameKey;

use super::{CharacterStore, CreditStore};

/// In-process store with the same natural-key semantics as `PgStore`.
///
/// Backs dry runs: rows are read from the database, nothing is written.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    characters: HashMap<(String, Option<i64>), i64>,
    creators: HashMap<String, i64>,
    appearances: Vec<Appearance>,
    credits: Vec<StoryCredit>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Row counts held by a `MemoryStore`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStoreSummary {
    pub characters: usize,
    pub appearances: usize,
    pub creators: usize,
    pub credits: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test thread panicked mid-insert.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn summary(&self) -> MemoryStoreSummary {
        let state = self.lock();
        MemoryStoreSummary {
            characters: state.characters.len(),
            appearances: state.appearances.len(),
            creators: state.creators.len(),
            credits: state.credits.len(),
        }
    }

    pub fn appearances(&self) -> Vec<Appearance> {
        self.lock().appearances.clone()
    }

    pub fn credits(&self) -> Vec<StoryCredit> {
        self.lock().credits.clone()
    }
}

#[async_trait]
impl CharacterStore for MemoryStore {
    async fn upsert_character(
        &self,
        name: &NameKey,
        publisher_id: Option<i64>,
    ) -> Result<i64, sqlx::Error> {
        let mut state = self.lock();
        let key = (name.normalized().to_string(), publisher_id);
        if let Some(id) = state.characters.get(&key) {
            return Ok(*id);
        }
        let id = state.next_id();
        state.characters.insert(key, id);
        Ok(id)
    }

    async fn insert_appearance(&self, appearance: &Appearance) -> Result<i64, sqlx::Error> {
        let mut state = self.lock();
        let id = state.next_id();
        state.appearances.push(Appearance {
            id,
            ..appearance.clone()
        });
        Ok(id)
    }
}

#[async_trait]
impl CreditStore for MemoryStore {
    async fn upsert_creator(&self, name: &NameKey) -> Result<i64, sqlx::Error> {
        let mut state = self.lock();
        if let Some(id) = state.creators.get(name.normalized()) {
            return Ok(*id);
        }
        let id = state.next_id();
        state.creators.insert(name.normalized().to_string(), id);
        Ok(id)
    }

    async fn insert_credit(&self, credit: &StoryCredit) -> Result<i64, sqlx::Error> {
        let mut state = self.lock();
        let id = state.next_id();
        state.credits.push(StoryCredit {
            id,
            ..credit.clone()
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_is_keyed_by_normalized_name_and_publisher() {
        let store = MemoryStore::new();
        let a = store
            .upsert_character(&NameKey::new("Batman"), Some(1))
            .await
            .unwrap();
        let b = store
            .upsert_character(&NameKey::new("  BATMAN "), Some(1))
            .await
            .unwrap();
        let c = store
            .upsert_character(&NameKey::new("Batman"), Some(2))
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.summary().characters, 2);
        let again = store
            .upsert_character(&NameKey::new("batman"), Some(1))
            .await
            .unwrap();
        assert_eq!(again, a);
    }

    #[tokio::test]
    async fn inserts_assign_ids() {
        let store = MemoryStore::new();
        let creator = store.upsert_creator(&NameKey::new("Jack Kirby")).await.unwrap();
        let credit = StoryCredit {
            id: 0,
            story_id: 10,
            creator_id: creator,
            role: crate::model::CreditRole::Pencils,
            credited_as: None,
            notes: None,
            uncertain: false,
        };
        let id = store.insert_credit(&credit).await.unwrap();
        assert_ne!(id, 0);
        assert_eq!(store.credits()[0].id, id);
    }
}
