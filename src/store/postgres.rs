use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::model::{Appearance, StoryCredit};
use crate::normalization::NameKey;
use crate::util::db::Db;

use super::{CharacterStore, CreditStore};

/// Auxiliary tables written by the extractors.
pub const CHARACTER_TABLE: &str = "m_character";
pub const APPEARANCE_TABLE: &str = "m_character_appearance";
pub const CREATOR_TABLE: &str = "m_creator";
pub const CREDIT_TABLE: &str = "m_story_credit";

/// Postgres-backed store. Natural-key lookups are cached for the run.
///
/// The lookup-then-insert upsert is not guarded by a lock or a unique
/// constraint, so two pipelines writing the same names concurrently can
/// still create duplicates.
pub struct PgStore {
    db: Db,
    characters: Mutex<HashMap<(String, Option<i64>), i64>>,
    creators: Mutex<HashMap<String, i64>>,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            characters: Mutex::new(HashMap::new()),
            creators: Mutex::new(HashMap::new()),
        }
    }

    fn cached_character(&self, key: &(String, Option<i64>)) -> Option<i64> {
        self.characters
            .lock()
            .ok()
            .and_then(|m| m.get(key).copied())
    }

    fn remember_character(&self, key: (String, Option<i64>), id: i64) {
        if let Ok(mut m) = self.characters.lock() {
            m.insert(key, id);
        }
    }

    fn cached_creator(&self, key: &str) -> Option<i64> {
        self.creators.lock().ok().and_then(|m| m.get(key).copied())
    }

    fn remember_creator(&self, key: String, id: i64) {
        if let Ok(mut m) = self.creators.lock() {
            m.insert(key, id);
        }
    }
}

#[async_trait]
impl CharacterStore for PgStore {
    async fn upsert_character(
        &self,
        name: &NameKey,
        publisher_id: Option<i64>,
    ) -> Result<i64, sqlx::Error> {
        let key = (name.normalized().to_string(), publisher_id);
        if let Some(id) = self.cached_character(&key) {
            return Ok(id);
        }

        let select_sql = format!(
            "SELECT id FROM {CHARACTER_TABLE} \
             WHERE name_normalized = $1 AND publisher_id IS NOT DISTINCT FROM $2 \
             ORDER BY id LIMIT 1"
        );
        let existing: Option<i64> = sqlx::query_scalar(&select_sql)
            .persistent(false)
            .bind(name.normalized())
            .bind(publisher_id)
            .fetch_optional(&self.db.pool)
            .await?;

        let id = match existing {
            Some(id) => {
                debug!(character = name.display(), character_id = id, "character exists");
                id
            }
            None => {
                let insert_sql = format!(
                    "INSERT INTO {CHARACTER_TABLE} (name, name_normalized, publisher_id) \
                     VALUES ($1, $2, $3) RETURNING id"
                );
                let id: i64 = sqlx::query_scalar(&insert_sql)
                    .persistent(false)
                    .bind(name.display())
                    .bind(name.normalized())
                    .bind(publisher_id)
                    .fetch_one(&self.db.pool)
                    .await?;
                debug!(character = name.display(), character_id = id, "character inserted");
                id
            }
        };
        self.remember_character(key, id);
        Ok(id)
    }

    async fn insert_appearance(&self, appearance: &Appearance) -> Result<i64, sqlx::Error> {
        let sql = format!(
            "INSERT INTO {APPEARANCE_TABLE} (story_id, character_id, details, notes, membership) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id"
        );
        sqlx::query_scalar(&sql)
            .persistent(false)
            .bind(appearance.story_id)
            .bind(appearance.character_id)
            .bind(appearance.details.as_deref())
            .bind(appearance.notes.as_deref())
            .bind(appearance.membership.as_deref())
            .fetch_one(&self.db.pool)
            .await
    }
}

#[async_trait]
impl CreditStore for PgStore {
    async fn upsert_creator(&self, name: &NameKey) -> Result<i64, sqlx::Error> {
        if let Some(id) = self.cached_creator(name.normalized()) {
            return Ok(id);
        }

        let select_sql =
            format!("SELECT id FROM {CREATOR_TABLE} WHERE name_normalized = $1 ORDER BY id LIMIT 1");
        let existing: Option<i64> = sqlx::query_scalar(&select_sql)
            .persistent(false)
            .bind(name.normalized())
            .fetch_optional(&self.db.pool)
            .await?;

        let id = match existing {
            Some(id) => id,
            None => {
                let insert_sql = format!(
                    "INSERT INTO {CREATOR_TABLE} (name, name_normalized) VALUES ($1, $2) RETURNING id"
                );
                let id: i64 = sqlx::query_scalar(&insert_sql)
                    .persistent(false)
                    .bind(name.display())
                    .bind(name.normalized())
                    .fetch_one(&self.db.pool)
                    .await?;
                debug!(creator = name.display(), creator_id = id, "creator inserted");
                id
            }
        };
        self.remember_creator(name.normalized().to_string(), id);
        Ok(id)
    }

    async fn insert_credit(&self, credit: &StoryCredit) -> Result<i64, sqlx::Error> {
        let sql = format!(
            "INSERT INTO {CREDIT_TABLE} \
             (story_id, creator_id, credit_type, credited_as, notes, is_uncertain) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id"
        );
        sqlx::query_scalar(&sql)
            .persistent(false)
            .bind(credit.story_id)
            .bind(credit.creator_id)
            .bind(credit.role.column())
            .bind(credit.credited_as.as_deref())
            .bind(credit.notes.as_deref())
            .bind(credit.uncertain)
            .fetch_one(&self.db.pool)
            .await
    }
}
