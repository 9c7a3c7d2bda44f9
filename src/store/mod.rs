//! Persistence seam for extracted entities.
//!
//! Characters and creators are upserted by natural key (normalized name,
//! plus publisher for characters); appearances and credits are plain inserts.

use async_trait::async_trait;

use crate::model::{Appearance, StoryCredit};
use crate::normalization::NameKey;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStore, MemoryStoreSummary};
pub use postgres::PgStore;

#[async_trait]
pub trait CharacterStore: Send + Sync {
    /// Id of the character with this key, inserting it when absent.
    async fn upsert_character(
        &self,
        name: &NameKey,
        publisher_id: Option<i64>,
    ) -> Result<i64, sqlx::Error>;

    /// Insert the appearance and return its storage id.
    async fn insert_appearance(&self, appearance: &Appearance) -> Result<i64, sqlx::Error>;
}

#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Id of the creator with this key, inserting it when absent.
    async fn upsert_creator(&self, name: &NameKey) -> Result<i64, sqlx::Error>;

    /// Insert the story credit and return its storage id.
    async fn insert_credit(&self, credit: &StoryCredit) -> Result<i64, sqlx::Error>;
}
