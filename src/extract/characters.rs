use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, Row};
use tracing::debug;

use crate::model::Appearance;
use crate::normalization::NameKey;
use crate::parser::parse_characters;
use crate::store::CharacterStore;

use super::{int_column, missing_as_none, row_id, ExtractError, Extracted, Extractor};

/// Columns: `id`, `characters`, and optionally `publisher_id`. Integer
/// columns may be any integer width.
#[derive(Debug, Clone, Default)]
pub struct CharacterRow {
    pub id: i64,
    pub characters: Option<String>,
    pub publisher_id: Option<i64>,
}

impl<'r> FromRow<'r, PgRow> for CharacterRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row_id(row)?,
            characters: row.try_get("characters")?,
            publisher_id: missing_as_none(int_column(row, "publisher_id"))?,
        })
    }
}

/// Turns a story's character list into characters plus appearances.
pub struct CharacterExtractor<S> {
    store: S,
}

impl<S: CharacterStore> CharacterExtractor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn persist(&self, row: &CharacterRow) -> Result<usize, sqlx::Error> {
        let Some(text) = row.characters.as_deref() else {
            return Ok(0);
        };
        let entities = parse_characters(text);
        for entity in &entities {
            let key = NameKey::new(entity.name());
            let character_id = self.store.upsert_character(&key, row.publisher_id).await?;
            let appearance = Appearance::for_entity(row.id, character_id, entity);
            let appearance_id = self.store.insert_appearance(&appearance).await?;
            debug!(
                story_id = row.id,
                character_id,
                appearance_id,
                team = entity.is_team(),
                "appearance stored"
            );
        }
        Ok(entities.len())
    }
}

#[async_trait]
impl<S: CharacterStore> Extractor for CharacterExtractor<S> {
    type Row = CharacterRow;

    fn item_label(&self) -> &str {
        "story"
    }

    async fn extract_and_persist(&self, row: &CharacterRow) -> Result<Extracted, ExtractError> {
        let entities = self
            .persist(row)
            .await
            .map_err(|source| ExtractError::persisting(row.id, source))?;
        Ok(Extracted {
            row_id: row.id,
            entities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn row(id: i64, characters: &str) -> CharacterRow {
        CharacterRow {
            id,
            characters: Some(characters.to_string()),
            publisher_id: Some(1),
        }
    }

    #[tokio::test]
    async fn stores_one_appearance_per_entity() {
        let extractor = CharacterExtractor::new(MemoryStore::new());
        let out = extractor
            .extract_and_persist(&row(
                42,
                "Aquaman [Arthur Curry]; Teen Titans [Robin; Kid Flash] (cameo); Lois Lane",
            ))
            .await
            .unwrap();
        assert_eq!(
            out,
            Extracted {
                row_id: 42,
                entities: 3
            }
        );

        let appearances = extractor.store().appearances();
        assert_eq!(appearances.len(), 3);
        assert!(appearances.iter().all(|a| a.story_id == 42 && a.id != 0));
        assert_eq!(appearances[0].details.as_deref(), Some("Arthur Curry"));
        assert_eq!(appearances[1].membership.as_deref(), Some("Robin; Kid Flash"));
        assert_eq!(appearances[1].notes.as_deref(), Some("cameo"));
    }

    #[tokio::test]
    async fn same_name_across_rows_reuses_character() {
        let extractor = CharacterExtractor::new(MemoryStore::new());
        extractor
            .extract_and_persist(&row(1, "Batman [Bruce Wayne]"))
            .await
            .unwrap();
        extractor
            .extract_and_persist(&row(2, "batman (cameo); Robin"))
            .await
            .unwrap();

        let summary = extractor.store().summary();
        assert_eq!(summary.characters, 2);
        assert_eq!(summary.appearances, 3);
    }

    struct UnreachableStore;

    #[async_trait]
    impl CharacterStore for UnreachableStore {
        async fn upsert_character(
            &self,
            _name: &NameKey,
            _publisher_id: Option<i64>,
        ) -> Result<i64, sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }

        async fn insert_appearance(&self, _appearance: &Appearance) -> Result<i64, sqlx::Error> {
            Err(sqlx::Error::PoolClosed)
        }
    }

    #[tokio::test]
    async fn lost_database_is_reported_as_connection_failure() {
        let extractor = CharacterExtractor::new(UnreachableStore);
        let err = extractor
            .extract_and_persist(&row(3, "Batman"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Connection { row_id: 3, .. }));
    }

    #[tokio::test]
    async fn null_text_extracts_nothing() {
        let extractor = CharacterExtractor::new(MemoryStore::new());
        let out = extractor
            .extract_and_persist(&CharacterRow {
                id: 9,
                ..CharacterRow::default()
            })
            .await
            .unwrap();
        assert_eq!(out.entities, 0);
    }
}
