use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, Row};

use crate::model::{CreditRole, StoryCredit};
use crate::normalization::NameKey;
use crate::parser::parse_credits;
use crate::store::CreditStore;

use super::{missing_as_none, row_id, ExtractError, Extracted, Extractor};

/// Columns: `id` plus any subset of the credit columns.
#[derive(Debug, Clone, Default)]
pub struct CreditRow {
    pub id: i64,
    pub script: Option<String>,
    pub pencils: Option<String>,
    pub inks: Option<String>,
    pub colors: Option<String>,
    pub letters: Option<String>,
    pub editing: Option<String>,
}

impl<'r> FromRow<'r, PgRow> for CreditRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let text = |role: CreditRole| {
            missing_as_none(row.try_get::<Option<String>, _>(role.column()))
        };
        Ok(Self {
            id: row_id(row)?,
            script: text(CreditRole::Script)?,
            pencils: text(CreditRole::Pencils)?,
            inks: text(CreditRole::Inks)?,
            colors: text(CreditRole::Colors)?,
            letters: text(CreditRole::Letters)?,
            editing: text(CreditRole::Editing)?,
        })
    }
}

impl CreditRow {
    pub fn field(&self, role: CreditRole) -> Option<&str> {
        match role {
            CreditRole::Script => self.script.as_deref(),
            CreditRole::Pencils => self.pencils.as_deref(),
            CreditRole::Inks => self.inks.as_deref(),
            CreditRole::Colors => self.colors.as_deref(),
            CreditRole::Letters => self.letters.as_deref(),
            CreditRole::Editing => self.editing.as_deref(),
        }
    }
}

/// Turns a story's credit columns into creators plus story credits.
pub struct CreditExtractor<S> {
    store: S,
    roles: Vec<CreditRole>,
}

impl<S: CreditStore> CreditExtractor<S> {
    /// Extract every credit role.
    pub fn new(store: S) -> Self {
        Self::with_roles(store, CreditRole::ALL.to_vec())
    }

    pub fn with_roles(store: S, roles: Vec<CreditRole>) -> Self {
        Self { store, roles }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn persist(&self, row: &CreditRow) -> Result<usize, sqlx::Error> {
        let mut stored = 0;
        for role in &self.roles {
            let Some(text) = row.field(*role) else {
                continue;
            };
            for credit in parse_credits(*role, text) {
                let creator_id = self.store.upsert_creator(&NameKey::new(&credit.name)).await?;
                self.store
                    .insert_credit(&StoryCredit::for_credit(row.id, creator_id, &credit))
                    .await?;
                stored += 1;
            }
        }
        Ok(stored)
    }
}

#[async_trait]
impl<S: CreditStore> Extractor for CreditExtractor<S> {
    type Row = CreditRow;

    fn item_label(&self) -> &str {
        "story"
    }

    async fn extract_and_persist(&self, row: &CreditRow) -> Result<Extracted, ExtractError> {
        match self.persist(row).await {
            Ok(entities) => Ok(Extracted {
                row_id: row.id,
                entities,
            }),
            Err(source) => Err(ExtractError::persisting(row.id, source)),
        }
    }
}
