//! Plain data for parsed entities and the rows persisted from them.

use serde::Serialize;

/// One character entry parsed out of a story's `characters` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Individual {
        name: String,
        alter_ego: Option<String>,
        appearance_notes: Option<String>,
    },
    Team {
        name: String,
        /// Raw member list exactly as it appeared between the brackets.
        members: String,
        appearance_notes: Option<String>,
    },
}

impl Entity {
    pub fn name(&self) -> &str {
        match self {
            Entity::Individual { name, .. } | Entity::Team { name, .. } => name,
        }
    }

    pub fn appearance_notes(&self) -> Option<&str> {
        match self {
            Entity::Individual {
                appearance_notes, ..
            }
            | Entity::Team {
                appearance_notes, ..
            } => appearance_notes.as_deref(),
        }
    }

    pub fn is_team(&self) -> bool {
        matches!(self, Entity::Team { .. })
    }
}

/// Links a story to a character. `id == 0` means not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Appearance {
    pub id: i64,
    pub story_id: i64,
    pub character_id: i64,
    pub details: Option<String>,
    pub notes: Option<String>,
    pub membership: Option<String>,
}

impl Appearance {
    /// Build the unpersisted appearance row for `entity` in `story_id`.
    pub fn for_entity(story_id: i64, character_id: i64, entity: &Entity) -> Self {
        let (details, membership) = match entity {
            Entity::Individual { alter_ego, .. } => (alter_ego.clone(), None),
            Entity::Team { members, .. } => (None, Some(members.clone())),
        };
        Self {
            id: 0,
            story_id,
            character_id,
            details,
            notes: entity.appearance_notes().map(str::to_string),
            membership,
        }
    }
}

/// Which story column a credit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditRole {
    Script,
    Pencils,
    Inks,
    Colors,
    Letters,
    Editing,
}

impl CreditRole {
    pub const ALL: [CreditRole; 6] = [
        CreditRole::Script,
        CreditRole::Pencils,
        CreditRole::Inks,
        CreditRole::Colors,
        CreditRole::Letters,
        CreditRole::Editing,
    ];

    /// Column name in the story table, also stored as `credit_type`.
    pub fn column(&self) -> &'static str {
        match self {
            CreditRole::Script => "script",
            CreditRole::Pencils => "pencils",
            CreditRole::Inks => "inks",
            CreditRole::Colors => "colors",
            CreditRole::Letters => "letters",
            CreditRole::Editing => "editing",
        }
    }

    pub fn from_column(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|r| r.column() == wanted)
    }
}

impl std::str::FromStr for CreditRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_column(s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|r| r.column()).collect();
            format!("unknown credit role `{s}` (expected one of {})", known.join(", "))
        })
    }
}

/// One creator credit parsed out of a credit column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credit {
    pub role: CreditRole,
    pub name: String,
    pub credited_as: Option<String>,
    pub notes: Option<String>,
    pub uncertain: bool,
}

/// Persisted credit row linking a story to a creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryCredit {
    pub id: i64,
    pub story_id: i64,
    pub creator_id: i64,
    pub role: CreditRole,
    pub credited_as: Option<String>,
    pub notes: Option<String>,
    pub uncertain: bool,
}

impl StoryCredit {
    pub fn for_credit(story_id: i64, creator_id: i64, credit: &Credit) -> Self {
        Self {
            id: 0,
            story_id,
            creator_id,
            role: credit.role,
            credited_as: credit.credited_as.clone(),
            notes: credit.notes.clone(),
            uncertain: credit.uncertain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_appearance_keeps_members_in_membership() {
        let team = Entity::Team {
            name: "Teen Titans".into(),
            members: "Robin; Kid Flash".into(),
            appearance_notes: Some("cameo".into()),
        };
        let a = Appearance::for_entity(7, 3, &team);
        assert_eq!(a.id, 0);
        assert_eq!(a.details, None);
        assert_eq!(a.membership.as_deref(), Some("Robin; Kid Flash"));
        assert_eq!(a.notes.as_deref(), Some("cameo"));
    }

    #[test]
    fn credit_role_round_trips_column_names() {
        for role in CreditRole::ALL {
            assert_eq!(CreditRole::from_column(role.column()), Some(role));
        }
        assert_eq!(CreditRole::from_column(" Pencils "), Some(CreditRole::Pencils));
        assert_eq!(CreditRole::from_column("cover"), None);
        assert!("cover"
            .parse::<CreditRole>()
            .unwrap_err()
            .contains("script, pencils"));
    }
}
