use crate::model::Entity;

use super::brackets::{decompose_entry, fix_missing_brackets, split_top_level};

/// Parse a story's free-text character list.
///
/// Never fails: malformed input degrades to whatever entries can still be
/// read, possibly none. Entries without a name are dropped.
pub fn parse_characters(input: &str) -> Vec<Entity> {
    let repaired = fix_missing_brackets(input);
    split_top_level(&repaired)
        .into_iter()
        .filter_map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Option<Entity> {
    let parts = decompose_entry(entry);
    if parts.name.is_empty() {
        return None;
    }
    let name = parts.name.to_string();
    let appearance_notes = parts.paren.map(str::to_string);

    let Some(bracket) = parts.bracket else {
        return Some(Entity::Individual {
            name,
            alter_ego: None,
            appearance_notes,
        });
    };

    // The sub-split only classifies; a team keeps the bracket text verbatim.
    let members = split_top_level(bracket);
    if members.len() > 1 {
        Some(Entity::Team {
            name,
            members: bracket.to_string(),
            appearance_notes,
        })
    } else {
        Some(Entity::Individual {
            name,
            alter_ego: members.first().map(|s| s.to_string()),
            appearance_notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn individual(name: &str, alter_ego: Option<&str>, notes: Option<&str>) -> Entity {
        Entity::Individual {
            name: name.into(),
            alter_ego: alter_ego.map(Into::into),
            appearance_notes: notes.map(Into::into),
        }
    }

    #[test]
    fn parses_individuals_with_alter_egos_and_notes() {
        let parsed =
            parse_characters("Aquaman [Arthur Curry]; Batman [Bruce Wayne] (cameo); Lois Lane");
        assert_eq!(
            parsed,
            vec![
                individual("Aquaman", Some("Arthur Curry"), None),
                individual("Batman", Some("Bruce Wayne"), Some("cameo")),
                individual("Lois Lane", None, None),
            ]
        );
    }

    #[test]
    fn bracket_with_several_members_is_a_team() {
        let parsed = parse_characters("Teen Titans [Robin; Kid Flash; Wonder Girl]");
        assert_eq!(
            parsed,
            vec![Entity::Team {
                name: "Teen Titans".into(),
                members: "Robin; Kid Flash; Wonder Girl".into(),
                appearance_notes: None,
            }]
        );
    }

    #[test]
    fn team_members_keep_nested_alter_egos_verbatim() {
        let parsed = parse_characters(
            "Justice League [Superman [Clark Kent]; Batman [Bruce Wayne]] (intro); Alfred",
        );
        assert_eq!(parsed.len(), 2);
        match &parsed[0] {
            Entity::Team {
                name,
                members,
                appearance_notes,
            } => {
                assert_eq!(name, "Justice League");
                assert_eq!(members, "Superman [Clark Kent]; Batman [Bruce Wayne]");
                assert_eq!(appearance_notes.as_deref(), Some("intro"));
            }
            other => panic!("expected team, got {other:?}"),
        }
        assert_eq!(parsed[1], individual("Alfred", None, None));
    }

    #[test]
    fn whitespace_around_separators_does_not_matter() {
        let tight = parse_characters("Aquaman [Arthur Curry];Batman (cameo);Lois Lane");
        let loose =
            parse_characters("   Aquaman [Arthur Curry]  ;   Batman (cameo) ;\n Lois Lane  ");
        assert_eq!(tight, loose);
    }

    #[test]
    fn empty_names_are_never_emitted() {
        for input in [
            "",
            ";;",
            "[Bruce Wayne]",
            " (cameo); ; [a; b]",
            "Batman; [x]; (y)",
            "]]]; ((",
        ] {
            let parsed = parse_characters(input);
            assert!(
                parsed.iter().all(|e| !e.name().trim().is_empty()),
                "empty name from {input:?}: {parsed:?}"
            );
        }
        assert_eq!(parse_characters("Batman; [x]; (y)").len(), 1);
    }

    #[test]
    fn repaired_input_matches_manual_fix_in_entity_count() {
        let broken = "Avengers [Iron Man [Tony Stark; Thor; Hulk]; Jarvis";
        let fixed = "Avengers [Iron Man [Tony Stark]; Thor; Hulk]; Jarvis";
        let a = parse_characters(broken);
        let b = parse_characters(fixed);
        assert_eq!(a.len(), b.len());
        assert!(a[0].is_team() && b[0].is_team());
        assert_eq!(a[1], individual("Jarvis", None, None));
    }

    #[test]
    fn repaired_pairs_parse_like_their_manual_fix() {
        let cases = [
            // Second inner `;` closes the alter-ego bracket.
            (
                "Avengers [Iron Man [Tony Stark; Thor; Hulk]",
                "Avengers [Iron Man [Tony Stark; Thor]; Hulk]",
            ),
            // Repair inside a team followed by more outer entries.
            (
                "Lois Lane; JLA [Superman [Clark Kent; Batman; Flash]; Alfred (cameo)",
                "Lois Lane; JLA [Superman [Clark Kent; Batman]; Flash]; Alfred (cameo)",
            ),
            // Trailing unmatched `[` on the last entry.
            ("Robin; Batman [Bruce Wayne", "Robin; Batman [Bruce Wayne]"),
            // Two open levels closed at end of input.
            (
                "Joker; Titans [Robin [Dick Grayson",
                "Joker; Titans [Robin [Dick Grayson]]",
            ),
            // Nested team with an unclosed inner bracket, closed at end.
            (
                "Titans [Robin [Dick Grayson]; Cyborg [Victor Stone",
                "Titans [Robin [Dick Grayson]; Cyborg [Victor Stone]]",
            ),
        ];
        for (broken, fixed) in cases {
            let a = parse_characters(broken);
            let b = parse_characters(fixed);
            assert_eq!(a.len(), b.len(), "entity count for {broken:?}");
            let kinds = |v: &[Entity]| v.iter().map(Entity::is_team).collect::<Vec<_>>();
            assert_eq!(kinds(&a), kinds(&b), "classification for {broken:?}");
        }
    }

    #[test]
    fn unclosed_alter_ego_is_closed_at_end() {
        assert_eq!(
            parse_characters("Batman [Bruce Wayne"),
            vec![individual("Batman", Some("Bruce Wayne"), None)]
        );
    }

    #[test]
    fn empty_bracket_means_no_alter_ego() {
        assert_eq!(
            parse_characters("Batman [] (cameo)"),
            vec![individual("Batman", None, Some("cameo"))]
        );
    }
}
