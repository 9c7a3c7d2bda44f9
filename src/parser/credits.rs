use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Credit, CreditRole};

use super::brackets::{decompose_entry, fix_missing_brackets, split_top_level};

static AS_PREFIX: OnceLock<Regex> = OnceLock::new();

fn as_prefix() -> &'static Regex {
    AS_PREFIX.get_or_init(|| Regex::new(r"(?i)^as\s+").expect("static alias pattern"))
}

/// Names that stand for "no credit" rather than a creator.
const PLACEHOLDERS: [&str; 3] = ["?", "none", "n/a"];

/// Parse one credit column (`script`, `pencils`, ...) into credits.
///
/// Same entry grammar as the character list: `name [as alias] (notes)`.
/// A `?` after the name or at the end of the entry marks the credit as
/// uncertain.
pub fn parse_credits(role: CreditRole, input: &str) -> Vec<Credit> {
    let repaired = fix_missing_brackets(input);
    split_top_level(&repaired)
        .into_iter()
        .filter_map(|entry| parse_entry(role, entry))
        .collect()
}

fn parse_entry(role: CreditRole, entry: &str) -> Option<Credit> {
    let parts = decompose_entry(entry);

    let mut name = parts.name;
    let mut uncertain = parts.trailing.ends_with('?');
    if let Some(stripped) = name.strip_suffix('?') {
        name = stripped.trim_end();
        uncertain = true;
    }
    if name.is_empty() || PLACEHOLDERS.iter().any(|p| name.eq_ignore_ascii_case(p)) {
        return None;
    }

    let credited_as = parts
        .bracket
        .map(|b| as_prefix().replace(b, "").trim().to_string())
        .filter(|b| !b.is_empty());

    Some(Credit {
        role,
        name: name.to_string(),
        credited_as,
        notes: parts.paren.map(str::to_string),
        uncertain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_alias_notes_and_uncertainty() {
        let credits = parse_credits(
            CreditRole::Script,
            "Stan Lee [as S. Lee] (signed); Jack Kirby ?; Steve Ditko (plot) ?",
        );
        assert_eq!(credits.len(), 3);

        assert_eq!(credits[0].name, "Stan Lee");
        assert_eq!(credits[0].credited_as.as_deref(), Some("S. Lee"));
        assert_eq!(credits[0].notes.as_deref(), Some("signed"));
        assert!(!credits[0].uncertain);

        assert_eq!(credits[1].name, "Jack Kirby");
        assert!(credits[1].uncertain);

        assert_eq!(credits[2].name, "Steve Ditko");
        assert_eq!(credits[2].notes.as_deref(), Some("plot"));
        assert!(credits[2].uncertain);
        assert!(credits.iter().all(|c| c.role == CreditRole::Script));
    }

    #[test]
    fn placeholders_are_skipped() {
        assert!(parse_credits(CreditRole::Inks, "?").is_empty());
        assert!(parse_credits(CreditRole::Inks, "None; ;n/a").is_empty());
        assert_eq!(parse_credits(CreditRole::Inks, "?; Joe Sinnott").len(), 1);
    }

    #[test]
    fn alias_without_as_prefix_is_kept() {
        let credits = parse_credits(CreditRole::Pencils, "Bob Kane [Bill Finger]");
        assert_eq!(credits[0].credited_as.as_deref(), Some("Bill Finger"));
    }
}
