use std::sync::OnceLock;

use regex::Regex;

static WHITESPACE: OnceLock<Regex> = OnceLock::new();

fn whitespace() -> &'static Regex {
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"))
}

/// Natural key used to find an existing character or creator by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameKey {
    display: String,
    normalized: String,
}

impl NameKey {
    /// Build a key from a raw parsed name.
    ///
    /// Normalization steps:
    /// - trim surrounding whitespace
    /// - collapse inner whitespace runs to a single space
    /// - lowercase (Unicode aware, so "ÉMILE" and "émile" match)
    pub fn new(raw: &str) -> Self {
        let display = collapse_whitespace(raw);
        let normalized = display.to_lowercase();
        Self {
            display,
            normalized,
        }
    }

    /// Name as it should be stored for display (trimmed, single-spaced).
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Lookup form compared across rows.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

/// Trim and collapse whitespace runs; case is preserved.
fn collapse_whitespace(raw: &str) -> String {
    whitespace().replace_all(raw.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_spacing_and_case() {
        let a = NameKey::new("  Bruce\t  Wayne ");
        let b = NameKey::new("bruce wayne");
        assert_eq!(a.display(), "Bruce Wayne");
        assert_eq!(a.normalized(), b.normalized());
    }

    #[test]
    fn lowercases_non_ascii() {
        assert_eq!(NameKey::new("ÉMILE").normalized(), "émile");
    }

    #[test]
    fn blank_normalizes_to_empty() {
        assert_eq!(NameKey::new(" \n ").normalized(), "");
    }
}
