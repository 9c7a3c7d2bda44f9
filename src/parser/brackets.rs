//! Bracket-aware grammar shared by the character and credit parsers.
//!
//! Fields look like `name [bracketed] (notes); name [bracketed]; name`.
//! Separators only count outside `[...]` and `(...)`.

/// Close brackets the upstream data left open.
///
/// Only `[`/`]` nesting is tracked. Inside a second-level bracket, a `;` seen
/// for the second time before that bracket closes means the inner bracket was
/// never closed: a `]` is inserted before the `;`. Whatever is still open at
/// the end of input gets closed. Parentheses are not repaired.
pub fn fix_missing_brackets(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    let mut depth: usize = 0;
    let mut semicolon_seen = false;

    for c in input.chars() {
        match c {
            '[' => {
                depth += 1;
                if depth == 2 {
                    semicolon_seen = false;
                }
            }
            ']' => {
                if depth == 2 {
                    semicolon_seen = false;
                }
                depth = depth.saturating_sub(1);
            }
            ';' if depth == 2 => {
                if semicolon_seen {
                    out.push(']');
                    depth -= 1;
                    semicolon_seen = false;
                } else {
                    semicolon_seen = true;
                }
            }
            _ => {}
        }
        out.push(c);
    }

    for _ in 0..depth {
        out.push(']');
    }
    out
}

/// Split on `;` where bracket/parenthesis depth is zero or below.
///
/// Pieces are trimmed; empty pieces are dropped.
pub fn split_top_level(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ';' if depth <= 0 => {
                push_piece(&mut pieces, &text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    push_piece(&mut pieces, &text[start..]);
    pieces
}

fn push_piece<'a>(pieces: &mut Vec<&'a str>, raw: &'a str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        pieces.push(trimmed);
    }
}

/// The three captures of one entry: `name [bracket] (paren) trailing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryParts<'a> {
    pub name: &'a str,
    pub bracket: Option<&'a str>,
    pub paren: Option<&'a str>,
    /// Anything after the last capture, trimmed. Usually empty.
    pub trailing: &'a str,
}

/// Decompose one top-level entry.
///
/// `name` is everything before the first `[` or `(`. The bracket capture is
/// the text inside the first balanced `[...]`, the paren capture the text
/// inside a balanced `(...)` following it (only whitespace in between). A
/// delimiter without its closing partner is treated as absent. Empty
/// captures become `None`.
pub fn decompose_entry(entry: &str) -> EntryParts<'_> {
    let Some(open) = entry.find(['[', '(']) else {
        return EntryParts {
            name: entry.trim(),
            ..EntryParts::default()
        };
    };

    let name = entry[..open].trim();
    let mut rest = &entry[open..];
    let mut bracket = None;

    if rest.starts_with('[') {
        match enclosed(rest, '[', ']') {
            Some((inside, after)) => {
                bracket = non_empty(inside);
                rest = after.trim_start();
            }
            None => {
                return EntryParts {
                    name,
                    trailing: rest.trim(),
                    ..EntryParts::default()
                }
            }
        }
    }

    let mut paren = None;
    if rest.starts_with('(') {
        if let Some((inside, after)) = enclosed(rest, '(', ')') {
            paren = non_empty(inside);
            rest = after;
        }
    }

    EntryParts {
        name,
        bracket,
        paren,
        trailing: rest.trim(),
    }
}

/// `text` starts with `open`; return the balanced inside and what follows
/// the matching `close`.
fn enclosed(text: &str, open: char, close: char) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                let start = open.len_utf8();
                return Some((&text[start..i], &text[i + close.len_utf8()..]));
            }
        }
    }
    None
}

fn non_empty(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_ignores_nested_separators() {
        let pieces = split_top_level("A [x; y]; B (p; q);; C ;");
        assert_eq!(pieces, vec!["A [x; y]", "B (p; q)", "C"]);
    }

    #[test]
    fn split_keeps_splitting_after_stray_close() {
        assert_eq!(split_top_level(") A; B"), vec![") A", "B"]);
    }

    #[test]
    fn repair_closes_trailing_open_bracket() {
        assert_eq!(fix_missing_brackets("Batman [Bruce Wayne"), "Batman [Bruce Wayne]");
        assert_eq!(fix_missing_brackets("T [a [b"), "T [a [b]]");
    }

    #[test]
    fn repair_inserts_close_on_second_inner_semicolon() {
        assert_eq!(
            fix_missing_brackets("Avengers [Iron Man [Tony Stark; Thor; Hulk]"),
            "Avengers [Iron Man [Tony Stark; Thor]; Hulk]"
        );
    }

    #[test]
    fn repair_leaves_well_formed_input_alone() {
        let s = "Avengers [Iron Man [Tony Stark]; Thor; Hulk]; Jarvis (cameo)";
        assert_eq!(fix_missing_brackets(s), s);
    }

    #[test]
    fn repair_tolerates_stray_close() {
        assert_eq!(fix_missing_brackets("] A [b]"), "] A [b]");
    }

    #[test]
    fn decompose_all_parts() {
        let p = decompose_entry("Batman [Bruce Wayne] (cameo)");
        assert_eq!(p.name, "Batman");
        assert_eq!(p.bracket, Some("Bruce Wayne"));
        assert_eq!(p.paren, Some("cameo"));
        assert_eq!(p.trailing, "");
    }

    #[test]
    fn decompose_paren_only_and_nested_bracket() {
        let p = decompose_entry("Joker (flashback)");
        assert_eq!((p.name, p.bracket, p.paren), ("Joker", None, Some("flashback")));

        let p = decompose_entry("Avengers [Iron Man [Tony Stark]; Thor]");
        assert_eq!(p.bracket, Some("Iron Man [Tony Stark]; Thor"));
    }

    #[test]
    fn decompose_unmatched_paren_is_absent() {
        let p = decompose_entry("Batman (cameo");
        assert_eq!(p.name, "Batman");
        assert_eq!(p.paren, None);
        assert_eq!(p.trailing, "(cameo");
    }

    #[test]
    fn decompose_empty_captures_are_none() {
        let p = decompose_entry("Robin [ ] ()?");
        assert_eq!((p.bracket, p.paren, p.trailing), (None, None, "?"));
    }
}
