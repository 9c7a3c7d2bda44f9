//! Text grammar for the free-text `characters` and credit columns.

pub mod brackets;
pub mod characters;
pub mod credits;

pub use brackets::{decompose_entry, fix_missing_brackets, split_top_level, EntryParts};
pub use characters::parse_characters;
pub use credits::parse_credits;
