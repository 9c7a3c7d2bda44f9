use anyhow::Result;

use crate::model::CreditRole;
use crate::parser::{parse_characters, parse_credits};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ParseKind {
    Characters,
    Credits,
}

#[derive(Debug, Clone)]
pub struct ParseConfig {
    pub kind: ParseKind,
    /// Only used for credits.
    pub role: CreditRole,
    pub text: String,
}

/// Parse `text` offline and print the result as pretty JSON.
pub fn run(cfg: ParseConfig) -> Result<()> {
    println!("{}", render(&cfg)?);
    Ok(())
}

pub fn render(cfg: &ParseConfig) -> Result<String> {
    let out = match cfg.kind {
        ParseKind::Characters => serde_json::to_string_pretty(&parse_characters(&cfg.text))?,
        ParseKind::Credits => serde_json::to_string_pretty(&parse_credits(cfg.role, &cfg.text))?,
    };
    Ok(out)
}
