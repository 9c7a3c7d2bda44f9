pub mod migrate;
pub mod parse;
