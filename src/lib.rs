pub mod cli;
pub mod extract;
pub mod logging;
pub mod model;
pub mod normalization;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod store;

pub mod util {
    pub mod db;
    pub mod env;
}
