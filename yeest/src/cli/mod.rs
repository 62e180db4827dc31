//! Command-line surface and terminal rendering.

mod args;
mod commands;
mod render;

pub use args::Cli;
pub use commands::execute;
