//! CLI argument definitions.

use clap::{Parser, Subcommand};

/// yeest - chat with a retrieval-augmented answer backend
#[derive(Parser, Debug)]
#[command(name = "yeest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Backend base address (overrides BACKEND_URL)
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Seconds to wait for an answer (default: 60)
    #[arg(long, global = true)]
    pub chat_timeout_secs: Option<u64>,

    /// Seconds to wait for reset and health calls (default: 10)
    #[arg(long, global = true)]
    pub reset_timeout_secs: Option<u64>,

    /// Subcommand to execute; starts an interactive chat when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set. The chat loop stays quiet
    /// so log lines do not interleave with the conversation.
    pub fn default_log_level(&self) -> &'static str {
        match self.command {
            Some(Commands::Serve { .. }) => "info",
            _ => "warn",
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// The question
        #[arg(trailing_var_arg = true, required = true)]
        question: Vec<String>,
    },

    /// Clear the backend's conversation memory and document index
    Reset,

    /// Check that the backend is up
    Health,

    /// Run the local API proxy
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Open the proxy address in the browser once listening
        #[arg(long)]
        open: bool,
    },
}
