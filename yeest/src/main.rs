//! yeest - terminal front-end for a retrieval-augmented answer backend.
//!
//! Questions are forwarded to a remote backend that answers with citations
//! from Wikipedia, news and Reddit. The conversation lives only in this
//! process.
//!
//! Architecture:
//! - `transport` issues bounded-timeout JSON requests and classifies failures
//! - `session` holds the turns and UI flags behind a single-writer store
//! - `controller` sequences questions and resets against that store
//! - `cli` renders store snapshots; `server` proxies the backend over HTTP

mod cli;
mod config;
mod controller;
mod server;
mod session;
mod transport;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    execute(cli).await
}
