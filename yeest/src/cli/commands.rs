//! CLI command execution.

use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;
use crate::controller::{ChatController, SendOutcome, SendSkipped};
use crate::server;
use crate::session::Session;
use crate::transport::{HttpTransport, Transport};

use super::args::{Cli, Commands};
use super::render::Renderer;

/// A line typed into the interactive loop.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Question(&'a str),
    Reset,
    Dismiss,
    Help,
    Quit,
    Unknown(&'a str),
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        if !trimmed.starts_with('/') {
            return Self::Question(trimmed);
        }
        match trimmed {
            "/reset" | "/clear" => Self::Reset,
            "/dismiss" => Self::Dismiss,
            "/help" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            other => Self::Unknown(other),
        }
    }
}

const HELP: &str = "\
Type a question and press enter.
  /reset     Clear the chat and the backend's memory and index
  /dismiss   Hide the current error banner
  /help      Show this help
  /quit      Leave";

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env(cli.backend_url.as_deref())?;
    if let Some(secs) = cli.chat_timeout_secs {
        config = config.with_chat_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.reset_timeout_secs {
        config = config.with_reset_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

fn controller(config: &Config) -> ChatController<HttpTransport> {
    ChatController::new(HttpTransport::new(config.backend_url.clone()), config)
}

// === Command Execution ===

pub async fn execute(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    tracing::debug!(backend = %config.backend_url, "configuration resolved");

    match cli.command {
        None => chat_loop(&config).await,
        Some(Commands::Ask { question }) => ask(&config, &question.join(" ")).await,
        Some(Commands::Reset) => reset(&config).await,
        Some(Commands::Health) => health(&config).await,
        Some(Commands::Serve { port, open }) => server::start_server(config, port, open).await,
    }
}

async fn chat_loop(config: &Config) -> Result<()> {
    let controller = controller(config);
    let mut renderer = Renderer::new(controller.subscribe(), false);

    println!("yeest - ask anything. Answers cite Wikipedia, news and Reddit.");
    println!("Backend: {}  (/help for commands)", config.backend_url);
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            println!();
            break;
        };

        match Input::parse(&line) {
            Input::Question(text) => {
                if let Err(skipped) = send_with_indicator(&controller, text).await {
                    tracing::debug!(reason = %skipped, "input ignored");
                }
            }
            Input::Reset => {
                controller.reset_session().await;
            }
            Input::Dismiss => controller.dismiss_error(),
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
            Input::Unknown(cmd) => println!("Unknown command {cmd}. Try /help."),
        }

        print!("{}", renderer.render_update());
    }

    Ok(())
}

/// Send a question, printing a notice once it is actually in flight.
async fn send_with_indicator<T: Transport>(
    controller: &ChatController<T>,
    text: &str,
) -> Result<SendOutcome, SendSkipped> {
    let mut rx = controller.subscribe();
    let send = controller.send_question(text);
    tokio::pin!(send);

    tokio::select! {
        outcome = &mut send => return outcome,
        Ok(_) = rx.wait_for(Session::is_pending) => println!("Thinking..."),
    }
    send.await
}

async fn ask(config: &Config, question: &str) -> Result<()> {
    let controller = controller(config);
    let mut renderer = Renderer::new(controller.subscribe(), true);

    let outcome = controller.send_question(question).await;
    print!("{}", renderer.render_update());

    match outcome {
        Ok(SendOutcome::Answered) => {
            let session = controller.snapshot();
            if session.turns().last().is_some_and(|t| t.sources.is_empty()) {
                println!("(no sources cited)");
            }
            Ok(())
        }
        Ok(SendOutcome::Discarded) => Ok(()),
        Ok(SendOutcome::Failed(err)) => bail!("Backend request failed: {err}"),
        Err(skipped) => bail!("Nothing sent: {skipped}"),
    }
}

async fn reset(config: &Config) -> Result<()> {
    let controller = controller(config);
    let outcome = controller.reset_session().await;

    if let Some(warning) = outcome.warning() {
        bail!(warning);
    }
    println!("Backend memory and document index cleared.");
    Ok(())
}

async fn health(config: &Config) -> Result<()> {
    let controller = controller(config);
    match controller.check_health().await {
        Ok(status) => {
            println!("{}: {status}", config.backend_url);
            Ok(())
        }
        Err(err) => bail!("{}: {err}", config.backend_url),
    }
}
