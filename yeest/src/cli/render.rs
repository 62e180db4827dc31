//! Plain-text rendering of session snapshots.

use std::fmt::Write;

use chrono::Local;
use tokio::sync::watch;
use uuid::Uuid;

use crate::session::{Role, Session, SourceRef, Turn};

/// Longest excerpt shown under a citation, in characters.
const EXCERPT_CHARS: usize = 160;

/// Turns a stream of session snapshots into incremental terminal output.
pub struct Renderer {
    rx: watch::Receiver<Session>,
    epoch: Uuid,
    shown: usize,
    banner: Option<String>,
    echo_user: bool,
}

impl Renderer {
    /// `echo_user` controls whether user turns are printed; the interactive
    /// loop leaves them out since the terminal already shows what was typed.
    pub fn new(rx: watch::Receiver<Session>, echo_user: bool) -> Self {
        let epoch = rx.borrow().id();
        Self {
            rx,
            epoch,
            shown: 0,
            banner: None,
            echo_user,
        }
    }

    /// Render everything that changed since the previous call.
    pub fn render_update(&mut self) -> String {
        let session = self.rx.borrow_and_update();
        let mut out = String::new();

        if session.id() != self.epoch {
            self.epoch = session.id();
            self.shown = 0;
            out.push_str("-- chat cleared --\n");
        }

        for turn in session.turns().get(self.shown..).unwrap_or_default() {
            if turn.role == Role::User && !self.echo_user {
                continue;
            }
            render_turn(turn, &mut out);
        }
        self.shown = session.turns().len();

        let banner = session.last_error().map(String::from);
        if let Some(ref text) = banner {
            if self.banner.as_ref() != Some(text) {
                let _ = writeln!(out, "Error: {text}");
            }
        }
        self.banner = banner;

        out
    }
}

fn render_turn(turn: &Turn, out: &mut String) {
    let time = turn.created_at.with_timezone(&Local).format("%H:%M");
    let who = match turn.role {
        Role::User => "you",
        Role::Assistant if turn.is_failure() => "yeest (failed)",
        Role::Assistant => "yeest",
    };
    let _ = writeln!(out, "[{time}] {who}:");
    let _ = writeln!(out, "{}", turn.content);

    if !turn.sources.is_empty() {
        out.push_str("  Sources:\n");
        for (i, source) in turn.sources.iter().enumerate() {
            render_source(i + 1, source, out);
        }
    }
    out.push('\n');
}

fn render_source(n: usize, source: &SourceRef, out: &mut String) {
    let heading = match (source.provenance().label(), source.title()) {
        (Some(label), Some(title)) => format!("{label}: {title}"),
        (Some(label), None) => label.to_string(),
        (None, Some(title)) => title.to_string(),
        (None, None) => "Source".to_string(),
    };
    let _ = writeln!(out, "  {n}. {heading}");
    let _ = writeln!(out, "     {}", excerpt(&source.content));
    if let Some(url) = source.url() {
        let _ = writeln!(out, "     {url}");
    }
}

fn excerpt(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > EXCERPT_CHARS {
        let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
        format!("{cut}...")
    } else {
        flat
    }
}
