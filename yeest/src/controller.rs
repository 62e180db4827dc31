//! Chat session controller.
//!
//! Owns the [`SessionStore`] and is its only writer. Each operation applies
//! its local state transition first, then suspends on the transport, then
//! folds the result back into the session. Transport failures never escape
//! as errors: they become assistant turns or banner text.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::Config;
use crate::session::{HistoryEntry, Session, SessionStore, SourceRef, Turn};
use crate::transport::{Endpoint, Transport, TransportError};

/// Why a question was not sent. Both cases are routine input debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendSkipped {
    #[error("question is empty")]
    EmptyInput,
    #[error("a question is already pending")]
    AlreadyPending,
}

/// How a sent question settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// An answer turn was appended.
    Answered,
    /// A failure turn was appended and the banner set.
    Failed(TransportError),
    /// The session was reset while the question was in flight, so the reply
    /// was dropped.
    Discarded,
}

/// Result of the two best-effort backend resets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetOutcome {
    pub memory: Result<(), TransportError>,
    pub index: Result<(), TransportError>,
}

impl ResetOutcome {
    pub const fn is_complete(&self) -> bool {
        self.memory.is_ok() && self.index.is_ok()
    }

    /// Banner text describing a partial reset, `None` when both succeeded.
    pub fn warning(&self) -> Option<String> {
        let failures: Vec<String> = [
            ("memory", Endpoint::ResetMemory, &self.memory),
            ("index", Endpoint::ResetIndex, &self.index),
        ]
        .into_iter()
        .filter_map(|(name, endpoint, result)| {
            result
                .as_ref()
                .err()
                .map(|err| format!("{name}: {}", err.user_message(endpoint)))
        })
        .collect();

        if failures.is_empty() {
            return None;
        }

        Some(format!(
            "Chat cleared locally, but the backend could not be fully reset ({}). \
             Backend state may be inconsistent.",
            failures.join("; ")
        ))
    }
}

/// Success body of the `chat` endpoint.
#[derive(Debug, Deserialize)]
struct ChatReply {
    answer: String,
    #[serde(default)]
    sources: Option<Vec<SourceRef>>,
}

fn parse_reply(body: Value) -> Result<ChatReply, TransportError> {
    serde_json::from_value(body).map_err(|e| TransportError::Malformed(e.to_string()))
}

/// Sequences questions and resets against the backend.
pub struct ChatController<T> {
    transport: T,
    store: SessionStore,
    chat_timeout: Duration,
    reset_timeout: Duration,
}

impl<T: Transport> ChatController<T> {
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            transport,
            store: SessionStore::new(),
            chat_timeout: config.chat_timeout,
            reset_timeout: config.reset_timeout,
        }
    }

    /// Read-only view of the session, notified after every change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.store.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.store.snapshot()
    }

    /// Ask a question.
    ///
    /// Appends the user turn, sends it together with the conversation as it
    /// stood before it, and appends exactly one assistant turn when the call
    /// settles. `pending` is cleared on every settle path.
    pub async fn send_question(&self, text: &str) -> Result<SendOutcome, SendSkipped> {
        let question = text.trim();
        if question.is_empty() {
            tracing::debug!(reason = %SendSkipped::EmptyInput, "question skipped");
            return Err(SendSkipped::EmptyInput);
        }

        let mut begun: Result<(Uuid, Value), SendSkipped> = Err(SendSkipped::AlreadyPending);
        self.store.modify(|session| {
            if session.is_pending() {
                return false;
            }
            let payload = {
                let history: Vec<HistoryEntry<'_>> =
                    session.turns().iter().map(HistoryEntry::from).collect();
                json!({ "question": question, "history": history })
            };

            session.push(Turn::user(question));
            session.set_pending(true);
            session.set_last_error(None);
            begun = Ok((session.id(), payload));
            true
        });
        let (epoch, payload) = begun.inspect_err(|reason| {
            tracing::debug!(reason = %reason, "question skipped");
        })?;

        let result = self
            .transport
            .call(Endpoint::Chat, &payload, self.chat_timeout)
            .await
            .and_then(parse_reply);

        let mut outcome = SendOutcome::Discarded;
        self.store.modify(|session| {
            session.set_pending(false);
            if session.id() != epoch {
                return true;
            }
            match result {
                Ok(reply) => {
                    let sources = reply.sources.unwrap_or_default();
                    tracing::info!(
                        answer_len = reply.answer.len(),
                        sources = sources.len(),
                        "question answered"
                    );
                    session.push(Turn::assistant(reply.answer, sources));
                    outcome = SendOutcome::Answered;
                }
                Err(err) => {
                    let message = err.user_message(Endpoint::Chat);
                    tracing::warn!(kind = err.kind(), error = %err, "question failed");
                    session.push(Turn::failure(&message));
                    session.set_last_error(Some(message));
                    outcome = SendOutcome::Failed(err);
                }
            }
            true
        });

        if matches!(outcome, SendOutcome::Discarded) {
            tracing::info!("reply dropped: session was reset while the question was in flight");
        }
        Ok(outcome)
    }

    /// Clear the conversation, then ask the backend to forget its memory and
    /// its document index.
    ///
    /// The local clear is unconditional and happens before any network call.
    /// The two backend calls run in order and are not atomic; any failure is
    /// surfaced through the banner only.
    pub async fn reset_session(&self) -> ResetOutcome {
        self.store.modify(|session| {
            session.clear();
            true
        });

        let empty = json!({});
        let memory = self
            .transport
            .call(Endpoint::ResetMemory, &empty, self.reset_timeout)
            .await
            .map(drop);
        let index = self
            .transport
            .call(Endpoint::ResetIndex, &empty, self.reset_timeout)
            .await
            .map(drop);

        let outcome = ResetOutcome { memory, index };
        if outcome.is_complete() {
            tracing::info!("session reset");
        } else {
            tracing::warn!(
                memory_ok = outcome.memory.is_ok(),
                index_ok = outcome.index.is_ok(),
                "backend reset incomplete"
            );
            let warning = outcome.warning();
            self.store.modify(|session| {
                session.set_last_error(warning);
                true
            });
        }
        outcome
    }

    /// Clear the banner.
    pub fn dismiss_error(&self) {
        self.store.modify(|session| {
            if session.last_error().is_none() {
                return false;
            }
            session.set_last_error(None);
            true
        });
    }

    /// Probe the backend. Leaves the session untouched.
    pub async fn check_health(&self) -> Result<String, TransportError> {
        let body = self
            .transport
            .call(Endpoint::Health, &Value::Null, self.reset_timeout)
            .await?;
        body.get("status")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| TransportError::Malformed("missing `status` field".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Provenance, Role};
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    /// In-memory transport with queued replies per endpoint.
    #[derive(Default)]
    struct ScriptedTransport {
        calls: Mutex<Vec<(Endpoint, Value)>>,
        replies: Mutex<HashMap<Endpoint, VecDeque<Result<Value, TransportError>>>>,
        /// Holds calls to one endpoint until notified.
        gate: Option<(Endpoint, Arc<Notify>)>,
    }

    impl ScriptedTransport {
        fn reply(self, endpoint: Endpoint, result: Result<Value, TransportError>) -> Self {
            self.replies
                .lock()
                .unwrap()
                .entry(endpoint)
                .or_default()
                .push_back(result);
            self
        }

        fn gated(mut self, endpoint: Endpoint, gate: Arc<Notify>) -> Self {
            self.gate = Some((endpoint, gate));
            self
        }
    }

    impl Transport for ScriptedTransport {
        async fn call(
            &self,
            endpoint: Endpoint,
            payload: &Value,
            _timeout: Duration,
        ) -> Result<Value, TransportError> {
            self.calls.lock().unwrap().push((endpoint, payload.clone()));
            if let Some((held, gate)) = &self.gate {
                if *held == endpoint {
                    gate.notified().await;
                }
            }
            let queued = self
                .replies
                .lock()
                .unwrap()
                .get_mut(&endpoint)
                .and_then(VecDeque::pop_front);
            queued.unwrap_or_else(|| match endpoint {
                Endpoint::Chat => Ok(json!({"answer": "ok"})),
                _ => Ok(json!({"message": "ok"})),
            })
        }
    }

    fn config() -> Config {
        Config::from_lookup(None, |_| None).unwrap()
    }

    fn controller(transport: ScriptedTransport) -> ChatController<ScriptedTransport> {
        ChatController::new(transport, &config())
    }

    fn calls(c: &ChatController<ScriptedTransport>) -> Vec<(Endpoint, Value)> {
        c.transport.calls.lock().unwrap().clone()
    }

    fn roles(session: &Session) -> Vec<Role> {
        session.turns().iter().map(|t| t.role).collect()
    }

    fn unreachable() -> TransportError {
        TransportError::Unreachable("connection refused".to_string())
    }

    #[tokio::test]
    async fn answer_with_sources_is_appended() {
        let c = controller(ScriptedTransport::default().reply(
            Endpoint::Chat,
            Ok(json!({
                "answer": "Paris",
                "sources": [{"content": "...", "metadata": {"source": "wikipedia", "title": "France"}}]
            })),
        ));

        let outcome = c.send_question("What is the capital of France?").await;

        assert_eq!(outcome, Ok(SendOutcome::Answered));
        let session = c.snapshot();
        assert_eq!(session.turns().len(), 2);
        assert_eq!(session.turns()[0].content, "What is the capital of France?");
        let answer = &session.turns()[1];
        assert_eq!(answer.role, Role::Assistant);
        assert_eq!(answer.content, "Paris");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].provenance(), Provenance::Wikipedia);
        assert_eq!(answer.sources[0].title(), Some("France"));
        assert!(!session.is_pending());
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn absent_or_null_sources_default_to_empty() {
        let c = controller(
            ScriptedTransport::default()
                .reply(Endpoint::Chat, Ok(json!({"answer": "one"})))
                .reply(Endpoint::Chat, Ok(json!({"answer": "two", "sources": null}))),
        );

        c.send_question("a").await.unwrap();
        c.send_question("b").await.unwrap();

        let session = c.snapshot();
        assert!(session.turns()[1].sources.is_empty());
        assert!(session.turns()[3].sources.is_empty());
    }

    #[tokio::test]
    async fn question_is_trimmed() {
        let c = controller(ScriptedTransport::default());

        c.send_question("  hello there \n").await.unwrap();

        assert_eq!(c.snapshot().turns()[0].content, "hello there");
        assert_eq!(calls(&c)[0].1["question"], "hello there");
    }

    #[tokio::test]
    async fn history_excludes_the_new_question() {
        let c = controller(
            ScriptedTransport::default()
                .reply(Endpoint::Chat, Ok(json!({"answer": "first answer"})))
                .reply(Endpoint::Chat, Ok(json!({"answer": "second answer"}))),
        );

        c.send_question("first").await.unwrap();
        c.send_question("second").await.unwrap();

        let calls = calls(&c);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, json!({"question": "first", "history": []}));
        assert_eq!(
            calls[1].1,
            json!({
                "question": "second",
                "history": [
                    {"role": "user", "content": "first"},
                    {"role": "assistant", "content": "first answer"},
                ]
            })
        );
    }

    #[tokio::test]
    async fn rejected_detail_becomes_turn_and_banner() {
        let c = controller(ScriptedTransport::default().reply(
            Endpoint::Chat,
            Err(TransportError::Rejected {
                status: 422,
                detail: Some("bad question".to_string()),
            }),
        ));

        let outcome = c.send_question("??").await.unwrap();

        assert!(matches!(outcome, SendOutcome::Failed(TransportError::Rejected { status: 422, .. })));
        let session = c.snapshot();
        let turn = &session.turns()[1];
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn.content.contains("bad question"));
        assert!(turn.sources.is_empty());
        assert!(turn.is_failure());
        assert_eq!(session.last_error(), Some("bad question"));
        assert!(!session.is_pending());
    }

    #[tokio::test]
    async fn unreachable_backend_yields_unavailability_message() {
        let c = controller(ScriptedTransport::default().reply(Endpoint::Chat, Err(unreachable())));

        c.send_question("hello?").await.unwrap();

        let session = c.snapshot();
        assert_eq!(session.turns().len(), 2);
        assert!(session.turns()[1].content.contains("not available"));
        assert!(session.last_error().is_some_and(|e| !e.is_empty()));
        assert!(!session.is_pending());
    }

    #[tokio::test]
    async fn timeout_and_malformed_settle_cleanly() {
        let c = controller(
            ScriptedTransport::default()
                .reply(
                    Endpoint::Chat,
                    Err(TransportError::Timeout(Duration::from_secs(60))),
                )
                .reply(Endpoint::Chat, Ok(json!({"text": "no answer field"}))),
        );

        let first = c.send_question("slow").await.unwrap();
        let second = c.send_question("weird").await.unwrap();

        assert!(matches!(first, SendOutcome::Failed(TransportError::Timeout(_))));
        assert!(matches!(second, SendOutcome::Failed(TransportError::Malformed(_))));
        let session = c.snapshot();
        assert!(session.turns()[1].content.contains("too long"));
        assert!(session.turns()[3].content.contains("unreadable"));
        assert!(!session.is_pending());
    }

    #[tokio::test]
    async fn roles_alternate_across_mixed_outcomes() {
        let c = controller(
            ScriptedTransport::default()
                .reply(Endpoint::Chat, Ok(json!({"answer": "a"})))
                .reply(Endpoint::Chat, Err(unreachable()))
                .reply(
                    Endpoint::Chat,
                    Err(TransportError::Rejected {
                        status: 500,
                        detail: None,
                    }),
                )
                .reply(Endpoint::Chat, Ok(json!({"answer": "d"}))),
        );

        for q in ["one", "two", "", "three", "four"] {
            let _ = c.send_question(q).await;
        }

        let session = c.snapshot();
        assert_eq!(
            roles(&session),
            [
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
            ]
        );
        assert!(session.turns()[5].content.contains("Backend error"));
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let c = controller(ScriptedTransport::default());

        assert_eq!(c.send_question("   \t").await, Err(SendSkipped::EmptyInput));

        assert!(c.snapshot().turns().is_empty());
        assert!(calls(&c).is_empty());
    }

    #[tokio::test]
    async fn second_send_while_pending_is_ignored() {
        let gate = Arc::new(Notify::new());
        let c = controller(
            ScriptedTransport::default()
                .gated(Endpoint::Chat, Arc::clone(&gate))
                .reply(Endpoint::Chat, Ok(json!({"answer": "first"}))),
        );

        let first = c.send_question("first");
        let second = async {
            let mut rx = c.subscribe();
            rx.wait_for(Session::is_pending).await.unwrap();
            let skipped = c.send_question("second").await;
            gate.notify_one();
            skipped
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first, Ok(SendOutcome::Answered));
        assert_eq!(second, Err(SendSkipped::AlreadyPending));
        assert_eq!(calls(&c).len(), 1);
        let session = c.snapshot();
        assert_eq!(session.turns().len(), 2);
        assert_eq!(session.turns()[1].content, "first");
        assert!(!session.is_pending());
    }

    #[tokio::test]
    async fn success_clears_previous_banner() {
        let c = controller(ScriptedTransport::default().reply(Endpoint::Chat, Err(unreachable())));

        c.send_question("one").await.unwrap();
        assert!(c.snapshot().last_error().is_some());

        c.send_question("two").await.unwrap();
        assert!(c.snapshot().last_error().is_none());
    }

    #[tokio::test]
    async fn reset_clears_and_calls_both_endpoints_in_order() {
        let c = controller(ScriptedTransport::default());
        c.send_question("hi").await.unwrap();

        let outcome = c.reset_session().await;

        assert!(outcome.is_complete());
        assert!(outcome.warning().is_none());
        let session = c.snapshot();
        assert!(session.turns().is_empty());
        assert!(session.last_error().is_none());
        let endpoints: Vec<Endpoint> = calls(&c).into_iter().map(|(e, _)| e).collect();
        assert_eq!(
            endpoints,
            [Endpoint::Chat, Endpoint::ResetMemory, Endpoint::ResetIndex]
        );
    }

    #[tokio::test]
    async fn local_clear_happens_before_backend_reset() {
        let gate = Arc::new(Notify::new());
        let c = controller(
            ScriptedTransport::default()
                .gated(Endpoint::ResetMemory, Arc::clone(&gate))
                .reply(Endpoint::Chat, Err(unreachable())),
        );
        c.send_question("hi").await.unwrap();
        assert!(c.snapshot().last_error().is_some());

        let reset = c.reset_session();
        let observe = async {
            while !calls(&c).iter().any(|(e, _)| *e == Endpoint::ResetMemory) {
                tokio::task::yield_now().await;
            }
            let during = (c.snapshot(), calls(&c).len());
            gate.notify_one();
            during
        };
        let (outcome, (during, calls_in_flight)) = tokio::join!(reset, observe);

        assert!(during.turns().is_empty());
        assert!(during.last_error().is_none());
        assert_eq!(calls_in_flight, 2);
        assert_eq!(calls(&c).len(), 3);
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn partial_reset_clears_locally_and_warns() {
        let c = controller(ScriptedTransport::default().reply(
            Endpoint::ResetIndex,
            Err(TransportError::Rejected {
                status: 500,
                detail: Some("Error clearing vector store: locked".to_string()),
            }),
        ));
        c.send_question("hi").await.unwrap();

        let outcome = c.reset_session().await;

        assert!(outcome.memory.is_ok());
        assert!(outcome.index.is_err());
        let session = c.snapshot();
        assert!(session.turns().is_empty());
        let banner = session.last_error().unwrap();
        assert!(banner.contains("cleared locally"));
        assert!(banner.contains("index: Error clearing vector store: locked"));
        assert!(!banner.contains("memory:"));
    }

    #[tokio::test]
    async fn index_reset_still_attempted_when_memory_reset_fails() {
        let c = controller(ScriptedTransport::default().reply(Endpoint::ResetMemory, Err(unreachable())));

        let outcome = c.reset_session().await;

        assert!(outcome.memory.is_err());
        assert!(outcome.index.is_ok());
        assert_eq!(calls(&c).len(), 2);
        assert!(c.snapshot().turns().is_empty());
        assert!(c.snapshot().last_error().unwrap().contains("memory:"));
    }

    #[tokio::test]
    async fn reset_on_empty_session_still_calls_backend() {
        let c = controller(ScriptedTransport::default());

        c.reset_session().await;

        assert_eq!(calls(&c).len(), 2);
        assert!(c.snapshot().turns().is_empty());
    }

    #[tokio::test]
    async fn reply_arriving_after_reset_is_dropped() {
        let gate = Arc::new(Notify::new());
        let c = controller(
            ScriptedTransport::default()
                .gated(Endpoint::Chat, Arc::clone(&gate))
                .reply(Endpoint::Chat, Ok(json!({"answer": "stale"}))),
        );

        let send = c.send_question("question");
        let reset = async {
            let mut rx = c.subscribe();
            rx.wait_for(Session::is_pending).await.unwrap();
            let outcome = c.reset_session().await;
            gate.notify_one();
            outcome
        };
        let (sent, reset) = tokio::join!(send, reset);

        assert_eq!(sent, Ok(SendOutcome::Discarded));
        assert!(reset.is_complete());
        let session = c.snapshot();
        assert!(session.turns().is_empty());
        assert!(!session.is_pending());
    }

    #[tokio::test]
    async fn dismiss_error_clears_banner() {
        let c = controller(ScriptedTransport::default().reply(Endpoint::Chat, Err(unreachable())));
        c.send_question("hi").await.unwrap();

        c.dismiss_error();

        let session = c.snapshot();
        assert!(session.last_error().is_none());
        assert_eq!(session.turns().len(), 2);
    }

    #[tokio::test]
    async fn health_reports_status() {
        let c = controller(
            ScriptedTransport::default()
                .reply(Endpoint::Health, Ok(json!({"status": "healthy"})))
                .reply(Endpoint::Health, Ok(json!({"ok": true}))),
        );

        assert_eq!(c.check_health().await, Ok("healthy".to_string()));
        assert!(matches!(
            c.check_health().await,
            Err(TransportError::Malformed(_))
        ));
        assert!(c.snapshot().turns().is_empty());
    }
}
