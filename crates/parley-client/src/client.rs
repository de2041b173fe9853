//! Streaming session client
//!
//! [`ChatClient`] owns the session id, the [`Ledger`] and the [`Typewriter`]
//! and runs at most one turn at a time. A turn is registered in the
//! `active_turn` slot together with its cancellation token; every ledger
//! write made on behalf of a turn happens while that slot still names it,
//! so a turn that has been cancelled or superseded can no longer touch the
//! transcript.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ClientConfig;
use crate::decoder::decode_stream;
use crate::error::{ClientError, Result};
use crate::http_client::{build_http_client, check_status};
use crate::ledger::{Ledger, Message, MessagePatch};
use crate::models::{
    ChatRequest, ChatResponse, HealthResponse, HistoryEntry, NewSessionResponse, ResetResponse,
    SessionHistory, StreamEvent,
};
use crate::session::SessionStore;
use crate::typewriter::Typewriter;

const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Where the current (or last) turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

/// Terminal result of one streamed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    /// Stopped by [`ChatClient::cancel`] or by a newer turn. Not a failure.
    Cancelled,
    /// Transport or application failure; the text is also shown in the
    /// pending message as `Error: <text>`.
    Failed(String),
}

#[derive(Debug, Clone)]
struct TurnHandle {
    id: u64,
    token: CancellationToken,
}

struct Inner {
    http: Client,
    base_url: Url,
    request_timeout: Duration,
    store: SessionStore,
    /// Authoritative while the process runs; `store` is only a mirror.
    session_id: Mutex<Option<String>>,
    ledger: Ledger,
    typewriter: Typewriter,
    active_turn: Mutex<Option<TurnHandle>>,
    turn_state: watch::Sender<TurnState>,
    next_turn_id: AtomicU64,
}

/// Client for the chat backend. Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<Inner>,
}

impl ChatClient {
    /// Build a client and restore the session id from `store`.
    ///
    /// Spawns the typewriter task, so it must be called within a Tokio runtime.
    pub fn new(config: ClientConfig, store: SessionStore) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;
        let http = build_http_client(config.connect_timeout())?;
        let ledger = Ledger::new();
        let typewriter = Typewriter::new(ledger.clone(), config.typewriter.clone());

        let session_id = store.get();
        if let Some(id) = &session_id {
            tracing::debug!(session_id = %id, "Restored session id");
        }

        let (turn_state, _) = watch::channel(TurnState::Idle);

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                request_timeout: config.request_timeout(),
                store,
                session_id: Mutex::new(session_id),
                ledger,
                typewriter,
                active_turn: Mutex::new(None),
                turn_state,
                next_turn_id: AtomicU64::new(1),
            }),
        })
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.session_id.lock().clone()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.inner.ledger
    }

    pub fn typewriter(&self) -> &Typewriter {
        &self.inner.typewriter
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Change feed for the turn state machine.
    pub fn turn_state(&self) -> watch::Receiver<TurnState> {
        self.inner.turn_state.subscribe()
    }

    /// Whether a turn is currently registered.
    pub fn is_streaming(&self) -> bool {
        self.inner.active_turn.lock().is_some()
    }

    /// Send `text` over the event stream and reconcile the reply into the
    /// ledger. Any turn still open is cancelled first.
    pub async fn send_streaming(&self, text: &str) -> TurnOutcome {
        let turn = self.begin_turn(text);
        let outcome = self.run_stream(text, &turn).await;
        self.finish_turn(&turn, outcome)
    }

    /// Abort the open turn, if any. Text already shown stays; queued text is
    /// dropped. Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        let mut active = self.inner.active_turn.lock();
        self.cancel_locked(&mut active)
    }

    /// Plain request/response exchange via `POST /message`.
    ///
    /// The request itself is not aborted by [`cancel`](Self::cancel); a reply
    /// that arrives after the turn was cancelled or superseded is returned but
    /// no longer written to the ledger.
    pub async fn send_once(&self, text: &str) -> Result<ChatResponse> {
        let turn = self.begin_turn(text);

        match self.post_message(text).await {
            Ok(response) => {
                // The server recorded the exchange under this session even if
                // the turn was cancelled meanwhile.
                self.adopt_session(&response.session_id);
                self.with_turn(&turn, |ledger| {
                    ledger.update_last(
                        MessagePatch::new()
                            .content(response.response.clone())
                            .agent_used(response.agent_used.clone()),
                    );
                });
                self.finish_turn(&turn, TurnOutcome::Completed);
                Ok(response)
            }
            Err(err) => {
                self.finish_turn(&turn, TurnOutcome::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Ask the server to forget the session, then clear the local session id
    /// and the ledger whatever the server said.
    pub async fn reset_conversation(&self) -> Result<ResetResponse> {
        self.cancel();

        let session_id = self.session_id();
        let result = self.request_reset(session_id.as_deref()).await;
        if let Err(err) = &result {
            tracing::warn!(error = %err, "Server-side reset failed; clearing local state anyway");
        }

        self.clear_session();
        self.inner.ledger.clear();
        self.inner.turn_state.send_replace(TurnState::Idle);
        result
    }

    /// Request a fresh session id, adopt it and start an empty transcript.
    pub async fn new_session(&self) -> Result<String> {
        let url = self.endpoint(&["session", "new"])?;
        let response = self
            .inner
            .http
            .post(url)
            .timeout(self.inner.request_timeout)
            .send()
            .await?;
        let created: NewSessionResponse = check_status(response).await?.json().await?;

        if created.session_id.is_empty() {
            return Err(ClientError::Application(
                "Server returned an empty session id".to_string(),
            ));
        }

        self.cancel();
        self.adopt_session(&created.session_id);
        self.inner.ledger.clear();
        self.inner.turn_state.send_replace(TurnState::Idle);
        Ok(created.session_id)
    }

    /// `GET /health`. Every failure is reported as [`ClientError::Connectivity`].
    pub async fn health_check(&self) -> Result<HealthResponse> {
        self.fetch_health()
            .await
            .map_err(|err| ClientError::Connectivity(err.to_string()))
    }

    /// Replace the ledger with the server's transcript for the current
    /// session. Returns the number of messages loaded (0 without a session).
    pub async fn load_history(&self) -> Result<usize> {
        let Some(session_id) = self.session_id() else {
            return Ok(0);
        };

        let url = self.endpoint(&["session", &session_id, "history"])?;
        let response = self
            .inner
            .http
            .get(url)
            .timeout(self.inner.request_timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::info!(session_id = %session_id, "Server no longer knows this session");
            self.clear_session();
            return Err(ClientError::SessionNotFound(session_id));
        }

        let history: SessionHistory = check_status(response).await?.json().await?;
        let messages: Vec<Message> = history
            .messages
            .into_iter()
            .filter_map(history_message)
            .collect();
        let count = messages.len();

        self.cancel();
        self.inner.ledger.replace_all(messages);
        Ok(count)
    }

    fn begin_turn(&self, text: &str) -> TurnHandle {
        let turn = TurnHandle {
            id: self.inner.next_turn_id.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };

        let mut active = self.inner.active_turn.lock();
        self.cancel_locked(&mut active);
        *active = Some(turn.clone());

        self.inner.ledger.append(Message::user(text));
        self.inner.ledger.append(Message::pending_assistant());
        self.inner.turn_state.send_replace(TurnState::Requesting);
        tracing::debug!(turn = turn.id, "Turn started");

        turn
    }

    fn cancel_locked(&self, active: &mut Option<TurnHandle>) -> bool {
        let Some(turn) = active.take() else {
            return false;
        };

        turn.token.cancel();
        self.inner.typewriter.reset();
        self.inner
            .ledger
            .update_last(MessagePatch::new().pending(false));
        self.inner.turn_state.send_replace(TurnState::Cancelled);
        tracing::debug!(turn = turn.id, "Turn cancelled");
        true
    }

    /// Run `f` only if `turn` is still the active turn.
    fn with_turn<R>(&self, turn: &TurnHandle, f: impl FnOnce(&Ledger) -> R) -> Option<R> {
        let active = self.inner.active_turn.lock();
        if active.as_ref().is_some_and(|current| current.id == turn.id) {
            Some(f(&self.inner.ledger))
        } else {
            None
        }
    }

    async fn run_stream(&self, text: &str, turn: &TurnHandle) -> TurnOutcome {
        let url = match self.endpoint(&["stream"]) {
            Ok(url) => url,
            Err(err) => return TurnOutcome::Failed(err.to_string()),
        };
        let request = ChatRequest::new(text, self.session_id());
        tracing::debug!(
            turn = turn.id,
            has_session = request.session_id.is_some(),
            "Opening event stream"
        );

        let send = self
            .inner
            .http
            .post(url)
            .header(ACCEPT, EVENT_STREAM_MIME)
            .json(&request)
            .send();

        let response = match until_cancelled(turn, send).await {
            None => return TurnOutcome::Cancelled,
            Some(Err(err)) => return TurnOutcome::Failed(ClientError::from(err).to_string()),
            Some(Ok(response)) => response,
        };
        let response = match until_cancelled(turn, check_status(response)).await {
            None => return TurnOutcome::Cancelled,
            Some(Err(err)) => return TurnOutcome::Failed(err.to_string()),
            Some(Ok(response)) => response,
        };

        self.with_turn(turn, |_| {
            self.inner.turn_state.send_replace(TurnState::Streaming);
        });
        self.consume_events(decode_stream(response.bytes_stream()), turn)
            .await
    }

    async fn consume_events<S>(&self, events: S, turn: &TurnHandle) -> TurnOutcome
    where
        S: Stream<Item = Result<StreamEvent>>,
    {
        let mut events = std::pin::pin!(events);

        loop {
            let Some(next) = until_cancelled(turn, events.next()).await else {
                return TurnOutcome::Cancelled;
            };

            let event = match next {
                None => {
                    tracing::warn!(
                        turn = turn.id,
                        "Stream closed without done or error; treating turn as complete"
                    );
                    return self.complete(turn, None).await;
                }
                Some(Err(err)) => return TurnOutcome::Failed(err.to_string()),
                Some(Ok(event)) => event,
            };

            match event {
                StreamEvent::Session { session_id } => {
                    self.with_turn(turn, |_| self.adopt_session(&session_id));
                }
                StreamEvent::Agent { agent } => {
                    // Text queued before this event is delivered first.
                    if !self.drain(turn).await {
                        return TurnOutcome::Cancelled;
                    }
                    self.with_turn(turn, |ledger| {
                        ledger.update_last(MessagePatch::new().agent_used(agent));
                    });
                }
                StreamEvent::Content { content } => {
                    self.with_turn(turn, |_| self.inner.typewriter.push(content));
                }
                StreamEvent::Done { agent } => return self.complete(turn, agent).await,
                StreamEvent::Error { error } => {
                    if !self.drain(turn).await {
                        return TurnOutcome::Cancelled;
                    }
                    return TurnOutcome::Failed(error);
                }
            }
        }
    }

    /// Wait for the typewriter to flush. False if the turn was cancelled
    /// meanwhile.
    async fn drain(&self, turn: &TurnHandle) -> bool {
        until_cancelled(turn, self.inner.typewriter.wait_idle())
            .await
            .is_some()
    }

    async fn complete(&self, turn: &TurnHandle, agent: Option<String>) -> TurnOutcome {
        if !self.drain(turn).await {
            return TurnOutcome::Cancelled;
        }

        if let Some(agent) = agent {
            self.with_turn(turn, |ledger| {
                ledger.update_last(MessagePatch::new().agent_used(agent));
            });
        }
        TurnOutcome::Completed
    }

    /// Apply the terminal state of `turn` exactly once.
    fn finish_turn(&self, turn: &TurnHandle, outcome: TurnOutcome) -> TurnOutcome {
        let mut active = self.inner.active_turn.lock();
        if !active.as_ref().is_some_and(|current| current.id == turn.id) {
            // `cancel` already finalized this turn.
            return TurnOutcome::Cancelled;
        }
        *active = None;

        let (patch, state) = match &outcome {
            TurnOutcome::Completed => (MessagePatch::new().pending(false), TurnState::Completed),
            TurnOutcome::Cancelled => {
                self.inner.typewriter.reset();
                (MessagePatch::new().pending(false), TurnState::Cancelled)
            }
            TurnOutcome::Failed(reason) => {
                self.inner.typewriter.reset();
                tracing::warn!(turn = turn.id, error = %reason, "Turn failed");
                (
                    MessagePatch::new()
                        .content(format!("Error: {reason}"))
                        .pending(false),
                    TurnState::Failed,
                )
            }
        };

        self.inner.ledger.update_last(patch);
        self.inner.turn_state.send_replace(state);
        tracing::debug!(turn = turn.id, ?state, "Turn finished");
        outcome
    }

    fn adopt_session(&self, session_id: &str) {
        if session_id.is_empty() {
            return;
        }

        let mut current = self.inner.session_id.lock();
        if current.as_deref() != Some(session_id) {
            tracing::debug!(session_id = %session_id, "Adopted session id");
            *current = Some(session_id.to_string());
        }
        self.inner.store.set(session_id);
    }

    fn clear_session(&self) {
        *self.inner.session_id.lock() = None;
        self.inner.store.clear();
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_message(&self, text: &str) -> Result<ChatResponse> {
        let url = self.endpoint(&["message"])?;
        let request = ChatRequest::new(text, self.session_id());
        let response = self
            .inner
            .http
            .post(url)
            .timeout(self.inner.request_timeout)
            .json(&request)
            .send()
            .await?;
        let response: ChatResponse = check_status(response).await?.json().await?;

        if !response.success {
            return Err(ClientError::Application(
                response
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }
        Ok(response)
    }

    async fn request_reset(&self, session_id: Option<&str>) -> Result<ResetResponse> {
        let mut url = self.endpoint(&["reset"])?;
        if let Some(id) = session_id {
            url.query_pairs_mut().append_pair("session_id", id);
        }

        let response = self
            .inner
            .http
            .post(url)
            .timeout(self.inner.request_timeout)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn fetch_health(&self) -> Result<HealthResponse> {
        let url = self.endpoint(&["health"])?;
        let response = self
            .inner
            .http
            .get(url)
            .timeout(self.inner.request_timeout)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

async fn until_cancelled<F: Future>(turn: &TurnHandle, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = turn.token.cancelled() => None,
        output = future => Some(output),
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim().trim_end_matches('/'))
        .map_err(|err| ClientError::InvalidUrl(format!("{raw}: {err}")))?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

fn history_message(entry: HistoryEntry) -> Option<Message> {
    let message = match entry.role.as_str() {
        "user" => Message::user(entry.content),
        "assistant" => Message::assistant(entry.content, entry.agent_used),
        other => {
            tracing::debug!(role = other, "Skipping history entry with unknown role");
            return None;
        }
    };

    Some(match entry.timestamp.as_deref().and_then(parse_timestamp) {
        Some(created_at) => message.with_created_at(created_at),
        None => message,
    })
}

/// RFC 3339, or a naive ISO timestamp taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
