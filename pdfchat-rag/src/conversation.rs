//! Multi-turn conversational retrieval.
//!
//! A [`ConversationSession`] binds one [`Retriever`], one [`GenerativeModel`]
//! and one [`DialogueHistory`]. Each [`ask`](ConversationSession::ask) moves
//! the session through `Idle → Retrieving → Generating → Idle`; any failure
//! moves it to `Failed`, after which the session refuses further questions.
//!
//! Questions on one session are strictly sequential: a second `ask` while one
//! is in flight fails with [`RagError::SessionBusy`] instead of waiting.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::{QueryPolicy, RagConfig};
use crate::dialogue::DialogueHistory;
use crate::document::Chunk;
use crate::error::{ConversationStage, RagError, Result};
use crate::generation::{GenerationRequest, GenerativeModel, condense_messages};
use crate::retriever::Retriever;

const TRANSITION_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle state of a [`ConversationSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Ready for a question.
    Idle,
    /// Formulating the retrieval query and fetching passages.
    Retrieving,
    /// Waiting for the generative model.
    Generating,
    /// A previous question failed; the session must be discarded.
    Failed,
}

/// Per-session retrieval settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversationOptions {
    /// Passages retrieved per question.
    pub top_k: usize,
    /// How the retrieval query is formulated.
    pub query_policy: QueryPolicy,
}

impl Default for ConversationOptions {
    fn default() -> Self {
        Self::from(&RagConfig::default())
    }
}

impl From<&RagConfig> for ConversationOptions {
    fn from(config: &RagConfig) -> Self {
        Self { top_k: config.top_k, query_policy: config.query_policy }
    }
}

/// Result of a successful [`ConversationSession::ask`].
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    /// The assistant's answer.
    pub answer: String,
    /// The full history, including this exchange.
    pub history: DialogueHistory,
    /// Passages the answer was generated from, best first.
    pub sources: Vec<Chunk>,
}

/// One conversation over one built index.
pub struct ConversationSession {
    id: String,
    retriever: Arc<dyn Retriever>,
    model: Arc<dyn GenerativeModel>,
    options: ConversationOptions,
    history: Mutex<DialogueHistory>,
    state: watch::Sender<SessionState>,
    transitions: broadcast::Sender<SessionState>,
}

impl ConversationSession {
    /// Create an idle session with an empty history.
    pub fn new(
        retriever: Arc<dyn Retriever>,
        model: Arc<dyn GenerativeModel>,
        options: ConversationOptions,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            retriever,
            model,
            options,
            history: Mutex::new(DialogueHistory::new()),
            state,
            transitions,
        }
    }

    /// Unique session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionState> {
        self.transitions.subscribe()
    }

    /// A snapshot of the history. Waits for an in-flight `ask` to finish.
    pub async fn history(&self) -> DialogueHistory {
        self.history.lock().await.clone()
    }

    /// Answer `question` from retrieved passages and the history so far.
    ///
    /// On success the user question and the answer are appended to the
    /// history. On failure the history is left unchanged and the session
    /// moves to [`SessionState::Failed`].
    ///
    /// # Errors
    ///
    /// - [`RagError::SessionBusy`] if another `ask` is in flight.
    /// - [`RagError::SessionFailed`] if an earlier `ask` failed.
    /// - [`RagError::Conversation`] wrapping the retrieval or generation failure.
    pub async fn ask(&self, question: &str) -> Result<AskResponse> {
        let mut history = self.history.try_lock().map_err(|_| {
            debug!(session.id = %self.id, "rejecting concurrent ask");
            RagError::SessionBusy
        })?;
        if self.state() == SessionState::Failed {
            return Err(RagError::SessionFailed);
        }

        let span = info_span!("ask", session.id = %self.id, turn = history.len() / 2);
        let mut in_flight = InFlight { session: self, finished: false };
        let result = self.answer(question, &history).instrument(span).await;
        in_flight.finished = true;

        match result {
            Ok((answer, sources)) => {
                history.push_exchange(question, answer.clone());
                self.transition(SessionState::Idle);
                info!(session.id = %self.id, history_len = history.len(), "answered question");
                Ok(AskResponse { answer, history: history.clone(), sources })
            }
            Err((stage, e)) => {
                self.transition(SessionState::Failed);
                error!(session.id = %self.id, %stage, error = %e, "ask failed");
                Err(e.in_conversation(stage))
            }
        }
    }

    async fn answer(
        &self,
        question: &str,
        history: &DialogueHistory,
    ) -> std::result::Result<(String, Vec<Chunk>), (ConversationStage, RagError)> {
        self.transition(SessionState::Retrieving);
        let query = self
            .retrieval_query(question, history)
            .await
            .map_err(|e| (ConversationStage::QueryFormulation, e))?;
        let sources = self
            .retriever
            .retrieve(&query, self.options.top_k)
            .await
            .map_err(|e| (ConversationStage::Retrieval, e))?;
        debug!(result_count = sources.len(), "retrieved supporting passages");

        self.transition(SessionState::Generating);
        let request = GenerationRequest { question, context: &sources, history };
        let answer =
            self.model.generate(&request).await.map_err(|e| (ConversationStage::Generation, e))?;
        Ok((answer, sources))
    }

    async fn retrieval_query(&self, question: &str, history: &DialogueHistory) -> Result<String> {
        match self.options.query_policy {
            QueryPolicy::Condense if !history.is_empty() => {
                let rewritten = self.model.complete(&condense_messages(question, history)).await?;
                let rewritten = rewritten.trim();
                debug!(%rewritten, "condensed follow-up question");
                Ok(if rewritten.is_empty() { question.to_string() } else { rewritten.to_string() })
            }
            _ => Ok(question.to_string()),
        }
    }

    fn transition(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(session.id = %self.id, from = ?previous, to = ?next, "session state");
            // No subscribers is fine.
            let _ = self.transitions.send(next);
        }
    }
}

/// Puts the session back to `Idle` if an `ask` future is dropped before it
/// finishes. Nothing has been appended to the history at that point.
struct InFlight<'a> {
    session: &'a ConversationSession,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.session.transition(SessionState::Idle);
        }
    }
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
