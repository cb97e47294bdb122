//! The conversation pipeline: ordered transcript plus a single-flight guard.
//!
//! A query is accepted only when the text is non-blank, no other query is in
//! flight, at least one document has been indexed, and no indexing run or
//! query augmentation is in progress. The user message is
//! appended before the backend is called, and exactly one assistant message
//! follows it, so the transcript always reads
//! `user(q1), assistant(r1), user(q2), assistant(r2), ...`.

use std::sync::RwLock;

use crate::backend::IndexBackend;
use crate::guard::{self, FlightGuard};
use crate::models::ChatMessage;

/// Assistant reply recorded when the backend query fails.
pub const QUERY_FAILED_NOTICE: &str =
    "Sorry, I encountered an error. Please ensure the backend server is running and try again.";

/// Observable state of the pipeline guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyQuery,
    /// Another query is in flight.
    Busy,
    NothingIndexed,
    /// An indexing run is rebuilding the backend index.
    Indexing,
    /// The pending input is being rewritten.
    Augmenting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Rejected(RejectReason),
    /// The backend answered; the reply is at `transcript[index]`.
    Answered { index: usize },
    /// The backend failed; the failure notice is at `transcript[index]`.
    Failed { index: usize },
}

/// The not-yet-submitted query text.
#[derive(Debug, Default)]
pub struct QueryInput {
    text: RwLock<String>,
}

impl QueryInput {
    pub fn get(&self) -> String {
        guard::read(&self.text).clone()
    }

    pub fn set(&self, text: &str) {
        *guard::write(&self.text) = text.to_string();
    }

    pub fn clear(&self) {
        guard::write(&self.text).clear();
    }

    /// Replace the text with `new` only if it still equals `expected`.
    pub fn replace_if(&self, expected: &str, new: &str) -> bool {
        let mut text = guard::write(&self.text);
        if *text == expected {
            *text = new.to_string();
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
pub struct Conversation {
    transcript: RwLock<Vec<ChatMessage>>,
    guard: FlightGuard,
    input: QueryInput,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PipelineState {
        if self.guard.is_busy() {
            PipelineState::Processing
        } else {
            PipelineState::Idle
        }
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        guard::read(&self.transcript).clone()
    }

    pub fn message(&self, index: usize) -> Option<ChatMessage> {
        guard::read(&self.transcript).get(index).cloned()
    }

    pub fn len(&self) -> usize {
        guard::read(&self.transcript).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn input(&self) -> &QueryInput {
        &self.input
    }

    /// Submit `text` to the backend.
    ///
    /// `blocked` is the readiness gate: the reason the rest of the session
    /// cannot take a query right now, if any. Backend failures are absorbed
    /// into the transcript and never returned. The pending input is cleared
    /// once the query settles, whatever the outcome.
    pub async fn submit(
        &self,
        backend: &dyn IndexBackend,
        text: &str,
        blocked: Option<RejectReason>,
    ) -> SubmitOutcome {
        if text.trim().is_empty() {
            return SubmitOutcome::Rejected(RejectReason::EmptyQuery);
        }
        if let Some(reason) = blocked {
            return SubmitOutcome::Rejected(reason);
        }
        let Some(_permit) = self.guard.try_acquire() else {
            tracing::debug!("query already in flight, ignoring submission");
            return SubmitOutcome::Rejected(RejectReason::Busy);
        };

        self.append(ChatMessage::user(text));

        let outcome = match backend.query(text).await {
            Ok(answer) => {
                tracing::debug!(sources = answer.sources.len(), "query answered");
                let index = self.append(ChatMessage::assistant(
                    &answer.answer,
                    Some(answer.sources),
                ));
                SubmitOutcome::Answered { index }
            }
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "query failed");
                let index = self.append(ChatMessage::assistant(QUERY_FAILED_NOTICE, None));
                SubmitOutcome::Failed { index }
            }
        };

        self.input.clear();
        outcome
    }

    fn append(&self, message: ChatMessage) -> usize {
        let mut transcript = guard::write(&self.transcript);
        transcript.push(message);
        transcript.len() - 1
    }
}
