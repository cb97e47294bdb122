//! Core data models used throughout Offline Genie.
//!
//! These types represent the queued documents, the chat transcript, and the
//! wire shapes exchanged with the indexing backend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity key of a queued document: `"{name}-{unix_millis}"`.
pub type FileId = String;

/// Raw bytes behind a document, read only when the document is uploaded.
#[derive(Debug, Clone)]
pub enum Content {
    /// A file on disk.
    Path(PathBuf),
    /// Bytes already held in memory.
    Bytes(Arc<[u8]>),
}

impl Content {
    pub async fn read(&self) -> Result<Vec<u8>> {
        match self {
            Content::Path(path) => tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display())),
            Content::Bytes(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// A user-selected document before it enters the queue.
///
/// Handles without a name or modification time cannot produce an identity
/// key and are dropped by [`FileQueue::add`](crate::queue::FileQueue::add).
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    pub name: String,
    pub modified: Option<DateTime<Utc>>,
    pub content: Content,
}

impl DocumentHandle {
    pub fn from_bytes(name: &str, modified: DateTime<Utc>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            name: name.to_string(),
            modified: Some(modified),
            content: Content::Bytes(bytes.into()),
        }
    }

    /// Deterministic identity key, or `None` for malformed handles.
    pub fn identity(&self) -> Option<FileId> {
        if self.name.is_empty() {
            return None;
        }
        let modified = self.modified?;
        Some(format!("{}-{}", self.name, modified.timestamp_millis()))
    }
}

/// A document in the file queue.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub id: FileId,
    pub name: String,
    pub content: Content,
}

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One immutable entry of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn user(text: &str) -> Self {
        Self {
            sender: Sender::User,
            text: text.to_string(),
            sources: None,
        }
    }

    pub fn assistant(text: &str, sources: Option<Vec<String>>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.to_string(),
            sources,
        }
    }
}

/// Body of `POST /query/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub text: String,
}

/// Response of `POST /query/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryAnswer {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
}
