//! # Offline Genie
//!
//! A document chat client for a retrieval-augmented generation backend.
//!
//! Offline Genie keeps a queue of local documents, uploads them to a RAG
//! backend and asks it to build an index, then runs a conversation against
//! that index. An optional generative provider (Gemini or Ollama) adds
//! per-document summaries, query rewriting, and key-insight extraction on
//! assistant answers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Selection  │──▶│  FileQueue  │──▶│   Indexer    │──▶ /upload/, /index/
//! │ walk + glob │   │   dedup     │   │ single-flight│
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ IndexedSet
//!                      ┌─────────────────────┤
//!                      ▼                     ▼
//!               ┌──────────────┐      ┌──────────────┐
//!               │ Conversation │      │  Annotator   │──▶ generative provider
//!               │  /query/     │      │ summaries... │
//!               └──────────────┘      └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! genie index ./reports                      # upload and index
//! genie ask ./reports -q "total refunds?"    # one-shot question
//! genie chat ./reports                       # interactive session
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and wire payloads |
//! | [`selection`] | Turn paths into document handles |
//! | [`queue`] | Deduplicated file queue |
//! | [`guard`] | Single-flight guard |
//! | [`backend`] | RAG backend client |
//! | [`indexing`] | Upload barrier and index build |
//! | [`conversation`] | Query pipeline and transcript |
//! | [`generative`] | Generative provider abstraction |
//! | [`annotation`] | Summaries, insights, query augmentation |
//! | [`session`] | Ties the above into one session |
//! | [`progress`] | Indexing progress reporting |
//! | [`ingest`] | `genie index` command |
//! | [`ask`] | `genie ask` command |
//! | [`chat`] | `genie chat` command |

pub mod annotation;
pub mod ask;
pub mod backend;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod generative;
pub mod guard;
pub mod indexing;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod queue;
pub mod selection;
pub mod session;
