//! Application state for one chat session.
//!
//! [`Session`] owns every piece of mutable state and is the only way to
//! change it. Each entity has a single writer:
//!
//! | Entity | Writer |
//! |--------|--------|
//! | file queue | [`Session::add_files`], [`Session::remove_file`] |
//! | indexed set, error banner | [`Session::run_indexing`] |
//! | transcript | [`Session::submit_query`] |
//! | summaries, insights | [`Session::summarize`], [`Session::extract_insights`] |
//! | pending input | [`Session::set_input`], [`Session::submit_query`], [`Session::augment_query`] |
//!
//! Everything else is a read-only snapshot. Locks are never held across an
//! `.await`, so a `Session` behind an `Arc` can be driven from several tasks
//! at once: annotation jobs run alongside indexing and queries without
//! waiting on them.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use anyhow::Result;

use crate::annotation::{AnnotationOutcome, Annotator, AugmentOutcome, JobState};
use crate::backend::{HttpBackend, IndexBackend};
use crate::config::Config;
use crate::conversation::{Conversation, PipelineState, RejectReason, SubmitOutcome};
use crate::generative::{create_generator, DisabledGenerator, TextGenerator};
use crate::guard;
use crate::indexing::{IndexOutcome, Indexer};
use crate::models::{ChatMessage, DocumentHandle, FileEntry, FileId, Sender};
use crate::progress::{IndexProgressReporter, NoProgress};
use crate::queue::FileQueue;

/// Banner shown after a failed indexing run.
pub const INDEXING_FAILED_BANNER: &str = "Error: Indexing failed. Is the backend running?";

pub struct Session {
    backend: Arc<dyn IndexBackend>,
    generator: Arc<dyn TextGenerator>,
    progress: Box<dyn IndexProgressReporter>,
    queue: RwLock<FileQueue>,
    indexer: Indexer,
    conversation: Conversation,
    annotator: Annotator,
    error: RwLock<Option<String>>,
}

impl Session {
    pub fn new(backend: Arc<dyn IndexBackend>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            backend,
            generator,
            progress: Box::new(NoProgress),
            queue: RwLock::new(FileQueue::new()),
            indexer: Indexer::new(),
            conversation: Conversation::new(),
            annotator: Annotator::new(),
            error: RwLock::new(None),
        }
    }

    /// Build a session talking to the configured backend and generator.
    ///
    /// A generator that cannot be created (for example a missing API key)
    /// is replaced by [`DisabledGenerator`], so annotations degrade to their
    /// placeholders instead of preventing the session from starting.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(&config.backend)?);
        let generator: Arc<dyn TextGenerator> = match create_generator(&config.generative) {
            Ok(generator) => generator,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "generative provider unavailable, annotations disabled");
                Arc::new(DisabledGenerator)
            }
        };
        Ok(Self::new(backend, generator))
    }

    pub fn with_progress(mut self, progress: Box<dyn IndexProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    // ============ File queue ============

    /// Queue a batch of selected documents. Returns how many were new.
    pub fn add_files(&self, selection: impl IntoIterator<Item = DocumentHandle>) -> usize {
        let added = guard::write(&self.queue).add(selection);
        tracing::debug!(added, "files queued");
        added
    }

    /// Drop a document from the queue. The indexed set is not touched.
    pub fn remove_file(&self, id: &str) -> bool {
        guard::write(&self.queue).remove(id)
    }

    pub fn files(&self) -> Vec<FileEntry> {
        guard::read(&self.queue).entries().to_vec()
    }

    // ============ Indexing ============

    /// Upload pending documents and rebuild the backend index.
    ///
    /// Failures raise the error banner and are also returned so a caller
    /// without a banner (a one-shot CLI command) can report them.
    pub async fn run_indexing(&self) -> Result<IndexOutcome> {
        let result = self
            .indexer
            .run_with(self.backend.as_ref(), self.progress.as_ref(), || {
                *guard::write(&self.error) = None;
                self.files()
            })
            .await;

        if let Err(e) = &result {
            tracing::error!(error = %format!("{:#}", e), "indexing failed");
            *guard::write(&self.error) = Some(INDEXING_FAILED_BANNER.to_string());
        }
        result
    }

    pub fn is_indexing(&self) -> bool {
        self.indexer.is_indexing()
    }

    pub fn indexed_names(&self) -> BTreeSet<String> {
        self.indexer.indexed_names()
    }

    pub fn error(&self) -> Option<String> {
        guard::read(&self.error).clone()
    }

    pub fn dismiss_error(&self) {
        *guard::write(&self.error) = None;
    }

    // ============ Conversation ============

    pub fn set_input(&self, text: &str) {
        self.conversation.input().set(text);
    }

    pub fn input(&self) -> String {
        self.conversation.input().get()
    }

    /// Submit `text` as a query.
    ///
    /// Rejected while nothing is indexed, while an indexing run is in
    /// progress, and while the pending input is being augmented (the input
    /// holds the placeholder, and clearing it would drop the rewrite).
    pub async fn submit_query(&self, text: &str) -> SubmitOutcome {
        self.conversation
            .submit(self.backend.as_ref(), text, self.blocked())
            .await
    }

    fn blocked(&self) -> Option<RejectReason> {
        if !self.indexer.has_indexed() {
            Some(RejectReason::NothingIndexed)
        } else if self.indexer.is_indexing() {
            Some(RejectReason::Indexing)
        } else if self.annotator.is_augmenting() {
            Some(RejectReason::Augmenting)
        } else {
            None
        }
    }

    /// Submit whatever the pending input currently holds.
    pub async fn submit_input(&self) -> SubmitOutcome {
        let text = self.input();
        self.submit_query(&text).await
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.conversation.state()
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.conversation.transcript()
    }

    // ============ Annotations ============

    /// Summarize a queued document. Only documents whose name is indexed
    /// are eligible.
    pub async fn summarize(&self, file_id: &str) -> AnnotationOutcome {
        let name = {
            let queue = guard::read(&self.queue);
            match queue.get(file_id) {
                Some(entry) => entry.name.clone(),
                None => return AnnotationOutcome::Ineligible,
            }
        };
        if !self.indexer.is_indexed(&name) {
            return AnnotationOutcome::Ineligible;
        }
        self.annotator
            .summarize(self.generator.as_ref(), file_id, &name)
            .await
    }

    /// Extract insights from the assistant message at `index`.
    pub async fn extract_insights(&self, index: usize) -> AnnotationOutcome {
        let text = match self.conversation.message(index) {
            Some(message) if message.sender == Sender::Assistant => message.text,
            _ => return AnnotationOutcome::Ineligible,
        };
        self.annotator
            .extract_insights(self.generator.as_ref(), &text, index)
            .await
    }

    pub async fn augment_query(&self) -> AugmentOutcome {
        self.annotator
            .augment_query(self.generator.as_ref(), self.conversation.input())
            .await
    }

    pub fn summary(&self, file_id: &str) -> JobState {
        self.annotator.summaries().get(&file_id.to_string())
    }

    pub fn insights(&self, index: usize) -> JobState {
        self.annotator.insights().get(&index)
    }

    pub fn summaries(&self) -> HashMap<FileId, JobState> {
        self.annotator.summaries().snapshot()
    }

    pub fn is_augmenting(&self) -> bool {
        self.annotator.is_augmenting()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{INSIGHTS_FAILED, SUMMARY_FAILED};
    use crate::models::QueryAnswer;
    use anyhow::bail;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeBackend {
        down: AtomicBool,
        upload_delay_ms: u64,
        query_delay_ms: u64,
    }

    #[async_trait]
    impl IndexBackend for FakeBackend {
        async fn upload(&self, name: &str, _bytes: Vec<u8>) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(self.upload_delay_ms)).await;
            if self.down.load(Ordering::SeqCst) {
                bail!("connection refused uploading {}", name);
            }
            Ok(())
        }

        async fn build_index(&self) -> Result<()> {
            Ok(())
        }

        async fn query(&self, text: &str) -> Result<QueryAnswer> {
            tokio::time::sleep(Duration::from_millis(self.query_delay_ms)).await;
            Ok(QueryAnswer {
                answer: format!("answer to {}", text),
                sources: vec!["FileA".to_string()],
            })
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Ok("* generated".to_string())
        }
    }

    fn handle(name: &str, millis: i64) -> DocumentHandle {
        DocumentHandle::from_bytes(name, Utc.timestamp_millis_opt(millis).unwrap(), b"x".to_vec())
    }

    fn session_with(backend: Arc<FakeBackend>) -> Session {
        Session::new(backend, Arc::new(DisabledGenerator))
    }

    fn indexed(session: &Session) -> Vec<String> {
        session.indexed_names().into_iter().collect()
    }

    #[tokio::test]
    async fn index_remove_reindex_scenario() {
        let session = session_with(Arc::new(FakeBackend::default()));
        session.add_files(vec![handle("FileA", 1), handle("FileB", 2)]);

        session.run_indexing().await.unwrap();
        assert_eq!(indexed(&session), vec!["FileA", "FileB"]);

        assert!(session.remove_file("FileB-2"));
        assert_eq!(indexed(&session), vec!["FileA", "FileB"]);

        session.run_indexing().await.unwrap();
        assert_eq!(indexed(&session), vec!["FileA"]);
    }

    #[tokio::test]
    async fn failed_indexing_raises_dismissible_banner() {
        let backend = Arc::new(FakeBackend::default());
        let session = session_with(backend.clone());
        session.add_files(vec![handle("FileA", 1)]);
        session.run_indexing().await.unwrap();

        backend.down.store(true, Ordering::SeqCst);
        session.add_files(vec![handle("FileB", 2)]);
        assert!(session.run_indexing().await.is_err());
        assert_eq!(session.error().as_deref(), Some(INDEXING_FAILED_BANNER));
        assert_eq!(indexed(&session), vec!["FileA"]);
        assert!(!session.is_indexing());

        session.dismiss_error();
        assert_eq!(session.error(), None);

        // A new run clears a standing banner before it starts.
        session.run_indexing().await.unwrap_err();
        backend.down.store(false, Ordering::SeqCst);
        session.run_indexing().await.unwrap();
        assert_eq!(session.error(), None);
        assert_eq!(indexed(&session), vec!["FileA", "FileB"]);
    }

    #[tokio::test]
    async fn queries_are_gated_on_indexing() {
        let session = session_with(Arc::new(FakeBackend::default()));
        session.add_files(vec![handle("FileA", 1)]);
        assert_eq!(
            session.submit_query("x").await,
            SubmitOutcome::Rejected(RejectReason::NothingIndexed)
        );
        assert!(session.transcript().is_empty());

        session.run_indexing().await.unwrap();
        session.set_input("what is in FileA?");
        assert_eq!(
            session.submit_input().await,
            SubmitOutcome::Answered { index: 1 }
        );
        assert_eq!(session.input(), "");
        assert_eq!(session.transcript()[1].text, "answer to what is in FileA?");
    }

    #[tokio::test]
    async fn summaries_require_an_indexed_queued_file() {
        let session = session_with(Arc::new(FakeBackend::default()));
        session.add_files(vec![handle("FileA", 1)]);

        assert_eq!(session.summarize("FileA-1").await, AnnotationOutcome::Ineligible);
        assert_eq!(session.summarize("missing").await, AnnotationOutcome::Ineligible);

        session.run_indexing().await.unwrap();
        assert_eq!(
            session.summarize("FileA-1").await,
            AnnotationOutcome::Resolved { generated: false }
        );
        assert_eq!(session.summary("FileA-1").text(), Some(SUMMARY_FAILED));
    }

    #[tokio::test]
    async fn insights_only_for_assistant_messages() {
        let session = session_with(Arc::new(FakeBackend::default()));
        session.add_files(vec![handle("FileA", 1)]);
        session.run_indexing().await.unwrap();
        session.submit_query("q").await;

        assert_eq!(session.extract_insights(0).await, AnnotationOutcome::Ineligible);
        assert_eq!(session.extract_insights(7).await, AnnotationOutcome::Ineligible);
        session.extract_insights(1).await;
        assert_eq!(session.insights(1).text(), Some(INSIGHTS_FAILED));
    }

    #[tokio::test]
    async fn annotations_do_not_block_the_pipeline() {
        let backend = Arc::new(FakeBackend {
            query_delay_ms: 10,
            ..FakeBackend::default()
        });
        let session = Arc::new(Session::new(backend, Arc::new(SlowGenerator)));
        session.add_files(vec![handle("FileA", 1)]);
        session.run_indexing().await.unwrap();
        session.submit_query("first").await;

        let annotating = {
            let session = session.clone();
            tokio::spawn(async move { session.extract_insights(1).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(session.insights(1).is_loading());

        // The query completes while the insight job is still loading.
        assert_eq!(
            session.submit_query("second").await,
            SubmitOutcome::Answered { index: 3 }
        );
        assert!(session.insights(1).is_loading());

        annotating.await.unwrap();
        assert_eq!(session.insights(1).text(), Some("* generated"));
        assert_eq!(session.transcript().len(), 4);
    }

    #[tokio::test]
    async fn augmentation_failure_restores_input() {
        let session = session_with(Arc::new(FakeBackend::default()));
        session.set_input("find refunds");
        assert_eq!(session.augment_query().await, AugmentOutcome::Reverted);
        assert_eq!(session.input(), "find refunds");
    }

    #[tokio::test]
    async fn queries_are_rejected_while_indexing() {
        let backend = Arc::new(FakeBackend {
            upload_delay_ms: 50,
            ..FakeBackend::default()
        });
        let session = Arc::new(session_with(backend));
        session.add_files(vec![handle("FileA", 1)]);
        session.run_indexing().await.unwrap();

        session.add_files(vec![handle("FileB", 2)]);
        let indexing = {
            let session = session.clone();
            tokio::spawn(async move { session.run_indexing().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(session.is_indexing());

        assert_eq!(
            session.submit_query("during indexing").await,
            SubmitOutcome::Rejected(RejectReason::Indexing)
        );
        assert!(session.transcript().is_empty());

        indexing.await.unwrap().unwrap();
        assert_eq!(
            session.submit_query("after indexing").await,
            SubmitOutcome::Answered { index: 1 }
        );
    }

    #[tokio::test]
    async fn submitting_clears_any_pending_input() {
        let session = session_with(Arc::new(FakeBackend::default()));
        session.add_files(vec![handle("FileA", 1)]);
        session.run_indexing().await.unwrap();

        session.set_input("draft");
        assert_eq!(
            session.submit_query("other question").await,
            SubmitOutcome::Answered { index: 1 }
        );
        assert_eq!(session.input(), "");
    }

    #[tokio::test]
    async fn submissions_wait_for_augmentation() {
        let session = Arc::new(Session::new(
            Arc::new(FakeBackend::default()),
            Arc::new(SlowGenerator),
        ));
        session.add_files(vec![handle("FileA", 1)]);
        session.run_indexing().await.unwrap();
        session.set_input("find refunds");

        let augmenting = {
            let session = session.clone();
            tokio::spawn(async move { session.augment_query().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(session.is_augmenting());

        assert_eq!(
            session.submit_input().await,
            SubmitOutcome::Rejected(RejectReason::Augmenting)
        );
        assert!(session.transcript().is_empty());

        assert_eq!(augmenting.await.unwrap(), AugmentOutcome::Rewritten);
        assert_eq!(session.input(), "* generated");
    }
}
