//! Annotation jobs: summaries, insights, and query augmentation.
//!
//! Annotations are optional enrichments produced by a [`TextGenerator`].
//! They run independently of indexing and of the conversation pipeline and
//! only ever write their own result slot. Failures are soft: a summary or
//! insight job always ends `Resolved` (with placeholder text on failure), and
//! query augmentation always leaves the input holding either the rewritten
//! query or the original text.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use crate::conversation::QueryInput;
use crate::generative::TextGenerator;
use crate::guard::{self, FlightGuard};

pub const SUMMARY_FAILED: &str = "Could not generate summary.";
pub const INSIGHTS_FAILED: &str = "Could not extract insights.";
pub const AUGMENTING_PLACEHOLDER: &str = "✨ Augmenting query...";

/// Lifecycle of one keyed annotation job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Absent,
    Loading,
    Resolved(String),
}

impl JobState {
    pub fn is_loading(&self) -> bool {
        matches!(self, JobState::Loading)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            JobState::Resolved(text) => Some(text),
            _ => None,
        }
    }
}

/// Map from key to [`JobState`]; unknown keys read as `Absent`.
#[derive(Debug)]
pub struct JobRegistry<K> {
    jobs: RwLock<HashMap<K, JobState>>,
}

impl<K> Default for JobRegistry<K> {
    fn default() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> JobRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> JobState {
        guard::read(&self.jobs).get(key).cloned().unwrap_or_default()
    }

    /// Move `key` to `Loading`. Returns `false`, leaving the job alone, if
    /// it is already loading.
    pub fn try_start(&self, key: &K) -> bool {
        let mut jobs = guard::write(&self.jobs);
        match jobs.get(key) {
            Some(JobState::Loading) => false,
            _ => {
                jobs.insert(key.clone(), JobState::Loading);
                true
            }
        }
    }

    pub fn resolve(&self, key: &K, text: String) {
        guard::write(&self.jobs).insert(key.clone(), JobState::Resolved(text));
    }

    /// Every job that has left `Absent`.
    pub fn snapshot(&self) -> HashMap<K, JobState> {
        guard::read(&self.jobs).clone()
    }
}

/// Whether a keyed annotation request ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationOutcome {
    /// The key does not address an eligible entry.
    Ineligible,
    /// A job for this key is already loading.
    AlreadyLoading,
    /// The job finished; `generated` is false when the placeholder was stored.
    Resolved { generated: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AugmentOutcome {
    /// The input was blank or another augmentation is in flight.
    Skipped,
    /// The input now holds the rewritten query.
    Rewritten,
    /// The input was restored to the original text.
    Reverted,
    /// The input changed while the call was in flight and was left alone.
    Superseded,
}

pub fn summary_prompt(file_name: &str) -> String {
    format!(
        "Provide a short, one-paragraph summary for a document titled \"{}\". Based on the title, what is the document likely about?",
        file_name
    )
}

pub fn insights_prompt(message_text: &str) -> String {
    format!(
        "Analyze the following text and extract the top 3-5 key insights or actionable items. Present them as a bulleted list. Text: \"{}\"",
        message_text
    )
}

pub fn augment_prompt(query: &str) -> String {
    format!(
        "Rephrase and expand the following user query to be more effective for a semantic search system. Return only the improved query and nothing else. Original query: \"{}\"",
        query
    )
}

/// Split stored insight text into display lines.
///
/// Each line is trimmed and a single leading `"* "` is removed; lines that
/// end up empty are dropped. Other list markers are kept verbatim.
pub fn insight_lines(raw: &str) -> Vec<String> {
    raw.split('\n')
        .map(|line| {
            let line = line.trim();
            line.strip_prefix("* ").unwrap_or(line)
        })
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Runs annotation jobs against one generator.
#[derive(Default)]
pub struct Annotator {
    summaries: JobRegistry<String>,
    insights: JobRegistry<usize>,
    augmenting: FlightGuard,
}

impl Annotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summaries(&self) -> &JobRegistry<String> {
        &self.summaries
    }

    pub fn insights(&self) -> &JobRegistry<usize> {
        &self.insights
    }

    pub fn is_augmenting(&self) -> bool {
        self.augmenting.is_busy()
    }

    /// Summarize a document by title. The caller has checked eligibility.
    pub async fn summarize(
        &self,
        generator: &dyn TextGenerator,
        file_id: &str,
        file_name: &str,
    ) -> AnnotationOutcome {
        let key = file_id.to_string();
        if !self.summaries.try_start(&key) {
            return AnnotationOutcome::AlreadyLoading;
        }

        let generated = match generator.generate(&summary_prompt(file_name)).await {
            Ok(text) => {
                self.summaries.resolve(&key, text);
                true
            }
            Err(e) => {
                tracing::warn!(file = file_name, provider = generator.name(), error = %format!("{:#}", e), "summary failed");
                self.summaries.resolve(&key, SUMMARY_FAILED.to_string());
                false
            }
        };
        AnnotationOutcome::Resolved { generated }
    }

    /// Extract insights from a transcript message. The caller has checked
    /// that `message_index` addresses an assistant message.
    pub async fn extract_insights(
        &self,
        generator: &dyn TextGenerator,
        message_text: &str,
        message_index: usize,
    ) -> AnnotationOutcome {
        if !self.insights.try_start(&message_index) {
            return AnnotationOutcome::AlreadyLoading;
        }

        let generated = match generator.generate(&insights_prompt(message_text)).await {
            Ok(text) => {
                self.insights.resolve(&message_index, text);
                true
            }
            Err(e) => {
                tracing::warn!(index = message_index, provider = generator.name(), error = %format!("{:#}", e), "insight extraction failed");
                self.insights
                    .resolve(&message_index, INSIGHTS_FAILED.to_string());
                false
            }
        };
        AnnotationOutcome::Resolved { generated }
    }

    /// Rewrite the pending query held in `input`.
    ///
    /// The input shows [`AUGMENTING_PLACEHOLDER`] while the call is in
    /// flight. The result is written back only if the placeholder is still
    /// there, so an edit made in the meantime is never overwritten.
    pub async fn augment_query(
        &self,
        generator: &dyn TextGenerator,
        input: &QueryInput,
    ) -> AugmentOutcome {
        let original = input.get();
        if original.trim().is_empty() {
            return AugmentOutcome::Skipped;
        }
        let Some(_permit) = self.augmenting.try_acquire() else {
            return AugmentOutcome::Skipped;
        };

        input.set(AUGMENTING_PLACEHOLDER);

        let (replacement, outcome) = match generator.generate(&augment_prompt(&original)).await {
            Ok(text) => (text, AugmentOutcome::Rewritten),
            Err(e) => {
                tracing::warn!(provider = generator.name(), error = %format!("{:#}", e), "query augmentation failed");
                (original, AugmentOutcome::Reverted)
            }
        };

        if input.replace_if(AUGMENTING_PLACEHOLDER, &replacement) {
            outcome
        } else {
            AugmentOutcome::Superseded
        }
    }
}
