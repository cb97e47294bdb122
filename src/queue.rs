//! The file queue: documents the user has selected, deduplicated by identity.

use std::collections::HashSet;

use crate::models::{DocumentHandle, FileEntry};

#[derive(Debug, Default, Clone)]
pub struct FileQueue {
    entries: Vec<FileEntry>,
}

impl FileQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every handle whose identity key is not already queued.
    ///
    /// Order of the batch is preserved. Handles without an identity key are
    /// skipped. Returns the number of entries added.
    pub fn add(&mut self, selection: impl IntoIterator<Item = DocumentHandle>) -> usize {
        let mut seen: HashSet<String> = self.entries.iter().map(|e| e.id.clone()).collect();
        let before = self.entries.len();

        for handle in selection {
            let Some(id) = handle.identity() else {
                tracing::debug!(name = %handle.name, "skipping selection without identity");
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }
            self.entries.push(FileEntry {
                id,
                name: handle.name,
                content: handle.content,
            });
        }

        self.entries.len() - before
    }

    /// Remove the entry with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
