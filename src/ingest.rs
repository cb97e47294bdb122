//! `genie index`: select documents and index them on the backend.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::config::Config;
use crate::indexing::IndexOutcome;
use crate::progress::ProgressMode;
use crate::selection::select_paths;
use crate::session::Session;

/// Select `paths`, queue them in a fresh session, and run one indexing pass.
///
/// Returns the session so callers can continue with queries.
pub async fn index_paths(
    config: &Config,
    paths: &[PathBuf],
    progress: ProgressMode,
) -> Result<Session> {
    let session = Session::from_config(config)?.with_progress(progress.reporter());

    let selection = select_paths(paths, &config.selection)?;
    let selected = selection.len();
    let queued = session.add_files(selection);
    if queued == 0 {
        bail!("No documents selected");
    }
    tracing::info!(selected, queued, "documents queued");

    session.run_indexing().await?;
    Ok(session)
}

pub async fn run_index(config: &Config, paths: &[PathBuf], progress: ProgressMode) -> Result<()> {
    let session = index_paths(config, paths, progress).await?;

    println!("index");
    println!("  queued: {} files", session.files().len());
    println!("  indexed: {} files", session.indexed_names().len());
    for name in session.indexed_names() {
        println!("    {}", name);
    }
    println!("ok");
    Ok(())
}

/// One-line description of an indexing outcome for interactive output.
pub fn describe_outcome(outcome: &IndexOutcome) -> String {
    match outcome {
        IndexOutcome::AlreadyRunning => "indexing already in progress".to_string(),
        IndexOutcome::UpToDate => "all files already indexed".to_string(),
        IndexOutcome::Indexed { uploaded } => format!("indexed ({} uploaded)", uploaded),
    }
}
