//! `genie ask`: index documents, ask one question, print the answer.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::annotation::{insight_lines, AugmentOutcome};
use crate::config::Config;
use crate::conversation::{RejectReason, SubmitOutcome};
use crate::ingest::index_paths;
use crate::progress::ProgressMode;

pub struct AskOptions {
    pub augment: bool,
    pub insights: bool,
    pub json: bool,
}

pub async fn run_ask(
    config: &Config,
    paths: &[PathBuf],
    question: &str,
    options: AskOptions,
    progress: ProgressMode,
) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Question must not be empty");
    }

    let session = index_paths(config, paths, progress).await?;
    session.set_input(question);

    if options.augment {
        match session.augment_query().await {
            AugmentOutcome::Rewritten => eprintln!("augmented query: {}", session.input()),
            _ => eprintln!("augmentation unavailable, asking the original question"),
        }
    }

    let index = match session.submit_input().await {
        SubmitOutcome::Answered { index } => index,
        SubmitOutcome::Failed { index } => {
            let notice = session.transcript()[index].text.clone();
            bail!("{}", notice);
        }
        SubmitOutcome::Rejected(RejectReason::NothingIndexed) => {
            bail!("Nothing has been indexed yet")
        }
        SubmitOutcome::Rejected(reason) => bail!("Query rejected: {:?}", reason),
    };

    let insights = if options.insights {
        session.extract_insights(index).await;
        session.insights(index).text().map(str::to_string)
    } else {
        None
    };

    let transcript = session.transcript();
    let reply = &transcript[index];

    if options.json {
        let mut obj = serde_json::json!({
            "question": transcript[index - 1].text,
            "answer": reply.text,
            "sources": reply.sources.clone().unwrap_or_default(),
        });
        if let Some(raw) = &insights {
            obj["insights"] = serde_json::json!(insight_lines(raw));
        }
        println!("{}", serde_json::to_string_pretty(&obj)?);
        return Ok(());
    }

    println!("{}", reply.text);
    if let Some(sources) = reply.sources.as_ref().filter(|s| !s.is_empty()) {
        println!();
        println!("sources: {}", sources.join(", "));
    }
    if let Some(raw) = &insights {
        println!();
        println!("key insights:");
        for line in insight_lines(raw) {
            println!("  - {}", line);
        }
    }
    Ok(())
}
