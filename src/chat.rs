//! `genie chat`: interactive session over stdin.
//!
//! Lines starting with `:` are commands; anything else is sent as a query.
//! Indexing, summaries and insights run as background tasks so the prompt
//! stays responsive; their results show up in `:files` and `:history`.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::annotation::{insight_lines, AnnotationOutcome, AugmentOutcome, JobState};
use crate::config::Config;
use crate::conversation::{RejectReason, SubmitOutcome};
use crate::ingest::describe_outcome;
use crate::models::Sender;
use crate::progress::ProgressMode;
use crate::selection::select_paths;
use crate::session::Session;

const HELP: &str = "\
commands:
  :add <path>...      queue files or directories
  :rm <n|id>          remove a queued file
  :files              list queued files, index state and summaries
  :index              upload pending files and rebuild the index
  :summarize <n|id>   summarize an indexed file
  :insights <n>       extract insights from assistant message #n
  :augment <text>     rewrite a query before sending it
  :send               send the pending (augmented) query
  :history            show the transcript
  :dismiss            dismiss the error banner
  :help               show this help
  :quit               leave
anything else is sent as a question";

/// A parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Add(Vec<PathBuf>),
    Remove(String),
    Files,
    Index,
    Summarize(String),
    Insights(usize),
    Augment(String),
    Send,
    History,
    Dismiss,
    Help,
    Quit,
    Ask(String),
    Invalid(String),
}

fn parse_line(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        return Command::Ask(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match (name, arg) {
        ("add", "") => Command::Invalid("usage: :add <path>...".to_string()),
        ("add", paths) => Command::Add(paths.split_whitespace().map(PathBuf::from).collect()),
        ("rm", "") => Command::Invalid("usage: :rm <n|id>".to_string()),
        ("rm", target) => Command::Remove(target.to_string()),
        ("files", _) => Command::Files,
        ("index", _) => Command::Index,
        ("summarize", "") => Command::Invalid("usage: :summarize <n|id>".to_string()),
        ("summarize", target) => Command::Summarize(target.to_string()),
        ("insights", n) => match n.parse() {
            Ok(n) => Command::Insights(n),
            Err(_) => Command::Invalid("usage: :insights <message number>".to_string()),
        },
        ("augment", text) => Command::Augment(text.to_string()),
        ("send", _) => Command::Send,
        ("history", _) => Command::History,
        ("dismiss", _) => Command::Dismiss,
        ("help", _) => Command::Help,
        ("quit", _) | ("exit", _) | ("q", _) => Command::Quit,
        (other, _) => Command::Invalid(format!("unknown command ':{}' (try :help)", other)),
    }
}

/// Resolve a 1-based queue position or a literal file id.
fn resolve_file(session: &Session, target: &str) -> Option<String> {
    let files = session.files();
    if let Ok(n) = target.parse::<usize>() {
        return files.get(n.checked_sub(1)?).map(|f| f.id.clone());
    }
    files.iter().find(|f| f.id == target).map(|f| f.id.clone())
}

pub async fn run_chat(config: &Config, paths: &[PathBuf], progress: ProgressMode) -> Result<()> {
    let session = Arc::new(Session::from_config(config)?.with_progress(progress.reporter()));

    if !paths.is_empty() {
        let added = session.add_files(select_paths(paths, &config.selection)?);
        println!("queued {} files", added);
    }
    println!("genie chat (backend {}). Type :help for commands.", config.backend.url);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Command::Quit => break,
            command => handle(&session, config, command).await,
        }
        if let Some(banner) = session.error() {
            println!("! {} (:dismiss to hide)", banner);
        }
    }
    Ok(())
}

async fn handle(session: &Arc<Session>, config: &Config, command: Command) {
    match command {
        Command::Add(paths) => match select_paths(&paths, &config.selection) {
            Ok(selection) => println!("queued {} files", session.add_files(selection)),
            Err(e) => println!("could not add files: {:#}", e),
        },
        Command::Remove(target) => match resolve_file(session, &target) {
            Some(id) => {
                session.remove_file(&id);
                println!("removed {}", id);
            }
            None => println!("no queued file '{}'", target),
        },
        Command::Files => print_files(session),
        Command::Index => {
            if session.is_indexing() {
                println!("indexing already in progress");
                return;
            }
            let session = session.clone();
            tokio::spawn(async move {
                match session.run_indexing().await {
                    Ok(outcome) => println!("[index] {}", describe_outcome(&outcome)),
                    Err(_) => println!("[index] failed"),
                }
            });
        }
        Command::Summarize(target) => {
            let Some(id) = resolve_file(session, &target) else {
                println!("no queued file '{}'", target);
                return;
            };
            let session = session.clone();
            tokio::spawn(async move {
                match session.summarize(&id).await {
                    AnnotationOutcome::Ineligible => {
                        println!("[summary] {} is not indexed yet", id)
                    }
                    AnnotationOutcome::AlreadyLoading => {
                        println!("[summary] {} is already being summarized", id)
                    }
                    AnnotationOutcome::Resolved { .. } => {
                        println!("[summary] {} ready (see :files)", id)
                    }
                }
            });
        }
        Command::Insights(n) => {
            let session = session.clone();
            tokio::spawn(async move {
                match session.extract_insights(n).await {
                    AnnotationOutcome::Ineligible => {
                        println!("[insights] #{} is not an assistant message", n)
                    }
                    AnnotationOutcome::AlreadyLoading => {
                        println!("[insights] #{} already in progress", n)
                    }
                    AnnotationOutcome::Resolved { .. } => {
                        println!("[insights] #{} ready (see :history)", n)
                    }
                }
            });
        }
        Command::Augment(text) => {
            if !text.is_empty() {
                session.set_input(&text);
            }
            match session.augment_query().await {
                AugmentOutcome::Rewritten => {
                    println!("pending query: {}", session.input());
                    println!("(:send to ask it)");
                }
                AugmentOutcome::Reverted => {
                    println!("augmentation failed; pending query: {}", session.input())
                }
                AugmentOutcome::Skipped | AugmentOutcome::Superseded => {
                    println!("nothing to augment")
                }
            }
        }
        Command::Send => {
            let outcome = session.submit_input().await;
            print_submission(session, outcome);
        }
        Command::Ask(text) => {
            session.set_input(&text);
            let outcome = session.submit_input().await;
            print_submission(session, outcome);
        }
        Command::History => print_history(session),
        Command::Dismiss => session.dismiss_error(),
        Command::Help => println!("{}", HELP),
        Command::Invalid(message) => println!("{}", message),
        Command::Quit => {}
    }
}

fn print_submission(session: &Session, outcome: SubmitOutcome) {
    match outcome {
        SubmitOutcome::Answered { index } | SubmitOutcome::Failed { index } => {
            if let Some(message) = session.transcript().get(index) {
                println!("#{} genie: {}", index, message.text);
                if let Some(sources) = message.sources.as_ref().filter(|s| !s.is_empty()) {
                    println!("   sources: {}", sources.join(", "));
                }
            }
        }
        SubmitOutcome::Rejected(RejectReason::EmptyQuery) => println!("nothing to send"),
        SubmitOutcome::Rejected(RejectReason::Busy) => println!("still answering the last question"),
        SubmitOutcome::Rejected(RejectReason::NothingIndexed) => {
            println!("index some files first (:add, then :index)")
        }
        SubmitOutcome::Rejected(RejectReason::Indexing) => {
            println!("indexing in progress, ask again when it finishes")
        }
        SubmitOutcome::Rejected(RejectReason::Augmenting) => {
            println!("the query is still being augmented")
        }
    }
}

fn print_files(session: &Session) {
    let files = session.files();
    if files.is_empty() {
        println!("no files queued");
        return;
    }
    let indexed = session.indexed_names();
    for (i, file) in files.iter().enumerate() {
        let state = if indexed.contains(&file.name) {
            "indexed"
        } else {
            "pending"
        };
        println!("{:>3}. {} [{}]  id={}", i + 1, file.name, state, file.id);
        match session.summary(&file.id) {
            JobState::Absent => {}
            JobState::Loading => println!("     summary: generating..."),
            JobState::Resolved(text) => println!("     summary: {}", text.trim()),
        }
    }
    if session.is_indexing() {
        println!("(indexing in progress)");
    }
}

fn print_history(session: &Session) {
    for (i, message) in session.transcript().iter().enumerate() {
        let who = match message.sender {
            Sender::User => "you",
            Sender::Assistant => "genie",
        };
        println!("#{} {}: {}", i, who, message.text);
        if let Some(sources) = message.sources.as_ref().filter(|s| !s.is_empty()) {
            println!("   sources: {}", sources.join(", "));
        }
        match session.insights(i) {
            JobState::Absent => {}
            JobState::Loading => println!("   insights: extracting..."),
            JobState::Resolved(raw) => {
                println!("   key insights:");
                for line in insight_lines(&raw) {
                    println!("     - {}", line);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(
            parse_line("  what about refunds?  "),
            Command::Ask("what about refunds?".to_string())
        );
    }

    #[test]
    fn commands_parse_arguments() {
        assert_eq!(
            parse_line(":add a.pdf docs/"),
            Command::Add(vec![PathBuf::from("a.pdf"), PathBuf::from("docs/")])
        );
        assert_eq!(parse_line(":rm 2"), Command::Remove("2".to_string()));
        assert_eq!(parse_line(":insights 3"), Command::Insights(3));
        assert_eq!(
            parse_line(":augment find refunds"),
            Command::Augment("find refunds".to_string())
        );
        assert_eq!(parse_line(":augment"), Command::Augment(String::new()));
        assert_eq!(parse_line(":q"), Command::Quit);
    }

    #[test]
    fn bad_commands_are_reported() {
        assert!(matches!(parse_line(":add"), Command::Invalid(_)));
        assert!(matches!(parse_line(":insights x"), Command::Invalid(_)));
        assert!(matches!(parse_line(":frobnicate"), Command::Invalid(_)));
    }
}
