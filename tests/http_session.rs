//! End-to-end session tests against an in-process HTTP backend.

mod common;

use chrono::{TimeZone, Utc};
use std::sync::Arc;

use offline_genie::backend::{HttpBackend, IndexBackend};
use offline_genie::config::BackendConfig;
use offline_genie::conversation::{PipelineState, SubmitOutcome, QUERY_FAILED_NOTICE};
use offline_genie::generative::DisabledGenerator;
use offline_genie::indexing::IndexOutcome;
use offline_genie::models::{DocumentHandle, Sender};
use offline_genie::session::{Session, INDEXING_FAILED_BANNER};

use common::{spawn_fake_backend, BROKEN_UPLOAD};

fn http_backend(url: &str) -> HttpBackend {
    HttpBackend::new(&BackendConfig {
        url: url.to_string(),
        timeout_secs: Some(10),
    })
    .unwrap()
}

fn session_for(url: &str) -> Session {
    Session::new(Arc::new(http_backend(url)), Arc::new(DisabledGenerator))
}

fn doc(name: &str, millis: i64, body: &str) -> DocumentHandle {
    let modified = Utc.timestamp_millis_opt(millis).unwrap();
    DocumentHandle::from_bytes(name, modified, body.as_bytes().to_vec())
}

#[tokio::test]
async fn upload_sends_file_part_with_name() {
    let (url, fake) = spawn_fake_backend().await;
    let backend = http_backend(&url);

    backend
        .upload("report.csv", b"a,b\n1,2\n".to_vec())
        .await
        .unwrap();

    let recorded = fake.recorded.lock().unwrap();
    assert_eq!(recorded.uploads.len(), 1);
    assert_eq!(recorded.uploads[0].0, "report.csv");
    assert_eq!(recorded.uploads[0].1, b"a,b\n1,2\n");
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let (url, _fake) = spawn_fake_backend().await;
    let backend = http_backend(&url);

    let err = backend
        .upload(BROKEN_UPLOAD, b"x".to_vec())
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("500"));
}

#[tokio::test]
async fn unreachable_backend_is_an_error() {
    // Bind then drop a listener to get a port nobody is serving.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let backend = http_backend(&url);
    assert!(backend.build_index().await.is_err());
    assert!(backend.query("hello").await.is_err());
}

#[tokio::test]
async fn index_then_query_round_trip() {
    let (url, fake) = spawn_fake_backend().await;
    let session = session_for(&url);

    session.add_files(vec![
        doc("alpha.md", 1_000, "# Alpha"),
        doc("beta.txt", 2_000, "beta notes"),
    ]);

    let outcome = session.run_indexing().await.unwrap();
    assert_eq!(outcome, IndexOutcome::Indexed { uploaded: 2 });
    assert_eq!(fake.uploaded_names(), vec!["alpha.md", "beta.txt"]);
    assert_eq!(fake.index_builds(), 1);
    assert!(session.indexed_names().contains("alpha.md"));
    assert!(session.error().is_none());

    let outcome = session.submit_query("what is alpha?").await;
    let SubmitOutcome::Answered { index } = outcome else {
        panic!("expected an answer, got {:?}", outcome);
    };
    assert_eq!(index, 1);

    let transcript = session.transcript();
    assert_eq!(transcript[0].sender, Sender::User);
    assert_eq!(transcript[0].text, "what is alpha?");
    assert_eq!(transcript[1].sender, Sender::Assistant);
    assert_eq!(transcript[1].text, "answer to: what is alpha?");
    assert_eq!(
        transcript[1].sources.as_deref().map(|s| s.len()),
        Some(2)
    );
    assert_eq!(fake.queries(), vec!["what is alpha?"]);
    assert_eq!(session.pipeline_state(), PipelineState::Idle);
}

#[tokio::test]
async fn second_run_uploads_only_new_files() {
    let (url, fake) = spawn_fake_backend().await;
    let session = session_for(&url);

    session.add_files(vec![doc("alpha.md", 1_000, "a")]);
    session.run_indexing().await.unwrap();

    session.add_files(vec![doc("beta.md", 2_000, "b")]);
    let outcome = session.run_indexing().await.unwrap();

    assert_eq!(outcome, IndexOutcome::Indexed { uploaded: 1 });
    let recorded = fake.recorded.lock().unwrap();
    assert_eq!(recorded.uploads.len(), 2);
    assert_eq!(recorded.uploads[1].0, "beta.md");
    assert_eq!(recorded.index_builds, 2);
}

#[tokio::test]
async fn failed_upload_raises_banner_and_skips_build() {
    let (url, fake) = spawn_fake_backend().await;
    let session = session_for(&url);

    session.add_files(vec![
        doc("alpha.md", 1_000, "a"),
        doc(BROKEN_UPLOAD, 2_000, "b"),
    ]);

    assert!(session.run_indexing().await.is_err());
    assert_eq!(session.error().as_deref(), Some(INDEXING_FAILED_BANNER));
    assert!(session.indexed_names().is_empty());
    assert_eq!(fake.index_builds(), 0);
    assert!(!session.is_indexing());

    // Nothing indexed, so queries are refused without reaching the backend.
    assert!(matches!(
        session.submit_query("anything").await,
        SubmitOutcome::Rejected(_)
    ));
    assert!(fake.queries().is_empty());
}

#[tokio::test]
async fn failed_query_appends_notice_and_returns_to_idle() {
    let (url, fake) = spawn_fake_backend().await;
    let session = session_for(&url);
    session.add_files(vec![doc("alpha.md", 1_000, "a")]);
    session.run_indexing().await.unwrap();

    fake.break_queries();
    let outcome = session.submit_query("still there?").await;

    assert_eq!(outcome, SubmitOutcome::Failed { index: 1 });
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].text, "still there?");
    assert_eq!(transcript[1].sender, Sender::Assistant);
    assert_eq!(transcript[1].text, QUERY_FAILED_NOTICE);
    assert!(transcript[1].sources.is_none());
    assert_eq!(session.pipeline_state(), PipelineState::Idle);
}
