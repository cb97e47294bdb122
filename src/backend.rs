//! Client for the indexing and query backend.
//!
//! The backend is an external RAG service with three endpoints:
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `POST` | `/upload/` | multipart, one `file` part | status only |
//! | `POST` | `/index/` | none | status only |
//! | `POST` | `/query/` | `{"text": ...}` | `{"answer": ..., "sources": [...]}` |
//!
//! [`IndexBackend`] is the seam the orchestrator talks to; [`HttpBackend`]
//! is the reqwest implementation. Any non-success status is an error.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::models::{QueryAnswer, QueryRequest};

#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Upload one document's bytes under `name`.
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<()>;

    /// Ask the backend to (re)build its index over everything uploaded.
    async fn build_index(&self) -> Result<()>;

    /// Run a retrieval-augmented query.
    async fn query(&self, text: &str) -> Result<QueryAnswer>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/", self.base_url, path)
    }
}

#[async_trait]
impl IndexBackend for HttpBackend {
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Upload of '{}' failed to reach the backend", name))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Upload of '{}' failed: {} {}", name, status, body);
        }
        Ok(())
    }

    async fn build_index(&self) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("index"))
            .send()
            .await
            .context("Index request failed to reach the backend")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Indexing failed on the server: {} {}", status, body);
        }
        Ok(())
    }

    async fn query(&self, text: &str) -> Result<QueryAnswer> {
        let body = QueryRequest {
            text: text.to_string(),
        };
        let response = self
            .client
            .post(self.endpoint("query"))
            .json(&body)
            .send()
            .await
            .context("Query request failed to reach the backend")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Failed to get answer from the server: {} {}", status, body);
        }

        response
            .json::<QueryAnswer>()
            .await
            .context("Invalid query response from the backend")
    }
}
