//! HTTP client for the remote execution service

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::Duration;

use super::types::{CasePayload, RunPayload, SubmitResponse};
use crate::common::{Error, Result};

/// Header carrying the API key on every request
const API_KEY_HEADER: &str = "X-API-Key";

/// Longest error body echoed back into an error message
const MAX_ERROR_BODY: usize = 300;

/// Interface to the remote execution service
///
/// `submit_run` registers a test case for execution and `run_status`
/// returns the full current state of a run. Implementations must report
/// step, check, problem and warning lists that only ever grow between
/// consecutive polls of the same run.
#[async_trait]
pub trait RunService: Send + Sync {
    /// Submit a test case for execution
    async fn submit_run(&self, case: &CasePayload) -> Result<SubmitResponse>;

    /// Fetch the current state of a run
    async fn run_status(&self, run_id: &str) -> Result<RunPayload>;
}

/// Client for the hosted execution API
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client that authenticates with `api_key` on every request
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| Error::Config("API key contains invalid header characters".into()))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RunService for ApiClient {
    async fn submit_run(&self, case: &CasePayload) -> Result<SubmitResponse> {
        tracing::debug!("Submitting test '{}' to {}", case.id, self.base_url);
        let response = self.http.post(self.url("/run")).json(case).send().await?;
        read_json(response).await
    }

    async fn run_status(&self, run_id: &str) -> Result<RunPayload> {
        let response = self
            .http
            .get(self.url(&format!("/run/{run_id}")))
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
            message.push_str("...");
        }
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}
