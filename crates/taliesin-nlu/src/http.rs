//! HTTP client for a hosted analyzer/generator service.
//!
//! `POST {base}/{locale}/query` analyzes an utterance; `POST
//! {base}/{locale}/answer` generates a reply for a target act. Transient
//! failures are retried with exponential backoff. A candidate that fails to
//! decode drops that candidate, not the whole analysis.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::{NlgClient, NluClient};
use crate::error::NluError;
use crate::types::{
    CandidateParse, CandidateScore, EntityMap, GeneratedUtterance, NluOptions, NluResult,
};

/// Connection settings for the analyzer service.
#[derive(Debug, Clone)]
pub struct NluConfig {
    pub base_url: String,
    pub locale: String,
    pub timeout: Duration,
    pub max_retries: u32,
    /// How many candidates to request per utterance.
    pub candidate_limit: usize,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8400".to_string(),
            locale: "en-US".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            candidate_limit: 5,
        }
    }
}

impl NluConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }
}

/// Analyzer and generator backed by one HTTP service.
#[derive(Debug)]
pub struct HttpNluClient {
    config: NluConfig,
    client: reqwest::Client,
}

impl HttpNluClient {
    pub fn new(config: NluConfig) -> Result<Self, NluError> {
        if config.base_url.is_empty() {
            return Err(NluError::config("base_url must not be empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/{}/{name}",
            self.config.base_url.trim_end_matches('/'),
            self.config.locale
        )
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &Req,
    ) -> Result<Resp, NluError> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NluError::backend(status.as_u16(), message));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl NluClient for HttpNluClient {
    async fn send_utterance(
        &self,
        utterance: &str,
        context: Option<(&[String], &EntityMap)>,
        options: &NluOptions,
    ) -> Result<NluResult, NluError> {
        let body = WireQueryRequest {
            q: utterance.to_string(),
            context: context.map(|(tokens, _)| tokens.join(" ")),
            entities: context.map(|(_, entities)| entities.clone()).unwrap_or_default(),
            expect: options.expect.clone(),
            choices: options.choices.clone(),
            tokenized: false,
            limit: self.config.candidate_limit,
        };
        let url = self.endpoint("query");
        tracing::debug!(utterance, "Analyzing utterance");
        let response: WireQueryResponse =
            with_retry(self.config.max_retries, || self.post(&url, &body)).await?;
        if response.result != "ok" {
            return Err(NluError::internal(format!(
                "analyzer returned result={}",
                response.result
            )));
        }
        let result = decode_result(response);
        tracing::debug!(candidates = result.candidates.len(), "Analysis complete");
        Ok(result)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[async_trait]
impl NlgClient for HttpNluClient {
    async fn generate_utterance(
        &self,
        context: &[String],
        entities: &EntityMap,
        target: &[String],
    ) -> Result<Vec<GeneratedUtterance>, NluError> {
        let body = WireAnswerRequest {
            context: context.join(" "),
            entities: entities.clone(),
            target: target.join(" "),
        };
        let url = self.endpoint("answer");
        let response: WireAnswerResponse =
            with_retry(self.config.max_retries, || self.post(&url, &body)).await?;
        if response.result != "ok" {
            return Err(NluError::internal(format!(
                "generator returned result={}",
                response.result
            )));
        }
        Ok(response.answers)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WireQueryRequest {
    q: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    entities: EntityMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    expect: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    choices: Vec<String>,
    tokenized: bool,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct WireQueryResponse {
    result: String,
    #[serde(default)]
    tokens: Vec<String>,
    #[serde(default)]
    entities: EntityMap,
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    code: Vec<String>,
    #[serde(default)]
    score: serde_json::Value,
    #[serde(default)]
    unsupported: bool,
}

#[derive(Debug, Serialize)]
struct WireAnswerRequest {
    context: String,
    entities: EntityMap,
    target: String,
}

#[derive(Debug, Deserialize)]
struct WireAnswerResponse {
    result: String,
    #[serde(default)]
    answers: Vec<GeneratedUtterance>,
}

/// Decode the wire response, dropping candidates with unusable scores.
///
/// Legacy analyzers mark exact-store hits with the JSON string `"Infinity"`
/// in place of a numeric score; that sentinel maps to
/// [`CandidateScore::Exact`] so nothing downstream has to compare against
/// infinity. The `unsupported` flag wins over whatever score is attached.
fn decode_result(wire: WireQueryResponse) -> NluResult {
    let mut candidates = Vec::with_capacity(wire.candidates.len());
    for entry in wire.candidates {
        let score = if entry.unsupported {
            CandidateScore::Unsupported
        } else {
            match score_from_wire(&entry.score) {
                Some(score) => score,
                None => {
                    tracing::warn!(score = %entry.score, "Dropping candidate with unusable score");
                    continue;
                }
            }
        };
        candidates.push(CandidateParse::new(entry.code, score));
    }
    NluResult {
        tokens: wire.tokens,
        entities: wire.entities,
        candidates,
    }
}

fn score_from_wire(raw: &serde_json::Value) -> Option<CandidateScore> {
    match raw {
        serde_json::Value::String(s) if s == "Infinity" => Some(CandidateScore::Exact),
        serde_json::Value::Number(n) => n.as_f64().map(CandidateScore::Model),
        _ => None,
    }
}

/// Run a request, retrying transient failures with exponential backoff.
async fn with_retry<T, F, Fut>(max_retries: u32, f: F) -> Result<T, NluError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, NluError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < max_retries && error.is_retryable() => {
                let delay = Duration::from_millis(250 * 2u64.pow(attempt));
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "Retrying request"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
