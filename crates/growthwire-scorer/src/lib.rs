// crates/growthwire-scorer/src/lib.rs
// ============================================================================
// Module: HTTP Recommendation Scorer
// Description: Scorer client for the external recommendation service.
// Purpose: Submit derived readings with strict limits and normalize replies.
// Dependencies: growthwire-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! The HTTP scorer issues bounded POST requests to the external
//! recommendation service. It enforces scheme restrictions, redirects
//! disabled, response size limits, and an explicit timeout so a slow scorer
//! can never pin a worker. The scorer is untrusted: its replies are parsed
//! defensively and legacy field spellings are normalized at this edge so the
//! rest of the system never sees the drift.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use growthwire_core::EnrichmentJob;
use growthwire_core::RecommendationScorer;
use growthwire_core::ScorerError;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP scorer client.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` endpoints.
/// - `max_response_bytes` is enforced as a hard upper bound on reply bodies.
/// - `timeout_ms` applies to the full request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpScorerConfig {
    /// Full URL of the scorer endpoint.
    pub endpoint: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for HttpScorerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_ms: 5_000,
            max_response_bytes: 64 * 1024,
            allow_http: false,
            user_agent: "growthwire/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// Request body submitted to the scorer.
#[derive(Debug, Serialize)]
struct ScoreRequest {
    /// Stored record identifier.
    id: u64,
    /// Reported age in device-local units (months).
    age: u32,
    /// Reported height measurement.
    height: f64,
    /// Subject gender from the device registry.
    gender: String,
    /// Raw status classification.
    status: String,
}

/// Reply body returned by the scorer.
///
/// # Invariants
/// - `rekomendasi` is the legacy spelling still emitted by older scorer
///   deployments; it is folded into `recommendation` here.
#[derive(Debug, Deserialize)]
struct ScoreResponse {
    /// Recommendation text when the scorer produced one.
    #[serde(default)]
    recommendation: Option<String>,
    /// Legacy recommendation field spelling.
    #[serde(default)]
    rekomendasi: Option<String>,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// HTTP scorer client.
///
/// # Invariants
/// - Redirects are not followed.
/// - Replies exceeding configured limits fail closed.
pub struct HttpScorer {
    /// Client configuration, including limits and policy.
    config: HttpScorerConfig,
    /// Endpoint parsed and policy-checked at construction.
    endpoint: Url,
    /// HTTP client used for outbound requests.
    client: reqwest::Client,
}

impl HttpScorer {
    /// Creates a new scorer client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScorerError`] when the endpoint violates policy or the HTTP
    /// client cannot be created.
    pub fn new(config: HttpScorerConfig) -> Result<Self, ScorerError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|_| ScorerError::Request("invalid scorer endpoint".to_string()))?;
        match endpoint.scheme() {
            "https" => {}
            "http" if config.allow_http => {}
            _ => {
                return Err(ScorerError::Request(
                    "scorer endpoint scheme not allowed".to_string(),
                ));
            }
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|_| ScorerError::Request("scorer client build failed".to_string()))?;
        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    /// Reads a reply body up to the configured size limit.
    async fn read_limited(&self, response: reqwest::Response) -> Result<Vec<u8>, ScorerError> {
        let max_bytes = self.config.max_response_bytes;
        if let Some(length) = response.content_length()
            && length > max_bytes as u64
        {
            return Err(ScorerError::TooLarge {
                max_bytes,
                actual_bytes: usize::try_from(length).unwrap_or(usize::MAX),
            });
        }
        let mut body = Vec::new();
        let mut response = response;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| classify_transport_error(&err))?
        {
            if body.len() + chunk.len() > max_bytes {
                return Err(ScorerError::TooLarge {
                    max_bytes,
                    actual_bytes: body.len() + chunk.len(),
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl RecommendationScorer for HttpScorer {
    async fn score(&self, job: &EnrichmentJob) -> Result<Option<String>, ScorerError> {
        let request = ScoreRequest {
            id: job.record_id.get(),
            age: job.age,
            height: job.height,
            gender: job.gender.clone(),
            status: job.status.clone(),
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| classify_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScorerError::Status(status.as_u16()));
        }
        let body = self.read_limited(response).await?;
        let reply: ScoreResponse = serde_json::from_slice(&body)
            .map_err(|err| ScorerError::Malformed(err.to_string()))?;
        Ok(reply.recommendation.or(reply.rekomendasi).filter(|text| !text.is_empty()))
    }
}

/// Maps a transport error onto the scorer error taxonomy.
fn classify_transport_error(error: &reqwest::Error) -> ScorerError {
    if error.is_timeout() {
        ScorerError::Timeout
    } else {
        ScorerError::Request("scorer request failed".to_string())
    }
}
