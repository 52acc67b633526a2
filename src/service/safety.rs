//! Content safety gate
//!
//! Sends newly committed content to an external classifier. The gate never
//! fails its caller: a classifier error or timeout is logged and treated as
//! an unflagged verdict.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use url::Url;

use crate::config::ModerationConfig;
use crate::domain::{CategoryScore, ModerationAnalysis, ScanInput};
use crate::error::AppError;
use crate::metrics::observe_safety_scan;

/// A content classifier
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn scan(&self, input: &ScanInput) -> Result<ModerationAnalysis, AppError>;
}

/// Classifier used when moderation is switched off; flags nothing
pub struct DisabledClassifier;

#[async_trait]
impl ContentClassifier for DisabledClassifier {
    async fn scan(&self, _input: &ScanInput) -> Result<ModerationAnalysis, AppError> {
        Ok(ModerationAnalysis::unflagged(Utc::now()))
    }
}

/// Client for an OpenAI-compatible `/v1/moderations` endpoint
pub struct HttpClassifier {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
    /// Base for resolving stored page references into fetchable URLs
    media_base_url: Option<Url>,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    flagged: bool,
    #[serde(default)]
    category_scores: BTreeMap<String, f64>,
}

impl HttpClassifier {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        model: Option<String>,
        media_base_url: Option<Url>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Quillpress/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            endpoint,
            api_key,
            model,
            media_base_url,
        })
    }

    /// Absolute http(s) and data URLs pass through; anything else is a
    /// store reference joined onto the media base, if one is configured.
    fn image_url(&self, reference: &str) -> Option<Url> {
        match Url::parse(reference) {
            Ok(url) if matches!(url.scheme(), "http" | "https" | "data") => Some(url),
            Ok(_) => None,
            Err(_) => self
                .media_base_url
                .as_ref()
                .and_then(|base| base.join(reference.trim_start_matches('/')).ok()),
        }
    }

    fn request_body(&self, input: &ScanInput) -> serde_json::Value {
        let images: Vec<Url> = input
            .images
            .iter()
            .filter_map(|reference| self.image_url(reference))
            .collect();
        if images.len() < input.images.len() {
            tracing::debug!(
                skipped = input.images.len() - images.len(),
                "Page references without a fetchable URL left out of the scan"
            );
        }

        let payload = if images.is_empty() {
            serde_json::json!(input.text)
        } else {
            let mut parts = vec![serde_json::json!({ "type": "text", "text": input.text })];
            parts.extend(images.iter().map(|url| {
                serde_json::json!({ "type": "image_url", "image_url": { "url": url.as_str() } })
            }));
            serde_json::Value::Array(parts)
        };

        let mut body = serde_json::Map::new();
        body.insert("input".to_string(), payload);
        if let Some(model) = &self.model {
            body.insert("model".to_string(), serde_json::json!(model));
        }
        serde_json::Value::Object(body)
    }
}

/// Parse the media base URL so relative references join under it
fn media_base(value: &str) -> Result<Url, AppError> {
    let mut base = Url::parse(value)
        .map_err(|e| AppError::Config(format!("moderation.media_base_url is invalid: {e}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

/// Collapse a classifier response into one verdict.
///
/// Multiple results (one per image) are flagged if any is, and each
/// category keeps its highest score.
fn analysis_from_response(response: ModerationResponse) -> Result<ModerationAnalysis, AppError> {
    if response.results.is_empty() {
        return Err(AppError::Classifier("response has no results".to_string()));
    }

    let mut flagged = false;
    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    for result in response.results {
        flagged |= result.flagged;
        for (category, score) in result.category_scores {
            let entry = scores.entry(category).or_insert(score);
            *entry = entry.max(score);
        }
    }

    Ok(ModerationAnalysis {
        flagged,
        categories: scores
            .into_iter()
            .map(|(category, score)| CategoryScore { category, score })
            .collect(),
        analyzed_at: Utc::now(),
    })
}

#[async_trait]
impl ContentClassifier for HttpClassifier {
    async fn scan(&self, input: &ScanInput) -> Result<ModerationAnalysis, AppError> {
        let mut request = self.http_client.post(&self.endpoint).json(&self.request_body(input));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AppError::Classifier(format!(
                "classifier returned HTTP {}",
                response.status()
            )));
        }

        let body: ModerationResponse = response.json().await?;
        analysis_from_response(body)
    }
}

/// Build the classifier selected by configuration
pub fn classifier_from_config(
    config: &ModerationConfig,
) -> Result<Arc<dyn ContentClassifier>, AppError> {
    if !config.enabled {
        tracing::info!("Content moderation disabled");
        return Ok(Arc::new(DisabledClassifier));
    }

    let endpoint = config.endpoint.clone().ok_or_else(|| {
        AppError::Config("moderation.endpoint is required when moderation is enabled".to_string())
    })?;
    let media_base_url = config.media_base_url.as_deref().map(media_base).transpose()?;
    tracing::info!(endpoint = %endpoint, "Content moderation enabled");

    Ok(Arc::new(HttpClassifier::new(
        endpoint,
        config.api_key.clone(),
        config.model.clone(),
        media_base_url,
        Duration::from_millis(config.timeout_ms),
    )?))
}

/// Scans content and always yields a verdict
#[derive(Clone)]
pub struct ContentSafetyGate {
    classifier: Arc<dyn ContentClassifier>,
    timeout: Duration,
}

impl ContentSafetyGate {
    pub fn new(classifier: Arc<dyn ContentClassifier>, timeout: Duration) -> Self {
        Self {
            classifier,
            timeout,
        }
    }

    pub async fn scan(&self, input: &ScanInput) -> ModerationAnalysis {
        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.classifier.scan(input)).await;

        let (outcome, analysis) = match result {
            Ok(Ok(analysis)) if analysis.flagged => ("flagged", analysis),
            Ok(Ok(analysis)) => ("clean", analysis),
            Ok(Err(error)) => {
                tracing::warn!(%error, kind = input.kind(), "Content scan failed; treating as unflagged");
                ("error", ModerationAnalysis::unflagged(Utc::now()))
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    kind = input.kind(),
                    "Content scan timed out; treating as unflagged"
                );
                ("timeout", ModerationAnalysis::unflagged(Utc::now()))
            }
        };

        observe_safety_scan(outcome, started.elapsed());
        analysis
    }
}
