//! Categorical backend: discrete likelihood levels per category (Google Vision SafeSearch).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::debug;

use vguard_models::{FrameVerdict, ScoreDetails};

use crate::backend::ContentBackend;
use crate::error::{ClassifierError, ClassifierResult};

const FLAGGED_CONFIDENCE: f64 = 0.9;
const CLEAN_CONFIDENCE: f64 = 0.5;

/// SafeSearch likelihood level, ordered from least to most likely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    #[default]
    Unknown,
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
}

impl Likelihood {
    /// Numeric projection kept in the score details.
    pub fn score(&self) -> f64 {
        match self {
            Likelihood::Unknown | Likelihood::VeryUnlikely => 0.0,
            Likelihood::Unlikely => 0.25,
            Likelihood::Possible => 0.5,
            Likelihood::Likely => 0.75,
            Likelihood::VeryLikely => 1.0,
        }
    }

    pub fn is_likely(&self) -> bool {
        *self >= Likelihood::Likely
    }
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResult {
    safe_search_annotation: Option<SafeSearch>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SafeSearch {
    adult: Likelihood,
    violence: Likelihood,
    racy: Likelihood,
}

pub struct CategoricalBackend {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl CategoricalBackend {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> ClassifierResult<Self> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl ContentBackend for CategoricalBackend {
    async fn classify(&self, frame: &Path) -> ClassifierResult<FrameVerdict> {
        let bytes = tokio::fs::read(frame).await?;
        let request = json!({
            "requests": [{
                "image": {"content": STANDARD.encode(bytes)},
                "features": [{"type": "SAFE_SEARCH_DETECTION"}],
            }]
        });

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::RequestFailed(format!(
                "backend returned {}: {}",
                status, body
            )));
        }

        let body: AnnotateResponse = response.json().await?;
        let result = body
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| ClassifierError::InvalidResponse("empty response".to_string()))?;

        if let Some(error) = result.error {
            return Err(ClassifierError::InvalidResponse(error.message));
        }

        let annotation = result
            .safe_search_annotation
            .ok_or_else(|| ClassifierError::InvalidResponse("missing safe search annotation".to_string()))?;

        let verdict = verdict_from_annotation(&annotation);
        debug!(
            explicit = verdict.is_explicit,
            violent = verdict.is_violent,
            "Scored {}",
            frame.display()
        );
        Ok(verdict)
    }

    fn name(&self) -> &'static str {
        "categorical"
    }
}

fn verdict_from_annotation(annotation: &SafeSearch) -> FrameVerdict {
    let is_explicit = annotation.adult.is_likely() || annotation.racy.is_likely();
    let is_violent = annotation.violence.is_likely();

    let mut details = ScoreDetails::new();
    details.insert("adult".to_string(), annotation.adult.score());
    details.insert("violence".to_string(), annotation.violence.score());
    details.insert("racy".to_string(), annotation.racy.score());

    FrameVerdict {
        is_explicit,
        is_violent,
        confidence: if is_explicit || is_violent {
            FLAGGED_CONFIDENCE
        } else {
            CLEAN_CONFIDENCE
        },
        score_details: details,
    }
}
