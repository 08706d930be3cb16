//! Probabilistic backend: independent [0, 1] scores per label (Sightengine API).

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use vguard_models::{FrameVerdict, ScoreDetails};

use crate::backend::ContentBackend;
use crate::error::{ClassifierError, ClassifierResult};

/// Models requested for every frame.
const MODELS: &str = "nudity-2.0,offensive,weapon";

/// Score above which a label counts as detected.
const DETECTION_THRESHOLD: f64 = 0.5;

/// Nudity sub-scores that do not indicate nudity.
const NON_NUDITY_KEYS: &[&str] = &["none", "safe", "context", "suggestive_classes"];

pub struct ProbabilisticBackend {
    http: Client,
    endpoint: String,
    api_user: String,
    api_secret: String,
}

impl ProbabilisticBackend {
    pub fn new(
        endpoint: impl Into<String>,
        api_user: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> ClassifierResult<Self> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_user: api_user.into(),
            api_secret: api_secret.into(),
        })
    }
}

#[async_trait]
impl ContentBackend for ProbabilisticBackend {
    async fn classify(&self, frame: &Path) -> ClassifierResult<FrameVerdict> {
        let bytes = tokio::fs::read(frame).await?;

        let media = Part::bytes(bytes)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .text("models", MODELS)
            .text("api_user", self.api_user.clone())
            .text("api_secret", self.api_secret.clone())
            .part("media", media);

        let response = self.http.post(&self.endpoint).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::RequestFailed(format!(
                "backend returned {}: {}",
                status, body
            )));
        }

        let body: Value = response.json().await?;
        if body.get("status").and_then(Value::as_str) != Some("success") {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(ClassifierError::InvalidResponse(message.to_string()));
        }

        let verdict = verdict_from_response(&body);
        debug!(
            explicit = verdict.is_explicit,
            violent = verdict.is_violent,
            confidence = verdict.confidence,
            "Scored {}",
            frame.display()
        );
        Ok(verdict)
    }

    fn name(&self) -> &'static str {
        "probabilistic"
    }
}

/// Build a frame verdict from a successful response body.
fn verdict_from_response(body: &Value) -> FrameVerdict {
    let mut details = ScoreDetails::new();

    let mut nudity: f64 = 0.0;
    if let Some(scores) = body.get("nudity").and_then(Value::as_object) {
        for (key, value) in scores {
            if NON_NUDITY_KEYS.contains(&key.as_str()) {
                continue;
            }
            if let Some(score) = value.as_f64() {
                details.insert(format!("nudity.{}", key), score);
                nudity = nudity.max(score);
            }
        }
    }

    let offensive = body
        .pointer("/offensive/prob")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    // Older responses carry a bare number, newer ones a map of weapon classes
    let weapon = match body.get("weapon") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::Object(obj)) => obj
            .get("classes")
            .and_then(Value::as_object)
            .map(|classes| classes.values().filter_map(Value::as_f64).fold(0.0, f64::max))
            .unwrap_or(0.0),
        _ => 0.0,
    };

    details.insert("nudity".to_string(), nudity);
    details.insert("offensive".to_string(), offensive);
    details.insert("weapon".to_string(), weapon);

    verdict_from_scores(nudity, offensive, weapon, details)
}

fn verdict_from_scores(nudity: f64, offensive: f64, weapon: f64, details: ScoreDetails) -> FrameVerdict {
    FrameVerdict {
        is_explicit: nudity > DETECTION_THRESHOLD || offensive > DETECTION_THRESHOLD,
        is_violent: weapon > DETECTION_THRESHOLD,
        confidence: nudity.max(offensive).max(weapon),
        score_details: details,
    }
}
