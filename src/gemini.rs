use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::SourceImage;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(String),
    /// Non-success status; the bracketed code is what credential
    /// classification keys on.
    #[error("Gemini API error [{status}]: {message}")]
    Api { status: u16, message: String },
    #[error("No image was generated.")]
    NoImage,
    #[error("{0}")]
    Other(String),
}

/// Sends one (image, prompt) pair to an image-generation backend and returns
/// the produced image as a data URI.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(
        &self,
        credential: &str,
        image: &SourceImage,
        prompt: &str,
    ) -> Result<String, GeminiError>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn preview(data: &str) -> String {
    if data.len() > 50 {
        format!("{}...[{} chars total]", &data[..50], data.len())
    } else {
        data.to_string()
    }
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.api_base.clone(),
            model: config.image_model.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

pub(crate) fn build_request_body(image: &SourceImage, prompt: &str) -> serde_json::Value {
    let encoded = base64::engine::general_purpose::STANDARD.encode(&image.data);
    json!({
        "contents": [{
            "parts": [
                {"inlineData": {"mimeType": image.mime_type, "data": encoded}},
                {"text": prompt}
            ]
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE"]
        }
    })
}

/// Pulls the human-readable message out of a Google API error envelope,
/// falling back to the raw body.
fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: ErrorBody,
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(env) => env.error.message,
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl ImageBackend for GeminiClient {
    async fn generate(
        &self,
        credential: &str,
        image: &SourceImage,
        prompt: &str,
    ) -> Result<String, GeminiError> {
        let url = self.endpoint();
        info!("🔗 Making request to: {}", url);

        let request_body = build_request_body(image, prompt);
        let mut logged_body = request_body.clone();
        truncate_base64_in_json(&mut logged_body);
        info!("📤 Request body: {}", serde_json::to_string(&logged_body).unwrap_or_default());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await.map_err(|e| GeminiError::Http(e.to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GeminiError::Api { status: status.as_u16(), message: api_error_message(&response_text) });
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Other(format!("parse error: {}", e)))?;

        match extract_first_image(&parsed) {
            Some(data_uri) => {
                info!("🖼️ Extracted image from API response: {}", preview(&data_uri));
                Ok(data_uri)
            }
            None => {
                warn!("⚠️ No image data found in API response");
                Err(GeminiError::NoImage)
            }
        }
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        #[allow(dead_code)]
        text: String,
    },
    Other(#[allow(dead_code)] serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

/// The first part of the first candidate, when it is an inline image, as a
/// data URI. Anything else counts as no image.
fn extract_first_image(resp: &GeminiResponse) -> Option<String> {
    let first_part = resp.candidates.first()?.content.parts.first()?;
    match first_part {
        Part::Inline { inline_data } => {
            info!("🎯 Found image data with mime type: {}", inline_data.mime_type);
            Some(format!("data:{};base64,{}", inline_data.mime_type, inline_data.data))
        }
        _ => {
            info!("⚠️ First response part is not inline image data");
            None
        }
    }
}
