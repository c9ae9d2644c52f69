use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub data: Bytes,
    pub mime_type: String,
}

impl SourceImage {
    pub fn new(data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self { data: data.into(), mime_type: mime_type.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColorChoice {
    pub name: &'static str,
    pub value: &'static str,
    pub hex: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApparelType {
    #[serde(rename = "T-shirt", alias = "t-shirt", alias = "tshirt")]
    TShirt,
    #[serde(rename = "Hoodie", alias = "hoodie")]
    Hoodie,
    #[serde(rename = "Sweater", alias = "sweater")]
    Sweater,
}

impl ApparelType {
    pub const ALL: [ApparelType; 3] = [ApparelType::TShirt, ApparelType::Hoodie, ApparelType::Sweater];

    pub fn label(self) -> &'static str {
        match self {
            ApparelType::TShirt => "T-shirt",
            ApparelType::Hoodie => "Hoodie",
            ApparelType::Sweater => "Sweater",
        }
    }
}

impl fmt::Display for ApparelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One unit of work for the generation backend.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub source_image: SourceImage,
    pub prompt: String,
    pub output_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// `data:<mime>;base64,<payload>` URI.
    pub src: String,
    pub name: String,
}

// --- HTTP payloads ---

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct ImageUpload {
    #[serde_as(as = "Base64")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VariationRequest {
    pub image: ImageUpload,
    #[serde(default)]
    pub colors: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MockupRequest {
    pub image: ImageUpload,
    #[serde(default)]
    pub apparel_types: Vec<ApparelType>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchResponse {
    pub batch_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub images: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialUpdate {
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub present: bool,
}
