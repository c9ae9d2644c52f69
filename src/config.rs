use std::path::PathBuf;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_CREDENTIAL_FILE: &str = ".gemini-api-key";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub image_model: String,
    pub port: u16,
    /// `None` keeps the API key in memory only (`CREDENTIAL_FILE=-`).
    pub credential_file: Option<PathBuf>,
    /// Written into the credential store at startup if the store is empty.
    pub seed_api_key: Option<String>,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            image_model: DEFAULT_IMAGE_MODEL.into(),
            port: 8080,
            credential_file: Some(PathBuf::from(DEFAULT_CREDENTIAL_FILE)),
            seed_api_key: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source; unset, blank or
    /// unparsable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Self {
            api_base: get("GEMINI_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            image_model: get("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            port: get("PORT").and_then(|v| v.parse().ok()).unwrap_or(defaults.port),
            credential_file: match get("CREDENTIAL_FILE").as_deref() {
                Some("-") => None,
                Some(path) => Some(PathBuf::from(path)),
                None => defaults.credential_file,
            },
            seed_api_key: get("GEMINI_API_KEY"),
            max_upload_bytes: get("MAX_UPLOAD_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
        }
    }
}
