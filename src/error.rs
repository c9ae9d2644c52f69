use thiserror::Error;

/// Failure of a whole generation batch. Only one failure is ever surfaced;
/// when several requests fail concurrently, whichever rejects first wins.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("Please select at least one color to generate.")]
    EmptySelection,
    #[error("API key not found. Please set your API key.")]
    MissingCredential,
    #[error("{0}")]
    CredentialInvalid(String),
    #[error("{0}")]
    Generation(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Backend messages that indicate a rejected API key. A bare `[400]` is
/// what the Gemini API returns for malformed or invalid keys.
pub fn is_credential_error(message: &str) -> bool {
    message.to_lowercase().contains("api key") || message.contains("[400]")
}

impl BatchError {
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_credential_error(&message) {
            BatchError::CredentialInvalid(message)
        } else {
            BatchError::Generation(message)
        }
    }

    /// True when the caller should ask the user for a (new) API key.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, BatchError::MissingCredential | BatchError::CredentialInvalid(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BatchError::EmptySelection => "empty_selection",
            BatchError::MissingCredential => "missing_credential",
            BatchError::CredentialInvalid(_) => "credential_invalid",
            BatchError::Generation(_) => "generation_failed",
            BatchError::Internal(_) => "internal",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            BatchError::MissingCredential => "An API key is required. Please enter your API key.".to_string(),
            BatchError::CredentialInvalid(_) => "API key error. Please check your key and enter it again.".to_string(),
            BatchError::Generation(message) | BatchError::Internal(message) => {
                format!("An error occurred while generating images: {message}")
            }
            BatchError::EmptySelection => self.to_string(),
        }
    }
}
