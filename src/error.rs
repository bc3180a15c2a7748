use thiserror::Error;

#[derive(Debug, Error)]
pub enum PplxError {
    #[error("PPLX_API_KEY not found in environment")]
    MissingApiKey,

    #[error("Invalid model choice '{0}'. Enter 1, 2, 3 or a supported model name.")]
    InvalidModel(String),

    #[error("Invalid chat request: {0}")]
    InvalidRequest(String),

    #[error("Failed to read model selection: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error marshaling request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Transport(String),

    #[error("Error parsing response: {reason} (body: {body})")]
    Decode { reason: String, body: String },

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API Error: {0}")]
    Upstream(String),
}

impl PplxError {
    /// Configuration errors are detected before any network activity.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::MissingApiKey | Self::InvalidModel(_) | Self::InvalidRequest(_) | Self::Io(_)
        )
    }
}
