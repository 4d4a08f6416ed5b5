use thiserror::Error;

// Failures the relay can hit while serving one booking operation
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("No credential for equipment type: {equipment}")]
    UnknownEquipment {
        equipment: String,
        valid_types: Vec<String>,
    },

    #[error("Server configuration error: API key not configured")]
    NotConfigured,

    // Upstream answered, but not with a 2xx
    #[error("Cal.com API responded with status {status}")]
    Upstream {
        status: u16,
        body: Option<serde_json::Value>,
    },

    // No response at all: timeout, refused connection, broken transport
    #[error("Cal.com API unreachable: {0}")]
    Unreachable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_builder() {
            RelayError::Internal(err.to_string())
        } else {
            RelayError::Unreachable(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Webhook body is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Webhook body must be a JSON object")]
    NotAnObject,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),

    #[error("server error: {0}")]
    Serve(String),
}
