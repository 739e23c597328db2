use reqwest::StatusCode;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure taxonomy for store actions. Validation failures never reach
/// the gateway; gateway failures carry the remote status when one was
/// observed; everything else is funneled through `Unexpected`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        status: Option<StatusCode>,
    },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway {
            message: message.into(),
            status: None,
        }
    }

    /// Short label used as the key in the store's per-field error map.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Gateway { .. } => "gateway",
            Self::Unexpected(_) => "unexpected",
        }
    }
}

/// Error reported by the remote gateway boundary.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub message: String,
    pub status: Option<StatusCode>,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(value: reqwest::Error) -> Self {
        Self {
            status: value.status(),
            message: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(value: serde_json::Error) -> Self {
        Self::new(format!("failed to decode gateway response: {value}"))
    }
}

impl From<GatewayError> for StoreError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway {
            message: value.message,
            status: value.status,
        }
    }
}
