use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::provider::ProviderError;

pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_INTERNAL_ERROR: u16 = 500;
pub const STATUS_BAD_GATEWAY: u16 = 502;

/// Error object returned by the completion endpoint with a non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A failed completion request, reduced to what a user should read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    pub status: u16,
    pub body: EndpointErrorBody,
}

impl EndpointFailure {
    pub fn new(status: u16, error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status,
            body: EndpointErrorBody {
                error: error.into(),
                details,
            },
        }
    }

    /// Parses an error payload in either the `{error, details}` or the
    /// OpenAI-style `{error: {message}}` shape.
    fn from_json(status: u16, payload: &str) -> Option<Self> {
        // Only the leading JSON value counts; trailing text is ignored.
        let value = serde_json::Deserializer::from_str(payload)
            .into_iter::<Value>()
            .next()?
            .ok()?;

        if let Ok(body) = serde_json::from_value::<EndpointErrorBody>(value.clone()) {
            return Some(Self { status, body });
        }

        let message = value.pointer("/error/message").and_then(Value::as_str)?;
        Some(Self::new(status, message, None))
    }

    /// Message shown to the user as the session's last error.
    pub fn user_message(&self) -> String {
        match &self.body.details {
            Some(details) if !details.trim().is_empty() => {
                format!("{}: {}", self.body.error, details)
            }
            _ => self.body.error.clone(),
        }
    }
}

impl From<&ProviderError> for EndpointFailure {
    fn from(error: &ProviderError) -> Self {
        match error {
            ProviderError::MissingApiKey { provider_id, .. } => Self::new(
                STATUS_INTERNAL_ERROR,
                "Missing API key",
                Some(format!(
                    "provider '{provider_id}' has no credential configured; set OPENAI_API_KEY"
                )),
            ),
            ProviderError::UnsupportedProvider { provider_id, .. } => Self::new(
                STATUS_INTERNAL_ERROR,
                "Unsupported provider",
                Some(format!("provider '{provider_id}' is not supported")),
            ),
            ProviderError::EmptyMessageSet { .. } => {
                Self::new(STATUS_BAD_REQUEST, "No messages to send", None)
            }
            ProviderError::HttpClient { source, .. } => Self::new(
                STATUS_BAD_GATEWAY,
                "Failed to reach the completion provider",
                Some(source.to_string()),
            ),
            ProviderError::CompletionsFailed { source, .. } => {
                let raw = source.to_string();
                // Provider errors embed the response body after a prefix; parse from the JSON on.
                raw.find('{')
                    .and_then(|start| Self::from_json(STATUS_BAD_GATEWAY, &raw[start..]))
                    .unwrap_or_else(|| Self::new(STATUS_BAD_GATEWAY, raw.clone(), None))
            }
        }
    }
}
