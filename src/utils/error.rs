use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        errors: Vec<String>,
    },

    #[error("{resource} '{id}' not found")]
    NotFound { resource: String, id: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Business rule violated: {message}")]
    BusinessRuleError { message: String },

    #[error("Provider '{provider}' failed: {message}")]
    ProviderError { provider: String, message: String },

    #[error("Upstream returned {status}: {body}")]
    UpstreamError { status: u16, body: String },

    #[error("No eligibility provider available")]
    NoProviderAvailable,

    #[error("Webhook signature rejected: {reason}")]
    SignatureError { reason: String },

    #[error("Circuit '{name}' is open")]
    CircuitOpen { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl HubError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            HubError::ValidationError { .. }
            | HubError::NotFound { .. }
            | HubError::BusinessRuleError { .. } => ErrorSeverity::Low,
            HubError::ApiError(_)
            | HubError::UpstreamError { .. }
            | HubError::ProviderError { .. }
            | HubError::CircuitOpen { .. } => ErrorSeverity::Medium,
            HubError::Forbidden { .. }
            | HubError::SignatureError { .. }
            | HubError::SerializationError(_) => ErrorSeverity::High,
            HubError::IoError(_)
            | HubError::ConfigError { .. }
            | HubError::ConfigValidationError { .. }
            | HubError::InvalidConfigValueError { .. }
            | HubError::MissingConfigError { .. }
            | HubError::NoProviderAvailable => ErrorSeverity::Critical,
        }
    }

    /// 給 CLI 使用者看的訊息，不含上游回應內容
    pub fn user_friendly_message(&self) -> String {
        match self {
            HubError::ApiError(_) => "An external service could not be reached".to_string(),
            HubError::UpstreamError { status, .. } => {
                format!("An external service returned status {}", status)
            }
            HubError::ConfigError { .. }
            | HubError::ConfigValidationError { .. }
            | HubError::InvalidConfigValueError { .. }
            | HubError::MissingConfigError { .. } => {
                format!("Configuration problem: {}", self)
            }
            HubError::NoProviderAvailable => {
                "No eligibility provider is configured".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.severity() {
            ErrorSeverity::Low => "Check the request payload and try again",
            ErrorSeverity::Medium => "Retry later; the upstream service may be degraded",
            ErrorSeverity::High => "Verify credentials and signing secrets",
            ErrorSeverity::Critical => "Fix the configuration file and restart",
        }
    }
}

impl From<toml::de::Error> for HubError {
    fn from(e: toml::de::Error) -> Self {
        HubError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(HubError::NoProviderAvailable.severity(), ErrorSeverity::Critical);
        assert_eq!(
            HubError::validation("bad payload").severity(),
            ErrorSeverity::Low
        );
        assert_eq!(
            HubError::provider("availity", "timeout").severity(),
            ErrorSeverity::Medium
        );
    }

    #[test]
    fn test_user_friendly_message_hides_upstream_body() {
        let err = HubError::UpstreamError {
            status: 500,
            body: "member 12345 not found".to_string(),
        };
        assert!(!err.user_friendly_message().contains("12345"));
    }
}
