use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredsError {
    #[error("Profile '{0}' not found in AWS config")]
    ProfileNotFound(String),

    #[error("Profile '{profile}' is misconfigured: {reason}")]
    ProfileMisconfigured { profile: String, reason: String },

    #[error("No valid SSO access token for {0}")]
    TokenUnavailable(String),

    #[error("AWS rejected the credentials during {step}: {message}")]
    CredentialRejected { step: String, message: String },

    #[error("AWS call {step} failed: {message}")]
    ServiceUnavailable { step: String, message: String },

    #[error("SSO login failed: {0}")]
    LoginFailed(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CredsError {
    pub(crate) fn misconfigured(profile: &str, reason: impl Into<String>) -> Self {
        CredsError::ProfileMisconfigured {
            profile: profile.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CredsError>;

/// Outcome of a failed call across the AWS boundary, classified so callers can
/// tell a rejected credential apart from an unreachable service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// STS refused the credentials (expired or unknown token/key).
    #[error("credentials rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    /// SSO refused the access token.
    #[error("SSO access token unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Promote to a fatal error for the named step.
    pub fn into_creds_error(self, step: &str) -> CredsError {
        match self {
            ServiceError::Rejected { .. } | ServiceError::Unauthorized(_) => {
                CredsError::CredentialRejected {
                    step: step.to_string(),
                    message: self.to_string(),
                }
            }
            ServiceError::Unavailable(message) => CredsError::ServiceUnavailable {
                step: step.to_string(),
                message,
            },
        }
    }
}
