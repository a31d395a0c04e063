use reqwest::StatusCode;

/// Failure of a call to the collaborator service.
///
/// The variants follow how the caller is expected to react: transport
/// failures are retryable and generic, domain errors carry the server's
/// message verbatim, and authorization failures end the session.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {detail}")]
    Transport { detail: String },

    #[error("{message}")]
    Domain { status: u16, message: String },

    #[error("session expired: {message}")]
    Unauthorized { message: String },

    #[error("login required")]
    MissingSession,
}

impl ApiError {
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::Transport {
            detail: detail.into(),
        }
    }

    pub fn domain(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Domain {
            status: status.as_u16(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::domain(StatusCode::FORBIDDEN, message)
    }

    /// True when the session must be dropped and the user sent back to login.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::MissingSession)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Domain { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            Self::Transport { .. } | Self::MissingSession => None,
        }
    }

    /// Text shown inline next to the form that triggered the call.
    pub fn user_message(&self) -> String {
        match self {
            Self::Domain { message, .. } => message.clone(),
            Self::Transport { .. } => "Request failed".to_owned(),
            Self::Unauthorized { .. } => {
                "Your session has expired. Please log in again.".to_owned()
            }
            Self::MissingSession => "Please log in to continue.".to_owned(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::transport(format!("timed out: {err}"));
        }
        Self::transport(err.to_string())
    }
}
