use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
/// Failure taxonomy shared by every adapter and by the registry.
pub enum TrackerError {
    #[error("bug not found")]
    NotFound,
    #[error("bug is private: {public_url}")]
    Private { public_url: String },
    #[error("could not parse data returned by {description}: {cause} ({url})")]
    Protocol {
        description: String,
        cause: String,
        url: String,
    },
    #[error("no bugtracker named '{0}'")]
    UnknownTracker(String),
    #[error("bugtrackers of kind '{0}' are not understood")]
    UnknownTrackerKind(String),
}

impl TrackerError {
    pub fn protocol(
        description: impl Into<String>,
        cause: impl std::fmt::Display,
        url: impl Into<String>,
    ) -> Self {
        Self::Protocol {
            description: description.into(),
            cause: cause.to_string(),
            url: url.into(),
        }
    }

    /// True for errors the dispatcher renders as a short user message.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Protocol { .. })
    }

    /// True for errors a caller may retry on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::TrackerError;

    #[test]
    fn unit_protocol_error_message_carries_description_cause_and_url() {
        let error = TrackerError::protocol(
            "KDE",
            "missing short_desc",
            "https://bugs.kde.org/xml.cgi?id=5",
        );
        let message = error.to_string();
        assert!(message.contains("KDE"));
        assert!(message.contains("missing short_desc"));
        assert!(message.contains("https://bugs.kde.org/xml.cgi?id=5"));
        assert!(error.is_retryable());
        assert!(!error.is_user_facing());
    }

    #[test]
    fn unit_lookup_errors_are_user_facing() {
        assert!(TrackerError::NotFound.is_user_facing());
        assert!(TrackerError::UnknownTracker("x".to_string()).is_user_facing());
        assert!(!TrackerError::UnknownTrackerKind("x".to_string()).is_retryable());
    }
}
