use std::fmt;

/// Deployment or configuration mistake. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Dispatch attempted on a host with no subscribers registered.
    NoSubscribers,
    /// More than one subscriber matched the same envelope.
    AmbiguousSubscribers {
        subject: String,
        action: String,
        subscribers: Vec<String>,
    },
    /// More than one envelope passed without `allow_multiple_messages`.
    MultipleMessagesNotAllowed { count: usize },
    /// A policy value is outside its valid range.
    InvalidPolicy(String),
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::NoSubscribers => {
                write!(f, "no subscribers registered with the subscriber host")
            }
            ConfigurationError::AmbiguousSubscribers {
                subject,
                action,
                subscribers,
            } => write!(
                f,
                "subject '{}' action '{}' matched more than one subscriber: {}",
                subject,
                action,
                subscribers.join(", ")
            ),
            ConfigurationError::MultipleMessagesNotAllowed { count } => write!(
                f,
                "{} envelopes passed to dispatch but multiple messages are not allowed",
                count
            ),
            ConfigurationError::InvalidPolicy(msg) => write!(f, "invalid policy: {}", msg),
        }
    }
}

impl std::error::Error for ConfigurationError {}
