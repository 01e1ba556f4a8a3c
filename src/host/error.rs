use std::error::Error;
use std::fmt;

use uuid::Uuid;

use crate::error::ConfigurationError;
use crate::subscriber::HandlerError;

/// Error returned from `SubscriberHost::dispatch`.
#[derive(Debug)]
pub enum DispatchError {
    /// Routing or host configuration is invalid. Fatal.
    Configuration(ConfigurationError),
    /// A `Stop`-policy subscriber failed.
    Handler {
        subscriber: String,
        event_id: Uuid,
        source: HandlerError,
    },
    /// The caller cancelled dispatch. Not a processing failure.
    Cancelled,
}

impl DispatchError {
    /// The subscriber failure behind a processing failure. `None` for
    /// configuration errors and cancellation, which are never poison-tracked.
    pub fn processing_failure(&self) -> Option<&HandlerError> {
        match self {
            DispatchError::Handler { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether this failure should be tracked as a poison candidate.
    pub fn is_processing_failure(&self) -> bool {
        self.processing_failure().is_some()
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Configuration(e) => write!(f, "configuration error: {}", e),
            DispatchError::Handler {
                subscriber,
                event_id,
                source,
            } => write!(
                f,
                "subscriber '{}' failed for event {}: {}",
                subscriber, event_id, source
            ),
            DispatchError::Cancelled => write!(f, "dispatch cancelled"),
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DispatchError::Configuration(e) => Some(e),
            DispatchError::Handler { source, .. } => Some(source),
            DispatchError::Cancelled => None,
        }
    }
}

impl From<ConfigurationError> for DispatchError {
    fn from(err: ConfigurationError) -> Self {
        DispatchError::Configuration(err)
    }
}
