use std::error::Error;
use std::fmt;

use crate::error::ConfigurationError;
use crate::host::DispatchError;
use crate::poison::PoisonError;

/// Error returned from `ResilientConsumer::process`.
#[derive(Debug)]
pub enum ConsumerError {
    /// Dispatch failed without being a processing failure (configuration or
    /// cancellation). Nothing was marked poisoned.
    Dispatch(DispatchError),
    /// The poison store could not be read or written.
    Poison(PoisonError),
    /// Processing failed and the position was marked poisoned.
    Poisoned {
        retries: u32,
        suspected: bool,
        source: DispatchError,
    },
}

impl ConsumerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConsumerError::Dispatch(DispatchError::Cancelled))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ConsumerError::Dispatch(DispatchError::Configuration(_)))
    }
}

impl fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerError::Dispatch(e) => write!(f, "{}", e),
            ConsumerError::Poison(e) => write!(f, "{}", e),
            ConsumerError::Poisoned {
                retries,
                suspected,
                source,
            } => {
                let label = if *suspected {
                    "suspected poison message"
                } else {
                    "processing failed"
                };
                write!(f, "{} (retries {}): {}", label, retries, source)
            }
        }
    }
}

impl Error for ConsumerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConsumerError::Dispatch(e) => Some(e),
            ConsumerError::Poison(e) => Some(e),
            ConsumerError::Poisoned { source, .. } => Some(source),
        }
    }
}

impl From<DispatchError> for ConsumerError {
    fn from(err: DispatchError) -> Self {
        ConsumerError::Dispatch(err)
    }
}

impl From<PoisonError> for ConsumerError {
    fn from(err: PoisonError) -> Self {
        ConsumerError::Poison(err)
    }
}

impl From<ConfigurationError> for ConsumerError {
    fn from(err: ConfigurationError) -> Self {
        ConsumerError::Dispatch(DispatchError::Configuration(err))
    }
}

/// Error type for partition source operations.
#[derive(Debug)]
pub enum SourceError {
    /// The stream could not be reached.
    ConnectionFailed(String),
    /// Checkpoint could not be written.
    CheckpointFailed(String),
    /// Other error.
    Other(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::ConnectionFailed(msg) => write!(f, "connection failed: {}", msg),
            SourceError::CheckpointFailed(msg) => write!(f, "checkpoint failed: {}", msg),
            SourceError::Other(e) => write!(f, "partition source error: {}", e),
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SourceError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
