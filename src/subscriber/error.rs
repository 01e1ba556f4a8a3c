use std::error::Error;
use std::fmt;

use crate::envelope::DecodeError;

/// Error returned from `Subscriber::receive`.
#[derive(Debug)]
pub enum HandlerError {
    /// Business logic rejected the event.
    Rejected(String),
    /// The payload could not be materialised.
    Decode(DecodeError),
    /// The handler observed cancellation and stopped. Not a processing failure.
    Cancelled,
    /// Any other failure.
    Other(Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        HandlerError::Other(err.into())
    }

    /// Short classification, used as the poison record status.
    pub fn status(&self) -> &'static str {
        match self {
            HandlerError::Rejected(_) => "Rejected",
            HandlerError::Decode(_) => "DecodeError",
            HandlerError::Cancelled => "Cancelled",
            HandlerError::Other(_) => "HandlerError",
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Rejected(msg) => write!(f, "rejected: {}", msg),
            HandlerError::Decode(e) => write!(f, "{}", e),
            HandlerError::Cancelled => write!(f, "handler cancelled"),
            HandlerError::Other(e) => write!(f, "handler error: {}", e),
        }
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HandlerError::Decode(e) => Some(e),
            HandlerError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<DecodeError> for HandlerError {
    fn from(err: DecodeError) -> Self {
        HandlerError::Decode(err)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Decode(DecodeError::from(err))
    }
}
