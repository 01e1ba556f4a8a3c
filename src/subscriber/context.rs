//! Execution context passed to every `receive` call.
//!
//! Carries the resolved run-as identity explicitly instead of through ambient
//! thread-local state.

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::HandlerError;

/// Who a subscriber runs as and what it is running for.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    username: Option<String>,
    user_id: Option<String>,
    tenant_id: Option<Uuid>,
    correlation_id: Option<String>,
    subscriber: String,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    pub(crate) fn new(
        username: Option<String>,
        user_id: Option<String>,
        tenant_id: Option<Uuid>,
        correlation_id: Option<String>,
        subscriber: String,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            username,
            user_id,
            tenant_id,
            correlation_id,
            subscriber,
            cancellation,
        }
    }

    /// Resolved identity. Empty when running as originating with no actor.
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    pub fn has_user(&self) -> bool {
        self.username.is_some()
    }

    /// Originating user id; `None` when running as system.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant_id
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Name of the subscriber being invoked.
    pub fn subscriber(&self) -> &str {
        &self.subscriber
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// `Err(HandlerError::Cancelled)` once the caller has cancelled.
    ///
    /// ```ignore
    /// for line in lines {
    ///     ctx.check_cancelled()?;
    ///     write(line)?;
    /// }
    /// ```
    pub fn check_cancelled(&self) -> Result<(), HandlerError> {
        if self.is_cancelled() {
            Err(HandlerError::Cancelled)
        } else {
            Ok(())
        }
    }
}
