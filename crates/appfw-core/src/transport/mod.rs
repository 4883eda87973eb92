//! Boundary between the correlation layer and the framework transport.
//!
//! A [`Transport`] issues requests to the framework and reports completions
//! and broadcasts by pushing [`Notification`] values into the
//! [`NotificationSink`] it receives in [`Transport::create_context`]. The
//! dispatcher consumes the other end of that channel and never sees how the
//! transport is implemented.
//!
//! Every request method is fire-and-forget: it returns as soon as the
//! request was handed off. An `Err` means the request never left, so no
//! completion will follow for it.

mod loopback;

pub use loopback::{LoopbackTransport, TransportCall};

use tokio::sync::mpsc;

use crate::debug::DebugPattern;
use crate::error::{AppFwError, Result};
use crate::notification::Notification;
use crate::registry::CorrelationId;
use crate::target::TargetSpec;

/// Which applications a list query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListScope {
    Running,
    All,
}

impl ListScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListScope::Running => "running",
            ListScope::All => "all",
        }
    }
}

impl std::fmt::Display for ListScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sending half of a context's inbound notification channel.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    /// Queue a notification for dispatch.
    ///
    /// Fails with `ContextReleased` once the receiving context is gone.
    pub fn deliver(&self, notification: Notification) -> Result<()> {
        self.tx
            .send(notification)
            .map_err(|_| AppFwError::ContextReleased)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Requests the correlation layer needs from the framework.
pub trait Transport: Send + Sync {
    /// Open the framework session. Notifications for it go to `sink`.
    fn create_context(&self, sink: NotificationSink) -> Result<()>;

    /// Close the framework session.
    fn destroy_context(&self) -> Result<()>;

    /// Replace the framework-side subscriptions. The outcome arrives as a
    /// [`Notification::SubscriptionStatus`].
    fn update_subscriptions(&self, events: &[String]) -> Result<()>;

    /// Send `event` with its JSON `payload` to the applications matching
    /// `target`. Completion arrives as [`Notification::SendCompleted`]
    /// carrying `id`.
    fn send_event(
        &self,
        event: &str,
        payload: &str,
        id: CorrelationId,
        target: &TargetSpec,
    ) -> Result<()>;

    /// Query applications. Completion arrives as
    /// [`Notification::ApplicationsListed`] carrying `id`.
    fn query_applications(&self, id: CorrelationId, scope: ListScope) -> Result<()>;

    /// Configure framework debug tracing.
    fn set_debug_filters(&self, patterns: &[DebugPattern]) -> Result<()>;

    /// Ask for SIGHUP and SIGTERM to be delivered as events.
    fn bridge_signals(&self) -> Result<()>;
}
