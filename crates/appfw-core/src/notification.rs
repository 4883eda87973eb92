//! Inbound notifications and the callback types they are delivered to.
//!
//! Transports emit [`Notification`] values onto the context's inbound
//! channel. Two of them are correlated completions (event send, application
//! list) and resolve a registry entry; the other two are broadcasts that go
//! to the single registered event or status handler.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

use crate::application::Application;
use crate::config::StatusConfig;
use crate::error::AsyncFailure;
use crate::registry::CorrelationId;

/// Opaque caller data handed back on callback invocation.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Completion callback for [`Context::send_event`](crate::Context::send_event).
pub type SendCallback = Box<dyn FnOnce(SendResult, Option<UserData>) + Send>;

/// Completion callback for application list queries.
pub type ListCallback = Box<dyn FnOnce(ListResult, Option<UserData>) + Send>;

/// Handler for subscribed events.
pub type EventHandler = Arc<dyn Fn(&EventBroadcast, Option<&UserData>) + Send + Sync>;

/// Handler for subscription update outcomes.
pub type StatusHandler = Arc<dyn Fn(&StatusBroadcast, Option<&UserData>) + Send + Sync>;

/// Outcome of an event send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    /// Framework-assigned event id.
    pub event_id: i32,
    /// 0 on success, non-zero on failure.
    pub status: i32,
    /// Error message when `status` is non-zero.
    pub message: String,
}

impl SendResult {
    pub fn is_success(&self) -> bool {
        self.status == StatusConfig::OK
    }

    /// Turn a non-zero status into an [`AsyncFailure`].
    pub fn check(&self) -> Result<i32, AsyncFailure> {
        check_status(self.status, &self.message).map(|_| self.event_id)
    }
}

/// Outcome of an application list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResult {
    /// Framework-assigned request id.
    pub request_id: i32,
    pub status: i32,
    pub message: String,
    /// Applications in the order the framework reported them. Empty is a
    /// valid successful result.
    pub applications: Vec<Application>,
}

impl ListResult {
    pub fn is_success(&self) -> bool {
        self.status == StatusConfig::OK
    }

    pub fn check(&self) -> Result<&[Application], AsyncFailure> {
        check_status(self.status, &self.message).map(|_| self.applications.as_slice())
    }
}

/// A subscribed event delivered by the framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBroadcast {
    pub name: String,
    /// JSON payload as sent by the emitter.
    pub payload: String,
}

/// Outcome of a subscription update.
///
/// Not correlated with the `set_event_subscriptions` call that caused it;
/// every outcome goes to the single status handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBroadcast {
    /// Framework sequence number of the subscription request.
    pub id: i32,
    pub status: i32,
    pub message: String,
    /// Optional request-specific JSON status data.
    pub payload: String,
}

impl StatusBroadcast {
    pub fn is_success(&self) -> bool {
        self.status == StatusConfig::OK
    }
}

fn check_status(status: i32, message: &str) -> Result<(), AsyncFailure> {
    if status == StatusConfig::OK {
        Ok(())
    } else {
        Err(AsyncFailure {
            status,
            message: message.to_string(),
        })
    }
}

/// Message emitted by a transport towards the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum Notification {
    SendCompleted {
        id: CorrelationId,
        event_id: i32,
        status: i32,
        #[serde(default)]
        message: String,
    },
    ApplicationsListed {
        id: CorrelationId,
        request_id: i32,
        status: i32,
        #[serde(default)]
        message: String,
        #[serde(default)]
        applications: Vec<Application>,
    },
    Event {
        name: String,
        #[serde(default = "empty_json_object")]
        payload: String,
    },
    SubscriptionStatus {
        id: i32,
        status: i32,
        #[serde(default)]
        message: String,
        #[serde(default = "empty_json_object")]
        payload: String,
    },
}

fn empty_json_object() -> String {
    "{}".to_string()
}

impl Notification {
    /// Short name used in logs.
    pub fn method(&self) -> &'static str {
        match self {
            Notification::SendCompleted { .. } => "send_completed",
            Notification::ApplicationsListed { .. } => "applications_listed",
            Notification::Event { .. } => "event",
            Notification::SubscriptionStatus { .. } => "subscription_status",
        }
    }
}
