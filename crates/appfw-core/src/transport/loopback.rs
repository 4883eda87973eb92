//! In-process transport that records requests instead of sending them.
//!
//! Completions and broadcasts are injected with [`LoopbackTransport::emit`]
//! and friends, which makes it suitable for tests and demos that have no
//! framework daemon available.

use std::sync::Mutex;

use super::{ListScope, NotificationSink, Transport};
use crate::application::Application;
use crate::debug::DebugPattern;
use crate::error::{AppFwError, Result};
use crate::notification::Notification;
use crate::registry::CorrelationId;
use crate::target::TargetSpec;

/// A request recorded by [`LoopbackTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    CreateContext,
    DestroyContext,
    UpdateSubscriptions(Vec<String>),
    SendEvent {
        event: String,
        payload: String,
        id: CorrelationId,
        target: TargetSpec,
    },
    QueryApplications {
        id: CorrelationId,
        scope: ListScope,
    },
    SetDebugFilters(Vec<DebugPattern>),
    BridgeSignals,
}

#[derive(Default)]
struct LoopbackState {
    sink: Option<NotificationSink>,
    calls: Vec<TransportCall>,
    fail_next: Option<String>,
}

/// Recording transport with manual notification injection.
#[derive(Default)]
pub struct LoopbackTransport {
    state: Mutex<LoopbackState>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LoopbackState> {
        self.state.lock().expect("loopback transport lock poisoned")
    }

    /// Record `call`, or fail it if a failure was armed.
    fn record(&self, call: TransportCall) -> Result<()> {
        let mut state = self.state();
        if let Some(message) = state.fail_next.take() {
            return Err(AppFwError::transport(message));
        }
        state.calls.push(call);
        Ok(())
    }

    /// Make the next request fail synchronously with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state().fail_next = Some(message.into());
    }

    /// All recorded requests, oldest first.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.state().calls.clone()
    }

    pub fn last_call(&self) -> Option<TransportCall> {
        self.state().calls.last().cloned()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Whether a context is currently open.
    pub fn has_context(&self) -> bool {
        self.state().sink.is_some()
    }

    /// Drop the open context's sink without destroying the context, the way
    /// a transport does when its connection goes away.
    pub fn disconnect(&self) {
        self.state().sink = None;
    }

    /// Deliver a notification to the open context.
    pub fn emit(&self, notification: Notification) -> Result<()> {
        let sink = self
            .state()
            .sink
            .clone()
            .ok_or(AppFwError::ContextReleased)?;
        sink.deliver(notification)
    }

    pub fn complete_send(
        &self,
        id: CorrelationId,
        event_id: i32,
        status: i32,
        message: impl Into<String>,
    ) -> Result<()> {
        self.emit(Notification::SendCompleted {
            id,
            event_id,
            status,
            message: message.into(),
        })
    }

    pub fn complete_list(
        &self,
        id: CorrelationId,
        request_id: i32,
        status: i32,
        message: impl Into<String>,
        applications: Vec<Application>,
    ) -> Result<()> {
        self.emit(Notification::ApplicationsListed {
            id,
            request_id,
            status,
            message: message.into(),
            applications,
        })
    }

    pub fn broadcast_event(&self, name: impl Into<String>, payload: impl Into<String>) -> Result<()> {
        self.emit(Notification::Event {
            name: name.into(),
            payload: payload.into(),
        })
    }

    pub fn broadcast_status(
        &self,
        id: i32,
        status: i32,
        message: impl Into<String>,
        payload: impl Into<String>,
    ) -> Result<()> {
        self.emit(Notification::SubscriptionStatus {
            id,
            status,
            message: message.into(),
            payload: payload.into(),
        })
    }
}

impl Transport for LoopbackTransport {
    fn create_context(&self, sink: NotificationSink) -> Result<()> {
        self.record(TransportCall::CreateContext)?;
        self.state().sink = Some(sink);
        Ok(())
    }

    fn destroy_context(&self) -> Result<()> {
        self.state().sink = None;
        self.record(TransportCall::DestroyContext)
    }

    fn update_subscriptions(&self, events: &[String]) -> Result<()> {
        self.record(TransportCall::UpdateSubscriptions(events.to_vec()))
    }

    fn send_event(
        &self,
        event: &str,
        payload: &str,
        id: CorrelationId,
        target: &TargetSpec,
    ) -> Result<()> {
        self.record(TransportCall::SendEvent {
            event: event.to_string(),
            payload: payload.to_string(),
            id,
            target: target.clone(),
        })
    }

    fn query_applications(&self, id: CorrelationId, scope: ListScope) -> Result<()> {
        self.record(TransportCall::QueryApplications { id, scope })
    }

    fn set_debug_filters(&self, patterns: &[DebugPattern]) -> Result<()> {
        self.record(TransportCall::SetDebugFilters(patterns.to_vec()))
    }

    fn bridge_signals(&self) -> Result<()> {
        self.record(TransportCall::BridgeSignals)
    }
}
