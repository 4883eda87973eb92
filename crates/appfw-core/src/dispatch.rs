//! Routing of inbound notifications to callbacks and handlers.
//!
//! Correlated completions resolve (and thereby remove) their registry entry
//! under the context lock; the stored callback is invoked after the lock is
//! dropped. Broadcasts go to the single registered handler of their kind, or
//! are discarded when none is set.

use tracing::debug;

use crate::application::Application;
use crate::context::ContextHandle;
use crate::error::Result;
use crate::notification::{EventBroadcast, ListResult, Notification, SendResult, StatusBroadcast};
use crate::registry::CorrelationId;

/// Consumer side of the transport boundary for one context.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    context: ContextHandle,
}

impl Dispatcher {
    pub fn new(context: ContextHandle) -> Self {
        Self { context }
    }

    /// Route one notification.
    ///
    /// Returns `UnknownCorrelation` when a completion carries an id that is
    /// not outstanding. Notifications arriving after the context was
    /// released are dropped. The released check and the registry lookup
    /// share one lock acquisition.
    pub fn dispatch(&self, notification: Notification) -> Result<()> {
        match notification {
            Notification::SendCompleted {
                id,
                event_id,
                status,
                message,
            } => self.on_send_completion(id, event_id, status, message),
            Notification::ApplicationsListed {
                id,
                request_id,
                status,
                message,
                applications,
            } => self.on_list_completion(id, request_id, status, message, applications),
            Notification::Event { name, payload } => {
                self.on_event_broadcast(name, payload);
                Ok(())
            }
            Notification::SubscriptionStatus {
                id,
                status,
                message,
                payload,
            } => {
                self.on_status_broadcast(id, status, message, payload);
                Ok(())
            }
        }
    }

    pub fn on_send_completion(
        &self,
        id: CorrelationId,
        event_id: i32,
        status: i32,
        message: String,
    ) -> Result<()> {
        let Some(pending) = self.context.lock().resolve_send(id)? else {
            debug!("Dropping event send completion {} for released context", id);
            return Ok(());
        };
        debug!("Event send {} completed with status {}", id, status);

        (pending.callback)(
            SendResult {
                event_id,
                status,
                message,
            },
            pending.user_data,
        );
        Ok(())
    }

    pub fn on_list_completion(
        &self,
        id: CorrelationId,
        request_id: i32,
        status: i32,
        message: String,
        applications: Vec<Application>,
    ) -> Result<()> {
        let Some(pending) = self.context.lock().resolve_list(id)? else {
            debug!("Dropping application list completion {} for released context", id);
            return Ok(());
        };
        debug!(
            "Application list {} completed with status {} ({} applications)",
            id,
            status,
            applications.len()
        );

        (pending.callback)(
            ListResult {
                request_id,
                status,
                message,
                applications,
            },
            pending.user_data,
        );
        Ok(())
    }

    pub fn on_event_broadcast(&self, name: String, payload: String) {
        let Some(registered) = self.context.lock().event_handler() else {
            debug!("No event handler set, discarding event {}", name);
            return;
        };

        let event = EventBroadcast { name, payload };
        (registered.handler)(&event, registered.user_data.as_ref());
    }

    pub fn on_status_broadcast(&self, id: i32, status: i32, message: String, payload: String) {
        let Some(registered) = self.context.lock().status_handler() else {
            debug!("No status handler set, discarding subscription status {}", id);
            return;
        };

        let update = StatusBroadcast {
            id,
            status,
            message,
            payload,
        };
        (registered.handler)(&update, registered.user_data.as_ref());
    }
}
