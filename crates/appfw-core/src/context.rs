//! The application framework context and its shared handle.
//!
//! [`Context`] owns everything a framework session needs on the client side:
//! one callback registry per correlated operation kind, the current
//! subscription set, and the single event and status handlers. Its methods
//! take `&mut self`, so every mutation is exclusive.
//!
//! [`ContextHandle`] is the clonable, thread-safe way to reach a context. All
//! operations go through [`ContextHandle::lock`], which is the one critical
//! section for the whole context. Callbacks are always invoked after that
//! lock has been released, so they may lock the context again.
//!
//! # Example
//!
//! ```rust,ignore
//! let handle = lifecycle.acquire()?;
//! handle.lock().send_event(
//!     "ping",
//!     "{}",
//!     &TargetSpec::new().with_app_id("cam1"),
//!     |result, _| println!("sent: {:?}", result),
//!     None,
//! )?;
//! handle.run_loop().await?;
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::error::{AppFwError, Result};
use crate::notification::{
    EventBroadcast, EventHandler, ListCallback, ListResult, Notification, SendCallback,
    SendResult, StatusBroadcast, StatusHandler, UserData,
};
use crate::registry::{CallbackKind, CallbackRegistry, CorrelationId, PendingCallback};
use crate::subscription::SubscriptionSet;
use crate::target::TargetSpec;
use crate::transport::{ListScope, Transport};

/// A broadcast handler together with its user data.
pub(crate) struct RegisteredHandler<H> {
    pub(crate) handler: H,
    pub(crate) user_data: Option<UserData>,
}

impl<H: Clone> Clone for RegisteredHandler<H> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            user_data: self.user_data.clone(),
        }
    }
}

/// Counts of callbacks dropped when a context is released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroppedCallbacks {
    pub sends: usize,
    pub lists: usize,
}

/// Client-side state of one framework session.
pub struct Context {
    transport: Arc<dyn Transport>,
    send_callbacks: CallbackRegistry<SendCallback>,
    list_callbacks: CallbackRegistry<ListCallback>,
    subscriptions: SubscriptionSet,
    event_handler: Option<RegisteredHandler<EventHandler>>,
    status_handler: Option<RegisteredHandler<StatusHandler>>,
    released: bool,
}

impl Context {
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            send_callbacks: CallbackRegistry::new(CallbackKind::Send),
            list_callbacks: CallbackRegistry::new(CallbackKind::List),
            subscriptions: SubscriptionSet::new(),
            event_handler: None,
            status_handler: None,
            released: false,
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.released {
            Err(AppFwError::ContextReleased)
        } else {
            Ok(())
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Set the handler for subscribed events, replacing any previous one.
    pub fn set_event_handler<F>(&mut self, handler: F, user_data: Option<UserData>)
    where
        F: Fn(&EventBroadcast, Option<&UserData>) + Send + Sync + 'static,
    {
        self.event_handler = Some(RegisteredHandler {
            handler: Arc::new(handler),
            user_data,
        });
    }

    pub fn clear_event_handler(&mut self) {
        self.event_handler = None;
    }

    pub fn has_event_handler(&self) -> bool {
        self.event_handler.is_some()
    }

    /// Set the handler for subscription update outcomes, replacing any previous one.
    pub fn set_status_handler<F>(&mut self, handler: F, user_data: Option<UserData>)
    where
        F: Fn(&StatusBroadcast, Option<&UserData>) + Send + Sync + 'static,
    {
        self.status_handler = Some(RegisteredHandler {
            handler: Arc::new(handler),
            user_data,
        });
    }

    pub fn clear_status_handler(&mut self) {
        self.status_handler = None;
    }

    pub fn has_status_handler(&self) -> bool {
        self.status_handler.is_some()
    }

    /// Send an event to the applications matching `target`.
    ///
    /// `payload` must be a JSON object (`{}` when there is no data). Input is
    /// validated before an id is allocated. The callback runs once, when the
    /// framework reports the send as finished.
    pub fn send_event<F>(
        &mut self,
        event: &str,
        payload: &str,
        target: &TargetSpec,
        callback: F,
        user_data: Option<UserData>,
    ) -> Result<CorrelationId>
    where
        F: FnOnce(SendResult, Option<UserData>) + Send + 'static,
    {
        self.ensure_active()?;
        validate_event_name(event)?;
        validate_payload(payload)?;
        target.ensure_usable()?;

        let id = self.send_callbacks.allocate();
        self.send_callbacks.register(id, Box::new(callback), user_data)?;

        if let Err(e) = self.transport.send_event(event, payload, id, target) {
            self.send_callbacks.discard(id);
            return Err(e);
        }

        debug!("Issued event send {} for event {}", id, event);
        Ok(id)
    }

    /// Query the framework for running applications.
    pub fn list_running_applications<F>(
        &mut self,
        callback: F,
        user_data: Option<UserData>,
    ) -> Result<CorrelationId>
    where
        F: FnOnce(ListResult, Option<UserData>) + Send + 'static,
    {
        self.query_applications(ListScope::Running, Box::new(callback), user_data)
    }

    /// Query the framework for all installed applications.
    pub fn list_all_applications<F>(
        &mut self,
        callback: F,
        user_data: Option<UserData>,
    ) -> Result<CorrelationId>
    where
        F: FnOnce(ListResult, Option<UserData>) + Send + 'static,
    {
        self.query_applications(ListScope::All, Box::new(callback), user_data)
    }

    fn query_applications(
        &mut self,
        scope: ListScope,
        callback: ListCallback,
        user_data: Option<UserData>,
    ) -> Result<CorrelationId> {
        self.ensure_active()?;

        let id = self.list_callbacks.allocate();
        self.list_callbacks.register(id, callback, user_data)?;

        if let Err(e) = self.transport.query_applications(id, scope) {
            self.list_callbacks.discard(id);
            return Err(e);
        }

        debug!("Issued {} application list {}", scope, id);
        Ok(id)
    }

    /// Replace the subscribed events and push them to the framework.
    ///
    /// Returns once the update is issued; the outcome arrives later through
    /// the status handler.
    pub fn set_event_subscriptions<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_active()?;
        self.subscriptions = SubscriptionSet::from_names(names)?;
        self.push_subscriptions()
    }

    /// The last subscription set accepted by this context.
    pub fn event_subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    /// Edit the subscription set in place without notifying the framework.
    ///
    /// Call [`update_event_subscriptions`](Self::update_event_subscriptions)
    /// to push the edits.
    pub fn event_subscriptions_mut(&mut self) -> &mut SubscriptionSet {
        &mut self.subscriptions
    }

    /// Push the current subscription set to the framework.
    pub fn update_event_subscriptions(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.subscriptions.validate()?;
        self.push_subscriptions()
    }

    fn push_subscriptions(&self) -> Result<()> {
        let events = self.subscriptions.to_vec();
        self.transport.update_subscriptions(&events)?;
        debug!("Issued subscription update for {} events", events.len());
        Ok(())
    }

    /// Ask the framework to deliver SIGHUP and SIGTERM as events.
    pub fn bridge_signals(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.transport.bridge_signals()
    }

    /// Outstanding event send callbacks.
    pub fn send_callbacks(&self) -> &CallbackRegistry<SendCallback> {
        &self.send_callbacks
    }

    /// Outstanding application list callbacks.
    pub fn list_callbacks(&self) -> &CallbackRegistry<ListCallback> {
        &self.list_callbacks
    }

    /// Take the callback for a send completion.
    ///
    /// `None` once the context is released: the registry was drained then,
    /// so a late completion is expected and not a broken contract.
    pub(crate) fn resolve_send(
        &mut self,
        id: CorrelationId,
    ) -> Result<Option<PendingCallback<SendCallback>>> {
        if self.released {
            return Ok(None);
        }
        self.send_callbacks.resolve(id).map(Some)
    }

    pub(crate) fn resolve_list(
        &mut self,
        id: CorrelationId,
    ) -> Result<Option<PendingCallback<ListCallback>>> {
        if self.released {
            return Ok(None);
        }
        self.list_callbacks.resolve(id).map(Some)
    }

    pub(crate) fn event_handler(&self) -> Option<RegisteredHandler<EventHandler>> {
        self.event_handler.clone()
    }

    pub(crate) fn status_handler(&self) -> Option<RegisteredHandler<StatusHandler>> {
        self.status_handler.clone()
    }

    /// Mark the context released and drop everything still pending.
    ///
    /// Dropped callbacks are never invoked.
    pub(crate) fn shut_down(&mut self) -> DroppedCallbacks {
        self.released = true;
        self.event_handler = None;
        self.status_handler = None;

        let dropped = DroppedCallbacks {
            sends: self.send_callbacks.drain().len(),
            lists: self.list_callbacks.drain().len(),
        };
        if dropped.sends > 0 || dropped.lists > 0 {
            warn!(
                "Releasing context with {} event send and {} application list callbacks outstanding; they will not be invoked",
                dropped.sends, dropped.lists
            );
        }
        dropped
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("send_callbacks", &self.send_callbacks)
            .field("list_callbacks", &self.list_callbacks)
            .field("subscriptions", &self.subscriptions)
            .field("has_event_handler", &self.event_handler.is_some())
            .field("has_status_handler", &self.status_handler.is_some())
            .field("released", &self.released)
            .finish()
    }
}

fn validate_event_name(event: &str) -> Result<()> {
    if event.trim().is_empty() {
        return Err(AppFwError::invalid_argument(
            "event",
            "Event name cannot be empty",
        ));
    }
    Ok(())
}

fn validate_payload(payload: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(payload).map_err(|e| {
        AppFwError::invalid_argument("payload", format!("Event data is not valid JSON: {}", e))
    })?;
    if !value.is_object() {
        return Err(AppFwError::invalid_argument(
            "payload",
            "Event data must be a JSON object",
        ));
    }
    Ok(())
}

pub(crate) struct Shared {
    pub(crate) context: Mutex<Context>,
    pub(crate) inbound: Mutex<Option<mpsc::UnboundedReceiver<Notification>>>,
    pub(crate) stop_tx: watch::Sender<bool>,
}

/// Clonable, thread-safe handle to a [`Context`].
#[derive(Clone)]
pub struct ContextHandle {
    pub(crate) shared: Arc<Shared>,
}

impl ContextHandle {
    pub(crate) fn new(
        context: Context,
        inbound: mpsc::UnboundedReceiver<Notification>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                context: Mutex::new(context),
                inbound: Mutex::new(Some(inbound)),
                stop_tx,
            }),
        }
    }

    /// Enter the context's critical section.
    ///
    /// Do not hold the guard across a blocking wait for a callback; the
    /// callback cannot be dispatched while the guard is held.
    pub fn lock(&self) -> MutexGuard<'_, Context> {
        self.shared.context.lock().expect("context lock poisoned")
    }

    /// Whether two handles refer to the same context.
    pub fn same_context(&self, other: &ContextHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle").finish_non_exhaustive()
    }
}
