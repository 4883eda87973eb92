//! Driving the inbound notification channel.
//!
//! The event loop pulls notifications pushed by the transport and hands them
//! to the [`Dispatcher`]. Only one loop can own a context's channel at a
//! time. Callbacks run on whichever thread runs the loop.

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::context::ContextHandle;
use crate::dispatch::Dispatcher;
use crate::error::{AppFwError, Result};
use crate::notification::Notification;

impl ContextHandle {
    /// Dispatcher bound to this context.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.clone())
    }

    /// Run the event loop until [`stop_loop`](Self::stop_loop) is called, the
    /// transport side of the channel closes, or a fatal dispatch error
    /// occurs. Fatal errors are returned.
    ///
    /// The channel closing is only a clean exit once the context has been
    /// released. Before that it means the transport lost its connection,
    /// and [`AppFwError::ChannelClosed`] is returned.
    ///
    /// A stop requested while no loop was running is discarded.
    ///
    /// Dropping the returned future before it completes gives the channel
    /// back to the context, so a later run sees every undelivered
    /// notification.
    pub async fn run_loop(&self) -> Result<()> {
        let mut inbound = InboundLease::take(self)?;
        let mut stop_rx = self.shared.stop_tx.subscribe();
        self.shared.stop_tx.send_replace(false);
        stop_rx.borrow_and_update();

        info!("Event loop started");
        let dispatcher = self.dispatcher();
        let result = loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow_and_update() {
                        break Ok(());
                    }
                }
                received = inbound.receiver().recv() => {
                    let Some(notification) = received else {
                        if self.lock().is_released() {
                            break Ok(());
                        }
                        error!("Transport closed the channel of an unreleased context");
                        break Err(AppFwError::ChannelClosed);
                    };
                    if let Err(e) = dispatcher.dispatch(notification) {
                        error!("Event loop stopped by dispatch failure: {}", e);
                        break Err(e);
                    }
                }
            }
        };

        drop(inbound);
        info!("Event loop stopped");
        result
    }

    /// Blocking variant of [`run_loop`](Self::run_loop) for threads outside
    /// an async runtime.
    pub fn run_loop_blocking(&self) -> Result<()> {
        futures::executor::block_on(self.run_loop())
    }

    /// Ask the running event loop to return.
    pub fn stop_loop(&self) {
        self.shared.stop_tx.send_replace(true);
    }

    /// Dispatch every notification already queued, without waiting for more.
    ///
    /// Returns the number of notifications dispatched.
    pub fn dispatch_pending(&self) -> Result<usize> {
        let mut inbound = InboundLease::take(self)?;
        let dispatcher = self.dispatcher();

        let mut dispatched = 0;
        loop {
            match inbound.receiver().try_recv() {
                Ok(notification) => {
                    dispatcher.dispatch(notification)?;
                    dispatched += 1;
                }
                Err(_) => return Ok(dispatched),
            }
        }
    }
}

/// Exclusive use of a context's inbound channel, returned on drop.
struct InboundLease<'a> {
    handle: &'a ContextHandle,
    inbound: Option<mpsc::UnboundedReceiver<Notification>>,
}

impl<'a> InboundLease<'a> {
    fn take(handle: &'a ContextHandle) -> Result<Self> {
        let inbound = handle
            .shared
            .inbound
            .lock()
            .expect("inbound lock poisoned")
            .take()
            .ok_or(AppFwError::LoopAlreadyRunning)?;
        Ok(Self {
            handle,
            inbound: Some(inbound),
        })
    }

    fn receiver(&mut self) -> &mut mpsc::UnboundedReceiver<Notification> {
        self.inbound
            .as_mut()
            .expect("inbound receiver is held until the lease drops")
    }
}

impl Drop for InboundLease<'_> {
    fn drop(&mut self) {
        if let Some(inbound) = self.inbound.take() {
            *self
                .handle
                .shared
                .inbound
                .lock()
                .expect("inbound lock poisoned") = Some(inbound);
        }
    }
}
