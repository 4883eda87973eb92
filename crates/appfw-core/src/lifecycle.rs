//! Ownership of the one live framework context.
//!
//! A [`ContextLifecycle`] creates its context lazily on the first
//! [`acquire`](ContextLifecycle::acquire) and tears it down on
//! [`release`](ContextLifecycle::release) or drop. There is no process-wide
//! instance: the caller owns the lifecycle and hands clones of the
//! [`ContextHandle`] to whoever needs it.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::context::{Context, ContextHandle, DroppedCallbacks};
use crate::debug::DebugPattern;
use crate::error::Result;
use crate::transport::{NotificationSink, Transport};

/// Creates, hands out and releases the framework context.
pub struct ContextLifecycle {
    transport: Arc<dyn Transport>,
    current: Option<ContextHandle>,
}

impl ContextLifecycle {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            current: None,
        }
    }

    /// Return the live context, creating it first if needed.
    pub fn acquire(&mut self) -> Result<ContextHandle> {
        if let Some(handle) = &self.current {
            return Ok(handle.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.transport.create_context(NotificationSink::new(tx))?;

        let handle = ContextHandle::new(Context::new(self.transport.clone()), rx);
        info!("Application framework context created");

        self.current = Some(handle.clone());
        Ok(handle)
    }

    /// Tear down the live context, if any.
    ///
    /// Outstanding callbacks are dropped without being invoked, a running
    /// event loop is asked to stop, and clones of the handle start failing
    /// with `ContextReleased`. Calling this without a live context does
    /// nothing.
    pub fn release(&mut self) -> Result<Option<DroppedCallbacks>> {
        let Some(handle) = self.current.take() else {
            return Ok(None);
        };

        let dropped = handle.lock().shut_down();
        handle.stop_loop();
        self.transport.destroy_context()?;

        info!("Application framework context released");
        Ok(Some(dropped))
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&ContextHandle> {
        self.current.as_ref()
    }

    /// Enable framework debug tracing for the given patterns.
    ///
    /// Every pattern is validated before anything is sent. Does not require
    /// a live context.
    pub fn enable_debug<I, S>(&self, patterns: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = DebugPattern::parse_all(patterns)?;
        self.transport.set_debug_filters(&patterns)?;
        info!(
            "Framework debugging enabled for {}",
            patterns
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }
}

impl Drop for ContextLifecycle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release application framework context: {}", e);
        }
    }
}
