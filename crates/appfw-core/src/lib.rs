//! AppFw Core - client library for an IoT application framework.
//!
//! Applications use this crate to send events to other applications, list
//! installed or running applications, and receive broadcast events they
//! subscribed to. Every request is asynchronous: it returns a
//! [`CorrelationId`] immediately and its completion later invokes the
//! callback registered for that id, exactly once, on the thread driving the
//! event loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use appfw_core::{ContextLifecycle, IpcTransport, TargetSpec};
//!
//! #[tokio::main]
//! async fn main() -> appfw_core::Result<()> {
//!     let transport = IpcTransport::connect("127.0.0.1:4337".parse().unwrap()).await?;
//!     let mut lifecycle = ContextLifecycle::new(Arc::new(transport));
//!     let handle = lifecycle.acquire()?;
//!
//!     let stopper = handle.clone();
//!     handle.lock().send_event(
//!         "ping",
//!         "{}",
//!         &TargetSpec::new().with_app_id("cam1"),
//!         move |result, _| {
//!             println!("event {} finished with status {}", result.event_id, result.status);
//!             stopper.stop_loop();
//!         },
//!         None,
//!     )?;
//!
//!     handle.run_loop().await?;
//!     lifecycle.release()?;
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod config;
pub mod context;
pub mod debug;
pub mod dispatch;
pub mod error;
pub mod ipc;
pub mod lifecycle;
pub mod notification;
pub mod registry;
pub mod subscription;
pub mod target;
pub mod transport;

mod event_loop;

// Re-export commonly used types
pub use application::Application;
pub use config::{DebugConfig, IpcConfig, StatusConfig};
pub use context::{Context, ContextHandle, DroppedCallbacks};
pub use debug::DebugPattern;
pub use dispatch::Dispatcher;
pub use error::{AppFwError, AsyncFailure, Result};
pub use ipc::IpcTransport;
pub use lifecycle::ContextLifecycle;
pub use notification::{
    EventBroadcast, EventHandler, ListCallback, ListResult, Notification, SendCallback,
    SendResult, StatusBroadcast, StatusHandler, UserData,
};
pub use registry::{CallbackKind, CallbackRegistry, CorrelationId, PendingCallback};
pub use subscription::SubscriptionSet;
pub use target::TargetSpec;
pub use transport::{ListScope, LoopbackTransport, NotificationSink, Transport, TransportCall};
