//! IPC transport to a framework daemon.
//!
//! Uses length-prefixed JSON over a TCP connection, usually to `127.0.0.1`.
//!
//! # Architecture
//!
//! - **Client**: [`IpcTransport`] implements [`Transport`](crate::Transport)
//!   by queueing request frames and forwarding notification frames
//! - **Protocol**: framing and request types shared with daemon
//!   implementations

pub mod client;
pub mod protocol;

pub use client::IpcTransport;
pub use protocol::{read_frame, write_frame, IpcRequest, SessionNotification, WireTarget};
