//! Centralized configuration for the application framework client.
//!
//! Constants for the IPC transport, status codes and debug presets.

use std::time::Duration;

/// IPC transport configuration.
pub struct IpcConfig;

impl IpcConfig {
    /// Largest frame accepted from or sent to the framework daemon.
    pub const MAX_IPC_MESSAGE_SIZE: usize = 1_048_576; // 1MB
    pub const IPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_ADDR: &'static str = "127.0.0.1:4337";
    /// Environment variable overriding the daemon address.
    pub const ADDR_ENV_VAR: &'static str = "APPFW_ADDR";
}

/// Status codes carried by completions and status broadcasts.
pub struct StatusConfig;

impl StatusConfig {
    pub const OK: i32 = 0;
}

/// Debug filter presets.
pub struct DebugConfig;

impl DebugConfig {
    pub const ALL: &'static str = "*";
    /// Tracing limited to notification dispatch.
    pub const LIMITED: &'static str = "@dispatch";
}
