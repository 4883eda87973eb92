//! Wire protocol between the client and the framework daemon.
//!
//! Each message is a length-prefixed JSON document:
//!
//! ```text
//! [u32 BE: len][UTF-8 JSON bytes of len]
//! ```
//!
//! Requests flow client → daemon as [`IpcRequest`]; completions and
//! broadcasts flow daemon → client as [`SessionNotification`], a
//! [`Notification`] addressed to the session it belongs to. Requests and
//! notifications are tagged `{"method": ..., "params": {...}}`.
//!
//! Each context opened over a connection gets a new session number. Ids in
//! a session's correlation registries start again at 0, so the session
//! number is what keeps a late completion for a closed context away from
//! the next one.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::IpcConfig;
use crate::debug::DebugPattern;
use crate::notification::Notification;
use crate::registry::CorrelationId;
use crate::target::{resolve_user_id, TargetSpec};
use crate::transport::ListScope;
use crate::{AppFwError, Result};

/// Target selectors as the daemon expects them: user already resolved to a uid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<u32>,
}

impl WireTarget {
    /// Convert a [`TargetSpec`], looking up the uid of a named user.
    pub fn from_spec(spec: &TargetSpec) -> Result<Self> {
        let user = spec.user.as_deref().map(resolve_user_id).transpose()?;
        Ok(Self {
            label: spec.label.clone(),
            appid: spec.app_id.clone(),
            binary: spec.binary.clone(),
            user,
            process: spec.process,
        })
    }
}

/// Request sent to the framework daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum IpcRequest {
    CreateContext {
        session: u64,
    },
    DestroyContext {
        session: u64,
    },
    Subscribe {
        events: Vec<String>,
    },
    SendEvent {
        event: String,
        data: serde_json::Value,
        id: CorrelationId,
        target: WireTarget,
    },
    ListApplications {
        id: CorrelationId,
        scope: ListScope,
    },
    SetDebug {
        patterns: Vec<DebugPattern>,
    },
    BridgeSignals,
}

impl IpcRequest {
    pub fn method(&self) -> &'static str {
        match self {
            IpcRequest::CreateContext { .. } => "create_context",
            IpcRequest::DestroyContext { .. } => "destroy_context",
            IpcRequest::Subscribe { .. } => "subscribe",
            IpcRequest::SendEvent { .. } => "send_event",
            IpcRequest::ListApplications { .. } => "list_applications",
            IpcRequest::SetDebug { .. } => "set_debug",
            IpcRequest::BridgeSignals => "bridge_signals",
        }
    }
}

/// Notification frame sent by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionNotification {
    pub session: u64,
    pub notification: Notification,
}

/// Read a length-prefixed frame from an async reader.
///
/// Frame format: `[4-byte BE u32 length][payload bytes]`
///
/// Returns `None` on clean EOF (peer closed connection).
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;

    if len > IpcConfig::MAX_IPC_MESSAGE_SIZE {
        return Err(AppFwError::invalid_argument(
            "ipc_frame",
            format!(
                "IPC message size {} exceeds maximum {}",
                len,
                IpcConfig::MAX_IPC_MESSAGE_SIZE
            ),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(payload))
}

/// Write a length-prefixed frame to an async writer.
///
/// Frame format: `[4-byte BE u32 length][payload bytes]`
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > IpcConfig::MAX_IPC_MESSAGE_SIZE {
        return Err(AppFwError::invalid_argument(
            "ipc_frame",
            format!(
                "IPC message size {} exceeds maximum {}",
                payload.len(),
                IpcConfig::MAX_IPC_MESSAGE_SIZE
            ),
        ));
    }

    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_event_request_shape() {
        let req = IpcRequest::SendEvent {
            event: "ping".into(),
            data: serde_json::json!({}),
            id: CorrelationId::new(3),
            target: WireTarget {
                appid: Some("cam1".into()),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["method"], "send_event");
        assert_eq!(json["params"]["id"], 3);
        assert_eq!(json["params"]["target"], serde_json::json!({"appid": "cam1"}));
        assert_eq!(req.method(), "send_event");
    }

    #[test]
    fn test_unit_requests_have_no_params() {
        let json = serde_json::to_value(&IpcRequest::BridgeSignals).unwrap();
        assert_eq!(json, serde_json::json!({"method": "bridge_signals"}));
    }

    #[test]
    fn test_context_requests_carry_session() {
        let json = serde_json::to_value(&IpcRequest::CreateContext { session: 2 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"method": "create_context", "params": {"session": 2}})
        );
    }

    #[test]
    fn test_session_notification_shape() {
        let frame = SessionNotification {
            session: 1,
            notification: Notification::Event {
                name: "temp".into(),
                payload: "{}".into(),
            },
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["session"], 1);
        assert_eq!(json["notification"]["method"], "event");

        let back: SessionNotification = serde_json::from_value(json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_wire_target_keeps_process_and_label() {
        let spec = TargetSpec::new().with_label("User::App").with_process(99);
        let wire = WireTarget::from_spec(&spec).unwrap();
        assert_eq!(wire.label.as_deref(), Some("User::App"));
        assert_eq!(wire.process, Some(99));
        assert_eq!(wire.user, None);
    }

    #[test]
    fn test_wire_target_rejects_unknown_user() {
        let spec = TargetSpec::new().with_user("no-such-user-appfw-test");
        assert!(matches!(
            WireTarget::from_spec(&spec).unwrap_err(),
            AppFwError::UnknownUser { .. }
        ));
    }

    #[tokio::test]
    async fn test_frame_read_write_roundtrip() {
        let payload = b"hello world";
        let mut buf = Vec::new();

        write_frame(&mut buf, payload).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let read_back = read_frame(&mut cursor).await.unwrap();

        assert_eq!(read_back, Some(payload.to_vec()));
    }

    #[tokio::test]
    async fn test_frame_read_empty_stream_returns_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let result = read_frame(&mut cursor).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_frame_read_oversized_returns_error() {
        // Craft a frame header claiming a huge payload
        let huge_len: u32 = (IpcConfig::MAX_IPC_MESSAGE_SIZE + 1) as u32;
        let mut buf = Vec::new();
        buf.extend_from_slice(&huge_len.to_be_bytes());
        buf.extend_from_slice(&[0u8; 8]);

        let mut cursor = std::io::Cursor::new(buf);
        let result = read_frame(&mut cursor).await;
        assert!(result.is_err());
    }
}
