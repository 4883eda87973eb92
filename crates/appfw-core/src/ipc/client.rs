//! TCP transport to the application framework daemon.
//!
//! Connects to the daemon once, then runs two background tasks on the
//! tokio runtime that was current during [`IpcTransport::connect`]:
//! - a writer that drains queued request frames onto the socket;
//! - a reader that decodes notification frames and forwards them to the
//!   sink of the currently open context.
//!
//! Request methods only queue a frame, so they never block and can be
//! called from any thread.
//!
//! Every context opened on the connection is a new session. Frames tagged
//! with an older session are dropped. Once the daemon hangs up, the open
//! context's channel is closed and later requests fail with
//! [`AppFwError::ConnectionLost`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::protocol::{read_frame, write_frame, IpcRequest, SessionNotification, WireTarget};
use crate::config::IpcConfig;
use crate::debug::DebugPattern;
use crate::registry::CorrelationId;
use crate::target::TargetSpec;
use crate::transport::{ListScope, NotificationSink, Transport};
use crate::{AppFwError, Result};

/// Context currently open on the connection.
struct ActiveSession {
    id: u64,
    sink: NotificationSink,
}

#[derive(Default)]
struct SessionState {
    active: Option<ActiveSession>,
    /// Set by the reader once the daemon side is gone.
    closed: bool,
}

#[derive(Clone, Default)]
struct SessionSlot(Arc<Mutex<SessionState>>);

impl SessionSlot {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.0.lock().expect("session lock poisoned")
    }

    /// Sink for `session`, if that session is still the open one.
    fn sink_for(&self, session: u64) -> Option<NotificationSink> {
        self.lock()
            .active
            .as_ref()
            .filter(|active| active.id == session)
            .map(|active| active.sink.clone())
    }

    /// Mark the connection closed and drop the open context's sink.
    fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.active = None;
    }
}

/// [`Transport`] speaking the framed JSON protocol over TCP.
pub struct IpcTransport {
    addr: SocketAddr,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    sessions: SessionSlot,
    next_session: AtomicU64,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl IpcTransport {
    /// Connect to the daemon at `addr`.
    ///
    /// Uses the configured connection timeout from `IpcConfig`.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = tokio::time::timeout(IpcConfig::IPC_CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| AppFwError::ConnectionLost { addr })?
            .map_err(|_| AppFwError::ConnectionLost { addr })?;

        debug!("IPC transport connected to {}", addr);

        let (reader, writer) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let sessions = SessionSlot::default();

        let writer_task = tokio::spawn(Self::write_loop(writer, outbound_rx, addr));
        let reader_task = tokio::spawn(Self::read_loop(reader, sessions.clone(), addr));

        Ok(Self {
            addr,
            outbound,
            sessions,
            next_session: AtomicU64::new(1),
            reader_task,
            writer_task,
        })
    }

    /// Address of the connected daemon.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn write_loop(
        mut writer: OwnedWriteHalf,
        mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
        addr: SocketAddr,
    ) {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = write_frame(&mut writer, &frame).await {
                warn!("IPC write to {} failed: {}", addr, e);
                break;
            }
        }
        debug!("IPC writer for {} finished", addr);
    }

    async fn read_loop(mut reader: OwnedReadHalf, sessions: SessionSlot, addr: SocketAddr) {
        loop {
            let frame = match read_frame(&mut reader).await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!("IPC connection to {} closed by daemon", addr);
                    break;
                }
                Err(e) => {
                    warn!("IPC read from {} failed: {}", addr, e);
                    break;
                }
            };

            let SessionNotification {
                session,
                notification,
            } = match serde_json::from_slice(&frame) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Ignoring malformed notification from {}: {}", addr, e);
                    continue;
                }
            };

            match sessions.sink_for(session) {
                Some(sink) => {
                    if sink.deliver(notification).is_err() {
                        debug!("Context for {} is gone, dropping notification", addr);
                    }
                }
                None => debug!(
                    "Dropping {} notification for inactive session {}",
                    notification.method(),
                    session
                ),
            }
        }

        // Dropping the sink closes the open context's channel
        sessions.close();
    }

    fn send(&self, request: IpcRequest) -> Result<()> {
        if self.sessions.lock().closed {
            return Err(AppFwError::ConnectionLost { addr: self.addr });
        }
        let method = request.method();
        let bytes = serde_json::to_vec(&request)?;
        self.outbound
            .send(bytes)
            .map_err(|_| AppFwError::ConnectionLost { addr: self.addr })?;
        debug!("Queued {} request for {}", method, self.addr);
        Ok(())
    }
}

impl Transport for IpcTransport {
    fn create_context(&self, sink: NotificationSink) -> Result<()> {
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self.sessions.lock();
            if state.closed {
                return Err(AppFwError::ConnectionLost { addr: self.addr });
            }
            state.active = Some(ActiveSession { id: session, sink });
        }
        debug!("Opening session {} on {}", session, self.addr);
        self.send(IpcRequest::CreateContext { session })
    }

    fn destroy_context(&self) -> Result<()> {
        let Some(active) = self.sessions.lock().active.take() else {
            // Connection already gone, or no context was opened
            debug!("No open session on {} to destroy", self.addr);
            return Ok(());
        };
        self.send(IpcRequest::DestroyContext { session: active.id })
    }

    fn update_subscriptions(&self, events: &[String]) -> Result<()> {
        self.send(IpcRequest::Subscribe {
            events: events.to_vec(),
        })
    }

    fn send_event(
        &self,
        event: &str,
        payload: &str,
        id: CorrelationId,
        target: &TargetSpec,
    ) -> Result<()> {
        let data: serde_json::Value = serde_json::from_str(payload)?;
        self.send(IpcRequest::SendEvent {
            event: event.to_string(),
            data,
            id,
            target: WireTarget::from_spec(target)?,
        })
    }

    fn query_applications(&self, id: CorrelationId, scope: ListScope) -> Result<()> {
        self.send(IpcRequest::ListApplications { id, scope })
    }

    fn set_debug_filters(&self, patterns: &[DebugPattern]) -> Result<()> {
        self.send(IpcRequest::SetDebug {
            patterns: patterns.to_vec(),
        })
    }

    fn bridge_signals(&self) -> Result<()> {
        self.send(IpcRequest::BridgeSignals)
    }
}

impl Drop for IpcTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

impl std::fmt::Debug for IpcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcTransport")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}
