//! One accepted connection: handshake, reader loop and writer thread.
//!
//! The reader pushes every line onto the hub-wide intake queue. The writer
//! drains the session's bounded outbound queue. Either side, or the intake
//! worker, may close the session; closing is idempotent and unregisters the
//! session under the registry lock before the socket is shut down.

use crate::error::SessionError;
use crate::hub::registry::SessionRegistry;
use crate::hub::worker::Intake;
use crate::hub::HubShared;
use crate::protocol::{self, ACCEPTED, REJECTED};
use crate::types::{Role, SessionId};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Shared view of a live session
pub struct SessionHandle {
    id: SessionId,
    role: Role,
    outbound: Sender<String>,
    send_timeout: Duration,
    alive: AtomicBool,
    /// Last read or write, as milliseconds since UNIX epoch
    last_activity_ms: AtomicU64,
    stream: TcpStream,
    registry: Weak<SessionRegistry>,
}

impl SessionHandle {
    pub fn new(
        id: SessionId,
        role: Role,
        outbound: Sender<String>,
        send_timeout: Duration,
        stream: TcpStream,
        registry: Weak<SessionRegistry>,
    ) -> Self {
        Self {
            id,
            role,
            outbound,
            send_timeout,
            alive: AtomicBool::new(true),
            last_activity_ms: AtomicU64::new(now_ms()),
            stream,
            registry,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// `#3` or `#3 (Developer)`
    pub fn display_name(&self) -> String {
        match self.role {
            Role::Source => format!("#{} (Developer)", self.id),
            Role::Replica => format!("#{}", self.id),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn touch(&self) {
        self.last_activity_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(now_ms().saturating_sub(last))
    }

    /// Queue a line for the writer
    ///
    /// Waits at most the configured send timeout for queue space; a session
    /// that cannot keep up is closed.
    pub fn send(&self, line: String) -> Result<(), SessionError> {
        if !self.is_alive() {
            return Err(SessionError::Disconnected);
        }
        match self.outbound.send_timeout(line, self.send_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                self.close("Timeout");
                Err(SessionError::QueueTimeout)
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                self.close("Writer stopped");
                Err(SessionError::Disconnected)
            }
        }
    }

    /// Tear the session down (idempotent)
    pub fn close(&self, reason: &str) {
        if self
            .alive
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let remaining = self
            .registry
            .upgrade()
            .map(|registry| registry.remove(self.id))
            .unwrap_or_default();
        let _ = self.stream.shutdown(Shutdown::Both);
        info!(
            session = self.id,
            role = %self.role,
            reason,
            sessions = remaining,
            "Session closed: {}",
            self.display_name()
        );
    }
}

/// Run one accepted connection to completion on the calling thread
pub(crate) fn run_session(stream: TcpStream, id: SessionId, shared: Arc<HubShared>) {
    let config = &shared.config;
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let read_half = match stream.try_clone() {
        Ok(read_half) => read_half,
        Err(e) => {
            warn!(session = id, error = %e, "Failed to clone session stream");
            return;
        }
    };
    let mut reader = BufReader::new(read_half);

    let handshake = match protocol::read_line_bounded(&mut reader, config.max_line_bytes) {
        Ok(Some(line)) => line,
        Ok(None) => {
            debug!(session = id, peer = %peer, "Connection closed before handshake");
            return;
        }
        Err(e) => {
            warn!(session = id, peer = %peer, error = %e, "Handshake failed");
            return;
        }
    };

    let (role, room) = protocol::parse_handshake(&handshake, &config.developer_key);
    let accepted = match role {
        Role::Source => {
            *shared.room.write() = Some(room.clone());
            true
        }
        Role::Replica => shared.room.read().as_deref() == Some(room.as_str()),
    };

    let mut writer = BufWriter::new(stream);
    if !accepted {
        let _ = protocol::write_line(&mut writer, REJECTED);
        let _ = writer.get_ref().shutdown(Shutdown::Both);
        info!(session = id, peer = %peer, room = %room, "Denied connection: incorrect room");
        return;
    }
    if let Err(e) = protocol::write_line(&mut writer, ACCEPTED) {
        warn!(session = id, peer = %peer, error = %e, "Failed to accept session");
        return;
    }

    let stream = match writer.into_inner() {
        Ok(stream) => stream,
        Err(e) => {
            warn!(session = id, error = %e.error(), "Failed to flush handshake answer");
            return;
        }
    };
    let control = match stream.try_clone() {
        Ok(control) => control,
        Err(e) => {
            warn!(session = id, error = %e, "Failed to clone session stream");
            return;
        }
    };

    let (outbound_tx, outbound_rx) = channel::bounded(config.outbound_capacity);
    let handle = Arc::new(SessionHandle::new(
        id,
        role,
        outbound_tx,
        config.send_timeout(),
        control,
        Arc::downgrade(&shared.registry),
    ));
    let sessions = shared.registry.add(Arc::clone(&handle));
    info!(
        session = id,
        role = %role,
        room = %room,
        peer = %peer,
        sessions,
        "Accepted session {}",
        handle.display_name()
    );

    let writer_handle = Arc::clone(&handle);
    let idle_timeout = config.idle_timeout();
    let spawned = thread::Builder::new()
        .name(format!("roomsync-writer-{}", id))
        .spawn(move || write_lines(writer_handle, stream, outbound_rx, idle_timeout));
    if let Err(e) = spawned {
        warn!(session = id, error = %e, "Failed to spawn writer thread");
        handle.close("Error");
        return;
    }

    read_lines(&handle, &mut reader, config.max_line_bytes, &shared.intake);
}

fn read_lines(
    handle: &Arc<SessionHandle>,
    reader: &mut BufReader<TcpStream>,
    max_line_bytes: usize,
    intake: &Sender<Intake>,
) {
    loop {
        match protocol::read_line_bounded(reader, max_line_bytes) {
            Ok(Some(line)) => {
                handle.touch();
                let message = Intake {
                    session: Arc::clone(handle),
                    line,
                };
                if intake.send(message).is_err() {
                    handle.close("Hub stopped");
                    return;
                }
            }
            Ok(None) => {
                handle.close("Null line");
                return;
            }
            Err(e) => {
                if handle.is_alive() {
                    warn!(session = handle.id(), role = %handle.role(), error = %e, "Read failed");
                    handle.close(e.close_reason());
                }
                return;
            }
        }
    }
}

fn write_lines(
    handle: Arc<SessionHandle>,
    stream: TcpStream,
    outbound: Receiver<String>,
    idle_timeout: Duration,
) {
    let mut writer = BufWriter::new(stream);
    let tick = idle_timeout.min(Duration::from_secs(1));

    while handle.is_alive() {
        match outbound.recv_timeout(tick) {
            Ok(line) => {
                if let Err(e) = protocol::write_line(&mut writer, &line) {
                    if handle.is_alive() {
                        warn!(session = handle.id(), error = %e, "Write failed");
                        handle.close("Error");
                    }
                    return;
                }
                handle.touch();
            }
            Err(RecvTimeoutError::Timeout) => {
                if handle.idle_for() >= idle_timeout {
                    handle.close("Idle timeout");
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
