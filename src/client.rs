//! Session client
//!
//! Drives one workspace through `Disconnected → Connecting → Active`. All
//! state changes happen on the thread running [`Client::run`]; connecting,
//! reading from the hub and operator requests arrive as
//! [`WorkspaceEvent`]s on one channel.

pub mod board;
pub mod connection;
pub mod workspace;
pub mod writeback;

pub use board::UserCodeBoard;
pub use workspace::{WorkspaceEvent, WorkspaceSync};

use crate::config::ClientConfig;
use crate::error::{SessionError, WorkspaceError};
use connection::Connection;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Upper bound on one wait while a connection attempt is in flight
const CONNECTING_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Active,
}

/// Operator controls for a running [`Client`]
#[derive(Clone)]
pub struct ClientHandle {
    events: Sender<WorkspaceEvent>,
}

impl ClientHandle {
    /// Reconnect now and start over with a fresh scan
    pub fn resync(&self) -> bool {
        self.events.send(WorkspaceEvent::Resync).is_ok()
    }

    /// Disconnect and make [`Client::run`] return
    pub fn stop(&self) -> bool {
        self.events
            .send(WorkspaceEvent::Deactivate {
                generation: None,
                reason: "Stopped".to_string(),
            })
            .is_ok()
    }
}

pub struct Client {
    config: ClientConfig,
    workspace: WorkspaceSync,
    state: ClientState,
    /// Bumped on every connection attempt; events of older attempts are dropped
    generation: u64,
    connection: Option<Connection>,
    events_tx: Sender<WorkspaceEvent>,
    events_rx: Receiver<WorkspaceEvent>,
    retry_at: Instant,
    next_scan: Instant,
    /// Pending reconnect after writes to the workspace failed
    resync_at: Option<Instant>,
}

impl Client {
    /// Bind the workspace; nothing is connected until [`Client::run`]
    pub fn new(config: ClientConfig) -> Result<Self, WorkspaceError> {
        let workspace = WorkspaceSync::open(&config)?;
        let (events_tx, events_rx) = channel::unbounded();
        let now = Instant::now();
        Ok(Self {
            config,
            workspace,
            state: ClientState::Disconnected,
            generation: 0,
            connection: None,
            events_tx,
            events_rx,
            retry_at: now,
            next_scan: now,
            resync_at: None,
        })
    }

    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            events: self.events_tx.clone(),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn workspace(&self) -> &WorkspaceSync {
        &self.workspace
    }

    /// Run until [`ClientHandle::stop`] is called
    pub fn run(&mut self) {
        self.connect();
        loop {
            let timeout = self.next_deadline().saturating_duration_since(Instant::now());
            match self.events_rx.recv_timeout(timeout) {
                Ok(WorkspaceEvent::Deactivate {
                    generation: None,
                    reason,
                }) => {
                    self.disconnect(&reason);
                    info!(reason = %reason, "Client stopped");
                    return;
                }
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
            self.on_tick();
        }
    }

    fn next_deadline(&self) -> Instant {
        match self.state {
            ClientState::Active => match self.resync_at {
                Some(at) => at.min(self.next_scan),
                None => self.next_scan,
            },
            ClientState::Disconnected => self.retry_at,
            ClientState::Connecting => Instant::now() + CONNECTING_TICK,
        }
    }

    fn on_tick(&mut self) {
        let now = Instant::now();
        match self.state {
            ClientState::Active if matches!(self.resync_at, Some(at) if now >= at) => {
                info!("Resyncing to retry failed writes");
                self.disconnect("Resync after failed writes");
                self.connect();
            }
            ClientState::Active if now >= self.next_scan => {
                self.next_scan = now + self.config.scan_interval();
                match self.workspace.poll_changes() {
                    Ok(Some(line)) => self.send_or_fail(&line),
                    Ok(None) => {}
                    Err(e) => self.fail(e),
                }
            }
            ClientState::Disconnected if now >= self.retry_at => self.connect(),
            _ => {}
        }
    }

    fn handle_event(&mut self, event: WorkspaceEvent) {
        match event {
            WorkspaceEvent::Activate {
                generation,
                connection,
            } => {
                if generation != self.generation || self.state != ClientState::Connecting {
                    debug!(generation, "Dropping stale connection");
                    connection.close();
                    return;
                }
                self.activate(connection);
            }
            WorkspaceEvent::Deactivate {
                generation: Some(generation),
                reason,
            } => {
                if generation != self.generation || self.state == ClientState::Disconnected {
                    debug!(generation, reason = %reason, "Ignoring stale deactivation");
                    return;
                }
                self.lose_connection(&reason);
            }
            WorkspaceEvent::Deactivate {
                generation: None,
                reason,
            } => self.disconnect(&reason),
            WorkspaceEvent::Resync => {
                info!("Resync requested");
                self.disconnect("Resync");
                self.connect();
            }
            WorkspaceEvent::IncomingLine { generation, line } => {
                if generation != self.generation || self.state != ClientState::Active {
                    debug!(generation, "Ignoring line from an old connection");
                    return;
                }
                match self.workspace.handle_line(&line) {
                    Ok(replies) => {
                        for reply in replies {
                            self.send_or_fail(&reply);
                            if self.state != ClientState::Active {
                                return;
                            }
                        }
                        self.schedule_resync();
                    }
                    Err(e) => self.fail(e),
                }
            }
        }
    }

    /// Reconnect after the cool-down if the last changeset left paths unwritten
    fn schedule_resync(&mut self) {
        if !self.workspace.take_resync_request() || self.resync_at.is_some() {
            return;
        }
        self.resync_at = Some(Instant::now() + self.config.reconnect_delay());
        info!(
            resync_in_ms = self.config.reconnect_delay_ms,
            "Workspace is behind the hub, resync scheduled"
        );
    }

    /// Start a connection attempt on a background thread
    fn connect(&mut self) {
        self.generation += 1;
        self.state = ClientState::Connecting;
        let generation = self.generation;
        let events = self.events_tx.clone();
        let config = self.config.clone();

        info!(
            generation,
            host = %config.host,
            port = config.port,
            room = %config.room,
            "Connecting"
        );
        let spawned = thread::Builder::new()
            .name(format!("roomsync-connect-{}", generation))
            .spawn(move || connect_and_publish(config, generation, events));
        if let Err(e) = spawned {
            self.lose_connection(&format!("Failed to spawn connect thread: {}", e));
        }
    }

    fn activate(&mut self, mut connection: Connection) {
        let peer = connection.peer();
        let initial = match self.workspace.initial_message() {
            Ok(line) => line,
            Err(e) => {
                connection.close();
                self.fail(e);
                return;
            }
        };
        if let Err(e) = connection.send(&initial) {
            connection.close();
            self.fail(e);
            return;
        }
        self.connection = Some(connection);
        self.state = ClientState::Active;
        self.next_scan = Instant::now() + self.config.scan_interval();
        info!(
            peer = %peer,
            role = %self.workspace.role(),
            generation = self.generation,
            "Session active"
        );
    }

    fn send_or_fail(&mut self, line: &str) {
        let result = match self.connection.as_mut() {
            Some(connection) => connection.send(line),
            None => Err(SessionError::Disconnected),
        };
        if let Err(e) = result {
            self.fail(e);
        }
    }

    fn fail(&mut self, error: SessionError) {
        let reason = error.close_reason();
        let chain = format!("{:#}", anyhow::Error::new(error));
        warn!(reason, error = %chain, "Session failed");
        self.lose_connection(&chain);
    }

    /// Drop the connection and schedule a reconnect after the cool-down
    fn lose_connection(&mut self, reason: &str) {
        self.disconnect(reason);
        self.retry_at = Instant::now() + self.config.reconnect_delay();
        warn!(
            reason = %reason,
            retry_in_ms = self.config.reconnect_delay_ms,
            "Disconnected from hub, retrying later"
        );
    }

    fn disconnect(&mut self, reason: &str) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            debug!(reason = %reason, "Connection closed");
        }
        self.workspace.reset();
        self.resync_at = None;
        self.state = ClientState::Disconnected;
    }
}

fn connect_and_publish(config: ClientConfig, generation: u64, events: Sender<WorkspaceEvent>) {
    let opened = Connection::open(
        &config.host,
        config.port,
        &config.room,
        config.developer_key.as_deref(),
        config.connect_timeout(),
    );
    match opened {
        Ok((connection, reader)) => {
            if events
                .send(WorkspaceEvent::Activate {
                    generation,
                    connection,
                })
                .is_err()
            {
                return;
            }
            if let Err(e) = reader.spawn(generation, events.clone()) {
                let _ = events.send(WorkspaceEvent::Deactivate {
                    generation: Some(generation),
                    reason: format!("Failed to spawn reader thread: {}", e),
                });
            }
        }
        Err(e) => {
            let reason = format!("{:#}", anyhow::Error::new(e));
            let _ = events.send(WorkspaceEvent::Deactivate {
                generation: Some(generation),
                reason,
            });
        }
    }
}
