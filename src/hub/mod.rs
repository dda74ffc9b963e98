//! Session hub
//!
//! Accepts connections, gates them into the room, and funnels every inbound
//! line through one intake worker that owns the canonical tree.
//!
//! Threads: one acceptor, one reader and one writer per session, and a single
//! intake worker. Nothing but the worker touches tree state; the only lock is
//! the session registry's.

pub mod registry;
pub mod session;
pub mod worker;

pub use registry::SessionRegistry;
pub use session::SessionHandle;

use crate::config::HubConfig;
use crossbeam::channel::{self, Sender};
use parking_lot::RwLock;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};
use worker::{Intake, IntakeWorker};

/// State shared by the acceptor and every session thread
pub(crate) struct HubShared {
    pub(crate) config: HubConfig,
    /// Room accepted for replicas; set by the configuration or by a source
    pub(crate) room: RwLock<Option<String>>,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) intake: Sender<Intake>,
    next_id: AtomicU64,
}

/// A bound hub, ready to accept connections
pub struct Hub {
    listener: TcpListener,
    shared: Arc<HubShared>,
}

impl Hub {
    /// Bind the listening socket and start the intake worker
    ///
    /// Failing to bind is fatal for the process.
    pub fn bind(config: HubConfig) -> io::Result<Hub> {
        let listener = TcpListener::bind((config.bind.as_str(), config.port))?;
        let registry = Arc::new(SessionRegistry::new());
        let (intake_tx, intake_rx) = channel::bounded(config.intake_capacity);

        let worker = IntakeWorker::new(Arc::clone(&registry), config.user_code_limits());
        thread::Builder::new()
            .name("roomsync-intake".to_string())
            .spawn(move || worker.run(intake_rx))?;

        let shared = Arc::new(HubShared {
            room: RwLock::new(config.default_room.clone()),
            config,
            registry,
            intake: intake_tx,
            next_id: AtomicU64::new(1),
        });
        Ok(Hub { listener, shared })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Room currently accepted for replicas
    pub fn room(&self) -> Option<String> {
        self.shared.room.read().clone()
    }

    /// Accept connections forever on the calling thread
    pub fn serve(self) -> io::Result<()> {
        let addr = self.local_addr()?;
        info!(
            addr = %addr,
            room = self.room().as_deref().unwrap_or("<unset>"),
            "Hub listening"
        );

        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "Connection failed");
                    continue;
                }
            };
            let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("roomsync-session-{}", id))
                .spawn(move || session::run_session(stream, id, shared));
            if let Err(e) = spawned {
                warn!(session = id, error = %e, "Failed to spawn session thread");
            }
        }
        Ok(())
    }

    /// Run [`Hub::serve`] on a background thread
    pub fn spawn(self) -> io::Result<JoinHandle<io::Result<()>>> {
        thread::Builder::new()
            .name("roomsync-accept".to_string())
            .spawn(move || self.serve())
    }
}
