//! Client side of one hub connection.
//!
//! [`Connection::open`] connects and performs the handshake. The returned
//! [`LineReader`] is started separately so that the caller can publish the
//! connection before any inbound line is delivered.

use crate::client::workspace::WorkspaceEvent;
use crate::error::{ProtocolError, SessionError};
use crate::protocol::{self, ACCEPTED, MAX_LINE_BYTES, REJECTED};
use crossbeam::channel::Sender;
use std::io::{self, BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Write half of an accepted connection
pub struct Connection {
    writer: BufWriter<TcpStream>,
    peer: SocketAddr,
}

/// Read half of an accepted connection, not yet running
pub struct LineReader {
    reader: BufReader<TcpStream>,
}

impl Connection {
    /// Connect to `host:port` and join `room`
    ///
    /// Every resolved address is tried in turn with `connect_timeout`.
    pub fn open(
        host: &str,
        port: u16,
        room: &str,
        developer_key: Option<&str>,
        connect_timeout: Duration,
    ) -> Result<(Connection, LineReader), SessionError> {
        let stream = connect_any(host, port, connect_timeout)?;
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;

        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = BufWriter::new(stream);
        protocol::write_line(&mut writer, &protocol::handshake_line(developer_key, room))?;

        // Bound the wait for the answer; the reader blocks indefinitely later on
        writer.get_ref().set_read_timeout(Some(connect_timeout))?;
        let answer = protocol::read_line_bounded(&mut reader, MAX_LINE_BYTES)?
            .ok_or(SessionError::Disconnected)?;
        writer.get_ref().set_read_timeout(None)?;

        match answer.as_str() {
            ACCEPTED => {
                info!(peer = %peer, room = %room, "Connected");
                Ok((Connection { writer, peer }, LineReader { reader }))
            }
            REJECTED => {
                let _ = writer.get_ref().shutdown(Shutdown::Both);
                Err(SessionError::Rejected)
            }
            _ => {
                let _ = writer.get_ref().shutdown(Shutdown::Both);
                Err(ProtocolError::UnexpectedAnswer(answer).into())
            }
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Send one message line
    pub fn send(&mut self, line: &str) -> Result<(), SessionError> {
        protocol::write_line(&mut self.writer, line)?;
        Ok(())
    }

    /// Shut the socket down; the reader thread then reports the loss
    pub fn close(&self) {
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}

impl LineReader {
    /// Forward every inbound line as a [`WorkspaceEvent::IncomingLine`] until
    /// the connection ends, then report a [`WorkspaceEvent::Deactivate`]
    pub fn spawn(
        self,
        generation: u64,
        events: Sender<WorkspaceEvent>,
    ) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("roomsync-reader-{}", generation))
            .spawn(move || self.run(generation, events))
    }

    fn run(mut self, generation: u64, events: Sender<WorkspaceEvent>) {
        let reason = loop {
            match protocol::read_line_bounded(&mut self.reader, MAX_LINE_BYTES) {
                Ok(Some(line)) => {
                    if events
                        .send(WorkspaceEvent::IncomingLine { generation, line })
                        .is_err()
                    {
                        return;
                    }
                }
                Ok(None) => break "Connection closed by hub".to_string(),
                Err(e) => break e.to_string(),
            }
        };
        debug!(generation, reason = %reason, "Reader stopped");
        let _ = events.send(WorkspaceEvent::Deactivate {
            generation: Some(generation),
            reason,
        });
    }
}

fn connect_any(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, SessionError> {
    let mut last_error = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(addr = %addr, error = %e, "Connect attempt failed");
                last_error = Some(e);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{}:{} did not resolve to any address", host, port),
            )
        })
        .into())
}
