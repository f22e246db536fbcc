// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Connection worker: one connection attempt and its read loop.

use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::framing::{LineFramer, LINE_BUFFER_SIZE};
use super::transport::{BoxedStream, Connector, DeviceAddress};

/// Size of a single socket read.
pub const READ_CHUNK_SIZE: usize = 1024;

/// State of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, connect not requested yet.
    None,
    /// Connecting to the remote device.
    ConnectStart,
    /// Connect attempt failed.
    ConnectFailed,
    /// Stream established.
    Connected,
    /// Stream broke while connected.
    ConnectionLost,
    /// Local disconnect requested.
    DisconnectStart,
    /// Socket closed. Terminal.
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::None => "None",
            ConnectionState::ConnectStart => "Connecting...",
            ConnectionState::ConnectFailed => "Connect failed",
            ConnectionState::Connected => "Connected",
            ConnectionState::ConnectionLost => "Connection lost",
            ConnectionState::DisconnectStart => "Disconnecting...",
            ConnectionState::Disconnected => "Disconnected",
        }
    }

    /// Whether the worker owning this state has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }
}

/// Events emitted by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connection state changed.
    StateChanged(ConnectionState),
    /// A complete line arrived, terminator stripped.
    LineReceived(String),
    /// A write finished.
    WriteCompleted,
}

pub type EventSender = mpsc::UnboundedSender<ConnectionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

/// Tuning for a single connection.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Receive line buffer capacity.
    pub line_buffer_size: usize,
    /// Maximum bytes per socket read.
    pub read_chunk_size: usize,
    /// Give up connecting after this long. `None` waits forever.
    pub connect_timeout: Option<Duration>,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            line_buffer_size: LINE_BUFFER_SIZE,
            read_chunk_size: READ_CHUNK_SIZE,
            connect_timeout: None,
        }
    }
}

/// State shared between the worker task and its owner.
///
/// State changes are published while the state lock is held, so events leave
/// in the order the transitions happened. The writer has its own lock and the
/// state lock is never held across socket I/O, so a stalled write never holds
/// up the read loop.
pub(crate) struct Link {
    state: Mutex<ConnectionState>,
    writer: Mutex<Option<WriteHalf<BoxedStream>>>,
    start: Notify,
    closed: watch::Sender<bool>,
    event_tx: EventSender,
}

/// Resolves once the link has been cancelled.
async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    // The sender lives as long as the link, an error means it is gone anyway
    let _ = closed.wait_for(|closed| *closed).await;
}

impl Link {
    fn new(event_tx: EventSender) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            state: Mutex::new(ConnectionState::None),
            writer: Mutex::new(None),
            start: Notify::new(),
            closed,
            event_tx,
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        // The sink may already be gone during shutdown
        let _ = self.event_tx.send(event);
    }

    fn set_state(&self, current: &mut ConnectionState, state: ConnectionState) {
        debug!("Connection state: {:?} -> {:?}", current, state);
        *current = state;
        self.emit(ConnectionEvent::StateChanged(state));
    }

    /// Close the socket and finish. Every exit path ends here.
    ///
    /// Raising `closed` first makes an in-flight write give up the writer.
    async fn cancel(&self, current: &mut ConnectionState) {
        self.closed.send_replace(true);
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                error!("Failed to close socket: {}", e);
            }
        }
        self.set_state(current, ConnectionState::Disconnected);
    }

    async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Move from `None` to `ConnectStart`. Ignored in any other state.
    async fn connect(&self) {
        let mut state = self.state.lock().await;
        if *state != ConnectionState::None {
            debug!("connect() ignored in state {:?}", *state);
            return;
        }
        self.set_state(&mut state, ConnectionState::ConnectStart);
        self.start.notify_one();
    }

    /// Tear down an established connection. Ignored unless connected.
    async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        if *state != ConnectionState::Connected {
            debug!("disconnect() ignored in state {:?}", *state);
            return;
        }
        self.set_state(&mut state, ConnectionState::DisconnectStart);
        self.cancel(&mut state).await;
    }

    /// Write raw bytes. Failures are logged only; the read loop notices a
    /// broken stream on its own.
    async fn write(&self, bytes: &[u8]) {
        {
            let state = self.state.lock().await;
            if *state != ConnectionState::Connected {
                debug!("write ignored in state {:?}", *state);
                return;
            }
        }

        let mut closed = self.closed.subscribe();
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return;
        };

        let result = tokio::select! {
            biased;
            _ = wait_closed(&mut closed) => {
                debug!("Write of {} bytes abandoned, connection closed", bytes.len());
                return;
            }
            result = async {
                writer.write_all(bytes).await?;
                writer.flush().await
            } => result,
        };

        // Still holding the writer, so this lands before any Disconnected
        match result {
            Ok(()) => {
                debug!("Wrote {} bytes", bytes.len());
                self.emit(ConnectionEvent::WriteCompleted);
            }
            Err(e) => warn!("Write failed: {}", e),
        }
    }
}

/// Handle to a running worker, held by the controller.
pub struct WorkerHandle {
    link: Arc<Link>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub async fn connect(&self) {
        self.link.connect().await;
    }

    pub async fn disconnect(&self) {
        self.link.disconnect().await;
    }

    pub async fn write(&self, bytes: &[u8]) {
        self.link.write(bytes).await;
    }

    pub async fn state(&self) -> ConnectionState {
        self.link.state().await
    }

    /// Whether the worker task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Nobody can ask a worker that never started to connect any more.
        // Once started it runs to completion on its own.
        let never_started = self
            .link
            .state
            .try_lock()
            .map(|state| *state == ConnectionState::None)
            .unwrap_or(false);
        if never_started {
            debug!("Worker dropped before connect, stopping it");
            self.task.abort();
        }
    }
}

/// Owns the socket for one connection attempt.
pub struct ConnectionWorker {
    address: DeviceAddress,
    connector: Arc<dyn Connector>,
    options: LinkOptions,
    link: Arc<Link>,
}

impl ConnectionWorker {
    /// Create a worker for `address`. It does nothing until spawned and
    /// asked to connect.
    pub fn new(
        address: DeviceAddress,
        connector: Arc<dyn Connector>,
        options: LinkOptions,
        event_tx: EventSender,
    ) -> Self {
        Self {
            address,
            connector,
            options,
            link: Arc::new(Link::new(event_tx)),
        }
    }

    /// Start the worker task.
    pub fn spawn(self) -> WorkerHandle {
        let link = self.link.clone();
        let task = tokio::spawn(self.run());
        WorkerHandle { link, task }
    }

    async fn run(self) {
        self.link.start.notified().await;
        info!("Connecting to {} ({})", self.address, self.connector.name());

        let stream = match self.open().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to connect to {}: {}", self.address, e);
                let mut state = self.link.state.lock().await;
                self.link.set_state(&mut state, ConnectionState::ConnectFailed);
                self.link.cancel(&mut state).await;
                return;
            }
        };

        let (reader, writer) = tokio::io::split(stream);
        *self.link.writer.lock().await = Some(writer);
        {
            let mut state = self.link.state.lock().await;
            self.link.set_state(&mut state, ConnectionState::Connected);
        }
        info!("Connected to {}", self.address);

        self.read_loop(reader).await;
        info!("Connection to {} closed", self.address);
    }

    async fn open(&self) -> io::Result<BoxedStream> {
        let connect = self.connector.connect(&self.address);
        match self.options.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .unwrap_or_else(|_| {
                    Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))
                }),
            None => connect.await,
        }
    }

    async fn read_loop(&self, mut reader: ReadHalf<BoxedStream>) {
        let mut framer = LineFramer::with_capacity(self.options.line_buffer_size);
        let mut buf = vec![0u8; self.options.read_chunk_size.max(1)];
        let mut closed = self.link.closed.subscribe();
        debug!(
            "Read loop started, {} byte line buffer, {} byte reads",
            framer.capacity(),
            buf.len()
        );

        loop {
            let result = tokio::select! {
                result = reader.read(&mut buf) => result,
                _ = wait_closed(&mut closed) => {
                    debug!("Read loop cancelled");
                    return;
                }
            };

            let mut state = self.link.state.lock().await;
            if *state != ConnectionState::Connected {
                // Disconnected locally while the read was in flight
                return;
            }

            match result {
                Ok(0) => {
                    info!("Connection closed by remote");
                    self.link.set_state(&mut state, ConnectionState::ConnectionLost);
                    self.link.cancel(&mut state).await;
                    return;
                }
                Ok(n) => {
                    debug!("Received {} bytes", n);
                    for line in framer.push(&buf[..n]) {
                        self.link.emit(ConnectionEvent::LineReceived(line));
                    }
                }
                Err(e) => {
                    error!("Read error: {}", e);
                    self.link.set_state(&mut state, ConnectionState::ConnectionLost);
                    self.link.cancel(&mut state).await;
                    return;
                }
            }
        }
    }
}
