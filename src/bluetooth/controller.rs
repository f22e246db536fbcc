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

//! Session facade over a single connection worker.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::connection::{
    ConnectionEvent, ConnectionState, ConnectionWorker, EventReceiver, EventSender, LinkOptions,
    WorkerHandle,
};
use super::framing::LineFramer;
use super::transport::{Connector, DeviceAddress};

/// Public entry point for connecting, sending and disconnecting.
///
/// At most one worker is attached at a time. All outcomes are reported on
/// the event channel returned by [`ConnectionController::new`].
pub struct ConnectionController {
    connector: Arc<dyn Connector>,
    options: LinkOptions,
    event_tx: EventSender,
    worker: Option<WorkerHandle>,
}

impl ConnectionController {
    /// Create a controller and the receiver its events are delivered on.
    pub fn new(connector: Arc<dyn Connector>, options: LinkOptions) -> (Self, EventReceiver) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let controller = Self {
            connector,
            options,
            event_tx,
            worker: None,
        };
        (controller, event_rx)
    }

    /// Start connecting to `address`. Ignored while a worker is attached.
    pub async fn connect(&mut self, address: DeviceAddress) {
        if self.worker.is_some() {
            debug!("connect() ignored, worker already attached");
            return;
        }

        info!("Starting connection to {}", address);
        let worker = ConnectionWorker::new(
            address,
            self.connector.clone(),
            self.options.clone(),
            self.event_tx.clone(),
        )
        .spawn();
        worker.connect().await;
        self.worker = Some(worker);
    }

    /// Disconnect and detach the worker. The worker finishes on its own.
    pub async fn disconnect(&mut self) {
        let Some(worker) = self.worker.take() else {
            debug!("disconnect() ignored, no worker attached");
            return;
        };
        info!("Disconnecting");
        worker.disconnect().await;
    }

    /// Send `text` as one line.
    pub async fn send(&self, text: &str) {
        let Some(worker) = self.worker.as_ref() else {
            debug!("send() ignored, no worker attached");
            return;
        };
        worker.write(&LineFramer::encode(text)).await;
    }

    /// Feed every event from the channel back here before acting on it.
    ///
    /// Detaches the worker once it reports `Disconnected`, so a later
    /// [`connect`](Self::connect) can start a fresh one. A stale event from a
    /// worker that was already replaced does not detach the new one.
    pub async fn on_event(&mut self, event: &ConnectionEvent) {
        if *event != ConnectionEvent::StateChanged(ConnectionState::Disconnected) {
            return;
        }
        if let Some(worker) = self.worker.as_ref() {
            if worker.state().await.is_terminal() {
                debug!("Worker finished, detaching");
                self.worker = None;
            }
        }
    }

    /// Whether a worker is attached.
    pub fn is_attached(&self) -> bool {
        self.worker.is_some()
    }

    /// State of the attached worker, if any.
    pub async fn state(&self) -> Option<ConnectionState> {
        match self.worker.as_ref() {
            Some(worker) => Some(worker.state().await),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::transport::TcpConnector;

    fn address() -> DeviceAddress {
        DeviceAddress::new("127.0.0.1:1").unwrap()
    }

    #[tokio::test]
    async fn test_no_worker_is_noop() {
        let (mut controller, mut rx) =
            ConnectionController::new(Arc::new(TcpConnector), LinkOptions::default());

        controller.disconnect().await;
        controller.send("Hello").await;

        assert!(!controller.is_attached());
        assert_eq!(controller.state().await, None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unrelated_events_keep_worker() {
        let (mut controller, mut rx) =
            ConnectionController::new(Arc::new(TcpConnector), LinkOptions::default());
        controller.connect(address()).await;
        assert!(controller.is_attached());

        assert_eq!(
            rx.recv().await,
            Some(ConnectionEvent::StateChanged(ConnectionState::ConnectStart))
        );
        controller
            .on_event(&ConnectionEvent::StateChanged(ConnectionState::ConnectStart))
            .await;
        controller.on_event(&ConnectionEvent::WriteCompleted).await;
        assert!(controller.is_attached());
    }
}
