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

//! Bluetooth communication module.
//!
//! Connects to a remote SPP device and exchanges `\r\n`-terminated lines.

mod adapter;
mod connection;
mod controller;
mod discovery;
mod error;
pub mod framing;
pub mod transport;

pub use adapter::BluetoothAdapter;
pub use connection::{
    ConnectionEvent, ConnectionState, ConnectionWorker, EventReceiver, EventSender, LinkOptions,
    WorkerHandle, READ_CHUNK_SIZE,
};
pub use controller::ConnectionController;
pub use discovery::{select_device, DeviceScanner, DiscoveredDevice, DEFAULT_SCAN_DURATION};
pub use error::{BluetoothError, Result};
pub use framing::{LineFramer, LINE_BUFFER_SIZE};
pub use transport::{
    BoxedStream, Connector, DeviceAddress, RfcommConnector, SerialStream, TcpConnector, SPP_UUID,
};
