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

//! Byte-stream transports a connection can run over.
//!
//! The connection only needs three things from a transport: open a stream to
//! a named peer, read and write it, close it. [`Connector`] covers the first;
//! the returned stream covers the rest.

use bluer::rfcomm::{Profile, Role, SocketAddr, Stream};
use bluer::Address;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::fmt;
use std::io;
use std::str::FromStr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};
use uuid::Uuid;

use super::adapter::BluetoothAdapter;
use super::error::{BluetoothError, Result};

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Remote peer identifier.
///
/// A Bluetooth MAC for RFCOMM, `host:port` for TCP. Only checked for being
/// non-empty; the connector decides whether it can use it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(BluetoothError::InvalidAddress(address));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceAddress {
    type Err = BluetoothError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Any bidirectional byte stream.
pub trait SerialStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> SerialStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type BoxedStream = Box<dyn SerialStream>;

/// Opens streams to remote peers.
pub trait Connector: Send + Sync {
    /// Open a stream to `address`. May wait indefinitely.
    fn connect<'a>(&'a self, address: &'a DeviceAddress) -> BoxFuture<'a, io::Result<BoxedStream>>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// RFCOMM connector backed by BlueZ.
pub struct RfcommConnector {
    adapter: BluetoothAdapter,
    channel: Option<u8>,
}

impl RfcommConnector {
    /// Connect through the SPP service record of the remote device.
    pub fn new(adapter: BluetoothAdapter) -> Self {
        Self {
            adapter,
            channel: None,
        }
    }

    /// Connect straight to a fixed RFCOMM channel, skipping the SDP lookup.
    pub fn with_channel(adapter: BluetoothAdapter, channel: u8) -> Self {
        Self {
            adapter,
            channel: Some(channel),
        }
    }

    /// Register an SPP client profile and let BlueZ resolve the channel.
    async fn connect_spp_profile(&self, address: Address) -> io::Result<Stream> {
        let profile = Profile {
            uuid: SPP_UUID,
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let mut handle = self
            .adapter
            .session()
            .register_profile(profile)
            .await
            .map_err(io::Error::other)?;
        debug!("SPP client profile registered");

        let device = self.adapter.adapter().device(address).map_err(io::Error::other)?;
        let connect = device.connect_profile(&SPP_UUID);
        tokio::pin!(connect);

        // BlueZ hands the socket over through the profile before the
        // ConnectProfile call returns.
        let early = tokio::select! {
            result = &mut connect => {
                result.map_err(io::Error::other)?;
                None
            }
            request = handle.next() => Some(request),
        };
        let request = match early {
            Some(request) => request,
            None => handle.next().await,
        };

        let request = request.ok_or_else(|| {
            io::Error::new(io::ErrorKind::ConnectionAborted, "SPP profile closed")
        })?;
        debug!("Accepting SPP connection request");
        request.accept().map_err(io::Error::other)
    }
}

impl Connector for RfcommConnector {
    fn connect<'a>(&'a self, address: &'a DeviceAddress) -> BoxFuture<'a, io::Result<BoxedStream>> {
        async move {
            let remote: Address = address.as_str().parse().map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Invalid Bluetooth address {}: {}", address, e),
                )
            })?;

            let stream = match self.channel {
                Some(channel) => {
                    info!("Connecting to {} on RFCOMM channel {}", remote, channel);
                    Stream::connect(SocketAddr::new(remote, channel)).await?
                }
                None => {
                    info!("Connecting to {} via SPP ({})", remote, SPP_UUID);
                    self.connect_spp_profile(remote).await?
                }
            };

            Ok(Box::new(stream) as BoxedStream)
        }
        .boxed()
    }

    fn name(&self) -> &'static str {
        "rfcomm"
    }
}

/// TCP connector for serial bridges and local testing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect<'a>(&'a self, address: &'a DeviceAddress) -> BoxFuture<'a, io::Result<BoxedStream>> {
        async move {
            info!("Connecting to {} over TCP", address);
            let stream = TcpStream::connect(address.as_str()).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as BoxedStream)
        }
        .boxed()
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_spp_uuid() {
        assert_eq!(
            SPP_UUID.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_device_address() {
        let addr = DeviceAddress::new(" 00:11:22:33:44:55 ").unwrap();
        assert_eq!(addr.as_str(), "00:11:22:33:44:55");
        assert_eq!(addr.to_string(), "00:11:22:33:44:55");

        assert!(DeviceAddress::new("").is_err());
        assert!(DeviceAddress::new("   ").is_err());
        assert!("localhost:7000".parse::<DeviceAddress>().is_ok());
    }

    #[tokio::test]
    async fn test_tcp_connector() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(b"pong").await.unwrap();
            buf
        });

        let address = DeviceAddress::new(format!("127.0.0.1:{}", port)).unwrap();
        let mut stream = TcpConnector.connect(&address).await.unwrap();
        stream.write_all(b"ping").await.unwrap();
        let mut reply = [0u8; 4];
        stream.read_exact(&mut reply).await.unwrap();

        assert_eq!(&reply, b"pong");
        assert_eq!(&server.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_tcp_connector_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let address = DeviceAddress::new(format!("127.0.0.1:{}", port)).unwrap();
        assert!(TcpConnector.connect(&address).await.is_err());
    }
}
