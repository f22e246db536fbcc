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

//! Access to the local BlueZ adapter.

use bluer::{Adapter, Session};
use tracing::info;

use super::error::{BluetoothError, Result};

/// BlueZ session paired with the default adapter.
#[derive(Clone)]
pub struct BluetoothAdapter {
    session: Session,
    adapter: Adapter,
}

impl BluetoothAdapter {
    /// Open the default adapter.
    ///
    /// Fails with [`BluetoothError::TransportUnavailable`] when BlueZ cannot
    /// be reached, there is no adapter, or the adapter is powered off.
    pub async fn open() -> Result<Self> {
        let session = Session::new().await.map_err(|e| {
            BluetoothError::TransportUnavailable(format!("Failed to create BlueZ session: {}", e))
        })?;
        info!("BlueZ session created");

        let adapter = session.default_adapter().await.map_err(|e| {
            BluetoothError::TransportUnavailable(format!("No Bluetooth adapter: {}", e))
        })?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        let powered = adapter
            .is_powered()
            .await
            .map_err(|e| BluetoothError::BlueZ(format!("Failed to get power state: {}", e)))?;
        if !powered {
            return Err(BluetoothError::TransportUnavailable(format!(
                "Bluetooth adapter {} is powered off",
                adapter.name()
            )));
        }

        Ok(Self { session, adapter })
    }

    /// Adapter name, e.g. `hci0`.
    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Check whether the adapter is still powered.
    pub async fn is_powered(&self) -> Result<bool> {
        self.adapter
            .is_powered()
            .await
            .map_err(|e| BluetoothError::BlueZ(format!("Failed to get power state: {}", e)))
    }
}
