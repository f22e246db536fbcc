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

//! Bluetooth device discovery.
//!
//! Lists known devices and runs an inquiry for new ones.

use bluer::{AdapterEvent, Address, Device};
use futures::StreamExt;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::adapter::BluetoothAdapter;
use super::error::{BluetoothError, Result};
use super::transport::SPP_UUID;

/// Length of a classic inquiry scan.
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(12);

/// A device seen during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: String,
    pub paired: bool,
    /// Advertises the serial port profile.
    pub supports_spp: bool,
}

impl DiscoveredDevice {
    /// One line for a device list.
    pub fn summary(&self) -> String {
        let mut flags = Vec::new();
        if self.paired {
            flags.push("paired");
        }
        if self.supports_spp {
            flags.push("spp");
        }
        if flags.is_empty() {
            format!("{}  {}", self.address, self.name)
        } else {
            format!("{}  {} [{}]", self.address, self.name, flags.join(", "))
        }
    }
}

/// Resolve a choice from a device list: the 1-based position shown next to
/// the device, or its address.
pub fn select_device<'d>(
    devices: &'d [DiscoveredDevice],
    choice: &str,
) -> Option<&'d DiscoveredDevice> {
    let choice = choice.trim();
    if let Ok(index) = choice.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| devices.get(i));
    }
    devices
        .iter()
        .find(|d| d.address.eq_ignore_ascii_case(choice))
}

/// Device discovery scanner.
pub struct DeviceScanner<'a> {
    adapter: &'a BluetoothAdapter,
}

impl<'a> DeviceScanner<'a> {
    pub fn new(adapter: &'a BluetoothAdapter) -> Self {
        Self { adapter }
    }

    /// Scan for `duration`, returning known devices plus any newly found.
    pub async fn scan(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>> {
        if !self.adapter.is_powered().await? {
            return Err(BluetoothError::TransportUnavailable(
                "Bluetooth adapter is powered off".to_string(),
            ));
        }

        info!("Starting Bluetooth scan for {:?}", duration);

        let mut devices = self.known_devices().await?;
        let mut seen: HashSet<String> = devices.iter().map(|d| d.address.clone()).collect();

        let events = self
            .adapter
            .adapter()
            .discover_devices()
            .await
            .map_err(|e| BluetoothError::BlueZ(format!("Failed to start discovery: {}", e)))?;

        let scan = timeout(duration, async {
            let mut events = Box::pin(events);
            while let Some(event) = events.next().await {
                match event {
                    AdapterEvent::DeviceAdded(addr) => {
                        if !seen.insert(addr.to_string()) {
                            continue;
                        }
                        debug!("Discovered device: {}", addr);
                        match self.device(addr).await {
                            Ok(device) => devices.push(device),
                            Err(e) => warn!("Failed to read device {}: {}", addr, e),
                        }
                    }
                    AdapterEvent::DeviceRemoved(addr) => {
                        debug!("Device removed: {}", addr);
                    }
                    _ => {}
                }
            }
        })
        .await;

        // Elapsed is the normal way out
        if scan.is_err() {
            debug!("Scan duration elapsed");
        }

        info!("Scan complete, found {} devices", devices.len());
        Ok(devices)
    }

    /// Devices BlueZ already knows about, paired or previously seen.
    pub async fn known_devices(&self) -> Result<Vec<DiscoveredDevice>> {
        let addresses = self
            .adapter
            .adapter()
            .device_addresses()
            .await
            .map_err(|e| BluetoothError::BlueZ(format!("Failed to list devices: {}", e)))?;

        let mut devices = Vec::new();
        for addr in addresses {
            match self.device(addr).await {
                Ok(device) => devices.push(device),
                Err(e) => warn!("Failed to read device {}: {}", addr, e),
            }
        }
        Ok(devices)
    }

    async fn device(&self, addr: Address) -> Result<DiscoveredDevice> {
        let device = self
            .adapter
            .adapter()
            .device(addr)
            .map_err(|e| BluetoothError::BlueZ(format!("Failed to get device {}: {}", addr, e)))?;
        Ok(Self::describe(&device).await)
    }

    async fn describe(device: &Device) -> DiscoveredDevice {
        let name = device
            .name()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| "Unknown".to_string());
        let paired = device.is_paired().await.unwrap_or(false);
        let supports_spp = device
            .uuids()
            .await
            .ok()
            .flatten()
            .map(|uuids| uuids.contains(&SPP_UUID))
            .unwrap_or(false);

        DiscoveredDevice {
            address: device.address().to_string(),
            name,
            paired,
            supports_spp,
        }
    }
}
