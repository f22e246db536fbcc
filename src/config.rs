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

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bluetooth::{
    DeviceAddress, LinkOptions, DEFAULT_SCAN_DURATION, LINE_BUFFER_SIZE, READ_CHUNK_SIZE,
};

const APP_DIR: &str = "bluetooth-communicator";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Link framing settings.
    pub link: LinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Address of the device to connect to when none is given.
    pub device_address: String,

    /// Fixed RFCOMM channel. When unset the SPP service record is used.
    pub rfcomm_channel: Option<u8>,

    /// How long a device scan runs.
    pub scan_duration_secs: u64,

    /// Connect timeout. When unset a connect attempt waits indefinitely.
    pub connect_timeout_secs: Option<u64>,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            device_address: String::new(),
            rfcomm_channel: None,
            scan_duration_secs: DEFAULT_SCAN_DURATION.as_secs(),
            connect_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Receive line buffer size in bytes.
    pub line_buffer_size: usize,

    /// Maximum bytes read from the socket at once.
    pub read_chunk_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            line_buffer_size: LINE_BUFFER_SIZE,
            read_chunk_size: READ_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults there if missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Remember `address` as the device to connect to by default.
    pub fn remember_device(&mut self, address: &DeviceAddress) {
        self.bluetooth.device_address = address.to_string();
    }

    /// The remembered device, if one is set.
    pub fn device_address(&self) -> Option<DeviceAddress> {
        DeviceAddress::new(self.bluetooth.device_address.as_str()).ok()
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.bluetooth.scan_duration_secs)
    }

    /// Connection tuning derived from this configuration.
    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            line_buffer_size: self.link.line_buffer_size,
            read_chunk_size: self.link.read_chunk_size,
            connect_timeout: self.bluetooth.connect_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.bluetooth.device_address.is_empty());
        assert_eq!(config.bluetooth.rfcomm_channel, None);
        assert_eq!(config.scan_duration(), Duration::from_secs(12));

        let options = config.link_options();
        assert_eq!(options.line_buffer_size, 1024);
        assert_eq!(options.read_chunk_size, 1024);
        assert_eq!(options.connect_timeout, None);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert!(config.bluetooth.device_address.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.bluetooth.device_address = "00:11:22:33:44:55".to_string();
        config.bluetooth.rfcomm_channel = Some(1);
        config.bluetooth.connect_timeout_secs = Some(5);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.bluetooth.device_address, "00:11:22:33:44:55");
        assert_eq!(loaded.bluetooth.rfcomm_channel, Some(1));
        assert_eq!(
            loaded.link_options().connect_timeout,
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bluetooth]\ndevice_address = \"AA:BB:CC:DD:EE:FF\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.bluetooth.device_address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(config.bluetooth.scan_duration_secs, 12);
        assert_eq!(config.link.line_buffer_size, 1024);
    }

    #[test]
    fn test_remember_device_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::load_from(&path).unwrap();
        assert!(config.device_address().is_none());

        let address = DeviceAddress::new("00:11:22:33:44:55").unwrap();
        config.remember_device(&address);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.device_address(), Some(address));
    }
}
