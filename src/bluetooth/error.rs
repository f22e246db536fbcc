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

//! Error types for Bluetooth operations.
//!
//! Connection failures and lost links are not errors here: they are reported
//! as state changes on the event channel.

use thiserror::Error;

/// Errors surfaced directly to the caller.
#[derive(Error, Debug)]
pub enum BluetoothError {
    /// No usable transport: BlueZ unreachable, no adapter or adapter off.
    #[error("Bluetooth transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Device address was empty or could not be parsed.
    #[error("Invalid device address: {0:?}")]
    InvalidAddress(String),

    /// BlueZ D-Bus error.
    #[error("BlueZ error: {0}")]
    BlueZ(String),
}

pub type Result<T> = std::result::Result<T, BluetoothError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BluetoothError::TransportUnavailable("adapter powered off".to_string());
        assert!(err.to_string().contains("unavailable"));
        assert!(err.to_string().contains("powered off"));

        let err = BluetoothError::InvalidAddress(String::new());
        assert_eq!(err.to_string(), "Invalid device address: \"\"");
    }
}
