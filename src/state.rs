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

//! Application state management.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::bluetooth::ConnectionState;

/// Which user actions are currently allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordances {
    pub connect: bool,
    pub disconnect: bool,
    pub send: bool,
}

impl Affordances {
    const IDLE: Self = Self {
        connect: true,
        disconnect: false,
        send: false,
    };
}

/// Shared application state, as seen by the front end.
#[derive(Debug)]
pub struct AppState {
    /// Last reported connection state.
    pub connection_state: RwLock<ConnectionState>,

    /// Allowed actions.
    pub affordances: RwLock<Affordances>,

    /// Address of the selected device.
    pub device_address: RwLock<Option<String>>,

    /// Last received line.
    pub last_line: RwLock<Option<String>>,

    /// Last notice shown to the user.
    pub last_notice: RwLock<Option<String>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            connection_state: RwLock::new(ConnectionState::None),
            affordances: RwLock::new(Affordances::IDLE),
            device_address: RwLock::new(None),
            last_line: RwLock::new(None),
            last_notice: RwLock::new(None),
        }
    }
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_device_address(&self, address: String) {
        *self.device_address.write() = Some(address);
        *self.last_line.write() = None;
    }

    pub fn get_device_address(&self) -> Option<String> {
        self.device_address.read().clone()
    }

    /// Record a state change and update which actions are allowed.
    pub fn set_connection_state(&self, state: ConnectionState) {
        *self.connection_state.write() = state;

        let mut affordances = self.affordances.write();
        match state {
            ConnectionState::Connected => {
                affordances.disconnect = true;
                affordances.send = true;
            }
            ConnectionState::DisconnectStart => {
                affordances.disconnect = false;
                affordances.send = false;
            }
            ConnectionState::Disconnected => {
                *affordances = Affordances::IDLE;
            }
            _ => {}
        }
    }

    pub fn get_connection_state(&self) -> ConnectionState {
        *self.connection_state.read()
    }

    /// Called when the user starts connecting. Returns `false`, changing
    /// nothing, if connecting is not allowed right now.
    pub fn begin_connect(&self) -> bool {
        let mut affordances = self.affordances.write();
        if !affordances.connect {
            return false;
        }
        affordances.connect = false;
        *self.last_notice.write() = None;
        true
    }

    /// Called when the user asks to disconnect. Only allowed while connected.
    pub fn begin_disconnect(&self) -> bool {
        let mut affordances = self.affordances.write();
        if !affordances.disconnect {
            return false;
        }
        affordances.disconnect = false;
        true
    }

    /// Called when a line is handed to the connection. Sending stays blocked
    /// until the write completes.
    pub fn begin_send(&self) -> bool {
        let mut affordances = self.affordances.write();
        if !affordances.send {
            return false;
        }
        affordances.send = false;
        true
    }

    pub fn write_completed(&self) {
        if self.get_connection_state() == ConnectionState::Connected {
            self.affordances.write().send = true;
        }
    }

    pub fn affordances(&self) -> Affordances {
        *self.affordances.read()
    }

    pub fn set_last_line(&self, line: String) {
        *self.last_line.write() = Some(line);
    }

    pub fn get_last_line(&self) -> Option<String> {
        self.last_line.read().clone()
    }

    pub fn set_notice(&self, notice: impl Into<String>) {
        *self.last_notice.write() = Some(notice.into());
    }

    pub fn get_last_notice(&self) -> Option<String> {
        self.last_notice.read().clone()
    }
}
