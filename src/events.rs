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

//! Event processing for the front end.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bluetooth::{ConnectionEvent, ConnectionState};
use crate::state::AppState;

/// Notice shown to the operator when a connect attempt fails.
pub const CONNECT_FAILED_NOTICE: &str = "Failed to connect to the device.";

/// Applies connection events to the application state and prints lines.
pub struct EventProcessor<W: Write> {
    state: Arc<AppState>,
    output: W,
}

impl<W: Write> EventProcessor<W> {
    pub fn new(state: Arc<AppState>, output: W) -> Self {
        Self { state, output }
    }

    /// Process a single event.
    pub fn process_event(&mut self, event: &ConnectionEvent) -> Result<()> {
        match event {
            ConnectionEvent::StateChanged(state) => self.handle_state(*state)?,
            ConnectionEvent::LineReceived(line) => {
                debug!("Line received: {} chars", line.len());
                writeln!(self.output, "< {}", line)?;
                self.output.flush()?;
                self.state.set_last_line(line.clone());
            }
            ConnectionEvent::WriteCompleted => {
                debug!("Write completed");
                self.state.write_completed();
            }
        }
        Ok(())
    }

    fn handle_state(&mut self, state: ConnectionState) -> Result<()> {
        debug!("Connection state: {}", state.as_str());
        self.state.set_connection_state(state);
        match state {
            ConnectionState::ConnectFailed => {
                warn!("{}", CONNECT_FAILED_NOTICE);
                self.state.set_notice(CONNECT_FAILED_NOTICE);
                writeln!(self.output, "! {}", CONNECT_FAILED_NOTICE)?;
            }
            ConnectionState::Connected => {
                let device = self.state.get_device_address().unwrap_or_default();
                info!("Connected to {}", device);
                writeln!(self.output, "* Connected to {}", device)?;
            }
            ConnectionState::ConnectStart
            | ConnectionState::ConnectionLost
            | ConnectionState::Disconnected => {
                info!("{}", state.as_str());
                writeln!(self.output, "* {}", state.as_str())?;
            }
            _ => {}
        }
        self.output.flush()?;
        Ok(())
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn output(&self) -> &W {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_text(processor: &EventProcessor<Vec<u8>>) -> String {
        String::from_utf8(processor.output().clone()).unwrap()
    }

    #[test]
    fn test_line_is_printed_and_stored() {
        let state = AppState::new();
        let mut processor = EventProcessor::new(state.clone(), Vec::new());

        processor
            .process_event(&ConnectionEvent::LineReceived("Hello".to_string()))
            .unwrap();

        assert_eq!(output_text(&processor), "< Hello\n");
        assert_eq!(state.get_last_line().as_deref(), Some("Hello"));
    }

    #[test]
    fn test_connect_failed_notice() {
        let state = AppState::new();
        let mut processor = EventProcessor::new(state.clone(), Vec::new());

        for s in [
            ConnectionState::ConnectStart,
            ConnectionState::ConnectFailed,
            ConnectionState::Disconnected,
        ] {
            processor
                .process_event(&ConnectionEvent::StateChanged(s))
                .unwrap();
        }

        let text = output_text(&processor);
        assert!(text.starts_with("* Connecting...\n"));
        assert!(text.contains(CONNECT_FAILED_NOTICE));
        assert!(text.ends_with("* Disconnected\n"));
        assert!(state.affordances().connect);
        assert_eq!(state.get_last_notice().as_deref(), Some(CONNECT_FAILED_NOTICE));

        // Retrying clears the notice
        assert!(state.begin_connect());
        assert_eq!(state.get_last_notice(), None);
    }

    #[test]
    fn test_write_completed_reenables_send() {
        let state = AppState::new();
        state.set_device_address("00:11:22:33:44:55".to_string());
        let mut processor = EventProcessor::new(state.clone(), Vec::new());

        processor
            .process_event(&ConnectionEvent::StateChanged(ConnectionState::Connected))
            .unwrap();
        assert!(output_text(&processor).contains("Connected to 00:11:22:33:44:55"));

        assert!(state.begin_send());
        processor
            .process_event(&ConnectionEvent::WriteCompleted)
            .unwrap();
        assert!(state.affordances().send);
    }

    #[test]
    fn test_disconnect_refused_until_connected() {
        let state = AppState::new();
        let mut processor = EventProcessor::new(state.clone(), Vec::new());

        assert!(state.begin_connect());
        processor
            .process_event(&ConnectionEvent::StateChanged(ConnectionState::ConnectStart))
            .unwrap();
        // Neither action may reach the controller while connecting
        assert!(!state.begin_disconnect());
        assert!(!state.begin_send());

        processor
            .process_event(&ConnectionEvent::StateChanged(ConnectionState::Connected))
            .unwrap();
        assert!(state.begin_disconnect());
        processor
            .process_event(&ConnectionEvent::StateChanged(ConnectionState::DisconnectStart))
            .unwrap();
        processor
            .process_event(&ConnectionEvent::StateChanged(ConnectionState::Disconnected))
            .unwrap();
        assert!(state.begin_connect());
    }
}
