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

//! Line framing for the serial text protocol.
//!
//! Lines are terminated by `\r`. A `\n` is tolerated after it and ignored.

use tracing::debug;

/// Default capacity of the receive line buffer.
pub const LINE_BUFFER_SIZE: usize = 1024;

/// Terminator appended to every outgoing line.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Splits an incoming byte stream into lines and frames outgoing text.
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    capacity: usize,
}

impl LineFramer {
    /// Create a framer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(LINE_BUFFER_SIZE)
    }

    /// Create a framer holding at most `capacity - 1` pending bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Frame `text` as a line ready to be written to the socket.
    pub fn encode(text: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(text.len() + LINE_TERMINATOR.len());
        bytes.extend_from_slice(text.as_bytes());
        bytes.extend_from_slice(LINE_TERMINATOR);
        bytes
    }

    /// Feed a single byte.
    ///
    /// Returns `Some(line)` when `\r` completes a line. A full buffer is
    /// discarded without producing anything.
    pub fn feed(&mut self, byte: u8) -> Option<String> {
        match byte {
            b'\r' => {
                let line = String::from_utf8_lossy(&self.buffer).into_owned();
                self.buffer.clear();
                Some(line)
            }
            b'\n' => None,
            _ => {
                if self.buffer.len() < self.capacity - 1 {
                    self.buffer.push(byte);
                } else {
                    debug!(
                        "Line buffer overflow, dropping {} pending bytes",
                        self.buffer.len()
                    );
                    self.buffer.clear();
                }
                None
            }
        }
    }

    /// Feed a chunk as read from the socket, returning every completed line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        chunk.iter().filter_map(|&b| self.feed(b)).collect()
    }

    /// Drop any partially received line.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}
