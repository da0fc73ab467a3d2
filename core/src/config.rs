/*
 * config.rs
 * Copyright (C) 2026 the Velocystream contributors
 *
 * This file is part of Velocystream, a client driver for document-oriented
 * databases over VST and HTTP.
 *
 * Velocystream is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Velocystream is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Velocystream.  If not, see <http://www.gnu.org/licenses/>.
 */

//! `ConnectionConfiguration`: host/port/TLS/timeouts for one `Connection`.
//! Built programmatically by the embedding application (see
//! `original_source/nodejs/Connection.h`'s `ConnectionBuilder`); no
//! config-file format is parsed here.

use std::time::Duration;

/// Default VST chunk cap, taken from the reference implementation.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 30_000;

/// Host/port/TLS/timeout parameters for one `VstConnection` or `HttpConnection`.
#[derive(Debug, Clone)]
pub struct ConnectionConfiguration {
    host: String,
    port: String,
    ssl: bool,
    connection_timeout: Duration,
    request_timeout: Duration,
    max_chunk_size: usize,
}

impl ConnectionConfiguration {
    /// New configuration with the reference defaults: no TLS, 3s connect
    /// timeout, 30s request timeout, 30000-byte max chunk size.
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            ssl: false,
            connection_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(30),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }

    pub fn ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Connection timeout. Floored to 1s after conversion, matching the
    /// `CONNECTTIMEOUT = max(1, connection_timeout_seconds)` rule in §4.5.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout.max(Duration::from_secs(1));
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn max_chunk_size(mut self, bytes: usize) -> Self {
        self.max_chunk_size = bytes;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn is_ssl(&self) -> bool {
        self.ssl
    }

    pub fn connection_timeout_duration(&self) -> Duration {
        self.connection_timeout
    }

    pub fn request_timeout_duration(&self) -> Duration {
        self.request_timeout
    }

    /// Connect timeout in whole seconds, floored to 1 (curl's `CONNECTTIMEOUT`).
    pub fn connection_timeout_seconds(&self) -> u64 {
        self.connection_timeout.as_secs().max(1)
    }

    /// Request timeout in milliseconds (curl's `TIMEOUT_MS`).
    pub fn request_timeout_ms(&self) -> u64 {
        self.request_timeout.as_millis() as u64
    }

    pub fn max_chunk_size_bytes(&self) -> usize {
        self.max_chunk_size
    }

    /// Parsed `u16` port for the TCP/TLS connector.
    pub fn port_u16(&self) -> Result<u16, crate::error::Error> {
        self.port
            .parse()
            .map_err(|_| crate::error::Error::Configuration(format!("invalid port {:?}", self.port)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_timeout_floors_to_one_second() {
        let cfg = ConnectionConfiguration::new("localhost", "8529")
            .connection_timeout(Duration::from_millis(200));
        assert_eq!(cfg.connection_timeout_seconds(), 1);
    }

    #[test]
    fn defaults_match_reference() {
        let cfg = ConnectionConfiguration::new("localhost", "8529");
        assert!(!cfg.is_ssl());
        assert_eq!(cfg.max_chunk_size_bytes(), DEFAULT_MAX_CHUNK_SIZE);
        assert_eq!(cfg.port_u16().unwrap(), 8529);
    }
}
