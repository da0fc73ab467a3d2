/*
 * error.rs
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

//! Crate-wide error type: the §6 error-code taxonomy plus construction-time
//! failures (DNS resolution, TLS setup). Carried directly in `OnError`
//! callbacks rather than as a raw integer code.

use std::fmt;
use std::io;

/// Every error a `Connection` can report, either from construction or from
/// a per-request callback.
#[derive(Debug)]
pub enum Error {
    /// TCP connect, DNS resolution, or TLS handshake failed (VST), or curl
    /// reported one of `COULDNT_CONNECT` / `SSL_CONNECT_ERROR` /
    /// `COULDNT_RESOLVE_HOST` / `URL_MALFORMAT` / `SEND_ERROR` (HTTP).
    CouldNotConnect(String),
    /// Deadline timer expired (VST), or curl reported `OPERATION_TIMEDOUT` /
    /// `RECV_ERROR` / `GOT_NOTHING` (HTTP).
    Timeout,
    /// Async read on the VST socket failed.
    VstReadError(String),
    /// Async write on the VST socket failed.
    VstWriteError(String),
    /// The connection was reset while this request was in flight; the
    /// request was never answered and was not retried.
    VstCanceledDuringReset,
    /// A malformed chunk header, an inconsistent `total_message_length`, or
    /// an unsolicited chunk whose `message_id` has no matching in-flight
    /// request.
    ProtocolError(String),
    /// Any other curl result code.
    CurlError(String),
    /// `HttpConnection::send_request_sync` — the source explicitly does not
    /// implement a synchronous HTTP path.
    NotImplemented,
    /// Raised from construction (`VstConnection::new` / `connect`):
    /// address resolution or TLS context setup failed before any request
    /// was ever submitted.
    Configuration(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CouldNotConnect(msg) => write!(f, "could not connect: {msg}"),
            Error::Timeout => write!(f, "operation timed out"),
            Error::VstReadError(msg) => write!(f, "vst read error: {msg}"),
            Error::VstWriteError(msg) => write!(f, "vst write error: {msg}"),
            Error::VstCanceledDuringReset => write!(f, "canceled during connection reset"),
            Error::ProtocolError(msg) => write!(f, "protocol error: {msg}"),
            Error::CurlError(msg) => write!(f, "curl error: {msg}"),
            Error::NotImplemented => write!(f, "not implemented"),
            Error::Configuration(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut => Error::Timeout,
            io::ErrorKind::ConnectionRefused | io::ErrorKind::NotConnected => {
                Error::CouldNotConnect(e.to_string())
            }
            _ => Error::VstReadError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        assert_eq!(Error::Timeout.to_string(), "operation timed out");
        assert!(Error::CouldNotConnect("dns".into()).to_string().contains("dns"));
    }

    #[test]
    fn io_timeout_maps_to_timeout() {
        let e: Error = io::Error::new(io::ErrorKind::TimedOut, "x").into();
        matches!(e, Error::Timeout);
    }
}
