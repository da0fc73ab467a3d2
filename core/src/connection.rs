/*
 * connection.rs
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

//! The uniform `Connection` capability both `VstConnection` and
//! `HttpConnection` implement (§2).

use crate::error::Error;
use crate::message_id::MessageId;
use crate::request::Request;
use crate::request_item::{OnError, OnSuccess};
use crate::response::Response;

/// A destination assembled from a base host/port/scheme and a request
/// path, grounded on `original_source/nodejs/Connection.h`'s
/// `createCommunicator`/`Destination` concept: callers build requests
/// against one `Connection`, not hand-formatted URLs.
#[derive(Debug, Clone)]
pub struct Destination {
    pub scheme: &'static str,
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(scheme: &'static str, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// `scheme://host:port/path`, with `path` used as-is (sanitized
    /// separately by the HTTP transport, per §4.5).
    pub fn url_for_path(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, path)
    }
}

/// Submit a request, report success/error via callbacks, query pending
/// request count. Implemented by `VstConnection` and `HttpConnection`.
pub trait Connection: Send + Sync {
    /// Assigns a `MessageId`, enqueues the request, and returns
    /// immediately. Exactly one of `on_error`/`on_success` is invoked
    /// exactly once.
    fn send_request(&self, request: Request, on_error: OnError, on_success: OnSuccess) -> MessageId;

    /// Submit synchronously, blocking the calling thread until the
    /// terminal callback fires. `HttpConnection` does not implement this
    /// (§4.6) and returns `Error::NotImplemented`.
    fn send_request_sync(&self, request: Request) -> Result<Response, Error>;

    /// Lower bound on pending requests (send queue + in-flight map for
    /// VST; queued + in-progress for HTTP). Used only for idle detection,
    /// never for exact accounting (§4.4).
    fn requests_left(&self) -> usize;
}
