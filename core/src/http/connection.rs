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

//! `HttpConnection`: the `Connection` adapter in front of an
//! `HttpMultiplexer`. Several `HttpConnection`s backed by the same
//! destination can share one multiplexer (and therefore one driver
//! thread) — the multiplexer, not the connection, owns curl state.

use std::sync::Arc;

use crate::connection::{Connection, Destination};
use crate::error::Error;
use crate::message_id::MessageId;
use crate::request::Request;
use crate::request_item::{OnError, OnSuccess};
use crate::response::Response;

use super::multiplexer::HttpMultiplexer;

pub struct HttpConnection {
    destination: Destination,
    multiplexer: Arc<HttpMultiplexer>,
}

impl HttpConnection {
    pub fn new(destination: Destination, multiplexer: Arc<HttpMultiplexer>) -> Self {
        Self {
            destination,
            multiplexer,
        }
    }
}

impl Connection for HttpConnection {
    fn send_request(&self, request: Request, on_error: OnError, on_success: OnSuccess) -> MessageId {
        self.multiplexer
            .queue_request(self.destination.clone(), request, on_error, on_success)
    }

    /// Unlike VST, HTTP has no blocking path into libcurl's multi API in
    /// this design (§4.6): the driver loop is the only thing that ever
    /// calls into curl, so a synchronous call would need its own
    /// condvar-based wait exactly like `VstConnection::send_request_sync`,
    /// but with no natural place to hang it that wouldn't risk deadlocking
    /// the one thread driving `work_once`. Left unimplemented rather than
    /// built on a design that could stall every other pending HTTP request.
    fn send_request_sync(&self, _request: Request) -> Result<Response, Error> {
        Err(Error::NotImplemented)
    }

    fn requests_left(&self) -> usize {
        self.multiplexer.requests_left()
    }
}
