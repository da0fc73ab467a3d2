/*
 * request_item.rs
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

//! Per-request state held by a `VstConnection` for the lifetime of one
//! request (§3, §4.3). A value-object aggregate: moved between the send
//! queue and the in-flight map, never copied, never shared across the two.

use bytes::{Bytes, BytesMut};

use crate::error::Error;
use crate::message_id::MessageId;
use crate::request::Request;
use crate::response::Response;

/// Invoked exactly once, with the original request moved in by value, and
/// either the parsed response or the reported error.
pub type OnSuccess = Box<dyn FnOnce(Request, Response) + Send>;
pub type OnError = Box<dyn FnOnce(Error, Request, Option<Response>) + Send>;

/// State for one in-flight VST request: id, callbacks, encoded wire bytes,
/// and the reassembly buffer plus chunk counters (§3).
pub struct RequestItem {
    pub message_id: MessageId,
    pub request: Request,
    on_error: Option<OnError>,
    on_success: Option<OnSuccess>,
    /// Encoded wire bytes for this request; released once the write
    /// completes (set to `None`).
    pub request_buffer: Option<Bytes>,
    /// Growing reassembly buffer for the response.
    pub response_buffer: BytesMut,
    /// Declared total response length; valid only once the first chunk of
    /// a multi-chunk response has arrived.
    pub response_length: Option<u64>,
    /// Expected chunk count for a multi-chunk response.
    pub response_chunks: u32,
    /// Next expected 1-based chunk index (§9: this crate counts 1-based
    /// consistently end to end).
    pub response_chunk: u32,
}

impl RequestItem {
    pub fn new(
        message_id: MessageId,
        request: Request,
        request_buffer: Bytes,
        on_error: OnError,
        on_success: OnSuccess,
    ) -> Self {
        Self {
            message_id,
            request,
            on_error: Some(on_error),
            on_success: Some(on_success),
            request_buffer: Some(request_buffer),
            response_buffer: BytesMut::new(),
            response_length: None,
            response_chunks: 0,
            response_chunk: 0,
        }
    }

    /// Release the encoded wire bytes after a successful write (§3
    /// invariant: non-empty after encode, released before the success
    /// callback runs).
    pub fn release_request_buffer(&mut self) {
        self.request_buffer = None;
    }

    /// Invoke the success callback. Consumes the item; the error callback
    /// becomes unreachable afterward (exactly one callback per request).
    pub fn complete_success(mut self, response: Response) {
        if let Some(cb) = self.on_success.take() {
            cb(self.request, response);
        }
    }

    /// Invoke the error callback with whatever partial response (if any)
    /// had been collected.
    pub fn complete_error(mut self, error: Error, response: Option<Response>) {
        if let Some(cb) = self.on_error.take() {
            cb(error, self.request, response);
        }
    }
}

impl std::fmt::Debug for RequestItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestItem")
            .field("message_id", &self.message_id)
            .field("response_length", &self.response_length)
            .field("response_chunks", &self.response_chunks)
            .field("response_chunk", &self.response_chunk)
            .finish()
    }
}
