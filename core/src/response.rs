/*
 * response.rs
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

//! External `Response` data model, constructed by the core (§3).

use std::collections::HashMap;

use crate::message_id::MessageId;
use crate::payload::DocumentPayload;

/// `Response::header` (§3). `response_code` is unset for VST responses
/// (the reference protocol does not carry an HTTP-style status line);
/// HTTP always fills it from `CURLINFO_RESPONSE_CODE`.
#[derive(Debug, Clone)]
pub struct ResponseHeader {
    pub response_code: Option<u32>,
    pub content_type: Option<String>,
    /// Lowercased header names; duplicate names accumulate as multiple
    /// entries in insertion order (§4.5 "Header collection").
    pub headers: Vec<(String, String)>,
}

impl ResponseHeader {
    pub fn new() -> Self {
        Self {
            response_code: None,
            content_type: None,
            headers: Vec::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let lname = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == lname)
            .map(|(_, v)| v.as_str())
    }
}

impl Default for ResponseHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// A completed response, constructed by the core and handed to `on_success`.
#[derive(Debug, Clone)]
pub struct Response {
    pub header: ResponseHeader,
    pub message_id: MessageId,
    pub payload: DocumentPayload,
}

impl Response {
    pub fn new(header: ResponseHeader, message_id: MessageId, payload: DocumentPayload) -> Self {
        Self {
            header,
            message_id,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut h = ResponseHeader::new();
        h.headers.push(("content-type".to_string(), "application/json".to_string()));
        assert_eq!(h.header("Content-Type"), Some("application/json"));
        assert_eq!(h.header("missing"), None);
    }
}
