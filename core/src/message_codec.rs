/*
 * message_codec.rs
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

//! Encodes a `Request` into VST wire form: `message_header_vpack ||
//! payload_bytes` (§4.2). The real VPack header document is out of scope;
//! we model it with a small `serde_json`-encoded struct instead, an
//! explicit substitution documented in DESIGN.md, not a reinterpretation of
//! the header-then-payload wire shape the spec describes.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::request::{Request, RestVerb};

const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
enum MessageType {
    Request = 1,
    Response = 2,
}

/// The small document carried ahead of the payload on the wire (§4.2).
/// `to_network`'s request variant; `validate_and_extract_message_header`
/// also parses the response variant from the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    pub version: u32,
    #[serde(rename = "type")]
    message_type: MessageType,
    pub database: Option<String>,
    pub verb: Option<String>,
    pub path: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub response_code: Option<u32>,
    pub content_type: Option<String>,
}

impl MessageHeader {
    fn for_request(req: &Request) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message_type: MessageType::Request,
            database: req.header.database.clone(),
            verb: Some(verb_str(req.header.rest_verb).to_string()),
            path: Some(req.header.path.clone()),
            parameters: HashMap::new(),
            headers: req.header.headers.clone(),
            response_code: None,
            content_type: req.header.content_type.clone(),
        }
    }
}

fn verb_str(verb: RestVerb) -> &'static str {
    match verb {
        RestVerb::Get => "GET",
        RestVerb::Post => "POST",
        RestVerb::Put => "PUT",
        RestVerb::Delete => "DELETE",
        RestVerb::Head => "HEAD",
        RestVerb::Patch => "PATCH",
        RestVerb::Options => "OPTIONS",
    }
}

/// Encodes VST requests (header document + opaque payload) and parses
/// message headers back out of an assembled VST message.
pub struct MessageCodec;

impl MessageCodec {
    /// Serialize `request` to its full wire form: header document length
    /// prefix, header document, then payload bytes. `to_network` returns a
    /// buffer suitable for `ChunkCodec::encode`.
    pub fn to_network(request: &Request) -> Result<Bytes, Error> {
        let header = MessageHeader::for_request(request);
        let header_bytes = serde_json::to_vec(&header)
            .map_err(|e| Error::ProtocolError(format!("failed to encode message header: {e}")))?;

        let mut buf = BytesMut::with_capacity(4 + header_bytes.len() + request.payload.len());
        buf.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(&header_bytes);
        buf.extend_from_slice(&request.payload);
        Ok(buf.freeze())
    }

    /// Parse the leading message header out of an assembled message body.
    /// Returns the header plus the byte length it consumed; the remainder
    /// of `buf` is the payload.
    pub fn validate_and_extract_message_header(
        buf: &[u8],
    ) -> Result<(MessageHeader, usize), Error> {
        if buf.len() < 4 {
            return Err(Error::ProtocolError(
                "message shorter than header length prefix".into(),
            ));
        }
        let header_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if buf.len() < 4 + header_len {
            return Err(Error::ProtocolError(format!(
                "declared header length {} exceeds message length {}",
                header_len,
                buf.len() - 4
            )));
        }
        let header: MessageHeader = serde_json::from_slice(&buf[4..4 + header_len])
            .map_err(|e| Error::ProtocolError(format!("failed to parse message header: {e}")))?;
        Ok((header, 4 + header_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestHeader;

    #[test]
    fn to_network_then_extract_round_trips_header_and_payload() {
        let req = Request::new(
            RequestHeader::new(RestVerb::Get, "/_api/version")
                .with_database("_system")
                .with_content_type("application/json"),
            Bytes::from_static(b"{}"),
        );
        let wire = MessageCodec::to_network(&req).unwrap();
        let (header, consumed) = MessageCodec::validate_and_extract_message_header(&wire).unwrap();
        assert_eq!(header.path.as_deref(), Some("/_api/version"));
        assert_eq!(header.verb.as_deref(), Some("GET"));
        assert_eq!(header.database.as_deref(), Some("_system"));
        assert_eq!(&wire[consumed..], b"{}");
    }

    #[test]
    fn truncated_message_is_protocol_error() {
        let err = MessageCodec::validate_and_extract_message_header(&[1, 0]).unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }
}
