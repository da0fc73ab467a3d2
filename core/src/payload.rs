/*
 * payload.rs
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

//! The payload codec boundary. The dense binary document format (VPack) and
//! its validator are an external collaborator (§1); this crate only
//! classifies a byte slice as "document" or "raw" well enough to hand the
//! right thing to the caller. It never decodes the bytes.

use bytes::Bytes;

/// Content-type string used by the reference implementation for the binary
/// document format ("application/x-velocypack").
pub const DOCUMENT_CONTENT_TYPE: &str = "application/x-velocypack";

/// A response body: either a document-format slice (left opaque for an
/// external parser) or raw bytes.
#[derive(Debug, Clone)]
pub enum DocumentPayload {
    Document(Bytes),
    Raw(Bytes),
}

impl DocumentPayload {
    pub fn as_bytes(&self) -> &Bytes {
        match self {
            DocumentPayload::Document(b) => b,
            DocumentPayload::Raw(b) => b,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, DocumentPayload::Document(_))
    }
}

/// Classifies response bodies as document-format or raw, by content type
/// only; never parses. A real VPack validator can be swapped in by
/// implementing this trait without touching the transport.
pub trait PayloadValidator: Send + Sync {
    fn looks_like_document(&self, content_type: &str) -> bool {
        content_type.eq_ignore_ascii_case(DOCUMENT_CONTENT_TYPE)
    }

    /// Wrap `body` as `Document` or `Raw` depending on `content_type`.
    fn classify(&self, content_type: &str, body: Bytes) -> DocumentPayload {
        if self.looks_like_document(content_type) {
            DocumentPayload::Document(body)
        } else {
            DocumentPayload::Raw(body)
        }
    }
}

/// Default validator matching the reference content-type string exactly.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPayloadValidator;

impl PayloadValidator for DefaultPayloadValidator {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_content_type() {
        let v = DefaultPayloadValidator;
        let body = Bytes::from_static(b"{}");
        assert!(matches!(
            v.classify(DOCUMENT_CONTENT_TYPE, body.clone()),
            DocumentPayload::Document(_)
        ));
        assert!(matches!(v.classify("text/plain", body), DocumentPayload::Raw(_)));
    }
}
