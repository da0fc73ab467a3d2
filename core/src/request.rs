/*
 * request.rs
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

//! External `Request` data model: a REST-ish header plus an opaque payload.
//! The high-level message/request/response object model is out of scope
//! (§1); this is the small header descriptor the core actually needs.

use std::collections::HashMap;

use bytes::Bytes;

use crate::message_id::MessageId;

/// HTTP-style verb carried on every request, VST or HTTP.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RestVerb {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
    Options,
}

impl RestVerb {
    /// Custom request-verb string for curl's `CUSTOMREQUEST`, or `None` for
    /// the verbs curl has a dedicated option for (GET, POST).
    pub fn custom_request_str(&self) -> Option<&'static str> {
        match self {
            RestVerb::Get | RestVerb::Post => None,
            RestVerb::Put => Some("PUT"),
            RestVerb::Delete => Some("DELETE"),
            RestVerb::Head => Some("HEAD"),
            RestVerb::Patch => Some("PATCH"),
            RestVerb::Options => Some("OPTIONS"),
        }
    }
}

#[cfg(test)]
mod verb_tests {
    use super::*;

    #[test]
    fn get_and_post_use_curls_dedicated_options() {
        assert_eq!(RestVerb::Get.custom_request_str(), None);
        assert_eq!(RestVerb::Post.custom_request_str(), None);
    }

    #[test]
    fn other_verbs_map_to_custom_request() {
        assert_eq!(RestVerb::Put.custom_request_str(), Some("PUT"));
        assert_eq!(RestVerb::Delete.custom_request_str(), Some("DELETE"));
        assert_eq!(RestVerb::Head.custom_request_str(), Some("HEAD"));
        assert_eq!(RestVerb::Patch.custom_request_str(), Some("PATCH"));
        assert_eq!(RestVerb::Options.custom_request_str(), Some("OPTIONS"));
    }
}

/// `Request::header` (§3).
#[derive(Debug, Clone)]
pub struct RequestHeader {
    pub rest_verb: RestVerb,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub content_type: Option<String>,
    /// VST-only: logical database this request targets.
    pub database: Option<String>,
}

impl RequestHeader {
    pub fn new(rest_verb: RestVerb, path: impl Into<String>) -> Self {
        Self {
            rest_verb,
            path: path.into(),
            headers: HashMap::new(),
            content_type: None,
            database: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// A submitted request. `message_id` is assigned by the core at enqueue
/// time (`send_request`), not by the caller.
#[derive(Debug, Clone)]
pub struct Request {
    pub header: RequestHeader,
    pub payload: Bytes,
    pub(crate) message_id: Option<MessageId>,
}

impl Request {
    pub fn new(header: RequestHeader, payload: Bytes) -> Self {
        Self {
            header,
            payload,
            message_id: None,
        }
    }

    /// The id assigned by `send_request`. `None` before submission.
    pub fn message_id(&self) -> Option<MessageId> {
        self.message_id
    }

    pub(crate) fn assign_message_id(&mut self, id: MessageId) {
        self.message_id = Some(id);
    }
}
