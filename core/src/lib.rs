/*
 * lib.rs
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

//! A client driver for a document-oriented database, speaking either VST
//! (a pipelined binary chunk-framing protocol over one TCP/TLS socket) or
//! HTTP/1.1 (multiplexed over libcurl's multi interface), behind one
//! `Connection` trait.
//!
//! Submit a request with `Connection::send_request`; the terminal
//! `on_success`/`on_error` callback fires exactly once, from whichever
//! background task or driver thread completed it. `Connection::send_request_sync`
//! blocks the caller instead, and is only implemented for VST (§4.6).

pub mod chunk;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod message_codec;
pub mod message_id;
pub mod net;
pub mod payload;
pub mod reactor;
pub mod request;
pub mod request_item;
pub mod response;
pub mod vst;

pub use config::ConnectionConfiguration;
pub use connection::{Connection, Destination};
pub use error::Error;
pub use http::{HttpConnection, HttpMultiplexer};
pub use message_id::MessageId;
pub use payload::{DefaultPayloadValidator, DocumentPayload, PayloadValidator};
pub use reactor::Reactor;
pub use request::{Request, RequestHeader, RestVerb};
pub use request_item::{OnError, OnSuccess};
pub use response::{Response, ResponseHeader};
pub use vst::VstConnection;
