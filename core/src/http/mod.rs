/*
 * mod.rs
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

//! HTTP/1.1 transport (§4.5): a curl-multi scheduler (`HttpMultiplexer`)
//! shared by one or more `HttpConnection`s, plus the URL sanitizer curl's
//! own path collapsing makes necessary.

mod connection;
mod multiplexer;
mod url;

pub use connection::HttpConnection;
pub use multiplexer::HttpMultiplexer;
pub use url::create_safe_dotted_curl_url;
