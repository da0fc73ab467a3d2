/*
 * message_id.rs
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

//! `MessageId`: a 64-bit monotonically increasing request identifier. Zero
//! is never allocated. VST allocates from a per-connection counter; HTTP
//! allocates from a single process-wide counter (§3).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque monotonic request id, returned from `send_request` and echoed
/// back on the request passed to the terminal callback.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Wrap a raw id read off the wire (e.g. a VST chunk header's
    /// `message_id` field). Does not allocate; use `MessageIdAllocator` to
    /// mint new ids.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic allocator for `MessageId`s. One instance per `VstConnection`;
/// a single process-wide instance (behind a `static`) for HTTP, per §3.
#[derive(Debug, Default)]
pub struct MessageIdAllocator {
    next: AtomicU64,
}

impl MessageIdAllocator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next id. Never returns `MessageId(0)`.
    pub fn allocate(&self) -> MessageId {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        MessageId(id)
    }
}

/// Process-wide allocator backing `HttpMultiplexer::queue_request`.
static HTTP_MESSAGE_IDS: MessageIdAllocator = MessageIdAllocator::new();

/// Allocate the next process-wide `MessageId` for an HTTP request.
pub fn next_http_message_id() -> MessageId {
    HTTP_MESSAGE_IDS.allocate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_is_monotonic_and_never_zero() {
        let alloc = MessageIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_eq!(a.value(), 1);
        assert_eq!(b.value(), 2);
        assert!(a.value() != 0);
    }

    #[test]
    fn http_allocator_is_process_wide() {
        let a = next_http_message_id();
        let b = next_http_message_id();
        assert!(b.value() > a.value());
    }
}
