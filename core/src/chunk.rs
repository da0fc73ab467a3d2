/*
 * chunk.rs
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

//! VST v1.0 chunk framing (§3, §4.1): encode a message into one or more
//! chunks, and decode chunk headers out of a possibly-interleaved byte
//! stream.
//!
//! `chunk_x` packs the first-chunk flag into its low bit; the remaining 31
//! bits hold `number_of_chunks` on the first chunk of a message, or the
//! 1-based `chunk_index` on any later chunk. This crate counts
//! `chunk_index`/`response_chunk` consistently 1-based end to end (the
//! reference implementation mixes 0- and 1-based counting across the
//! assertion in its reassembly loop; we pick one convention and keep it,
//! per the open question in the design notes).

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Error;
use crate::message_id::MessageId;

/// 4 (chunk_length) + 4 (chunk_x) + 8 (message_id).
const MIN_HEADER_LEN: usize = 16;
/// `MIN_HEADER_LEN` + 8 (total_message_length), present on the first chunk
/// of a multi-chunk message.
const FIRST_MULTI_HEADER_LEN: usize = 24;

/// A chunk header as parsed off the wire (§3 `ChunkHeader`).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ParsedChunkHeader {
    pub chunk_length: u32,
    pub chunk_header_length: usize,
    pub message_id: MessageId,
    /// Valid only when `is_first`; the total chunk count for the message.
    pub number_of_chunks: u32,
    /// Valid only when `!is_first`; the 1-based position of this chunk.
    pub chunk_index: u32,
    pub is_first: bool,
    pub is_single: bool,
    pub total_message_length: Option<u64>,
}

impl ParsedChunkHeader {
    pub fn chunk_payload_length(&self) -> usize {
        self.chunk_length as usize - self.chunk_header_length
    }
}

/// Encode/decode VST v1.0 chunks.
pub struct ChunkCodec;

impl ChunkCodec {
    /// True iff at least 4 bytes are present and the declared `chunk_length`
    /// fits within `buf` (§4.1).
    pub fn is_chunk_complete(buf: &[u8]) -> bool {
        if buf.len() < 4 {
            return false;
        }
        let chunk_length = LittleEndian::read_u32(&buf[0..4]) as usize;
        chunk_length <= buf.len()
    }

    /// Parse the header prefix of one chunk. `buf` must contain at least
    /// the full chunk (callers check `is_chunk_complete` first).
    pub fn read_chunk_header(buf: &[u8]) -> Result<ParsedChunkHeader, Error> {
        if buf.len() < MIN_HEADER_LEN {
            return Err(Error::ProtocolError(format!(
                "chunk shorter than minimum header ({} < {})",
                buf.len(),
                MIN_HEADER_LEN
            )));
        }
        let chunk_length = LittleEndian::read_u32(&buf[0..4]);
        if (chunk_length as usize) < MIN_HEADER_LEN {
            return Err(Error::ProtocolError(format!(
                "chunk_length {} below minimum header size",
                chunk_length
            )));
        }
        let chunk_x = LittleEndian::read_u32(&buf[4..8]);
        let is_first = chunk_x & 1 == 1;
        let n = chunk_x >> 1;
        let message_id = MessageId::from_raw(LittleEndian::read_u64(&buf[8..16]));

        let (chunk_header_length, number_of_chunks, chunk_index, total_message_length, is_single) =
            if is_first && n > 1 {
                if buf.len() < FIRST_MULTI_HEADER_LEN {
                    return Err(Error::ProtocolError(
                        "first chunk of multi-chunk message missing total_message_length".into(),
                    ));
                }
                let total = LittleEndian::read_u64(&buf[16..24]);
                (FIRST_MULTI_HEADER_LEN, n, 0, Some(total), false)
            } else if is_first {
                (MIN_HEADER_LEN, 1, 0, None, true)
            } else {
                (MIN_HEADER_LEN, 0, n, None, false)
            };

        if (chunk_length as usize) < chunk_header_length {
            return Err(Error::ProtocolError(format!(
                "chunk_length {} below this chunk's header length {}",
                chunk_length, chunk_header_length
            )));
        }

        Ok(ParsedChunkHeader {
            chunk_length,
            chunk_header_length,
            message_id,
            number_of_chunks,
            chunk_index,
            is_first,
            is_single,
            total_message_length,
        })
    }

    /// Encode `payload` addressed to `message_id` into one or more wire
    /// chunks, each capped at `max_chunk_size` bytes (including its own
    /// header). Returns the chunks in send order.
    pub fn encode(message_id: MessageId, payload: &[u8], max_chunk_size: usize) -> Vec<Bytes> {
        if payload.len() + MIN_HEADER_LEN <= max_chunk_size {
            let mut buf = BytesMut::with_capacity(MIN_HEADER_LEN + payload.len());
            let chunk_length = (MIN_HEADER_LEN + payload.len()) as u32;
            buf.put_u32_le(chunk_length);
            buf.put_u32_le(encode_chunk_x(true, 1));
            buf.put_u64_le(message_id.value());
            buf.put_slice(payload);
            return vec![buf.freeze()];
        }

        let first_capacity = max_chunk_size.saturating_sub(FIRST_MULTI_HEADER_LEN).max(1);
        let rest_capacity = max_chunk_size.saturating_sub(MIN_HEADER_LEN).max(1);

        let remaining_after_first = payload.len().saturating_sub(first_capacity);
        let rest_chunk_count = if remaining_after_first == 0 {
            0
        } else {
            (remaining_after_first + rest_capacity - 1) / rest_capacity
        };
        let number_of_chunks = 1 + rest_chunk_count;

        let mut chunks = Vec::with_capacity(number_of_chunks);
        let mut offset = 0usize;

        let first_len = first_capacity.min(payload.len());
        let mut buf = BytesMut::with_capacity(FIRST_MULTI_HEADER_LEN + first_len);
        buf.put_u32_le((FIRST_MULTI_HEADER_LEN + first_len) as u32);
        buf.put_u32_le(encode_chunk_x(true, number_of_chunks as u32));
        buf.put_u64_le(message_id.value());
        buf.put_u64_le(payload.len() as u64);
        buf.put_slice(&payload[offset..offset + first_len]);
        chunks.push(buf.freeze());
        offset += first_len;

        let mut chunk_index = 1u32;
        while offset < payload.len() {
            let len = rest_capacity.min(payload.len() - offset);
            let mut buf = BytesMut::with_capacity(MIN_HEADER_LEN + len);
            buf.put_u32_le((MIN_HEADER_LEN + len) as u32);
            buf.put_u32_le(encode_chunk_x(false, chunk_index));
            buf.put_u64_le(message_id.value());
            buf.put_slice(&payload[offset..offset + len]);
            chunks.push(buf.freeze());
            offset += len;
            chunk_index += 1;
        }

        chunks
    }
}

fn encode_chunk_x(is_first: bool, n: u32) -> u32 {
    (n << 1) | (is_first as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concat(chunks: &[Bytes]) -> Vec<u8> {
        chunks.iter().flat_map(|c| c.to_vec()).collect()
    }

    #[test]
    fn single_chunk_round_trip() {
        let id = MessageId::from_raw(7);
        let payload = b"hello world";
        let chunks = ChunkCodec::encode(id, payload, 30_000);
        assert_eq!(chunks.len(), 1);
        let bytes = &chunks[0];
        assert!(ChunkCodec::is_chunk_complete(bytes));
        let header = ChunkCodec::read_chunk_header(bytes).unwrap();
        assert!(header.is_single);
        assert!(header.is_first);
        assert_eq!(header.number_of_chunks, 1);
        assert_eq!(header.message_id.value(), 7);
        assert_eq!(header.chunk_header_length, 16);
        assert_eq!(header.chunk_payload_length(), payload.len());
        let body = &bytes[header.chunk_header_length..];
        assert_eq!(body, payload);
    }

    #[test]
    fn multi_chunk_round_trip_is_identity() {
        let id = MessageId::from_raw(42);
        let payload: Vec<u8> = (0..6000u32).map(|i| (i % 251) as u8).collect();
        // 24-byte first header + 16-byte rest headers, cap small enough to force 3 chunks.
        let chunks = ChunkCodec::encode(id, &payload, 2024);
        assert_eq!(chunks.len(), 3);

        let first = ChunkCodec::read_chunk_header(&chunks[0]).unwrap();
        assert!(first.is_first);
        assert!(!first.is_single);
        assert_eq!(first.number_of_chunks, 3);
        assert_eq!(first.total_message_length, Some(payload.len() as u64));

        let mut reassembled = Vec::new();
        let mut expected_index = 1u32;
        for (i, chunk) in chunks.iter().enumerate() {
            let header = ChunkCodec::read_chunk_header(chunk).unwrap();
            if i > 0 {
                assert_eq!(header.chunk_index, expected_index);
                expected_index += 1;
            }
            let start = header.chunk_header_length;
            reassembled.extend_from_slice(&chunk[start..start + header.chunk_payload_length()]);
        }
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn malformed_chunk_length_is_protocol_error() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(4); // below minimum header size
        buf.put_u32_le(0);
        buf.put_u64_le(0);
        let err = ChunkCodec::read_chunk_header(&buf).unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }

    #[test]
    fn is_chunk_complete_requires_full_declared_length() {
        let id = MessageId::from_raw(1);
        let chunks = ChunkCodec::encode(id, b"x", 30_000);
        let full = &chunks[0];
        assert!(ChunkCodec::is_chunk_complete(full));
        assert!(!ChunkCodec::is_chunk_complete(&full[..full.len() - 1]));
    }

    #[test]
    fn encode_then_concat_matches_single_buffer_of_same_bytes() {
        let id = MessageId::from_raw(99);
        let payload = vec![1u8; 5000];
        let chunks = ChunkCodec::encode(id, &payload, 2016);
        let all = concat(&chunks);
        assert!(all.len() > payload.len()); // headers add overhead
    }
}
