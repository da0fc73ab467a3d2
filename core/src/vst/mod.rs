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

//! `VstConnection`: single-socket pipelined async VST transport (§4.4).
//!
//! One writer task and one reader task are spawned per live socket and
//! drive the send queue / in-flight map exclusively; `send_request` never
//! touches the socket directly, only the queue and a `Notify` wake-up,
//! which is the Rust-idiomatic realization of the source's "only dispatch
//! start_write/start_read when observed idle" discipline: a persistent
//! loop task naturally processes one operation at a time instead of being
//! re-entered from each call site.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::time::timeout;

use crate::chunk::{ChunkCodec, ParsedChunkHeader};
use crate::config::ConnectionConfiguration;
use crate::connection::Connection;
use crate::error::Error;
use crate::message_codec::MessageCodec;
use crate::message_id::MessageIdAllocator;
use crate::net::{self, PlainStream, TlsStreamWrapper};
use crate::payload::{DefaultPayloadValidator, PayloadValidator};
use crate::request::Request;
use crate::request_item::{OnError, OnSuccess, RequestItem};
use crate::response::{Response, ResponseHeader};
pub use crate::message_id::MessageId;

const READ_DEADLINE: Duration = Duration::from_secs(30);
const CONNECT_DEADLINE: Duration = Duration::from_secs(60);
/// Minimum read chunk; the reader loop asks for at least this many bytes
/// per `poll_read`, per §4.4 "Read discipline".
const READ_BUF_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum ConnState {
    Disconnected,
    Connecting,
    Handshaking,
    Connected,
}

/// Either transport stream a VST socket can be (§6 `ssl` config flag).
enum VstStream {
    Plain(PlainStream),
    Tls(TlsStreamWrapper),
}

impl AsyncRead for VstStream {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut() {
            VstStream::Plain(s) => std::pin::Pin::new(s).poll_read(cx, buf),
            VstStream::Tls(s) => std::pin::Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for VstStream {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        match self.get_mut() {
            VstStream::Plain(s) => std::pin::Pin::new(s).poll_write(cx, buf),
            VstStream::Tls(s) => std::pin::Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut() {
            VstStream::Plain(s) => std::pin::Pin::new(s).poll_flush(cx),
            VstStream::Tls(s) => std::pin::Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        match self.get_mut() {
            VstStream::Plain(s) => std::pin::Pin::new(s).poll_shutdown(cx),
            VstStream::Tls(s) => std::pin::Pin::new(s).poll_shutdown(cx),
        }
    }
}

struct Inner {
    config: ConnectionConfiguration,
    message_ids: MessageIdAllocator,
    send_queue: std::sync::Mutex<VecDeque<RequestItem>>,
    in_flight: std::sync::Mutex<HashMap<u64, RequestItem>>,
    connected: AtomicBool,
    reading: AtomicBool,
    please_stop: AtomicBool,
    connecting: AtomicBool,
    state: std::sync::Mutex<ConnState>,
    writer: AsyncMutex<Option<WriteHalf<VstStream>>>,
    reader: AsyncMutex<Option<ReadHalf<VstStream>>>,
    write_notify: Notify,
    read_notify: Notify,
    validator: DefaultPayloadValidator,
    runtime: Option<tokio::runtime::Runtime>,
    handle: tokio::runtime::Handle,
}

/// Single-socket pipelined VST transport. One writer task, one reader
/// task; unbounded enqueue concurrency from `send_request` (§4.4).
pub struct VstConnection {
    inner: Arc<Inner>,
}

impl VstConnection {
    /// Resolve `host:port` synchronously (the one DNS lookup the spec
    /// allows at construction, §1) and build a disconnected connection.
    /// The actual socket connects lazily on the first `send_request`.
    pub fn new(config: ConnectionConfiguration) -> Result<Self, Error> {
        let port = config.port_u16()?;
        resolve_once(config.host(), port)?;

        let (runtime, handle) = match tokio::runtime::Handle::try_current() {
            Ok(handle) => (None, handle),
            Err(_) => {
                let rt = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .worker_threads(2)
                    .build()
                    .map_err(|e| Error::Configuration(e.to_string()))?;
                let handle = rt.handle().clone();
                (Some(rt), handle)
            }
        };

        let inner = Arc::new(Inner {
            config,
            message_ids: MessageIdAllocator::new(),
            send_queue: std::sync::Mutex::new(VecDeque::new()),
            in_flight: std::sync::Mutex::new(HashMap::new()),
            connected: AtomicBool::new(false),
            reading: AtomicBool::new(false),
            please_stop: AtomicBool::new(false),
            connecting: AtomicBool::new(false),
            state: std::sync::Mutex::new(ConnState::Disconnected),
            writer: AsyncMutex::new(None),
            reader: AsyncMutex::new(None),
            write_notify: Notify::new(),
            read_notify: Notify::new(),
            validator: DefaultPayloadValidator,
            runtime,
            handle,
        });
        Ok(Self { inner })
    }

    fn encode_request(request: &Request, max_chunk_size: usize) -> Result<Bytes, Error> {
        let id = request
            .message_id()
            .expect("message id assigned before encode");
        let wire = MessageCodec::to_network(request)?;
        let chunks = ChunkCodec::encode(id, &wire, max_chunk_size);
        let mut buf = BytesMut::with_capacity(wire.len() + 24 * chunks.len());
        for c in chunks {
            buf.extend_from_slice(&c);
        }
        Ok(buf.freeze())
    }

    fn trigger_reconnect(&self) {
        if self.inner.connecting.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = self.inner.clone();
        inner.handle.spawn(async move {
            Inner::connect_and_run(inner.clone()).await;
        });
    }

    async fn connect_and_run(inner: Arc<Inner>) {
        *inner.state.lock().unwrap() = ConnState::Connecting;
        log::debug!(
            "vst: connecting to {}:{} (ssl={})",
            inner.config.host(),
            inner.config.port(),
            inner.config.is_ssl()
        );
        let attempt = async {
            if inner.config.is_ssl() {
                *inner.state.lock().unwrap() = ConnState::Handshaking;
                let port = inner.config.port_u16()?;
                let stream = net::connect_tls(inner.config.host(), port)
                    .await
                    .map_err(|e| Error::CouldNotConnect(e.to_string()))?;
                Ok::<VstStream, Error>(VstStream::Tls(stream))
            } else {
                let port = inner.config.port_u16()?;
                let stream = net::connect_plain(inner.config.host(), port)
                    .await
                    .map_err(|e| Error::CouldNotConnect(e.to_string()))?;
                Ok(VstStream::Plain(stream))
            }
        };

        let result = timeout(CONNECT_DEADLINE, attempt).await;
        let stream = match result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                log::warn!("vst: connect failed: {e}");
                Inner::fail_connect(&inner, e);
                return;
            }
            Err(_) => {
                log::warn!("vst: connect timed out after {CONNECT_DEADLINE:?}");
                Inner::fail_connect(&inner, Error::Timeout);
                return;
            }
        };

        let (read_half, write_half) = tokio::io::split(stream);
        *inner.reader.lock().await = Some(read_half);
        *inner.writer.lock().await = Some(write_half);
        inner.please_stop.store(false, Ordering::SeqCst);
        inner.connected.store(true, Ordering::SeqCst);
        *inner.state.lock().unwrap() = ConnState::Connected;
        inner.connecting.store(false, Ordering::SeqCst);
        log::debug!("vst: connected to {}:{}", inner.config.host(), inner.config.port());

        inner.handle.spawn(Inner::writer_loop(inner.clone()));
        inner.handle.spawn(Inner::reader_loop(inner.clone()));

        // "start_write(possibly_empty=true)" / start_read on the Connected
        // transition: wake both loops so any requests that queued up while
        // disconnected get dispatched immediately.
        inner.write_notify.notify_one();
        inner.read_notify.notify_one();
    }
}

impl Inner {
    fn fail_connect(inner: &Arc<Inner>, error: Error) {
        inner.connecting.store(false, Ordering::SeqCst);
        *inner.state.lock().unwrap() = ConnState::Disconnected;
        // No retry policy at this layer (§7): a failed connect attempt
        // fails every request that was waiting for it rather than
        // retrying silently forever.
        let items: Vec<RequestItem> = inner.send_queue.lock().unwrap().drain(..).collect();
        for item in items {
            item.complete_error(
                Error::CouldNotConnect(error.to_string()),
                None,
            );
        }
    }

    /// Idempotent cancellation path (§5 "Cancellation"). Closes the
    /// socket, fails every in-flight request with
    /// `VstCanceledDuringReset`, and leaves the send queue untouched so a
    /// fresh connection can pick it up.
    fn shutdown(inner: &Arc<Inner>, reason: Error) {
        if inner.please_stop.swap(true, Ordering::SeqCst) {
            return;
        }
        log::warn!("vst: shutting down connection: {reason}");
        inner.connected.store(false, Ordering::SeqCst);
        inner.reading.store(false, Ordering::SeqCst);
        *inner.state.lock().unwrap() = ConnState::Disconnected;

        let items: Vec<RequestItem> = inner.in_flight.lock().unwrap().drain().map(|(_, v)| v).collect();
        for item in items {
            item.complete_error(Error::VstCanceledDuringReset, None);
        }

        inner.write_notify.notify_waiters();
        inner.read_notify.notify_waiters();
        inner.connecting.store(false, Ordering::SeqCst);
        // Allow the next send_request to reconnect.
        inner.please_stop.store(false, Ordering::SeqCst);
    }

    async fn writer_loop(inner: Arc<Inner>) {
        loop {
            if !inner.connected.load(Ordering::SeqCst) {
                return;
            }
            let buf = {
                let q = inner.send_queue.lock().unwrap();
                q.front().and_then(|item| item.request_buffer.clone())
            };
            let Some(buf) = buf else {
                inner.write_notify.notified().await;
                continue;
            };

            let mut writer = match inner.writer.lock().await.take() {
                Some(w) => w,
                None => return,
            };
            log::trace!("vst: dispatching write of {} bytes", buf.len());
            let result = writer.write_all(&buf).await;
            *inner.writer.lock().await = Some(writer);

            match result {
                Ok(()) => {
                    let mut item = {
                        let mut q = inner.send_queue.lock().unwrap();
                        q.pop_front().expect("front observed non-empty above")
                    };
                    item.release_request_buffer();
                    let id = item.message_id;
                    inner.in_flight.lock().unwrap().insert(id.value(), item);
                    log::debug!("vst: request {id} in flight after write completed");
                    inner.read_notify.notify_one();
                }
                Err(e) => {
                    log::warn!("vst: write error: {e}");
                    Inner::shutdown(&inner, Error::VstWriteError(e.to_string()));
                    return;
                }
            }
        }
    }

    async fn reader_loop(inner: Arc<Inner>) {
        let mut buf = BytesMut::with_capacity(READ_BUF_SIZE);
        loop {
            if !inner.connected.load(Ordering::SeqCst) {
                return;
            }
            let pending = {
                let q_len = inner.send_queue.lock().unwrap().len();
                let m_len = inner.in_flight.lock().unwrap().len();
                q_len > 0 || m_len > 0
            };
            if !pending {
                inner.reading.store(false, Ordering::SeqCst);
                inner.read_notify.notified().await;
                continue;
            }
            inner.reading.store(true, Ordering::SeqCst);

            let mut reader = match inner.reader.lock().await.take() {
                Some(r) => r,
                None => return,
            };
            let mut chunk = [0u8; READ_BUF_SIZE];
            let read_result = timeout(READ_DEADLINE, reader.read(&mut chunk)).await;
            *inner.reader.lock().await = Some(reader);

            let n = match read_result {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    log::warn!("vst: read error: {e}");
                    Inner::shutdown(&inner, Error::VstReadError(e.to_string()));
                    return;
                }
                Err(_) => {
                    log::warn!("vst: read deadline expired after {READ_DEADLINE:?}");
                    Inner::shutdown(&inner, Error::Timeout);
                    return;
                }
            };

            if n == 0 {
                log::warn!("vst: peer closed the connection with requests outstanding");
                Inner::shutdown(&inner, Error::VstReadError("connection closed by peer".into()));
                return;
            }

            buf.extend_from_slice(&chunk[..n]);
            while ChunkCodec::is_chunk_complete(&buf) {
                let header = match ChunkCodec::read_chunk_header(&buf) {
                    Ok(h) => h,
                    Err(e) => {
                        log::error!("vst: {e}");
                        Inner::shutdown(&inner, e);
                        return;
                    }
                };
                let total = header.chunk_length as usize;
                if buf.len() < total {
                    break;
                }
                let chunk_bytes = buf.split_to(total).freeze();
                if let Err(e) = Inner::process_chunk(&inner, header, chunk_bytes) {
                    log::error!("vst: {e}");
                    Inner::shutdown(&inner, e);
                    return;
                }
            }
        }
    }

    fn process_chunk(
        inner: &Arc<Inner>,
        header: ParsedChunkHeader,
        chunk_bytes: Bytes,
    ) -> Result<(), Error> {
        let id = header.message_id.value();
        let payload = chunk_bytes.slice(header.chunk_header_length..chunk_bytes.len());

        let finished = {
            let mut map = inner.in_flight.lock().unwrap();
            let item = map.get_mut(&id).ok_or_else(|| {
                Error::ProtocolError(format!("unsolicited chunk for unknown message id {id}"))
            })?;
            item.response_buffer.extend_from_slice(&payload);
            if header.is_single {
                true
            } else if header.is_first {
                item.response_length = header.total_message_length;
                item.response_chunks = header.number_of_chunks;
                item.response_chunk = 1;
                false
            } else {
                if header.chunk_index != item.response_chunk {
                    return Err(Error::ProtocolError(format!(
                        "out-of-order chunk for message {id}: expected index {}, got {}",
                        item.response_chunk, header.chunk_index
                    )));
                }
                item.response_chunk += 1;
                item.response_chunk == item.response_chunks
            }
        };

        if finished {
            let item = inner
                .in_flight
                .lock()
                .unwrap()
                .remove(&id)
                .expect("item observed present above; only this reader task removes entries");
            Inner::finalize(item, &inner.validator);
        }
        Ok(())
    }

    fn finalize(mut item: RequestItem, validator: &dyn PayloadValidator) {
        if let Some(len) = item.response_length {
            item.response_buffer.truncate(len as usize);
        }
        let buf = item.response_buffer.clone().freeze();
        match MessageCodec::validate_and_extract_message_header(&buf) {
            Ok((header, consumed)) => {
                let mut resp_header = ResponseHeader::new();
                resp_header.response_code = header.response_code;
                resp_header.content_type = header.content_type.clone();
                resp_header.headers = header
                    .headers
                    .into_iter()
                    .map(|(k, v)| (k.to_ascii_lowercase(), v))
                    .collect();
                let payload_bytes = buf.slice(consumed..);
                let content_type = resp_header.content_type.clone().unwrap_or_default();
                let payload = validator.classify(&content_type, payload_bytes);
                let message_id = item.message_id;
                item.complete_success(Response::new(resp_header, message_id, payload));
            }
            Err(e) => item.complete_error(e, None),
        }
    }
}

impl Connection for VstConnection {
    fn send_request(&self, mut request: Request, on_error: OnError, on_success: OnSuccess) -> MessageId {
        let id = self.inner.message_ids.allocate();
        request.assign_message_id(id);

        let buffer = match Self::encode_request(&request, self.inner.config.max_chunk_size_bytes()) {
            Ok(b) => b,
            Err(e) => {
                on_error(e, request, None);
                return id;
            }
        };

        let item = RequestItem::new(id, request, buffer, on_error, on_success);
        let was_empty = {
            let mut q = self.inner.send_queue.lock().unwrap();
            let was_empty = q.is_empty();
            q.push_back(item);
            was_empty
        };

        if self.inner.connected.load(Ordering::SeqCst) {
            if was_empty {
                self.inner.write_notify.notify_one();
            }
            if !self.inner.reading.load(Ordering::SeqCst) {
                self.inner.read_notify.notify_one();
            }
        } else {
            self.trigger_reconnect();
        }
        id
    }

    fn send_request_sync(&self, request: Request) -> Result<Response, Error> {
        let (tx, rx) = std::sync::mpsc::channel();
        let tx_ok = tx.clone();
        self.send_request(
            request,
            Box::new(move |err, _req, _resp| {
                let _ = tx.send(Err(err));
            }),
            Box::new(move |_req, resp| {
                let _ = tx_ok.send(Ok(resp));
            }),
        );
        rx.recv().unwrap_or(Err(Error::VstCanceledDuringReset))
    }

    fn requests_left(&self) -> usize {
        let queued = self.inner.send_queue.lock().unwrap().len();
        let in_flight = self.inner.in_flight.lock().unwrap().len();
        queued + in_flight
    }
}

fn resolve_once(host: &str, port: u16) -> Result<(), Error> {
    use std::net::ToSocketAddrs;
    let target = format!("{host}:{port}");
    let mut addrs = target
        .to_socket_addrs()
        .map_err(|e| Error::Configuration(format!("DNS resolution failed for {target}: {e}")))?;
    addrs
        .next()
        .ok_or_else(|| Error::Configuration(format!("no addresses resolved for {target}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_once_accepts_loopback() {
        resolve_once("127.0.0.1", 8529).unwrap();
    }

    #[test]
    fn resolve_once_rejects_unresolvable_host() {
        let err = resolve_once("this-host-does-not-resolve.invalid", 1).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
