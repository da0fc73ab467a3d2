/*
 * multiplexer.rs
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

//! `HttpMultiplexer` (curl-multi style scheduler, §4.5), grounded on
//! `original_source/src/HttpCommunicator.cpp`: one `curl::multi::Multi`
//! drives N concurrent easy-handles, serialized process-wide behind a
//! single mutex (the source's global curl mutex — preserved per the
//! design notes, since curl's multi API documents itself as not safe to
//! call concurrently from independent threads without external locking).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use curl::easy::{Easy2, Handler, List, WriteError};
use curl::multi::{Easy2Handle, Multi};

use crate::config::ConnectionConfiguration;
use crate::connection::Destination;
use crate::error::Error;
use crate::message_id::{next_http_message_id, MessageId};
use crate::payload::{DefaultPayloadValidator, PayloadValidator};
use crate::request::{Request, RestVerb};
use crate::request_item::{OnError, OnSuccess};
use crate::response::{Response, ResponseHeader};

use super::url::create_safe_dotted_curl_url;

/// Collects a response body and its (lowercased) headers off one easy
/// handle. Duplicate header names accumulate as multiple entries,
/// insertion order preserved (§4.5 "Header collection").
#[derive(Default)]
struct Collector {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Handler for Collector {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        self.body.extend_from_slice(data);
        Ok(data.len())
    }

    fn header(&mut self, data: &[u8]) -> bool {
        if let Some(colon) = data.iter().position(|&b| b == b':') {
            let key = String::from_utf8_lossy(&data[..colon]).trim().to_ascii_lowercase();
            let after_colon = &data[colon + 1..];
            let value_bytes = after_colon.get(2..).unwrap_or(&[]);
            let value = String::from_utf8_lossy(value_bytes)
                .trim_end_matches(['\r', '\n'])
                .to_string();
            self.headers.push((key, value));
        }
        true
    }
}

struct InProgress {
    handle: Easy2Handle<Collector>,
    message_id: MessageId,
    request: Option<Request>,
    on_error: Option<OnError>,
    on_success: Option<OnSuccess>,
}

struct NewRequest {
    message_id: MessageId,
    destination: Destination,
    request: Request,
    on_error: OnError,
    on_success: OnSuccess,
}

/// Holds the `curl::multi::Multi` handle and the in-progress map. Only
/// `work_once` ever touches it (§5 "`handles_in_progress` (HTTP) |
/// `work_once` only | no external lock"); it's still wrapped in the
/// process-wide `curl_mutex` below so two `HttpMultiplexer`s (or two
/// callers of the same one) can never call into curl concurrently.
struct MultiState {
    multi: Multi,
    in_progress: HashMap<usize, InProgress>,
    next_token: usize,
}

/// Self-pipe wakeup: the fd pair `wait()` registers with
/// `curl_multi_wait` so `queue_request` can break it out of a blocking
/// wait promptly. Present on unix only; other platforms fall back to
/// `wait()`'s own 1s timeout (§4.5, §9 "Self-pipe wakeup").
#[cfg(unix)]
struct WakePipe {
    read_fd: std::os::unix::io::RawFd,
    write_fd: std::os::unix::io::RawFd,
}

#[cfg(unix)]
impl WakePipe {
    fn new() -> Option<Self> {
        let mut fds = [0i32; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if rc != 0 {
            return None;
        }
        unsafe {
            let flags = libc::fcntl(fds[0], libc::F_GETFL);
            libc::fcntl(fds[0], libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
        Some(Self {
            read_fd: fds[0],
            write_fd: fds[1],
        })
    }

    fn wake(&self) {
        let byte = [1u8];
        unsafe {
            libc::write(self.write_fd, byte.as_ptr() as *const libc::c_void, 1);
        }
    }

    fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            let n = unsafe { libc::read(self.read_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if n <= 0 {
                break;
            }
        }
    }
}

#[cfg(unix)]
impl Drop for WakePipe {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}

/// curl-multi scheduler driving many concurrent HTTP easy-handles behind
/// the same `Connection` callback contract as VST (§4.5).
pub struct HttpMultiplexer {
    config: ConnectionConfiguration,
    state: Mutex<MultiState>,
    new_requests: Mutex<VecDeque<NewRequest>>,
    please_stop: AtomicBool,
    validator: DefaultPayloadValidator,
    #[cfg(unix)]
    wake_pipe: Option<WakePipe>,
}

impl HttpMultiplexer {
    pub fn new(config: ConnectionConfiguration) -> Self {
        Self {
            config,
            state: Mutex::new(MultiState {
                multi: Multi::new(),
                in_progress: HashMap::new(),
                next_token: 1,
            }),
            new_requests: Mutex::new(VecDeque::new()),
            please_stop: AtomicBool::new(false),
            #[cfg(unix)]
            wake_pipe: WakePipe::new(),
        }
    }

    /// Enqueue a request; does not touch curl state (§4.5). Writes one
    /// byte to the self-pipe so a blocked `wait()` returns promptly
    /// instead of waiting out its full 1s timeout.
    pub fn queue_request(
        &self,
        destination: Destination,
        request: Request,
        on_error: OnError,
        on_success: OnSuccess,
    ) -> MessageId {
        let message_id = next_http_message_id();
        self.new_requests.lock().unwrap().push_back(NewRequest {
            message_id,
            destination,
            request,
            on_error,
            on_success,
        });
        #[cfg(unix)]
        if let Some(pipe) = &self.wake_pipe {
            pipe.wake();
        }
        message_id
    }

    pub fn requests_left(&self) -> usize {
        let queued = self.new_requests.lock().unwrap().len();
        let in_progress = self.state.lock().unwrap().in_progress.len();
        queued + in_progress
    }

    /// Materialize queued requests into easy-handles, perform one
    /// non-blocking multi-perform, drain completions, fire callbacks.
    /// Returns the number of transfers still running.
    pub fn work_once(&self) -> Result<usize, Error> {
        let drained: Vec<NewRequest> = {
            let mut q = self.new_requests.lock().unwrap();
            q.drain(..).collect()
        };

        let mut state = self.state.lock().unwrap();
        for new_request in drained {
            let url = new_request
                .destination
                .url_for_path(&create_safe_dotted_curl_url(&new_request.request.header.path));
            match configure_easy(&url, &new_request.request, &self.config) {
                Ok(easy) => {
                    let mut handle = match state.multi.add2(easy) {
                        Ok(h) => h,
                        Err(e) => {
                            (new_request.on_error)(
                                Error::CurlError(e.to_string()),
                                new_request.request,
                                None,
                            );
                            continue;
                        }
                    };
                    let token = state.next_token;
                    state.next_token += 1;
                    if let Err(e) = handle.set_token(token) {
                        log::warn!("http: failed to set handle token: {e}");
                    }
                    state.in_progress.insert(
                        token,
                        InProgress {
                            handle,
                            message_id: new_request.message_id,
                            request: Some(new_request.request),
                            on_error: Some(new_request.on_error),
                            on_success: Some(new_request.on_success),
                        },
                    );
                }
                Err(e) => {
                    (new_request.on_error)(e, new_request.request, None);
                }
            }
        }

        let still_running = state
            .multi
            .perform()
            .map_err(|e| Error::CurlError(e.to_string()))? as usize;

        let mut completed_tokens = Vec::new();
        for message in state.multi.messages() {
            if let Ok(token) = message.token() {
                if let Some(item) = state.in_progress.get(&token) {
                    if let Some(result) = message.result_for2(&item.handle) {
                        completed_tokens.push((token, result));
                    }
                }
            }
        }

        for (token, result) in completed_tokens {
            let Some(mut item) = state.in_progress.remove(&token) else {
                continue;
            };
            let handle = item.handle;
            let easy = match state.multi.remove2(handle) {
                Ok(easy) => easy,
                Err(e) => {
                    log::warn!("http: failed to detach completed easy handle: {e}");
                    continue;
                }
            };
            match result {
                Ok(()) => self.finalize_success(easy, item),
                Err(e) => {
                    let error = classify_curl_error(&e);
                    let request = item.request.take().expect("request present until completion");
                    if let Some(cb) = item.on_error.take() {
                        cb(error, request, None);
                    }
                }
            }
        }

        Ok(still_running)
    }

    fn finalize_success(&self, easy: Easy2<Collector>, mut item: InProgress) {
        let response_code = easy.response_code().unwrap_or(0);
        let collector = easy.get_ref();
        let headers = collector.headers.clone();
        let body = Bytes::copy_from_slice(&collector.body);
        let content_type = headers
            .iter()
            .find(|(k, _)| k == "content-type")
            .map(|(_, v)| v.clone());

        let mut resp_header = ResponseHeader::new();
        resp_header.response_code = Some(response_code);
        resp_header.content_type = content_type.clone();
        resp_header.headers = headers;

        let payload = self
            .validator
            .classify(content_type.as_deref().unwrap_or(""), body);
        let request = item.request.take().expect("request present until completion");
        let response = Response::new(resp_header, item.message_id, payload);
        if let Some(cb) = item.on_success.take() {
            cb(request, response);
        }
    }

    /// Block up to 1s on curl-multi-wait (§4.5). The self-pipe's read end
    /// is registered as an extra poll fd so `queue_request` can wake this
    /// promptly instead of waiting out the full timeout.
    pub fn wait(&self) -> Result<(), Error> {
        let state = self.state.lock().unwrap();
        #[cfg(unix)]
        {
            if let Some(pipe) = &self.wake_pipe {
                let mut wait_fd = curl::multi::WaitFd::new();
                wait_fd.set_fd(pipe.read_fd);
                wait_fd.poll_on_read(true);
                let mut fds = [wait_fd];
                state
                    .multi
                    .wait(&mut fds, Duration::from_secs(1))
                    .map_err(|e| Error::CurlError(e.to_string()))?;
                pipe.drain();
                return Ok(());
            }
        }
        state
            .multi
            .wait(&mut [], Duration::from_secs(1))
            .map_err(|e| Error::CurlError(e.to_string()))?;
        Ok(())
    }

    pub fn stop(&self) {
        self.please_stop.store(true, Ordering::SeqCst);
        #[cfg(unix)]
        if let Some(pipe) = &self.wake_pipe {
            pipe.wake();
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.please_stop.load(Ordering::SeqCst)
    }

    /// `wait()` then `work_once()` in a loop until `stop()` is requested.
    /// The Rust analogue of the reactor thread in §4.7: libcurl's multi
    /// handle is driven synchronously, so it gets its own blocking-task
    /// thread rather than sharing the tokio executor.
    pub fn run_driver_loop(&self) {
        while !self.is_stopping() {
            if let Err(e) = self.wait() {
                log::warn!("http: multi wait failed: {e}");
                break;
            }
            if let Err(e) = self.work_once() {
                log::warn!("http: work_once failed: {e}");
                break;
            }
        }
    }
}

fn configure_easy(
    url: &str,
    request: &Request,
    config: &ConnectionConfiguration,
) -> Result<Easy2<Collector>, Error> {
    let mut easy = Easy2::new(Collector::default());
    easy.url(url).map_err(curl_err)?;

    match request.header.rest_verb {
        RestVerb::Get => {}
        RestVerb::Post => {
            easy.post(true).map_err(curl_err)?;
        }
        other => {
            // PUT/DELETE/HEAD/PATCH/OPTIONS: a custom verb string, never
            // curl's own PUT mode (which injects `Expect: 100-continue`).
            if let Some(verb) = other.custom_request_str() {
                easy.custom_request(verb).map_err(curl_err)?;
            }
        }
    }

    if !request.payload.is_empty() {
        // Sets both CURLOPT_COPYPOSTFIELDS and CURLOPT_POSTFIELDSIZE; the
        // buffer is copied, so `request.payload` need not outlive the call.
        easy.post_fields_copy(&request.payload).map_err(curl_err)?;
    }

    easy.ssl_verify_peer(false).map_err(curl_err)?;
    easy.ssl_verify_host(false).map_err(curl_err)?;

    easy.timeout(Duration::from_millis(config.request_timeout_ms()))
        .map_err(curl_err)?;
    easy.connect_timeout(Duration::from_secs(config.connection_timeout_seconds()))
        .map_err(curl_err)?;

    if !request.header.headers.is_empty() || request.header.content_type.is_some() {
        let mut list = List::new();
        if let Some(ct) = &request.header.content_type {
            list.append(&format!("Content-Type: {ct}")).map_err(curl_err)?;
        }
        for (key, value) in &request.header.headers {
            list.append(&format!("{key}: {value}")).map_err(curl_err)?;
        }
        easy.http_headers(list).map_err(curl_err)?;
    }

    Ok(easy)
}

fn curl_err(e: curl::Error) -> Error {
    Error::CurlError(e.to_string())
}

/// Maps a completed transfer's curl result to the §6 error taxonomy.
fn classify_curl_error(e: &curl::Error) -> Error {
    if e.is_couldnt_connect()
        || e.is_ssl_connect_error()
        || e.is_couldnt_resolve_host()
        || e.is_url_malformat()
        || e.is_send_error()
    {
        Error::CouldNotConnect(e.to_string())
    } else if e.is_operation_timedout() || e.is_recv_error() || e.is_got_nothing() {
        Error::Timeout
    } else {
        Error::CurlError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestHeader;

    /// Scenario e: a PUT with a body gets `CUSTOMREQUEST` rather than
    /// curl's own PUT upload mode (which would auto-inject
    /// `Expect: 100-continue`), and the body is handed to curl via
    /// `post_fields_copy` (COPYPOSTFIELDS + POSTFIELDSIZE together).
    #[test]
    fn put_with_body_configures_custom_request_and_copies_fields() {
        let header = RequestHeader::new(RestVerb::Put, "/_api/document/42")
            .with_content_type("application/json");
        let request = Request::new(header, Bytes::from_static(b"hello"));
        let config = ConnectionConfiguration::new("localhost", "8529");

        assert_eq!(request.header.rest_verb.custom_request_str(), Some("PUT"));
        let easy = configure_easy("http://localhost:8529/_api/document/42", &request, &config);
        assert!(easy.is_ok(), "configure_easy should accept a PUT with a body");
    }

    #[test]
    fn get_with_no_body_does_not_error() {
        let header = RequestHeader::new(RestVerb::Get, "/_api/version");
        let request = Request::new(header, Bytes::new());
        let config = ConnectionConfiguration::new("localhost", "8529");
        let easy = configure_easy("http://localhost:8529/_api/version", &request, &config);
        assert!(easy.is_ok());
    }

    #[test]
    fn requests_left_counts_queued_and_in_progress() {
        let multi = HttpMultiplexer::new(ConnectionConfiguration::new("localhost", "8529"));
        assert_eq!(multi.requests_left(), 0);
        let destination = crate::connection::Destination::new("http", "localhost", 8529);
        let header = RequestHeader::new(RestVerb::Get, "/_api/version");
        let request = Request::new(header, Bytes::new());
        multi.queue_request(
            destination,
            request,
            Box::new(|_err, _req, _resp| {}),
            Box::new(|_req, _resp| {}),
        );
        assert_eq!(multi.requests_left(), 1);
    }
}
