/*
 * reactor.rs
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

//! The shared asynchronous I/O executor (§4.7). A thin wrapper over a
//! `tokio::runtime` so `VstConnection` has one place to spawn its
//! read/write chain and shut it down cooperatively; per-socket ordering is
//! a structural property of how `VstConnection` uses `dispatch`, not of the
//! executor itself (each connection drives its own chain of sequential
//! `.await`s from a single owning task, never fanning one socket's
//! callbacks across independent tasks).

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

/// Owns (or borrows) a tokio runtime and exposes `run`/`dispatch`/`stop`.
pub struct Reactor {
    /// `Some` when this `Reactor` created and owns its runtime; `None` when
    /// it wraps an already-running `Handle` (e.g. the caller's own runtime).
    owned: Option<Runtime>,
    handle: Handle,
    please_stop: Arc<AtomicBool>,
}

impl Reactor {
    /// Build a private multi-threaded runtime (used by
    /// `VstConnection::send_request_sync` when no reactor is already
    /// running).
    pub fn new_owned() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self {
            owned: Some(runtime),
            handle,
            please_stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Wrap the handle of an already-running runtime (the common case: the
    /// embedding application already runs one).
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            owned: None,
            handle,
            please_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Schedule `task` to run on the executor. Returns its join handle so
    /// callers that need completion ordering can `.await` it inline from
    /// their own chain (preserving per-socket ordering structurally).
    pub fn dispatch<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(task)
    }

    /// Cooperative shutdown flag; outstanding handlers observe this and
    /// bail out rather than starting new I/O operations.
    pub fn please_stop(&self) -> Arc<AtomicBool> {
        self.please_stop.clone()
    }

    pub fn is_stopping(&self) -> bool {
        self.please_stop.load(Ordering::SeqCst)
    }

    /// Run until `please_stop` is observed. Only meaningful when this
    /// `Reactor` owns its runtime; a no-op otherwise (the caller's runtime
    /// is already running).
    pub fn run(&self) {
        if let Some(runtime) = &self.owned {
            runtime.block_on(async {
                while !self.please_stop.load(Ordering::SeqCst) {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
            });
        }
    }

    /// Cooperative shutdown: flips `please_stop`. Outstanding handlers
    /// observe it on their next suspension point and bail out.
    pub fn stop(&self) {
        self.please_stop.store(true, Ordering::SeqCst);
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}
