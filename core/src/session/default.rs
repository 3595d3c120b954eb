/*
 * default.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Volley, an asynchronous HTTP client runtime.
 *
 * Volley is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Volley is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Volley.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Process-wide default session, created on first use and torn down explicitly.
//!
//! The default session owns a dedicated multi-thread tokio runtime, so it can be used from
//! threads that have no runtime of their own (the C API, for instance).

use std::io;
use std::sync::Mutex;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::config::SessionConfig;
use crate::session::Session;

/// How long shutdown waits for in-flight requests to deliver their failure.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

struct DefaultSession {
    runtime: Runtime,
    session: Session,
}

static DEFAULT: Mutex<Option<DefaultSession>> = Mutex::new(None);

/// The process-wide session, configured from the environment (`SessionConfig::from_env`).
/// Created on first call; fails only if its runtime cannot be started.
pub fn default_session() -> io::Result<Session> {
    let mut slot = DEFAULT.lock().unwrap_or_else(|p| p.into_inner());
    if let Some(default) = slot.as_ref() {
        return Ok(default.session.clone());
    }
    let runtime = Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("volley-default")
        .enable_all()
        .build()?;
    let session = Session::with_runtime_handle(SessionConfig::from_env(), runtime.handle().clone());
    tracing::debug!("default session started");
    *slot = Some(DefaultSession {
        runtime,
        session: session.clone(),
    });
    Ok(session)
}

/// Tear down the default session: fail every in-flight request with `SessionInvalidated`, wait
/// briefly for their handlers to run, then stop the runtime. A later `default_session()` call
/// starts a fresh one. Must not be called from within an async context.
pub fn shutdown_default_session() {
    let taken = DEFAULT.lock().unwrap_or_else(|p| p.into_inner()).take();
    let Some(DefaultSession { runtime, session }) = taken else {
        return;
    };
    session.invalidate_and_cancel();
    runtime.block_on(async {
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while session.active_request_count().await > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!("default session shut down with requests still active");
        }
        session.callback_queue().barrier().await;
    });
    drop(session);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    tracing::debug!("default session shut down");
}
