/*
 * http.rs
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

//! Built-in transport: each task opens its own HTTP/1.1 connection on a tokio runtime.
//!
//! Task control (resume/suspend/cancel) is published on a `watch` channel. The spawned runner
//! waits while suspended, checks between reads, and races connect/write/read against cancellation.
//! When the runner ends it reports metrics, then completion.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::config::SessionConfig;
use crate::error::TransportError;
use crate::protected::Protected;
use crate::protocol::http::{HttpClient, HttpRequest, Response, ResponseHandler};
use crate::transport::{TaskEvents, TaskId, TaskMetrics, TaskState, Transport, TransportTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Suspended,
    Running,
    Cancelled,
}

/// Transport that performs requests over TCP/TLS with the HTTP/1.1 client.
pub struct HttpTransport {
    handle: Handle,
    connect_timeout: Duration,
}

impl HttpTransport {
    pub fn new(handle: Handle, config: &SessionConfig) -> Self {
        Self {
            handle,
            connect_timeout: config.connect_timeout,
        }
    }
}

impl Transport for HttpTransport {
    fn data_task(&self, id: TaskId, request: HttpRequest, events: TaskEvents) -> Arc<dyn TransportTask> {
        let (control, _) = watch::channel(Control::Suspended);
        Arc::new(HttpTask {
            id,
            shared: Arc::new(TaskShared {
                state: Protected::new(TaskState::Suspended),
                response: Protected::new(None),
            }),
            control,
            pending: Mutex::new(Some(PendingStart {
                request,
                events,
                handle: self.handle.clone(),
                connect_timeout: self.connect_timeout,
            })),
        })
    }
}

/// State visible both to the task handle and to its runner.
struct TaskShared {
    state: Protected<TaskState>,
    response: Protected<Option<Response>>,
}

/// Everything the runner needs; taken on first resume.
struct PendingStart {
    request: HttpRequest,
    events: TaskEvents,
    handle: Handle,
    connect_timeout: Duration,
}

struct HttpTask {
    id: TaskId,
    shared: Arc<TaskShared>,
    control: watch::Sender<Control>,
    pending: Mutex<Option<PendingStart>>,
}

impl HttpTask {
    /// Spawn the runner on first use; later calls find nothing pending.
    fn start_runner(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(start) = pending {
            let rx = self.control.subscribe();
            let shared = self.shared.clone();
            let id = self.id;
            start.handle.spawn(run(id, start.request, start.events, rx, shared, start.connect_timeout));
        }
    }
}

impl TransportTask for HttpTask {
    fn id(&self) -> TaskId {
        self.id
    }

    fn resume(&self) {
        let resumed = self.shared.state.write(|state| match *state {
            TaskState::Suspended => {
                *state = TaskState::Running;
                true
            }
            _ => false,
        });
        if !resumed {
            return;
        }
        self.control.send_replace(Control::Running);
        self.start_runner();
    }

    fn suspend(&self) {
        let suspended = self.shared.state.write(|state| match *state {
            TaskState::Running => {
                *state = TaskState::Suspended;
                true
            }
            _ => false,
        });
        if suspended {
            self.control.send_replace(Control::Suspended);
        }
    }

    fn cancel(&self) {
        let cancelled = self.shared.state.write(|state| match *state {
            TaskState::Running | TaskState::Suspended => {
                *state = TaskState::Canceling;
                true
            }
            _ => false,
        });
        if cancelled {
            self.control.send_replace(Control::Cancelled);
            // A task cancelled before it ever ran still reports its cancellation.
            self.start_runner();
        }
    }

    fn state(&self) -> TaskState {
        self.shared.state.get()
    }

    fn response(&self) -> Option<Response> {
        self.shared.response.get()
    }
}

/// Forwards parsed response events to the task's event handle.
struct Forwarder<'a> {
    events: &'a TaskEvents,
    shared: &'a TaskShared,
    metrics: &'a mut TaskMetrics,
    started: Instant,
}

impl ResponseHandler for Forwarder<'_> {
    fn head(&mut self, response: &Response) {
        self.metrics.response_start = Some(self.started.elapsed());
        self.shared.response.set(Some(response.clone()));
    }

    fn body_chunk(&mut self, data: Bytes) {
        self.events.data_received(data);
    }

    fn complete(&mut self, trailers: &[(String, String)]) {
        if !trailers.is_empty() {
            self.shared.response.write(|r| {
                if let Some(r) = r.as_mut() {
                    r.headers.extend_from_slice(trailers);
                }
            });
        }
    }
}

async fn run(
    id: TaskId,
    request: HttpRequest,
    events: TaskEvents,
    mut control: watch::Receiver<Control>,
    shared: Arc<TaskShared>,
    connect_timeout: Duration,
) {
    let started = Instant::now();
    let mut metrics = TaskMetrics::started_now(id);
    let result = drive(&request, &events, &mut control, &shared, &mut metrics, started, connect_timeout).await;
    metrics.task_interval = started.elapsed();
    shared.state.set(TaskState::Completed);
    match &result {
        Ok(()) => tracing::debug!(task = %id, url = %request.url, "transport task finished"),
        Err(e) => tracing::debug!(task = %id, url = %request.url, error = %e, "transport task failed"),
    }
    events.metrics_gathered(metrics);
    events.completed(result.err());
}

async fn drive(
    request: &HttpRequest,
    events: &TaskEvents,
    control: &mut watch::Receiver<Control>,
    shared: &TaskShared,
    metrics: &mut TaskMetrics,
    started: Instant,
    connect_timeout: Duration,
) -> Result<(), TransportError> {
    wait_while_suspended(control).await?;
    let mut conn = tokio::select! {
        conn = HttpClient::connect(&request.url, connect_timeout) => conn?,
        _ = cancelled(control) => return Err(TransportError::cancelled()),
    };
    metrics.connect_end = Some(started.elapsed());

    metrics.bytes_sent = tokio::select! {
        written = conn.write_request(request) => written?,
        _ = cancelled(control) => return Err(TransportError::cancelled()),
    };

    let mut forwarder = Forwarder { events, shared, metrics: &mut *metrics, started };
    loop {
        wait_while_suspended(control).await?;
        let done = tokio::select! {
            done = conn.read_step(&mut forwarder) => done?,
            _ = cancelled(control) => return Err(TransportError::cancelled()),
        };
        if done {
            break;
        }
    }
    metrics.bytes_received = conn.bytes_received();
    Ok(())
}

/// Returns once the task is running; fails if it is cancelled first.
async fn wait_while_suspended(control: &mut watch::Receiver<Control>) -> Result<(), TransportError> {
    loop {
        match *control.borrow_and_update() {
            Control::Running => return Ok(()),
            Control::Cancelled => return Err(TransportError::cancelled()),
            Control::Suspended => {}
        }
        if control.changed().await.is_err() {
            // Task handle dropped; nothing can resume or cancel us any more.
            return Ok(());
        }
    }
}

/// Resolves when the task is cancelled. Never resolves if the task handle is dropped.
async fn cancelled(control: &mut watch::Receiver<Control>) {
    loop {
        if *control.borrow_and_update() == Control::Cancelled {
            return;
        }
        if control.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
