/*
 * mod.rs
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

//! Session: creates requests, builds their transport tasks, and owns the bookkeeping that ties
//! transport events back to requests.
//!
//! Three queues per session. The root queue orders all session state changes; the request queue
//! (building transport requests) and the serialization queue (response serializers) target it, so
//! everything lands in one total order. Session-owned state lives in `Protected` cells, and every
//! access asserts that it runs on the root queue.

mod default;
mod delegate;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::config::SessionConfig;
use crate::protected::Protected;
use crate::protocol::http::{HttpRequest, Method, RequestConvertible, UrlRequest};
use crate::queue::SerialQueue;
use crate::request::{
    DataRequest, Request, RequestDelegate, RequestId, RequestKind, RequestQueues, RequestState,
    RequestTaskMap,
};
use crate::transport::{HttpTransport, TaskId, Transport, TransportSession, TransportTask};
use crate::uri::UrlConvertible;

pub use default::{default_session, shutdown_default_session};
pub(crate) use delegate::SessionStateProvider;
pub use delegate::SessionDelegate;

type Completion = Box<dyn FnOnce() + Send>;

/// Entry point for issuing requests. Cloning yields another handle to the same session; the
/// session is torn down when the last handle is dropped.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    me: Weak<SessionInner>,
    config: SessionConfig,
    root_queue: SerialQueue,
    request_queue: SerialQueue,
    serialization_queue: SerialQueue,
    callback_queue: SerialQueue,
    transport: TransportSession,
    active_requests: Protected<HashMap<RequestId, Arc<Request>>>,
    request_task_map: Protected<RequestTaskMap>,
    waiting_completions: Protected<HashMap<TaskId, Completion>>,
}

impl Session {
    /// Session on the current tokio runtime, performing requests with `HttpTransport`.
    /// Panics outside a tokio runtime.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_runtime_handle(config, Handle::current())
    }

    /// Session whose queues and transport run on `handle`.
    pub fn with_runtime_handle(config: SessionConfig, handle: Handle) -> Self {
        let transport = Arc::new(HttpTransport::new(handle.clone(), &config));
        Self::assemble(config, &handle, transport)
    }

    /// Session on the current tokio runtime with a caller-supplied transport.
    pub fn with_transport(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        Self::assemble(config, &Handle::current(), transport)
    }

    fn assemble(config: SessionConfig, handle: &Handle, transport: Arc<dyn Transport>) -> Self {
        let root_queue = SerialQueue::new(config.label.clone(), handle);
        let request_queue =
            SerialQueue::with_target(format!("{}.requestQueue", config.label), &root_queue);
        let serialization_queue =
            SerialQueue::with_target(format!("{}.serializationQueue", config.label), &root_queue);
        let callback_queue = SerialQueue::new(format!("{}.callbackQueue", config.label), handle);
        let inner = Arc::new_cyclic(|me: &Weak<SessionInner>| {
            let provider: Weak<dyn SessionStateProvider> = me.clone();
            let delegate = SessionDelegate::new(provider, root_queue.clone());
            SessionInner {
                me: me.clone(),
                config,
                root_queue,
                request_queue,
                serialization_queue,
                callback_queue,
                transport: TransportSession::new(transport, delegate),
                active_requests: Protected::default(),
                request_task_map: Protected::new(RequestTaskMap::new()),
                waiting_completions: Protected::default(),
            }
        });
        tracing::debug!(label = %inner.config.label, "session created");
        Session { inner }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Queue that orders all session bookkeeping.
    pub fn root_queue(&self) -> &SerialQueue {
        &self.inner.root_queue
    }

    /// Default delivery queue for response handlers.
    pub fn callback_queue(&self) -> &SerialQueue {
        &self.inner.callback_queue
    }

    /// GET `url`.
    pub fn request(&self, url: impl UrlConvertible + 'static) -> DataRequest {
        self.request_with(UrlRequest {
            url,
            method: Method::Get,
        })
    }

    /// Issue a request from any description that can build an `HttpRequest`. Returns at once;
    /// the transport request is built on the request queue.
    pub fn request_with(&self, convertible: impl RequestConvertible + 'static) -> DataRequest {
        let delegate: Weak<dyn RequestDelegate> = self.inner.me.clone();
        let request = Request::new(RequestKind::data(convertible), self.inner.queues(), delegate);
        self.inner.perform(request.clone());
        DataRequest::new(request)
    }

    /// Cancel every request the session is tracking.
    pub fn cancel_all(&self) {
        let me = self.inner.me.clone();
        self.inner.root_queue.dispatch(move || {
            let Some(session) = me.upgrade() else {
                return;
            };
            for request in session.active_requests() {
                request.cancel();
            }
        });
    }

    /// Fail every tracked request with `SessionInvalidated`, cancelling their tasks.
    pub fn invalidate_and_cancel(&self) {
        let me = self.inner.me.clone();
        self.inner.root_queue.dispatch(move || {
            let Some(session) = me.upgrade() else {
                return;
            };
            for request in session.active_requests() {
                request.invalidate();
            }
        });
    }

    /// Number of requests the session is tracking.
    pub async fn active_request_count(&self) -> usize {
        self.on_root(|s| s.active_requests.read(|a| a.len()))
            .await
            .unwrap_or(0)
    }

    /// Whether `task` is still associated with a request.
    pub async fn is_task_associated(&self, task: TaskId) -> bool {
        self.on_root(move |s| s.request_task_map.read(|m| m.contains_task(task)))
            .await
            .unwrap_or(false)
    }

    async fn on_root<R: Send + 'static>(
        &self,
        f: impl FnOnce(&SessionInner) -> R + Send + 'static,
    ) -> Option<R> {
        let (tx, rx) = oneshot::channel();
        let me = self.inner.clone();
        self.inner.root_queue.dispatch(move || {
            let _ = tx.send(f(&me));
        });
        rx.await.ok()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("label", &self.inner.config.label)
            .finish()
    }
}

impl SessionInner {
    fn queues(&self) -> RequestQueues {
        RequestQueues {
            underlying: self.root_queue.clone(),
            serialization: self.serialization_queue.clone(),
            callback: self.callback_queue.clone(),
        }
    }

    fn active_requests(&self) -> Vec<Arc<Request>> {
        self.root_queue.precondition();
        self.active_requests.read(|a| a.values().cloned().collect())
    }

    /// Track `request` and build its transport request on the request queue.
    fn perform(&self, request: Arc<Request>) {
        let me = self.me.clone();
        self.root_queue.dispatch(move || {
            let Some(session) = me.upgrade() else {
                request.invalidate();
                return;
            };
            session
                .active_requests
                .write(|a| a.insert(request.id(), request.clone()));
            let me = session.me.clone();
            session.request_queue.dispatch(move || {
                let Some(session) = me.upgrade() else {
                    request.invalidate();
                    return;
                };
                session.perform_setup(request);
            });
        });
    }

    /// On the request queue: build the transport request, then continue on the root queue.
    fn perform_setup(&self, request: Arc<Request>) {
        self.request_queue.precondition();
        let built = request.kind().build_request().map(|mut http| {
            for (name, value) in &self.config.default_headers {
                http.header_if_absent(name, value);
            }
            http
        });
        let me = self.me.clone();
        self.root_queue.dispatch(move || {
            let Some(session) = me.upgrade() else {
                request.invalidate();
                return;
            };
            match built {
                Ok(http) => {
                    request.did_create_initial_request(http.clone());
                    session.did_create_request(http, request);
                }
                Err(error) => request.did_fail_to_create_request(error),
            }
        });
    }

    fn did_create_request(&self, http: HttpRequest, request: Arc<Request>) {
        self.root_queue.precondition();
        request.did_create_request(&http);
        let task = request.kind().create_task(&http, &self.transport);
        tracing::debug!(request = %request.id(), task = %task.id(), method = ?http.method, url = %http.url, "task created");
        self.request_task_map.write(|m| m.associate(&request, &task));
        request.did_create_task(task.clone());
        self.update_states_for_task(&task, &request);
    }

    /// Apply the request's current lifecycle state to a freshly created task.
    fn update_states_for_task(&self, task: &Arc<dyn TransportTask>, request: &Request) {
        self.root_queue.precondition();
        request.with_state(|state| match state {
            RequestState::Initialized | RequestState::Finished => {}
            RequestState::Resumed => task.resume(),
            RequestState::Suspended => task.suspend(),
            RequestState::Cancelled => {
                task.resume();
                task.cancel();
            }
        });
    }
}

impl RequestDelegate for SessionInner {
    fn start_immediately(&self) -> bool {
        self.config.start_requests_immediately
    }

    fn cleanup_after(&self, request: &Request) {
        self.root_queue.precondition();
        let removed = self.active_requests.write(|a| a.remove(&request.id()));
        if removed.is_some() {
            tracing::trace!(request = %request.id(), "request cleaned up");
        }
    }
}

impl SessionStateProvider for SessionInner {
    fn request_for(&self, task: TaskId) -> Option<Arc<Request>> {
        self.root_queue.precondition();
        self.request_task_map.read(|m| m.request_for(task))
    }

    fn did_gather_metrics_for_task(&self, task: TaskId) {
        self.root_queue.precondition();
        let ready = self
            .request_task_map
            .write(|m| m.mark_metrics_gathered(task));
        if ready {
            tracing::trace!(task = %task, "metrics arrived after completion");
            if let Some(completion) = self.waiting_completions.write(|w| w.remove(&task)) {
                completion();
            }
        }
    }

    fn did_complete_task(&self, task: TaskId, completion: Completion) {
        self.root_queue.precondition();
        let ready = self.request_task_map.write(|m| m.mark_completed(task));
        if ready {
            completion();
        } else {
            tracing::trace!(task = %task, "completion waiting for metrics");
            self.waiting_completions.write(|w| w.insert(task, completion));
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let active = self.active_requests.replace(HashMap::new());
        if !active.is_empty() {
            tracing::debug!(label = %self.config.label, count = active.len(), "session dropped with active requests");
        }
        for request in active.into_values() {
            request.invalidate();
        }
    }
}
