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

//! Request lifecycle: state machine, built requests and tasks, buffered data, and the response
//! serializer pipeline.
//!
//! A `Request` is shared between the session (active set), the caller (through `DataRequest`) and
//! the serializers it runs. All mutable state sits behind one `Protected` guard, so public
//! accessors may be called from any thread. Operations driven by transport events run on the
//! session's root queue.

mod data;
mod task_map;

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::{Bytes, BytesMut};

use crate::error::{RequestError, TransportError};
use crate::protected::Protected;
use crate::protocol::http::{HttpRequest, RequestConvertible};
use crate::queue::SerialQueue;
use crate::transport::{TaskMetrics, TaskState, TransportSession, TransportTask};

pub use data::DataRequest;
pub use task_map::RequestTaskMap;

/// Process-unique request identity; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        RequestId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request#{}", self.0)
    }
}

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    Initialized,
    Resumed,
    Suspended,
    Cancelled,
    Finished,
}

impl RequestState {
    /// Whether moving from `self` to `to` is legal. Same-state moves are never legal, and
    /// `Cancelled` and `Finished` are terminal.
    pub fn can_transition_to(self, to: RequestState) -> bool {
        use RequestState::*;
        match (self, to) {
            (Initialized, Initialized) => false,
            (Initialized, _) => true,
            (Resumed, Suspended) | (Suspended, Resumed) => true,
            (Resumed, Cancelled | Finished) | (Suspended, Cancelled | Finished) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestState::Initialized => "initialized",
            RequestState::Resumed => "resumed",
            RequestState::Suspended => "suspended",
            RequestState::Cancelled => "cancelled",
            RequestState::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// What the owning session provides to its requests.
pub(crate) trait RequestDelegate: Send + Sync {
    /// Whether requests start as soon as a response handler is registered.
    fn start_immediately(&self) -> bool;

    /// Called on the root queue once a request has drained its pipeline.
    fn cleanup_after(&self, request: &Request);
}

/// What a request is able to build and how it reacts to incoming bytes.
pub enum RequestKind {
    /// Buffers the whole response body.
    Data {
        convertible: Box<dyn RequestConvertible>,
    },
}

impl RequestKind {
    pub fn data(convertible: impl RequestConvertible + 'static) -> Self {
        RequestKind::Data {
            convertible: Box::new(convertible),
        }
    }

    pub(crate) fn build_request(&self) -> Result<HttpRequest, RequestError> {
        match self {
            RequestKind::Data { convertible } => convertible.as_request(),
        }
    }

    pub(crate) fn create_task(
        &self,
        request: &HttpRequest,
        transport: &TransportSession,
    ) -> Arc<dyn TransportTask> {
        match self {
            RequestKind::Data { .. } => transport.data_task(request),
        }
    }

    fn receive(&self, buffer: &mut Option<BytesMut>, chunk: Bytes) {
        match self {
            RequestKind::Data { .. } => match buffer {
                Some(buffer) => buffer.extend_from_slice(&chunk),
                None => *buffer = Some(BytesMut::from(&chunk[..])),
            },
        }
    }
}

impl fmt::Debug for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Data { .. } => f.write_str("Data"),
        }
    }
}

/// The queues a request runs on.
#[derive(Debug, Clone)]
pub(crate) struct RequestQueues {
    /// Session root queue; transport events and pipeline bookkeeping run here.
    pub underlying: SerialQueue,
    /// Runs response serializers; targets `underlying`.
    pub serialization: SerialQueue,
    /// Default delivery queue for response handlers.
    pub callback: SerialQueue,
}

impl RequestQueues {
    #[cfg(test)]
    pub(crate) fn new(label: &str, handle: &tokio::runtime::Handle) -> Self {
        let underlying = SerialQueue::new(label, handle);
        let serialization =
            SerialQueue::with_target(format!("{}.serializationQueue", label), &underlying);
        let callback = SerialQueue::new(format!("{}.callbackQueue", label), handle);
        Self {
            underlying,
            serialization,
            callback,
        }
    }
}

pub(crate) type Work = Box<dyn FnOnce() + Send>;

type RequestCreatedHandler = Arc<dyn Fn(HttpRequest) + Send + Sync>;
type TaskCreatedHandler = Arc<dyn Fn(Arc<dyn TransportTask>) + Send + Sync>;

struct MutableState {
    state: RequestState,
    requests: Vec<HttpRequest>,
    tasks: Vec<Arc<dyn TransportTask>>,
    metrics: Vec<TaskMetrics>,
    error: Option<RequestError>,
    data: Option<BytesMut>,
    /// Taken when dispatched; the completions list length is the cursor.
    response_serializers: Vec<Option<Work>>,
    response_serializer_completions: Vec<Work>,
    is_finishing: bool,
    response_serializer_processing_finished: bool,
    finish_handlers: VecDeque<Work>,
    request_created: Option<(SerialQueue, RequestCreatedHandler)>,
    task_created: Option<(SerialQueue, TaskCreatedHandler)>,
}

impl MutableState {
    fn new() -> Self {
        Self {
            state: RequestState::Initialized,
            requests: Vec::new(),
            tasks: Vec::new(),
            metrics: Vec::new(),
            error: None,
            data: None,
            response_serializers: Vec::new(),
            response_serializer_completions: Vec::new(),
            is_finishing: false,
            response_serializer_processing_finished: false,
            finish_handlers: VecDeque::new(),
            request_created: None,
            task_created: None,
        }
    }

    /// First error wins.
    fn record_error(&mut self, error: RequestError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

enum NextStep {
    Serializer(Work),
    /// The next serializer is already running.
    Wait,
    Drain(Vec<Work>),
}

/// One logical call: from build through every transport attempt to delivered responses.
pub struct Request {
    id: RequestId,
    me: Weak<Request>,
    kind: RequestKind,
    queues: RequestQueues,
    delegate: Weak<dyn RequestDelegate>,
    state: Protected<MutableState>,
}

impl Request {
    pub(crate) fn new(
        kind: RequestKind,
        queues: RequestQueues,
        delegate: Weak<dyn RequestDelegate>,
    ) -> Arc<Self> {
        let request = Arc::new_cyclic(|me| Request {
            id: RequestId::next(),
            me: me.clone(),
            kind,
            queues,
            delegate,
            state: Protected::new(MutableState::new()),
        });
        tracing::trace!(request = %request.id, kind = ?request.kind, "request created");
        request
    }

    /// A request with no owning session.
    #[cfg(test)]
    pub(crate) fn detached(kind: RequestKind, queues: RequestQueues) -> Arc<Self> {
        struct NoDelegate;
        impl RequestDelegate for NoDelegate {
            fn start_immediately(&self) -> bool {
                false
            }
            fn cleanup_after(&self, _request: &Request) {}
        }
        Self::new(kind, queues, Weak::<NoDelegate>::new())
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    #[cfg(test)]
    pub(crate) fn queues(&self) -> &RequestQueues {
        &self.queues
    }

    /// Queue that response handlers run on unless another is given.
    pub fn callback_queue(&self) -> &SerialQueue {
        &self.queues.callback
    }

    // Accessors

    pub fn state(&self) -> RequestState {
        self.state.read(|s| s.state)
    }

    /// Run `f` with the current state while holding the request's guard.
    pub fn with_state<R>(&self, f: impl FnOnce(RequestState) -> R) -> R {
        self.state.read(|s| f(s.state))
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == RequestState::Initialized
    }

    pub fn is_resumed(&self) -> bool {
        self.state() == RequestState::Resumed
    }

    pub fn is_suspended(&self) -> bool {
        self.state() == RequestState::Suspended
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == RequestState::Cancelled
    }

    pub fn is_finished(&self) -> bool {
        self.state() == RequestState::Finished
    }

    /// Every transport request built for this call, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.read(|s| s.requests.clone())
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.state.read(|s| s.requests.last().cloned())
    }

    /// Every transport task created for this call, oldest first.
    pub fn tasks(&self) -> Vec<Arc<dyn TransportTask>> {
        self.state.read(|s| s.tasks.clone())
    }

    pub fn task(&self) -> Option<Arc<dyn TransportTask>> {
        self.state.read(|s| s.tasks.last().cloned())
    }

    /// Metrics of the most recent task.
    pub fn metrics(&self) -> Option<TaskMetrics> {
        self.state.read(|s| s.metrics.last().cloned())
    }

    pub fn all_metrics(&self) -> Vec<TaskMetrics> {
        self.state.read(|s| s.metrics.clone())
    }

    /// First error recorded for this call.
    pub fn error(&self) -> Option<RequestError> {
        self.state.read(|s| s.error.clone())
    }

    /// Bytes received so far; `None` until the first chunk arrives.
    pub fn data(&self) -> Option<Bytes> {
        self.state
            .read(|s| s.data.as_ref().map(|b| Bytes::copy_from_slice(b)))
    }

    // Lifecycle

    /// Resume the request and its current task. Ignored when `Resumed` is not reachable.
    pub fn resume(&self) -> &Self {
        self.state.write(|s| {
            if !s.state.can_transition_to(RequestState::Resumed) {
                return;
            }
            s.state = RequestState::Resumed;
            tracing::trace!(request = %self.id, "resumed");
            if let Some(task) = s.tasks.last() {
                if task.state() != TaskState::Completed {
                    task.resume();
                }
            }
        });
        self
    }

    /// Suspend the request and its current task. Ignored when `Suspended` is not reachable.
    pub fn suspend(&self) -> &Self {
        self.state.write(|s| {
            if !s.state.can_transition_to(RequestState::Suspended) {
                return;
            }
            s.state = RequestState::Suspended;
            tracing::trace!(request = %self.id, "suspended");
            if let Some(task) = s.tasks.last() {
                if task.state() != TaskState::Completed {
                    task.suspend();
                }
            }
        });
        self
    }

    /// Cancel the request. A task that has not completed is resumed then cancelled so the
    /// transport still reports its outcome. Without a task the pipeline is finished directly and
    /// the task the session creates later is resumed then cancelled.
    pub fn cancel(&self) -> &Self {
        let finish_now = self.state.write(|s| {
            if !s.state.can_transition_to(RequestState::Cancelled) {
                return false;
            }
            s.state = RequestState::Cancelled;
            s.record_error(RequestError::ExplicitlyCancelled);
            tracing::debug!(request = %self.id, "cancelled");
            match s.tasks.last() {
                Some(task) => {
                    if task.state() != TaskState::Completed {
                        task.resume();
                        task.cancel();
                    }
                    false
                }
                None => true,
            }
        });
        if finish_now {
            self.finish_on_underlying_queue(None);
        }
        self
    }

    /// Fail the request because its session went away. An unfinished task is resumed then
    /// cancelled, like `cancel`.
    pub(crate) fn invalidate(&self) {
        let task = self.state.write(|s| {
            s.record_error(RequestError::SessionInvalidated);
            s.tasks.last().cloned()
        });
        if let Some(task) = task {
            if task.state() != TaskState::Completed {
                task.resume();
                task.cancel();
            }
        }
        self.finish_on_underlying_queue(None);
    }

    fn finish_on_underlying_queue(&self, error: Option<RequestError>) {
        if let Some(me) = self.me.upgrade() {
            self.queues.underlying.dispatch(move || me.finish(error));
        }
    }

    // Handlers

    /// Call `handler` on `queue` with every transport request built for this call. If one has
    /// already been built, the handler is called with it straight away. Replaces any previous
    /// handler.
    pub fn on_request_created(
        &self,
        queue: &SerialQueue,
        handler: impl Fn(HttpRequest) + Send + Sync + 'static,
    ) -> &Self {
        let handler: RequestCreatedHandler = Arc::new(handler);
        let existing = self.state.write(|s| {
            s.request_created = Some((queue.clone(), handler.clone()));
            s.requests.last().cloned()
        });
        if let Some(request) = existing {
            queue.dispatch(move || handler(request));
        }
        self
    }

    /// Call `handler` on `queue` with every transport task created for this call. If one already
    /// exists, the handler is called with it straight away. Replaces any previous handler.
    pub fn on_task_created(
        &self,
        queue: &SerialQueue,
        handler: impl Fn(Arc<dyn TransportTask>) + Send + Sync + 'static,
    ) -> &Self {
        let handler: TaskCreatedHandler = Arc::new(handler);
        let existing = self.state.write(|s| {
            s.task_created = Some((queue.clone(), handler.clone()));
            s.tasks.last().cloned()
        });
        if let Some(task) = existing {
            queue.dispatch(move || handler(task));
        }
        self
    }

    /// Run `handler` once, after the next pipeline drain.
    pub fn on_finish(&self, handler: impl FnOnce() + Send + 'static) -> &Self {
        self.state
            .write(|s| s.finish_handlers.push_back(Box::new(handler)));
        self
    }

    // Session and transport events, on the underlying queue

    pub(crate) fn did_create_initial_request(&self, request: HttpRequest) {
        self.queues.underlying.precondition();
        self.state.write(|s| s.requests.push(request));
    }

    pub(crate) fn did_fail_to_create_request(&self, error: RequestError) {
        self.queues.underlying.precondition();
        tracing::debug!(request = %self.id, error = %error, "failed to create transport request");
        self.state.write(|s| s.record_error(error));
        self.finish(None);
    }

    /// Notify the request-created handler with the request that is about to be sent.
    pub(crate) fn did_create_request(&self, request: &HttpRequest) {
        self.queues.underlying.precondition();
        let handler = self.state.read(|s| s.request_created.clone());
        if let Some((queue, handler)) = handler {
            let request = request.clone();
            queue.dispatch(move || handler(request));
        }
    }

    pub(crate) fn did_create_task(&self, task: Arc<dyn TransportTask>) {
        self.queues.underlying.precondition();
        tracing::trace!(request = %self.id, task = %task.id(), "task created");
        let handler = self.state.write(|s| {
            s.tasks.push(task.clone());
            s.task_created.clone()
        });
        if let Some((queue, handler)) = handler {
            queue.dispatch(move || handler(task));
        }
    }

    pub(crate) fn did_receive(&self, data: Bytes) {
        self.queues.underlying.precondition();
        self.state.write(|s| self.kind.receive(&mut s.data, data));
    }

    pub(crate) fn did_gather_metrics(&self, metrics: TaskMetrics) {
        self.queues.underlying.precondition();
        self.state.write(|s| s.metrics.push(metrics));
    }

    /// The current task reported completion. Without a retry policy this always finishes.
    pub(crate) fn did_complete_task(&self, error: Option<TransportError>) {
        self.queues.underlying.precondition();
        if let Some(error) = error {
            self.state.write(|s| s.record_error(error.into()));
        }
        self.finish(None);
    }

    /// Start draining the serializer pipeline. Ignored while a drain is already in progress.
    pub(crate) fn finish(&self, error: Option<RequestError>) {
        self.queues.underlying.precondition();
        let proceed = self.state.write(|s| {
            if s.is_finishing {
                return false;
            }
            s.is_finishing = true;
            if let Some(error) = error {
                s.record_error(error);
            }
            true
        });
        if !proceed {
            return;
        }
        tracing::debug!(request = %self.id, error = ?self.error(), "finishing");
        self.process_next_response_serializer();
    }

    // Serializer pipeline

    /// Add a serializer. Re-opens a finished request so the new serializer runs, and resumes the
    /// request when the session starts requests immediately.
    pub fn append_response_serializer(&self, serializer: impl FnOnce() + Send + 'static) {
        let (process, start) = self.state.write(|s| {
            s.response_serializers.push(Some(Box::new(serializer)));
            if s.state == RequestState::Finished {
                s.state = RequestState::Resumed;
            }
            (
                s.response_serializer_processing_finished,
                s.state.can_transition_to(RequestState::Resumed),
            )
        });
        let Some(me) = self.me.upgrade() else {
            return;
        };
        if process {
            let me = me.clone();
            self.queues
                .underlying
                .dispatch(move || me.process_next_response_serializer());
        }
        if start {
            self.queues.underlying.dispatch(move || {
                let start = me
                    .delegate
                    .upgrade()
                    .map(|d| d.start_immediately())
                    .unwrap_or(false);
                if start {
                    me.resume();
                }
            });
        }
    }

    /// A serializer finished: record its delivery closure and advance.
    pub fn response_serializer_did_complete(&self, completion: impl FnOnce() + Send + 'static) {
        self.state
            .write(|s| s.response_serializer_completions.push(Box::new(completion)));
        self.process_next_response_serializer();
    }

    fn process_next_response_serializer(&self) {
        let step = self.state.write(|s| {
            let index = s.response_serializer_completions.len();
            if index < s.response_serializers.len() {
                return match s.response_serializers[index].take() {
                    Some(serializer) => NextStep::Serializer(serializer),
                    None => NextStep::Wait,
                };
            }
            let completions = mem::take(&mut s.response_serializer_completions);
            s.response_serializers.clear();
            if s.state.can_transition_to(RequestState::Finished) {
                s.state = RequestState::Finished;
            }
            s.response_serializer_processing_finished = true;
            s.is_finishing = false;
            NextStep::Drain(completions)
        });
        match step {
            NextStep::Serializer(serializer) => self.queues.serialization.dispatch(serializer),
            NextStep::Wait => {}
            NextStep::Drain(completions) => {
                tracing::trace!(request = %self.id, count = completions.len(), "pipeline drained");
                for completion in completions {
                    completion();
                }
                self.cleanup();
            }
        }
    }

    fn cleanup(&self) {
        if let Some(delegate) = self.delegate.upgrade() {
            delegate.cleanup_after(self);
        }
        let handlers = self.state.write(|s| mem::take(&mut s.finish_handlers));
        for handler in handlers {
            handler();
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Request {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;
    use std::sync::Mutex;
    use tokio::sync::oneshot;
    use tokio::runtime::Handle;
    use RequestState::*;

    const ALL: [RequestState; 5] = [Initialized, Resumed, Suspended, Cancelled, Finished];

    #[test]
    fn transition_table() {
        let allowed = [
            (Initialized, Resumed),
            (Initialized, Suspended),
            (Initialized, Cancelled),
            (Initialized, Finished),
            (Resumed, Suspended),
            (Resumed, Cancelled),
            (Resumed, Finished),
            (Suspended, Resumed),
            (Suspended, Cancelled),
            (Suspended, Finished),
        ];
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    fn detached() -> Arc<Request> {
        let queues = RequestQueues::new("test.request", &Handle::current());
        Request::detached(
            RequestKind::data(HttpRequest::get("http://request.test/").unwrap()),
            queues,
        )
    }

    /// Run `f` on the request's underlying queue and wait for it.
    async fn on_queue<R: Send + 'static>(
        request: &Arc<Request>,
        f: impl FnOnce(&Arc<Request>) -> R + Send + 'static,
    ) -> R {
        let (tx, rx) = oneshot::channel();
        let r = request.clone();
        request.queues().underlying.dispatch(move || {
            let _ = tx.send(f(&r));
        });
        rx.await.unwrap()
    }

    /// Resolves after the next pipeline drain.
    fn drained(request: &Arc<Request>) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        request.on_finish(move || {
            let _ = tx.send(());
        });
        rx
    }

    #[tokio::test]
    async fn data_buffer_appends_in_arrival_order() {
        let request = detached();
        assert_eq!(request.data(), None);
        on_queue(&request, |r| r.did_receive(Bytes::from_static(b"ab"))).await;
        assert_eq!(request.data().as_deref(), Some(&b"ab"[..]));
        on_queue(&request, |r| {
            r.did_receive(Bytes::from_static(b"cd"));
            r.did_receive(Bytes::from_static(b"e"));
        })
        .await;
        assert_eq!(request.data().as_deref(), Some(&b"abcde"[..]));
    }

    #[tokio::test]
    async fn first_error_is_sticky() {
        let request = detached();
        let first = TransportError::new(TransportErrorKind::Connect, "refused");
        let second = TransportError::new(TransportErrorKind::Io, "later");
        let f = first.clone();
        on_queue(&request, move |r| r.did_complete_task(Some(f))).await;
        on_queue(&request, move |r| r.did_complete_task(Some(second))).await;
        request.queues().underlying.barrier().await;
        assert_eq!(request.error(), Some(RequestError::Transport(first)));
    }

    #[tokio::test]
    async fn serializers_complete_in_append_order() {
        let request = detached();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let (r, seen) = (request.clone(), seen.clone());
            request.append_response_serializer(move || {
                r.response_serializer_did_complete(move || seen.lock().unwrap().push(i));
            });
        }
        let done = drained(&request);
        on_queue(&request, |r| r.finish(None)).await;
        done.await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(request.state(), Finished);
    }

    #[tokio::test]
    async fn append_after_finish_runs_only_the_new_serializer() {
        let request = detached();
        let count = Arc::new(Mutex::new(Vec::new()));
        let (r, c) = (request.clone(), count.clone());
        request.append_response_serializer(move || {
            r.response_serializer_did_complete(move || c.lock().unwrap().push("first"));
        });
        let done = drained(&request);
        on_queue(&request, |r| r.finish(None)).await;
        done.await.unwrap();
        assert!(request.is_finished());

        let done = drained(&request);
        let (r, c) = (request.clone(), count.clone());
        request.append_response_serializer(move || {
            r.response_serializer_did_complete(move || c.lock().unwrap().push("second"));
        });
        done.await.unwrap();
        assert_eq!(*count.lock().unwrap(), vec!["first", "second"]);
        assert!(request.is_finished());
    }

    #[tokio::test]
    async fn finish_handlers_run_once() {
        let request = detached();
        let runs = Arc::new(Mutex::new(0));
        let r = runs.clone();
        request.on_finish(move || *r.lock().unwrap() += 1);
        on_queue(&request, |r| r.finish(None)).await;
        on_queue(&request, |r| r.finish(None)).await;
        assert_eq!(*runs.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn cancel_without_task_drains_and_stays_cancelled() {
        let request = detached();
        let (tx, rx) = oneshot::channel();
        let r = request.clone();
        request.append_response_serializer(move || {
            let error = r.error();
            r.response_serializer_did_complete(move || {
                let _ = tx.send(error);
            });
        });
        request.cancel();
        assert!(request.is_cancelled());
        assert_eq!(rx.await.unwrap(), Some(RequestError::ExplicitlyCancelled));
        request.queues().underlying.barrier().await;
        assert!(request.is_cancelled());
        assert!(!request.is_finished());
        request.resume();
        assert!(request.is_cancelled());
    }

    #[tokio::test]
    async fn request_created_handler_sees_existing_request() {
        let request = detached();
        let built = HttpRequest::get("http://request.test/built").unwrap();
        let b = built.clone();
        on_queue(&request, move |r| r.did_create_initial_request(b)).await;
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        request.on_request_created(request.callback_queue(), move |req| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(req);
            }
        });
        assert_eq!(rx.await.unwrap(), built);
    }
}
