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

//! Transport collaborator: the layer that actually performs a built request.
//!
//! A `Transport` turns an `HttpRequest` into a `TransportTask` that can be resumed, suspended and
//! cancelled. While it runs, the task reports through its `TaskEvents` handle:
//! `data_received` (zero or more times, in arrival order), then `metrics_gathered` and `completed`
//! once each, in either order. Events are hopped onto the session's root queue before the
//! session sees them, so a transport may emit from any thread.

mod http;
mod metrics;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::TransportError;
use crate::protocol::http::{HttpRequest, Response};
use crate::session::SessionDelegate;

pub use http::HttpTransport;
pub use metrics::TaskMetrics;

/// Process-unique transport task identity; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Observable state of a transport task. New tasks start `Suspended` until first resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Suspended,
    /// `cancel()` was called; the completion event has not been reported yet.
    Canceling,
    Completed,
}

/// One in-flight network operation.
pub trait TransportTask: Send + Sync {
    fn id(&self) -> TaskId;

    fn resume(&self);

    fn suspend(&self);

    /// Cancel the task. A task that has been resumed reports completion with a cancelled error.
    fn cancel(&self);

    fn state(&self) -> TaskState;

    /// Response head, once received.
    fn response(&self) -> Option<Response>;
}

impl fmt::Debug for dyn TransportTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportTask")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

/// Builds transport tasks.
pub trait Transport: Send + Sync {
    /// Create a task for `request`, initially suspended. The task reports through `events`.
    fn data_task(&self, id: TaskId, request: HttpRequest, events: TaskEvents) -> Arc<dyn TransportTask>;
}

/// Handle through which a transport task reports its events to the owning session.
#[derive(Clone)]
pub struct TaskEvents {
    task: TaskId,
    delegate: SessionDelegate,
}

impl TaskEvents {
    pub(crate) fn new(task: TaskId, delegate: SessionDelegate) -> Self {
        Self { task, delegate }
    }

    pub fn task_id(&self) -> TaskId {
        self.task
    }

    pub fn data_received(&self, data: Bytes) {
        let (task, delegate) = (self.task, self.delegate.clone());
        self.delegate
            .queue()
            .dispatch(move || delegate.did_receive_data(task, data));
    }

    pub fn metrics_gathered(&self, metrics: TaskMetrics) {
        let (task, delegate) = (self.task, self.delegate.clone());
        self.delegate
            .queue()
            .dispatch(move || delegate.did_finish_collecting(task, metrics));
    }

    pub fn completed(&self, error: Option<TransportError>) {
        let (task, delegate) = (self.task, self.delegate.clone());
        self.delegate
            .queue()
            .dispatch(move || delegate.did_complete(task, error));
    }
}

/// A transport bound to the delegate that receives its events.
pub struct TransportSession {
    transport: Arc<dyn Transport>,
    delegate: SessionDelegate,
}

impl TransportSession {
    pub(crate) fn new(transport: Arc<dyn Transport>, delegate: SessionDelegate) -> Self {
        Self { transport, delegate }
    }

    pub fn data_task(&self, request: &HttpRequest) -> Arc<dyn TransportTask> {
        let id = TaskId::next();
        let events = TaskEvents::new(id, self.delegate.clone());
        self.transport.data_task(id, request.clone(), events)
    }
}
