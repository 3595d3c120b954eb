/*
 * delegate.rs
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

//! Routes transport task events to the request that owns the task.

use std::fmt;
use std::sync::{Arc, Weak};

use bytes::Bytes;

use crate::error::TransportError;
use crate::queue::SerialQueue;
use crate::request::Request;
use crate::transport::{TaskId, TaskMetrics};

/// What the event router needs from the session. Every method runs on the root queue.
pub(crate) trait SessionStateProvider: Send + Sync {
    fn request_for(&self, task: TaskId) -> Option<Arc<Request>>;

    /// Record the metrics event; runs a waiting completion if the task already completed.
    fn did_gather_metrics_for_task(&self, task: TaskId);

    /// Record the completion event; runs `completion` now if metrics were already gathered,
    /// otherwise keeps it until they are.
    fn did_complete_task(&self, task: TaskId, completion: Box<dyn FnOnce() + Send>);
}

/// Event router between a transport and the session that created its tasks.
#[derive(Clone)]
pub struct SessionDelegate {
    state_provider: Weak<dyn SessionStateProvider>,
    queue: SerialQueue,
}

impl SessionDelegate {
    pub(crate) fn new(state_provider: Weak<dyn SessionStateProvider>, queue: SerialQueue) -> Self {
        Self {
            state_provider,
            queue,
        }
    }

    /// A router with no session behind it; every event is dropped.
    #[cfg(test)]
    pub(crate) fn detached(queue: SerialQueue) -> Self {
        struct NoSession;
        impl SessionStateProvider for NoSession {
            fn request_for(&self, _task: TaskId) -> Option<Arc<Request>> {
                None
            }
            fn did_gather_metrics_for_task(&self, _task: TaskId) {}
            fn did_complete_task(&self, _task: TaskId, _completion: Box<dyn FnOnce() + Send>) {}
        }
        Self::new(Weak::<NoSession>::new(), queue)
    }

    /// Queue that events are delivered on (the session's root queue).
    pub fn queue(&self) -> &SerialQueue {
        &self.queue
    }

    fn provider(&self, task: TaskId, event: &str) -> Option<Arc<dyn SessionStateProvider>> {
        self.queue.precondition();
        let provider = self.state_provider.upgrade();
        if provider.is_none() {
            tracing::trace!(task = %task, event, "session gone; dropping transport event");
        }
        provider
    }

    pub(crate) fn did_receive_data(&self, task: TaskId, data: Bytes) {
        let Some(provider) = self.provider(task, "data") else {
            return;
        };
        match provider.request_for(task) {
            Some(request) => request.did_receive(data),
            None => tracing::trace!(task = %task, "data for a task with no live request"),
        }
    }

    pub(crate) fn did_finish_collecting(&self, task: TaskId, metrics: TaskMetrics) {
        let Some(provider) = self.provider(task, "metrics") else {
            return;
        };
        if let Some(request) = provider.request_for(task) {
            request.did_gather_metrics(metrics);
        }
        provider.did_gather_metrics_for_task(task);
    }

    pub(crate) fn did_complete(&self, task: TaskId, error: Option<TransportError>) {
        let Some(provider) = self.provider(task, "completion") else {
            return;
        };
        let request = provider.request_for(task);
        provider.did_complete_task(
            task,
            Box::new(move || {
                if let Some(request) = request {
                    request.did_complete_task(error);
                }
            }),
        );
    }
}

impl fmt::Debug for SessionDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDelegate")
            .field("queue", &self.queue)
            .finish()
    }
}
