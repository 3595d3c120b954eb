/*
 * task_map.rs
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

//! Bidirectional request <-> transport task association with a per-task join barrier.
//!
//! The transport reports "metrics gathered" and "completed" for a task as two independent events
//! in no particular order. The first one to arrive is recorded; the second one disassociates the
//! task. Double association, unknown entries and duplicate events are contract violations and
//! panic.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::request::{Request, RequestId};
use crate::transport::{TaskId, TransportTask};

/// Which of the two terminal events have been observed for a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct EventRecord {
    completed: bool,
    metrics_gathered: bool,
}

#[derive(Default)]
pub struct RequestTaskMap {
    tasks_by_request: HashMap<RequestId, Arc<dyn TransportTask>>,
    requests_by_task: HashMap<TaskId, (RequestId, Weak<Request>)>,
    task_events: HashMap<TaskId, EventRecord>,
}

impl RequestTaskMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `request` with `task`. Neither may already be associated.
    pub fn associate(&mut self, request: &Arc<Request>, task: &Arc<dyn TransportTask>) {
        let request_id = request.id();
        let task_id = task.id();
        if self.tasks_by_request.contains_key(&request_id) {
            panic!(
                "RequestTaskMap consistency error: {} is already associated with a task",
                request_id
            );
        }
        if self.requests_by_task.contains_key(&task_id) {
            panic!(
                "RequestTaskMap consistency error: {} is already associated with a request",
                task_id
            );
        }
        self.tasks_by_request.insert(request_id, task.clone());
        self.requests_by_task
            .insert(task_id, (request_id, Arc::downgrade(request)));
        self.task_events.insert(task_id, EventRecord::default());
    }

    /// Remove the association of `request` and its task's event record.
    pub fn disassociate_request(&mut self, request: RequestId) {
        let Some(task) = self.tasks_by_request.remove(&request) else {
            panic!(
                "RequestTaskMap consistency error: no task associated with {}",
                request
            );
        };
        self.requests_by_task.remove(&task.id());
        self.task_events.remove(&task.id());
    }

    /// Remove the association of `task` and its event record.
    pub fn disassociate_task(&mut self, task: TaskId) {
        let Some((request, _)) = self.requests_by_task.remove(&task) else {
            panic!(
                "RequestTaskMap consistency error: no request associated with {}",
                task
            );
        };
        self.tasks_by_request.remove(&request);
        self.task_events.remove(&task);
    }

    /// Record the metrics event. Returns true when the task was disassociated because completion
    /// had already been recorded.
    pub fn mark_metrics_gathered(&mut self, task: TaskId) -> bool {
        let record = self.record(task);
        if record.metrics_gathered {
            panic!(
                "RequestTaskMap consistency error: metrics already gathered for {}",
                task
            );
        }
        if record.completed {
            self.disassociate_task(task);
            return true;
        }
        self.set_record(task, |r| r.metrics_gathered = true);
        false
    }

    /// Record the completion event. Returns true when the task was disassociated because metrics
    /// had already been recorded.
    pub fn mark_completed(&mut self, task: TaskId) -> bool {
        let record = self.record(task);
        if record.completed {
            panic!(
                "RequestTaskMap consistency error: {} already completed",
                task
            );
        }
        if record.metrics_gathered {
            self.disassociate_task(task);
            return true;
        }
        self.set_record(task, |r| r.completed = true);
        false
    }

    /// The live request associated with `task`, if any.
    pub fn request_for(&self, task: TaskId) -> Option<Arc<Request>> {
        self.requests_by_task
            .get(&task)
            .and_then(|(_, request)| request.upgrade())
    }

    pub fn task_for(&self, request: RequestId) -> Option<Arc<dyn TransportTask>> {
        self.tasks_by_request.get(&request).cloned()
    }

    pub fn contains_task(&self, task: TaskId) -> bool {
        self.requests_by_task.contains_key(&task)
    }

    pub fn contains_request(&self, request: RequestId) -> bool {
        self.tasks_by_request.contains_key(&request)
    }

    pub fn is_empty(&self) -> bool {
        self.requests_by_task.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests_by_task.len()
    }

    fn record(&self, task: TaskId) -> EventRecord {
        match self.task_events.get(&task) {
            Some(record) => *record,
            None => panic!(
                "RequestTaskMap consistency error: no event record for {}",
                task
            ),
        }
    }

    fn set_record(&mut self, task: TaskId, f: impl FnOnce(&mut EventRecord)) {
        if let Some(record) = self.task_events.get_mut(&task) {
            f(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::http::{HttpRequest, Response};
    use crate::request::{RequestKind, RequestQueues};
    use crate::transport::TaskState;

    struct StubTask(TaskId);

    impl TransportTask for StubTask {
        fn id(&self) -> TaskId {
            self.0
        }
        fn resume(&self) {}
        fn suspend(&self) {}
        fn cancel(&self) {}
        fn state(&self) -> TaskState {
            TaskState::Suspended
        }
        fn response(&self) -> Option<Response> {
            None
        }
    }

    fn request() -> Arc<Request> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let queues = RequestQueues::new("test.map", runtime.handle());
        let kind = RequestKind::data(HttpRequest::get("http://map.test/").unwrap());
        Request::detached(kind, queues)
    }

    fn task() -> Arc<dyn TransportTask> {
        Arc::new(StubTask(TaskId::next()))
    }

    #[test]
    fn associate_links_both_directions() {
        let mut map = RequestTaskMap::new();
        let (r, t) = (request(), task());
        map.associate(&r, &t);
        assert_eq!(map.request_for(t.id()).map(|r| r.id()), Some(r.id()));
        assert_eq!(map.task_for(r.id()).map(|t| t.id()), Some(t.id()));
        assert_eq!(map.len(), 1);
        map.disassociate_request(r.id());
        assert!(map.is_empty());
        assert!(!map.contains_task(t.id()));
    }

    #[test]
    fn second_event_disassociates_in_either_order() {
        let mut map = RequestTaskMap::new();
        let (r1, t1) = (request(), task());
        let (r2, t2) = (request(), task());
        map.associate(&r1, &t1);
        map.associate(&r2, &t2);

        assert!(!map.mark_completed(t1.id()));
        assert!(map.contains_task(t1.id()));
        assert!(map.mark_metrics_gathered(t1.id()));
        assert!(!map.contains_task(t1.id()));
        assert!(!map.contains_request(r1.id()));

        assert!(!map.mark_metrics_gathered(t2.id()));
        assert!(map.contains_task(t2.id()));
        assert!(map.mark_completed(t2.id()));
        assert!(map.is_empty());
    }

    #[test]
    fn dropped_request_still_disassociates() {
        let mut map = RequestTaskMap::new();
        let t = task();
        let id = {
            let r = request();
            map.associate(&r, &t);
            r.id()
        };
        assert!(map.request_for(t.id()).is_none());
        assert!(map.contains_request(id));
        assert!(!map.mark_completed(t.id()));
        assert!(map.mark_metrics_gathered(t.id()));
        assert!(map.is_empty());
    }

    #[test]
    #[should_panic(expected = "already completed")]
    fn duplicate_completion_panics() {
        let mut map = RequestTaskMap::new();
        let (r, t) = (request(), task());
        map.associate(&r, &t);
        map.mark_completed(t.id());
        map.mark_completed(t.id());
    }

    #[test]
    #[should_panic(expected = "metrics already gathered")]
    fn duplicate_metrics_panics() {
        let mut map = RequestTaskMap::new();
        let (r, t) = (request(), task());
        map.associate(&r, &t);
        map.mark_metrics_gathered(t.id());
        map.mark_metrics_gathered(t.id());
    }

    #[test]
    #[should_panic(expected = "no event record")]
    fn third_event_panics() {
        let mut map = RequestTaskMap::new();
        let (r, t) = (request(), task());
        map.associate(&r, &t);
        map.mark_completed(t.id());
        map.mark_metrics_gathered(t.id());
        map.mark_completed(t.id());
    }

    #[test]
    #[should_panic(expected = "already associated with a task")]
    fn request_cannot_take_second_task() {
        let mut map = RequestTaskMap::new();
        let r = request();
        map.associate(&r, &task());
        map.associate(&r, &task());
    }

    #[test]
    #[should_panic(expected = "already associated with a request")]
    fn task_cannot_take_second_request() {
        let mut map = RequestTaskMap::new();
        let t = task();
        map.associate(&request(), &t);
        map.associate(&request(), &t);
    }

    #[test]
    #[should_panic(expected = "no request associated")]
    fn disassociating_unknown_task_panics() {
        let mut map = RequestTaskMap::new();
        map.disassociate_task(TaskId::next());
    }
}
