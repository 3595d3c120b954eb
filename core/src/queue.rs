/*
 * queue.rs
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

//! Serial queues: single-consumer run-to-completion work queues on a tokio runtime.
//!
//! A root queue owns an `mpsc::UnboundedSender` and a spawned loop that runs submitted closures
//! one at a time, in submission order. A queue created with a target has no loop of its own; its
//! work is forwarded into the target's channel, so everything submitted to a target and to the
//! queues targeting it runs in one total order. While a work item runs, `is_current()` is true for
//! the queue it was submitted to and for every queue in that queue's target chain.
//!
//! A panic in a work item is fatal: it is logged and the process aborts, since the state guarded by
//! queue confinement can no longer be trusted.

use std::cell::RefCell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

type Work = Box<dyn FnOnce() + Send>;

/// Process-unique queue identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct QueueId(u64);

impl QueueId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        QueueId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// One unit of work plus the chain of queues it counts as running on.
struct Job {
    chain: Arc<[QueueId]>,
    work: Work,
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<[QueueId]>>> = const { RefCell::new(None) };
}

/// Restores the previous current chain when dropped.
struct CurrentScope {
    previous: Option<Arc<[QueueId]>>,
}

impl CurrentScope {
    fn enter(chain: Arc<[QueueId]>) -> Self {
        let previous = CURRENT.with(|c| c.borrow_mut().replace(chain));
        Self { previous }
    }
}

impl Drop for CurrentScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|c| *c.borrow_mut() = previous);
    }
}

struct QueueInner {
    id: QueueId,
    label: String,
    chain: Arc<[QueueId]>,
    sender: mpsc::UnboundedSender<Job>,
}

/// Handle to a serial queue. Cheaply cloneable; clones submit to the same queue.
#[derive(Clone)]
pub struct SerialQueue {
    inner: Arc<QueueInner>,
}

impl SerialQueue {
    /// Create a root queue whose loop runs on the given runtime.
    pub fn new(label: impl Into<String>, handle: &Handle) -> Self {
        let label = label.into();
        let id = QueueId::next();
        let (sender, receiver) = mpsc::unbounded_channel();
        handle.spawn(queue_loop(label.clone(), receiver));
        Self {
            inner: Arc::new(QueueInner {
                id,
                label,
                chain: Arc::from(vec![id]),
                sender,
            }),
        }
    }

    /// Create a root queue on the runtime of the calling context. Panics outside a tokio runtime.
    pub fn current(label: impl Into<String>) -> Self {
        Self::new(label, &Handle::current())
    }

    /// Create a queue that feeds its work through `target`.
    pub fn with_target(label: impl Into<String>, target: &SerialQueue) -> Self {
        let id = QueueId::next();
        let mut chain = Vec::with_capacity(target.inner.chain.len() + 1);
        chain.push(id);
        chain.extend_from_slice(&target.inner.chain);
        Self {
            inner: Arc::new(QueueInner {
                id,
                label: label.into(),
                chain: Arc::from(chain),
                sender: target.inner.sender.clone(),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Submit work. Never blocks. Work submitted after the queue's runtime has shut down is dropped.
    pub fn dispatch(&self, work: impl FnOnce() + Send + 'static) {
        let job = Job {
            chain: self.inner.chain.clone(),
            work: Box::new(work),
        };
        if self.inner.sender.send(job).is_err() {
            tracing::warn!(queue = %self.inner.label, "queue loop has stopped; dropping work item");
        }
    }

    /// True while the calling code runs a work item submitted to this queue or to a queue that
    /// targets it.
    pub fn is_current(&self) -> bool {
        let id = self.inner.id;
        CURRENT.with(|c| {
            c.borrow()
                .as_ref()
                .map(|chain| chain.contains(&id))
                .unwrap_or(false)
        })
    }

    /// Assert that the calling code is running on this queue.
    #[track_caller]
    pub fn precondition(&self) {
        assert!(
            self.is_current(),
            "must be called on queue {}",
            self.inner.label
        );
    }

    /// Wait until every work item submitted before this call has run.
    pub async fn barrier(&self) {
        let (tx, rx) = oneshot::channel();
        self.dispatch(move || {
            let _ = tx.send(());
        });
        let _ = rx.await;
    }
}

impl fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialQueue")
            .field("label", &self.inner.label)
            .finish()
    }
}

async fn queue_loop(label: String, mut receiver: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = receiver.recv().await {
        let _scope = CurrentScope::enter(job.chain);
        if catch_unwind(AssertUnwindSafe(job.work)).is_err() {
            tracing::error!(queue = %label, "work item panicked on serial queue; aborting");
            std::process::abort();
        }
    }
    tracing::trace!(queue = %label, "queue loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn runs_in_submission_order() {
        let queue = SerialQueue::current("test.order");
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let seen = seen.clone();
            queue.dispatch(move || seen.lock().unwrap().push(i));
        }
        queue.barrier().await;
        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn targeted_queue_shares_order_with_target() {
        let root = SerialQueue::current("test.root");
        let child = SerialQueue::with_target("test.root.child", &root);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let s = seen.clone();
            root.dispatch(move || s.lock().unwrap().push(("root", i)));
            let s = seen.clone();
            child.dispatch(move || s.lock().unwrap().push(("child", i)));
        }
        root.barrier().await;
        let seen = seen.lock().unwrap();
        for (n, entry) in seen.iter().enumerate() {
            let expected = if n % 2 == 0 { "root" } else { "child" };
            assert_eq!(entry.0, expected);
            assert_eq!(entry.1, n / 2);
        }
    }

    #[tokio::test]
    async fn is_current_follows_target_chain() {
        let root = SerialQueue::current("test.current.root");
        let child = SerialQueue::with_target("test.current.child", &root);
        let other = SerialQueue::current("test.current.other");
        assert!(!root.is_current());

        let (tx, rx) = oneshot::channel();
        let (r, c, o) = (root.clone(), child.clone(), other.clone());
        child.dispatch(move || {
            let _ = tx.send((r.is_current(), c.is_current(), o.is_current()));
        });
        assert_eq!(rx.await.unwrap(), (true, true, false));

        let (tx, rx) = oneshot::channel();
        let c = child.clone();
        root.dispatch(move || {
            let _ = tx.send(c.is_current());
        });
        assert!(!rx.await.unwrap());
    }

    #[test]
    #[should_panic(expected = "must be called on queue")]
    fn precondition_fails_off_queue() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let queue = SerialQueue::new("test.precondition", runtime.handle());
        queue.precondition();
    }
}
