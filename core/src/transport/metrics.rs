/*
 * metrics.rs
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

//! Per-task timing and byte counts.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::transport::TaskId;

/// Metrics reported once per transport task. Offsets are measured from `fetch_start`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskMetrics {
    pub task: TaskId,
    pub fetch_start: DateTime<Utc>,
    /// Connection (including TLS) established.
    pub connect_end: Option<Duration>,
    /// Response head received.
    pub response_start: Option<Duration>,
    /// Whole task, from start to completion.
    pub task_interval: Duration,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl TaskMetrics {
    pub fn new(task: TaskId, fetch_start: DateTime<Utc>) -> Self {
        Self {
            task,
            fetch_start,
            connect_end: None,
            response_start: None,
            task_interval: Duration::ZERO,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    /// Metrics for a task starting now.
    pub fn started_now(task: TaskId) -> Self {
        Self::new(task, Utc::now())
    }

    /// Time the task finished.
    pub fn fetch_end(&self) -> DateTime<Utc> {
        self.fetch_start
            + chrono::Duration::from_std(self.task_interval).unwrap_or_else(|_| chrono::Duration::zero())
    }
}
