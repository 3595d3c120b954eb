/*
 * response.rs
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

//! Value delivered to response handlers.

use std::time::Duration;

use bytes::Bytes;

use crate::error::RequestError;
use crate::protocol::http::{HttpRequest, Response};
use crate::transport::TaskMetrics;

/// Everything known about a finished request, plus the serializer's result.
#[derive(Debug, Clone)]
pub struct DataResponse<T> {
    /// Last transport request built for the call.
    pub request: Option<HttpRequest>,
    /// Response head, if the server answered.
    pub response: Option<Response>,
    pub data: Option<Bytes>,
    pub metrics: Option<TaskMetrics>,
    /// Time spent in the serializer.
    pub serialization_duration: Duration,
    pub result: Result<T, RequestError>,
}

impl<T> DataResponse<T> {
    /// A response carrying only a failure.
    pub fn failure(error: RequestError) -> Self {
        Self {
            request: None,
            response: None,
            data: None,
            metrics: None,
            serialization_duration: Duration::ZERO,
            result: Err(error),
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&RequestError> {
        self.result.as_ref().err()
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Status code of the response head, if any.
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.code)
    }

    /// Transform the success value, keeping everything else.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DataResponse<U> {
        DataResponse {
            request: self.request,
            response: self.response,
            data: self.data,
            metrics: self.metrics,
            serialization_duration: self.serialization_duration,
            result: self.result.map(f),
        }
    }
}
