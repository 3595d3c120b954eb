/*
 * lib.rs
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

//! Volley core: an asynchronous HTTP client runtime.
//!
//! A `Session` turns request descriptions into transport tasks, tracks each `Request` through
//! its lifecycle, and drives a chain of response serializers that deliver typed results on
//! caller-chosen serial queues.

pub mod config;
pub mod error;
pub mod net;
pub mod protected;
pub mod protocol;
pub mod queue;
pub mod request;
pub mod response;
pub mod serialization;
pub mod session;
pub mod transport;
pub mod uri;

pub use config::SessionConfig;
pub use error::{RequestError, SerializationFailure, TransportError, TransportErrorKind};
pub use protected::Protected;
pub use protocol::http::{HttpRequest, Method, RequestConvertible, Response};
pub use queue::SerialQueue;
pub use request::{DataRequest, Request, RequestId, RequestKind, RequestState};
pub use response::DataResponse;
pub use serialization::{
    DataSerializer, JsonSerializer, PassthroughSerializer, ResponseSerializer, StringSerializer,
};
pub use session::{default_session, shutdown_default_session, Session};
pub use transport::{TaskId, TaskMetrics, TaskState, Transport, TransportTask};
pub use uri::{HttpUrl, UrlConvertible};
