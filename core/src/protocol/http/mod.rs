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

//! HTTP/1.1 wire protocol used by the built-in transport.
//!
//! - Callback-based response API: `ResponseHandler` with `head`, `body_chunk`, `complete`.
//! - Buffers: `bytes` crate (BytesMut for the parse buffer, Bytes for body chunks).
//! - One request per connection (`Connection: close`); TLS via rustls.

mod handler;
mod request;
mod response;

pub mod client;
pub mod connection;
pub mod h1;

pub use client::HttpClient;
pub use connection::{HttpConnection, HttpStream};
pub use handler::ResponseHandler;
pub use request::{HttpRequest, Method, RequestConvertible};
pub(crate) use request::UrlRequest;
pub use response::Response;
