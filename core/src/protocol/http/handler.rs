/*
 * handler.rs
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

//! HTTP response handler trait.
//!
//! Events: head → body_chunk (×n) → complete. A connection or protocol failure is returned as the
//! error of the read call instead; `complete` is then never called.

use bytes::Bytes;

use crate::protocol::http::response::Response;

/// Handler for HTTP response events (push model). The connection drives this as data arrives.
pub trait ResponseHandler {
    /// Status line and headers received.
    fn head(&mut self, response: &Response);

    /// A chunk of decoded body data (chunked framing removed).
    fn body_chunk(&mut self, data: Bytes);

    /// Response fully received; `trailers` holds any chunked-encoding trailers.
    fn complete(&mut self, trailers: &[(String, String)]);
}
