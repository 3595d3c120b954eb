/*
 * data.rs
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

use std::ops::Deref;
use std::sync::Arc;

use crate::request::Request;

/// Request whose response body is buffered in memory.
///
/// Derefs to the underlying `Arc<Request>` for lifecycle control and accessors. Response
/// handlers are registered through the methods in `serialization`.
#[derive(Debug, Clone)]
pub struct DataRequest {
    request: Arc<Request>,
}

impl DataRequest {
    pub(crate) fn new(request: Arc<Request>) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }
}

impl Deref for DataRequest {
    type Target = Arc<Request>;

    fn deref(&self) -> &Arc<Request> {
        &self.request
    }
}
