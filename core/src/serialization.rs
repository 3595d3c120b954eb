/*
 * serialization.rs
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

//! Response serializers and the response handler methods on `DataRequest`.
//!
//! Registering a handler appends a serializer to the request's pipeline. When the request
//! finishes, the serializer runs on the session's serialization queue, builds a `DataResponse`
//! from the buffered bytes and the request's first error, and hands the delivery closure back to
//! the request, which invokes it (on the chosen queue) once every serializer has run.

use std::marker::PhantomData;
use std::time::Instant;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use crate::error::{RequestError, SerializationFailure};
use crate::protocol::http::{HttpRequest, Method, Response};
use crate::queue::SerialQueue;
use crate::request::DataRequest;
use crate::response::DataResponse;

/// Turns what a request collected into a typed value.
pub trait ResponseSerializer: Send + 'static {
    type Output: Send + 'static;

    /// `error` is the request's first error; serializers normally fail with it when present.
    fn serialize(
        &self,
        request: Option<&HttpRequest>,
        response: Option<&Response>,
        data: Option<&Bytes>,
        error: Option<&RequestError>,
    ) -> Result<Self::Output, RequestError>;
}

/// Responses that legitimately carry no body: 204, 205, and any answer to HEAD.
fn empty_response_allowed(request: Option<&HttpRequest>, response: Option<&Response>) -> bool {
    let head = request.map(|r| r.method == Method::Head).unwrap_or(false);
    let empty_code = response
        .map(|r| r.code == 204 || r.code == 205)
        .unwrap_or(false);
    head || empty_code
}

/// Body bytes as received, `None` if nothing arrived. Fails only with the request's error.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSerializer;

impl ResponseSerializer for PassthroughSerializer {
    type Output = Option<Bytes>;

    fn serialize(
        &self,
        _request: Option<&HttpRequest>,
        _response: Option<&Response>,
        data: Option<&Bytes>,
        error: Option<&RequestError>,
    ) -> Result<Option<Bytes>, RequestError> {
        match error {
            Some(error) => Err(error.clone()),
            None => Ok(data.cloned()),
        }
    }
}

/// Non-empty body bytes, or empty bytes where an empty response is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataSerializer;

impl ResponseSerializer for DataSerializer {
    type Output = Bytes;

    fn serialize(
        &self,
        request: Option<&HttpRequest>,
        response: Option<&Response>,
        data: Option<&Bytes>,
        error: Option<&RequestError>,
    ) -> Result<Bytes, RequestError> {
        if let Some(error) = error {
            return Err(error.clone());
        }
        match data {
            Some(data) if !data.is_empty() => Ok(data.clone()),
            _ if empty_response_allowed(request, response) => Ok(Bytes::new()),
            _ => Err(RequestError::ResponseSerializationFailed(
                SerializationFailure::InputDataNilOrZeroLength,
            )),
        }
    }
}

/// Body decoded as UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerializer;

impl ResponseSerializer for StringSerializer {
    type Output = String;

    fn serialize(
        &self,
        request: Option<&HttpRequest>,
        response: Option<&Response>,
        data: Option<&Bytes>,
        error: Option<&RequestError>,
    ) -> Result<String, RequestError> {
        let data = DataSerializer.serialize(request, response, data, error)?;
        String::from_utf8(data.to_vec()).map_err(|_| {
            RequestError::ResponseSerializationFailed(
                SerializationFailure::StringSerializationFailed,
            )
        })
    }
}

/// Body decoded as JSON into `T`. An allowed empty body decodes as JSON `null`, so `Option<T>`
/// and `()` accept it.
pub struct JsonSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + Send + 'static> ResponseSerializer for JsonSerializer<T> {
    type Output = T;

    fn serialize(
        &self,
        request: Option<&HttpRequest>,
        response: Option<&Response>,
        data: Option<&Bytes>,
        error: Option<&RequestError>,
    ) -> Result<T, RequestError> {
        let data = DataSerializer.serialize(request, response, data, error)?;
        let input: &[u8] = if data.is_empty() { b"null" } else { &data };
        serde_json::from_slice(input).map_err(|e| {
            RequestError::ResponseSerializationFailed(SerializationFailure::DecodingFailed(
                e.to_string(),
            ))
        })
    }
}

impl DataRequest {
    /// Deliver the raw buffered body on the session's callback queue.
    pub fn response(
        &self,
        handler: impl FnOnce(DataResponse<Option<Bytes>>) + Send + 'static,
    ) -> &Self {
        self.response_with(self.callback_queue(), PassthroughSerializer, handler)
    }

    /// Deliver the raw buffered body on `queue`.
    pub fn response_on(
        &self,
        queue: &SerialQueue,
        handler: impl FnOnce(DataResponse<Option<Bytes>>) + Send + 'static,
    ) -> &Self {
        self.response_with(queue, PassthroughSerializer, handler)
    }

    pub fn response_data(&self, handler: impl FnOnce(DataResponse<Bytes>) + Send + 'static) -> &Self {
        self.response_with(self.callback_queue(), DataSerializer, handler)
    }

    pub fn response_string(
        &self,
        handler: impl FnOnce(DataResponse<String>) + Send + 'static,
    ) -> &Self {
        self.response_with(self.callback_queue(), StringSerializer, handler)
    }

    pub fn response_json<T: DeserializeOwned + Send + 'static>(
        &self,
        handler: impl FnOnce(DataResponse<T>) + Send + 'static,
    ) -> &Self {
        self.response_with(self.callback_queue(), JsonSerializer::<T>::new(), handler)
    }

    /// Register `serializer`; `handler` receives its result on `queue`.
    pub fn response_with<S: ResponseSerializer>(
        &self,
        queue: &SerialQueue,
        serializer: S,
        handler: impl FnOnce(DataResponse<S::Output>) + Send + 'static,
    ) -> &Self {
        let request = self.request().clone();
        let queue = queue.clone();
        self.request().append_response_serializer(move || {
            let start = Instant::now();
            let last_request = request.last_request();
            let response = request.task().and_then(|task| task.response());
            let data = request.data();
            let error = request.error();
            let result = serializer.serialize(
                last_request.as_ref(),
                response.as_ref(),
                data.as_ref(),
                error.as_ref(),
            );
            let response = DataResponse {
                request: last_request,
                response,
                data,
                metrics: request.metrics(),
                serialization_duration: start.elapsed(),
                result,
            };
            tracing::trace!(request = %request.id(), success = response.is_success(), "response serialized");
            request.response_serializer_did_complete(move || {
                queue.dispatch(move || handler(response));
            });
        });
        self
    }

    /// Register `serializer` and wait for its result.
    pub async fn response_async<S: ResponseSerializer>(&self, serializer: S) -> DataResponse<S::Output> {
        let (tx, rx) = oneshot::channel();
        self.response_with(self.callback_queue(), serializer, move |response| {
            let _ = tx.send(response);
        });
        rx.await
            .unwrap_or_else(|_| DataResponse::failure(RequestError::SessionInvalidated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransportError, TransportErrorKind};
    use serde::Deserialize;

    fn get() -> HttpRequest {
        HttpRequest::get("http://serializer.test/").unwrap()
    }

    #[test]
    fn data_requires_a_body_unless_allowed() {
        let req = get();
        let ok = Response::new(200);
        let err = DataSerializer
            .serialize(Some(&req), Some(&ok), None, None)
            .unwrap_err();
        assert_eq!(
            err,
            RequestError::ResponseSerializationFailed(SerializationFailure::InputDataNilOrZeroLength)
        );
        let empty = Bytes::new();
        assert!(DataSerializer
            .serialize(Some(&req), Some(&ok), Some(&empty), None)
            .is_err());

        let no_content = Response::new(204);
        assert_eq!(
            DataSerializer.serialize(Some(&req), Some(&no_content), None, None),
            Ok(Bytes::new())
        );
        let head = HttpRequest::new(Method::Head, req.url.clone());
        assert_eq!(
            DataSerializer.serialize(Some(&head), Some(&ok), None, None),
            Ok(Bytes::new())
        );
    }

    #[test]
    fn request_error_wins_over_data() {
        let error = RequestError::Transport(TransportError::new(TransportErrorKind::Io, "reset"));
        let data = Bytes::from_static(b"partial");
        assert_eq!(
            PassthroughSerializer.serialize(None, None, Some(&data), Some(&error)),
            Err(error.clone())
        );
        assert_eq!(
            StringSerializer.serialize(None, None, Some(&data), Some(&error)),
            Err(error)
        );
        assert_eq!(PassthroughSerializer.serialize(None, None, None, None), Ok(None));
    }

    #[test]
    fn string_rejects_invalid_utf8() {
        let data = Bytes::from_static(&[0xff, 0xfe]);
        assert_eq!(
            StringSerializer.serialize(None, None, Some(&data), None),
            Err(RequestError::ResponseSerializationFailed(
                SerializationFailure::StringSerializationFailed
            ))
        );
        let data = Bytes::from_static("héllo".as_bytes());
        assert_eq!(
            StringSerializer.serialize(None, None, Some(&data), None),
            Ok("héllo".to_string())
        );
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
        name: String,
    }

    #[test]
    fn json_decodes_and_reports_failures() {
        let data = Bytes::from_static(br#"{"id":7,"name":"seven"}"#);
        let item = JsonSerializer::<Item>::new()
            .serialize(None, None, Some(&data), None)
            .unwrap();
        assert_eq!(item, Item { id: 7, name: "seven".into() });

        let bad = Bytes::from_static(b"{\"id\":");
        match JsonSerializer::<Item>::new().serialize(None, None, Some(&bad), None) {
            Err(RequestError::ResponseSerializationFailed(SerializationFailure::DecodingFailed(_))) => {}
            other => panic!("unexpected {:?}", other),
        }

        let no_content = Response::new(204);
        let empty: Option<Item> = JsonSerializer::new()
            .serialize(None, Some(&no_content), None, None)
            .unwrap();
        assert_eq!(empty, None);
    }
}
