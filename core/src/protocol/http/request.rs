/*
 * request.rs
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

//! HTTP request: method, URL, headers, optional body.
//!
//! An `HttpRequest` is the built transport request a session hands to its transport. Anything that
//! can produce one implements `RequestConvertible`.

use bytes::Bytes;

use crate::error::RequestError;
use crate::uri::{HttpUrl, UrlConvertible};

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Other(&'static str),
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Other(s) => s,
        }
    }
}

/// A fully built request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: HttpUrl,
    /// Header order is preserved on the wire.
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: HttpUrl) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl UrlConvertible) -> Result<Self, RequestError> {
        Ok(Self::new(Method::Get, url.as_url()?))
    }

    /// Add or replace a header. Names compare case-insensitively.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add the header only if no header of that name is present.
    pub fn header_if_absent(&mut self, name: &str, value: &str) -> &mut Self {
        if self.header_value(name).is_none() {
            self.headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    /// Set request body (sent as-is with a Content-Length).
    pub fn body(&mut self, data: impl Into<Bytes>) -> &mut Self {
        self.body = Some(data.into());
        self
    }
}

/// A description from which a transport request can be built.
pub trait RequestConvertible: Send + Sync {
    fn as_request(&self) -> Result<HttpRequest, RequestError>;
}

impl RequestConvertible for HttpRequest {
    fn as_request(&self) -> Result<HttpRequest, RequestError> {
        Ok(self.clone())
    }
}

/// URL plus method; what `Session::request(url)` builds from.
pub(crate) struct UrlRequest<U> {
    pub url: U,
    pub method: Method,
}

impl<U: UrlConvertible> RequestConvertible for UrlRequest<U> {
    fn as_request(&self) -> Result<HttpRequest, RequestError> {
        Ok(HttpRequest::new(self.method, self.url.as_url()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_replaces_case_insensitively() {
        let mut r = HttpRequest::get("http://h/").unwrap();
        r.header("Accept", "a").header("accept", "b");
        assert_eq!(r.headers, vec![("accept".to_string(), "b".to_string())]);
        r.header_if_absent("ACCEPT", "c");
        assert_eq!(r.header_value("Accept"), Some("b"));
    }

    #[test]
    fn url_request_builds_or_fails() {
        let ok = UrlRequest { url: "https://example.test/ok", method: Method::Get };
        let built = ok.as_request().unwrap();
        assert_eq!(built.method, Method::Get);
        assert_eq!(built.url.target(), "/ok");

        let bad = UrlRequest { url: "not a url", method: Method::Get };
        assert!(matches!(bad.as_request(), Err(RequestError::InvalidUrl(_))));
    }
}
