/*
 * uri.rs
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

//! HTTP URLs: parsing `http://` and `https://` URLs into scheme, host, port and request target.
//! Paths are percent-encoded where they contain characters that cannot appear raw in a request
//! line (space, controls, non-ASCII and a few delimiters); existing `%XX` escapes are kept.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::RequestError;

/// Characters encoded in a request target. `/`, `?`, `#`, `%` and sub-delims pass through.
const REQUEST_TARGET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

/// Path segment set: additionally encodes `/`, `?`, `#` and `%`.
const PATH_SEGMENT: &AsciiSet = &REQUEST_TARGET.add(b'/').add(b'?').add(b'#').add(b'%');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Parsed absolute HTTP URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpUrl {
    scheme: Scheme,
    host: String,
    port: u16,
    /// Path plus optional query, always starting with `/`. Fragment is dropped.
    target: String,
}

impl HttpUrl {
    /// Parse an absolute `http://` or `https://` URL.
    pub fn parse(url: &str) -> Result<Self, RequestError> {
        let invalid = || RequestError::InvalidUrl(url.to_string());
        let url_trimmed = url.trim();
        let (scheme, rest) = if let Some(r) = strip_prefix_ignore_case(url_trimmed, "https://") {
            (Scheme::Https, r)
        } else if let Some(r) = strip_prefix_ignore_case(url_trimmed, "http://") {
            (Scheme::Http, r)
        } else {
            return Err(invalid());
        };

        let (authority, target) = match rest.find(|c| c == '/' || c == '?' || c == '#') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        // Userinfo is not sent on the wire.
        let authority = match authority.rfind('@') {
            Some(i) => &authority[i + 1..],
            None => authority,
        };

        let (host, port) = if authority.starts_with('[') {
            let end = authority.find(']').ok_or_else(invalid)?;
            let h = &authority[1..end];
            let after = &authority[end + 1..];
            let p = match after.strip_prefix(':') {
                Some(port_str) => port_str.parse::<u16>().map_err(|_| invalid())?,
                None if after.is_empty() => scheme.default_port(),
                None => return Err(invalid()),
            };
            (h, p)
        } else {
            match authority.rfind(':') {
                Some(i) => {
                    let p = authority[i + 1..].parse::<u16>().map_err(|_| invalid())?;
                    (&authority[..i], p)
                }
                None => (authority, scheme.default_port()),
            }
        };
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(invalid());
        }

        let target = match target.find('#') {
            Some(i) => &target[..i],
            None => target,
        };
        let target = if target.starts_with('?') {
            format!("/{}", target)
        } else if target.is_empty() {
            "/".to_string()
        } else {
            target.to_string()
        };
        let target = utf8_percent_encode(&target, REQUEST_TARGET).to_string();

        Ok(Self {
            scheme,
            host: host.to_ascii_lowercase(),
            port,
            target,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Https
    }

    /// Request target for the request line: path and query.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn path(&self) -> &str {
        match self.target.find('?') {
            Some(i) => &self.target[..i],
            None => &self.target,
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.target.find('?').map(|i| &self.target[i + 1..])
    }

    /// Value for the Host header: host, plus port when it is not the scheme default.
    pub fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// Append a percent-encoded path segment, keeping any query.
    pub fn join_segment(&self, segment: &str) -> Self {
        let encoded = utf8_percent_encode(segment, PATH_SEGMENT).to_string();
        let path = self.path().trim_end_matches('/');
        let target = match self.query() {
            Some(q) => format!("{}/{}?{}", path, encoded, q),
            None => format!("{}/{}", path, encoded),
        };
        Self {
            target,
            ..self.clone()
        }
    }
}

impl fmt::Display for HttpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme.as_str(), self.authority(), self.target)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.is_char_boundary(prefix.len()) && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Anything that can name an HTTP URL.
pub trait UrlConvertible: Send + Sync {
    fn as_url(&self) -> Result<HttpUrl, RequestError>;
}

impl UrlConvertible for HttpUrl {
    fn as_url(&self) -> Result<HttpUrl, RequestError> {
        Ok(self.clone())
    }
}

impl UrlConvertible for str {
    fn as_url(&self) -> Result<HttpUrl, RequestError> {
        HttpUrl::parse(self)
    }
}

impl UrlConvertible for String {
    fn as_url(&self) -> Result<HttpUrl, RequestError> {
        HttpUrl::parse(self)
    }
}

impl UrlConvertible for &str {
    fn as_url(&self) -> Result<HttpUrl, RequestError> {
        HttpUrl::parse(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_default_port() {
        let u = HttpUrl::parse("https://example.test/ok").unwrap();
        assert_eq!(u.scheme(), Scheme::Https);
        assert_eq!(u.host(), "example.test");
        assert_eq!(u.port(), 443);
        assert_eq!(u.target(), "/ok");
        assert_eq!(u.authority(), "example.test");
        assert_eq!(u.to_string(), "https://example.test/ok");
    }

    #[test]
    fn explicit_port_query_and_fragment() {
        let u = HttpUrl::parse("http://Example.test:8080/a/b?x=1#frag").unwrap();
        assert_eq!(u.host(), "example.test");
        assert_eq!(u.port(), 8080);
        assert_eq!(u.target(), "/a/b?x=1");
        assert_eq!(u.path(), "/a/b");
        assert_eq!(u.query(), Some("x=1"));
        assert_eq!(u.authority(), "example.test:8080");
    }

    #[test]
    fn bare_host_and_query_only() {
        assert_eq!(HttpUrl::parse("http://h").unwrap().target(), "/");
        assert_eq!(HttpUrl::parse("http://h?q=1").unwrap().target(), "/?q=1");
    }

    #[test]
    fn ipv6_literal() {
        let u = HttpUrl::parse("http://[::1]:9000/x").unwrap();
        assert_eq!(u.host(), "::1");
        assert_eq!(u.port(), 9000);
        assert_eq!(u.authority(), "[::1]:9000");
    }

    #[test]
    fn userinfo_dropped() {
        let u = HttpUrl::parse("https://user:pw@example.test/").unwrap();
        assert_eq!(u.host(), "example.test");
    }

    #[test]
    fn rejects_bad_urls() {
        for bad in ["ftp://x/", "example.test", "http://", "http://h:port/", "http://[::1/"] {
            assert!(HttpUrl::parse(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn encodes_spaces_keeps_escapes() {
        let u = HttpUrl::parse("http://h/a b/%41").unwrap();
        assert_eq!(u.target(), "/a%20b/%41");
    }

    #[test]
    fn join_segment_encodes_slash() {
        let u = HttpUrl::parse("http://h/base/?k=v").unwrap();
        let j = u.join_segment("a/b");
        assert_eq!(j.target(), "/base/a%2Fb?k=v");
    }
}
