/*
 * client.rs
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

//! HTTP client: open a TCP or TLS connection for a URL.

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use crate::net::http_client_config;
use crate::protocol::http::connection::{HttpConnection, HttpStream};
use crate::uri::HttpUrl;

/// HTTP client. `HttpClient::connect(url, timeout)` returns a connection ready for one request.
pub struct HttpClient;

impl HttpClient {
    /// Connect to the URL's host and port. For `https` URLs, performs the TLS handshake (ALPN
    /// `http/1.1`). `connect_timeout` bounds the TCP connect and the handshake separately.
    pub async fn connect(url: &HttpUrl, connect_timeout: Duration) -> io::Result<HttpConnection> {
        let addr = (url.host(), url.port());
        let tcp = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TCP connect timed out"))??;
        tcp.set_nodelay(true)?;
        tracing::trace!(host = url.host(), port = url.port(), "TCP connected");

        if !url.is_secure() {
            return Ok(HttpConnection::new(HttpStream::Plain(tcp), false));
        }
        let server_name = ServerName::try_from(url.host().to_string())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))?;
        let connector = TlsConnector::from(http_client_config());
        let tls = timeout(connect_timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))?
            .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;
        tracing::trace!(host = url.host(), "TLS handshake complete");
        Ok(HttpConnection::new(HttpStream::Tls(Box::new(tls)), true))
    }
}
