/*
 * connection.rs
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

//! HTTP connection: one TCP or TLS stream carrying a single HTTP/1.1 exchange.
//! Writes the request, then drives the H1 parser and forwards events to a `ResponseHandler`.

use bytes::BytesMut;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream as TokioTlsStream;

use crate::protocol::http::h1::{BodyMode, H1ResponseHandler, ParseState, ResponseParser};
use crate::protocol::http::request::{HttpRequest, Method};
use crate::protocol::http::response::Response;
use crate::protocol::http::ResponseHandler;

const READ_CHUNK: usize = 8192;

/// Unified stream: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TokioTlsStream<TcpStream>>),
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Bridges H1 parser callbacks to the connection state and the caller's ResponseHandler.
struct H1Driver<'a, H: ResponseHandler + ?Sized> {
    status: &'a mut Option<(u16, Option<String>)>,
    headers: &'a mut Vec<(String, String)>,
    trailers: &'a mut Vec<(String, String)>,
    complete: &'a mut bool,
    handler: &'a mut H,
}

impl<H: ResponseHandler + ?Sized> H1ResponseHandler for H1Driver<'_, H> {
    fn status(&mut self, code: u16, reason: Option<&str>) {
        *self.status = Some((code, reason.map(|s| s.to_string())));
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn body_chunk(&mut self, data: bytes::Bytes) {
        if !data.is_empty() {
            self.handler.body_chunk(data);
        }
    }

    fn trailer(&mut self, name: &str, value: &str) {
        self.trailers.push((name.to_string(), value.to_string()));
    }

    fn complete(&mut self) {
        *self.complete = true;
    }
}

/// HTTP/1.1 connection for one request. Created by `HttpClient::connect()`.
pub struct HttpConnection {
    stream: HttpStream,
    secure: bool,
    read_buf: BytesMut,
    parser: ResponseParser,
    status: Option<(u16, Option<String>)>,
    headers: Vec<(String, String)>,
    trailers: Vec<(String, String)>,
    complete: bool,
    completion_delivered: bool,
    head_request: bool,
    bytes_received: u64,
}

impl HttpConnection {
    pub fn new(stream: HttpStream, secure: bool) -> Self {
        Self {
            stream,
            secure,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            parser: ResponseParser::new(),
            status: None,
            headers: Vec::new(),
            trailers: Vec::new(),
            complete: false,
            completion_delivered: false,
            head_request: false,
            bytes_received: 0,
        }
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Bytes read from the stream so far, including the response head.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Serialize and write the request. Returns the number of bytes written.
    pub async fn write_request(&mut self, request: &HttpRequest) -> io::Result<u64> {
        self.head_request = request.method == Method::Head;
        let mut head = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\n",
            request.method.as_str(),
            request.url.target(),
            request.url.authority()
        );
        for (k, v) in &request.headers {
            if k.eq_ignore_ascii_case("host")
                || k.eq_ignore_ascii_case("connection")
                || k.eq_ignore_ascii_case("content-length")
                || k.eq_ignore_ascii_case("transfer-encoding")
            {
                continue;
            }
            head.push_str(k);
            head.push_str(": ");
            head.push_str(v);
            head.push_str("\r\n");
        }
        if let Some(body) = &request.body {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        // One exchange per connection.
        head.push_str("Connection: close\r\n\r\n");

        self.stream.write_all(head.as_bytes()).await?;
        let mut written = head.len() as u64;
        if let Some(body) = &request.body {
            self.stream.write_all(body).await?;
            written += body.len() as u64;
        }
        self.stream.flush().await?;
        Ok(written)
    }

    /// Read until the response is complete.
    pub async fn read_response<H: ResponseHandler + ?Sized>(&mut self, handler: &mut H) -> io::Result<()> {
        while !self.read_step(handler).await? {}
        Ok(())
    }

    /// Perform one read from the stream and parse what arrived. Returns true once the response is
    /// complete and `handler.complete()` has been called.
    pub async fn read_step<H: ResponseHandler + ?Sized>(&mut self, handler: &mut H) -> io::Result<bool> {
        if self.completion_delivered {
            return Ok(true);
        }
        let mut tmp = [0u8; READ_CHUNK];
        let n = self.stream.read(&mut tmp).await?;
        if n == 0 {
            let Self { parser, status, headers, trailers, complete, .. } = &mut *self;
            let mut driver = H1Driver { status, headers, trailers, complete, handler: &mut *handler };
            parser.close(&mut driver)?;
        } else {
            self.bytes_received += n as u64;
            self.read_buf.extend_from_slice(&tmp[..n]);
            self.process(handler)?;
        }
        if self.complete && !self.completion_delivered {
            self.completion_delivered = true;
            handler.complete(&self.trailers);
        }
        Ok(self.completion_delivered)
    }

    fn process<H: ResponseHandler + ?Sized>(&mut self, handler: &mut H) -> io::Result<()> {
        loop {
            {
                let Self { parser, read_buf, status, headers, trailers, complete, .. } = &mut *self;
                let mut driver = H1Driver { status, headers, trailers, complete, handler: &mut *handler };
                parser.receive(read_buf, &mut driver)?;
            }
            if self.parser.state() != ParseState::HeadersComplete {
                return Ok(());
            }
            let (code, reason) = self
                .status
                .take()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "headers without status"))?;
            let headers = std::mem::take(&mut self.headers);
            if (100..200).contains(&code) && code != 101 {
                // Interim response; the final one follows on the same stream.
                self.parser.reset();
                continue;
            }
            let mut response = match reason {
                Some(r) => Response::with_reason(code, r),
                None => Response::new(code),
            };
            response.headers = headers;
            let mode = BodyMode::for_response(
                code,
                self.head_request,
                response.content_length(),
                response.is_chunked(),
            );
            handler.head(&response);
            let Self { parser, status, headers, trailers, complete, .. } = &mut *self;
            let mut driver = H1Driver { status, headers, trailers, complete, handler: &mut *handler };
            parser.set_body_mode(mode, &mut driver);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Collect {
        head: Option<Response>,
        body: Vec<u8>,
        chunks: usize,
        trailers: Vec<(String, String)>,
        complete: bool,
    }

    impl ResponseHandler for Collect {
        fn head(&mut self, response: &Response) {
            self.head = Some(response.clone());
        }
        fn body_chunk(&mut self, data: Bytes) {
            self.chunks += 1;
            self.body.extend_from_slice(&data);
        }
        fn complete(&mut self, trailers: &[(String, String)]) {
            self.trailers = trailers.to_vec();
            self.complete = true;
        }
    }

    async fn serve_once(reply: &'static [u8]) -> (std::net::SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut req = Vec::new();
            let mut buf = [0u8; 1024];
            while !req.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                req.extend_from_slice(&buf[..n]);
            }
            sock.write_all(reply).await.unwrap();
            sock.shutdown().await.unwrap();
            req
        });
        (addr, server)
    }

    #[tokio::test]
    async fn exchange_over_plain_tcp() {
        let (addr, server) = serve_once(
            b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nhi\r\n0\r\nX-Done: yes\r\n\r\n",
        )
        .await;
        let tcp = TcpStream::connect(addr).await.unwrap();
        let mut conn = HttpConnection::new(HttpStream::Plain(tcp), false);
        let url = format!("http://127.0.0.1:{}/path?q=1", addr.port());
        let mut req = HttpRequest::get(url.as_str()).unwrap();
        req.header("X-Test", "1");
        let written = conn.write_request(&req).await.unwrap();
        assert!(written > 0);

        let mut h = Collect::default();
        conn.read_response(&mut h).await.unwrap();
        assert!(h.complete);
        assert_eq!(h.head.as_ref().unwrap().code, 200);
        assert_eq!(h.body, b"hi");
        assert_eq!(h.trailers, vec![("X-Done".to_string(), "yes".to_string())]);
        assert!(conn.bytes_received() > 0);

        let sent = String::from_utf8(server.await.unwrap()).unwrap();
        assert!(sent.starts_with("GET /path?q=1 HTTP/1.1\r\n"));
        assert!(sent.contains(&format!("Host: 127.0.0.1:{}\r\n", addr.port())));
        assert!(sent.contains("X-Test: 1\r\n"));
        assert!(sent.contains("Connection: close\r\n"));
    }

    #[tokio::test]
    async fn truncated_body_is_error() {
        let (addr, _server) =
            serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc").await;
        let tcp = TcpStream::connect(addr).await.unwrap();
        let mut conn = HttpConnection::new(HttpStream::Plain(tcp), false);
        let req = HttpRequest::get(format!("http://127.0.0.1:{}/", addr.port()).as_str()).unwrap();
        conn.write_request(&req).await.unwrap();
        let mut h = Collect::default();
        let err = conn.read_response(&mut h).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(!h.complete);
        assert_eq!(h.body, b"abc");
    }
}
