/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked, or until close).

use bytes::{Buf, Bytes, BytesMut};
use std::io;

/// Callback for HTTP/1.1 response events. The connection implements this and forwards to its
/// `ResponseHandler`.
pub trait H1ResponseHandler {
    fn status(&mut self, code: u16, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: Bytes);
    fn trailer(&mut self, name: &str, value: &str);
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StatusLine,
    Headers,
    /// Headers done; the connection must call `set_body_mode()`.
    HeadersComplete,
    /// Fixed-length body.
    Body { remaining: u64 },
    /// Body delimited by connection close.
    UntilClose,
    ChunkSize,
    ChunkData { remaining: u64 },
    ChunkDataEnd,
    ChunkTrailer,
    /// Response fully parsed.
    Done,
}

/// How the body of a response is delimited, decided from the status, request method and headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    None,
    Length(u64),
    Chunked,
    UntilClose,
}

impl BodyMode {
    /// RFC 9112 section 6.3 message body length rules, minus CONNECT.
    pub fn for_response(code: u16, head_request: bool, content_length: Option<u64>, chunked: bool) -> Self {
        if head_request || (100..200).contains(&code) || code == 204 || code == 304 {
            BodyMode::None
        } else if chunked {
            BodyMode::Chunked
        } else {
            match content_length {
                Some(0) => BodyMode::None,
                Some(n) => BodyMode::Length(n),
                None => BodyMode::UntilClose,
            }
        }
    }
}

/// Push parser for one HTTP/1.1 response. Feed bytes via `receive`; the handler is invoked as
/// complete tokens are parsed. Partial tokens stay in the buffer until more bytes arrive.
pub struct ResponseParser {
    state: ParseState,
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Split one CRLF-terminated line off the front of `buf`, without the CRLF.
fn take_line(buf: &mut BytesMut) -> Option<BytesMut> {
    let end = find_crlf(buf)?;
    let mut line = buf.split_to(end + 2);
    line.truncate(end);
    Some(line)
}

fn split_header(line: &[u8], what: &str) -> io::Result<Option<(String, String)>> {
    let s = std::str::from_utf8(line).map_err(|_| invalid(what))?;
    Ok(s.find(':').map(|colon| {
        (
            s[..colon].trim().to_string(),
            s[colon + 1..].trim().to_string(),
        )
    }))
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    /// True when the peer closing the connection ends the response normally.
    pub fn completes_on_close(&self) -> bool {
        self.state == ParseState::UntilClose
    }

    pub fn reset(&mut self) {
        self.state = ParseState::StatusLine;
    }

    /// Consume and parse as much as possible from `buf`.
    pub fn receive<H: H1ResponseHandler>(
        &mut self,
        buf: &mut BytesMut,
        handler: &mut H,
    ) -> io::Result<()> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StatusLine => {
                    let line = match take_line(buf) {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    let line_str = std::str::from_utf8(&line)
                        .map_err(|_| invalid("invalid status line UTF-8"))?;
                    // HTTP/1.1 200 OK or HTTP/1.1 200
                    let mut parts = line_str.splitn(3, ' ');
                    let version = parts.next().unwrap_or("");
                    if !version.starts_with("HTTP/1.") {
                        return Err(invalid("not an HTTP/1.x status line"));
                    }
                    let code = parts
                        .next()
                        .and_then(|s| s.parse::<u16>().ok())
                        .filter(|c| (100..1000).contains(c))
                        .ok_or_else(|| invalid("invalid status code"))?;
                    let reason = parts.next().filter(|r| !r.is_empty());
                    handler.status(code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let line = match take_line(buf) {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    if let Some((name, value)) = split_header(&line, "invalid header UTF-8")? {
                        handler.header(&name, &value);
                    }
                }
                ParseState::HeadersComplete | ParseState::Done => return Ok(()),
                ParseState::Body { remaining } => {
                    let n = (remaining as usize).min(buf.len());
                    handler.body_chunk(buf.split_to(n).freeze());
                    let remaining = remaining - n as u64;
                    if remaining == 0 {
                        self.finish(handler);
                    } else {
                        self.state = ParseState::Body { remaining };
                    }
                }
                ParseState::UntilClose => {
                    let len = buf.len();
                    handler.body_chunk(buf.split_to(len).freeze());
                }
                ParseState::ChunkSize => {
                    let line = match take_line(buf) {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    let line_str =
                        std::str::from_utf8(&line).map_err(|_| invalid("invalid chunk size"))?;
                    let hex_part = line_str.split(';').next().unwrap_or(line_str).trim();
                    let size = u64::from_str_radix(hex_part, 16)
                        .map_err(|_| invalid("invalid chunk size"))?;
                    self.state = if size == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData { remaining: size }
                    };
                }
                ParseState::ChunkData { remaining } => {
                    let n = (remaining as usize).min(buf.len());
                    handler.body_chunk(buf.split_to(n).freeze());
                    let remaining = remaining - n as u64;
                    self.state = if remaining == 0 {
                        ParseState::ChunkDataEnd
                    } else {
                        ParseState::ChunkData { remaining }
                    };
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(invalid("missing CRLF after chunk data"));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let line = match take_line(buf) {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    if line.is_empty() {
                        self.finish(handler);
                    } else if let Some((name, value)) = split_header(&line, "invalid trailer")? {
                        handler.trailer(&name, &value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Called by the connection once the parser reports `HeadersComplete`.
    pub fn set_body_mode<H: H1ResponseHandler>(&mut self, mode: BodyMode, handler: &mut H) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        match mode {
            BodyMode::None => self.finish(handler),
            BodyMode::Length(n) => self.state = ParseState::Body { remaining: n },
            BodyMode::Chunked => self.state = ParseState::ChunkSize,
            BodyMode::UntilClose => self.state = ParseState::UntilClose,
        }
    }

    /// End a read-until-close body when the peer closes the connection.
    pub fn close<H: H1ResponseHandler>(&mut self, handler: &mut H) -> io::Result<()> {
        match self.state {
            ParseState::UntilClose => {
                self.finish(handler);
                Ok(())
            }
            ParseState::Done => Ok(()),
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "HTTP connection closed before response was complete",
            )),
        }
    }

    fn finish<H: H1ResponseHandler>(&mut self, handler: &mut H) {
        self.state = ParseState::Done;
        handler.complete();
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        status: Option<(u16, Option<String>)>,
        headers: Vec<(String, String)>,
        trailers: Vec<(String, String)>,
        body: Vec<u8>,
        complete: bool,
    }

    impl H1ResponseHandler for Recorder {
        fn status(&mut self, code: u16, reason: Option<&str>) {
            self.status = Some((code, reason.map(str::to_string)));
        }
        fn header(&mut self, name: &str, value: &str) {
            self.headers.push((name.into(), value.into()));
        }
        fn body_chunk(&mut self, data: Bytes) {
            self.body.extend_from_slice(&data);
        }
        fn trailer(&mut self, name: &str, value: &str) {
            self.trailers.push((name.into(), value.into()));
        }
        fn complete(&mut self) {
            self.complete = true;
        }
    }

    fn parse_head(p: &mut ResponseParser, buf: &mut BytesMut, h: &mut Recorder) {
        p.receive(buf, h).unwrap();
        assert_eq!(p.state(), ParseState::HeadersComplete);
    }

    #[test]
    fn content_length_body_split_across_reads() {
        let mut p = ResponseParser::new();
        let mut h = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhe"[..]);
        parse_head(&mut p, &mut buf, &mut h);
        p.set_body_mode(BodyMode::Length(5), &mut h);
        p.receive(&mut buf, &mut h).unwrap();
        assert!(!h.complete);
        buf.extend_from_slice(b"llo");
        p.receive(&mut buf, &mut h).unwrap();
        assert!(h.complete);
        assert_eq!(h.body, b"hello");
        assert_eq!(h.status, Some((200, Some("OK".into()))));
        assert_eq!(h.headers, vec![("Content-Length".into(), "5".into())]);
    }

    #[test]
    fn chunked_body_with_trailer() {
        let mut p = ResponseParser::new();
        let mut h = Recorder::default();
        let mut buf = BytesMut::from(
            &b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n2;ext=1\r\nde\r\n0\r\nX-T: 1\r\n\r\n"[..],
        );
        parse_head(&mut p, &mut buf, &mut h);
        p.set_body_mode(BodyMode::Chunked, &mut h);
        p.receive(&mut buf, &mut h).unwrap();
        assert!(p.is_done());
        assert_eq!(h.body, b"abcde");
        assert_eq!(h.trailers, vec![("X-T".into(), "1".into())]);
    }

    #[test]
    fn until_close_completes_on_close() {
        let mut p = ResponseParser::new();
        let mut h = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.0 200\r\n\r\nabc"[..]);
        parse_head(&mut p, &mut buf, &mut h);
        p.set_body_mode(BodyMode::UntilClose, &mut h);
        p.receive(&mut buf, &mut h).unwrap();
        assert!(p.completes_on_close());
        p.close(&mut h).unwrap();
        assert!(h.complete);
        assert_eq!(h.body, b"abc");
        assert_eq!(h.status, Some((200, None)));
    }

    #[test]
    fn close_mid_body_is_error() {
        let mut p = ResponseParser::new();
        let mut h = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 9\r\n\r\nabc"[..]);
        parse_head(&mut p, &mut buf, &mut h);
        p.set_body_mode(BodyMode::Length(9), &mut h);
        p.receive(&mut buf, &mut h).unwrap();
        let err = p.close(&mut h).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn no_body_for_204_and_head() {
        assert_eq!(BodyMode::for_response(204, false, Some(10), false), BodyMode::None);
        assert_eq!(BodyMode::for_response(200, true, Some(10), false), BodyMode::None);
        assert_eq!(BodyMode::for_response(200, false, Some(10), true), BodyMode::Chunked);
        assert_eq!(BodyMode::for_response(200, false, None, false), BodyMode::UntilClose);
    }

    #[test]
    fn rejects_garbage_status_line() {
        let mut p = ResponseParser::new();
        let mut h = Recorder::default();
        let mut buf = BytesMut::from(&b"SSH-2.0-OpenSSH\r\n"[..]);
        assert!(p.receive(&mut buf, &mut h).is_err());
    }
}
