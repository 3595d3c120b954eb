/*
 * error.rs
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

//! Request, transport and serialization errors.

use std::fmt;
use std::io;

/// Category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The task was cancelled before it completed.
    Cancelled,
    TimedOut,
    /// TCP connect failed or the host could not be resolved.
    Connect,
    Tls,
    Io,
    /// The peer sent something that is not valid HTTP/1.1.
    Protocol,
}

/// Error reported by the transport in its completion event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == TransportErrorKind::Cancelled
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        let kind = match e.kind() {
            io::ErrorKind::TimedOut => TransportErrorKind::TimedOut,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable => TransportErrorKind::Connect,
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                TransportErrorKind::Protocol
            }
            _ => TransportErrorKind::Io,
        };
        Self::new(kind, e.to_string())
    }
}

/// Why a response serializer could not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializationFailure {
    /// No bytes were received and the response does not allow an empty body.
    InputDataNilOrZeroLength,
    /// Body is not valid UTF-8.
    StringSerializationFailed,
    /// Body could not be decoded as JSON into the requested type.
    DecodingFailed(String),
}

impl fmt::Display for SerializationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationFailure::InputDataNilOrZeroLength => {
                write!(f, "response data was nil or zero length")
            }
            SerializationFailure::StringSerializationFailed => {
                write!(f, "response data is not valid UTF-8")
            }
            SerializationFailure::DecodingFailed(m) => write!(f, "decoding failed: {}", m),
        }
    }
}

/// Error attached to a Request and delivered to its response handlers.
///
/// Cloneable: the same terminal error is handed to every serializer registered on the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The request description could not be turned into a transport request.
    CreateRequestFailed(String),
    /// The URL could not be parsed.
    InvalidUrl(String),
    /// `cancel()` was called on the request.
    ExplicitlyCancelled,
    /// The owning session went away while the request was in flight.
    SessionInvalidated,
    Transport(TransportError),
    ResponseSerializationFailed(SerializationFailure),
}

impl RequestError {
    pub fn is_explicitly_cancelled(&self) -> bool {
        matches!(self, RequestError::ExplicitlyCancelled)
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            RequestError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::CreateRequestFailed(m) => write!(f, "failed to create request: {}", m),
            RequestError::InvalidUrl(u) => write!(f, "invalid URL: {}", u),
            RequestError::ExplicitlyCancelled => write!(f, "request explicitly cancelled"),
            RequestError::SessionInvalidated => write!(f, "session invalidated"),
            RequestError::Transport(e) => write!(f, "transport error: {}", e),
            RequestError::ResponseSerializationFailed(r) => {
                write!(f, "response serialization failed: {}", r)
            }
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for RequestError {
    fn from(e: TransportError) -> Self {
        RequestError::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_kinds_map_to_transport_kinds() {
        let e: TransportError = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert_eq!(e.kind, TransportErrorKind::TimedOut);
        let e: TransportError = io::Error::new(io::ErrorKind::ConnectionRefused, "no").into();
        assert_eq!(e.kind, TransportErrorKind::Connect);
        let e: TransportError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert_eq!(e.kind, TransportErrorKind::Protocol);
    }

    #[test]
    fn display_includes_cause() {
        let e = RequestError::from(TransportError::new(TransportErrorKind::Io, "reset"));
        assert_eq!(e.to_string(), "transport error: Io: reset");
        assert!(e.transport_error().is_some());
        assert!(RequestError::ExplicitlyCancelled.is_explicitly_cancelled());
    }
}
