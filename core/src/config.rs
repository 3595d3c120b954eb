/*
 * config.rs
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

//! Session configuration: queue label, start policy, connect timeout and default request headers.
//!
//! Defaults can be overridden from the environment with `SessionConfig::from_env()`:
//! `VOLLEY_CONNECT_TIMEOUT_SECS` (whole seconds) and `VOLLEY_START_IMMEDIATELY` (`1`/`true` or
//! `0`/`false`). Unparseable values are ignored.

use std::time::Duration;

/// Root queue label used when none is configured.
pub const DEFAULT_ROOT_QUEUE_LABEL: &str = "volley.rootQueue";

/// TCP connect timeout used by the HTTP transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

const ENV_CONNECT_TIMEOUT: &str = "VOLLEY_CONNECT_TIMEOUT_SECS";
const ENV_START_IMMEDIATELY: &str = "VOLLEY_START_IMMEDIATELY";

/// Settings for a `Session` and the transport it drives.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Label of the root queue; the request and serialization queues derive theirs from it.
    pub label: String,
    /// When true, a request resumes as soon as its first response handler is attached.
    pub start_requests_immediately: bool,
    pub connect_timeout: Duration,
    /// Headers added to every transport request that does not already carry them.
    pub default_headers: Vec<(String, String)>,
}

impl SessionConfig {
    /// Like `default()` but without default headers.
    pub fn ephemeral() -> Self {
        Self {
            default_headers: Vec::new(),
            ..Self::default()
        }
    }

    /// Defaults, overridden by `VOLLEY_*` environment variables when set.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|name| std::env::var(name).ok())
    }

    fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(secs) = lookup(ENV_CONNECT_TIMEOUT).and_then(|v| v.trim().parse::<u64>().ok()) {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = lookup(ENV_START_IMMEDIATELY) {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.start_requests_immediately = true,
                "0" | "false" | "no" => self.start_requests_immediately = false,
                _ => {}
            }
        }
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn start_requests_immediately(mut self, start: bool) -> Self {
        self.start_requests_immediately = start;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Add or replace a default header (name compared case-insensitively).
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.default_headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.default_headers.push((name, value.into()));
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_ROOT_QUEUE_LABEL.to_string(),
            start_requests_immediately: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            default_headers: vec![
                (
                    "User-Agent".to_string(),
                    format!("volley/{}", env!("CARGO_PKG_VERSION")),
                ),
                ("Accept".to_string(), "*/*".to_string()),
            ],
        }
    }
}
