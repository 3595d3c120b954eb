/*
 * lib.rs
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

//! C FFI for volley core. Requests run on the process-wide default session and are identified
//! by a numeric id (never 0). All string parameters are UTF-8 NUL-terminated.
//!
//! Completion callbacks run on the default session's callback queue, not on the caller's thread.
//! Pointers passed to a callback are valid only for the duration of the call.

use libc::{c_char, c_int, c_void, size_t};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use volley_core::{default_session, shutdown_default_session, DataRequest, RequestError};

/// Wrapper so *mut c_void can be moved into Send closures. C callbacks are invoked from worker threads.
struct SendableUserData(*mut c_void);
unsafe impl Send for SendableUserData {}
unsafe impl Sync for SendableUserData {}

/// Completion callback: (status, body, body_len, error, user_data).
/// `status` is the HTTP status code, or 0 when no response head arrived. `body` is NULL when no
/// bytes arrived. `error` is NULL on success.
type OnRequestComplete = extern "C" fn(c_int, *const u8, size_t, *const c_char, *mut c_void);

/// Requests in flight, keyed by id. Removed when their completion fires.
struct Registry {
    requests: RwLock<HashMap<u64, DataRequest>>,
    next_id: AtomicU64,
}

fn registry() -> &'static Registry {
    static REGISTRY: once_cell::sync::OnceCell<Registry> = once_cell::sync::OnceCell::new();
    REGISTRY.get_or_init(|| Registry {
        requests: RwLock::new(HashMap::new()),
        next_id: AtomicU64::new(1),
    })
}

fn ptr_to_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string()) }
}

fn to_cstring(s: &str) -> CString {
    CString::new(s.replace('\0', " ")).unwrap_or_default()
}

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> = const { std::cell::RefCell::new(None) };
}

fn set_last_error(message: &str) {
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(to_cstring(message)));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

/// Version string (static, do not free).
#[no_mangle]
pub extern "C" fn volley_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

/// Last error message from a failed call on this thread. Valid until the next FFI call. Do not free.
#[no_mangle]
pub extern "C" fn volley_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|s| s.as_ptr())
            .unwrap_or(ptr::null())
    })
}

/// Free a string returned by this library.
#[no_mangle]
pub unsafe extern "C" fn volley_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

/// Start a GET request for `url`. `on_complete` is called exactly once. Returns the request id,
/// or 0 on failure (see volley_last_error).
#[no_mangle]
pub unsafe extern "C" fn volley_request(
    url: *const c_char,
    on_complete: OnRequestComplete,
    user_data: *mut c_void,
) -> u64 {
    clear_last_error();
    let Some(url) = ptr_to_str(url) else {
        set_last_error("url is NULL or not UTF-8");
        return 0;
    };
    let session = match default_session() {
        Ok(s) => s,
        Err(e) => {
            set_last_error(&format!("cannot start default session: {}", e));
            return 0;
        }
    };
    let reg = registry();
    let id = reg.next_id.fetch_add(1, Ordering::Relaxed);
    let request = session.request(url);
    if let Ok(mut requests) = reg.requests.write() {
        requests.insert(id, request.clone());
    }
    let user_data = SendableUserData(user_data);
    request.response(move |response| {
        if let Ok(mut requests) = registry().requests.write() {
            requests.remove(&id);
        }
        let user_data = user_data;
        let status = response.status().map(c_int::from).unwrap_or(0);
        let error = response.error().map(|e: &RequestError| to_cstring(&e.to_string()));
        let error_ptr = error.as_ref().map(|e| e.as_ptr()).unwrap_or(ptr::null());
        let (body, body_len) = match &response.data {
            Some(data) => (data.as_ptr(), data.len()),
            None => (ptr::null(), 0),
        };
        on_complete(status, body, body_len as size_t, error_ptr, user_data.0);
    });
    id
}

/// Cancel a request. Its completion callback still fires, with an error. Returns 0 if the
/// request was found, -1 if it is unknown or already complete.
#[no_mangle]
pub extern "C" fn volley_cancel(id: u64) -> c_int {
    let request = registry()
        .requests
        .read()
        .ok()
        .and_then(|r| r.get(&id).cloned());
    match request {
        Some(request) => {
            request.cancel();
            0
        }
        None => -1,
    }
}

/// URL of the transport request built for `id`, or NULL if it has not been built yet or the id
/// is unknown. Free with volley_free_string.
#[no_mangle]
pub extern "C" fn volley_request_url(id: u64) -> *mut c_char {
    let request = registry()
        .requests
        .read()
        .ok()
        .and_then(|r| r.get(&id).cloned());
    request
        .and_then(|r| r.last_request())
        .map(|http| to_cstring(&http.url.to_string()).into_raw())
        .unwrap_or(ptr::null_mut())
}

/// Tear down the default session. In-flight requests complete with a "session invalidated"
/// error. Must not be called from inside a completion callback.
#[no_mangle]
pub extern "C" fn volley_shutdown() {
    shutdown_default_session();
    if let Ok(mut requests) = registry().requests.write() {
        requests.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_null_url() {
        extern "C" fn never(_: c_int, _: *const u8, _: size_t, _: *const c_char, _: *mut c_void) {
            panic!("callback must not run");
        }
        let id = unsafe { volley_request(ptr::null(), never, ptr::null_mut()) };
        assert_eq!(id, 0);
        let err = volley_last_error();
        assert!(!err.is_null());
        let msg = unsafe { CStr::from_ptr(err) }.to_str().unwrap();
        assert!(msg.contains("url"));
    }

    #[test]
    fn unknown_ids() {
        assert_eq!(volley_cancel(u64::MAX), -1);
        assert!(volley_request_url(u64::MAX).is_null());
    }

    #[test]
    fn version_is_nul_terminated() {
        let v = unsafe { CStr::from_ptr(volley_version()) };
        assert_eq!(v.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}
