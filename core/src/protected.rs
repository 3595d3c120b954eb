/*
 * protected.rs
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

//! Lock-protected value shared between caller threads, serial queues and transport callbacks.
//!
//! Every access runs a closure while the lock is held; the guard is dropped on every exit path,
//! including early returns of `Err` from the closure and unwinding panics. Access is not
//! re-entrant: calling `read`/`write` on the same cell from inside one of its closures deadlocks.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// A value behind an exclusive lock. All access is scoped to a closure.
pub struct Protected<T> {
    value: Mutex<T>,
}

impl<T> Protected<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// A panic inside a previous closure leaves the value as the closure left it; the lock itself
    /// is always usable again.
    fn lock(&self) -> MutexGuard<'_, T> {
        self.value.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with shared access to the value. Returns whatever `f` returns, so a closure
    /// returning `Result` propagates its error after the lock is released.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.lock();
        f(&guard)
    }

    /// Run `f` with exclusive mutable access to the value.
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Replace the value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        self.write(|v| std::mem::replace(v, value))
    }

    pub fn set(&self, value: T) {
        self.write(|v| *v = value);
    }

    pub fn into_inner(self) -> T {
        self.value
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> Protected<T> {
    /// Copy of the current value.
    pub fn get(&self) -> T {
        self.read(|v| v.clone())
    }
}

impl<T: Default> Default for Protected<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Protected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read(|v| f.debug_tuple("Protected").field(v).finish())
    }
}
