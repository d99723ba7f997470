// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The signed millisecond timeout shared by every blocking call:
//   < 0  block indefinitely
//   == 0 poll, never block
//   > 0  wait at most that many milliseconds

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Decoded form of a millisecond timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Return immediately with the current state.
    Poll,
    /// Wait up to the given duration.
    For(Duration),
    /// Wait with no deadline.
    Forever,
}

impl Wait {
    pub fn from_millis(timeout_ms: i64) -> Self {
        match timeout_ms {
            t if t < 0 => Wait::Forever,
            0 => Wait::Poll,
            t => Wait::For(Duration::from_millis(t as u64)),
        }
    }

    /// Relative `(seconds, microseconds)` split for `select(2)`, `None`
    /// when unbounded.
    pub fn relative(self) -> Option<(u64, u32)> {
        match self {
            Wait::Forever => None,
            Wait::Poll => Some((0, 0)),
            Wait::For(d) => Some((d.as_secs(), d.subsec_micros())),
        }
    }

    /// Absolute `CLOCK_REALTIME` deadline (now + timeout) for the native
    /// timed syscalls. `None` when unbounded.
    pub fn deadline(self) -> Option<libc::timespec> {
        let rel = match self {
            Wait::Forever => return None,
            Wait::Poll => Duration::ZERO,
            Wait::For(d) => d,
        };
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let at = now.saturating_add(rel);
        Some(libc::timespec {
            tv_sec: at.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_nsec: at.subsec_nanos() as libc::c_long,
        })
    }
}

impl From<i64> for Wait {
    fn from(timeout_ms: i64) -> Self {
        Wait::from_millis(timeout_ms)
    }
}
