// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The read/write/close capability shared by Pipe, Fifo and MessageQueue.

use crate::error::Result;

/// A byte or message channel with per-call timeouts.
///
/// `timeout_ms` follows the crate-wide convention: `< 0` blocks
/// indefinitely, `0` never blocks, `> 0` waits at most that long.
/// A wait that runs out surfaces as [`Error::Timeout`](crate::Error::Timeout);
/// using a closed handle surfaces as [`Error::Closed`](crate::Error::Closed)
/// without any syscall being issued.
pub trait Channel {
    /// Read into `buf`, returning the number of bytes (or the message size).
    fn read(&mut self, buf: &mut [u8], timeout_ms: i64) -> Result<usize>;

    /// Write `buf`, returning the number of bytes accepted.
    fn write(&mut self, buf: &[u8], timeout_ms: i64) -> Result<usize>;

    /// Release the handle. Safe to call any number of times.
    fn close(&mut self);
}
