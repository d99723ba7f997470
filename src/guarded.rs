// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Probe-then-syscall I/O for descriptors that have no native timed
// read/write (pipes and FIFOs). At most one read(2)/write(2) per call.

use std::os::fd::{AsFd, AsRawFd, OwnedFd};

use log::trace;

use crate::error::{Error, Result};
use crate::platform::posix;
use crate::readiness::{probe, Direction, Readiness};

/// Read into `buf` once `fd` is readable.
///
/// - `None` descriptor: `Err(Closed)`, nothing is probed.
/// - probe failure: `Err(Io)`.
/// - nothing readable within `timeout_ms`: `Err(Timeout)`.
/// - otherwise the result of a single `read(2)` (0 means end of stream).
pub fn guarded_read(fd: Option<&OwnedFd>, buf: &mut [u8], timeout_ms: i64) -> Result<usize> {
    let fd = fd.ok_or(Error::Closed)?;
    match probe(fd.as_raw_fd(), Direction::Read, timeout_ms) {
        Readiness::Error(e) => Err(Error::Io(e)),
        Readiness::Timeout => {
            trace!("read on fd {} timed out after {timeout_ms}ms", fd.as_raw_fd());
            Err(Error::Timeout)
        }
        Readiness::Ready => posix::read_fd(fd.as_fd(), buf),
    }
}

/// Write `buf` once `fd` is writable. Same outcomes as [`guarded_read`];
/// the byte count may be short.
pub fn guarded_write(fd: Option<&OwnedFd>, buf: &[u8], timeout_ms: i64) -> Result<usize> {
    let fd = fd.ok_or(Error::Closed)?;
    match probe(fd.as_raw_fd(), Direction::Write, timeout_ms) {
        Readiness::Error(e) => Err(Error::Io(e)),
        Readiness::Timeout => {
            trace!("write on fd {} timed out after {timeout_ms}ms", fd.as_raw_fd());
            Err(Error::Timeout)
        }
        Readiness::Ready => posix::write_fd(fd.as_fd(), buf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_descriptor_is_closed() {
        let mut buf = [0u8; 4];
        assert!(matches!(guarded_read(None, &mut buf, -1), Err(Error::Closed)));
        assert!(matches!(guarded_write(None, b"x", -1), Err(Error::Closed)));
    }

    #[test]
    fn write_then_read() {
        let (r, w) = posix::pipe().unwrap();
        assert_eq!(guarded_write(Some(&w), b"abc", 100).unwrap(), 3);
        let mut buf = [0u8; 8];
        assert_eq!(guarded_read(Some(&r), &mut buf, 100).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert!(matches!(guarded_read(Some(&r), &mut buf, 0), Err(Error::Timeout)));
    }
}
