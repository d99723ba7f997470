// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Single-descriptor readiness probe on top of select(2).
// Every descriptor-based read/write goes through here first so that the
// following syscall cannot block past the caller's timeout.

use std::io;
use std::os::fd::RawFd;
use std::ptr;

use crate::timeout::Wait;

/// Which side of the descriptor to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Outcome of a probe.
#[derive(Debug)]
pub enum Readiness {
    /// The wait itself failed (errno preserved).
    Error(io::Error),
    /// Nothing became ready before the timeout.
    Timeout,
    /// The descriptor can be used without blocking.
    Ready,
}

/// Wait until `fd` is ready for `dir`, bounded by `timeout_ms`
/// (`< 0` forever, `0` poll, `> 0` milliseconds).
pub fn probe(fd: RawFd, dir: Direction, timeout_ms: i64) -> Readiness {
    probe_wait(fd, dir, Wait::from_millis(timeout_ms))
}

fn probe_wait(fd: RawFd, dir: Direction, wait: Wait) -> Readiness {
    // fd_set is a fixed bitmap; FD_SET beyond FD_SETSIZE is out of bounds.
    if fd < 0 || fd as usize >= libc::FD_SETSIZE as usize {
        return Readiness::Error(io::Error::from_raw_os_error(libc::EBADF));
    }

    let mut set: libc::fd_set = unsafe { std::mem::zeroed() };
    let set_ptr: *mut libc::fd_set = &mut set;
    unsafe {
        libc::FD_ZERO(set_ptr);
        libc::FD_SET(fd, set_ptr);
    }

    let mut tv = libc::timeval {
        tv_sec: 0,
        tv_usec: 0,
    };
    let tv_ptr: *mut libc::timeval = match wait.relative() {
        None => ptr::null_mut(),
        Some((secs, micros)) => {
            tv.tv_sec = secs.min(libc::time_t::MAX as u64) as libc::time_t;
            tv.tv_usec = micros as libc::suseconds_t;
            &mut tv as *mut libc::timeval
        }
    };

    let (rd, wr) = match dir {
        Direction::Read => (set_ptr, ptr::null_mut()),
        Direction::Write => (ptr::null_mut(), set_ptr),
    };

    let ret = unsafe { libc::select(fd + 1, rd, wr, ptr::null_mut(), tv_ptr) };
    if ret < 0 {
        return Readiness::Error(io::Error::last_os_error());
    }
    if ret == 0 {
        return Readiness::Timeout;
    }
    if unsafe { libc::FD_ISSET(fd, set_ptr) } {
        Readiness::Ready
    } else {
        Readiness::Timeout
    }
}
