// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Crate-wide error type. OS failures keep their `io::Error` (and errno);
// argument and handle-state failures get their own variants so they can be
// told apart without inspecting errno.

use std::io;

use thiserror::Error;

/// Errors returned by every primitive in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying syscall failed.
    #[error("os error: {0}")]
    Io(#[from] io::Error),

    /// The wait elapsed before the object became ready.
    #[error("timed out")]
    Timeout,

    /// The handle (or the endpoint used) is closed or was never opened.
    #[error("handle is closed")]
    Closed,

    /// Unknown open-mode character.
    #[error("invalid open mode {0:?}")]
    InvalidMode(char),

    /// Unknown protection-mode character.
    #[error("invalid protection mode {0:?}")]
    InvalidProtection(char),

    /// Name unusable for a kernel-visible object.
    #[error("invalid name {0:?}")]
    InvalidName(String),

    /// Outgoing message larger than the queue's maximum message size.
    #[error("message of {len} bytes exceeds queue limit of {max} bytes")]
    MessageSize { len: usize, max: usize },

    /// Receive buffer whose length is not the queue's maximum message size.
    #[error("receive buffer of {len} bytes must match the {required}-byte message size")]
    BufferSize { len: usize, required: usize },

    /// A descriptor is already open on this instance.
    #[error("already open")]
    AlreadyOpen,

    /// A mapping already exists on this instance.
    #[error("segment is already mapped")]
    AlreadyMapped,

    /// The operation needs a mapping and there is none.
    #[error("segment is not mapped")]
    NotMapped,

    /// Access outside the current mapping.
    #[error("range {offset}+{len} exceeds mapping of {mapped} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        mapped: usize,
    },

    /// The mapping's protection does not permit the access.
    #[error("access not permitted by mapping protection")]
    Protection,
}

impl Error {
    /// Capture `errno` of the last failed syscall.
    pub(crate) fn last_os_error() -> Self {
        Error::Io(io::Error::last_os_error())
    }

    /// Whether this is a wait that ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// Whether retrying the same call may succeed: timeouts, interrupted
    /// waits and would-block results on non-blocking handles.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// The OS error code, if this error came from a syscall.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::Timeout.is_transient());
        assert!(Error::from(io::Error::from(io::ErrorKind::Interrupted)).is_transient());
        assert!(Error::from(io::Error::from_raw_os_error(libc::EAGAIN)).is_transient());
        assert!(!Error::Closed.is_transient());
        assert!(!Error::InvalidMode('x').is_transient());
    }

    #[test]
    fn raw_os_error_only_for_io() {
        let e = Error::from(io::Error::from_raw_os_error(libc::EBADF));
        assert_eq!(e.raw_os_error(), Some(libc::EBADF));
        assert_eq!(Error::Timeout.raw_os_error(), None);
    }

    #[test]
    fn size_errors_name_their_limit() {
        let send = Error::MessageSize { len: 65, max: 64 }.to_string();
        assert_eq!(send, "message of 65 bytes exceeds queue limit of 64 bytes");
        let recv = Error::BufferSize { len: 16, required: 64 }.to_string();
        assert!(recv.contains("16 bytes") && recv.contains("64-byte"), "{recv}");
    }
}
