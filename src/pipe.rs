// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Anonymous half-duplex pipe with independently closable endpoints.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use log::{debug, warn};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::guarded::{guarded_read, guarded_write};
use crate::platform::posix;

/// An anonymous pipe.
///
/// Both endpoints are created together by [`Pipe::new`]; each can then be
/// closed on its own (e.g. the unused side after a `fork`). Descriptors are
/// released exactly once, on explicit close or on drop.
#[derive(Debug)]
pub struct Pipe {
    read_end: Option<OwnedFd>,
    write_end: Option<OwnedFd>,
}

impl Pipe {
    pub fn new() -> Result<Self> {
        let (r, w) = posix::pipe()?;
        debug!("pipe opened (r={}, w={})", r.as_raw_fd(), w.as_raw_fd());
        Ok(Self {
            read_end: Some(r),
            write_end: Some(w),
        })
    }

    /// Close the read end. No-op if already closed.
    pub fn close_r(&mut self) {
        if let Some(fd) = self.read_end.take() {
            debug!("pipe read end {} closed", fd.as_raw_fd());
        }
    }

    /// Close the write end. No-op if already closed.
    pub fn close_w(&mut self) {
        if let Some(fd) = self.write_end.take() {
            debug!("pipe write end {} closed", fd.as_raw_fd());
        }
    }

    pub fn read_fd(&self) -> Option<RawFd> {
        self.read_end.as_ref().map(AsRawFd::as_raw_fd)
    }

    pub fn write_fd(&self) -> Option<RawFd> {
        self.write_end.as_ref().map(AsRawFd::as_raw_fd)
    }

    fn open_ends(&self) -> impl Iterator<Item = &OwnedFd> {
        self.read_end.iter().chain(self.write_end.iter())
    }

    /// Switch every open endpoint between blocking and non-blocking mode.
    pub fn set_block(&self, block: bool) -> Result<()> {
        let mut any = false;
        for fd in self.open_ends() {
            posix::set_fd_block(fd.as_raw_fd(), block)?;
            any = true;
        }
        if any {
            Ok(())
        } else {
            Err(Error::Closed)
        }
    }

    /// Endpoint used for buffer sizing: the write end while it is open.
    fn sizing_end(&self) -> Result<&OwnedFd> {
        self.write_end
            .as_ref()
            .or(self.read_end.as_ref())
            .ok_or(Error::Closed)
    }

    /// Request a kernel buffer of `bytes`.
    ///
    /// Best effort: on Linux this is `F_SETPIPE_SZ` on the write end (the
    /// read end once the write end is closed) and a refusal is only
    /// logged; elsewhere the request is accepted and ignored.
    pub fn set_size(&self, bytes: usize) -> Result<()> {
        let fd = self.sizing_end()?;
        #[cfg(target_os = "linux")]
        {
            match posix::set_pipe_size(fd.as_raw_fd(), bytes) {
                Ok(actual) => debug!("pipe {} resized to {actual} bytes", fd.as_raw_fd()),
                Err(e) => warn!("pipe resize to {bytes} bytes refused: {e}"),
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            warn!(
                "pipe {} resize to {bytes} bytes unsupported on this platform",
                fd.as_raw_fd()
            );
        }
        Ok(())
    }

    /// Current kernel buffer size (Linux only).
    #[cfg(target_os = "linux")]
    pub fn capacity(&self) -> Result<usize> {
        let fd = self.sizing_end()?;
        posix::pipe_size(fd.as_raw_fd())
    }
}

impl Channel for Pipe {
    fn read(&mut self, buf: &mut [u8], timeout_ms: i64) -> Result<usize> {
        guarded_read(self.read_end.as_ref(), buf, timeout_ms)
    }

    fn write(&mut self, buf: &[u8], timeout_ms: i64) -> Result<usize> {
        guarded_write(self.write_end.as_ref(), buf, timeout_ms)
    }

    fn close(&mut self) {
        self.close_w();
        self.close_r();
    }
}
