// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Named pipe (FIFO special file). The filesystem entry outlives the
// descriptor: it can be opened, closed and reopened by any process until
// `destroy` removes it.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::guarded::{guarded_read, guarded_write};
use crate::mode::AccessMode;
use crate::platform::posix;

/// A FIFO bound to a filesystem path.
#[derive(Debug)]
pub struct Fifo {
    path: PathBuf,
    fd: Option<OwnedFd>,
}

impl Fifo {
    /// Create the FIFO at `path` (an existing FIFO there is reused).
    ///
    /// `mode` is validated up front so a bad mode character fails before
    /// anything touches the filesystem; the descriptor itself is obtained
    /// with [`Fifo::open`].
    pub fn create(path: impl AsRef<Path>, mode: char) -> Result<Self> {
        AccessMode::try_from(mode)?;
        let path = path.as_ref().to_path_buf();
        let created = posix::mkfifo(&path)?;
        debug!(
            "fifo {} {}",
            path.display(),
            if created { "created" } else { "reused" }
        );
        Ok(Self { path, fd: None })
    }

    /// Open a descriptor on the FIFO.
    ///
    /// Fails with `AlreadyOpen` if this instance already holds one and with
    /// `InvalidMode` for an unknown mode character, both before any syscall.
    /// A read-only or write-only open blocks until the other side appears,
    /// as `open(2)` does for FIFOs; `d` (read-write) never does.
    pub fn open(&mut self, mode: char) -> Result<()> {
        if self.fd.is_some() {
            return Err(Error::AlreadyOpen);
        }
        let mode = AccessMode::try_from(mode)?;
        let fd = posix::open_path(&self.path, mode.flags())?;
        debug!(
            "fifo {} opened with mode '{}' (fd={})",
            self.path.display(),
            mode.as_char(),
            fd.as_raw_fd()
        );
        self.fd = Some(fd);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_block(&self, block: bool) -> Result<()> {
        let fd = self.fd.as_ref().ok_or(Error::Closed)?;
        posix::set_fd_block(fd.as_raw_fd(), block)
    }

    /// Close and remove the filesystem entry. Idempotent.
    pub fn destroy(&mut self) {
        self.close();
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("fifo {} removed", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("fifo {} not removed: {e}", self.path.display()),
        }
    }
}

impl Channel for Fifo {
    fn read(&mut self, buf: &mut [u8], timeout_ms: i64) -> Result<usize> {
        guarded_read(self.fd.as_ref(), buf, timeout_ms)
    }

    fn write(&mut self, buf: &[u8], timeout_ms: i64) -> Result<usize> {
        guarded_write(self.fd.as_ref(), buf, timeout_ms)
    }

    /// Release the descriptor; the FIFO stays on disk.
    fn close(&mut self) {
        if let Some(fd) = self.fd.take() {
            debug!("fifo {} closed (fd={})", self.path.display(), fd.as_raw_fd());
        }
    }
}
