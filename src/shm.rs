// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Named POSIX shared-memory segment with at most one mapping per handle.

use std::ffi::CString;
use std::os::fd::{AsFd, OwnedFd};
use std::ptr::NonNull;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::mode::{AccessMode, Protection};
use crate::names;
use crate::platform::posix;

#[derive(Debug)]
struct Mapping {
    addr: NonNull<u8>,
    len: usize,
    prot: Protection,
}

/// A named shared-memory object.
///
/// Opening only yields a descriptor; [`SharedMemory::map`] makes the
/// memory addressable. The mapping's address, length and protection are
/// kept together and released together.
#[derive(Debug)]
pub struct SharedMemory {
    name: String,
    c_name: CString,
    fd: Option<OwnedFd>,
    mapping: Option<Mapping>,
}

// Safety: the mapping is process-shared memory; writes require `&mut self`.
unsafe impl Send for SharedMemory {}
unsafe impl Sync for SharedMemory {}

impl SharedMemory {
    /// Open (or, for every mode but `r`, create) the segment `name`.
    ///
    /// `w` truncates an existing segment to zero length. Every mode except
    /// `r` opens the object read-write.
    pub fn open(name: &str, mode: char) -> Result<Self> {
        let mode = AccessMode::try_from(mode)?;
        let (posix_name, c_name) = names::posix_cname(name)?;
        let fd = posix::shm_open(&c_name, mode.shm_flags())?;
        debug!("shm {posix_name} opened with mode '{}'", mode.as_char());
        Ok(Self {
            name: posix_name,
            c_name,
            fd: Some(fd),
            mapping: None,
        })
    }

    /// Remove a segment name without holding it open. A missing name is
    /// not an error.
    pub fn unlink_by_name(name: &str) -> Result<()> {
        let (_, c_name) = names::posix_cname(name)?;
        posix::shm_unlink(&c_name)
    }

    /// POSIX name (with leading '/').
    pub fn name(&self) -> &str {
        &self.name
    }

    fn fd(&self) -> Result<&OwnedFd> {
        self.fd.as_ref().ok_or(Error::Closed)
    }

    /// Resize the segment (`ftruncate`). A new segment is empty until sized.
    pub fn set_len(&self, len: usize) -> Result<()> {
        posix::ftruncate(self.fd()?.as_fd(), len)
    }

    /// Current size of the segment.
    pub fn len(&self) -> Result<usize> {
        posix::fd_len(self.fd()?.as_fd())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }

    /// Map `len` bytes at `offset` with protection `mode` (`r`, `w`, `e`,
    /// `d` read-write, `n` none, `m` read-write-execute). `shared` selects
    /// `MAP_SHARED` (writes visible to other processes) over `MAP_PRIVATE`.
    ///
    /// Rejected without a syscall if a mapping already exists or `mode` is
    /// unknown. Returns the mapped address, which is also retained.
    pub fn map(&mut self, len: usize, mode: char, shared: bool, offset: i64) -> Result<NonNull<u8>> {
        if self.mapping.is_some() {
            return Err(Error::AlreadyMapped);
        }
        let prot = Protection::try_from(mode)?;
        let fd = self.fd()?;
        let addr = posix::mmap(fd.as_fd(), len, prot.prot(), shared, offset as libc::off_t)?;
        debug!(
            "shm {} mapped {len} bytes at {addr:p} (prot={prot:?}, shared={shared})",
            self.name
        );
        self.mapping = Some(Mapping { addr, len, prot });
        Ok(addr)
    }

    /// Release the mapping. No-op when unmapped.
    pub fn unmap(&mut self) {
        if let Some(m) = self.mapping.take() {
            match unsafe { posix::munmap(m.addr, m.len) } {
                Ok(()) => debug!("shm {} unmapped", self.name),
                Err(e) => warn!("shm {} munmap failed: {e}", self.name),
            }
        }
    }

    pub fn addr(&self) -> Option<NonNull<u8>> {
        self.mapping.as_ref().map(|m| m.addr)
    }

    /// Length of the current mapping, 0 when unmapped.
    pub fn mapped_len(&self) -> usize {
        self.mapping.as_ref().map_or(0, |m| m.len)
    }

    pub fn protection(&self) -> Option<Protection> {
        self.mapping.as_ref().map(|m| m.prot)
    }

    fn checked(&self, offset: usize, len: usize) -> Result<&Mapping> {
        let m = self.mapping.as_ref().ok_or(Error::NotMapped)?;
        match offset.checked_add(len) {
            Some(end) if end <= m.len => Ok(m),
            _ => Err(Error::OutOfBounds {
                offset,
                len,
                mapped: m.len,
            }),
        }
    }

    /// Address of `len` bytes at `offset` in a read-write mapping, for
    /// objects that live inside the segment.
    pub(crate) fn region(&self, offset: usize, len: usize) -> Result<NonNull<u8>> {
        let m = self.checked(offset, len)?;
        if !(m.prot.readable() && m.prot.writable()) {
            return Err(Error::Protection);
        }
        // Safety: offset + len lies inside the mapping.
        Ok(unsafe { NonNull::new_unchecked(m.addr.as_ptr().add(offset)) })
    }

    /// Copy `buf.len()` bytes out of the mapping starting at `offset`.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let m = self.checked(offset, buf.len())?;
        if !m.prot.readable() {
            return Err(Error::Protection);
        }
        unsafe {
            std::ptr::copy_nonoverlapping(m.addr.as_ptr().add(offset), buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    /// Copy `buf` into the mapping starting at `offset`.
    pub fn write_at(&mut self, offset: usize, buf: &[u8]) -> Result<()> {
        let m = self.checked(offset, buf.len())?;
        if !m.prot.writable() {
            return Err(Error::Protection);
        }
        unsafe {
            std::ptr::copy_nonoverlapping(buf.as_ptr(), m.addr.as_ptr().add(offset), buf.len());
        }
        Ok(())
    }

    /// Unmap and release the descriptor; the name stays. Idempotent.
    pub fn close(&mut self) {
        self.unmap();
        if self.fd.take().is_some() {
            debug!("shm {} closed", self.name);
        }
    }

    /// Unmap, close and remove the name. Idempotent.
    pub fn destroy(&mut self) {
        self.close();
        match posix::shm_unlink(&self.c_name) {
            Ok(()) => debug!("shm {} unlinked", self.name),
            Err(e) => warn!("shm {} not unlinked: {e}", self.name),
        }
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        self.close();
    }
}
