// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Thin POSIX syscall layer. Everything here returns `Result` with errno
// preserved; validity checks and lifecycle live in the public types.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr::{self, NonNull};

use crate::error::{Error, Result};
use crate::timeout::Wait;

/// Permission bits for every object created by this crate (before umask).
pub(crate) const PERMS: libc::mode_t = 0o666;

fn path_cstring(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::InvalidName(path.display().to_string()))
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Create an anonymous pipe, returning `(read_end, write_end)`.
pub(crate) fn pipe() -> Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [-1, -1];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(Error::last_os_error());
    }
    // Safety: pipe(2) succeeded, both descriptors are fresh and owned by us.
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

/// Create a FIFO special file. An existing FIFO at `path` is accepted;
/// any other existing file type is an error.
pub(crate) fn mkfifo(path: &Path) -> Result<bool> {
    let c_path = path_cstring(path)?;
    if unsafe { libc::mkfifo(c_path.as_ptr(), PERMS) } == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EEXIST) {
        use std::os::unix::fs::FileTypeExt;
        if std::fs::symlink_metadata(path)?.file_type().is_fifo() {
            return Ok(false);
        }
    }
    Err(Error::Io(err))
}

/// `open(2)` a path with raw flags.
pub(crate) fn open_path(path: &Path, flags: libc::c_int) -> Result<OwnedFd> {
    let c_path = path_cstring(path)?;
    let fd = unsafe { libc::open(c_path.as_ptr(), flags, PERMS as libc::c_uint) };
    if fd < 0 {
        return Err(Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Toggle `O_NONBLOCK` on a descriptor.
pub(crate) fn set_fd_block(fd: RawFd, block: bool) -> Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(Error::last_os_error());
    }
    let flags = if block {
        flags & !libc::O_NONBLOCK
    } else {
        flags | libc::O_NONBLOCK
    };
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } != 0 {
        return Err(Error::last_os_error());
    }
    Ok(())
}

/// One `read(2)`, result passed through.
pub(crate) fn read_fd(fd: BorrowedFd<'_>, buf: &mut [u8]) -> Result<usize> {
    let n = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        return Err(Error::last_os_error());
    }
    Ok(n as usize)
}

/// One `write(2)`, result passed through.
pub(crate) fn write_fd(fd: BorrowedFd<'_>, buf: &[u8]) -> Result<usize> {
    let n = unsafe { libc::write(fd.as_raw_fd(), buf.as_ptr().cast(), buf.len()) };
    if n < 0 {
        return Err(Error::last_os_error());
    }
    Ok(n as usize)
}

#[cfg(target_os = "linux")]
pub(crate) fn set_pipe_size(fd: RawFd, size: usize) -> Result<usize> {
    let size = libc::c_int::try_from(size)
        .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
    let ret = unsafe { libc::fcntl(fd, libc::F_SETPIPE_SZ, size) };
    if ret < 0 {
        return Err(Error::last_os_error());
    }
    Ok(ret as usize)
}

#[cfg(target_os = "linux")]
pub(crate) fn pipe_size(fd: RawFd) -> Result<usize> {
    let ret = unsafe { libc::fcntl(fd, libc::F_GETPIPE_SZ) };
    if ret < 0 {
        return Err(Error::last_os_error());
    }
    Ok(ret as usize)
}

// ---------------------------------------------------------------------------
// Semaphores (shared by the private and named variants)
// ---------------------------------------------------------------------------

/// Decrement `sem`, waiting according to `wait`.
/// `Ok(false)` when the count stayed at zero for the whole wait.
///
/// # Safety
/// `sem` must point to an initialised, live semaphore.
pub(crate) unsafe fn sem_wait_for(sem: *mut libc::sem_t, wait: Wait) -> Result<bool> {
    match wait {
        Wait::Forever => {
            if libc::sem_wait(sem) != 0 {
                return Err(Error::last_os_error());
            }
            Ok(true)
        }
        Wait::Poll => sem_try(sem),
        Wait::For(timeout) => sem_timed(sem, timeout),
    }
}

unsafe fn sem_try(sem: *mut libc::sem_t) -> Result<bool> {
    if libc::sem_trywait(sem) == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EAGAIN) {
        return Ok(false);
    }
    Err(Error::Io(err))
}

#[cfg(not(target_os = "macos"))]
unsafe fn sem_timed(sem: *mut libc::sem_t, timeout: std::time::Duration) -> Result<bool> {
    let Some(deadline) = Wait::For(timeout).deadline() else {
        return sem_wait_for(sem, Wait::Forever);
    };
    if libc::sem_timedwait(sem, &deadline) == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ETIMEDOUT) {
        return Ok(false);
    }
    Err(Error::Io(err))
}

// macOS has no sem_timedwait: poll sem_trywait with backoff
// (busy spin, then yield, then 1ms sleeps) until the deadline.
#[cfg(target_os = "macos")]
unsafe fn sem_timed(sem: *mut libc::sem_t, timeout: std::time::Duration) -> Result<bool> {
    let deadline = std::time::Instant::now() + timeout;
    let mut k = 0u32;
    loop {
        if sem_try(sem)? {
            return Ok(true);
        }
        if std::time::Instant::now() >= deadline {
            return Ok(false);
        }
        if k < 16 {
            std::hint::spin_loop();
            k += 1;
        } else if k < 32 {
            std::thread::yield_now();
            k += 1;
        } else {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
}

/// # Safety
/// `sem` must point to an initialised, live semaphore.
pub(crate) unsafe fn sem_post(sem: *mut libc::sem_t) -> Result<()> {
    if libc::sem_post(sem) != 0 {
        return Err(Error::last_os_error());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared memory
// ---------------------------------------------------------------------------

pub(crate) fn shm_open(name: &CString, flags: libc::c_int) -> Result<OwnedFd> {
    let fd = unsafe { libc::shm_open(name.as_ptr(), flags, PERMS as libc::c_uint) };
    if fd < 0 {
        return Err(Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// `shm_unlink`, treating an already-missing name as success.
pub(crate) fn shm_unlink(name: &CString) -> Result<()> {
    if unsafe { libc::shm_unlink(name.as_ptr()) } != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ENOENT) {
            return Err(Error::Io(err));
        }
    }
    Ok(())
}

pub(crate) fn ftruncate(fd: BorrowedFd<'_>, len: usize) -> Result<()> {
    let len = libc::off_t::try_from(len).map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
    if unsafe { libc::ftruncate(fd.as_raw_fd(), len) } != 0 {
        return Err(Error::last_os_error());
    }
    Ok(())
}

pub(crate) fn fd_len(fd: BorrowedFd<'_>) -> Result<usize> {
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstat(fd.as_raw_fd(), &mut st) } != 0 {
        return Err(Error::last_os_error());
    }
    Ok(st.st_size as usize)
}

pub(crate) fn mmap(
    fd: BorrowedFd<'_>,
    len: usize,
    prot: libc::c_int,
    shared: bool,
    offset: libc::off_t,
) -> Result<NonNull<u8>> {
    let flags = if shared {
        libc::MAP_SHARED
    } else {
        libc::MAP_PRIVATE
    };
    let mem = unsafe { libc::mmap(ptr::null_mut(), len, prot, flags, fd.as_raw_fd(), offset) };
    if mem == libc::MAP_FAILED {
        return Err(Error::last_os_error());
    }
    NonNull::new(mem.cast::<u8>()).ok_or_else(|| io::Error::from_raw_os_error(libc::EFAULT).into())
}

/// # Safety
/// `addr`/`len` must describe a live mapping created by [`mmap`].
pub(crate) unsafe fn munmap(addr: NonNull<u8>, len: usize) -> Result<()> {
    if libc::munmap(addr.as_ptr().cast(), len) != 0 {
        return Err(Error::last_os_error());
    }
    Ok(())
}
