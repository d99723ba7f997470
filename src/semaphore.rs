// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Counting semaphores: a process-private one (sem_init) and a named one
// (sem_open) shared between processes through the kernel namespace.

use std::cell::UnsafeCell;
use std::ffi::CString;
use std::io;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::names;
use crate::platform::posix::{self, PERMS};
use crate::shm::SharedMemory;
use crate::timeout::Wait;

/// The acquire/release capability shared by both semaphore kinds.
pub trait Semaphore {
    /// Decrement the count, waiting per `timeout_ms` (`< 0` forever, `0`
    /// try once, `> 0` bounded). `Ok(false)` when the count stayed at zero.
    fn wait(&self, timeout_ms: i64) -> Result<bool>;

    /// `P`: block until the count can be decremented (`block = true`), or
    /// try once (`block = false`).
    fn acquire(&self, block: bool) -> Result<bool> {
        self.wait(if block { -1 } else { 0 })
    }

    /// `V`: increment the count, waking one waiter.
    fn release(&self) -> Result<()>;

    /// Release the handle. Idempotent.
    fn close(&mut self);
}

// ---------------------------------------------------------------------------
// PrivateSemaphore (sem_init)
// ---------------------------------------------------------------------------

/// Where the `sem_t` of a [`PrivateSemaphore`] lives.
enum Slot {
    /// Heap cell, never moved after `sem_init`.
    Heap(Box<UnsafeCell<libc::sem_t>>),
    /// Inside a mapped segment. `owner` handles ran `sem_init` and run
    /// `sem_destroy` on close; attached handles do neither.
    Mapped { sem: NonNull<libc::sem_t>, owner: bool },
}

impl Slot {
    fn as_ptr(&self) -> *mut libc::sem_t {
        match self {
            Slot::Heap(cell) => cell.get(),
            Slot::Mapped { sem, .. } => sem.as_ptr(),
        }
    }
}

/// An unnamed semaphore.
///
/// [`PrivateSemaphore::new`] keeps the `sem_t` on the heap, which only
/// threads of this process can reach. To share one between processes, put
/// it in a [`SharedMemory`] mapping with [`PrivateSemaphore::init_in`]
/// (`shared = true`) and reach it from other handles or forked children;
/// the borrow keeps the segment mapped while the semaphore is in use.
/// Closing needs `&mut self`, so it cannot race a thread blocked in
/// [`Semaphore::wait`].
pub struct PrivateSemaphore<'a> {
    slot: Option<Slot>,
    _segment: PhantomData<&'a SharedMemory>,
}

// Safety: sem_t is only touched through the sem_* calls, which are thread-safe.
unsafe impl Send for PrivateSemaphore<'_> {}
unsafe impl Sync for PrivateSemaphore<'_> {}

impl PrivateSemaphore<'static> {
    /// New semaphore with a count of 1.
    pub fn new(shared: bool) -> Result<Self> {
        Self::with_count(1, shared)
    }

    pub fn with_count(count: u32, shared: bool) -> Result<Self> {
        let cell: Box<UnsafeCell<libc::sem_t>> =
            Box::new(UnsafeCell::new(unsafe { mem::zeroed() }));
        sem_init(cell.get(), count, shared)?;
        debug!("private semaphore initialised (count={count}, shared={shared})");
        Ok(Self {
            slot: Some(Slot::Heap(cell)),
            _segment: PhantomData,
        })
    }
}

impl<'a> PrivateSemaphore<'a> {
    /// Initialise a semaphore with a count of 1 at `offset` inside the
    /// current mapping of `shm`, which must be read-write.
    ///
    /// Initialise each slot once; other handles on the segment use
    /// [`PrivateSemaphore::attach_in`]. Closing this handle destroys the
    /// semaphore.
    pub fn init_in(shm: &'a SharedMemory, offset: usize, shared: bool) -> Result<Self> {
        let sem = slot_in(shm, offset)?;
        sem_init(sem.as_ptr(), 1, shared)?;
        debug!(
            "private semaphore initialised in shm {} at +{offset} (shared={shared})",
            shm.name()
        );
        Ok(Self {
            slot: Some(Slot::Mapped { sem, owner: true }),
            _segment: PhantomData,
        })
    }

    /// Use a semaphore that another handle set up with
    /// [`PrivateSemaphore::init_in`] at `offset` of the same segment.
    /// Closing this handle leaves the semaphore alive.
    pub fn attach_in(shm: &'a SharedMemory, offset: usize) -> Result<Self> {
        let sem = slot_in(shm, offset)?;
        debug!("private semaphore attached in shm {} at +{offset}", shm.name());
        Ok(Self {
            slot: Some(Slot::Mapped { sem, owner: false }),
            _segment: PhantomData,
        })
    }

    fn raw(&self) -> Result<*mut libc::sem_t> {
        self.slot.as_ref().map(Slot::as_ptr).ok_or(Error::Closed)
    }
}

fn slot_in(shm: &SharedMemory, offset: usize) -> Result<NonNull<libc::sem_t>> {
    let sem = shm
        .region(offset, mem::size_of::<libc::sem_t>())?
        .cast::<libc::sem_t>();
    if sem.as_ptr().align_offset(mem::align_of::<libc::sem_t>()) != 0 {
        return Err(io::Error::from_raw_os_error(libc::EINVAL).into());
    }
    Ok(sem)
}

fn sem_init(sem: *mut libc::sem_t, count: u32, shared: bool) -> Result<()> {
    if unsafe { libc::sem_init(sem, shared as libc::c_int, count) } != 0 {
        return Err(Error::last_os_error());
    }
    Ok(())
}

impl Semaphore for PrivateSemaphore<'_> {
    fn wait(&self, timeout_ms: i64) -> Result<bool> {
        let sem = self.raw()?;
        unsafe { posix::sem_wait_for(sem, Wait::from_millis(timeout_ms)) }
    }

    fn release(&self) -> Result<()> {
        let sem = self.raw()?;
        unsafe { posix::sem_post(sem) }
    }

    fn close(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        if let Slot::Mapped { owner: false, .. } = slot {
            return;
        }
        if unsafe { libc::sem_destroy(slot.as_ptr()) } != 0 {
            warn!("sem_destroy failed: {}", io::Error::last_os_error());
        }
    }
}

impl Drop for PrivateSemaphore<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// NamedSemaphore (sem_open)
// ---------------------------------------------------------------------------

/// A semaphore identified by a kernel-visible name.
///
/// The kernel keeps it alive until its name is unlinked and every handle is
/// closed. A fresh semaphore starts with a count of 1.
pub struct NamedSemaphore {
    sem: Option<*mut libc::sem_t>,
    name: String,
    c_name: CString,
}

// Safety: the handle refers to a kernel object usable from any thread.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Server role: create `name`, failing if it already exists.
    pub fn create(name: &str) -> Result<Self> {
        Self::open_with(name, libc::O_CREAT | libc::O_EXCL)
    }

    /// Client role: open `name`, creating it if missing.
    pub fn open(name: &str) -> Result<Self> {
        Self::open_with(name, libc::O_CREAT)
    }

    fn open_with(name: &str, flags: libc::c_int) -> Result<Self> {
        let (posix_name, c_name) = names::posix_cname(name)?;
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                flags,
                PERMS as libc::c_uint,
                1 as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(Error::last_os_error());
        }
        debug!("named semaphore {posix_name} opened");
        Ok(Self {
            sem: Some(sem),
            name: posix_name,
            c_name,
        })
    }

    /// Remove a semaphore name without holding it open. A missing name is
    /// not an error.
    pub fn unlink_by_name(name: &str) -> Result<()> {
        let (_, c_name) = names::posix_cname(name)?;
        unlink(&c_name)
    }

    /// POSIX name (with leading '/').
    pub fn name(&self) -> &str {
        &self.name
    }

    fn raw(&self) -> Result<*mut libc::sem_t> {
        self.sem.ok_or(Error::Closed)
    }

    /// Current count, for diagnostics only: it may change as soon as it is
    /// read. macOS does not implement `sem_getvalue`.
    pub fn value(&self) -> Result<i32> {
        let sem = self.raw()?;
        let mut val: libc::c_int = 0;
        if unsafe { libc::sem_getvalue(sem, &mut val) } != 0 {
            return Err(Error::last_os_error());
        }
        Ok(val)
    }

    /// Close the handle and remove the name. Later opens of the same name
    /// get a fresh, unrelated semaphore. Idempotent.
    pub fn unlink(&mut self) {
        self.close();
        match unlink(&self.c_name) {
            Ok(()) => debug!("named semaphore {} unlinked", self.name),
            Err(e) => warn!("named semaphore {} not unlinked: {e}", self.name),
        }
    }
}

fn unlink(c_name: &CString) -> Result<()> {
    if unsafe { libc::sem_unlink(c_name.as_ptr()) } != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ENOENT) {
            return Err(Error::Io(err));
        }
    }
    Ok(())
}

impl Semaphore for NamedSemaphore {
    fn wait(&self, timeout_ms: i64) -> Result<bool> {
        let sem = self.raw()?;
        unsafe { posix::sem_wait_for(sem, Wait::from_millis(timeout_ms)) }
    }

    fn release(&self) -> Result<()> {
        let sem = self.raw()?;
        unsafe { posix::sem_post(sem) }
    }

    fn close(&mut self) {
        if let Some(sem) = self.sem.take() {
            if unsafe { libc::sem_close(sem) } != 0 {
                warn!(
                    "named semaphore {} close failed: {}",
                    self.name,
                    io::Error::last_os_error()
                );
            } else {
                debug!("named semaphore {} closed", self.name);
            }
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        self.close();
    }
}
