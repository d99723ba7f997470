// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX message queue (mq_open family). Unlike pipes and FIFOs the queue
// has native deadline-bounded send/receive, so it does not go through the
// readiness probe.

use std::ffi::CString;
use std::io;
use std::ptr;

use log::{debug, trace, warn};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::mode::AccessMode;
use crate::names;
use crate::platform::posix::PERMS;
use crate::timeout::Wait;

// Not exported by the `libc` crate on every target.
extern "C" {
    fn mq_notify(mqdes: libc::mqd_t, sevp: *const libc::sigevent) -> libc::c_int;
}

/// Priority used for every send (the minimum).
const SEND_PRIORITY: libc::c_uint = 0;

/// Queue geometry requested at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueAttr {
    /// Largest message the queue accepts, in bytes.
    pub max_msg_size: usize,
    /// Number of messages the queue holds before senders block.
    pub depth: usize,
    /// Fail instead of opening a queue that already exists.
    pub exclusive: bool,
}

impl Default for QueueAttr {
    fn default() -> Self {
        Self {
            max_msg_size: 8192,
            // Linux default for /proc/sys/fs/mqueue/msg_max.
            depth: 10,
            exclusive: false,
        }
    }
}

impl QueueAttr {
    pub fn with_max_msg_size(mut self, bytes: usize) -> Self {
        self.max_msg_size = bytes;
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }
}

/// Live attributes as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    pub max_msg_size: usize,
    pub depth: usize,
    /// Messages currently queued.
    pub pending: usize,
    pub nonblocking: bool,
}

/// Asynchronous notification for a message arriving on an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notify {
    /// Deliver the given signal to this process.
    Signal(libc::c_int),
    /// Drop this process's registration.
    Cancel,
}

/// A named POSIX message queue.
#[derive(Debug)]
pub struct MessageQueue {
    mqd: Option<libc::mqd_t>,
    name: String,
    c_name: CString,
    max_msg_size: usize,
}

impl MessageQueue {
    /// Open (or, for every mode but `r`, create) the queue `name`.
    ///
    /// When the queue already exists its own geometry wins over `attr`;
    /// the effective maximum message size is read back from the kernel.
    pub fn open(name: &str, mode: char, attr: QueueAttr) -> Result<Self> {
        let mode = AccessMode::try_from(mode)?;
        let (posix_name, c_name) = names::posix_cname(name)?;

        let mut flags = mode.queue_flags();
        if attr.exclusive {
            flags |= libc::O_CREAT | libc::O_EXCL;
        }

        let mut req: libc::mq_attr = unsafe { std::mem::zeroed() };
        req.mq_maxmsg = attr.depth as _;
        req.mq_msgsize = attr.max_msg_size as _;

        let mqd = unsafe {
            libc::mq_open(
                c_name.as_ptr(),
                flags,
                PERMS as libc::c_uint,
                &mut req as *mut libc::mq_attr,
            )
        };
        if mqd == -1 {
            return Err(Error::last_os_error());
        }

        let mut queue = Self {
            mqd: Some(mqd),
            name: posix_name,
            c_name,
            max_msg_size: attr.max_msg_size,
        };
        let status = queue.attr()?;
        queue.max_msg_size = status.max_msg_size;
        debug!(
            "mq {} opened with mode '{}' (msgsize={}, depth={})",
            queue.name,
            mode.as_char(),
            status.max_msg_size,
            status.depth
        );
        Ok(queue)
    }

    /// Remove a queue by name without holding it open. A missing queue is
    /// not an error.
    pub fn unlink_by_name(name: &str) -> Result<()> {
        let (_, c_name) = names::posix_cname(name)?;
        unlink(&c_name)
    }

    /// POSIX name (with leading '/').
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_msg_size(&self) -> usize {
        self.max_msg_size
    }

    pub fn is_open(&self) -> bool {
        self.mqd.is_some()
    }

    fn mqd(&self) -> Result<libc::mqd_t> {
        self.mqd.ok_or(Error::Closed)
    }

    pub fn attr(&self) -> Result<QueueStatus> {
        let mqd = self.mqd()?;
        let mut attr: libc::mq_attr = unsafe { std::mem::zeroed() };
        if unsafe { libc::mq_getattr(mqd, &mut attr) } != 0 {
            return Err(Error::last_os_error());
        }
        Ok(QueueStatus {
            max_msg_size: attr.mq_msgsize as usize,
            depth: attr.mq_maxmsg as usize,
            pending: attr.mq_curmsgs as usize,
            nonblocking: (attr.mq_flags as libc::c_int) & libc::O_NONBLOCK != 0,
        })
    }

    /// Toggle `O_NONBLOCK` on the queue description.
    pub fn set_block(&self, block: bool) -> Result<()> {
        let mqd = self.mqd()?;
        let mut attr: libc::mq_attr = unsafe { std::mem::zeroed() };
        if unsafe { libc::mq_getattr(mqd, &mut attr) } != 0 {
            return Err(Error::last_os_error());
        }
        attr.mq_flags = if block { 0 } else { libc::O_NONBLOCK as _ };
        if unsafe { libc::mq_setattr(mqd, &attr, ptr::null_mut()) } != 0 {
            return Err(Error::last_os_error());
        }
        Ok(())
    }

    /// Register (or cancel) this process for notification when a message
    /// lands on the empty queue. The kernel allows one registrant per queue
    /// and drops the registration after it fires.
    pub fn notify(&self, how: Notify) -> Result<()> {
        let mqd = self.mqd()?;
        let ret = match how {
            Notify::Cancel => unsafe { mq_notify(mqd, ptr::null()) },
            Notify::Signal(signo) => {
                let mut sev: libc::sigevent = unsafe { std::mem::zeroed() };
                sev.sigev_notify = libc::SIGEV_SIGNAL;
                sev.sigev_signo = signo;
                unsafe { mq_notify(mqd, &sev) }
            }
        };
        if ret != 0 {
            return Err(Error::last_os_error());
        }
        debug!("mq {} notify set to {how:?}", self.name);
        Ok(())
    }

    /// Receive one message and its priority.
    ///
    /// `buf` must be exactly the queue's maximum message size; any other
    /// length fails with `BufferSize` before the queue is touched.
    pub fn read_with_priority(&self, buf: &mut [u8], timeout_ms: i64) -> Result<(usize, u32)> {
        let mqd = self.mqd()?;
        if buf.len() != self.max_msg_size {
            return Err(Error::BufferSize {
                len: buf.len(),
                required: self.max_msg_size,
            });
        }

        let mut prio: libc::c_uint = 0;
        let n = receive(mqd, buf, &mut prio, Wait::from_millis(timeout_ms))?;
        Ok((n, prio))
    }

    /// Close, then remove the queue name. Idempotent; afterwards the name
    /// can be reused by an unrelated queue.
    pub fn destroy(&mut self) {
        self.close();
        match unlink(&self.c_name) {
            Ok(()) => debug!("mq {} unlinked", self.name),
            Err(e) => warn!("mq {} not unlinked: {e}", self.name),
        }
    }
}

fn unlink(c_name: &CString) -> Result<()> {
    if unsafe { libc::mq_unlink(c_name.as_ptr()) } != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ENOENT) {
            return Err(Error::Io(err));
        }
    }
    Ok(())
}

fn timed_out_or(err: io::Error) -> Error {
    if err.raw_os_error() == Some(libc::ETIMEDOUT) {
        Error::Timeout
    } else {
        Error::Io(err)
    }
}

fn receive(mqd: libc::mqd_t, buf: &mut [u8], prio: &mut libc::c_uint, wait: Wait) -> Result<usize> {
    let ptr = buf.as_mut_ptr().cast::<libc::c_char>();
    let n = match wait.deadline() {
        None => unsafe { libc::mq_receive(mqd, ptr, buf.len(), prio) },
        Some(deadline) => unsafe { libc::mq_timedreceive(mqd, ptr, buf.len(), prio, &deadline) },
    };
    if n < 0 {
        let err = timed_out_or(io::Error::last_os_error());
        if err.is_timeout() {
            trace!("mq receive timed out");
        }
        return Err(err);
    }
    Ok(n as usize)
}

impl Channel for MessageQueue {
    fn read(&mut self, buf: &mut [u8], timeout_ms: i64) -> Result<usize> {
        self.read_with_priority(buf, timeout_ms).map(|(n, _)| n)
    }

    /// Send `buf` as one message at minimum priority. Messages larger than
    /// the maximum message size are rejected before reaching the kernel.
    fn write(&mut self, buf: &[u8], timeout_ms: i64) -> Result<usize> {
        let mqd = self.mqd()?;
        if buf.len() > self.max_msg_size {
            return Err(Error::MessageSize {
                len: buf.len(),
                max: self.max_msg_size,
            });
        }

        let ptr = buf.as_ptr().cast::<libc::c_char>();
        let ret = match Wait::from_millis(timeout_ms).deadline() {
            None => unsafe { libc::mq_send(mqd, ptr, buf.len(), SEND_PRIORITY) },
            Some(deadline) => unsafe {
                libc::mq_timedsend(mqd, ptr, buf.len(), SEND_PRIORITY, &deadline)
            },
        };
        if ret != 0 {
            let err = timed_out_or(io::Error::last_os_error());
            if err.is_timeout() {
                trace!("mq {} send timed out after {timeout_ms}ms", self.name);
            }
            return Err(err);
        }
        Ok(buf.len())
    }

    fn close(&mut self) {
        if let Some(mqd) = self.mqd.take() {
            if unsafe { libc::mq_close(mqd) } != 0 {
                warn!("mq {} close failed: {}", self.name, io::Error::last_os_error());
            } else {
                debug!("mq {} closed", self.name);
            }
        }
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        self.close();
    }
}
