// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Uniform, timeout-aware access to POSIX IPC objects: anonymous pipes,
// FIFOs, message queues, counting semaphores and shared memory.
//
// Every blocking call takes a signed millisecond timeout: `< 0` blocks
// indefinitely, `0` polls, `> 0` waits at most that long.

#[cfg(not(unix))]
compile_error!("posix-ipc supports Unix targets only");

mod error;
pub use error::{Error, Result};

pub mod names;
pub mod timeout;

mod platform;

mod mode;
pub use mode::{AccessMode, Protection};

mod readiness;
pub use readiness::{probe, Direction, Readiness};

mod guarded;
pub use guarded::{guarded_read, guarded_write};

mod channel;
pub use channel::Channel;

mod pipe;
pub use pipe::Pipe;

mod fifo;
pub use fifo::Fifo;

#[cfg(target_os = "linux")]
mod msg_queue;
#[cfg(target_os = "linux")]
pub use msg_queue::{MessageQueue, Notify, QueueAttr, QueueStatus};

mod semaphore;
pub use semaphore::{NamedSemaphore, PrivateSemaphore, Semaphore};

mod shm;
pub use shm::SharedMemory;
