// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Private and named counting semaphores.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use posix_ipc::{Error, NamedSemaphore, PrivateSemaphore, Semaphore, SharedMemory};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_name(prefix: &str) -> String {
    let _ = env_logger::builder().is_test(true).try_init();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_sem_{}_{n}", std::process::id())
}

fn acquire_release_cycle(sem: &dyn Semaphore) {
    assert!(sem.acquire(true).expect("first acquire"));
    assert!(!sem.acquire(false).expect("second acquire"));
    sem.release().expect("release");
    assert!(sem.acquire(false).expect("acquire after release"));
    sem.release().expect("release");
}

// ========== PrivateSemaphore ==========

#[test]
fn private_acquire_release() {
    let sem = PrivateSemaphore::new(false).expect("init");
    acquire_release_cycle(&sem);
}

#[test]
fn private_timed_wait_times_out() {
    let sem = PrivateSemaphore::with_count(0, false).expect("init");

    let start = Instant::now();
    assert!(!sem.wait(50).expect("wait"));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(40), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1000), "returned after {elapsed:?}");
}

#[test]
fn private_release_wakes_blocked_waiter() {
    let sem = Arc::new(PrivateSemaphore::with_count(0, false).expect("init"));

    let waiter = {
        let sem = Arc::clone(&sem);
        thread::spawn(move || sem.acquire(true).expect("blocking acquire"))
    };
    thread::sleep(Duration::from_millis(50));
    sem.release().expect("release");
    assert!(waiter.join().expect("join"));
}

#[test]
fn private_counts_multiple_releases() {
    let sem = PrivateSemaphore::with_count(0, false).expect("init");
    for _ in 0..3 {
        sem.release().expect("release");
    }
    for _ in 0..3 {
        assert!(sem.wait(10).expect("wait"));
    }
    assert!(!sem.wait(0).expect("drained"));
}

#[test]
fn private_close_is_idempotent() {
    let mut sem = PrivateSemaphore::new(true).expect("init");
    sem.close();
    sem.close();
    assert!(matches!(sem.acquire(false), Err(Error::Closed)));
    assert!(matches!(sem.release(), Err(Error::Closed)));
}

fn mapped_segment(prefix: &str) -> (String, SharedMemory) {
    let name = unique_name(prefix);
    SharedMemory::unlink_by_name(&name).expect("clear");
    let mut shm = SharedMemory::open(&name, 'd').expect("open shm");
    shm.set_len(4096).expect("set_len");
    shm.map(4096, 'd', true, 0).expect("map");
    (name, shm)
}

#[test]
fn private_in_segment_acquire_release() {
    let (_, mut shm) = mapped_segment("seg_cycle");
    {
        let sem = PrivateSemaphore::init_in(&shm, 64, true).expect("init in segment");
        acquire_release_cycle(&sem);
    }
    shm.destroy();
}

#[test]
fn private_in_segment_shared_by_second_mapping() {
    let (name, mut a) = mapped_segment("seg_attach");
    let mut b = SharedMemory::open(&name, 'd').expect("open second");
    b.map(4096, 'd', true, 0).expect("map second");
    {
        let owner = PrivateSemaphore::init_in(&a, 128, true).expect("init");
        let mut peer = PrivateSemaphore::attach_in(&b, 128).expect("attach");

        assert!(owner.acquire(false).expect("owner takes the unit"));
        assert!(!peer.acquire(false).expect("peer sees zero"));
        peer.release().expect("peer release");
        assert!(owner.acquire(false).expect("owner sees the release"));

        // an attached handle leaves the semaphore alive on close
        peer.close();
        owner.release().expect("release after peer closed");
        assert!(owner.acquire(false).expect("still usable"));
    }
    b.close();
    a.destroy();
}

#[cfg(target_os = "linux")]
#[test]
fn private_in_segment_crosses_fork() {
    let (_, mut shm) = mapped_segment("seg_fork");
    {
        let sem = PrivateSemaphore::init_in(&shm, 0, true).expect("init in segment");
        assert!(sem.acquire(false).expect("take the only unit"));

        match unsafe { libc::fork() } {
            -1 => panic!("fork: {}", std::io::Error::last_os_error()),
            0 => {
                let code = if sem.release().is_ok() { 0 } else { 1 };
                unsafe { libc::_exit(code) };
            }
            child => {
                let mut status = 0;
                assert_eq!(unsafe { libc::waitpid(child, &mut status, 0) }, child);
                assert!(libc::WIFEXITED(status), "child status {status:#x}");
                assert_eq!(libc::WEXITSTATUS(status), 0);
                assert!(sem.acquire(false).expect("release in child seen by parent"));
            }
        }
    }
    shm.destroy();
}

#[test]
fn private_in_segment_checks_placement() {
    let (_, mut shm) = mapped_segment("seg_checks");
    assert!(matches!(
        PrivateSemaphore::init_in(&shm, 4090, true),
        Err(Error::OutOfBounds { offset: 4090, .. })
    ));
    let err = PrivateSemaphore::init_in(&shm, 1, true).err().expect("misaligned slot");
    assert_eq!(err.raw_os_error(), Some(libc::EINVAL));

    shm.unmap();
    assert!(matches!(
        PrivateSemaphore::init_in(&shm, 0, true),
        Err(Error::NotMapped)
    ));
    shm.map(4096, 'r', true, 0).expect("map read-only");
    assert!(matches!(
        PrivateSemaphore::attach_in(&shm, 0),
        Err(Error::Protection)
    ));
    shm.destroy();
}

// ========== NamedSemaphore ==========

#[test]
fn named_acquire_release() {
    let name = unique_name("cycle");
    NamedSemaphore::unlink_by_name(&name).expect("clear");

    let mut sem = NamedSemaphore::open(&name).expect("open");
    acquire_release_cycle(&sem);
    sem.unlink();
}

#[test]
fn named_handles_share_the_count() {
    let name = unique_name("shared");
    NamedSemaphore::unlink_by_name(&name).expect("clear");

    let mut server = NamedSemaphore::create(&name).expect("create");
    let client = NamedSemaphore::open(&name).expect("open");

    assert!(server.acquire(true).expect("server acquire"));
    assert!(!client.acquire(false).expect("client sees zero"));
    server.release().expect("server release");
    assert!(client.acquire(false).expect("client acquire"));
    client.release().expect("client release");
    server.unlink();
}

#[test]
fn named_exclusive_create_fails_when_present() {
    let name = unique_name("exclusive");
    NamedSemaphore::unlink_by_name(&name).expect("clear");

    let mut first = NamedSemaphore::create(&name).expect("create");
    let err = NamedSemaphore::create(&name).err().expect("second create must fail");
    assert_eq!(err.raw_os_error(), Some(libc::EEXIST));
    first.unlink();
}

#[test]
fn named_timed_wait_times_out() {
    let name = unique_name("timed");
    NamedSemaphore::unlink_by_name(&name).expect("clear");

    let mut sem = NamedSemaphore::open(&name).expect("open");
    assert!(sem.wait(-1).expect("take the only unit"));

    let start = Instant::now();
    assert!(!sem.wait(50).expect("wait"));
    assert!(start.elapsed() >= Duration::from_millis(40));
    sem.unlink();
}

#[cfg(target_os = "linux")]
#[test]
fn named_value_tracks_count() {
    let name = unique_name("value");
    NamedSemaphore::unlink_by_name(&name).expect("clear");

    let mut sem = NamedSemaphore::open(&name).expect("open");
    assert_eq!(sem.value().expect("value"), 1);
    assert!(sem.acquire(false).expect("acquire"));
    assert_eq!(sem.value().expect("value"), 0);
    sem.release().expect("release");
    sem.release().expect("release");
    assert_eq!(sem.value().expect("value"), 2);
    sem.unlink();
}

#[cfg(target_os = "linux")]
#[test]
fn named_unlink_then_recreate_is_fresh() {
    let name = unique_name("fresh");
    NamedSemaphore::unlink_by_name(&name).expect("clear");

    let mut old = NamedSemaphore::open(&name).expect("open");
    assert!(old.acquire(true).expect("acquire"));
    assert_eq!(old.value().expect("value"), 0);
    old.unlink();
    old.unlink();

    let mut new = NamedSemaphore::create(&name).expect("recreate exclusively");
    assert_eq!(new.value().expect("value"), 1);
    new.unlink();
}

#[test]
fn named_close_is_idempotent() {
    let name = unique_name("close");
    NamedSemaphore::unlink_by_name(&name).expect("clear");

    let mut sem = NamedSemaphore::open(&name).expect("open");
    sem.close();
    sem.close();
    assert!(matches!(sem.acquire(false), Err(Error::Closed)));
    assert!(matches!(sem.value(), Err(Error::Closed)));
    NamedSemaphore::unlink_by_name(&name).expect("cleanup");
}

#[test]
fn named_invalid_name_rejected() {
    assert!(matches!(
        NamedSemaphore::open("bad/name"),
        Err(Error::InvalidName(_))
    ));
    assert!(matches!(NamedSemaphore::open(""), Err(Error::InvalidName(_))));
}
