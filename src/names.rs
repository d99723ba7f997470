// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Normalisation of names for kernel-visible POSIX objects (message queues,
// named semaphores, shared memory). All three share the "/name" namespace
// convention and reject interior slashes.

use std::ffi::CString;

use crate::error::{Error, Result};

/// FNV-1a 64-bit hash.
pub fn fnv1a_64(data: &[u8]) -> u64 {
    data.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Longest name (including the leading '/') the platform accepts for
/// POSIX named objects. 0 disables shortening.
#[cfg(target_os = "macos")]
pub const POSIX_NAME_MAX: usize = 31;

#[cfg(not(target_os = "macos"))]
pub const POSIX_NAME_MAX: usize = 0;

/// Produce the POSIX form of `name`: exactly one leading '/', no other
/// slashes, no NUL bytes.
///
/// When `POSIX_NAME_MAX` is non-zero, longer names become
/// `/<prefix>_<16 hex digits of fnv1a_64(full name)>`.
pub fn posix_name(name: &str) -> Result<String> {
    let body = name.strip_prefix('/').unwrap_or(name);
    if body.is_empty() || body.contains('/') || body.contains('\0') {
        return Err(Error::InvalidName(name.to_string()));
    }

    let full = format!("/{body}");
    if POSIX_NAME_MAX == 0 || full.len() <= POSIX_NAME_MAX {
        return Ok(full);
    }

    let hash = format!("{:016x}", fnv1a_64(full.as_bytes()));
    // '/' + prefix + '_' + hash
    let room = POSIX_NAME_MAX.saturating_sub(hash.len() + 2);
    let prefix: String = body
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= room)
        .map(|(_, c)| c)
        .collect();
    Ok(format!("/{prefix}_{hash}"))
}

/// `posix_name` as a C string ready for the syscall.
pub(crate) fn posix_cname(name: &str) -> Result<(String, CString)> {
    let posix = posix_name(name)?;
    let c = CString::new(posix.as_bytes()).map_err(|_| Error::InvalidName(name.to_string()))?;
    Ok((posix, c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_known_values() {
        assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn leading_slash_added_once() {
        assert_eq!(posix_name("queue").unwrap(), "/queue");
        assert_eq!(posix_name("/queue").unwrap(), "/queue");
    }

    #[test]
    fn bad_names_rejected() {
        for bad in ["", "/", "a/b", "//x", "nul\0byte"] {
            assert!(matches!(posix_name(bad), Err(Error::InvalidName(_))), "{bad:?}");
        }
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn long_names_shortened() {
        let long = "a_rather_long_semaphore_name_that_overflows";
        let short = posix_name(long).unwrap();
        assert!(short.len() <= POSIX_NAME_MAX);
        assert!(short.starts_with("/a_rather"));
        assert_eq!(short, posix_name(long).unwrap());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn long_names_kept() {
        let long = "a_rather_long_semaphore_name_that_overflows";
        assert_eq!(posix_name(long).unwrap(), format!("/{long}"));
    }
}
