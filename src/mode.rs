// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Single-character mode conventions shared by Fifo, MessageQueue and
// SharedMemory, plus the protection characters used by SharedMemory::map.

use crate::error::Error;

/// Open mode selected by a single character.
///
/// | char | meaning                                  | flags                              |
/// |------|------------------------------------------|------------------------------------|
/// | `r`  | read, existing object only               | `O_RDONLY`                         |
/// | `a`  | append, create if missing                | `O_WRONLY\|O_CREAT\|O_APPEND`      |
/// | `w`  | write, create if missing, truncate       | `O_WRONLY\|O_CREAT\|O_TRUNC`       |
/// | `m`  | modify, like `w` without truncation      | `O_WRONLY\|O_CREAT`                |
/// | `d`  | read-write, create if missing, append    | `O_RDWR\|O_CREAT\|O_APPEND`        |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Append,
    Write,
    Modify,
    ReadWrite,
}

impl AccessMode {
    /// Full `open(2)` flag set for this mode.
    pub fn flags(self) -> libc::c_int {
        match self {
            AccessMode::Read => libc::O_RDONLY,
            AccessMode::Append => libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND,
            AccessMode::Write => libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
            AccessMode::Modify => libc::O_WRONLY | libc::O_CREAT,
            AccessMode::ReadWrite => libc::O_RDWR | libc::O_CREAT | libc::O_APPEND,
        }
    }

    /// Flags understood by `mq_open`: access mode and `O_CREAT` only.
    pub fn queue_flags(self) -> libc::c_int {
        self.flags() & (libc::O_ACCMODE | libc::O_CREAT)
    }

    /// Flags for `shm_open`, which only accepts `O_RDONLY` or `O_RDWR`.
    pub fn shm_flags(self) -> libc::c_int {
        match self {
            AccessMode::Read => libc::O_RDONLY,
            _ => (self.flags() & !(libc::O_ACCMODE | libc::O_APPEND)) | libc::O_RDWR,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            AccessMode::Read => 'r',
            AccessMode::Append => 'a',
            AccessMode::Write => 'w',
            AccessMode::Modify => 'm',
            AccessMode::ReadWrite => 'd',
        }
    }
}

impl TryFrom<char> for AccessMode {
    type Error = Error;

    fn try_from(c: char) -> Result<Self, Error> {
        match c {
            'r' => Ok(AccessMode::Read),
            'a' => Ok(AccessMode::Append),
            'w' => Ok(AccessMode::Write),
            'm' => Ok(AccessMode::Modify),
            'd' => Ok(AccessMode::ReadWrite),
            other => Err(Error::InvalidMode(other)),
        }
    }
}

/// Memory protection selected by a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    /// `r`
    Read,
    /// `w`
    Write,
    /// `e`
    Exec,
    /// `d`: read + write
    ReadWrite,
    /// `n`: no access
    None,
    /// `m`: read + write + execute
    All,
}

impl Protection {
    /// `PROT_*` bits for `mmap(2)`.
    pub fn prot(self) -> libc::c_int {
        match self {
            Protection::Read => libc::PROT_READ,
            Protection::Write => libc::PROT_WRITE,
            Protection::Exec => libc::PROT_EXEC,
            Protection::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
            Protection::None => libc::PROT_NONE,
            Protection::All => libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
        }
    }

    pub fn readable(self) -> bool {
        self.prot() & libc::PROT_READ != 0
    }

    pub fn writable(self) -> bool {
        self.prot() & libc::PROT_WRITE != 0
    }
}

impl TryFrom<char> for Protection {
    type Error = Error;

    fn try_from(c: char) -> Result<Self, Error> {
        match c {
            'r' => Ok(Protection::Read),
            'w' => Ok(Protection::Write),
            'e' => Ok(Protection::Exec),
            'd' => Ok(Protection::ReadWrite),
            'n' => Ok(Protection::None),
            'm' => Ok(Protection::All),
            other => Err(Error::InvalidProtection(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mode_char_parses_and_round_trips() {
        for c in ['r', 'a', 'w', 'm', 'd'] {
            let mode = AccessMode::try_from(c).unwrap();
            assert_eq!(mode.as_char(), c);
        }
    }

    #[test]
    fn unknown_mode_char_rejected() {
        for c in ['x', 'R', ' ', '\0', 'e'] {
            assert!(matches!(AccessMode::try_from(c), Err(Error::InvalidMode(m)) if m == c));
        }
    }

    #[test]
    fn mode_flags() {
        assert_eq!(AccessMode::Read.flags(), libc::O_RDONLY);
        assert_eq!(
            AccessMode::Write.flags(),
            libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC
        );
        assert_eq!(
            AccessMode::ReadWrite.queue_flags(),
            libc::O_RDWR | libc::O_CREAT
        );
        assert_eq!(AccessMode::Read.queue_flags(), libc::O_RDONLY);
        assert_eq!(AccessMode::Append.shm_flags(), libc::O_RDWR | libc::O_CREAT);
        assert_eq!(
            AccessMode::Write.shm_flags(),
            libc::O_RDWR | libc::O_CREAT | libc::O_TRUNC
        );
    }

    #[test]
    fn protection_table() {
        assert_eq!(Protection::try_from('n').unwrap().prot(), libc::PROT_NONE);
        assert!(Protection::try_from('d').unwrap().writable());
        assert!(Protection::try_from('d').unwrap().readable());
        assert!(!Protection::try_from('r').unwrap().writable());
        assert!(Protection::try_from('m').unwrap().prot() & libc::PROT_EXEC != 0);
        assert!(matches!(
            Protection::try_from('q'),
            Err(Error::InvalidProtection('q'))
        ));
    }
}
