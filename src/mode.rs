#![allow(clippy::inline_always)]
use libc::{S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT, S_IFREG, S_IFSOCK};

// libc's mode_t is u16 on some BSDs, so widen once here
const IFMT: u32 = S_IFMT as u32;
const IFREG: u32 = S_IFREG as u32;
const IFDIR: u32 = S_IFDIR as u32;
const IFLNK: u32 = S_IFLNK as u32;
const IFBLK: u32 = S_IFBLK as u32;
const IFCHR: u32 = S_IFCHR as u32;
const IFIFO: u32 = S_IFIFO as u32;
const IFSOCK: u32 = S_IFSOCK as u32;

/// The symlink type bits every peer agrees on over the wire.
const WIRE_IFLNK: u32 = 0o120_000;

/// File kind of a list entry, derived from its POSIX mode word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileKind {
    BlockDevice,
    CharDevice,
    Directory,
    Fifo,
    Symlink,
    RegularFile,
    Socket,
    Unknown,
}

impl FileKind {
    #[must_use]
    #[inline(always)]
    pub const fn from_mode(mode: u32) -> Self {
        match mode & IFMT {
            m if m == IFREG => Self::RegularFile,
            m if m == IFDIR => Self::Directory,
            m if m == IFBLK => Self::BlockDevice,
            m if m == IFCHR => Self::CharDevice,
            m if m == IFIFO => Self::Fifo,
            m if m == IFLNK => Self::Symlink,
            m if m == IFSOCK => Self::Socket,
            _ => Self::Unknown,
        }
    }
}

impl core::fmt::Display for FileKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::BlockDevice => write!(f, "Block device"),
            Self::CharDevice => write!(f, "Character device"),
            Self::Directory => write!(f, "Directory"),
            Self::Fifo => write!(f, "FIFO"),
            Self::Symlink => write!(f, "Symlink"),
            Self::RegularFile => write!(f, "Regular file"),
            Self::Socket => write!(f, "Socket"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[must_use]
#[inline(always)]
pub const fn is_dir(mode: u32) -> bool {
    mode & IFMT == IFDIR
}

#[must_use]
#[inline(always)]
pub const fn is_symlink(mode: u32) -> bool {
    mode & IFMT == IFLNK
}

#[must_use]
#[inline(always)]
pub const fn is_regular(mode: u32) -> bool {
    mode & IFMT == IFREG
}

/// Block and character devices carry an rdev over the wire.
#[must_use]
#[inline(always)]
pub const fn is_device(mode: u32) -> bool {
    mode & IFMT == IFBLK || mode & IFMT == IFCHR
}

/// Fifos and sockets: "specials" in transfer-option terms.
#[must_use]
#[inline(always)]
pub const fn is_special(mode: u32) -> bool {
    mode & IFMT == IFIFO || mode & IFMT == IFSOCK
}

/// Canonicalises the symlink type bits for transmission; every other mode
/// goes out verbatim.
#[must_use]
#[inline(always)]
#[allow(clippy::cast_possible_wrap)]
pub const fn to_wire_mode(mode: u32) -> i32 {
    if mode & IFMT == IFLNK && IFLNK != WIRE_IFLNK {
        ((mode & !IFMT) | WIRE_IFLNK) as i32
    } else {
        mode as i32
    }
}

/// Inverse of [`to_wire_mode`] for the local platform.
#[must_use]
#[inline(always)]
#[allow(clippy::cast_sign_loss)]
pub const fn from_wire_mode(mode: i32) -> u32 {
    let mode = mode as u32;
    if mode & IFMT == WIRE_IFLNK && IFLNK != WIRE_IFLNK {
        (mode & !IFMT) | IFLNK
    } else {
        mode
    }
}
