//! The file-list data model: entries, their session-side flags, canonical
//! sort keys, and duplicate resolution. The wire codec itself lives in
//! [`send`] and [`recv`].

mod recv;
mod send;

pub use recv::{Decoded, ListDecoder};
pub use send::ListEncoder;

use crate::mode::{self, FileKind};
use bitflags::bitflags;
use std::path::PathBuf;

bitflags! {
    /// On-wire per-entry transmit flags. Several bits are version-split:
    /// the same position means different things before and after
    /// protocol 30, so both names are declared and the codec picks by
    /// version.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Xmit: u16 {
        const TOP_DIR = 1 << 0;
        const SAME_MODE = 1 << 1;
        /// Below protocol 28 this bit is `SAME_RDEV`.
        const EXTENDED_FLAGS = 1 << 2;
        const SAME_RDEV_PRE28 = 1 << 2;
        const SAME_UID = 1 << 3;
        const SAME_GID = 1 << 4;
        const SAME_NAME = 1 << 5;
        const LONG_NAME = 1 << 6;
        const SAME_TIME = 1 << 7;
        const SAME_RDEV_MAJOR = 1 << 8;
        /// Protocol 30 reuse of bit 8 on directories.
        const NO_CONTENT_DIR = 1 << 8;
        const HLINKED = 1 << 9;
        const SAME_DEV_PRE30 = 1 << 10;
        /// Protocol 30 reuse of bit 10.
        const USER_NAME_FOLLOWS = 1 << 10;
        const RDEV_MINOR_8_PRE30 = 1 << 11;
        /// Protocol 30 reuse of bit 11.
        const GROUP_NAME_FOLLOWS = 1 << 11;
        const HLINK_FIRST = 1 << 12;
        const MOD_NSEC = 1 << 13;
    }
}

bitflags! {
    /// Session-side bookkeeping flags on an [`Entry`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntryFlags: u16 {
        const TOP_DIR = 1 << 0;
        const CONTENT_DIR = 1 << 1;
        const IMPLIED_DIR = 1 << 2;
        const DUPLICATE = 1 << 3;
        const HLINKED = 1 << 4;
        const HLINK_FIRST = 1 << 5;
    }
}

/// One file-list entry.
///
/// `dir` may be empty; `name` never is. `rdev` is the split major/minor
/// of a device node. `dev`/`ino` opt the entry into hard-link tracking.
/// `md4`/`md5` are pre-computed digests; failing those, `--checksum`
/// material comes from `data` or `path` (see
/// [`crate::DigestKind::filelist_checksum`]).
#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub dir: String,
    pub name: String,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: i64,
    pub mtime_nsec: Option<i32>,
    pub size: i64,
    pub rdev: Option<(i32, i32)>,
    pub symlink: Option<Vec<u8>>,
    pub dev: Option<i64>,
    pub ino: Option<i64>,
    pub md4: Option<Vec<u8>>,
    pub md5: Option<Vec<u8>>,
    pub data: Option<Vec<u8>>,
    pub path: Option<PathBuf>,
    /// Peer-supplied owner name, when the wire carried one.
    pub user: Option<String>,
    /// Peer-supplied group name, when the wire carried one.
    pub group: Option<String>,
    pub flags: EntryFlags,
    /// Global index of the first sighting of this inode, for entries that
    /// arrived as hard-link back-references.
    pub hlink_ref: Option<i32>,
}

fn split_path(full: &str) -> (String, String) {
    match full.rsplit_once('/') {
        Some((dir, name)) => (dir.to_owned(), name.to_owned()),
        None => (String::new(), full.to_owned()),
    }
}

impl Entry {
    /// A regular-file entry from a slash-joined path.
    #[must_use]
    pub fn file(path: &str, mode: u32, size: i64) -> Self {
        let (dir, name) = split_path(path);
        Self {
            dir,
            name,
            mode,
            size,
            ..Self::default()
        }
    }

    /// A directory entry from a slash-joined path.
    #[must_use]
    pub fn directory(path: &str, mode: u32) -> Self {
        let (dir, name) = split_path(path);
        Self {
            dir,
            name,
            mode,
            flags: EntryFlags::CONTENT_DIR,
            ..Self::default()
        }
    }

    /// A symlink entry pointing at `target`.
    #[must_use]
    pub fn symlink(path: &str, mode: u32, target: &[u8]) -> Self {
        let (dir, name) = split_path(path);
        Self {
            dir,
            name,
            mode,
            symlink: Some(target.to_vec()),
            ..Self::default()
        }
    }

    /// A device node with its major/minor numbers.
    #[must_use]
    pub fn device(path: &str, mode: u32, major: i32, minor: i32) -> Self {
        let (dir, name) = split_path(path);
        Self {
            dir,
            name,
            mode,
            rdev: Some((major, minor)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn kind(&self) -> FileKind {
        FileKind::from_mode(self.mode)
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        mode::is_dir(self.mode)
    }

    /// The slash-joined transmission name.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.dir.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.dir, self.name)
        }
    }

    /// Canonical key for ordering and duplicate detection.
    ///
    /// From protocol 29 non-directories substitute `\0` for the final
    /// separator, which sorts a file before a same-named sibling
    /// subdirectory; directories named `.` collapse to their `dir`.
    #[must_use]
    pub fn sort_key(&self, protocol_version: i32) -> Vec<u8> {
        if protocol_version < 29 {
            return self.full_name().into_bytes();
        }
        if self.is_dir() {
            if self.name == "." {
                return self.dir.clone().into_bytes();
            }
            return self.full_name().into_bytes();
        }
        if self.dir.is_empty() {
            return self.name.clone().into_bytes();
        }
        let mut key = Vec::with_capacity(self.dir.len() + 1 + self.name.len());
        key.extend_from_slice(self.dir.as_bytes());
        key.push(0);
        key.extend_from_slice(self.name.as_bytes());
        key
    }
}

/// An insertion-ordered file list with a lazy sorted projection.
///
/// Wire messages reference entries by their global index, so the unsorted
/// vector is never reordered or shrunk; duplicate resolution only flags
/// entries and hides them from the sorted view.
#[derive(Debug, Default)]
pub struct FileList {
    entries: Vec<Entry>,
    ndx_start: i32,
    protocol_version: i32,
    sorted: Option<Vec<usize>>,
}

impl FileList {
    /// `ndx_start` is the global index of the first entry of this list
    /// (non-zero under incremental recursion).
    #[must_use]
    pub fn new(protocol_version: i32, ndx_start: i32) -> Self {
        Self {
            entries: Vec::new(),
            ndx_start,
            protocol_version,
            sorted: None,
        }
    }

    #[must_use]
    pub const fn ndx_start(&self) -> i32 {
        self.ndx_start
    }

    /// Appends an entry, returning its global index.
    pub fn push(&mut self, entry: Entry) -> i32 {
        self.sorted = None;
        self.entries.push(entry);
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        {
            self.ndx_start + self.entries.len() as i32 - 1
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by global index.
    #[must_use]
    pub fn get(&self, ndx: i32) -> Option<&Entry> {
        usize::try_from(ndx - self.ndx_start)
            .ok()
            .and_then(|i| self.entries.get(i))
    }

    /// Insertion-ordered view.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    fn sorted_indices(&mut self) -> Vec<usize> {
        if let Some(ref cached) = self.sorted {
            return cached.clone();
        }
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        let version = self.protocol_version;
        order.sort_by(|&a, &b| {
            self.entries[a]
                .sort_key(version)
                .cmp(&self.entries[b].sort_key(version))
                .then(a.cmp(&b))
        });
        self.sorted = Some(order.clone());
        order
    }

    /// Resolves entries sharing a sort key.
    ///
    /// On the sending side duplicates are only marked
    /// ([`EntryFlags::DUPLICATE`]) and keep flowing. Everywhere else the
    /// loser is dropped from the sorted view: directories beat files,
    /// directory pairs merge their `TOP_DIR`/`CONTENT_DIR` bits onto the
    /// survivor (losing `IMPLIED_DIR` unless both had it), and a file
    /// pair keeps the earlier one.
    pub fn resolve_duplicates(&mut self, sender: bool) {
        let order = self.sorted_indices();
        let version = self.protocol_version;
        let mut kept: Vec<usize> = Vec::with_capacity(order.len());

        for &idx in &order {
            let key = self.entries[idx].sort_key(version);
            let Some(&survivor) = kept.last() else {
                kept.push(idx);
                continue;
            };
            if self.entries[survivor].sort_key(version) != key {
                kept.push(idx);
                continue;
            }

            if sender {
                self.entries[idx].flags |= EntryFlags::DUPLICATE;
                kept.push(idx);
                continue;
            }

            let dup_is_dir = self.entries[idx].is_dir();
            let surv_is_dir = self.entries[survivor].is_dir();
            match (surv_is_dir, dup_is_dir) {
                (true, true) => {
                    let merged = self.entries[idx].flags
                        & (EntryFlags::TOP_DIR | EntryFlags::CONTENT_DIR);
                    self.entries[survivor].flags |= merged;
                    if !self.entries[idx].flags.contains(EntryFlags::IMPLIED_DIR) {
                        self.entries[survivor].flags -= EntryFlags::IMPLIED_DIR;
                    }
                    self.entries[idx].flags |= EntryFlags::DUPLICATE;
                }
                (true, false) | (false, false) => {
                    self.entries[idx].flags |= EntryFlags::DUPLICATE;
                }
                (false, true) => {
                    // the directory wins; retire the file it displaced
                    self.entries[survivor].flags |= EntryFlags::DUPLICATE;
                    kept.pop();
                    kept.push(idx);
                }
            }
        }
        self.sorted = Some(kept);
    }

    /// The sorted, duplicate-resolved view.
    pub fn sorted(&mut self) -> impl Iterator<Item = &Entry> {
        let order = self.sorted_indices();
        let entries = &self.entries;
        order.into_iter().map(move |i| &entries[i])
    }
}
