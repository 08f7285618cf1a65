//! The sending half of the file-list codec: delta-codes each entry
//! against per-session cursors, with field layout picked by protocol
//! version and option flags.

use super::{Entry, EntryFlags, Xmit};
use crate::mode::{is_device, is_dir, is_regular, is_special, is_symlink, to_wire_mode};
use crate::names::NameLookup;
use crate::{Buffer, DigestKind, Options, ProtoError};
use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;

/// Longest shared name prefix expressible on the wire.
const MAX_NAME_PREFIX: usize = 255;

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Whether this entry carries an rdev at this version. Protocol 31
/// stopped sending device numbers for fifos and sockets.
pub(crate) fn xmit_rdev(opts: &Options, protocol: i32, mode: u32) -> bool {
    (opts.devices != 0 && is_device(mode))
        || (opts.specials != 0 && is_special(mode) && protocol < 31)
}

/// Per-session file-list encoder.
///
/// Holds the delta cursors (previous mode, times, ids, rdev, name) and
/// the `{dev → {ino → index}}` map for hard-link detection. Cursors only
/// commit once an entry is fully written, so encoder and decoder stay in
/// lock-step even across the hard-link short form.
pub struct ListEncoder<'a> {
    protocol: i32,
    opts: &'a Options,
    names: &'a dyn NameLookup,
    checksum: Option<DigestKind>,
    ndx_start: i32,
    next_ndx: i32,
    prev_mode: i32,
    prev_rdev_packed: i32,
    prev_rdev_major: i32,
    prev_uid: u32,
    prev_gid: u32,
    prev_mtime: i64,
    prev_dev: i64,
    prev_name: Vec<u8>,
    seen_inodes: HashMap<i64, HashMap<i64, i32>>,
}

impl<'a> ListEncoder<'a> {
    /// # Errors
    /// Digest selection fails when `--checksum` names an algorithm the
    /// negotiated protocol cannot provide.
    pub fn new(
        protocol: i32,
        opts: &'a Options,
        names: &'a dyn NameLookup,
        ndx_start: i32,
    ) -> Result<Self, ProtoError> {
        let checksum = if opts.checksum != 0 {
            Some(DigestKind::select(
                opts.checksum_choice.as_deref(),
                protocol,
            )?)
        } else {
            None
        };
        Ok(Self {
            protocol,
            opts,
            names,
            checksum,
            ndx_start,
            next_ndx: ndx_start,
            prev_mode: 0,
            prev_rdev_packed: 0,
            prev_rdev_major: 0,
            prev_uid: 0,
            prev_gid: 0,
            prev_mtime: 0,
            prev_dev: 0,
            prev_name: Vec::new(),
            seen_inodes: HashMap::new(),
        })
    }

    /// Moves to the next sub-list under incremental recursion. The delta
    /// cursors and the inode map deliberately survive the boundary,
    /// which is what makes cross-list hard-link references possible.
    pub fn begin_list(&mut self, ndx_start: i32) {
        self.ndx_start = ndx_start;
        self.next_ndx = ndx_start;
    }

    fn varint30(&self, buf: &mut Buffer, v: i32) {
        if self.protocol >= 30 {
            buf.pack_v32(v);
        } else {
            buf.pack_s32(v);
        }
    }

    /// Appends one entry to `buf`, advancing the delta cursors.
    ///
    /// # Errors
    /// Checksum failures (nothing to digest, unreadable path) and the
    /// odd unrepresentable width.
    #[allow(clippy::too_many_lines, clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn send(&mut self, buf: &mut Buffer, entry: &Entry) -> Result<i32, ProtoError> {
        let p = self.protocol;
        let o = self.opts;
        let ndx = self.next_ndx;
        let mode = entry.mode;
        let wire_mode = to_wire_mode(mode);

        let mut x = Xmit::empty();
        if entry.flags.contains(EntryFlags::TOP_DIR) {
            x |= Xmit::TOP_DIR;
        }
        if p >= 30 && is_dir(mode) && !entry.flags.contains(EntryFlags::CONTENT_DIR) {
            x |= Xmit::NO_CONTENT_DIR;
        }
        if wire_mode == self.prev_mode {
            x |= Xmit::SAME_MODE;
        }

        let (major, minor) = entry.rdev.unwrap_or((0, 0));
        let rdev_packed = (major << 8) | (minor & 0xFF);
        let send_rdev = xmit_rdev(o, p, mode);
        if send_rdev {
            if p < 28 {
                if rdev_packed == self.prev_rdev_packed {
                    x |= Xmit::SAME_RDEV_PRE28;
                }
            } else {
                if major == self.prev_rdev_major {
                    x |= Xmit::SAME_RDEV_MAJOR;
                }
                if p < 30 && (0..=0xFF).contains(&minor) {
                    x |= Xmit::RDEV_MINOR_8_PRE30;
                }
            }
        }

        let mut user_name: Option<String> = None;
        if o.owner != 0 {
            if entry.uid == self.prev_uid {
                x |= Xmit::SAME_UID;
            } else if o.numeric_ids == 0 && p >= 30 {
                user_name = self
                    .names
                    .uid_to_name(entry.uid)
                    .filter(|n| !n.is_empty() && n.len() <= 255);
                if user_name.is_some() {
                    x |= Xmit::USER_NAME_FOLLOWS;
                }
            }
        }
        let mut group_name: Option<String> = None;
        if o.group != 0 {
            if entry.gid == self.prev_gid {
                x |= Xmit::SAME_GID;
            } else if o.numeric_ids == 0 && p >= 30 {
                group_name = self
                    .names
                    .gid_to_name(entry.gid)
                    .filter(|n| !n.is_empty() && n.len() <= 255);
                if group_name.is_some() {
                    x |= Xmit::GROUP_NAME_FOLLOWS;
                }
            }
        }

        if entry.mtime == self.prev_mtime {
            x |= Xmit::SAME_TIME;
        }
        if p >= 31 && entry.mtime_nsec.is_some() {
            x |= Xmit::MOD_NSEC;
        }

        let full = entry.full_name().into_bytes();
        let l1 = common_prefix(&self.prev_name, &full).min(MAX_NAME_PREFIX);
        let suffix = &full[l1..];
        if l1 > 0 {
            x |= Xmit::SAME_NAME;
        }
        if suffix.len() > 255 {
            x |= Xmit::LONG_NAME;
        }

        // hard-link bookkeeping
        let mut first_hlink: Option<i32> = None;
        let tracked = o.hard_links != 0 && entry.dev.is_some() && entry.ino.is_some();
        if tracked {
            let dev = entry.dev.unwrap_or(0);
            let ino = entry.ino.unwrap_or(0);
            if p >= 30 {
                match self.seen_inodes.entry(dev).or_default().entry(ino) {
                    MapEntry::Occupied(prev) => {
                        x |= Xmit::HLINKED;
                        first_hlink = Some(*prev.get());
                    }
                    MapEntry::Vacant(slot) => {
                        x |= Xmit::HLINKED | Xmit::HLINK_FIRST;
                        slot.insert(ndx);
                    }
                }
            } else if p >= 28 {
                x |= Xmit::HLINKED;
                if dev == self.prev_dev {
                    x |= Xmit::SAME_DEV_PRE30;
                }
            }
        }

        // (1) the flag byte or word
        if p >= 28 {
            if (x.bits() & 0xFF00) != 0 || x.is_empty() {
                x |= Xmit::EXTENDED_FLAGS;
                buf.pack_u8((x.bits() & 0xFF) as u8);
                buf.pack_u8((x.bits() >> 8) as u8);
            } else {
                buf.pack_u8(x.bits() as u8);
            }
        } else {
            if (x.bits() & 0xFF) == 0 {
                // guarantee at least one bit in the single-byte form
                if is_dir(mode) {
                    x |= Xmit::LONG_NAME;
                } else {
                    x |= Xmit::TOP_DIR;
                }
            }
            buf.pack_u8(x.bits() as u8);
        }

        // (2) + (3) name delta
        if x.contains(Xmit::SAME_NAME) {
            buf.pack_u8(l1 as u8);
        }
        if x.contains(Xmit::LONG_NAME) {
            self.varint30(buf, suffix.len() as i32);
        } else {
            buf.pack_u8(suffix.len() as u8);
        }
        buf.pack_bytes(suffix);

        // (4) hard-link back-reference
        if let Some(first) = first_hlink {
            buf.pack_v32(first);
            if first < self.ndx_start {
                // the receiver resolves everything from the earlier list
                self.prev_name = full;
                self.next_ndx += 1;
                return Ok(ndx);
            }
        }

        // (5) .. (8)
        buf.pack_v64(entry.size, 3)?;
        if !x.contains(Xmit::SAME_TIME) {
            if p >= 30 {
                buf.pack_v64(entry.mtime, 4)?;
            } else {
                buf.pack_s32(entry.mtime as i32);
            }
        }
        if x.contains(Xmit::MOD_NSEC) {
            buf.pack_v32(entry.mtime_nsec.unwrap_or(0));
        }
        if !x.contains(Xmit::SAME_MODE) {
            buf.pack_s32(wire_mode);
        }

        // (9) + (10) ownership
        if o.owner != 0 && !x.contains(Xmit::SAME_UID) {
            if p < 30 {
                buf.pack_s32(entry.uid as i32);
            } else {
                buf.pack_v32(entry.uid as i32);
            }
            if let Some(ref name) = user_name {
                buf.pack_u8(name.len() as u8);
                buf.pack_bytes(name.as_bytes());
            }
        }
        if o.group != 0 && !x.contains(Xmit::SAME_GID) {
            if p < 30 {
                buf.pack_s32(entry.gid as i32);
            } else {
                buf.pack_v32(entry.gid as i32);
            }
            if let Some(ref name) = group_name {
                buf.pack_u8(name.len() as u8);
                buf.pack_bytes(name.as_bytes());
            }
        }

        // (11) device numbers
        if send_rdev {
            if p < 28 {
                if !x.contains(Xmit::SAME_RDEV_PRE28) {
                    buf.pack_s32(rdev_packed);
                }
            } else {
                if !x.contains(Xmit::SAME_RDEV_MAJOR) {
                    self.varint30(buf, major);
                }
                if p >= 30 {
                    buf.pack_v32(minor);
                } else if x.contains(Xmit::RDEV_MINOR_8_PRE30) {
                    buf.pack_u8(minor as u8);
                } else {
                    buf.pack_s32(minor);
                }
            }
        }

        // (12) symlink target
        if is_symlink(mode) {
            let target = entry.symlink.as_deref().unwrap_or(b"");
            self.varint30(buf, target.len() as i32);
            buf.pack_bytes(target);
        }

        // (13) old-style hard-link identity
        if o.hard_links != 0 && p < 30 {
            if p < 26 {
                if is_regular(mode) {
                    buf.pack_s32((entry.dev.unwrap_or(0) + 1) as i32);
                    buf.pack_s32(entry.ino.unwrap_or(0) as i32);
                }
            } else if x.contains(Xmit::HLINKED) {
                if !x.contains(Xmit::SAME_DEV_PRE30) {
                    buf.pack_s64(entry.dev.unwrap_or(0) + 1);
                }
                buf.pack_s64(entry.ino.unwrap_or(0));
            }
        }

        // (14) whole-file checksum
        if let Some(kind) = self.checksum {
            if is_regular(mode) {
                let sum = kind.filelist_checksum(entry)?;
                buf.pack_bytes(&sum);
            } else if p < 28 {
                buf.pack_bytes(&vec![0u8; kind.digest_len()]);
            }
        }

        // commit the cursors only now that the entry is complete
        self.prev_mode = wire_mode;
        self.prev_mtime = entry.mtime;
        if o.owner != 0 {
            self.prev_uid = entry.uid;
        }
        if o.group != 0 {
            self.prev_gid = entry.gid;
        }
        if send_rdev {
            if p < 28 {
                self.prev_rdev_packed = rdev_packed;
            } else {
                self.prev_rdev_major = major;
            }
        }
        if tracked && (26..30).contains(&p) {
            self.prev_dev = entry.dev.unwrap_or(0);
        }
        self.prev_name = full;
        self.next_ndx += 1;
        Ok(ndx)
    }

    /// Writes the end-of-list marker.
    pub fn finish(&mut self, buf: &mut Buffer) {
        buf.pack_u8(0);
    }
}
