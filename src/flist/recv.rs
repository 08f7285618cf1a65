//! The receiving half of the file-list codec. Field order and cursor
//! updates mirror [`super::send::ListEncoder`] exactly; a truncated read
//! anywhere inside an entry rewinds the buffer and reports `NeedMore`
//! without disturbing the delta cursors.

use super::send::xmit_rdev;
use super::{Entry, EntryFlags, Xmit, split_path};
use crate::mode::{from_wire_mode, is_dir, is_regular, is_symlink};
use crate::{Buffer, DigestKind, Options, ProtoError, WireError};

/// Anything longer than this in a name or symlink target is treated as a
/// corrupt stream rather than a request for more bytes.
const MAX_PATH_BYTES: usize = 65_536;

/// Outcome of one [`ListDecoder::decode`] call.
#[derive(Debug)]
#[allow(clippy::exhaustive_enums)]
pub enum Decoded {
    Entry(Box<Entry>),
    /// The end-of-list marker.
    End,
    /// Feed more bytes and call again.
    NeedMore,
}

/// Per-session file-list decoder.
pub struct ListDecoder<'a> {
    protocol: i32,
    opts: &'a Options,
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
}

impl<'a> ListDecoder<'a> {
    /// # Errors
    /// Digest selection fails when `--checksum` names an algorithm the
    /// negotiated protocol cannot provide.
    pub fn new(protocol: i32, opts: &'a Options, ndx_start: i32) -> Result<Self, ProtoError> {
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
        })
    }

    /// Moves to the next sub-list under incremental recursion; the delta
    /// cursors deliberately survive the boundary.
    pub fn begin_list(&mut self, ndx_start: i32) {
        self.ndx_start = ndx_start;
        self.next_ndx = ndx_start;
    }

    fn varint30(&self, buf: &mut Buffer) -> Result<i32, WireError> {
        if self.protocol >= 30 {
            buf.unpack_v32()
        } else {
            buf.unpack_s32()
        }
    }

    fn read_len(&self, buf: &mut Buffer, long_form: bool) -> Result<usize, WireError> {
        let n = if long_form {
            let v = self.varint30(buf)?;
            usize::try_from(v).map_err(|_| WireError::Malformed("negative length"))?
        } else {
            usize::from(buf.unpack_u8()?)
        };
        if n > MAX_PATH_BYTES {
            return Err(WireError::Malformed("oversized path"));
        }
        Ok(n)
    }

    /// Consumes one entry (or the end marker) from `buf`, discarding the
    /// consumed prefix on success.
    ///
    /// # Errors
    /// Structural corruption only; short input is [`Decoded::NeedMore`].
    pub fn decode(&mut self, buf: &mut Buffer) -> Result<Decoded, ProtoError> {
        let mark = buf.pos();
        match self.decode_entry(buf) {
            Ok(decoded) => {
                buf.discard();
                Ok(decoded)
            }
            Err(ProtoError::Wire(WireError::Truncated)) => {
                buf.set_pos(mark);
                Ok(Decoded::NeedMore)
            }
            Err(e) => Err(e),
        }
    }

    #[allow(clippy::too_many_lines, clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn decode_entry(&mut self, buf: &mut Buffer) -> Result<Decoded, ProtoError> {
        let p = self.protocol;
        let o = self.opts;

        let low = buf.unpack_u8()?;
        if low == 0 {
            return Ok(Decoded::End);
        }
        let mut bits = u16::from(low);
        if p >= 28 && (bits & Xmit::EXTENDED_FLAGS.bits()) != 0 {
            bits |= u16::from(buf.unpack_u8()?) << 8;
        }
        let x = Xmit::from_bits_retain(bits);

        // (2) + (3) name delta
        let l1 = if x.contains(Xmit::SAME_NAME) {
            usize::from(buf.unpack_u8()?)
        } else {
            0
        };
        let l2 = self.read_len(buf, x.contains(Xmit::LONG_NAME))?;
        if l1 > self.prev_name.len() {
            return Err(WireError::Malformed("name prefix exceeds previous name").into());
        }
        let suffix = buf.unpack_bytes(l2)?;
        let mut full = self.prev_name[..l1].to_vec();
        full.extend_from_slice(&suffix);
        let (dir, name) = split_path(&String::from_utf8_lossy(&full));

        let mut flags = EntryFlags::empty();
        if x.contains(Xmit::TOP_DIR) {
            flags |= EntryFlags::TOP_DIR;
        }
        if p >= 30 && x.contains(Xmit::HLINKED) {
            flags |= EntryFlags::HLINKED;
            if x.contains(Xmit::HLINK_FIRST) {
                flags |= EntryFlags::HLINK_FIRST;
            }
        }

        let ndx = self.next_ndx;

        // (4) hard-link back-reference
        let mut hlink_ref: Option<i32> = None;
        if p >= 30 && x.contains(Xmit::HLINKED) && !x.contains(Xmit::HLINK_FIRST) {
            let first = buf.unpack_v32()?;
            hlink_ref = Some(first);
            if first < self.ndx_start {
                // everything else lives on the referenced entry
                self.prev_name = full;
                self.next_ndx += 1;
                return Ok(Decoded::Entry(Box::new(Entry {
                    dir,
                    name,
                    flags,
                    hlink_ref,
                    ..Entry::default()
                })));
            }
        }

        // (5) .. (8)
        let size = buf.unpack_v64(3)?;
        let mtime = if x.contains(Xmit::SAME_TIME) {
            self.prev_mtime
        } else if p >= 30 {
            buf.unpack_v64(4)?
        } else {
            i64::from(buf.unpack_s32()?)
        };
        let mtime_nsec = if p >= 31 && x.contains(Xmit::MOD_NSEC) {
            Some(buf.unpack_v32()?)
        } else {
            None
        };
        let wire_mode = if x.contains(Xmit::SAME_MODE) {
            self.prev_mode
        } else {
            buf.unpack_s32()?
        };
        let mode = from_wire_mode(wire_mode);

        // (9) + (10) ownership
        let mut uid = 0u32;
        let mut user = None;
        if o.owner != 0 {
            if x.contains(Xmit::SAME_UID) {
                uid = self.prev_uid;
            } else {
                uid = if p < 30 {
                    buf.unpack_s32()? as u32
                } else {
                    buf.unpack_v32()? as u32
                };
                if p >= 30 && x.contains(Xmit::USER_NAME_FOLLOWS) {
                    let n = usize::from(buf.unpack_u8()?);
                    let raw = buf.unpack_bytes(n)?;
                    user = Some(String::from_utf8_lossy(&raw).into_owned());
                }
            }
        }
        let mut gid = 0u32;
        let mut group = None;
        if o.group != 0 {
            if x.contains(Xmit::SAME_GID) {
                gid = self.prev_gid;
            } else {
                gid = if p < 30 {
                    buf.unpack_s32()? as u32
                } else {
                    buf.unpack_v32()? as u32
                };
                if p >= 30 && x.contains(Xmit::GROUP_NAME_FOLLOWS) {
                    let n = usize::from(buf.unpack_u8()?);
                    let raw = buf.unpack_bytes(n)?;
                    group = Some(String::from_utf8_lossy(&raw).into_owned());
                }
            }
        }

        // (11) device numbers
        let mut rdev = None;
        let mut rdev_packed = self.prev_rdev_packed;
        let mut rdev_major = self.prev_rdev_major;
        let send_rdev = xmit_rdev(o, p, mode);
        if send_rdev {
            if p < 28 {
                if !x.contains(Xmit::SAME_RDEV_PRE28) {
                    rdev_packed = buf.unpack_s32()?;
                }
                rdev = Some((rdev_packed >> 8, rdev_packed & 0xFF));
            } else {
                if !x.contains(Xmit::SAME_RDEV_MAJOR) {
                    rdev_major = self.varint30(buf)?;
                }
                let minor = if p >= 30 {
                    buf.unpack_v32()?
                } else if x.contains(Xmit::RDEV_MINOR_8_PRE30) {
                    i32::from(buf.unpack_u8()?)
                } else {
                    buf.unpack_s32()?
                };
                rdev = Some((rdev_major, minor));
            }
        }

        // (12) symlink target
        let symlink = if is_symlink(mode) {
            let n = self.read_len(buf, true)?;
            Some(buf.unpack_bytes(n)?)
        } else {
            None
        };

        // (13) old-style hard-link identity
        let mut dev = None;
        let mut ino = None;
        if o.hard_links != 0 && p < 30 {
            if p < 26 {
                if is_regular(mode) {
                    dev = Some(i64::from(buf.unpack_s32()?) - 1);
                    ino = Some(i64::from(buf.unpack_s32()?));
                }
            } else if x.contains(Xmit::HLINKED) {
                flags |= EntryFlags::HLINKED;
                let d = if x.contains(Xmit::SAME_DEV_PRE30) {
                    self.prev_dev
                } else {
                    buf.unpack_s64()? - 1
                };
                dev = Some(d);
                ino = Some(buf.unpack_s64()?);
            }
        }

        // (14) whole-file checksum
        let mut md4 = None;
        let mut md5 = None;
        if let Some(kind) = self.checksum {
            if is_regular(mode) {
                let sum = buf.unpack_bytes(kind.digest_len())?;
                match kind {
                    DigestKind::Md4 => md4 = Some(sum),
                    DigestKind::Md5 => md5 = Some(sum),
                    DigestKind::None => {}
                }
            } else if p < 28 {
                let _ = buf.unpack_bytes(kind.digest_len())?;
            }
        }

        if is_dir(mode) && !(p >= 30 && x.contains(Xmit::NO_CONTENT_DIR)) {
            flags |= EntryFlags::CONTENT_DIR;
        }

        // all fields read; commit the cursors
        self.prev_mode = wire_mode;
        self.prev_mtime = mtime;
        if o.owner != 0 {
            self.prev_uid = uid;
        }
        if o.group != 0 {
            self.prev_gid = gid;
        }
        if send_rdev {
            if p < 28 {
                self.prev_rdev_packed = rdev_packed;
            } else {
                self.prev_rdev_major = rdev_major;
            }
        }
        if let Some(d) = dev
            && (26..30).contains(&p)
        {
            self.prev_dev = d;
        }
        self.prev_name = full;
        self.next_ndx = ndx + 1;

        Ok(Decoded::Entry(Box::new(Entry {
            dir,
            name,
            mode,
            uid,
            gid,
            mtime,
            mtime_nsec,
            size,
            rdev,
            symlink,
            dev,
            ino,
            md4,
            md5,
            user,
            group,
            flags,
            hlink_ref,
            ..Entry::default()
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::super::ListEncoder;
    use super::*;
    use crate::names::{NameLookup, NoNames};
    use crate::{DigestKind, Options};

    fn transfer_opts() -> Options {
        let mut o = Options::new();
        o.apply_argv(["-aH", "--numeric-ids"]).unwrap();
        o
    }

    fn sample_entries() -> Vec<Entry> {
        let mut alpha = Entry::file("top/alpha", 0o100_644, 1234);
        alpha.uid = 1000;
        alpha.gid = 100;
        alpha.mtime = 1_700_000_000;

        let mut beta = Entry::file("top/alphabet", 0o100_600, 5_000_000_000);
        beta.uid = 1000;
        beta.gid = 100;
        beta.mtime = 1_700_000_000;
        beta.mtime_nsec = Some(123_456_789);

        let mut gamma = Entry::file("top/zz/deep", 0o100_755, 0);
        gamma.uid = 0;
        gamma.gid = 0;
        gamma.mtime = 999;

        let mut link1 = Entry::file("top/hard1", 0o100_644, 77);
        link1.dev = Some(2049);
        link1.ino = Some(424_242);
        link1.mtime = 1_700_000_001;
        let mut link2 = Entry::file("top/hard2", 0o100_644, 77);
        link2.dev = Some(2049);
        link2.ino = Some(424_242);
        link2.mtime = 1_700_000_001;

        vec![
            Entry::directory("top", 0o040_755),
            alpha,
            beta,
            Entry::symlink("top/ln", 0o120_777, b"alpha"),
            Entry::device("top/disk", 0o060_660, 8, 1),
            Entry::device("top/tty", 0o020_620, 4, 1024),
            Entry::device("top/fifo", 0o010_600, 0, 0),
            gamma,
            link1,
            link2,
        ]
    }

    fn encode_all(
        protocol: i32,
        opts: &Options,
        names: &dyn NameLookup,
        entries: &[Entry],
    ) -> Vec<u8> {
        let mut buf = crate::Buffer::new();
        let mut enc = ListEncoder::new(protocol, opts, names, 0).unwrap();
        for e in entries {
            enc.send(&mut buf, e).unwrap();
        }
        enc.finish(&mut buf);
        buf.take_all()
    }

    fn decode_all(protocol: i32, opts: &Options, bytes: &[u8]) -> Vec<Entry> {
        let mut buf = crate::Buffer::from_bytes(bytes);
        let mut dec = ListDecoder::new(protocol, opts, 0).unwrap();
        let mut out = Vec::new();
        loop {
            match dec.decode(&mut buf).unwrap() {
                Decoded::Entry(e) => out.push(*e),
                Decoded::End => return out,
                Decoded::NeedMore => panic!("stream ended without the list terminator"),
            }
        }
    }

    fn assert_semantic_match(protocol: i32, opts: &Options, sent: &Entry, got: &Entry) {
        let ctx = format!("v{protocol} {}", sent.full_name());
        assert_eq!(got.full_name(), sent.full_name(), "{ctx}: name");
        assert_eq!(got.mode, sent.mode, "{ctx}: mode");
        assert_eq!(got.size, sent.size, "{ctx}: size");
        assert_eq!(got.mtime, sent.mtime, "{ctx}: mtime");
        if opts.owner != 0 {
            assert_eq!(got.uid, sent.uid, "{ctx}: uid");
        }
        if opts.group != 0 {
            assert_eq!(got.gid, sent.gid, "{ctx}: gid");
        }
        let want_rdev = if xmit_rdev(opts, protocol, sent.mode) {
            Some(sent.rdev.unwrap_or((0, 0)))
        } else {
            None
        };
        assert_eq!(got.rdev, want_rdev, "{ctx}: rdev");
        assert_eq!(got.symlink, sent.symlink, "{ctx}: symlink");
        if protocol >= 31 {
            assert_eq!(got.mtime_nsec, sent.mtime_nsec, "{ctx}: nsec");
        } else {
            assert_eq!(got.mtime_nsec, None, "{ctx}: nsec absent");
        }
    }

    #[test]
    fn delta_round_trip_across_versions() {
        let opts = transfer_opts();
        let entries = sample_entries();
        for protocol in [29, 30, 31] {
            let bytes = encode_all(protocol, &opts, &NoNames, &entries);
            let decoded = decode_all(protocol, &opts, &bytes);
            assert_eq!(decoded.len(), entries.len(), "v{protocol}");
            for (sent, got) in entries.iter().zip(&decoded) {
                assert_semantic_match(protocol, &opts, sent, got);
            }
        }
    }

    #[test]
    fn hard_link_followers_reference_the_first_sighting() {
        let opts = transfer_opts();
        let entries = sample_entries();
        let decoded = decode_all(30, &opts, &encode_all(30, &opts, &NoNames, &entries));
        let first = decoded.iter().position(|e| e.name == "hard1").unwrap();
        let second = decoded.iter().position(|e| e.name == "hard2").unwrap();
        assert!(decoded[first].flags.contains(EntryFlags::HLINK_FIRST));
        assert_eq!(decoded[second].hlink_ref, Some(i32::try_from(first).unwrap()));
        assert!(!decoded[second].flags.contains(EntryFlags::HLINK_FIRST));
        // same-list reference still carries its own attributes
        assert_eq!(decoded[second].size, 77);
    }

    #[test]
    fn cross_list_hard_link_sends_nothing_further() {
        let opts = transfer_opts();
        let mut linked = Entry::file("a/one", 0o100_644, 5);
        linked.dev = Some(7);
        linked.ino = Some(99);
        let mut again = Entry::file("b/two", 0o100_644, 5);
        again.dev = Some(7);
        again.ino = Some(99);

        let mut buf = crate::Buffer::new();
        let mut enc = ListEncoder::new(30, &opts, &NoNames, 0).unwrap();
        enc.send(&mut buf, &linked).unwrap();
        enc.finish(&mut buf);
        enc.begin_list(1);
        enc.send(&mut buf, &again).unwrap();
        enc.finish(&mut buf);

        let mut rbuf = crate::Buffer::from_bytes(buf.take_all());
        let mut dec = ListDecoder::new(30, &opts, 0).unwrap();
        let Decoded::Entry(_) = dec.decode(&mut rbuf).unwrap() else {
            panic!("expected the first entry");
        };
        let Decoded::End = dec.decode(&mut rbuf).unwrap() else {
            panic!("expected the first list to end");
        };
        dec.begin_list(1);
        let Decoded::Entry(bare) = dec.decode(&mut rbuf).unwrap() else {
            panic!("expected the back-reference entry");
        };
        assert_eq!(bare.full_name(), "b/two");
        assert_eq!(bare.hlink_ref, Some(0));
        assert_eq!(bare.size, 0, "no attributes follow a cross-list reference");
        let Decoded::End = dec.decode(&mut rbuf).unwrap() else {
            panic!("expected the second list to end");
        };
    }

    #[test]
    fn checksums_travel_with_regular_files() {
        let mut opts = transfer_opts();
        opts.checksum = 1;
        opts.checksum_choice = Some("md5".to_owned());
        let mut entry = Entry::file("blob", 0o100_644, 3);
        entry.data = Some(b"abc".to_vec());
        let decoded = decode_all(
            31,
            &opts,
            &encode_all(31, &opts, &NoNames, std::slice::from_ref(&entry)),
        );
        assert_eq!(
            decoded[0].md5,
            Some(DigestKind::Md5.hasher().add(b"abc").digest())
        );
    }

    #[test]
    fn id_names_follow_when_numeric_ids_is_off() {
        struct Table;
        impl NameLookup for Table {
            fn uid_to_name(&self, uid: u32) -> Option<String> {
                (uid == 1000).then(|| "alice".to_owned())
            }
            fn gid_to_name(&self, gid: u32) -> Option<String> {
                (gid == 100).then(|| "staff".to_owned())
            }
        }
        let mut opts = transfer_opts();
        opts.numeric_ids = 0;
        let mut entry = Entry::file("owned", 0o100_644, 1);
        entry.uid = 1000;
        entry.gid = 100;

        let decoded = decode_all(
            30,
            &opts,
            &encode_all(30, &opts, &Table, std::slice::from_ref(&entry)),
        );
        assert_eq!(decoded[0].user.as_deref(), Some("alice"));
        assert_eq!(decoded[0].group.as_deref(), Some("staff"));

        // names never travel before protocol 30
        let decoded = decode_all(
            29,
            &opts,
            &encode_all(29, &opts, &Table, std::slice::from_ref(&entry)),
        );
        assert_eq!(decoded[0].user, None);
        assert_eq!(decoded[0].uid, 1000);
    }

    #[test]
    fn byte_at_a_time_feeding_reaches_the_same_list() {
        let opts = transfer_opts();
        let entries = sample_entries();
        let bytes = encode_all(31, &opts, &NoNames, &entries);

        let mut dec = ListDecoder::new(31, &opts, 0).unwrap();
        let mut buf = crate::Buffer::new();
        let mut out = Vec::new();
        let mut done = false;
        for b in &bytes {
            buf.append([*b]);
            loop {
                match dec.decode(&mut buf).unwrap() {
                    Decoded::Entry(e) => out.push(*e),
                    Decoded::End => {
                        done = true;
                        break;
                    }
                    Decoded::NeedMore => break,
                }
            }
        }
        assert!(done);
        assert_eq!(out.len(), entries.len());
        for (sent, got) in entries.iter().zip(&out) {
            assert_semantic_match(31, &opts, sent, got);
        }
    }

    #[test]
    fn truncation_mid_entry_is_recoverable() {
        let opts = transfer_opts();
        let entries = sample_entries();
        let bytes = encode_all(30, &opts, &NoNames, &entries);

        // stop right inside the third entry, then resume
        let cut = bytes.len() / 2;
        let mut dec = ListDecoder::new(30, &opts, 0).unwrap();
        let mut buf = crate::Buffer::from_bytes(&bytes[..cut]);
        let mut count = 0;
        loop {
            match dec.decode(&mut buf).unwrap() {
                Decoded::Entry(_) => count += 1,
                Decoded::NeedMore => break,
                Decoded::End => panic!("cut stream should not finish"),
            }
        }
        buf.append(&bytes[cut..]);
        loop {
            match dec.decode(&mut buf).unwrap() {
                Decoded::Entry(_) => count += 1,
                Decoded::End => break,
                Decoded::NeedMore => panic!("full stream should finish"),
            }
        }
        assert_eq!(count, entries.len());
    }

    #[test]
    fn corrupt_name_prefix_is_an_error_not_a_retry() {
        let opts = transfer_opts();
        // SAME_NAME with a 200-byte prefix against an empty cursor
        let mut buf = crate::Buffer::new();
        buf.pack_u8(Xmit::SAME_NAME.bits() as u8);
        buf.pack_u8(200);
        buf.pack_u8(1);
        buf.pack_u8(b'x');
        let mut dec = ListDecoder::new(30, &opts, 0).unwrap();
        assert!(dec.decode(&mut buf).is_err());
    }
}
