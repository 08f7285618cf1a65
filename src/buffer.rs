use crate::WireError;

/// Result alias used by every unpack routine.
pub type WireResult<T> = core::result::Result<T, WireError>;

/// Channel codes sit this far above zero in the multiplex header byte.
pub const MPLEX_BASE: u8 = 7;

/// Largest payload a single multiplex frame can carry (24-bit length).
pub const MAX_MSG_PAYLOAD: usize = 0x00FF_FFFF;

/// A growable byte buffer with a read cursor, plus the catalogue of rsync
/// wire encodings.
///
/// Writes always append at the end; unpacking reads from `pos` forward and
/// advances it. Every `unpack_*` routine is atomic: on
/// [`WireError::Truncated`] (or any other error) the cursor is left where
/// it was, so the caller can append more bytes and retry the same call.
///
/// All multi-byte integers are little-endian on the wire except the
/// two-byte vstring length, which is big-endian with the top bit set.
///
/// # Examples
/// ```
/// use rsyncwire::Buffer;
///
/// let mut b = Buffer::new();
/// b.pack_v32(1234);
/// b.pack_vstring(b"hello").unwrap();
/// assert_eq!(b.unpack_v32().unwrap(), 1234);
/// assert_eq!(b.unpack_vstring().unwrap(), b"hello");
/// ```
#[derive(Debug, Default, Clone)]
pub struct Buffer {
    data: Vec<u8>,
    pos: usize,
}

impl Buffer {
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            pos: 0,
        }
    }

    #[must_use]
    pub fn from_bytes<B: AsRef<[u8]>>(bytes: B) -> Self {
        Self {
            data: bytes.as_ref().to_vec(),
            pos: 0,
        }
    }

    /// Appends raw bytes; never moves the read cursor.
    #[inline]
    pub fn append<B: AsRef<[u8]>>(&mut self, bytes: B) {
        self.data.extend_from_slice(bytes.as_ref());
    }

    /// Drops the already-consumed prefix `[0, pos)` and resets `pos` to 0.
    pub fn discard(&mut self) {
        if self.pos > 0 {
            self.data.drain(..self.pos);
            self.pos = 0;
        }
    }

    /// Resets to an empty buffer.
    pub fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    #[inline]
    pub const fn pos(&self) -> usize {
        self.pos
    }

    /// Moves the read cursor. Clamped to the buffer length.
    #[inline]
    pub fn set_pos(&mut self, n: usize) {
        self.pos = n.min(self.data.len());
    }

    /// The whole buffer, consumed or not.
    #[must_use]
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// The unconsumed tail `[pos, len)`.
    #[must_use]
    #[inline]
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Takes the entire contents, leaving the buffer empty. This is how a
    /// transport drains the write side.
    #[must_use]
    pub fn take_all(&mut self) -> Vec<u8> {
        self.pos = 0;
        core::mem::take(&mut self.data)
    }

    /// Consumes exactly `n` bytes or fails without moving the cursor.
    fn take(&mut self, n: usize) -> WireResult<&[u8]> {
        if self.data.len() - self.pos < n {
            return Err(WireError::Truncated);
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    /// Runs a multi-step decode, restoring the cursor on any failure.
    fn atomic<T>(&mut self, f: impl FnOnce(&mut Self) -> WireResult<T>) -> WireResult<T> {
        let mark = self.pos;
        let out = f(self);
        if out.is_err() {
            self.pos = mark;
        }
        out
    }

    // fixed-width codecs

    #[inline]
    pub fn pack_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    #[inline]
    pub fn pack_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn pack_s32(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn unpack_u8(&mut self) -> WireResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn unpack_u16(&mut self) -> WireResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn unpack_s32(&mut self) -> WireResult<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// 64-bit values ride in 4 bytes when they fit in `[0, 2^31 - 1)`;
    /// anything else is the `0xFFFFFFFF` sentinel followed by 8 bytes.
    pub fn pack_s64(&mut self, v: i64) {
        if (0..0x7FFF_FFFF).contains(&v) {
            #[allow(clippy::cast_possible_truncation)]
            self.pack_s32(v as i32);
        } else {
            self.data.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
            self.data.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn unpack_s64(&mut self) -> WireResult<i64> {
        self.atomic(|b| {
            let first = b.take(4)?;
            let word = u32::from_le_bytes([first[0], first[1], first[2], first[3]]);
            if word != u32::MAX {
                #[allow(clippy::cast_possible_wrap)]
                return Ok(i64::from(word as i32));
            }
            let rest = b.take(8)?;
            let mut wide = [0u8; 8];
            wide.copy_from_slice(rest);
            Ok(i64::from_le_bytes(wide))
        })
    }

    pub fn pack_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn unpack_bytes(&mut self, n: usize) -> WireResult<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    // variable-length integers
    //
    // One header byte whose leading-ones count announces how many
    // extension bytes follow; the remaining header bits carry the top of
    // the value. v32 is the min_bytes = 1 instance over 32 bits.

    pub fn pack_v32(&mut self, v: i32) {
        #[allow(clippy::cast_sign_loss)]
        let le = (v as u32).to_le_bytes();
        let mut cnt = 4usize;
        while cnt > 1 && le[cnt - 1] == 0 {
            cnt -= 1;
        }
        let shift = 7 - (cnt - 1);
        let bit = 1u16 << shift;
        let top = u16::from(le[cnt - 1]);
        #[allow(clippy::cast_possible_truncation)]
        let header = if top >= bit {
            cnt += 1;
            !(bit - 1) as u8
        } else if cnt > 1 {
            (top | !(bit * 2 - 1)) as u8
        } else {
            le[0]
        };
        self.data.push(header);
        self.data.extend_from_slice(&le[..cnt - 1]);
    }

    pub fn unpack_v32(&mut self) -> WireResult<i32> {
        self.atomic(|b| {
            let header = b.take(1)?[0];
            let extra = header.leading_ones() as usize;
            if extra > 4 {
                return Err(WireError::BadVarintHeader(header));
            }
            let mut val: u64 = 0;
            if extra > 0 {
                for (i, byte) in b.take(extra)?.iter().enumerate() {
                    val |= u64::from(*byte) << (8 * i);
                }
                // the 5-byte form ignores the low header bits entirely
                if extra < 4 {
                    let inline = u64::from(header) & ((1u64 << (8 - extra)) - 1);
                    val |= inline << (8 * extra);
                }
            } else {
                val = u64::from(header);
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            Ok(val as u32 as i32)
        })
    }

    /// Encodes a 64-bit value in at least `min_bytes` and at most
    /// `min_bytes + 6` bytes. Values too large for the width are an
    /// [`WireError::Overflow`]; `min_bytes < 3` cannot cover the full
    /// 64-bit domain.
    pub fn pack_v64(&mut self, v: i64, min_bytes: usize) -> WireResult<()> {
        debug_assert!((1..=7).contains(&min_bytes));
        #[allow(clippy::cast_sign_loss)]
        let le = (v as u64).to_le_bytes();
        let mut cnt = 8usize;
        while cnt > min_bytes && le[cnt - 1] == 0 {
            cnt -= 1;
        }
        let shift = 7 - (cnt - min_bytes);
        let bit = 1u16 << shift;
        let top = u16::from(le[cnt - 1]);
        #[allow(clippy::cast_possible_truncation)]
        let header = if top >= bit {
            cnt += 1;
            !(bit - 1) as u8
        } else if cnt > min_bytes {
            (top | !(bit * 2 - 1)) as u8
        } else {
            le[cnt - 1]
        };
        if cnt - min_bytes > 6 {
            return Err(WireError::Overflow("v64 with this min_bytes"));
        }
        self.data.push(header);
        self.data.extend_from_slice(&le[..cnt - 1]);
        Ok(())
    }

    pub fn unpack_v64(&mut self, min_bytes: usize) -> WireResult<i64> {
        debug_assert!((1..=7).contains(&min_bytes));
        self.atomic(|b| {
            let head = b.take(min_bytes)?.to_vec();
            let header = head[0];
            let extra = (header.leading_ones() as usize).min(6);
            let width = min_bytes - 1 + extra;
            if width > 8 {
                return Err(WireError::BadVarintHeader(header));
            }
            let mut val: u64 = 0;
            for (i, byte) in head[1..].iter().enumerate() {
                val |= u64::from(*byte) << (8 * i);
            }
            if extra > 0 {
                for (i, byte) in b.take(extra)?.iter().enumerate() {
                    val |= u64::from(*byte) << (8 * (min_bytes - 1 + i));
                }
            }
            let inline = if extra == 0 {
                u64::from(header)
            } else {
                u64::from(header) & ((1u64 << (8 - extra)) - 1)
            };
            let inline_shift = 8 * width;
            // top header bits past bit 63 are dropped, mirroring the v32
            // 5-byte quirk
            if inline_shift < 64 {
                val |= inline << inline_shift;
            }
            #[allow(clippy::cast_possible_wrap)]
            Ok(val as i64)
        })
    }

    // strings, lines, frames

    /// Length-prefixed byte string: one byte below 128, otherwise a
    /// big-endian 16-bit length with the top bit set. Longer than 0x7FFF
    /// is rejected.
    pub fn pack_vstring(&mut self, s: &[u8]) -> WireResult<()> {
        let n = s.len();
        if n < 0x80 {
            #[allow(clippy::cast_possible_truncation)]
            self.data.push(n as u8);
        } else if n < 0x8000 {
            #[allow(clippy::cast_possible_truncation)]
            self.data.push(0x80 | (n >> 8) as u8);
            #[allow(clippy::cast_possible_truncation)]
            self.data.push((n & 0xFF) as u8);
        } else {
            return Err(WireError::StringTooLong(n));
        }
        self.data.extend_from_slice(s);
        Ok(())
    }

    pub fn unpack_vstring(&mut self) -> WireResult<Vec<u8>> {
        self.atomic(|b| {
            let first = b.take(1)?[0];
            let n = if first & 0x80 == 0 {
                usize::from(first)
            } else {
                let second = b.take(1)?[0];
                (usize::from(first & 0x7F) << 8) | usize::from(second)
            };
            Ok(b.take(n)?.to_vec())
        })
    }

    /// Appends a line, supplying the trailing newline when missing.
    pub fn pack_line<B: AsRef<[u8]>>(&mut self, line: B) {
        let line = line.as_ref();
        self.data.extend_from_slice(line);
        if line.last() != Some(&b'\n') {
            self.data.push(b'\n');
        }
    }

    /// Consumes one newline-terminated line, returning it without the
    /// terminator. No newline buffered yet means [`WireError::Truncated`].
    pub fn unpack_line(&mut self) -> WireResult<Vec<u8>> {
        let rest = &self.data[self.pos..];
        let Some(nl) = rest.iter().position(|&b| b == b'\n') else {
            return Err(WireError::Truncated);
        };
        let line = rest[..nl].to_vec();
        self.pos += nl + 1;
        Ok(line)
    }

    /// Like [`Self::unpack_line`] but insists on UTF-8.
    pub fn unpack_line_str(&mut self) -> WireResult<String> {
        let mark = self.pos;
        let raw = self.unpack_line()?;
        String::from_utf8(raw).map_err(|_| {
            self.pos = mark;
            WireError::BadUtf8
        })
    }

    /// Multiplex frame: 32-bit LE header `((7 + code) << 24) | len`
    /// followed by the payload.
    pub fn pack_msg(&mut self, code: u8, payload: &[u8]) -> WireResult<()> {
        if code > u8::MAX - MPLEX_BASE {
            return Err(WireError::BadMessageCode(code));
        }
        if payload.len() > MAX_MSG_PAYLOAD {
            return Err(WireError::Overflow("24-bit multiplex length"));
        }
        #[allow(clippy::cast_possible_truncation)]
        let header = (u32::from(MPLEX_BASE + code) << 24) | payload.len() as u32;
        self.data.extend_from_slice(&header.to_le_bytes());
        self.data.extend_from_slice(payload);
        Ok(())
    }

    pub fn unpack_msg(&mut self) -> WireResult<(u8, Vec<u8>)> {
        self.atomic(|b| {
            let head = b.take(4)?;
            let header = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
            #[allow(clippy::cast_possible_truncation)]
            let tag = (header >> 24) as u8;
            if tag < MPLEX_BASE {
                return Err(WireError::BadMessageCode(tag));
            }
            let len = (header & 0x00FF_FFFF) as usize;
            Ok((tag - MPLEX_BASE, b.take(len)?.to_vec()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngExt;

    #[test]
    fn fixed_width_round_trips() {
        let mut b = Buffer::new();
        for v in [0u8, 1, 0x7F, 0x80, 0xFF] {
            b.pack_u8(v);
            assert_eq!(b.unpack_u8().unwrap(), v);
        }
        for v in [0u16, 1, 0x00FF, 0xFF00, 0xFFFF] {
            b.pack_u16(v);
            assert_eq!(b.unpack_u16().unwrap(), v);
        }
        for v in [0i32, 1, -1, i32::MIN, i32::MAX, 0x12_3456] {
            b.pack_s32(v);
            assert_eq!(b.unpack_s32().unwrap(), v);
        }
    }

    #[test]
    fn s64_uses_the_sentinel_escape() {
        let mut b = Buffer::new();
        b.pack_s64(7);
        assert_eq!(b.len(), 4);
        b.clear();

        // 2^31 - 1 is just outside the short form
        b.pack_s64(0x7FFF_FFFF);
        assert_eq!(b.len(), 12);
        assert_eq!(&b.as_slice()[..4], &[0xFF; 4]);
        assert_eq!(b.unpack_s64().unwrap(), 0x7FFF_FFFF);

        for v in [-1i64, i64::MIN, i64::MAX, 1 << 40] {
            b.clear();
            b.pack_s64(v);
            assert_eq!(b.unpack_s64().unwrap(), v);
        }
    }

    #[test]
    fn v32_known_encodings() {
        let mut b = Buffer::new();
        b.pack_v32(0);
        assert_eq!(b.as_slice(), &[0x00]);
        b.clear();
        b.pack_v32(0x7F);
        assert_eq!(b.as_slice(), &[0x7F]);
        b.clear();
        b.pack_v32(0x80);
        assert_eq!(b.as_slice(), &[0x80, 0x80]);
        b.clear();
        b.pack_v32(0x1234);
        assert_eq!(b.as_slice(), &[0x92, 0x34]);
        b.clear();
        b.pack_v32(-1);
        assert_eq!(b.as_slice(), &[0xF0, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn v32_round_trips() {
        let mut b = Buffer::new();
        let mut rng = rand::rng();
        let mut domain = vec![
            0,
            1,
            0x7F,
            0x80,
            0xFF,
            0x100,
            0x3FFF,
            0x4000,
            0x1F_FFFF,
            0x20_0000,
            0x0FFF_FFFF,
            0x1000_0000,
            i32::MAX,
            -1,
            -12345,
            i32::MIN,
        ];
        for _ in 0..2000 {
            domain.push(rng.random::<i32>());
        }
        for v in domain {
            b.clear();
            b.pack_v32(v);
            assert!(b.len() <= 5);
            assert_eq!(b.unpack_v32().unwrap(), v, "value {v:#x}");
        }
    }

    #[test]
    fn v32_five_byte_form_ignores_low_header_bits() {
        // the reference decoder throws away the 4 low bits of a 0xFX header
        for header in [0xF0u8, 0xF5, 0xFF] {
            if header.leading_ones() > 4 {
                continue;
            }
            let mut b = Buffer::from_bytes([header, 0x78, 0x56, 0x34, 0x12]);
            assert_eq!(b.unpack_v32().unwrap(), 0x1234_5678);
        }
    }

    #[test]
    fn v64_round_trips_for_each_min_bytes() {
        let mut b = Buffer::new();
        let mut rng = rand::rng();
        let mut domain: Vec<i64> = vec![
            0,
            1,
            0x7F,
            0x80,
            0xFFFF,
            0x10_0000,
            0xFFFF_FFFF,
            1 << 33,
            1 << 50,
            i64::MAX,
        ];
        for _ in 0..2000 {
            domain.push(rng.random::<u64>() as i64);
        }
        for &m in &[3usize, 4, 5] {
            for &v in &domain {
                let v = if v < 0 { !v } else { v }; // stay in [0, 2^63)
                b.clear();
                b.pack_v64(v, m).unwrap();
                assert!(b.len() >= m && b.len() <= m + 6);
                assert_eq!(b.unpack_v64(m).unwrap(), v, "value {v:#x} min {m}");
            }
        }
    }

    #[test]
    fn v64_minimum_width_is_padded() {
        let mut b = Buffer::new();
        b.pack_v64(0, 3).unwrap();
        assert_eq!(b.as_slice(), &[0, 0, 0]);
        b.clear();
        b.pack_v64(5, 4).unwrap();
        assert_eq!(b.as_slice(), &[0, 5, 0, 0]);
        assert_eq!(b.unpack_v64(4).unwrap(), 5);
    }

    #[test]
    fn v64_narrow_min_bytes_cannot_hold_everything() {
        let mut b = Buffer::new();
        assert!(b.pack_v64(i64::MAX, 1).is_err());
        assert!(b.pack_v64(i64::MAX, 2).is_err());
        assert!(b.pack_v64(i64::MAX, 3).is_ok());
    }

    #[test]
    fn truncated_unpacks_leave_the_cursor_alone() {
        let mut b = Buffer::new();
        b.pack_u8(0x92); // v32 header wanting one more byte
        assert_eq!(b.unpack_v32(), Err(WireError::Truncated));
        assert_eq!(b.pos(), 0);
        b.append([0x34]);
        assert_eq!(b.unpack_v32().unwrap(), 0x1234);

        b.clear();
        b.append([0xFF, 0xFF, 0xFF, 0xFF, 1, 2]); // s64 sentinel, short tail
        assert_eq!(b.unpack_s64(), Err(WireError::Truncated));
        assert_eq!(b.pos(), 0);
        b.append([3, 4, 5, 6, 7, 8]);
        assert_eq!(b.unpack_s64().unwrap(), i64::from_le_bytes([1, 2, 3, 4, 5, 6, 7, 8]));
    }

    #[test]
    fn vstring_length_prefixes() {
        let mut b = Buffer::new();
        b.pack_vstring(b"abc").unwrap();
        assert_eq!(b.as_slice(), b"\x03abc");
        assert_eq!(b.unpack_vstring().unwrap(), b"abc");

        b.clear();
        let long = vec![b'x'; 0x1234];
        b.pack_vstring(&long).unwrap();
        assert_eq!(&b.as_slice()[..2], &[0x92, 0x34]); // big-endian, top bit set
        assert_eq!(b.unpack_vstring().unwrap(), long);

        b.clear();
        let huge = vec![b'x'; 0x8000];
        assert!(matches!(b.pack_vstring(&huge), Err(WireError::StringTooLong(_))));
    }

    #[test]
    fn lines_and_frames() {
        let mut b = Buffer::new();
        b.pack_line("hello");
        b.pack_line("world\n");
        assert_eq!(b.unpack_line().unwrap(), b"hello");
        assert_eq!(b.unpack_line_str().unwrap(), "world");
        assert_eq!(b.unpack_line(), Err(WireError::Truncated));

        b.clear();
        b.pack_msg(2, b"stats").unwrap();
        let (code, payload) = b.unpack_msg().unwrap();
        assert_eq!((code, payload.as_slice()), (2, &b"stats"[..]));

        // a frame header without its payload must not consume anything
        b.clear();
        b.pack_msg(0, &[1, 2, 3, 4]).unwrap();
        let bytes = b.take_all();
        let mut partial = Buffer::from_bytes(&bytes[..5]);
        assert_eq!(partial.unpack_msg(), Err(WireError::Truncated));
        assert_eq!(partial.pos(), 0);
        partial.append(&bytes[5..]);
        assert_eq!(partial.unpack_msg().unwrap().1, vec![1, 2, 3, 4]);
    }

    #[test]
    fn discard_drops_only_the_consumed_prefix() {
        let mut b = Buffer::new();
        b.append(b"abcdef");
        let _ = b.take(2).unwrap();
        b.discard();
        assert_eq!(b.as_slice(), b"cdef");
        assert_eq!(b.pos(), 0);
    }
}
