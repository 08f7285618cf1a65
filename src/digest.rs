use crate::DigestError;
use crate::flist::Entry;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use md4::Md4;
use md5::{Digest as _, Md5};
use std::fs::File;
use std::io::Read;

/// Streamed reads go through a fixed scratch this big.
const CHUNK: usize = 64 * 1024;

/// Which checksum a session has agreed to use.
///
/// Selection depends on both the requested name and the negotiated
/// protocol: MD5 only exists on the wire from version 30, MD4 from 27.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    Md4,
    Md5,
    /// Checksums disabled; `digest()` yields a single `\0` byte.
    None,
}

impl DigestKind {
    /// Picks the digest for `name` under `protocol_version`, per the
    /// upstream selection rules. `None`/empty/`auto` defer to the version.
    pub fn select(name: Option<&str>, protocol_version: i32) -> Result<Self, DigestError> {
        match name.unwrap_or("auto") {
            "" | "auto" => {
                if protocol_version >= 30 {
                    Ok(Self::Md5)
                } else if protocol_version >= 27 {
                    Ok(Self::Md4)
                } else {
                    Err(DigestError::ProtocolTooOld {
                        name: "auto",
                        version: protocol_version,
                    })
                }
            }
            "md4" => {
                if protocol_version >= 27 {
                    Ok(Self::Md4)
                } else {
                    Err(DigestError::ProtocolTooOld {
                        name: "md4",
                        version: protocol_version,
                    })
                }
            }
            "md5" => Ok(Self::Md5),
            "none" => Ok(Self::None),
            other => Err(DigestError::Unsupported(other.to_owned())),
        }
    }

    /// Natural digest width in bytes.
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Md4 | Self::Md5 => 16,
            Self::None => 1,
        }
    }

    #[must_use]
    pub fn hasher(self) -> Hasher {
        match self {
            Self::Md4 => Hasher::Md4(Box::new(Md4::new())),
            Self::Md5 => Hasher::Md5(Box::new(Md5::new())),
            Self::None => Hasher::Null,
        }
    }

    /// Checksum for a file-list entry, preferring pre-computed digests,
    /// then in-memory `data`, then a filesystem `path`.
    pub fn filelist_checksum(self, entry: &Entry) -> Result<Vec<u8>, DigestError> {
        match self {
            Self::Md4 => {
                if let Some(ref sum) = entry.md4 {
                    return Ok(sum.clone());
                }
            }
            Self::Md5 => {
                if let Some(ref sum) = entry.md5 {
                    return Ok(sum.clone());
                }
            }
            Self::None => return Ok(vec![0]),
        }
        if let Some(ref data) = entry.data {
            return Ok(self.hasher().add(data).digest());
        }
        if let Some(ref path) = entry.path {
            let file = File::open(path)?;
            return Ok(self.hasher().addfile(file)?.digest());
        }
        Err(DigestError::NothingToDigest)
    }
}

/// An in-progress digest, chainable by value.
///
/// ```
/// use rsyncwire::DigestKind;
///
/// let sum = DigestKind::Md5.hasher().add(b"abc").digest();
/// assert_eq!(sum.len(), 16);
/// ```
#[derive(Debug)]
pub enum Hasher {
    Md4(Box<Md4>),
    Md5(Box<Md5>),
    Null,
}

impl Hasher {
    #[must_use]
    pub fn add<B: AsRef<[u8]>>(mut self, bytes: B) -> Self {
        match self {
            Self::Md4(ref mut h) => h.update(bytes.as_ref()),
            Self::Md5(ref mut h) => h.update(bytes.as_ref()),
            Self::Null => {}
        }
        self
    }

    /// Feeds an entire readable stream through the digest.
    pub fn addfile<R: Read>(mut self, mut reader: R) -> std::io::Result<Self> {
        let mut chunk = vec![0u8; CHUNK];
        loop {
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                return Ok(self);
            }
            self = self.add(&chunk[..n]);
        }
    }

    #[must_use]
    pub fn digest(self) -> Vec<u8> {
        match self {
            Self::Md4(h) => h.finalize().to_vec(),
            Self::Md5(h) => h.finalize().to_vec(),
            Self::Null => vec![0],
        }
    }
}

/// The daemon-auth response hash: `base64(H(password || challenge))` with
/// the `=` padding stripped, H being MD5 from protocol 30 and MD4 before.
#[must_use]
pub fn auth_hash(password: &str, challenge: &str, protocol_version: i32) -> String {
    let kind = if protocol_version >= 30 {
        DigestKind::Md5
    } else {
        DigestKind::Md4
    };
    let sum = kind.hasher().add(password).add(challenge).digest();
    STANDARD_NO_PAD.encode(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn selection_table() {
        assert_eq!(DigestKind::select(None, 31).unwrap(), DigestKind::Md5);
        assert_eq!(DigestKind::select(Some("auto"), 30).unwrap(), DigestKind::Md5);
        assert_eq!(DigestKind::select(Some("auto"), 29).unwrap(), DigestKind::Md4);
        assert_eq!(DigestKind::select(Some("md4"), 29).unwrap(), DigestKind::Md4);
        assert_eq!(DigestKind::select(Some("md5"), 26).unwrap(), DigestKind::Md5);
        assert_eq!(DigestKind::select(Some("none"), 31).unwrap(), DigestKind::None);
        assert!(matches!(
            DigestKind::select(Some("auto"), 26),
            Err(DigestError::ProtocolTooOld { .. })
        ));
        assert!(matches!(
            DigestKind::select(Some("md4"), 26),
            Err(DigestError::ProtocolTooOld { .. })
        ));
        assert!(matches!(
            DigestKind::select(Some("sha9"), 31),
            Err(DigestError::Unsupported(_))
        ));
    }

    #[test]
    fn known_digest_vectors() {
        assert_eq!(
            hex(&DigestKind::Md5.hasher().digest()),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            hex(&DigestKind::Md4.hasher().digest()),
            "31d6cfe0d16ae931b73c59d7e0c089c0"
        );
        assert_eq!(
            hex(&DigestKind::Md5.hasher().add(b"abc").digest()),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(DigestKind::None.hasher().add(b"abc").digest(), vec![0]);
    }

    #[test]
    fn chained_adds_equal_one_add() {
        let joined = DigestKind::Md5.hasher().add(b"passqwerty12345").digest();
        let chained = DigestKind::Md5.hasher().add(b"pass").add(b"qwerty12345").digest();
        assert_eq!(joined, chained);
    }

    #[test]
    fn addfile_streams_the_reader() {
        let material = vec![7u8; 200_000];
        let direct = DigestKind::Md5.hasher().add(&material).digest();
        let streamed = DigestKind::Md5
            .hasher()
            .addfile(material.as_slice())
            .unwrap()
            .digest();
        assert_eq!(direct, streamed);
    }

    #[test]
    fn auth_hash_matches_the_reference_client() {
        assert_eq!(auth_hash("pass", "qwerty12345", 30), "Zp77fT8TRrZ+9A9JFNT/UA");
    }

    #[test]
    fn filelist_checksum_source_order() {
        let mut entry = Entry::file("f", 0o100_644, 3);
        entry.data = Some(b"abc".to_vec());
        assert_eq!(
            hex(&DigestKind::Md5.filelist_checksum(&entry).unwrap()),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        entry.md5 = Some(vec![0xAA; 16]);
        assert_eq!(DigestKind::Md5.filelist_checksum(&entry).unwrap(), vec![0xAA; 16]);
        // cached md5 does not satisfy an md4 request
        assert_eq!(
            hex(&DigestKind::Md4.filelist_checksum(&entry).unwrap()),
            hex(&DigestKind::Md4.hasher().add(b"abc").digest())
        );

        let bare = Entry::file("g", 0o100_644, 0);
        assert!(matches!(
            DigestKind::Md5.filelist_checksum(&bare),
            Err(DigestError::NothingToDigest)
        ));
    }
}
