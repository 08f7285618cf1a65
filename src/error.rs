use core::fmt;

/// Errors produced by the wire codec in [`crate::Buffer`].
///
/// `Truncated` is the recoverable "feed me more bytes" signal: every
/// unpack routine that returns it leaves the read cursor exactly where it
/// was, so the same call succeeds once more input has been appended.
/// Every other variant is a malformed or unrepresentable encoding and
/// retrying will not help.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum WireError {
    /// Not enough bytes buffered to finish the decode.
    Truncated,
    /// A variable-length integer header announced more extension bytes
    /// than the encoding allows.
    BadVarintHeader(u8),
    /// The value cannot be represented in the requested width.
    Overflow(&'static str),
    /// A length-prefixed string exceeded the 15-bit vstring limit.
    StringTooLong(usize),
    /// A multiplex frame header carried an out-of-range channel code.
    BadMessageCode(u8),
    /// Payload bytes were not valid for the expected text encoding.
    BadUtf8,
    /// A structurally impossible encoding (e.g. a name-prefix length
    /// longer than the previous name).
    Malformed(&'static str),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Truncated => write!(f, "insufficient bytes buffered"),
            Self::BadVarintHeader(b) => write!(f, "invalid varint header byte {b:#04x}"),
            Self::Overflow(what) => write!(f, "value does not fit in {what}"),
            Self::StringTooLong(n) => write!(f, "string of {n} bytes exceeds vstring limit"),
            Self::BadMessageCode(c) => write!(f, "multiplex header byte {c:#04x} below MPLEX_BASE"),
            Self::BadUtf8 => write!(f, "text payload is not valid UTF-8"),
            Self::Malformed(what) => write!(f, "malformed encoding: {what}"),
        }
    }
}

impl core::error::Error for WireError {}

/// Errors from the option table and argv parser.
///
/// All variants carry the offending token so callers can echo rsync-style
/// diagnostics verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum OptionError {
    UnknownOption(String),
    MissingValue(String),
    UnexpectedValue(String),
    InvalidNumber(String),
    InvalidSize(String),
    /// A single-assignment option (`--usermap`, `--groupmap`) was set twice.
    AlreadySet(&'static str),
    /// `--remote-option` value did not begin with `-`.
    RemoteOptionSyntax(String),
    /// A positional argument appeared before the options were exhausted.
    StrayArgument(String),
    /// More than two positional arguments remained after option parsing.
    TooManyArguments(String),
    InvalidChecksumChoice(String),
}

impl fmt::Display for OptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UnknownOption(ref t) => write!(f, "unknown option: {t}"),
            Self::MissingValue(ref t) => write!(f, "option {t} requires a value"),
            Self::UnexpectedValue(ref t) => write!(f, "option {t} does not take a value"),
            Self::InvalidNumber(ref t) => write!(f, "invalid numeric value: {t}"),
            Self::InvalidSize(ref t) => write!(f, "invalid size: {t}"),
            Self::AlreadySet(name) => write!(f, "option --{name} may only be given once"),
            Self::RemoteOptionSyntax(ref t) => {
                write!(f, "remote option must begin with a dash: {t}")
            }
            Self::StrayArgument(ref t) => write!(f, "unexpected argument before options: {t}"),
            Self::TooManyArguments(ref t) => write!(f, "too many positional arguments at: {t}"),
            Self::InvalidChecksumChoice(ref t) => write!(f, "invalid checksum choice: {t}"),
        }
    }
}

impl core::error::Error for OptionError {}

/// Errors from digest selection and file-list checksumming.
#[derive(Debug)]
#[allow(clippy::exhaustive_enums)]
pub enum DigestError {
    /// The named checksum is not one of auto/md4/md5/none.
    Unsupported(String),
    /// The checksum exists but the negotiated protocol is too old for it.
    ProtocolTooOld { name: &'static str, version: i32 },
    /// The entry carries no cached digest, no data, and no path.
    NothingToDigest,
    /// Reading checksum material from a file or stream failed.
    Io(std::io::Error),
}

impl fmt::Display for DigestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Unsupported(ref name) => write!(f, "unsupported checksum: {name}"),
            Self::ProtocolTooOld { name, version } => {
                write!(f, "checksum {name} unavailable at protocol {version}")
            }
            Self::NothingToDigest => write!(f, "file-list entry has nothing to digest"),
            Self::Io(ref e) => write!(f, "checksum read failed: {e}"),
        }
    }
}

impl core::error::Error for DigestError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match *self {
            Self::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DigestError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors surfaced by [`crate::Session`] operations.
#[derive(Debug)]
#[allow(clippy::exhaustive_enums)]
pub enum ProtoError {
    /// The session already entered `Fatal`; no further operations allowed.
    SessionFatal,
    /// An action method was invoked in a state that does not support it.
    BadState {
        operation: &'static str,
        state: &'static str,
    },
    /// `pop_state` on an empty stack.
    EmptyStateStack,
    /// Nested sub-dialogues exceeded the bounded stack depth.
    StateStackOverflow,
    /// An auth challenge salt contained a newline.
    BadChallenge,
    Wire(WireError),
    Option(OptionError),
    Digest(DigestError),
}

impl fmt::Display for ProtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SessionFatal => write!(f, "session is in the fatal state"),
            Self::BadState { operation, state } => {
                write!(f, "{operation} is not valid in state {state}")
            }
            Self::EmptyStateStack => write!(f, "state stack underflow"),
            Self::StateStackOverflow => write!(f, "state stack depth exceeded"),
            Self::BadChallenge => write!(f, "auth challenge must not contain a newline"),
            Self::Wire(ref e) => write!(f, "wire error: {e}"),
            Self::Option(ref e) => write!(f, "option error: {e}"),
            Self::Digest(ref e) => write!(f, "digest error: {e}"),
        }
    }
}

impl core::error::Error for ProtoError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match *self {
            Self::Wire(ref e) => Some(e),
            Self::Option(ref e) => Some(e),
            Self::Digest(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<WireError> for ProtoError {
    fn from(e: WireError) -> Self {
        Self::Wire(e)
    }
}

impl From<OptionError> for ProtoError {
    fn from(e: OptionError) -> Self {
        Self::Option(e)
    }
}

impl From<DigestError> for ProtoError {
    fn from(e: DigestError) -> Self {
        Self::Digest(e)
    }
}
