#![allow(clippy::inline_always)]

//! A non-blocking, sans-I/O engine for the rsync wire protocol
//! (versions 29 through 31), usable from either end of the connection.
//!
//! The engine owns no sockets, no files, and no threads: feed inbound
//! bytes into [`Session::rbuf`], call [`Session::parse`] for events, call
//! action methods to queue outbound bytes on [`Session::wbuf`], and drain
//! those on whatever transport you like. The same core drives blocking
//! sockets, event loops, and the in-memory harnesses in the test suite.
//!
//! ```
//! use rsyncwire::{Event, Session};
//!
//! let mut s = Session::new();
//! s.start_daemon_client(["-av"], "backups", None, None).unwrap();
//! s.rbuf.append(b"@RSYNCD: 31.0\n");
//! assert_eq!(s.parse().unwrap(), Some(Event::Protocol(31)));
//! // bytes for the transport are waiting in s.wbuf
//! assert!(!s.wbuf.is_empty());
//! ```

mod buffer;
pub use buffer::{Buffer, MAX_MSG_PAYLOAD, MPLEX_BASE, WireResult};

mod error;
pub use error::{DigestError, OptionError, ProtoError, WireError};

mod events;
pub use events::Event;

pub mod mode;
pub use mode::FileKind;

mod options;
pub use options::{Options, parse_size};

mod digest;
pub use digest::{DigestKind, Hasher, auth_hash};

mod names;
pub use names::{NameLookup, NoNames};

mod session;
pub use session::{MIN_PROTOCOL_VERSION, PROTOCOL_VERSION, Session, State};

pub mod flist;
pub use flist::{Decoded, Entry, EntryFlags, FileList, ListDecoder, ListEncoder, Xmit};
