//! The protocol session: a sans-I/O state machine over two [`Buffer`]s.
//!
//! Callers append inbound bytes to [`Session::rbuf`], call
//! [`Session::parse`] until it returns `Ok(None)`, and drain
//! [`Session::wbuf`] to their transport whenever they like. Action
//! methods are state-scoped; calling one in the wrong state is a
//! [`ProtoError::BadState`], and a session that entered `Fatal` refuses
//! everything afterwards.

mod client;
mod daemon;

use crate::{Buffer, Event, Options, ProtoError, WireError};
use regex::Regex;
use std::sync::LazyLock;

/// The newest protocol this engine speaks.
pub const PROTOCOL_VERSION: i32 = 31;
/// Peers below this are refused outright.
pub const MIN_PROTOCOL_VERSION: i32 = 29;

/// Nested sub-dialogues never go deeper than this.
const MAX_STATE_DEPTH: usize = 8;

static BANNER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@RSYNCD: ([0-9]+)\.([-0-9]+)$").unwrap());

/// Where a session currently is in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum State {
    Initial,
    ClientReadProtocol,
    ClientLogin,
    DaemonReadVersion,
    DaemonServerReadModule,
    DaemonServerNegotiateModule,
    DaemonServerCheckAuth,
    DaemonServerReadCommand,
    DaemonServerSend,
    DaemonServerRun,
    Receiver,
    Fatal,
}

impl State {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::ClientReadProtocol => "ClientReadProtocol",
            Self::ClientLogin => "ClientLogin",
            Self::DaemonReadVersion => "DaemonReadVersion",
            Self::DaemonServerReadModule => "DaemonServerReadModule",
            Self::DaemonServerNegotiateModule => "DaemonServerNegotiateModule",
            Self::DaemonServerCheckAuth => "DaemonServerCheckAuth",
            Self::DaemonServerReadCommand => "DaemonServerReadCommand",
            Self::DaemonServerSend => "DaemonServerSend",
            Self::DaemonServerRun => "DaemonServerRun",
            Self::Receiver => "Receiver",
            Self::Fatal => "Fatal",
        }
    }
}

/// Outcome of one dispatch round inside [`Session::parse`].
pub(crate) enum Step {
    /// The buffered bytes do not hold a complete message yet.
    NeedMore,
    /// A message was consumed without producing a caller-visible event
    /// (e.g. an auto-answered auth challenge).
    Quiet,
    Emit(Event),
}

/// One rsync protocol conversation, client or server side.
pub struct Session {
    /// Inbound bytes; the caller appends, `parse` consumes.
    pub rbuf: Buffer,
    /// Outbound bytes; action methods append, the caller drains.
    pub wbuf: Buffer,
    /// Option state, either local (client) or received (daemon server).
    pub opts: Options,
    protocol_version: i32,
    remote_version: Option<String>,
    state: State,
    state_stack: Vec<State>,
    pub(crate) daemon_module: Option<String>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) passhash: Option<String>,
    pub(crate) daemon_challenge: Option<String>,
    pub(crate) multiplex_in: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rbuf: Buffer::new(),
            wbuf: Buffer::new(),
            opts: Options::new(),
            protocol_version: PROTOCOL_VERSION,
            remote_version: None,
            state: State::Initial,
            state_stack: Vec::new(),
            daemon_module: None,
            username: None,
            password: None,
            passhash: None,
            daemon_challenge: None,
            multiplex_in: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// The negotiated version once a banner has been parsed, else the
    /// local maximum.
    #[must_use]
    pub const fn protocol_version(&self) -> i32 {
        self.protocol_version
    }

    /// The raw `MAJOR.MINOR` the peer advertised, if seen yet. A negative
    /// minor marks a pre-release build.
    #[must_use]
    pub fn remote_version(&self) -> Option<&str> {
        self.remote_version.as_deref()
    }

    /// Turns on inbound multiplex framing ahead of time (daemons do this
    /// once the binary phase starts).
    pub fn enable_multiplex_in(&mut self) {
        self.multiplex_in = true;
    }

    /// The module a daemon conversation settled on, once known.
    #[must_use]
    pub fn daemon_module(&self) -> Option<&str> {
        self.daemon_module.as_deref()
    }

    /// The username from the auth exchange (either side).
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The computed or received auth hash, for the integration layer to
    /// verify against its secrets store.
    #[must_use]
    pub fn passhash(&self) -> Option<&str> {
        self.passhash.as_deref()
    }

    /// Consumes as much of the read buffer as one event's worth of
    /// messages. `Ok(None)` means "feed me more bytes and retry"; the
    /// buffer is untouched in that case, so arbitrary re-chunking of the
    /// input stream cannot change the event sequence.
    ///
    /// # Errors
    /// [`ProtoError::SessionFatal`] once the session died; wire-level
    /// corruption that is not recoverable by more input.
    pub fn parse(&mut self) -> Result<Option<Event>, ProtoError> {
        loop {
            match self.parse_step()? {
                Step::NeedMore => return Ok(None),
                Step::Quiet => {}
                Step::Emit(ev) => {
                    log::trace!("event {} in state {}", ev.tag(), self.state.name());
                    return Ok(Some(ev));
                }
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step, ProtoError> {
        match self.state {
            State::Fatal => Err(ProtoError::SessionFatal),
            // nothing arrives unsolicited in these states
            State::Initial
            | State::DaemonServerNegotiateModule
            | State::DaemonServerSend
            | State::DaemonServerRun => Ok(Step::NeedMore),
            State::ClientReadProtocol => self.parse_version_line(true),
            State::DaemonReadVersion => self.parse_version_line(false),
            State::ClientLogin => self.parse_client_login(),
            State::DaemonServerReadModule => self.parse_module_line(),
            State::DaemonServerCheckAuth => self.parse_auth_line(),
            State::DaemonServerReadCommand => self.parse_command(),
            State::Receiver => self.parse_receiver(),
        }
    }

    // shared plumbing

    pub(crate) fn set_state(&mut self, next: State) {
        log::debug!("state {} -> {}", self.state.name(), next.name());
        self.state = next;
    }

    pub(crate) fn push_state(&mut self, next: State) -> Result<(), ProtoError> {
        if self.state_stack.len() >= MAX_STATE_DEPTH {
            return Err(ProtoError::StateStackOverflow);
        }
        self.state_stack.push(self.state);
        self.set_state(next);
        Ok(())
    }

    pub(crate) fn pop_state(&mut self) -> Result<(), ProtoError> {
        let prior = self.state_stack.pop().ok_or(ProtoError::EmptyStateStack)?;
        self.set_state(prior);
        Ok(())
    }

    /// One-way trip: emits the error event and pins the state machine.
    pub(crate) fn fatal(&mut self, message: impl Into<String>) -> Step {
        let message = message.into();
        log::debug!("fatal: {message}");
        self.set_state(State::Fatal);
        Step::Emit(Event::Error(message))
    }

    pub(crate) fn expect_state(
        &self,
        operation: &'static str,
        wanted: &[State],
    ) -> Result<(), ProtoError> {
        if self.state == State::Fatal {
            return Err(ProtoError::SessionFatal);
        }
        if wanted.contains(&self.state) {
            Ok(())
        } else {
            Err(ProtoError::BadState {
                operation,
                state: self.state.name(),
            })
        }
    }

    /// Pulls one complete text line off the read buffer, or `None` when
    /// the terminator has not arrived yet.
    pub(crate) fn read_line(&mut self) -> Result<Option<String>, ProtoError> {
        match self.rbuf.unpack_line() {
            Ok(raw) => {
                self.rbuf.discard();
                Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
            }
            Err(WireError::Truncated) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Parses an `@RSYNCD: MAJOR.MINOR` banner and settles the version.
    /// Clients answer with their own banner and module request; the
    /// daemon server pops back to the state that nested here.
    fn parse_version_line(&mut self, as_client: bool) -> Result<Step, ProtoError> {
        let Some(line) = self.read_line()? else {
            return Ok(Step::NeedMore);
        };
        let Some(caps) = BANNER_RE.captures(&line) else {
            return Ok(self.fatal(format!("Protocol error: invalid greeting: {line}")));
        };
        // the regex guarantees both captures parse
        let major: i32 = caps[1].parse().unwrap_or(0);
        let minor: i32 = caps[2].parse().unwrap_or(0);
        self.remote_version = Some(format!("{major}.{minor}"));
        // a non-zero minor is a pre-release of the *next* protocol
        let effective = if minor == 0 { major } else { major - 1 };
        let negotiated = effective.min(PROTOCOL_VERSION);
        if negotiated < MIN_PROTOCOL_VERSION {
            return Ok(self.fatal(format!(
                "Remote protocol {major}.{minor} is older than {MIN_PROTOCOL_VERSION}; cannot continue"
            )));
        }
        self.protocol_version = negotiated;
        log::debug!("negotiated protocol {negotiated} (remote {major}.{minor})");
        if as_client {
            self.wbuf.pack_line(format!("@RSYNCD: {negotiated}.0"));
            let module = self.daemon_module.clone().unwrap_or_default();
            self.wbuf.pack_line(module);
            self.set_state(State::ClientLogin);
        } else {
            self.pop_state()?;
        }
        Ok(Step::Emit(Event::Protocol(negotiated)))
    }
}
