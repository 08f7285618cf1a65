/// One parsed protocol happening, handed to the caller by
/// [`crate::Session::parse`].
///
/// Events are ephemeral: the session does not retain them, and integration
/// layers translate them into their own framing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum Event {
    /// Version negotiation finished.
    Protocol(i32),
    /// A daemon client asked for this module (empty or `#list` means the
    /// module list).
    Module(String),
    /// A daemon client answered the auth challenge.
    Auth { username: String, passhash: String },
    /// The server wants credentials and none were preloaded; payload is
    /// the challenge salt.
    AuthReqd(String),
    /// `@RSYNCD: OK`.
    Ok,
    /// `@RSYNCD: EXIT`.
    Exit,
    /// Free-form line from the peer (motd, module list entries).
    Info(String),
    /// A daemon client sent its argv; already applied to the session
    /// options.
    Command(Vec<String>),
    /// Protocol failure; the session is now fatal unless noted otherwise.
    Error(String),
}

impl Event {
    /// The wire-level identifier of this event.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match *self {
            Self::Protocol(_) => "PROTOCOL",
            Self::Module(_) => "MODULE",
            Self::Auth { .. } => "AUTH",
            Self::AuthReqd(_) => "AUTHREQD",
            Self::Ok => "OK",
            Self::Exit => "EXIT",
            Self::Info(_) => "INFO",
            Self::Command(_) => "COMMAND",
            Self::Error(_) => "ERROR",
        }
    }
}
