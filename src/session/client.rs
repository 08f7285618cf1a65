//! Client-side states: connecting to a daemon, logging in, and handing
//! the transfer command to a remote sender.

use super::{Session, State, Step};
use crate::digest::auth_hash;
use crate::{Event, ProtoError};

impl Session {
    /// Begins a daemon-client conversation: applies `argv` to the session
    /// options, remembers the module and any credentials, and waits for
    /// the server's banner. The reply banner is only written once the
    /// server's version is known.
    ///
    /// # Errors
    /// [`ProtoError::BadState`] outside `Initial`; option errors from
    /// `argv`.
    pub fn start_daemon_client<I, S>(
        &mut self,
        argv: I,
        module: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<(), ProtoError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.expect_state("start_daemon_client", &[State::Initial])?;
        self.opts.apply_argv(argv)?;
        self.opts.make_coherent()?;
        self.daemon_module = Some(module.to_owned());
        self.username = username.map(str::to_owned);
        self.password = password.map(str::to_owned);
        self.set_state(State::ClientReadProtocol);
        Ok(())
    }

    /// Dispatches one `@RSYNCD` control line during login.
    pub(crate) fn parse_client_login(&mut self) -> Result<Step, ProtoError> {
        let Some(line) = self.read_line()? else {
            return Ok(Step::NeedMore);
        };
        if let Some(salt) = line.strip_prefix("@RSYNCD: AUTHREQD ") {
            self.daemon_challenge = Some(salt.to_owned());
            if let (Some(user), Some(pass)) = (self.username.clone(), self.password.clone()) {
                let hash = auth_hash(&pass, salt, self.protocol_version());
                self.wbuf.pack_line(format!("{user} {hash}"));
                self.passhash = Some(hash);
                return Ok(Step::Quiet);
            }
            return Ok(Step::Emit(Event::AuthReqd(salt.to_owned())));
        }
        match line.as_str() {
            "@RSYNCD: OK" => Ok(Step::Emit(Event::Ok)),
            "@RSYNCD: EXIT" => Ok(Step::Emit(Event::Exit)),
            _ => {
                if let Some(msg) = line.strip_prefix("@ERROR: ") {
                    let msg = msg.to_owned();
                    return Ok(self.fatal(format!("Protocol error during login: {msg}")));
                }
                Ok(Step::Emit(Event::Info(line)))
            }
        }
    }

    /// Answers an [`Event::AuthReqd`] once the integration layer has
    /// obtained credentials.
    ///
    /// # Errors
    /// [`ProtoError::BadState`] unless a challenge is pending.
    pub fn send_auth_response(&mut self, username: &str, password: &str) -> Result<(), ProtoError> {
        self.expect_state("send_auth_response", &[State::ClientLogin])?;
        let Some(challenge) = self.daemon_challenge.clone() else {
            return Err(ProtoError::BadState {
                operation: "send_auth_response",
                state: "ClientLogin without a pending challenge",
            });
        };
        let hash = auth_hash(password, &challenge, self.protocol_version());
        self.wbuf.pack_line(format!("{username} {hash}"));
        self.username = Some(username.to_owned());
        self.passhash = Some(hash);
        Ok(())
    }

    /// Ships the transfer command to the remote sender: the first element
    /// (the program name) is dropped, the rest go out NUL-separated with
    /// a double-NUL terminator from protocol 30, newline-separated below.
    ///
    /// Versions at or below 22 multiplexed the return channel from the
    /// start; the branch is kept although negotiation floors at 29.
    ///
    /// # Errors
    /// [`ProtoError::BadState`] outside `Initial`/`ClientLogin`.
    pub fn start_remote_sender<I, S>(&mut self, cmd: I) -> Result<(), ProtoError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.expect_state("start_remote_sender", &[State::Initial, State::ClientLogin])?;
        let terminator: &[u8] = if self.protocol_version() >= 30 {
            b"\0"
        } else {
            b"\n"
        };
        for arg in cmd.into_iter().skip(1) {
            self.wbuf.pack_bytes(arg.as_ref().as_bytes());
            self.wbuf.pack_bytes(terminator);
        }
        self.wbuf.pack_bytes(terminator);
        if self.protocol_version() <= 22 {
            self.multiplex_in = true;
        }
        self.set_state(State::Receiver);
        Ok(())
    }

    /// Receiver state: the bulk transfer itself is out of scope, so only
    /// multiplexed control frames surface; raw data waits for a real
    /// transfer engine.
    pub(crate) fn parse_receiver(&mut self) -> Result<Step, ProtoError> {
        use crate::WireError;
        if !self.multiplex_in {
            return Ok(Step::NeedMore);
        }
        let (code, payload) = match self.rbuf.unpack_msg() {
            Ok(frame) => frame,
            Err(WireError::Truncated) => return Ok(Step::NeedMore),
            Err(e) => {
                return Ok(self.fatal(format!("Protocol error in multiplex stream: {e}")));
            }
        };
        self.rbuf.discard();
        let text = || String::from_utf8_lossy(&payload).into_owned();
        match code {
            // MSG_DATA: consumed silently until the transfer engine lands
            0 => Ok(Step::Quiet),
            // MSG_ERROR_XFER / MSG_ERROR
            1 | 3 => Ok(Step::Emit(Event::Error(text()))),
            // MSG_INFO
            2 => Ok(Step::Emit(Event::Info(text()))),
            other => {
                log::debug!("ignoring multiplex code {other} ({} bytes)", payload.len());
                Ok(Step::Quiet)
            }
        }
    }
}
