//! Daemon-server states: greeting, module negotiation, auth, and the
//! client's command transfer.

use super::{PROTOCOL_VERSION, Session, State, Step};
use crate::{Event, ProtoError};

impl Session {
    /// Begins serving one daemon connection: writes the greeting banner
    /// and nests into reading the client's version line.
    ///
    /// # Errors
    /// [`ProtoError::BadState`] outside `Initial`.
    pub fn start_daemon_server(&mut self) -> Result<(), ProtoError> {
        self.expect_state("start_daemon_server", &[State::Initial])?;
        self.wbuf.pack_line(format!("@RSYNCD: {PROTOCOL_VERSION}.0"));
        self.set_state(State::DaemonServerReadModule);
        self.push_state(State::DaemonReadVersion)
    }

    /// The single line naming the module the client wants (empty or
    /// `#list` ask for the module list).
    pub(crate) fn parse_module_line(&mut self) -> Result<Step, ProtoError> {
        let Some(line) = self.read_line()? else {
            return Ok(Step::NeedMore);
        };
        self.daemon_module = Some(line.clone());
        self.set_state(State::DaemonServerNegotiateModule);
        Ok(Step::Emit(Event::Module(line)))
    }

    /// Message-of-the-day text. Lines that could collide with protocol
    /// markers get a leading space.
    ///
    /// # Errors
    /// [`ProtoError::BadState`] outside module negotiation.
    pub fn send_motd(&mut self, motd: &str) -> Result<(), ProtoError> {
        self.expect_state("send_motd", &[State::DaemonServerNegotiateModule])?;
        for line in motd.lines() {
            if line.starts_with('@') {
                self.wbuf.pack_line(format!(" {line}"));
            } else {
                self.wbuf.pack_line(line);
            }
        }
        Ok(())
    }

    /// One module name per line, closed with `@RSYNCD: EXIT`.
    ///
    /// # Errors
    /// [`ProtoError::BadState`] outside module negotiation.
    pub fn send_module_list<I, S>(&mut self, modules: I) -> Result<(), ProtoError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.expect_state("send_module_list", &[State::DaemonServerNegotiateModule])?;
        for module in modules {
            self.wbuf.pack_line(module.as_ref());
        }
        self.wbuf.pack_line("@RSYNCD: EXIT");
        Ok(())
    }

    /// Challenges the client; the session nests into reading the
    /// `user passhash` reply and resumes here afterwards.
    ///
    /// # Errors
    /// [`ProtoError::BadChallenge`] when the salt contains a newline;
    /// [`ProtoError::BadState`] outside module negotiation.
    pub fn send_auth_challenge(&mut self, salt: &str) -> Result<(), ProtoError> {
        self.expect_state("send_auth_challenge", &[State::DaemonServerNegotiateModule])?;
        if salt.contains('\n') {
            return Err(ProtoError::BadChallenge);
        }
        self.daemon_challenge = Some(salt.to_owned());
        self.wbuf.pack_line(format!("@RSYNCD: AUTHREQD {salt}"));
        self.push_state(State::DaemonServerCheckAuth)
    }

    /// Accepts the module request; the client's argv comes next.
    ///
    /// # Errors
    /// [`ProtoError::BadState`] outside module negotiation.
    pub fn send_ok(&mut self) -> Result<(), ProtoError> {
        self.expect_state("send_ok", &[State::DaemonServerNegotiateModule])?;
        self.wbuf.pack_line("@RSYNCD: OK");
        self.set_state(State::DaemonServerReadCommand);
        Ok(())
    }

    /// Rejects the request with an `@ERROR:` line. The state is left
    /// alone; connection teardown is the caller's call.
    ///
    /// # Errors
    /// [`ProtoError::BadState`] outside module negotiation.
    pub fn send_error(&mut self, message: &str) -> Result<(), ProtoError> {
        self.expect_state("send_error", &[State::DaemonServerNegotiateModule])?;
        self.wbuf.pack_line(format!("@ERROR: {message}"));
        Ok(())
    }

    /// Ends the conversation politely (after a motd-only or list-only
    /// exchange).
    ///
    /// # Errors
    /// [`ProtoError::BadState`] outside module negotiation.
    pub fn send_exit(&mut self) -> Result<(), ProtoError> {
        self.expect_state("send_exit", &[State::DaemonServerNegotiateModule])?;
        self.wbuf.pack_line("@RSYNCD: EXIT");
        Ok(())
    }

    /// The `user passhash` line answering an auth challenge.
    pub(crate) fn parse_auth_line(&mut self) -> Result<Step, ProtoError> {
        let Some(line) = self.read_line()? else {
            return Ok(Step::NeedMore);
        };
        let Some((username, passhash)) = line.split_once(' ') else {
            return Ok(self.fatal(format!("Protocol violation: malformed auth line: {line}")));
        };
        let username = username.to_owned();
        let passhash = passhash.to_owned();
        self.username = Some(username.clone());
        self.passhash = Some(passhash.clone());
        self.pop_state()?;
        Ok(Step::Emit(Event::Auth { username, passhash }))
    }

    /// The client's argv: elements split by a single terminator (NUL from
    /// protocol 30, newline below) and closed by a doubled one. The argv
    /// is fed straight into the option processor.
    pub(crate) fn parse_command(&mut self) -> Result<Step, ProtoError> {
        let term: u8 = if self.protocol_version() >= 30 { 0 } else { b'\n' };
        let data = self.rbuf.remaining();
        let Some(end) = data.windows(2).position(|w| w == [term, term]) else {
            return Ok(Step::NeedMore);
        };
        let argv: Vec<String> = data[..end]
            .split(|&b| b == term)
            .filter(|part| !part.is_empty())
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect();
        self.rbuf.set_pos(self.rbuf.pos() + end + 2);
        self.rbuf.discard();

        let outcome = self
            .opts
            .apply_argv(argv.iter())
            .and_then(|()| self.opts.make_coherent());
        if let Err(e) = outcome {
            return Ok(self.fatal(format!(
                "Client sent invalid command: {}: {e}",
                argv.join(" ")
            )));
        }
        if self.opts.sender != 0 {
            self.set_state(State::DaemonServerSend);
        } else {
            self.set_state(State::DaemonServerRun);
        }
        Ok(Step::Emit(Event::Command(argv)))
    }
}
