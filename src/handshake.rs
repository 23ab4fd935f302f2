//! Connection registration and SASL negotiation.
//!
//! The handshake is driven entirely by inbound lines: each CAP,
//! AUTHENTICATE, or SASL-result numeric advances the state machine and
//! queues whatever must be sent next. `CAP END` is emitted only once no
//! AUTHENTICATE exchange is outstanding, so authentication always completes
//! (or aborts) before registration finishes.

use crate::casemap::irc_eq;
use crate::line::Line;
use crate::sasl::{self, SaslMechanism};
use crate::session::Session;

/// Phase of the connection handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NegotiationState {
    /// Socket open, nothing sent yet.
    Connecting,
    /// `CAP LS` sent, collecting the server's capability list.
    CapNegotiating,
    /// An AUTHENTICATE exchange is in flight; `CAP END` is withheld.
    SaslAuthenticating,
    /// `CAP END` and the identity pair sent, awaiting the welcome.
    Registered,
    /// Welcome received; the session is fully usable.
    Ready,
    /// Torn down; no further dispatch or emission.
    Terminated,
}

/// Capabilities requested whenever the server offers them.
const WANTED_CAPS: &[&str] = &["account-notify", "multi-prefix"];

impl Session {
    /// Open the handshake. With SASL configured the capability negotiation
    /// gates registration; otherwise identity goes out immediately.
    pub(crate) fn begin_handshake(&mut self) {
        if self.config.sasl {
            self.state = NegotiationState::CapNegotiating;
            self.send_line("CAP LS 302");
        } else {
            self.finish_negotiation();
        }
    }

    /// CAP subcommand dispatch. The subcommand follows our nick (or `*`
    /// before registration) in the argument list.
    pub(crate) fn on_cap(&mut self, line: &Line<'_>) {
        match line.arg(1) {
            Some("LS") => self.on_cap_ls(line),
            Some("ACK") => self.on_cap_ack(line),
            Some("NAK") => {
                // a refused capability is not fatal; carry on without it
                if self.state == NegotiationState::CapNegotiating {
                    self.finish_negotiation();
                }
            }
            _ => {}
        }
    }

    /// CAP LS: request what we want, and start SASL if the server offers
    /// it. With no SASL on offer there is nothing to wait for, so
    /// registration proceeds at once.
    fn on_cap_ls(&mut self, line: &Line<'_>) {
        if self.state != NegotiationState::CapNegotiating {
            return;
        }
        // multi-line LS replies mark continuation with a "*" argument
        let more_coming = line.arg(2) == Some("*");
        let offered = line.trailing().unwrap_or("");

        let mut sasl_offered = false;
        for token in offered.split_whitespace() {
            // cap values ("sasl=PLAIN,EXTERNAL") follow an equals sign
            let name = token.split('=').next().unwrap_or(token);
            if name.eq_ignore_ascii_case("sasl") {
                sasl_offered = true;
            } else if WANTED_CAPS.iter().any(|w| name.eq_ignore_ascii_case(w)) {
                self.send_line(format!("CAP REQ :{}", name));
            }
        }

        if sasl_offered {
            self.state = NegotiationState::SaslAuthenticating;
            self.send_line("CAP REQ :sasl");
            self.send_line(format!("AUTHENTICATE {}", SaslMechanism::Plain));
        } else if !more_coming {
            self.finish_negotiation();
        }
    }

    /// CAP ACK: record what the server granted.
    fn on_cap_ack(&mut self, line: &Line<'_>) {
        let granted = line.trailing().unwrap_or("");
        for token in granted.split_whitespace() {
            self.enabled_caps
                .insert(token.trim_start_matches('-').to_ascii_lowercase());
        }
    }

    /// AUTHENTICATE from the server: a bare `+` invites our credentials.
    /// Long payloads are split into chunks the server reassembles.
    pub(crate) fn on_authenticate(&mut self, line: &Line<'_>) {
        if self.state != NegotiationState::SaslAuthenticating {
            return;
        }
        if line.arg(0) != Some("+") {
            return;
        }

        let password = match self.config.password.clone() {
            Some(password) => password,
            None => {
                // nothing to present; abort the exchange cleanly
                self.send_line("AUTHENTICATE *");
                self.finish_negotiation();
                return;
            }
        };

        let payload = sasl::encode_plain(&self.config.nickname, &password);
        for chunk in sasl::chunk_response(&payload) {
            self.send_line(format!("AUTHENTICATE {}", chunk));
        }
        if sasl::needs_empty_final_chunk(&payload) {
            self.send_line("AUTHENTICATE +");
        }
    }

    /// RPL_SASLSUCCESS: authentication done, finish negotiation.
    pub(crate) fn on_sasl_success(&mut self, _line: &Line<'_>) {
        if self.state == NegotiationState::SaslAuthenticating {
            self.finish_negotiation();
        }
    }

    /// SASL failure numerics (902, 904..907). The connection survives:
    /// record the reason and register unauthenticated.
    pub(crate) fn on_sasl_failed(&mut self, line: &Line<'_>) {
        if self.state != NegotiationState::SaslAuthenticating {
            return;
        }
        let reason = line
            .trailing()
            .unwrap_or("SASL authentication failed")
            .to_string();
        self.sasl_failure = Some(reason);
        self.finish_negotiation();
    }

    /// Close capability negotiation and send identity. Ordering is fixed:
    /// CAP END, then NICK, then USER.
    pub(crate) fn finish_negotiation(&mut self) {
        if matches!(
            self.state,
            NegotiationState::Registered | NegotiationState::Ready | NegotiationState::Terminated
        ) {
            return;
        }
        if self.state != NegotiationState::Connecting {
            self.send_line("CAP END");
        }
        self.state = NegotiationState::Registered;
        self.send_identity();
    }

    /// Whether `nick` refers to this session's own identity.
    pub fn is_self(&self, nick: &str) -> bool {
        irc_eq(nick, &self.config.nickname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;

    fn sasl_config() -> SessionConfig {
        SessionConfig {
            nickname: "mybot".to_string(),
            username: "mybot".to_string(),
            realname: "My Bot".to_string(),
            password: Some("hunter2".to_string()),
            sasl: true,
            ..SessionConfig::default()
        }
    }

    fn feed(session: &mut Session, raw: &str) {
        let line = Line::parse(raw).unwrap();
        let verb = line.verb.to_ascii_uppercase();
        session.handle_builtin(&verb, &line).unwrap();
    }

    #[test]
    fn test_handshake_with_sasl_starts_with_cap_ls() {
        let session = Session::new(sasl_config());
        assert_eq!(session.outbound(), ["CAP LS 302"]);
        assert_eq!(session.state(), NegotiationState::CapNegotiating);
    }

    #[test]
    fn test_sasl_flow_full_exchange() {
        let mut session = Session::new(sasl_config());
        session.take_outbound();

        feed(&mut session, ":s CAP * LS :multi-prefix sasl=PLAIN,EXTERNAL");
        assert_eq!(session.state(), NegotiationState::SaslAuthenticating);
        assert_eq!(
            session.take_outbound(),
            [
                "CAP REQ :multi-prefix",
                "CAP REQ :sasl",
                "AUTHENTICATE PLAIN",
            ]
        );

        feed(&mut session, ":s CAP mybot ACK :multi-prefix sasl");
        assert!(session.enabled_caps().contains("sasl"));
        assert!(session.enabled_caps().contains("multi-prefix"));

        feed(&mut session, "AUTHENTICATE +");
        let out = session.take_outbound();
        assert_eq!(out.len(), 1);
        let payload = out[0].strip_prefix("AUTHENTICATE ").unwrap();
        assert_eq!(payload, crate::sasl::encode_plain("mybot", "hunter2"));

        // CAP END must not appear until the SASL result arrives
        feed(&mut session, ":s 903 mybot :SASL authentication successful");
        assert_eq!(
            session.take_outbound(),
            ["CAP END", "NICK mybot", "USER mybot 0 * :My Bot"]
        );
        assert_eq!(session.state(), NegotiationState::Registered);
        assert!(session.sasl_failure().is_none());
    }

    #[test]
    fn test_sasl_failure_registers_anyway() {
        let mut session = Session::new(sasl_config());
        session.take_outbound();

        feed(&mut session, ":s CAP * LS :sasl");
        session.take_outbound();
        feed(&mut session, ":s 904 mybot :SASL authentication failed");

        assert_eq!(session.sasl_failure(), Some("SASL authentication failed"));
        assert_eq!(session.state(), NegotiationState::Registered);
        assert_eq!(
            session.outbound(),
            ["CAP END", "NICK mybot", "USER mybot 0 * :My Bot"]
        );
    }

    #[test]
    fn test_no_sasl_offered_registers_immediately() {
        let mut session = Session::new(sasl_config());
        session.take_outbound();

        feed(&mut session, ":s CAP * LS :multi-prefix account-tag");
        assert_eq!(session.state(), NegotiationState::Registered);
        assert_eq!(
            session.take_outbound(),
            [
                "CAP REQ :multi-prefix",
                "CAP END",
                "NICK mybot",
                "USER mybot 0 * :My Bot",
            ]
        );
    }

    #[test]
    fn test_multiline_cap_ls_waits_for_final_reply() {
        let mut session = Session::new(sasl_config());
        session.take_outbound();

        feed(&mut session, ":s CAP * LS * :account-notify");
        assert_eq!(session.state(), NegotiationState::CapNegotiating);

        feed(&mut session, ":s CAP * LS :sasl");
        assert_eq!(session.state(), NegotiationState::SaslAuthenticating);
    }

    #[test]
    fn test_missing_password_aborts_sasl() {
        let mut config = sasl_config();
        config.password = None;
        let mut session = Session::new(config);
        session.take_outbound();

        feed(&mut session, ":s CAP * LS :sasl");
        session.take_outbound();
        feed(&mut session, "AUTHENTICATE +");

        let out = session.take_outbound();
        assert_eq!(out[0], "AUTHENTICATE *");
        assert_eq!(out[1], "CAP END");
        assert_eq!(session.state(), NegotiationState::Registered);
    }

    #[test]
    fn test_long_credentials_are_chunked() {
        let mut config = sasl_config();
        config.password = Some("x".repeat(600));
        let mut session = Session::new(config);
        session.take_outbound();

        feed(&mut session, ":s CAP * LS :sasl");
        session.take_outbound();
        feed(&mut session, "AUTHENTICATE +");

        let out = session.take_outbound();
        assert!(out.len() >= 2);
        for line in &out[..out.len() - 1] {
            let chunk = line.strip_prefix("AUTHENTICATE ").unwrap();
            assert_eq!(chunk.len(), crate::sasl::SASL_CHUNK_SIZE);
        }
    }

    #[test]
    fn test_cap_nak_is_not_fatal() {
        let mut session = Session::new(sasl_config());
        session.take_outbound();

        feed(&mut session, ":s CAP * NAK :sasl");
        assert_eq!(session.state(), NegotiationState::Registered);
    }

    #[test]
    fn test_stray_authenticate_after_registration_ignored() {
        let mut session = Session::new(SessionConfig::default());
        session.take_outbound();
        feed(&mut session, "AUTHENTICATE +");
        assert!(session.outbound().is_empty());
    }
}
