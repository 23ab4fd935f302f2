//! Verb-keyed dispatch of parsed lines.
//!
//! Routing is a two-stage pass over each inbound line: protocol-mandated
//! behavior first (PONG replies, registration, state bookkeeping), then an
//! optional user handler for the same verb. Built-in behavior can never be
//! shadowed; a user PING handler runs after the PONG has been queued.
//! Verbs with no handler anywhere are silently dropped.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::line::Line;
use crate::session::Session;

/// User callback for one verb.
///
/// Handlers receive the session mutably and may queue outbound lines
/// through it; emissions are appended to the session's outbound log and
/// flushed by the driver after dispatch returns.
pub trait Handler {
    fn handle(&mut self, session: &mut Session, line: &Line<'_>);
}

impl<F> Handler for F
where
    F: FnMut(&mut Session, &Line<'_>),
{
    fn handle(&mut self, session: &mut Session, line: &Line<'_>) {
        self(session, line)
    }
}

/// Routing table from verb to user handler.
///
/// Verbs are stored uppercased; numerics are their three-character string
/// form (`"001"`). One handler per verb; a second registration replaces
/// the first.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher::default()
    }

    /// Register (or replace) the handler for `verb`.
    pub fn on(&mut self, verb: &str, handler: impl Handler + 'static) -> &mut Self {
        self.handlers
            .insert(verb.to_ascii_uppercase(), Box::new(handler));
        self
    }

    /// Remove the handler for `verb`, if any.
    pub fn off(&mut self, verb: &str) -> bool {
        self.handlers.remove(&verb.to_ascii_uppercase()).is_some()
    }

    /// Route one parsed line through the session and any user handler.
    ///
    /// A torn-down session rejects every line deterministically. PING is
    /// answered before anything else so keepalive can never be starved by
    /// handler work.
    pub fn dispatch(&mut self, session: &mut Session, line: &Line<'_>) -> Result<()> {
        if session.is_terminated() {
            return Err(Error::SessionClosed);
        }

        let verb = line.verb.to_ascii_uppercase();

        if verb == "PING" {
            let token = line.trailing().unwrap_or("");
            session.send_line(format!("PONG :{}", token));
        }

        session.handle_builtin(&verb, line)?;

        if let Some(handler) = self.handlers.get_mut(&verb) {
            handler.handle(session, line);
        }

        Ok(())
    }

    /// Parse and dispatch a raw line in one step.
    ///
    /// Unparseable lines surface as a recoverable [`Error::InvalidLine`];
    /// the caller decides whether to log and continue.
    pub fn dispatch_raw(&mut self, session: &mut Session, raw: &str) -> Result<()> {
        let line = Line::parse(raw).map_err(|cause| Error::InvalidLine {
            string: raw.to_string(),
            cause,
        })?;
        self.dispatch(session, &line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;

    fn quiet_session() -> Session {
        let mut session = Session::new(SessionConfig::default());
        session.take_outbound();
        session
    }

    #[test]
    fn test_ping_answered_before_user_handler() {
        let mut session = quiet_session();
        let mut dispatcher = Dispatcher::new();
        dispatcher.on("PING", |session: &mut Session, _line: &Line<'_>| {
            session.send_line("NOTICE log :saw a ping");
        });

        dispatcher.dispatch_raw(&mut session, "PING :abc123").unwrap();
        assert_eq!(
            session.outbound(),
            ["PONG :abc123", "NOTICE log :saw a ping"]
        );
    }

    #[test]
    fn test_ping_answered_without_any_handler() {
        let mut session = quiet_session();
        let mut dispatcher = Dispatcher::new();
        dispatcher.dispatch_raw(&mut session, "PING :token").unwrap();
        assert_eq!(session.outbound(), ["PONG :token"]);
    }

    #[test]
    fn test_unknown_verb_silently_dropped() {
        let mut session = quiet_session();
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .dispatch_raw(&mut session, ":s WALLOPS :we have no handler for this")
            .unwrap();
        assert!(session.outbound().is_empty());
    }

    #[test]
    fn test_handler_lookup_is_case_insensitive() {
        let mut session = quiet_session();
        let mut dispatcher = Dispatcher::new();
        dispatcher.on("privmsg", |session: &mut Session, line: &Line<'_>| {
            let text = line.trailing().unwrap_or("").to_string();
            session.notice("log", &text);
        });

        dispatcher
            .dispatch_raw(&mut session, ":alice!a@h PRIVMSG #chan :hello")
            .unwrap();
        assert_eq!(session.outbound(), ["NOTICE log :hello"]);
    }

    #[test]
    fn test_second_registration_replaces_first() {
        let mut session = quiet_session();
        let mut dispatcher = Dispatcher::new();
        dispatcher.on("PRIVMSG", |session: &mut Session, _: &Line<'_>| {
            session.send_line("NOTICE log :first");
        });
        dispatcher.on("PRIVMSG", |session: &mut Session, _: &Line<'_>| {
            session.send_line("NOTICE log :second");
        });

        dispatcher
            .dispatch_raw(&mut session, ":a!a@h PRIVMSG #c :x")
            .unwrap();
        assert_eq!(session.outbound(), ["NOTICE log :second"]);
    }

    #[test]
    fn test_off_removes_handler() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.on("JOIN", |_: &mut Session, _: &Line<'_>| {});
        assert!(dispatcher.off("join"));
        assert!(!dispatcher.off("JOIN"));
    }

    #[test]
    fn test_dispatch_after_teardown_is_rejected() {
        let mut session = quiet_session();
        let mut dispatcher = Dispatcher::new();
        session.teardown();

        let err = dispatcher.dispatch_raw(&mut session, "PING :late").unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
        assert!(session.outbound().is_empty());
    }

    #[test]
    fn test_invalid_line_is_recoverable() {
        let mut session = quiet_session();
        let mut dispatcher = Dispatcher::new();
        let err = dispatcher.dispatch_raw(&mut session, "").unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_user_error_handler_runs_after_teardown_result() {
        // built-in ERROR handling wins; the error propagates even with a
        // user handler registered for another verb
        let mut session = quiet_session();
        let mut dispatcher = Dispatcher::new();
        let err = dispatcher
            .dispatch_raw(&mut session, "ERROR :Closing link")
            .unwrap_err();
        assert!(matches!(err, Error::Server(_)));
        assert!(err.is_fatal());
    }
}
