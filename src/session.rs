//! Session state for one IRC connection.
//!
//! A [`Session`] is the top-level owned aggregate for a single connection's
//! lifetime: identity configuration, server metadata observed during
//! registration, the ISUPPORT token map, per-channel membership, and a
//! weak cache of known clients. It is mutated only from within dispatch on
//! this session's driving loop — the engine holds no locks and never
//! suspends.
//!
//! The session is also the Command Encoder: outbound actions (join, part,
//! privmsg, notice, raw lines) are formatted here and pushed onto a strict
//! per-dispatch log of emitted lines, drained by the driver.

use std::collections::{HashMap, HashSet};

use crate::casemap::{irc_eq, irc_to_upper};
use crate::error::{Error, Result};
use crate::handshake::NegotiationState;
use crate::line::Line;

/// Configuration for one session.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Requested nickname.
    pub nickname: String,
    /// Ident / user string.
    pub username: String,
    /// Real name (GECOS).
    pub realname: String,
    /// Name of the network being connected to.
    pub network: String,
    /// Account password for SASL authentication, if any.
    pub password: Option<String>,
    /// Text encoding label for the wire (e.g. `"utf-8"`, `"latin1"`).
    pub encoding: String,
    /// Whether to attempt SASL authentication (drives capability
    /// negotiation; without it registration starts immediately).
    pub sasl: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            nickname: "slirc".to_string(),
            username: "slirc".to_string(),
            realname: "slirc-client".to_string(),
            network: "ExampleNet".to_string(),
            password: None,
            encoding: "utf-8".to_string(),
            sasl: false,
        }
    }
}

/// Membership record for one joined channel.
///
/// Maps normalized nicks to their status-prefix sigils (`@`, `+`, ...;
/// multi-prefix may stack several). Populated from NAMES replies and
/// observed JOIN/PART/QUIT/NICK traffic; optimistic, never authoritative.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Channel {
    members: HashMap<String, String>,
}

impl Channel {
    /// Number of known members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no members are known yet.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `nick` (any letter case) is a known member.
    pub fn has_member(&self, nick: &str) -> bool {
        self.members.contains_key(&irc_to_upper(nick))
    }

    /// Status sigils for `nick`, if a member (empty string for no status).
    pub fn member_sigils(&self, nick: &str) -> Option<&str> {
        self.members.get(&irc_to_upper(nick)).map(String::as_str)
    }

    /// Iterate over (normalized nick, sigils) pairs.
    pub fn members(&self) -> impl Iterator<Item = (&str, &str)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, nick: &str, sigils: &str) {
        self.members.insert(irc_to_upper(nick), sigils.to_string());
    }

    fn remove(&mut self, nick: &str) -> Option<String> {
        self.members.remove(&irc_to_upper(nick))
    }
}

/// Opportunistic metadata about a client mentioned by server replies.
///
/// A weak back-reference cache, never authoritative membership.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientRecord {
    /// Nickname as last seen on the wire (original case).
    pub nickname: String,
    /// Ident, when a full prefix was observed.
    pub ident: Option<String>,
    /// Hostname, when a full prefix was observed.
    pub hostname: Option<String>,
}

/// State for one connection's lifetime.
pub struct Session {
    pub(crate) config: SessionConfig,
    pub(crate) state: NegotiationState,

    server_name: String,
    server_version: String,
    user_modes: String,
    network: String,
    account: Option<String>,
    pub(crate) sasl_failure: Option<String>,

    isupport: HashMap<String, Option<String>>,
    channels: HashMap<String, Channel>,
    clients: HashMap<String, ClientRecord>,
    pub(crate) enabled_caps: HashSet<String>,

    outbound: Vec<String>,
}

impl Session {
    /// Create a session and begin the handshake.
    ///
    /// The initial handshake lines (either `CAP LS` or the identity pair)
    /// are queued immediately; the driver flushes them before the first
    /// read.
    pub fn new(config: SessionConfig) -> Self {
        let network = config.network.clone();
        let mut session = Session {
            config,
            state: NegotiationState::Connecting,
            server_name: String::new(),
            server_version: String::new(),
            user_modes: String::new(),
            network,
            account: None,
            sasl_failure: None,
            isupport: HashMap::new(),
            channels: HashMap::new(),
            clients: HashMap::new(),
            enabled_caps: HashSet::new(),
            outbound: Vec::new(),
        };
        session.begin_handshake();
        session
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current nickname.
    pub fn nickname(&self) -> &str {
        &self.config.nickname
    }

    /// Current negotiation state.
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Whether the session has been torn down.
    pub fn is_terminated(&self) -> bool {
        self.state == NegotiationState::Terminated
    }

    /// Server name from the my-info reply.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Server software version from the my-info reply.
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Supported user-mode letters from the my-info reply.
    pub fn user_modes(&self) -> &str {
        &self.user_modes
    }

    /// Network name, as refined by the welcome reply.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Account name after a successful SASL login, if any.
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    /// Reason text of a failed SASL exchange, if one occurred.
    ///
    /// SASL failure does not kill the connection; registration proceeds
    /// unauthenticated and the reason is recorded here.
    pub fn sasl_failure(&self) -> Option<&str> {
        self.sasl_failure.as_deref()
    }

    /// Capabilities the server has acknowledged.
    pub fn enabled_caps(&self) -> &HashSet<String> {
        &self.enabled_caps
    }

    /// Look up an ISUPPORT token. `Some(None)` means the token was
    /// advertised as a bare flag without a value.
    pub fn isupport(&self, key: &str) -> Option<Option<&str>> {
        self.isupport
            .get(&key.to_ascii_uppercase())
            .map(|v| v.as_deref())
    }

    /// All accumulated ISUPPORT tokens.
    pub fn isupport_tokens(&self) -> &HashMap<String, Option<String>> {
        &self.isupport
    }

    /// Membership record for `channel` (any letter case), if joined.
    pub fn channel(&self, channel: &str) -> Option<&Channel> {
        self.channels.get(&irc_to_upper(channel))
    }

    /// All joined channels, keyed by normalized (uppercase) name.
    pub fn channels(&self) -> &HashMap<String, Channel> {
        &self.channels
    }

    /// Known metadata for `nick` (any letter case), if seen.
    pub fn client(&self, nick: &str) -> Option<&ClientRecord> {
        self.clients.get(&irc_to_upper(nick))
    }

    /// All known clients, keyed by normalized nick.
    pub fn clients(&self) -> &HashMap<String, ClientRecord> {
        &self.clients
    }

    // === Command encoding ===

    /// Queue one raw protocol line for transmission.
    ///
    /// The driver appends the CRLF terminator exactly once at write time.
    /// No-op on a torn-down session.
    pub fn send_line(&mut self, line: impl Into<String>) {
        if self.is_terminated() {
            return;
        }
        self.outbound.push(line.into());
    }

    /// Queued outbound lines, in emission order.
    pub fn outbound(&self) -> &[String] {
        &self.outbound
    }

    /// Drain the queued outbound lines.
    pub fn take_outbound(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outbound)
    }

    /// Join a channel: record it optimistically, then emit the join.
    ///
    /// The entry is created on the outbound request, not on server
    /// confirmation.
    pub fn join(&mut self, channel: &str) {
        if self.is_terminated() {
            return;
        }
        let channel = sanitize(channel);
        self.channels.entry(irc_to_upper(&channel)).or_default();
        self.send_line(format!("JOIN {}", channel));
    }

    /// Part a channel: emit the part, then drop the entry.
    ///
    /// Removal happens regardless of server acknowledgment, mirroring the
    /// optimistic join.
    pub fn part(&mut self, channel: &str, reason: Option<&str>) {
        if self.is_terminated() {
            return;
        }
        let channel = sanitize(channel);
        match reason {
            Some(reason) => self.send_line(format!("PART {} :{}", channel, sanitize(reason))),
            None => self.send_line(format!("PART {}", channel)),
        }
        self.channels.remove(&irc_to_upper(&channel));
    }

    /// Send a PRIVMSG.
    pub fn privmsg(&mut self, target: &str, text: &str) {
        self.message("PRIVMSG", target, text);
    }

    /// Send a NOTICE.
    pub fn notice(&mut self, target: &str, text: &str) {
        self.message("NOTICE", target, text);
    }

    /// Shared path for PRIVMSG and NOTICE.
    ///
    /// An empty body is replaced with a single space so the trailing
    /// parameter is never malformed; embedded CR/LF in caller-supplied text
    /// is stripped so one call can never produce more than one protocol
    /// line.
    fn message(&mut self, verb: &str, target: &str, text: &str) {
        let text = sanitize(text);
        let text = if text.is_empty() { " " } else { text.as_str() };
        self.send_line(format!("{} {} :{}", verb, sanitize(target), text));
    }

    /// Emit the NICK/USER identity pair.
    pub(crate) fn send_identity(&mut self) {
        let nickname = self.config.nickname.clone();
        let username = self.config.username.clone();
        let realname = self.config.realname.clone();
        self.send_line(format!("NICK {}", nickname));
        self.send_line(format!("USER {} 0 * :{}", username, realname));
    }

    /// Tear the session down. Idempotent; clears channel and client state
    /// and blocks any further dispatch or emission.
    pub fn teardown(&mut self) {
        self.state = NegotiationState::Terminated;
        self.channels.clear();
        self.clients.clear();
        self.outbound.clear();
    }

    // === Built-in handlers ===

    /// Protocol-mandated default behavior for a dispatched line.
    ///
    /// `verb` is the ASCII-uppercased verb; numerics are compared as their
    /// three-character string form. Returns an error only for the fatal
    /// server ERROR command.
    pub(crate) fn handle_builtin(&mut self, verb: &str, line: &Line<'_>) -> Result<()> {
        match verb {
            "001" => self.on_welcome(line),
            "004" => self.on_my_info(line),
            "005" => self.on_isupport(line),
            "353" => self.on_names(line),
            "900" => self.on_logged_in(line),
            "CAP" => self.on_cap(line),
            "AUTHENTICATE" => self.on_authenticate(line),
            "903" => self.on_sasl_success(line),
            "902" | "904" | "905" | "906" | "907" => self.on_sasl_failed(line),
            "JOIN" => self.on_join(line),
            "PART" => self.on_part(line),
            "QUIT" => self.on_quit(line),
            "NICK" => self.on_nick(line),
            "ERROR" => return self.on_server_error(line),
            _ => {}
        }
        Ok(())
    }

    /// RPL_WELCOME: registration succeeded. The network name is the fourth
    /// whitespace token of the trailing text ("Welcome to the <net> ...").
    fn on_welcome(&mut self, line: &Line<'_>) {
        if let Some(name) = line
            .trailing()
            .and_then(|t| t.split_whitespace().nth(3))
        {
            self.network = name.to_string();
        }
        self.state = NegotiationState::Ready;
    }

    /// RPL_MYINFO: server name, version, and supported mode letters.
    ///
    /// The first argument is our own nick and is skipped. The last argument
    /// carries the mode letters of interest; the version is everything
    /// between it and the server name. If the server supports the `B`
    /// (bot) mode, mark ourselves with it.
    fn on_my_info(&mut self, line: &Line<'_>) {
        let rest = match line.args.get(1..) {
            Some(rest) if rest.len() >= 2 => rest,
            _ => return,
        };

        self.server_name = rest[0].to_string();
        self.server_version = if rest.len() >= 4 {
            rest[1..rest.len() - 2].join(" ")
        } else {
            rest[1].to_string()
        };
        self.user_modes = rest[rest.len() - 1].to_string();

        if self.user_modes.contains('B') {
            let nickname = self.config.nickname.clone();
            self.send_line(format!("MODE {} +B", nickname));
        }
    }

    /// RPL_ISUPPORT: accumulate advertised tokens.
    ///
    /// Skips our own nick (first argument) and the human-readable trailing
    /// text. `KEY=value` stores the value; a bare `KEY` stores a flag.
    /// Later tokens overwrite earlier ones with the same key.
    fn on_isupport(&mut self, line: &Line<'_>) {
        let mut tokens = match line.args.get(1..) {
            Some(tokens) => tokens,
            None => return,
        };
        if let Some(last) = tokens.last() {
            if last.contains(' ') {
                tokens = &tokens[..tokens.len() - 1];
            }
        }

        for token in tokens {
            if token.is_empty() {
                continue;
            }
            let (key, value) = match token.split_once('=') {
                Some((key, value)) => (key, Some(value.to_string())),
                None => (*token, None),
            };
            self.isupport.insert(key.to_ascii_uppercase(), value);
        }
    }

    /// RPL_NAMREPLY: populate channel membership and client records.
    ///
    /// Status sigils may stack when multi-prefix is enabled.
    fn on_names(&mut self, line: &Line<'_>) {
        let channel = match line.arg(2) {
            Some(channel) => irc_to_upper(channel),
            None => return,
        };
        let names = line.trailing().unwrap_or("");

        for name in names.split_whitespace() {
            let nick = name.trim_start_matches(['@', '+', '%', '&', '~']);
            if nick.is_empty() {
                continue;
            }
            let sigils = &name[..name.len() - nick.len()];

            if let Some(record) = self.channels.get_mut(&channel) {
                record.insert(nick, sigils);
            }
            self.remember_client(nick, None, None);
        }
    }

    /// RPL_LOGGEDIN: record the account name. Servers may emit this more
    /// than once for one authentication; repeats are a no-op.
    fn on_logged_in(&mut self, line: &Line<'_>) {
        if let Some(account) = line.arg(2) {
            self.account = Some(account.to_string());
        }
    }

    /// Another user joined a channel we track. Our own join confirmations
    /// are ignored: the entry already exists from the outbound request.
    fn on_join(&mut self, line: &Line<'_>) {
        let nick = match line.source_nick() {
            Some(nick) if !irc_eq(nick, &self.config.nickname) => nick.to_string(),
            _ => return,
        };
        let channel = match line.arg(0) {
            Some(channel) => irc_to_upper(channel),
            None => return,
        };

        if let Some(record) = self.channels.get_mut(&channel) {
            record.insert(&nick, "");
        }
        self.remember_client(
            &nick,
            line.source_ident().map(str::to_string),
            line.source_host().map(str::to_string),
        );
    }

    /// Another user left a channel we track. Our own part confirmations are
    /// ignored: the entry was already dropped on the outbound request.
    fn on_part(&mut self, line: &Line<'_>) {
        let nick = match line.source_nick() {
            Some(nick) if !irc_eq(nick, &self.config.nickname) => nick.to_string(),
            _ => return,
        };
        if let Some(channel) = line.arg(0) {
            if let Some(record) = self.channels.get_mut(&irc_to_upper(channel)) {
                record.remove(&nick);
            }
        }
    }

    /// A user quit: forget them everywhere.
    fn on_quit(&mut self, line: &Line<'_>) {
        let nick = match line.source_nick() {
            Some(nick) if !irc_eq(nick, &self.config.nickname) => nick.to_string(),
            _ => return,
        };
        for record in self.channels.values_mut() {
            record.remove(&nick);
        }
        self.clients.remove(&irc_to_upper(&nick));
    }

    /// A user changed nick: carry membership and metadata over. A forced
    /// rename of our own nick updates the session identity.
    fn on_nick(&mut self, line: &Line<'_>) {
        let old = match line.source_nick() {
            Some(nick) => nick.to_string(),
            None => return,
        };
        let new = match line.args.first() {
            Some(new) => new.to_string(),
            None => return,
        };

        if irc_eq(&old, &self.config.nickname) {
            self.config.nickname = new.clone();
        }

        for record in self.channels.values_mut() {
            if let Some(sigils) = record.remove(&old) {
                record.insert(&new, &sigils);
            }
        }
        if let Some(mut record) = self.clients.remove(&irc_to_upper(&old)) {
            record.nickname = new.clone();
            self.clients.insert(irc_to_upper(&new), record);
        }
    }

    /// ERROR: the server killed the connection. Tear down and surface the
    /// reason; the session is unusable afterwards.
    fn on_server_error(&mut self, line: &Line<'_>) -> Result<()> {
        let reason = line.trailing().unwrap_or("connection closed").to_string();
        self.teardown();
        Err(Error::Server(reason))
    }

    fn remember_client(&mut self, nick: &str, ident: Option<String>, hostname: Option<String>) {
        let key = irc_to_upper(nick);
        match self.clients.get_mut(&key) {
            Some(record) => {
                record.nickname = nick.to_string();
                if ident.is_some() {
                    record.ident = ident;
                }
                if hostname.is_some() {
                    record.hostname = hostname;
                }
            }
            None => {
                self.clients.insert(
                    key,
                    ClientRecord {
                        nickname: nick.to_string(),
                        ident,
                        hostname,
                    },
                );
            }
        }
    }
}

/// Strip embedded line terminators from caller-supplied text so it can
/// never smuggle extra protocol lines into the stream.
fn sanitize(text: &str) -> String {
    text.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}
