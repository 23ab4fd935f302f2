//! # slirc-client
//!
//! A client-side IRC protocol session engine: framing, parsing, dispatch,
//! registration, and per-connection state, with the I/O kept at the edge.
//!
//! ## Features
//!
//! - Incremental CRLF line framing over arbitrary byte chunks, with
//!   configurable text encoding
//! - Zero-copy line parsing into prefix, verb, and arguments
//! - Verb-keyed dispatch with protocol-mandated defaults (PONG replies,
//!   registration, state bookkeeping) that user handlers cannot shadow
//! - Capability negotiation and SASL PLAIN authentication
//! - Per-connection state: ISUPPORT tokens, channel membership, and an
//!   opportunistic client cache
//! - Optional Tokio integration for async TCP and TLS connections

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ```rust
//! use slirc_client::{Dispatcher, Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig {
//!     nickname: "mybot".to_string(),
//!     ..SessionConfig::default()
//! });
//! let mut dispatcher = Dispatcher::new();
//!
//! // echo every channel message back
//! dispatcher.on("PRIVMSG", |session: &mut Session, line: &slirc_client::Line<'_>| {
//!     if let (Some(target), Some(text)) = (line.arg(0), line.trailing()) {
//!         if target.starts_with('#') {
//!             session.privmsg(target, text);
//!         }
//!     }
//! });
//!
//! dispatcher
//!     .dispatch_raw(&mut session, ":alice!a@host PRIVMSG #chan :hi")
//!     .unwrap();
//! assert_eq!(session.take_outbound().last().unwrap(), "PRIVMSG #chan :hi");
//! ```

pub mod casemap;
pub mod dispatch;
pub mod error;
pub mod framer;
pub mod handshake;
pub mod line;
pub mod sasl;
pub mod session;

#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub mod conn;

pub use dispatch::{Dispatcher, Handler};
pub use error::{Error, LineParseError, Result};
pub use framer::{LineFramer, MAX_FRAGMENT_LEN};
pub use handshake::NegotiationState;
pub use line::Line;
pub use sasl::SaslMechanism;
pub use session::{Channel, ClientRecord, Session, SessionConfig};

#[cfg(feature = "tokio")]
pub use conn::Connection;
