//! SASL authentication helpers.
//!
//! This engine authenticates with the PLAIN mechanism (RFC 4616) during
//! capability negotiation. The helpers here encode credentials and split
//! oversized AUTHENTICATE payloads into protocol-legal chunks.
//!
//! # Reference
//! - IRCv3 SASL: <https://ircv3.net/specs/extensions/sasl-3.2>
//! - RFC 4616 (PLAIN): <https://tools.ietf.org/html/rfc4616>

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Maximum length of a single SASL message chunk (400 bytes).
///
/// Responses that exceed this length must be split into multiple
/// AUTHENTICATE commands.
pub const SASL_CHUNK_SIZE: usize = 400;

/// SASL authentication mechanisms this engine knows by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SaslMechanism {
    /// PLAIN mechanism (RFC 4616) - simple account/password.
    Plain,
    /// EXTERNAL mechanism - uses a TLS client certificate.
    External,
    /// Unknown or unsupported mechanism.
    Unknown(String),
}

impl SaslMechanism {
    /// Parse a mechanism name string.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Self::Plain,
            "EXTERNAL" => Self::External,
            _ => Self::Unknown(name.to_owned()),
        }
    }

    /// Returns the canonical name of this mechanism.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain => "PLAIN",
            Self::External => "EXTERNAL",
            Self::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encode credentials for the PLAIN mechanism.
///
/// The PLAIN exchange carries `authzid NUL authcid NUL password`; for IRC
/// the authzid is left empty and the authcid is the account name.
///
/// Returns the base64-encoded authentication string.
pub fn encode_plain(account: &str, password: &str) -> String {
    let payload = format!("\0{}\0{}", account, password);
    BASE64.encode(payload.as_bytes())
}

/// Split an encoded SASL response into chunks for transmission.
///
/// IRC SASL requires responses longer than 400 bytes to be split across
/// multiple AUTHENTICATE commands. A response whose length is an exact
/// multiple of the chunk size must be followed by a final `AUTHENTICATE +`;
/// see [`needs_empty_final_chunk`].
pub fn chunk_response(encoded: &str) -> impl Iterator<Item = &str> {
    encoded.as_bytes().chunks(SASL_CHUNK_SIZE).map(|chunk| {
        // base64 output is always ASCII
        std::str::from_utf8(chunk).unwrap()
    })
}

/// Whether a chunked response must be terminated with an empty (`+`) chunk.
#[inline]
pub fn needs_empty_final_chunk(encoded: &str) -> bool {
    !encoded.is_empty() && encoded.len() % SASL_CHUNK_SIZE == 0
}
