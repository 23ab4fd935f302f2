//! Parsed protocol lines.
//!
//! A [`Line`] is the structured form of one raw IRC protocol line: an
//! optional sender prefix, a verb (alphabetic command word or three-digit
//! numeric reply code), and an ordered argument list where the last argument
//! may contain embedded spaces (the "trailing" parameter).
//!
//! Parsing is zero-copy: a `Line<'a>` borrows from the raw input string.
//! IRCv3 message tags, when present, are skipped rather than modeled — this
//! engine never negotiates a tag-bearing capability.

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::VerboseError,
    sequence::preceded,
    IResult,
};

use crate::error::LineParseError;

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

/// Skip IRCv3 message tags (the part after `@` and before the first space).
fn parse_tags(input: &str) -> ParseResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

/// Parse the sender prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> ParseResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Parse the verb (alphanumeric: a command word or a numeric code).
fn parse_verb(input: &str) -> ParseResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric())(input)
}

/// One parsed IRC protocol line, borrowing from the raw input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line<'a> {
    /// Sender prefix without the leading `:`, if present.
    pub prefix: Option<&'a str>,
    /// Command word or three-digit numeric, as sent.
    pub verb: &'a str,
    /// Ordered arguments; the last entry may be a trailing parameter with
    /// embedded spaces.
    pub args: Vec<&'a str>,
    /// The raw line this was parsed from.
    pub raw: &'a str,
}

impl<'a> Line<'a> {
    /// Parse one raw protocol line.
    ///
    /// Trailing CR/LF is tolerated and stripped. Empty input is an error.
    pub fn parse(s: &'a str) -> Result<Line<'a>, LineParseError> {
        let trimmed = s.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            return Err(LineParseError::EmptyLine);
        }

        let input = trimmed;
        let (input, _tags) = opt(parse_tags)(input).map_err(|_| LineParseError::InvalidVerb)?;
        let (input, _) = space0::<_, VerboseError<&str>>(input)
            .map_err(|_| LineParseError::InvalidVerb)?;
        let (input, prefix) = opt(parse_prefix)(input).map_err(|_| LineParseError::InvalidVerb)?;
        let (input, _) = space0::<_, VerboseError<&str>>(input)
            .map_err(|_| LineParseError::InvalidVerb)?;
        let (input, verb) = parse_verb(input).map_err(|_| LineParseError::InvalidVerb)?;

        // Parameters, including an optional trailing parameter after `:`.
        let mut args: Vec<&str> = Vec::new();
        let mut rest = input;

        while let Some(b' ') = rest.as_bytes().first().copied() {
            rest = &rest[1..];

            if let Some(b':') = rest.as_bytes().first().copied() {
                // Trailing parameter: everything after the colon.
                args.push(&rest[1..]);
                break;
            }

            let end = rest.find(' ').unwrap_or(rest.len());
            let arg = &rest[..end];
            if arg.is_empty() {
                break;
            }
            args.push(arg);
            rest = &rest[end..];
        }

        Ok(Line {
            prefix,
            verb,
            args,
            raw: s,
        })
    }

    /// Get the argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.args.get(index).copied()
    }

    /// The last argument, typically the trailing parameter.
    pub fn trailing(&self) -> Option<&'a str> {
        self.args.last().copied()
    }

    /// Nickname portion of the sender prefix (`nick!user@host` → `nick`).
    pub fn source_nick(&self) -> Option<&'a str> {
        self.prefix
            .map(|p| p.split(['!', '@']).next().unwrap_or(p))
    }

    /// Ident portion of the sender prefix, if the prefix carries one.
    pub fn source_ident(&self) -> Option<&'a str> {
        let p = self.prefix?;
        let rest = p.split_once('!')?.1;
        Some(rest.split('@').next().unwrap_or(rest))
    }

    /// Host portion of the sender prefix, if the prefix carries one.
    pub fn source_host(&self) -> Option<&'a str> {
        self.prefix?.split_once('@').map(|(_, host)| host)
    }
}

impl std::fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.raw.trim_end_matches(['\r', '\n']))
    }
}
