//! Shareable session codes
//!
//! A session code is the short string a host reads out (or pastes) to the
//! other players so they can find the session. Codes are fixed length and
//! case-insensitive; they are always stored upper-cased.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const SESSION_CODE_LEN: usize = 6;

const NUMERIC: &[u8] = b"0123456789";
// Upper-case letters and digits without the easily confused 0/O and 1/I.
const ALPHANUMERIC: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Character set used when generating new codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CodeAlphabet {
    Numeric,
    #[default]
    Alphanumeric,
}

impl CodeAlphabet {
    fn symbols(self) -> &'static [u8] {
        match self {
            CodeAlphabet::Numeric => NUMERIC,
            CodeAlphabet::Alphanumeric => ALPHANUMERIC,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionCodeError {
    #[error("session code must be {expected} characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("session code contains invalid character '{0}'")]
    InvalidCharacter(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionCode(String);

impl SessionCode {
    /// Generates a fresh code from the given alphabet.
    ///
    /// Not cryptographically strong. With the alphanumeric alphabet there
    /// are 32^6 (about 10^9) codes, which keeps collisions between
    /// concurrently open sessions unlikely.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, alphabet: CodeAlphabet) -> Self {
        let symbols = alphabet.symbols();
        let code = (0..SESSION_CODE_LEN)
            .map(|_| symbols[rng.gen_range(0..symbols.len())] as char)
            .collect();
        SessionCode(code)
    }

    /// Parses user-entered text, ignoring surrounding whitespace and case.
    pub fn parse(input: &str) -> Result<Self, SessionCodeError> {
        let candidate = input.trim().to_ascii_uppercase();
        let actual = candidate.chars().count();
        if actual != SESSION_CODE_LEN {
            return Err(SessionCodeError::WrongLength {
                expected: SESSION_CODE_LEN,
                actual,
            });
        }

        if let Some(bad) = candidate.chars().find(|ch| !ch.is_ascii_alphanumeric()) {
            return Err(SessionCodeError::InvalidCharacter(bad));
        }

        Ok(SessionCode(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SessionCode {
    type Err = SessionCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionCode::parse(s)
    }
}
