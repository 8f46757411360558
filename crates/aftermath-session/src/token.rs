//! Session tokens
//!
//! A token is 128 bits drawn from the operating system CSPRNG and rendered as
//! 32 lowercase hex characters. The same string names every artifact of the
//! session on disk and travels to the client as the retrieval reference, so
//! parsing is strict: anything but the exact shape is rejected before it can
//! reach a filesystem path.

use crate::error::SessionError;
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of random bytes in a token
pub const TOKEN_BYTES: usize = 16;

/// Length of the hex encoding
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;

/// Unguessable identifier of one analysis session
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken([u8; TOKEN_BYTES]);

impl SessionToken {
    /// Mint a fresh token from the OS entropy source
    ///
    /// # Errors
    /// - `SessionError::Entropy` if the OS refuses to supply random bytes
    pub fn mint() -> Result<Self, SessionError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| SessionError::Entropy(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Raw token bytes
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; TOKEN_BYTES] {
        &self.0
    }
}

impl FromStr for SessionToken {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Uppercase is refused so that one token has one spelling on disk.
        if s.len() != TOKEN_LEN
            || !s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(SessionError::InvalidToken);
        }
        let mut bytes = [0u8; TOKEN_BYTES];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| SessionError::InvalidToken)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({self})")
    }
}

impl Serialize for SessionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn minted_token_is_32_lowercase_hex() {
        let token = SessionToken::mint().unwrap();
        let s = token.to_string();
        assert_eq!(s.len(), TOKEN_LEN);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn display_parses_back() {
        let token = SessionToken::mint().unwrap();
        let parsed: SessionToken = token.to_string().parse().unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn rejects_malformed_tokens() {
        for bad in [
            "",
            "nonexistent-token",
            "../../etc/passwd",
            "0123456789abcdef0123456789abcde",
            "0123456789abcdef0123456789abcdef0",
            "0123456789ABCDEF0123456789ABCDEF",
            "0123456789abcdef0123456789abcdeg",
            "0123456789abcdef/123456789abcdef",
        ] {
            assert!(
                matches!(bad.parse::<SessionToken>(), Err(SessionError::InvalidToken)),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn minted_tokens_do_not_repeat() {
        let tokens: HashSet<_> = (0..10_000).map(|_| SessionToken::mint().unwrap()).collect();
        assert_eq!(tokens.len(), 10_000);
    }
}
