//! Strongly-typed identifiers used across the cart domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

const MAX_IDENT_LEN: usize = 128;
const USER_KEY_PREFIX: &str = "user:";

/// Identifier of a catalog product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(u64);

impl ProductId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for ProductId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for ProductId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("ProductId: {e}")))
    }
}

/// Opaque token naming an anonymous shopper's cart.
///
/// Tokens are stored client-side. Well-formed tokens are 1..=128 characters of
/// `[A-Za-z0-9_-]`, so they can never contain the `:` used by user keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CartToken(String);

impl CartToken {
    /// Generate a fresh token from 122 random bits (UUIDv4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > MAX_IDENT_LEN {
            return Err(DomainError::invalid_id(format!(
                "CartToken: length must be 1..={MAX_IDENT_LEN}"
            )));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::invalid_id(
                "CartToken: only [A-Za-z0-9_-] allowed",
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for CartToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CartToken {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<CartToken> for String {
    fn from(value: CartToken) -> Self {
        value.0
    }
}

/// Name of an authenticated shopper, as established by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > MAX_IDENT_LEN {
            return Err(DomainError::invalid_id(format!(
                "Username: length must be 1..={MAX_IDENT_LEN}"
            )));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(DomainError::invalid_id("Username: whitespace not allowed"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Username {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

/// Key selecting one cart in the store.
///
/// Either an anonymous token verbatim, or `user:<username>` for an
/// authenticated shopper. Ordering is lexical; lock acquisition relies on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartKey(String);

impl CartKey {
    /// Deterministic key for an authenticated shopper (stable across sessions).
    pub fn for_user(username: &Username) -> Self {
        Self(format!("{USER_KEY_PREFIX}{}", username.as_str()))
    }

    /// Key for an anonymous shopper: the token itself.
    pub fn for_token(token: &CartToken) -> Self {
        Self(token.as_str().to_string())
    }

    /// Build a key from raw text without namespace checks.
    ///
    /// Intended for backings that already stored validated keys, and for tests.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for CartKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&CartToken> for CartKey {
    fn from(value: &CartToken) -> Self {
        Self::for_token(value)
    }
}

impl From<&Username> for CartKey {
    fn from(value: &Username) -> Self {
        Self::for_user(value)
    }
}
