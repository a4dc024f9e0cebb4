//! crates/tg_core/src/ids.rs
//! Identifier newtypes: members, guilds, seasons, tag numbers and digests.
//! Deterministic, ASCII-only, strict shapes; no I/O.

use core::fmt;
use core::num::NonZeroU32;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors returned when validating or parsing IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdError {
    NonAscii,
    TooLong,
    BadShape,
    ZeroTag,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdError::NonAscii => write!(f, "identifier must be ASCII without NUL"),
            IdError::TooLong => write!(f, "identifier too long"),
            IdError::BadShape => write!(f, "identifier has an invalid shape"),
            IdError::ZeroTag => write!(f, "tag numbers start at 1"),
        }
    }
}

impl std::error::Error for IdError {}

const HEX64_LEN: usize = 64;
const TOKEN_MAX_LEN: usize = 64;

#[inline]
fn is_ascii_no_nul(s: &str) -> bool {
    !s.as_bytes().iter().any(|&b| b == 0 || b > 0x7F)
}

/// Lowercase hex (length must be exactly 64).
#[inline]
pub fn is_valid_sha256(s: &str) -> bool {
    s.len() == HEX64_LEN
        && s.as_bytes()
            .iter()
            .all(|&b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Token for member/guild/season ids: ^[A-Za-z0-9_.-]{1,64}$
///
/// `:` is excluded because intent-store keys are `:`-delimited.
#[inline]
pub fn is_valid_token(s: &str) -> bool {
    let bs = s.as_bytes();
    !bs.is_empty()
        && bs.len() <= TOKEN_MAX_LEN
        && bs
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-')
}

fn check_token(s: &str) -> Result<(), IdError> {
    if !is_ascii_no_nul(s) {
        return Err(IdError::NonAscii);
    }
    if s.len() > TOKEN_MAX_LEN {
        return Err(IdError::TooLong);
    }
    if !is_valid_token(s) {
        return Err(IdError::BadShape);
    }
    Ok(())
}

macro_rules! token_newtype {
    ($(#[$m:meta])* $name:ident) => {
        $(#[$m])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
        pub struct $name(String);

        impl $name {
            #[inline] pub fn as_str(&self) -> &str { &self.0 }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
        }

        impl FromStr for $name {
            type Err = IdError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                check_token(s)?;
                Ok($name(s.to_owned()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;
            fn try_from(value: String) -> Result<Self, Self::Error> {
                check_token(&value)?;
                Ok($name(value))
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdError;
            #[inline]
            fn try_from(value: &str) -> Result<Self, Self::Error> { value.parse() }
        }

        impl From<$name> for String {
            #[inline]
            fn from(value: $name) -> String { value.0 }
        }
    }
}

token_newtype!(
    /// Opaque member identifier, stable across the member's membership.
    MemberId
);
token_newtype!(
    /// Guild (league community) identifier; scopes tags, seasons and intents.
    GuildId
);
token_newtype!(
    /// Season identifier.
    SeasonId
);

/// Generic 64-hex lowercase SHA-256 digest.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Sha256(String);

impl Sha256 {
    #[inline] pub fn as_hex(&self) -> &str { &self.0 }
}

impl fmt::Display for Sha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for Sha256 {
    type Err = IdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_ascii_no_nul(s) { return Err(IdError::NonAscii); }
        if !is_valid_sha256(s) { return Err(IdError::BadShape); }
        Ok(Sha256(s.to_owned()))
    }
}

impl TryFrom<String> for Sha256 {
    type Error = IdError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !is_valid_sha256(&value) { return Err(IdError::BadShape); }
        Ok(Sha256(value))
    }
}

impl From<Sha256> for String {
    fn from(value: Sha256) -> String { value.0 }
}

/// A rank slot, 1-based; lower is better.
///
/// "No tag" is spelled `Option<TagNumber>`, never zero. The upper bound is a
/// configuration concern (`EngineParams::max_tag`), checked by the pipeline.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
pub struct TagNumber(NonZeroU32);

impl TagNumber {
    /// Returns `None` for zero.
    #[inline]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(TagNumber)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Slot number for a 0-based position (`index + 1`), saturating at `u32::MAX`.
    #[inline]
    pub fn from_index(index: usize) -> Self {
        let n = u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(1))
            .unwrap_or(u32::MAX);
        TagNumber(NonZeroU32::new(n).unwrap_or(NonZeroU32::MAX))
    }
}

impl fmt::Display for TagNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for TagNumber {
    type Error = IdError;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        TagNumber::new(value).ok_or(IdError::ZeroTag)
    }
}

impl From<TagNumber> for u32 {
    fn from(value: TagNumber) -> u32 { value.get() }
}

impl FromStr for TagNumber {
    type Err = IdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u32 = s.trim().parse().map_err(|_| IdError::BadShape)?;
        TagNumber::try_from(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens() {
        for ok in ["A", "a", "9", "_", ".", "-", "user-1", "123456789012345678"] {
            assert!(is_valid_token(ok));
            let _m: MemberId = ok.parse().unwrap();
            let _g: GuildId = ok.parse().unwrap();
        }
        for bad in ["", " ", "a:b", "é", &"x".repeat(65)] {
            assert!(!is_valid_token(bad));
            assert!(bad.parse::<MemberId>().is_err());
        }
    }

    #[test]
    fn tag_numbers_are_positive() {
        assert!(TagNumber::new(0).is_none());
        assert_eq!(TagNumber::new(7).unwrap().get(), 7);
        assert_eq!("12".parse::<TagNumber>().unwrap().get(), 12);
        assert_eq!("0".parse::<TagNumber>(), Err(IdError::ZeroTag));
        assert_eq!(TagNumber::from_index(0).get(), 1);
        assert_eq!(TagNumber::from_index(4).get(), 5);
    }

    #[test]
    fn sha_shape() {
        let hex = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
        let dig: Sha256 = hex.parse().unwrap();
        assert_eq!(format!("{dig}"), hex);
        assert!("0123XYZ".parse::<Sha256>().is_err());
        assert!(hex.to_uppercase().parse::<Sha256>().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_rejects_invalid_values() {
        let m: MemberId = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(m.as_str(), "alice");
        assert!(serde_json::from_str::<MemberId>("\"a:b\"").is_err());
        assert!(serde_json::from_str::<TagNumber>("0").is_err());
        assert_eq!(serde_json::to_string(&TagNumber::new(3).unwrap()).unwrap(), "3");
    }
}
