//! Screen-name identity and validation.
//!
//! A screen name exists in two forms: the **display** form, exactly as the
//! user typed it, and the **ident** form, normalized for comparison and map
//! keys. Two display names that normalize to the same ident are the same
//! user ("Chatting Chuck" and "chattingchuck" collide).

use std::fmt;

use thiserror::Error;

/// Lowest UIN the registration service ever handed out.
const UIN_MIN: u32 = 10_000;
/// Highest representable UIN (`i32::MAX - 1`, a registration-era artifact).
const UIN_MAX: u32 = 2_147_483_646;

/// Screen-name validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScreenNameError {
    #[error("screen name must be between 3 and 16 characters")]
    BadLength,

    #[error("screen name must start with a letter")]
    MustStartWithLetter,

    #[error("screen name cannot end with a space")]
    TrailingSpace,

    #[error("screen name may only contain letters, numbers, and spaces")]
    BadCharacter,

    #[error("UIN must be a number in the range {UIN_MIN}-{UIN_MAX}")]
    BadUin,
}

/// Normalized screen name used for comparison and as a map key.
///
/// Construction strips ASCII spaces and lowercases the input; there is no
/// other way to obtain one, so every `IdentScreenName` in the system is
/// normalized by definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct IdentScreenName(String);

impl IdentScreenName {
    pub fn new(raw: &str) -> Self {
        let normalized = raw
            .chars()
            .filter(|c| *c != ' ')
            .flat_map(char::to_lowercase)
            .collect();
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentScreenName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Screen name in the form the user entered it, preserved for echo back to
/// clients.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayScreenName(String);

impl DisplayScreenName {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The normalized identity this display name resolves to.
    pub fn ident(&self) -> IdentScreenName {
        IdentScreenName::new(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate as an AIM handle: 3-16 characters, starts with a letter,
    /// no trailing space, letters/digits/spaces only.
    pub fn validate_aim(&self) -> Result<(), ScreenNameError> {
        let len = self.0.chars().count();
        if !(3..=16).contains(&len) {
            return Err(ScreenNameError::BadLength);
        }
        match self.0.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => {}
            _ => return Err(ScreenNameError::MustStartWithLetter),
        }
        if self.0.ends_with(' ') {
            return Err(ScreenNameError::TrailingSpace);
        }
        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ')
        {
            return Err(ScreenNameError::BadCharacter);
        }
        Ok(())
    }

    /// Validate as an ICQ handle: a decimal UIN in the registration range.
    pub fn validate_uin(&self) -> Result<(), ScreenNameError> {
        match self.0.parse::<u32>() {
            Ok(uin) if (UIN_MIN..=UIN_MAX).contains(&uin) => Ok(()),
            _ => Err(ScreenNameError::BadUin),
        }
    }
}

impl fmt::Display for DisplayScreenName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DisplayScreenName {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
