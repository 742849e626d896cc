//! Categorical code identity.
//!
//! A [`Code`] is a positive integer rendered with the fixed [`CODE_PREFIX`]
//! (`CB_12`). Equality and ordering always follow the integer value, so
//! `CB_9 < CB_10` regardless of how the codes were spelled in the source.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::GrammarError;

pub const CODE_PREFIX: &str = "CB_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Code(u64);

impl Code {
    pub const fn new(value: u64) -> Self {
        Code(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Parses a bare digit run such as a spreadsheet code cell (`"12"`, `"007"`).
    pub fn from_digits(raw: &str) -> Option<Self> {
        if !is_digits(raw) {
            return None;
        }
        raw.parse::<u64>().ok().map(Code)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CODE_PREFIX}{}", self.0)
    }
}

impl FromStr for Code {
    type Err = GrammarError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let digits = trimmed.strip_prefix(CODE_PREFIX).unwrap_or(trimmed);
        Code::from_digits(digits).ok_or_else(|| {
            if is_digits(digits) {
                GrammarError::CodeOutOfRange {
                    code: trimmed.to_string(),
                    row: None,
                }
            } else {
                GrammarError::InvalidCode {
                    code: trimmed.to_string(),
                    row: None,
                }
            }
        })
    }
}

impl Serialize for Code {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        Code::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

/// Non-empty run of ASCII digits, regardless of whether it fits a [`Code`].
pub fn is_digits(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

pub fn join_codes<'a, I>(codes: I) -> String
where
    I: IntoIterator<Item = &'a Code>,
{
    itertools::join(codes, ",")
}
