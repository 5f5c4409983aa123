//! Names loaded from the CSV database, and the categories they are grouped into.

pub mod bank;
pub mod database;
pub mod generate;
pub mod random;

use strum::{Display, EnumIter, EnumString, FromRepr, IntoStaticStr};

/// A first name, nickname and last name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NameRecord {
    first: String,
    nick: String,
    last: String,
}

impl NameRecord {
    /// Creates a record, or returns `None` if the first or last name is empty. An empty nickname
    /// is replaced with the first name.
    pub fn new(first: &str, nick: &str, last: &str) -> Option<NameRecord> {
        if first.is_empty() || last.is_empty() {
            return None;
        }

        let nick = if nick.is_empty() { first } else { nick };

        Some(NameRecord {
            first: first.to_string(),
            nick: nick.to_string(),
            last: last.to_string(),
        })
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn last(&self) -> &str {
        &self.last
    }
}

impl std::fmt::Display for NameRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}' {}", self.first, self.nick, self.last)
    }
}

/// The host's gender values, which are the categories that names are grouped into.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString, FromRepr, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum Gender {
    None = 0,
    Male = 1,
    Female = 2,
}

impl Gender {
    /// Maps the gender column of a CSV row to a gender. Empty or unrecognised text maps to
    /// `fallback`.
    pub fn from_tag(tag: &str, fallback: Gender) -> Gender {
        let tag = tag.trim();

        if tag.is_empty() {
            return fallback;
        }

        tag.parse().unwrap_or_else(|_| {
            log::warn!("Unrecognised gender '{}', using {}", tag, fallback);
            fallback
        })
    }
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Male
    }
}

impl serde::Serialize for Gender {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tag: &'static str = self.into();
        serializer.serialize_str(tag)
    }
}

impl<'de> serde::Deserialize<'de> for Gender {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}
