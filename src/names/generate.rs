//! The replacement for the host's name generator.

use strum::FromRepr;

use super::bank::NameBank;
use super::{Gender, NameRecord};
use crate::error::{Error, Result};

/// The kinds of name the host asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum NameStyle {
    /// First, nickname and last name.
    Full = 0,

    /// The pawn's kind followed by a number, e.g. "Colonist 3".
    Numeric = 1,
}

impl NameStyle {
    pub fn from_code(code: u8) -> Result<NameStyle> {
        NameStyle::from_repr(code).ok_or(Error::UnsupportedStyle(code))
    }
}

/// A generated name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Name {
    Triple(NameRecord),
    Single { name: String, numerical: bool },
}

/// Asks the host whether a name is already in use.
pub trait NameUseChecker {
    fn is_used(&self, name: &str) -> bool;
}

impl<F> NameUseChecker for F
where
    F: Fn(&str) -> bool,
{
    fn is_used(&self, name: &str) -> bool {
        self(name)
    }
}

/// Generates a name in the given style. Full names come from the bank, and numeric names use the
/// lowest number that the host doesn't already have a pawn for.
pub fn generate(
    bank: &mut NameBank<Gender>,
    gender: Gender,
    style: NameStyle,
    kind_label: &str,
    checker: &impl NameUseChecker,
) -> Result<Name> {
    match style {
        NameStyle::Full => Ok(Name::Triple(bank.draw(gender)?)),

        NameStyle::Numeric => {
            let name = (1u32..)
                .map(|number| format!("{} {}", kind_label, number))
                .find(|name| !checker.is_used(name))
                .unwrap_or_default();

            Ok(Name::Single {
                name,
                numerical: true,
            })
        }
    }
}
