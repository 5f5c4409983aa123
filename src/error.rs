//! Errors shared by the interceptor and the name bank.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A category has no names at all, even after recycling the used ones.
    #[error("no names are available for category '{0}'")]
    EmptyPool(String),

    /// A function could not be found through the resolver.
    #[error("unable to resolve function '{0}'")]
    Unresolved(String),

    /// The host asked for a name style that we don't generate.
    #[error("name style {0} is not supported")]
    UnsupportedStyle(u8),

    /// Jump patches can only be encoded for x86 and x86-64.
    #[error("code patching is not supported on this instruction set")]
    UnsupportedArch,

    #[error("unable to change memory protection: {0}")]
    Protection(#[from] region::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("string contains an interior nul byte")]
    InteriorNul(#[from] std::ffi::NulError),
}

pub type Result<T> = std::result::Result<T, Error>;
