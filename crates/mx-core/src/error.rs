//! Engine error taxonomy.

use core::fmt;

/// Errors surfaced synchronously by construction and structural operations.
///
/// The render path never returns these; a misbehaving voice or submix
/// degrades to silence instead (see `mx-engine`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The codec reported a sample format the engine does not know.
    UnsupportedFormat { bits: u16, float: bool },
    /// A play request referenced a source with no decoded audio data.
    SourceUnavailable,
    /// A submix re-parenting would have made the tree cyclic.
    Cycle,
    /// Operation on a terminal voice, a released submix, or a dead handle.
    InvalidState(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedFormat { bits, float } => {
                let kind = if *float { "float" } else { "integer" };
                write!(f, "unsupported sample format: {}-bit {}", bits, kind)
            }
            Error::SourceUnavailable => write!(f, "source has no decoded audio data"),
            Error::Cycle => write!(f, "submix attachment would create a cycle"),
            Error::InvalidState(what) => write!(f, "invalid state: {}", what),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
