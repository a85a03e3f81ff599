//! Format parsers for the PMF player.
//!
//! [`pmf`] reads and writes the native container. MOD, S3M and XM files
//! are converted into the same [`pmf_ir::Song`]; [`decode`] sniffs the
//! header and picks the right one.

mod byte_reader;
mod effect_parser;
mod mod_format;
pub mod pmf;
mod s3m_format;
mod sniff;
mod text;
mod xm_format;

pub use mod_format::load_mod;
pub use s3m_format::load_s3m;
pub use sniff::{decode, detect, SourceFormat};
pub use xm_format::load_xm;

use pmf_ir::ValidationError;
use thiserror::Error;

/// Error type for format parsing.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Invalid file header or magic bytes
    #[error("invalid header at offset {offset:#x}")]
    InvalidHeader { offset: usize },
    /// Unexpected end of file
    #[error("unexpected end of file at offset {offset:#x}")]
    UnexpectedEof { offset: usize },
    /// Unsupported format version
    #[error("unsupported version at offset {offset:#x}")]
    UnsupportedVersion { offset: usize },
    #[error("unsupported format: {0}")]
    UnsupportedFormat(&'static str),
    #[error(transparent)]
    Decode(#[from] pmf::DecodeError),
    /// The converted song does not hold together
    #[error("converted song is invalid: {0}")]
    Validation(#[from] ValidationError),
}
