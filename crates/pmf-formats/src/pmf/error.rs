//! PMF decode and encode errors.

use std::io;

/// Why a PMF file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("file ends before the data it declares")]
    Truncated,
    #[error("not a PMF file")]
    BadMagic,
    #[error("PMF version {found} is not supported")]
    VersionUnsupported { found: u16 },
    #[error("corrupt PMF: {0}")]
    CorruptIndex(String),
    #[error("read failed: {0}")]
    Io(#[source] io::Error),
}

impl DecodeError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        DecodeError::CorruptIndex(msg.into())
    }
}

impl From<binrw::Error> for DecodeError {
    fn from(err: binrw::Error) -> Self {
        if err.is_eof() {
            return DecodeError::Truncated;
        }
        match err {
            binrw::Error::Io(e) => DecodeError::from(e),
            binrw::Error::BadMagic { .. } => DecodeError::BadMagic,
            other => DecodeError::CorruptIndex(other.to_string()),
        }
    }
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::Truncated
        } else {
            DecodeError::Io(err)
        }
    }
}

/// Why a song could not be written as PMF.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("write failed: {0}")]
    Write(#[from] binrw::Error),
    #[error("{0} does not fit the PMF layout")]
    TooLarge(&'static str),
    #[error("song is not playable: {0}")]
    Invalid(#[from] pmf_ir::ValidationError),
}

impl From<io::Error> for EncodeError {
    fn from(err: io::Error) -> Self {
        EncodeError::Write(binrw::Error::Io(err))
    }
}
