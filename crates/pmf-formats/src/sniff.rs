//! Source format detection and dispatch.

use pmf_ir::Song;

use crate::mod_format::{channels_for_signature, load_mod};
use crate::s3m_format::{is_s3m, load_s3m};
use crate::xm_format::{is_xm, load_xm};
use crate::{pmf, FormatError};

/// A module format recognised by its header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Pmf,
    Mod,
    S3m,
    Xm,
    /// Impulse Tracker, recognised but not converted
    It,
}

impl SourceFormat {
    pub fn name(self) -> &'static str {
        match self {
            SourceFormat::Pmf => "PMF",
            SourceFormat::Mod => "MOD",
            SourceFormat::S3m => "S3M",
            SourceFormat::Xm => "XM",
            SourceFormat::It => "IT",
        }
    }
}

/// Guess the format from magic bytes.
pub fn detect(data: &[u8]) -> Option<SourceFormat> {
    if pmf::is_pmf(data) {
        Some(SourceFormat::Pmf)
    } else if is_xm(data) {
        Some(SourceFormat::Xm)
    } else if data.starts_with(b"IMPM") {
        Some(SourceFormat::It)
    } else if is_s3m(data) {
        Some(SourceFormat::S3m)
    } else if data.get(1080..1084).and_then(channels_for_signature).is_some() {
        Some(SourceFormat::Mod)
    } else {
        None
    }
}

/// Decode any supported format into a validated [`Song`].
pub fn decode(data: &[u8]) -> Result<Song, FormatError> {
    let format = detect(data).ok_or(FormatError::UnsupportedFormat("unknown"))?;
    log::debug!("decoding {} module ({} bytes)", format.name(), data.len());
    match format {
        SourceFormat::Pmf => Ok(pmf::load(data)?),
        SourceFormat::Mod => load_mod(data),
        SourceFormat::S3m => load_s3m(data),
        SourceFormat::Xm => load_xm(data),
        SourceFormat::It => Err(FormatError::UnsupportedFormat("IT")),
    }
}
