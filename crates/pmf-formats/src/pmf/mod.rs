//! The native PMF song format.
//!
//! A small header carries the song globals and a directory of tagged
//! sections (`CHAN`, `ORDR`, `PATT`, `INST`, `SMPL`). All integers are
//! little-endian. Pattern cells are stored as a sparse, row-terminated
//! stream so empty cells cost nothing.
//!
//! Loading is strict about structure and lenient about content: a broken
//! directory or an out of range note fails the load, while an effect code
//! this version does not know is dropped with a warning.

mod error;
mod reader;
mod records;
mod writer;

pub use error::{DecodeError, EncodeError};
pub use reader::{load, load_from};
pub use writer::{encode, write_to};

/// Returns true if `bytes` starts with the PMF magic.
pub fn is_pmf(bytes: &[u8]) -> bool {
    bytes.starts_with(&records::MAGIC)
}
