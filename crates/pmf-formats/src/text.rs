//! Fixed-width name fields.

use arrayvec::ArrayString;

/// Decode a NUL padded name field, replacing invalid UTF-8 and trimming blanks.
///
/// Characters that no longer fit `N` bytes are dropped.
pub(crate) fn name_from_bytes<const N: usize>(bytes: &[u8]) -> ArrayString<N> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let decoded = String::from_utf8_lossy(&bytes[..end]);
    let mut name = ArrayString::new();
    for c in decoded.trim().chars().filter(|c| !c.is_control()) {
        if name.try_push(c).is_err() {
            break;
        }
    }
    name
}

/// Encode a name into a NUL padded field of `N` bytes.
pub(crate) fn name_to_bytes<const N: usize>(name: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let len = name.len().min(N);
    out[..len].copy_from_slice(&name.as_bytes()[..len]);
    out
}
