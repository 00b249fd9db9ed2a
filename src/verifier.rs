//! Content verification hook used while scanning a container.
//!
//! During `load`, every active entry's uncompressed bytes are written to the
//! configured [`Verifier`] after a [`Verifier::reset`]; the verifier then
//! decides whether the stored name is the one it would derive for that
//! content.  A mismatch aborts the open with a corruption error.

use std::io::{self, Write};

/// A content-to-name check.  The bytes of one entry are fed through
/// [`Write`]; [`Verifier::matches`] is asked about the stored name.
pub trait Verifier: Write + Send + Sync {
    /// Forget all bytes written so far.
    fn reset(&mut self);

    /// True if `name` is the name this verifier derives for the bytes
    /// written since the last reset.
    fn matches(&self, name: &str) -> bool;
}

/// Accepts a name iff it is the lowercase hex BLAKE3 digest of the content.
#[derive(Default)]
pub struct Blake3Verifier {
    hasher: blake3::Hasher,
}

impl Blake3Verifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Write for Blake3Verifier {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Verifier for Blake3Verifier {
    fn reset(&mut self) {
        self.hasher.reset();
    }

    fn matches(&self, name: &str) -> bool {
        hex::encode(self.hasher.finalize().as_bytes()) == name
    }
}

/// The name [`Blake3Verifier`] expects for `data`.
pub fn blake3_name(data: &[u8]) -> String {
    hex::encode(blake3::hash(data).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake3_verifier_matches_content_name() {
        let data = b"content addressed";
        let mut v = Blake3Verifier::new();
        v.write_all(data).unwrap();
        assert!(v.matches(&blake3_name(data)));
        assert!(!v.matches("deadbeef"));

        v.reset();
        v.write_all(b"other").unwrap();
        assert!(!v.matches(&blake3_name(data)));
    }
}
