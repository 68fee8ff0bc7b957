use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque identifier for a stored object.
///
/// An `ObjectId` is a lowercase hex string of random bytes drawn from the
/// operating system CSPRNG. It is the only thing that resolves an object, so
/// it also acts as the capability to read it. Ids are always produced by an
/// [`IdSpec`], either freshly generated or strictly parsed; there is no
/// `Deserialize` impl.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// The hex string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short representation (first 8 characters), safe for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Width of generated identifiers.
///
/// The alphabet is fixed to lowercase hex; only the number of random bytes is
/// configurable. 16 bytes (128 bits) is the floor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSpec {
    bytes: usize,
}

impl IdSpec {
    /// Smallest accepted width in random bytes.
    pub const MIN_BYTES: usize = 16;
    /// Largest accepted width in random bytes.
    pub const MAX_BYTES: usize = 64;

    /// Create a spec generating `bytes` random bytes per id.
    pub fn new(bytes: usize) -> Result<Self, TypeError> {
        if !(Self::MIN_BYTES..=Self::MAX_BYTES).contains(&bytes) {
            return Err(TypeError::InvalidIdWidth {
                bytes,
                min: Self::MIN_BYTES,
                max: Self::MAX_BYTES,
            });
        }
        Ok(Self { bytes })
    }

    /// Number of random bytes per id.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Length of the hex string form.
    pub fn hex_len(&self) -> usize {
        self.bytes * 2
    }

    /// Generate a fresh id from the OS random source.
    pub fn generate(&self) -> ObjectId {
        let mut buf = vec![0u8; self.bytes];
        OsRng.fill_bytes(&mut buf);
        ObjectId(hex::encode(buf))
    }

    /// Parse an id, accepting only the exact width and lowercase hex.
    ///
    /// Anything else is rejected before it can reach a filesystem path.
    pub fn parse(&self, s: &str) -> Result<ObjectId, TypeError> {
        if s.len() != self.hex_len() {
            return Err(TypeError::InvalidLength {
                expected: self.hex_len(),
                actual: s.len(),
            });
        }
        if let Some(ch) = s.chars().find(|c| !matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(TypeError::InvalidIdChar(ch));
        }
        Ok(ObjectId(s.to_string()))
    }
}

impl Default for IdSpec {
    fn default() -> Self {
        Self {
            bytes: Self::MIN_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let spec = IdSpec::default();
        let a = spec.generate();
        let b = spec.generate();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_id_has_expected_width() {
        let spec = IdSpec::new(24).unwrap();
        let id = spec.generate();
        assert_eq!(id.as_str().len(), 48);
        assert!(spec.parse(id.as_str()).is_ok());
    }

    #[test]
    fn width_bounds_are_enforced() {
        assert!(IdSpec::new(8).is_err());
        assert!(IdSpec::new(65).is_err());
        assert!(IdSpec::new(16).is_ok());
        assert!(IdSpec::new(64).is_ok());
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let spec = IdSpec::default();
        assert_eq!(
            spec.parse("abc"),
            Err(TypeError::InvalidLength {
                expected: 32,
                actual: 3
            })
        );
    }

    #[test]
    fn parse_rejects_uppercase_and_traversal() {
        let spec = IdSpec::default();
        let upper = "ABCDEF0123456789ABCDEF0123456789";
        assert_eq!(spec.parse(upper), Err(TypeError::InvalidIdChar('A')));

        let traversal = "../../../../../../../etc/passwd0";
        assert_eq!(traversal.len(), 32);
        assert!(spec.parse(traversal).is_err());
    }

    #[test]
    fn short_is_8_chars() {
        let id = IdSpec::default().generate();
        assert_eq!(id.short().len(), 8);
        assert!(format!("{id:?}").starts_with("ObjectId("));
    }

    #[test]
    fn serde_is_transparent() {
        let id = IdSpec::default().generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
