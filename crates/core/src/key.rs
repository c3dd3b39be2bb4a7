//! Content key derivation.
//!
//! A render request is identified by its `(text, voice, model)` triple. The
//! triple is normalized and hashed with SHA-256, so requests that only differ
//! in whitespace or letter case of the text or voice share one cache entry.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Separator placed between the normalized request fields before hashing.
const FIELD_SEPARATOR: char = '|';

/// Length of a hex-encoded SHA-256 digest.
pub const KEY_HEX_LEN: usize = 64;

/// Collapse whitespace runs to single spaces, trim, and lowercase.
///
/// The information separators U+001C..=U+001F count as whitespace too, so
/// keys match those computed by other implementations of this scheme.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split(is_separator)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// A content key: lowercase hex SHA-256 of the normalized request.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a render request.
    ///
    /// The text is whitespace-normalized and lowercased, the voice is
    /// lowercased, and the model identifier is used verbatim.
    pub fn derive(text: &str, voice: &str, model: &str) -> Self {
        let material = format!(
            "{}{sep}{}{sep}{}",
            normalize_text(text),
            voice.to_lowercase(),
            model,
            sep = FIELD_SEPARATOR
        );

        let mut hasher = Sha256::new();
        hasher.update(material.as_bytes());
        let digest = hasher.finalize();
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Parse a key from its hex form.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != KEY_HEX_LEN {
            return Err(crate::Error::InvalidKey(format!(
                "expected {KEY_HEX_LEN} hex chars, got {}",
                s.len()
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(crate::Error::InvalidKey(format!(
                "not lowercase hex: {s}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// The hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", &self.0[..16.min(self.0.len())])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CacheKey {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        let a = CacheKey::derive("Hello world", "alloy", "tts-1");
        let b = CacheKey::derive("Hello world", "alloy", "tts-1");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), KEY_HEX_LEN);
    }

    #[test]
    fn test_whitespace_and_case_collapse() {
        let canonical = CacheKey::derive("hello world", "alloy", "tts-1");
        let messy = CacheKey::derive("  Hello \t\n  WORLD  ", "ALLOY", "tts-1");
        assert_eq!(canonical, messy);
    }

    #[test]
    fn test_model_is_case_sensitive() {
        let lower = CacheKey::derive("hello", "alloy", "tts-1");
        let upper = CacheKey::derive("hello", "alloy", "TTS-1");
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_known_digest() {
        // sha256("hello world|alloy|tts-1")
        let key = CacheKey::derive("Hello  World", "Alloy", "tts-1");
        let mut hasher = Sha256::new();
        hasher.update(b"hello world|alloy|tts-1");
        let expected: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        assert_eq!(key.as_str(), expected);
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  A  b\tC \n"), "a b c");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   "), "");
        assert_eq!(normalize_text("one\u{1f}two\u{1c}\u{1d}three"), "one two three");
        assert_eq!(normalize_text("a\u{a0}b\u{2003}c"), "a b c");
    }

    #[test]
    fn test_from_hex_validation() {
        let key = CacheKey::derive("x", "y", "z");
        assert_eq!(CacheKey::from_hex(key.as_str()).unwrap(), key);
        assert!(CacheKey::from_hex("abc").is_err());
        assert!(CacheKey::from_hex(&"G".repeat(KEY_HEX_LEN)).is_err());
        assert!(CacheKey::from_hex(&"A".repeat(KEY_HEX_LEN)).is_err());
    }

    #[test]
    fn test_serde_uses_hex_string() {
        let key = CacheKey::derive("x", "y", "z");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{key}\""));
        let back: CacheKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<CacheKey>("\"nothex\"").is_err());
    }
}
