//! Content-addressing primitives: settings hashes, effective hashes, and
//! artifact content hashes. All use blake3 for speed on large inputs
//! (artifact files can be hundreds of megabytes).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte blake3 digest, displayed as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl Digest {
    pub fn of(bytes: &[u8]) -> Self {
        Digest(*blake3::hash(bytes).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        encode_hex(&self.0)
    }

    /// The first `n` hex characters, used as a directory sharding prefix
    /// under `FLOWFILE_ARTIFACT_DIR`.
    pub fn hex_prefix(&self, n: usize) -> String {
        let full = self.to_hex();
        full[..n.min(full.len())].to_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Fingerprint over a node's canonicalized settings plus its kind
/// identifier. Two nodes of the same kind with identical settings produce
/// the same `SettingsHash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SettingsHash(pub Digest);

impl SettingsHash {
    pub fn compute(kind: &str, settings_canonical_bytes: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind.as_bytes());
        hasher.update(b"\0");
        hasher.update(settings_canonical_bytes);
        SettingsHash(Digest(*hasher.finalize().as_bytes()))
    }
}

/// Content hash of a materialized artifact file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub Digest);

/// The cache key: a node's settings hash composed with its upstream
/// artifacts' content hashes, in port order. Two nodes with the same
/// `EffectiveHash` are interchangeable for caching purposes (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EffectiveHash(pub Digest);

impl EffectiveHash {
    /// Compose a settings hash with zero or more ordered upstream content
    /// hashes. Order matters: swapping `join`'s main/right inputs produces
    /// a different effective hash, which is correct since the operation
    /// itself is order-sensitive.
    pub fn compose(settings: SettingsHash, upstream: &[ContentHash]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(settings.0).0);
        for h in upstream {
            hasher.update(&(h.0).0);
        }
        EffectiveHash(Digest(*hasher.finalize().as_bytes()))
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("odd-length hex string".to_string());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

mod hex_bytes {
    use super::{decode_hex, encode_hex};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&encode_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = decode_hex(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32-byte hex digest"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_settings_same_hash() {
        let a = SettingsHash::compute("filter", b"{\"age\":1}");
        let b = SettingsHash::compute("filter", b"{\"age\":1}");
        assert_eq!(a, b);
    }

    #[test]
    fn different_kind_different_hash() {
        let a = SettingsHash::compute("filter", b"{}");
        let b = SettingsHash::compute("select", b"{}");
        assert_ne!(a, b);
    }

    #[test]
    fn effective_hash_is_order_sensitive() {
        let s = SettingsHash::compute("join", b"{}");
        let h1 = ContentHash(Digest::of(b"left"));
        let h2 = ContentHash(Digest::of(b"right"));
        let ab = EffectiveHash::compose(s, &[h1, h2]);
        let ba = EffectiveHash::compose(s, &[h2, h1]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn digest_round_trips_through_json() {
        let d = Digest::of(b"hello");
        let json = serde_json::to_string(&d).unwrap();
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
