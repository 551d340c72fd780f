// This file is part of Moraine.
//
// Copyright (C) 2025 Moraine Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Fixed-width addressing key identifying one feed.
///
/// Derived from a logical path (see [`derive_topic`](crate::topic::derive_topic)),
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Topic(pub [u8; 32]);

impl Topic {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A 32-byte content address returned by blob upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference(pub [u8; 32]);

impl Reference {
    /// The network's well-known empty reference. A feed slot holding it is a
    /// tombstone: the slot exists but intentionally carries no data.
    pub const ZERO: Reference = Reference([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&text, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// Address-style owner and signing identity (20 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(pub [u8; 20]);

impl OwnerId {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Deterministic identity derived from a label. Intended for tests and
    /// examples; real identities come from key material.
    pub fn derive(label: &str) -> Self {
        let digest = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..20]);
        Self(bytes)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Identifier of a storage allocation (postage stamp).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub [u8; 32]);

impl ResourceId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Deterministic identifier derived from a label, for tests and examples.
    pub fn derive(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&text, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// Slot number within a feed. Doubles as the version number.
///
/// Bounded at [`FeedIndex::MAX`] so every index survives the JSON number
/// encoding of version metadata, which must stay readable by clients whose
/// integers top out at 2^53 - 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedIndex(u64);

impl FeedIndex {
    /// Largest representable index (2^53 - 1).
    pub const MAX: u64 = (1 << 53) - 1;

    pub const ZERO: FeedIndex = FeedIndex(0);

    pub fn new(value: u64) -> Result<Self> {
        if value > Self::MAX {
            return Err(Error::IndexOverflow);
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// The following slot. Checked against [`FeedIndex::MAX`].
    pub fn next(&self) -> Result<Self> {
        Self::new(self.0 + 1)
    }
}

impl fmt::Display for FeedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_index_bounds() {
        assert!(FeedIndex::new(FeedIndex::MAX).is_ok());
        assert!(matches!(
            FeedIndex::new(FeedIndex::MAX + 1),
            Err(Error::IndexOverflow)
        ));

        let top = FeedIndex::new(FeedIndex::MAX).unwrap();
        assert!(matches!(top.next(), Err(Error::IndexOverflow)));
        assert_eq!(FeedIndex::ZERO.next().unwrap().get(), 1);
    }

    #[test]
    fn test_reference_hex_round_trip() {
        let reference = Reference([0xab; 32]);
        let json = serde_json::to_string(&reference).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: Reference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reference);
    }

    #[test]
    fn test_reference_rejects_wrong_width_hex() {
        assert!(serde_json::from_str::<Reference>("\"abcd\"").is_err());
        assert!(serde_json::from_str::<Reference>("\"zz\"").is_err());
    }

    #[test]
    fn test_zero_reference_is_tombstone() {
        assert!(Reference::ZERO.is_zero());
        assert!(!Reference([1u8; 32]).is_zero());
    }
}
