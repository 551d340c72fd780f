// This file is part of Moraine.
//
// Copyright (C) 2025 Moraine Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::{BlobClient, FeedClient};
use crate::constants;
use crate::error::{Error, Result};
use crate::types::{FeedIndex, OwnerId, Reference, ResourceId, Topic};

/// Operation kind recorded in version metadata. A closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Modify,
    Delete,
}

/// Metadata describing one version of a logical path.
///
/// Serialized as a self-describing JSON object; unknown fields are ignored on
/// decode so future writers do not break old readers. `version` must equal
/// the feed index at which the metadata reference is published. The writer
/// stamps it and readers verify it; a mismatch is corruption, not a soft
/// miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    pub path: String,
    pub content: Reference,
    pub size: u64,
    pub operation: Operation,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    pub resource: ResourceId,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,
}

impl VersionMetadata {
    /// Builds metadata for a new version. `version` and `timestamp` are
    /// placeholders; [`VersionStore::write_version`] stamps both on publish.
    pub fn new(
        path: impl Into<String>,
        content: Reference,
        size: u64,
        operation: Operation,
        resource: ResourceId,
    ) -> Self {
        Self {
            path: path.into(),
            content,
            size,
            operation,
            version: 0,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            resource,
            custom: BTreeMap::new(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::CorruptMetadata {
            context: "metadata blob".to_string(),
            reason: e.to_string(),
        })
    }
}

/// Tunables for version feed access.
#[derive(Debug, Clone)]
pub struct VersionConfig {
    /// Highest feed index a scan may probe before giving up.
    pub scan_ceiling: u64,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            scan_ceiling: constants::DEFAULT_SCAN_CEILING,
        }
    }
}

/// Scanner outcome for one feed.
///
/// A ceiling-limited scan is reported as [`VersionCount::Truncated`] so a
/// best-effort head is never mistaken for a proven count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCount {
    /// Slot 0 is unwritten; nothing has ever been published.
    Empty,
    /// Highest populated index, proven by reading the first gap.
    Exact(FeedIndex),
    /// Highest index probed before the ceiling stopped the walk. The true
    /// history may extend further.
    Truncated(FeedIndex),
}

impl VersionCount {
    /// Highest known populated index, if any.
    pub fn latest(&self) -> Option<FeedIndex> {
        match self {
            VersionCount::Empty => None,
            VersionCount::Exact(index) | VersionCount::Truncated(index) => Some(*index),
        }
    }

    /// Number of known versions (a lower bound when truncated).
    pub fn total(&self) -> u64 {
        match self.latest() {
            Some(index) => index.get() + 1,
            None => 0,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, VersionCount::Truncated(_))
    }
}

/// Feed-indexed version access over one storage client.
///
/// Writes require `&mut self`. At most one in-flight write per
/// `(topic, owner)` pair is the caller's invariant; a lost race on a slot
/// surfaces as [`Error::SlotOccupied`] from the publish primitive. Reads are
/// safe to run concurrently with each other and with writes.
#[derive(Debug, Clone)]
pub struct VersionStore<C> {
    client: C,
    config: VersionConfig,
}

impl<C> VersionStore<C> {
    pub fn new(client: C) -> Self {
        Self::with_config(client, VersionConfig::default())
    }

    pub fn with_config(client: C, config: VersionConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &VersionConfig {
        &self.config
    }
}

impl<C: FeedClient> VersionStore<C> {
    /// Discovers the highest populated slot by sequential probing.
    ///
    /// Probes 0, 1, 2, ... and stops at the first unwritten slot; each
    /// probe's stopping condition depends on the previous result, so the walk
    /// is inherently sequential. Transport failures propagate immediately and
    /// are never folded into "end of history".
    pub fn count_versions(&self, topic: Topic, owner: OwnerId) -> Result<VersionCount> {
        if self.client.feed_read(topic, owner, FeedIndex::ZERO)?.is_none() {
            return Ok(VersionCount::Empty);
        }

        let mut highest = FeedIndex::ZERO;
        while highest.get() < self.config.scan_ceiling {
            let next = highest.next()?;
            match self.client.feed_read(topic, owner, next)? {
                Some(_) => highest = next,
                None => return Ok(VersionCount::Exact(highest)),
            }
        }
        Ok(VersionCount::Truncated(highest))
    }
}

impl<C: FeedClient + BlobClient> VersionStore<C> {
    /// Publishes a new version on `topic` and returns its index.
    ///
    /// The next index comes from a fresh scan: one past the highest populated
    /// slot, or 0 for an untouched feed. `metadata.version` and
    /// `metadata.timestamp` are stamped here, overwriting caller values; the
    /// writer is authoritative for both. A truncated scan aborts the write
    /// with [`Error::ScanCeiling`] rather than publish onto a guessed head.
    ///
    /// A failure between blob upload and feed publish leaves an unreferenced
    /// blob behind; content-addressed storage keeps it inert, so no rollback
    /// is attempted.
    pub fn write_version(
        &mut self,
        topic: Topic,
        signer: OwnerId,
        mut metadata: VersionMetadata,
    ) -> Result<FeedIndex> {
        let next = match self.count_versions(topic, signer)? {
            VersionCount::Empty => FeedIndex::ZERO,
            VersionCount::Exact(highest) => highest.next()?,
            VersionCount::Truncated(highest) => {
                return Err(Error::ScanCeiling {
                    probed: highest.get(),
                })
            }
        };

        metadata.version = next.get();
        metadata.timestamp = Utc::now();

        let bytes = metadata.encode()?;
        let reference = self.client.blob_upload(&bytes)?;
        self.client.feed_write(topic, signer, next, reference)?;
        Ok(next)
    }

    /// Resolves a version to its metadata.
    ///
    /// `None` asks for the latest version via a scan. Returns `Ok(None)` for
    /// an untouched feed, an unwritten slot, or a tombstone slot holding the
    /// zero reference. A populated slot that cannot be resolved to valid
    /// metadata is corruption and fails.
    pub fn read_version(
        &self,
        topic: Topic,
        owner: OwnerId,
        version: Option<FeedIndex>,
    ) -> Result<Option<VersionMetadata>> {
        let index = match version {
            Some(index) => index,
            None => match self.count_versions(topic, owner)? {
                VersionCount::Empty => return Ok(None),
                VersionCount::Exact(highest) => highest,
                VersionCount::Truncated(highest) => {
                    warn!(
                        %topic,
                        probed = highest.get(),
                        "version scan hit its ceiling; reading best-effort head"
                    );
                    highest
                }
            },
        };

        let Some(reference) = self.client.feed_read(topic, owner, index)? else {
            return Ok(None);
        };
        if reference.is_zero() {
            return Ok(None);
        }

        let Some(bytes) = self.client.blob_download(reference)? else {
            return Err(Error::CorruptMetadata {
                context: format!("slot {index} of {topic}"),
                reason: format!("referenced blob {reference} is missing"),
            });
        };
        let metadata = VersionMetadata::decode(&bytes)?;
        if metadata.version != index.get() {
            return Err(Error::CorruptMetadata {
                context: format!("slot {index} of {topic}"),
                reason: format!("metadata claims version {}", metadata.version),
            });
        }
        Ok(Some(metadata))
    }
}
