// This file is part of Moraine.
//
// Copyright (C) 2025 Moraine Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use tracing::warn;

use crate::client::{BlobClient, FeedClient};
use crate::error::Result;
use crate::types::{FeedIndex, OwnerId, Topic};
use crate::version::{VersionMetadata, VersionStore};

/// Ascending version history for one logical path.
#[derive(Debug, Clone, Default)]
pub struct VersionHistory {
    entries: Vec<VersionMetadata>,
    truncated: bool,
}

impl VersionHistory {
    pub fn entries(&self) -> &[VersionMetadata] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&VersionMetadata> {
        self.entries.last()
    }

    /// True when the underlying scan hit its ceiling; newer entries may be
    /// missing from this history.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VersionMetadata> {
        self.entries.iter()
    }
}

impl IntoIterator for VersionHistory {
    type Item = VersionMetadata;
    type IntoIter = std::vec::IntoIter<VersionMetadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a VersionHistory {
    type Item = &'a VersionMetadata;
    type IntoIter = std::slice::Iter<'a, VersionMetadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<C: FeedClient + BlobClient> VersionStore<C> {
    /// Walks every slot from 0 to the scanned maximum and collects metadata.
    ///
    /// A slot that fails to read is logged and skipped: later slots are
    /// independently readable, so partial history beats total failure.
    /// Tombstone and unwritten slots are omitted silently. Entries come out
    /// ascending by construction; no re-sort happens.
    pub fn history(&self, topic: Topic, owner: OwnerId) -> Result<VersionHistory> {
        let count = self.count_versions(topic, owner)?;
        let Some(highest) = count.latest() else {
            return Ok(VersionHistory::default());
        };

        let mut entries = Vec::with_capacity(count.total() as usize);
        for value in 0..=highest.get() {
            let index = FeedIndex::new(value)?;
            match self.read_version(topic, owner, Some(index)) {
                Ok(Some(metadata)) => entries.push(metadata),
                Ok(None) => {}
                Err(error) => {
                    warn!(%topic, index = value, %error, "skipping unreadable version slot");
                }
            }
        }

        Ok(VersionHistory {
            entries,
            truncated: count.is_truncated(),
        })
    }
}
