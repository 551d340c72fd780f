// This file is part of Moraine.
//
// Copyright (C) 2025 Moraine Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use crate::error::Result;
use crate::types::{FeedIndex, OwnerId, Reference, ResourceId, Topic};

/// Remaining capacity report for one storage resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceStatus {
    pub usable: bool,
    pub remaining_bytes: u64,
}

/// Append-only single-writer feed primitives.
///
/// All calls are blocking request/response. An unwritten slot is `Ok(None)`,
/// never an error. Implementations enforce write-once slots: publishing to an
/// occupied `(topic, owner, index)` slot fails with
/// [`Error::SlotOccupied`](crate::error::Error::SlotOccupied).
pub trait FeedClient {
    fn feed_read(&self, topic: Topic, owner: OwnerId, index: FeedIndex)
        -> Result<Option<Reference>>;

    fn feed_write(
        &self,
        topic: Topic,
        signer: OwnerId,
        index: FeedIndex,
        payload: Reference,
    ) -> Result<()>;
}

/// Content-addressed blob primitives.
pub trait BlobClient {
    /// Uploads a payload and returns its content address. Idempotent: the
    /// same bytes always yield the same reference.
    fn blob_upload(&self, payload: &[u8]) -> Result<Reference>;

    fn blob_download(&self, reference: Reference) -> Result<Option<Vec<u8>>>;
}

/// Storage-resource (stamp) primitives.
pub trait ResourceClient {
    fn resource_status(&self, resource: ResourceId) -> Result<Option<ResourceStatus>>;

    /// Administratively shrinks the resource. Irreversible.
    fn resource_dilute(&self, resource: ResourceId) -> Result<()>;
}

/// The full client surface consumed by the drive layer.
pub trait StorageClient: FeedClient + BlobClient + ResourceClient {}

impl<T: FeedClient + BlobClient + ResourceClient> StorageClient for T {}
