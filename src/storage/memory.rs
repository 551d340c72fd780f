use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::client::{BlobClient, FeedClient, ResourceClient, ResourceStatus};
use crate::error::{Error, Result};
use crate::types::{FeedIndex, OwnerId, Reference, ResourceId, Topic};

type SlotKey = (Topic, OwnerId, u64);

/// In-process storage client for tests, benches, and examples.
///
/// Clones share state. Feed slots are write-once, blob uploads are content
/// addressed with BLAKE3, and resources are plain records mutated through
/// the helpers below. Fault injection simulates transport failures and blob
/// damage; `feed_reads` counts probes so scan cost stays observable.
#[derive(Clone, Default)]
pub struct MemoryClient {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    feed_reads: AtomicU64,
}

#[derive(Default)]
struct State {
    feeds: BTreeMap<SlotKey, Reference>,
    blobs: BTreeMap<Reference, Vec<u8>>,
    resources: BTreeMap<ResourceId, ResourceStatus>,
    poisoned: BTreeSet<SlotKey>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers (or resets) a resource with the given remaining capacity.
    pub fn register_resource(&self, resource: ResourceId, remaining_bytes: u64) {
        self.state().resources.insert(
            resource,
            ResourceStatus {
                usable: true,
                remaining_bytes,
            },
        );
    }

    pub fn set_resource_usable(&self, resource: ResourceId, usable: bool) {
        if let Some(status) = self.state().resources.get_mut(&resource) {
            status.usable = usable;
        }
    }

    /// Makes every future read of this slot fail with a transport error.
    pub fn poison_slot(&self, topic: Topic, owner: OwnerId, index: FeedIndex) {
        self.state().poisoned.insert((topic, owner, index.get()));
    }

    /// Replaces a stored blob with bytes that will not decode.
    pub fn corrupt_blob(&self, reference: Reference) {
        self.state().blobs.insert(reference, b"\xff\xfe garbage".to_vec());
    }

    /// Drops a stored blob, leaving any feed slots that reference it dangling.
    pub fn remove_blob(&self, reference: Reference) {
        self.state().blobs.remove(&reference);
    }

    /// Number of feed probes served so far.
    pub fn feed_reads(&self) -> u64 {
        self.inner.feed_reads.load(Ordering::Relaxed)
    }
}

impl FeedClient for MemoryClient {
    fn feed_read(
        &self,
        topic: Topic,
        owner: OwnerId,
        index: FeedIndex,
    ) -> Result<Option<Reference>> {
        self.inner.feed_reads.fetch_add(1, Ordering::Relaxed);
        let state = self.state();
        let key = (topic, owner, index.get());
        if state.poisoned.contains(&key) {
            return Err(Error::Transport(format!(
                "injected fault reading slot {index} of {topic}"
            )));
        }
        Ok(state.feeds.get(&key).copied())
    }

    fn feed_write(
        &self,
        topic: Topic,
        signer: OwnerId,
        index: FeedIndex,
        payload: Reference,
    ) -> Result<()> {
        let mut state = self.state();
        let key = (topic, signer, index.get());
        if state.feeds.contains_key(&key) {
            return Err(Error::SlotOccupied { index: index.get() });
        }
        state.feeds.insert(key, payload);
        Ok(())
    }
}

impl BlobClient for MemoryClient {
    fn blob_upload(&self, payload: &[u8]) -> Result<Reference> {
        let reference = Reference(*blake3::hash(payload).as_bytes());
        self.state().blobs.insert(reference, payload.to_vec());
        Ok(reference)
    }

    fn blob_download(&self, reference: Reference) -> Result<Option<Vec<u8>>> {
        Ok(self.state().blobs.get(&reference).cloned())
    }
}

impl ResourceClient for MemoryClient {
    fn resource_status(&self, resource: ResourceId) -> Result<Option<ResourceStatus>> {
        Ok(self.state().resources.get(&resource).copied())
    }

    fn resource_dilute(&self, resource: ResourceId) -> Result<()> {
        let mut state = self.state();
        let Some(status) = state.resources.get_mut(&resource) else {
            return Err(Error::ResourceNotFound(resource));
        };
        status.usable = false;
        status.remaining_bytes = 0;
        Ok(())
    }
}
