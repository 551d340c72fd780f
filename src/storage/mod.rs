pub mod memory;

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, PutFlags, RoTxn, WithTls};

use crate::client::{BlobClient, FeedClient, ResourceClient, ResourceStatus};
use crate::constants;
use crate::error::{Error, Result};
use crate::types::{FeedIndex, OwnerId, Reference, ResourceId, Topic};

// Type Aliases for readability
pub type FeedsDb = Database<Bytes, Bytes>;
pub type BlobsDb = Database<Bytes, Bytes>;
pub type ResourcesDb = Database<Bytes, Bytes>;

/// usable flag (1) + remaining (8) + capacity (8)
const RESOURCE_RECORD_LEN: usize = 17;

/// Packed key addressing one feed slot: topic, owner, big-endian index.
pub struct FeedSlotKey {
    pub topic: Topic,
    pub owner: OwnerId,
    pub index: FeedIndex,
}

impl FeedSlotKey {
    pub fn new(topic: Topic, owner: OwnerId, index: FeedIndex) -> Self {
        Self {
            topic,
            owner,
            index,
        }
    }

    pub fn to_be_bytes(&self) -> [u8; 60] {
        let mut buf = [0u8; 60];
        buf[0..32].copy_from_slice(self.topic.as_bytes());
        buf[32..52].copy_from_slice(self.owner.as_bytes());
        buf[52..60].copy_from_slice(&self.index.get().to_be_bytes());
        buf
    }
}

/// Configuration for opening a local store environment.
#[derive(Clone)]
pub struct LocalStoreConfig {
    pub path: PathBuf,
    pub map_size: usize,
    pub max_dbs: u32,
    pub create_dir: bool,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("moraine.mdb"),
            map_size: constants::DEFAULT_MAP_SIZE,
            max_dbs: constants::DEFAULT_MAX_DBS,
            create_dir: true,
        }
    }
}

/// Persistent storage client backed by LMDB.
///
/// Feeds are write-once per slot (enforced with `NO_OVERWRITE`), blobs are
/// BLAKE3 content addressed with idempotent upload, and resources are
/// fixed-width accounting records. An optional funding resource is debited
/// per upload inside the same transaction, so capacity runs dry atomically.
///
/// Clones share the same environment.
#[derive(Clone)]
pub struct LocalStore {
    env: Env,
    feeds: FeedsDb,
    blobs: BlobsDb,
    resources: ResourcesDb,
    funding: Arc<RwLock<Option<ResourceId>>>,
}

impl LocalStore {
    pub fn open(config: LocalStoreConfig) -> Result<Self> {
        if config.create_dir {
            std::fs::create_dir_all(&config.path)?;
        }

        let env = unsafe {
            EnvOpenOptions::new()
                .read_txn_with_tls()
                .map_size(config.map_size)
                .max_dbs(config.max_dbs)
                .open(&config.path)?
        };

        let mut wtxn = env.write_txn()?;
        let feeds = env.create_database(&mut wtxn, Some(constants::FEEDS_DB_NAME))?;
        let blobs = env.create_database(&mut wtxn, Some(constants::BLOBS_DB_NAME))?;
        let resources = env.create_database(&mut wtxn, Some(constants::RESOURCES_DB_NAME))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            feeds,
            blobs,
            resources,
            funding: Arc::new(RwLock::new(None)),
        })
    }

    /// Registers (or resets) a resource with the given capacity.
    pub fn register_resource(&self, resource: ResourceId, capacity_bytes: u64) -> Result<()> {
        let status = ResourceStatus {
            usable: true,
            remaining_bytes: capacity_bytes,
        };
        let record = pack_resource(&status, capacity_bytes);
        let mut wtxn = self.env.write_txn()?;
        self.resources
            .put(&mut wtxn, resource.as_bytes().as_slice(), record.as_slice())?;
        wtxn.commit()?;
        Ok(())
    }

    /// Selects the resource debited by future uploads, or disables debiting.
    pub fn set_funding(&self, funding: Option<ResourceId>) {
        *self.funding.write().unwrap_or_else(PoisonError::into_inner) = funding;
    }

    /// Reads a blob without copying; the bytes stay borrowed from the read
    /// transaction held inside the returned guard.
    pub fn blob_borrow(&self, reference: Reference) -> Result<BlobGetResult<'_>> {
        let result = BlobGetResultTryBuilder {
            guard: self.env.read_txn()?,
            data_builder: |guard| self.blobs.get(guard, reference.as_bytes().as_slice()),
        };
        Ok(result.try_build()?)
    }

    fn debit_funding(&self, wtxn: &mut heed::RwTxn<'_>, amount: u64) -> Result<()> {
        let Some(resource) = *self.funding.read().unwrap_or_else(PoisonError::into_inner) else {
            return Ok(());
        };
        let Some(bytes) = self
            .resources
            .get(wtxn, resource.as_bytes().as_slice())?
        else {
            return Err(Error::ResourceNotFound(resource));
        };
        let (mut status, capacity) = unpack_resource(bytes)?;
        if !status.usable {
            return Err(Error::ResourceUnusable(resource));
        }
        if status.remaining_bytes < amount {
            return Err(Error::ResourceExhausted {
                resource,
                required: amount,
                remaining: status.remaining_bytes,
            });
        }
        status.remaining_bytes -= amount;
        let record = pack_resource(&status, capacity);
        self.resources
            .put(wtxn, resource.as_bytes().as_slice(), record.as_slice())?;
        Ok(())
    }
}

#[ouroboros::self_referencing]
pub struct BlobGetResult<'a> {
    pub guard: RoTxn<'a, WithTls>,
    #[borrows(mut guard)]
    #[covariant]
    pub data: Option<&'this [u8]>,
}

impl BlobGetResult<'_> {
    /// The borrowed bytes, if the blob exists.
    pub fn bytes(&self) -> Option<&[u8]> {
        *self.borrow_data()
    }
}

impl FeedClient for LocalStore {
    fn feed_read(
        &self,
        topic: Topic,
        owner: OwnerId,
        index: FeedIndex,
    ) -> Result<Option<Reference>> {
        let rtxn = self.env.read_txn()?;
        let key = FeedSlotKey::new(topic, owner, index).to_be_bytes();
        let Some(bytes) = self.feeds.get(&rtxn, key.as_slice())? else {
            return Ok(None);
        };
        let payload: [u8; 32] = bytes.try_into().map_err(|_| Error::CorruptMetadata {
            context: format!("feed slot {index} of {topic}"),
            reason: format!("expected a 32-byte reference, got {} bytes", bytes.len()),
        })?;
        Ok(Some(Reference(payload)))
    }

    fn feed_write(
        &self,
        topic: Topic,
        signer: OwnerId,
        index: FeedIndex,
        payload: Reference,
    ) -> Result<()> {
        let key = FeedSlotKey::new(topic, signer, index).to_be_bytes();
        let mut wtxn = self.env.write_txn()?;
        match self.feeds.put_with_flags(
            &mut wtxn,
            PutFlags::NO_OVERWRITE,
            key.as_slice(),
            payload.as_bytes().as_slice(),
        ) {
            Ok(_) => {}
            Err(heed::Error::Mdb(heed::MdbError::KeyExist)) => {
                return Err(Error::SlotOccupied {
                    index: index.get(),
                });
            }
            Err(e) => return Err(e.into()),
        }
        wtxn.commit()?;
        Ok(())
    }
}

impl BlobClient for LocalStore {
    fn blob_upload(&self, payload: &[u8]) -> Result<Reference> {
        let reference = Reference(*blake3::hash(payload).as_bytes());
        let mut wtxn = self.env.write_txn()?;
        if self
            .blobs
            .get(&wtxn, reference.as_bytes().as_slice())?
            .is_some()
        {
            // Already stored: a re-upload is free, and the txn aborts on drop.
            return Ok(reference);
        }
        self.debit_funding(&mut wtxn, payload.len() as u64)?;
        self.blobs
            .put(&mut wtxn, reference.as_bytes().as_slice(), payload)?;
        wtxn.commit()?;
        Ok(reference)
    }

    fn blob_download(&self, reference: Reference) -> Result<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn()?;
        let bytes = self.blobs.get(&rtxn, reference.as_bytes().as_slice())?;
        Ok(bytes.map(<[u8]>::to_vec))
    }
}

impl ResourceClient for LocalStore {
    fn resource_status(&self, resource: ResourceId) -> Result<Option<ResourceStatus>> {
        let rtxn = self.env.read_txn()?;
        let Some(bytes) = self
            .resources
            .get(&rtxn, resource.as_bytes().as_slice())?
        else {
            return Ok(None);
        };
        let (status, _capacity) = unpack_resource(bytes)?;
        Ok(Some(status))
    }

    fn resource_dilute(&self, resource: ResourceId) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        let Some(bytes) = self
            .resources
            .get(&wtxn, resource.as_bytes().as_slice())?
        else {
            return Err(Error::ResourceNotFound(resource));
        };
        let (mut status, capacity) = unpack_resource(bytes)?;
        status.usable = false;
        status.remaining_bytes = 0;
        let record = pack_resource(&status, capacity);
        self.resources
            .put(&mut wtxn, resource.as_bytes().as_slice(), record.as_slice())?;
        wtxn.commit()?;
        Ok(())
    }
}

fn pack_resource(status: &ResourceStatus, capacity: u64) -> [u8; RESOURCE_RECORD_LEN] {
    let mut record = [0u8; RESOURCE_RECORD_LEN];
    record[0] = status.usable as u8;
    record[1..9].copy_from_slice(&status.remaining_bytes.to_be_bytes());
    record[9..17].copy_from_slice(&capacity.to_be_bytes());
    record
}

fn unpack_resource(bytes: &[u8]) -> Result<(ResourceStatus, u64)> {
    if bytes.len() != RESOURCE_RECORD_LEN {
        return Err(Error::CorruptMetadata {
            context: "resource record".to_string(),
            reason: format!("expected {RESOURCE_RECORD_LEN} bytes, got {}", bytes.len()),
        });
    }
    let usable = bytes[0] == 1;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[1..9]);
    let remaining_bytes = u64::from_be_bytes(buf);
    buf.copy_from_slice(&bytes[9..17]);
    let capacity = u64::from_be_bytes(buf);
    Ok((
        ResourceStatus {
            usable,
            remaining_bytes,
        },
        capacity,
    ))
}
