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
use tracing::debug;

use crate::capacity::{check_capacity, CapacityConfig};
use crate::client::StorageClient;
use crate::constants;
use crate::error::{Error, Result};
use crate::history::VersionHistory;
use crate::topic::derive_topic;
use crate::types::{FeedIndex, OwnerId, Reference, ResourceId};
use crate::version::{Operation, VersionConfig, VersionMetadata, VersionStore};

/// Lifecycle state of a drive or file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Active,
    Trashed,
}

/// One drive in the owner's drive list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveEntry {
    pub name: String,
    pub resource: ResourceId,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
}

/// One file in a drive's file list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    pub content: Reference,
    pub size: u64,
    pub current_version: u64,
    pub status: EntryStatus,
    pub modified_at: DateTime<Utc>,
}

/// Version summary for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileVersionInfo {
    pub current_version: u64,
    pub total_versions: u64,
    /// True when the scan hit its ceiling; both figures are lower bounds.
    pub truncated: bool,
}

/// Client-side projection of one owner's drives and files.
///
/// Drives live in a list persisted on the owner's reserved drive-index feed;
/// each drive's files live in a list on that drive's file-index feed; every
/// file's content history is its own version feed. Every mutating operation
/// asks the capacity estimator first and fails with
/// [`Error::CapacityExceeded`] before any write goes out.
///
/// Mutations take `&mut self`, which structurally keeps at most one write in
/// flight per feed. The admin resource funds the drive list and is an
/// explicit constructor parameter, never process-global state.
pub struct DriveManager<C> {
    versions: VersionStore<C>,
    owner: OwnerId,
    admin_resource: ResourceId,
    capacity: CapacityConfig,
    drives: BTreeMap<String, DriveEntry>,
    // File lists load lazily, one map per drive.
    files: BTreeMap<String, BTreeMap<String, FileEntry>>,
}

impl<C: StorageClient> DriveManager<C> {
    /// Opens the manager and loads the owner's drive list from its feed.
    pub fn open(client: C, owner: OwnerId, admin_resource: ResourceId) -> Result<Self> {
        Self::with_config(
            client,
            owner,
            admin_resource,
            VersionConfig::default(),
            CapacityConfig::default(),
        )
    }

    pub fn with_config(
        client: C,
        owner: OwnerId,
        admin_resource: ResourceId,
        version_config: VersionConfig,
        capacity: CapacityConfig,
    ) -> Result<Self> {
        let mut manager = Self {
            versions: VersionStore::with_config(client, version_config),
            owner,
            admin_resource,
            capacity,
            drives: BTreeMap::new(),
            files: BTreeMap::new(),
        };
        let entries: Vec<DriveEntry> = manager
            .load_list(constants::DRIVE_INDEX_PATH)?
            .unwrap_or_default();
        manager.drives = entries.into_iter().map(|e| (e.name.clone(), e)).collect();
        Ok(manager)
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn client(&self) -> &C {
        self.versions.client()
    }

    /// Drives in the current projection, name-ordered.
    pub fn drives(&self) -> impl Iterator<Item = &DriveEntry> {
        self.drives.values()
    }

    pub fn drive(&self, name: &str) -> Option<&DriveEntry> {
        self.drives.get(name)
    }

    /// Files currently projected for `drive`, path-ordered. Loads the file
    /// list on first access.
    pub fn files(&mut self, drive: &str) -> Result<Vec<FileEntry>> {
        if !self.drives.contains_key(drive) {
            return Err(Error::DriveNotFound(drive.to_string()));
        }
        self.ensure_files_loaded(drive)?;
        Ok(self
            .files
            .get(drive)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    pub fn file(&mut self, drive: &str, path: &str) -> Result<Option<FileEntry>> {
        let path = normalize_path(path)?;
        if !self.drives.contains_key(drive) {
            return Err(Error::DriveNotFound(drive.to_string()));
        }
        self.ensure_files_loaded(drive)?;
        Ok(self
            .files
            .get(drive)
            .and_then(|m| m.get(&path))
            .cloned())
    }

    // =========================================================================
    // Drive operations
    // =========================================================================

    /// Creates a drive backed by `resource` and persists the updated drive
    /// list. The resource must exist and be usable.
    pub fn create_drive(&mut self, name: &str, resource: ResourceId) -> Result<()> {
        validate_drive_name(name)?;
        if self.drives.contains_key(name) {
            return Err(Error::DriveExists(name.to_string()));
        }
        match self.client().resource_status(resource)? {
            None => return Err(Error::ResourceNotFound(resource)),
            Some(status) if !status.usable => return Err(Error::ResourceUnusable(resource)),
            Some(_) => {}
        }

        let current = self.drive_entries();
        self.require_capacity(self.admin_resource, &current, current.len() + 1)?;

        let entry = DriveEntry {
            name: name.to_string(),
            resource,
            status: EntryStatus::Active,
            created_at: Utc::now(),
        };
        let mut updated = current;
        updated.push(entry.clone());
        self.persist_list(constants::DRIVE_INDEX_PATH, self.admin_resource, &updated)?;
        self.drives.insert(entry.name.clone(), entry);
        Ok(())
    }

    /// Marks a drive trashed. Its feeds and resource are untouched; only the
    /// status flag changes, persisted through the drive list.
    pub fn trash_drive(&mut self, name: &str) -> Result<()> {
        self.set_drive_status(name, EntryStatus::Trashed)
    }

    /// Returns a trashed drive to active service.
    pub fn recover_drive(&mut self, name: &str) -> Result<()> {
        self.set_drive_status(name, EntryStatus::Active)
    }

    /// Removes a drive from the list without touching its storage. Version
    /// feeds written under the drive stay on the network; only the projection
    /// entry goes away.
    pub fn forget_drive(&mut self, name: &str) -> Result<()> {
        if !self.drives.contains_key(name) {
            return Err(Error::DriveNotFound(name.to_string()));
        }
        let current = self.drive_entries();
        self.require_capacity(self.admin_resource, &current, current.len().saturating_sub(1))?;

        let updated: Vec<DriveEntry> = current.into_iter().filter(|e| e.name != name).collect();
        self.persist_list(constants::DRIVE_INDEX_PATH, self.admin_resource, &updated)?;
        self.drives.remove(name);
        self.files.remove(name);
        Ok(())
    }

    /// Administratively dilutes the drive's backing resource, then forgets
    /// the drive. Irreversible, and never reachable from normal file
    /// mutation paths.
    pub fn destroy_drive(&mut self, name: &str) -> Result<()> {
        let resource = self
            .drives
            .get(name)
            .ok_or_else(|| Error::DriveNotFound(name.to_string()))?
            .resource;
        self.client().resource_dilute(resource)?;
        self.forget_drive(name)
    }

    fn set_drive_status(&mut self, name: &str, status: EntryStatus) -> Result<()> {
        let entry = self
            .drives
            .get(name)
            .ok_or_else(|| Error::DriveNotFound(name.to_string()))?;
        if entry.status == status {
            return Ok(());
        }
        let current = self.drive_entries();
        self.require_capacity(self.admin_resource, &current, current.len())?;

        let mut updated = current;
        if let Some(e) = updated.iter_mut().find(|e| e.name == name) {
            e.status = status;
        }
        self.persist_list(constants::DRIVE_INDEX_PATH, self.admin_resource, &updated)?;
        if let Some(e) = self.drives.get_mut(name) {
            e.status = status;
        }
        Ok(())
    }

    // =========================================================================
    // File operations
    // =========================================================================

    /// Writes a new version of `path` inside `drive` and returns its index.
    ///
    /// The first version of a path is a `Create`, later ones are `Modify`.
    /// Both the drive's resource (against the file list) and the admin
    /// resource (against the drive list) are gated before anything uploads.
    pub fn write_file(&mut self, drive: &str, path: &str, content: &[u8]) -> Result<FeedIndex> {
        let path = normalize_path(path)?;
        let drive_entry = self.active_drive(drive)?.clone();
        self.ensure_files_loaded(drive)?;

        let current = self.file_entries(drive);
        let exists = current.iter().any(|e| e.path == path);
        let target = if exists {
            current.len()
        } else {
            current.len() + 1
        };
        self.require_capacity(drive_entry.resource, &current, target)?;
        let drive_list = self.drive_entries();
        self.require_capacity(self.admin_resource, &drive_list, drive_list.len())?;

        let content_ref = self.client().blob_upload(content)?;
        let operation = if exists {
            Operation::Modify
        } else {
            Operation::Create
        };
        let logical = file_topic_path(drive, &path);
        let metadata = VersionMetadata::new(
            logical.clone(),
            content_ref,
            content.len() as u64,
            operation,
            drive_entry.resource,
        );
        let index = self
            .versions
            .write_version(derive_topic(&logical), self.owner, metadata)?;

        let entry = FileEntry {
            path: path.clone(),
            content: content_ref,
            size: content.len() as u64,
            current_version: index.get(),
            status: EntryStatus::Active,
            modified_at: Utc::now(),
        };
        self.commit_file_entry(drive, &drive_entry, entry)?;
        Ok(index)
    }

    /// Soft-deletes a file: publishes a `Delete` version carrying the zero
    /// reference and flips the projected status to trashed. The feed keeps
    /// every older version.
    pub fn trash_file(&mut self, drive: &str, path: &str) -> Result<FeedIndex> {
        let path = normalize_path(path)?;
        let drive_entry = self.active_drive(drive)?.clone();
        self.ensure_files_loaded(drive)?;

        let Some(existing) = self.files.get(drive).and_then(|m| m.get(&path)).cloned() else {
            return Err(Error::FileNotFound {
                drive: drive.to_string(),
                path,
            });
        };
        if existing.status == EntryStatus::Trashed {
            return FeedIndex::new(existing.current_version);
        }

        let current = self.file_entries(drive);
        self.require_capacity(drive_entry.resource, &current, current.len())?;
        let drive_list = self.drive_entries();
        self.require_capacity(self.admin_resource, &drive_list, drive_list.len())?;

        let logical = file_topic_path(drive, &path);
        let metadata = VersionMetadata::new(
            logical.clone(),
            Reference::ZERO,
            0,
            Operation::Delete,
            drive_entry.resource,
        );
        let index = self
            .versions
            .write_version(derive_topic(&logical), self.owner, metadata)?;

        let entry = FileEntry {
            path: path.clone(),
            content: Reference::ZERO,
            size: 0,
            current_version: index.get(),
            status: EntryStatus::Trashed,
            modified_at: Utc::now(),
        };
        self.commit_file_entry(drive, &drive_entry, entry)?;
        Ok(index)
    }

    /// Restores a trashed file by re-publishing its latest non-delete
    /// version as the new head. No-op for a file that is already active.
    pub fn recover_file(&mut self, drive: &str, path: &str) -> Result<FeedIndex> {
        let path = normalize_path(path)?;
        let drive_entry = self.active_drive(drive)?.clone();
        self.ensure_files_loaded(drive)?;

        let Some(existing) = self.files.get(drive).and_then(|m| m.get(&path)).cloned() else {
            return Err(Error::FileNotFound {
                drive: drive.to_string(),
                path,
            });
        };
        if existing.status == EntryStatus::Active {
            return FeedIndex::new(existing.current_version);
        }

        let logical = file_topic_path(drive, &path);
        let history = self.versions.history(derive_topic(&logical), self.owner)?;
        let Some(source) = history
            .iter()
            .rev()
            .find(|m| m.operation != Operation::Delete)
            .cloned()
        else {
            return Err(Error::FileNotFound {
                drive: drive.to_string(),
                path,
            });
        };
        self.publish_copy(drive, &drive_entry, &path, source)
    }

    /// Re-publishes version `version` of a file as the new head.
    ///
    /// The payload is copied: content reference, size, operation kind, and
    /// custom metadata travel verbatim while the writer stamps a fresh index
    /// and timestamp. The feed is never rewound. The projected status follows
    /// the restored operation kind, so restoring a delete marker re-trashes
    /// the file.
    pub fn restore_version(&mut self, drive: &str, path: &str, version: u64) -> Result<FeedIndex> {
        let path = normalize_path(path)?;
        let drive_entry = self.active_drive(drive)?.clone();
        self.ensure_files_loaded(drive)?;

        let logical = file_topic_path(drive, &path);
        let index = FeedIndex::new(version)?;
        let Some(source) =
            self.versions
                .read_version(derive_topic(&logical), self.owner, Some(index))?
        else {
            return Err(Error::VersionNotFound { path, version });
        };
        self.publish_copy(drive, &drive_entry, &path, source)
    }

    /// Drops `path` from the drive's file list without touching its feed.
    pub fn forget_file(&mut self, drive: &str, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let drive_entry = self.active_drive(drive)?.clone();
        self.ensure_files_loaded(drive)?;

        if !self.files.get(drive).is_some_and(|m| m.contains_key(&path)) {
            return Err(Error::FileNotFound {
                drive: drive.to_string(),
                path,
            });
        }

        let current = self.file_entries(drive);
        self.require_capacity(
            drive_entry.resource,
            &current,
            current.len().saturating_sub(1),
        )?;
        let drive_list = self.drive_entries();
        self.require_capacity(self.admin_resource, &drive_list, drive_list.len())?;

        let updated: Vec<FileEntry> = current.into_iter().filter(|e| e.path != path).collect();
        self.persist_list(
            &file_list_path(drive),
            drive_entry.resource,
            &updated,
        )?;
        if let Some(map) = self.files.get_mut(drive) {
            map.remove(&path);
        }
        Ok(())
    }

    // =========================================================================
    // File reads
    // =========================================================================

    /// Downloads the content bytes of a specific version, or of the head
    /// when `version` is `None`.
    pub fn download_version(
        &self,
        drive: &str,
        path: &str,
        version: Option<u64>,
    ) -> Result<Vec<u8>> {
        let path = normalize_path(path)?;
        if !self.drives.contains_key(drive) {
            return Err(Error::DriveNotFound(drive.to_string()));
        }

        let logical = file_topic_path(drive, &path);
        let index = version.map(FeedIndex::new).transpose()?;
        let metadata = match self
            .versions
            .read_version(derive_topic(&logical), self.owner, index)?
        {
            Some(metadata) => metadata,
            None => {
                return Err(match version {
                    Some(version) => Error::VersionNotFound { path, version },
                    None => Error::FileNotFound {
                        drive: drive.to_string(),
                        path,
                    },
                })
            }
        };
        if metadata.operation == Operation::Delete || metadata.content.is_zero() {
            return Err(Error::FileNotFound {
                drive: drive.to_string(),
                path,
            });
        }

        let Some(bytes) = self.client().blob_download(metadata.content)? else {
            return Err(Error::CorruptMetadata {
                context: format!("version {} of {logical}", metadata.version),
                reason: format!("content blob {} is missing", metadata.content),
            });
        };
        Ok(bytes)
    }

    /// Reports the head version and total count for a file, straight from a
    /// feed scan.
    pub fn file_version_info(&self, drive: &str, path: &str) -> Result<FileVersionInfo> {
        let path = normalize_path(path)?;
        if !self.drives.contains_key(drive) {
            return Err(Error::DriveNotFound(drive.to_string()));
        }

        let logical = file_topic_path(drive, &path);
        let count = self
            .versions
            .count_versions(derive_topic(&logical), self.owner)?;
        let Some(latest) = count.latest() else {
            return Err(Error::FileNotFound {
                drive: drive.to_string(),
                path,
            });
        };
        Ok(FileVersionInfo {
            current_version: latest.get(),
            total_versions: count.total(),
            truncated: count.is_truncated(),
        })
    }

    /// Full ascending version history for a file.
    pub fn file_history(&self, drive: &str, path: &str) -> Result<VersionHistory> {
        let path = normalize_path(path)?;
        if !self.drives.contains_key(drive) {
            return Err(Error::DriveNotFound(drive.to_string()));
        }
        let logical = file_topic_path(drive, &path);
        self.versions.history(derive_topic(&logical), self.owner)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn active_drive(&self, drive: &str) -> Result<&DriveEntry> {
        let entry = self
            .drives
            .get(drive)
            .ok_or_else(|| Error::DriveNotFound(drive.to_string()))?;
        if entry.status == EntryStatus::Trashed {
            return Err(Error::DriveTrashed(drive.to_string()));
        }
        Ok(entry)
    }

    fn drive_entries(&self) -> Vec<DriveEntry> {
        self.drives.values().cloned().collect()
    }

    fn file_entries(&self, drive: &str) -> Vec<FileEntry> {
        self.files
            .get(drive)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    fn ensure_files_loaded(&mut self, drive: &str) -> Result<()> {
        if self.files.contains_key(drive) {
            return Ok(());
        }
        let entries: Vec<FileEntry> = self.load_list(&file_list_path(drive))?.unwrap_or_default();
        let map = entries.into_iter().map(|e| (e.path.clone(), e)).collect();
        self.files.insert(drive.to_string(), map);
        Ok(())
    }

    /// Publishes a copy of `source` as the file's new head and reprojects
    /// the entry from the copied operation kind.
    fn publish_copy(
        &mut self,
        drive: &str,
        drive_entry: &DriveEntry,
        path: &str,
        source: VersionMetadata,
    ) -> Result<FeedIndex> {
        let current = self.file_entries(drive);
        let exists = current.iter().any(|e| e.path == path);
        let target = if exists {
            current.len()
        } else {
            current.len() + 1
        };
        self.require_capacity(drive_entry.resource, &current, target)?;
        let drive_list = self.drive_entries();
        self.require_capacity(self.admin_resource, &drive_list, drive_list.len())?;

        let logical = file_topic_path(drive, path);
        let status = match source.operation {
            Operation::Delete => EntryStatus::Trashed,
            Operation::Create | Operation::Modify => EntryStatus::Active,
        };
        let entry = FileEntry {
            path: path.to_string(),
            content: source.content,
            size: source.size,
            current_version: 0, // stamped below
            status,
            modified_at: Utc::now(),
        };

        let index = self
            .versions
            .write_version(derive_topic(&logical), self.owner, source)?;
        let entry = FileEntry {
            current_version: index.get(),
            ..entry
        };
        self.commit_file_entry(drive, drive_entry, entry)?;
        Ok(index)
    }

    /// Persists the drive's file list with `entry` upserted, then updates
    /// the in-memory projection.
    fn commit_file_entry(
        &mut self,
        drive: &str,
        drive_entry: &DriveEntry,
        entry: FileEntry,
    ) -> Result<()> {
        let mut updated: Vec<FileEntry> = self
            .file_entries(drive)
            .into_iter()
            .filter(|e| e.path != entry.path)
            .collect();
        updated.push(entry.clone());
        self.persist_list(&file_list_path(drive), drive_entry.resource, &updated)?;
        self.files
            .entry(drive.to_string())
            .or_default()
            .insert(entry.path.clone(), entry);
        Ok(())
    }

    fn require_capacity<T: Serialize>(
        &self,
        resource: ResourceId,
        list: &[T],
        target_count: usize,
    ) -> Result<()> {
        let check = check_capacity(self.client(), resource, list, target_count, &self.capacity)?;
        if !check.can_create {
            debug!(
                %resource,
                required = check.required_bytes,
                available = check.available_bytes,
                message = check.message.as_deref().unwrap_or(""),
                "capacity gate rejected mutation"
            );
            return Err(Error::CapacityExceeded {
                required: check.required_bytes,
                available: check.available_bytes,
            });
        }
        Ok(())
    }

    fn load_list<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Option<Vec<T>>> {
        let Some(metadata) = self
            .versions
            .read_version(derive_topic(path), self.owner, None)?
        else {
            return Ok(None);
        };
        if metadata.content.is_zero() {
            return Ok(None);
        }
        let Some(bytes) = self.client().blob_download(metadata.content)? else {
            return Err(Error::CorruptMetadata {
                context: format!("list {path}"),
                reason: format!("payload blob {} is missing", metadata.content),
            });
        };
        let entries = serde_json::from_slice(&bytes).map_err(|e| Error::CorruptMetadata {
            context: format!("list {path}"),
            reason: e.to_string(),
        })?;
        Ok(Some(entries))
    }

    /// Uploads the encoded list and publishes a version pointing at it on
    /// the list's own feed.
    fn persist_list<T: Serialize>(
        &mut self,
        path: &str,
        resource: ResourceId,
        entries: &[T],
    ) -> Result<FeedIndex> {
        let bytes =
            serde_json::to_vec(entries).map_err(|e| Error::Serialization(e.to_string()))?;
        let content = self.client().blob_upload(&bytes)?;
        let metadata = VersionMetadata::new(
            path,
            content,
            bytes.len() as u64,
            Operation::Modify,
            resource,
        );
        self.versions
            .write_version(derive_topic(path), self.owner, metadata)
    }
}

fn file_list_path(drive: &str) -> String {
    format!("{}/{}", constants::FILE_INDEX_PREFIX, drive)
}

fn file_topic_path(drive: &str, path: &str) -> String {
    format!("{drive}/{path}")
}

/// Drive names may not contain separators or `:`; that keeps user drives out
/// of the reserved `meta:` namespace and file topics collision-free.
fn validate_drive_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName("drive name must not be empty".to_string()));
    }
    if name.contains(['/', '\\', ':']) {
        return Err(Error::InvalidName(format!(
            "drive name {name:?} contains a reserved character"
        )));
    }
    Ok(())
}

fn normalize_path(path: &str) -> Result<String> {
    let normalized = path.replace('\\', "/");
    if normalized.is_empty() {
        return Err(Error::InvalidName("file path must not be empty".to_string()));
    }
    Ok(normalized)
}
