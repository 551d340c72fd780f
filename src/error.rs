// This file is part of Moraine.
//
// Copyright (C) 2025 Moraine Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::types::ResourceId;

/// Custom error type for moraine operations.
///
/// "Not found" conditions are deliberately absent: an unwritten feed slot or
/// a missing blob is `Ok(None)` at the client boundary, never an error.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred (e.g., file system issues).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// LMDB storage error (via `heed`).
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),

    /// Network or protocol failure reported by the storage client.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A feed slot was already occupied at publish time (lost write race).
    #[error("Feed slot {index} is already occupied")]
    SlotOccupied { index: u64 },

    /// Feed index would exceed the maximum safely representable value.
    #[error("Feed index overflow beyond {max}", max = crate::types::FeedIndex::MAX)]
    IndexOverflow,

    /// A version scan stopped at its probe ceiling without finding the end
    /// of the feed; the true history length is unknown.
    #[error("Version scan stopped at probe ceiling (highest index probed: {probed})")]
    ScanCeiling { probed: u64 },

    /// A fetched blob could not be resolved to valid version metadata.
    #[error("Corrupt metadata in {context}: {reason}")]
    CorruptMetadata { context: String, reason: String },

    /// The capacity estimator rejected a mutation before any write.
    #[error("Capacity exceeded: {required} bytes required, {available} available")]
    CapacityExceeded { required: u64, available: u64 },

    /// Storage resource does not exist.
    #[error("Resource {0} not found")]
    ResourceNotFound(ResourceId),

    /// Storage resource exists but is not in a usable state.
    #[error("Resource {0} is not usable")]
    ResourceUnusable(ResourceId),

    /// Storage resource has too little remaining capacity for a write.
    #[error("Resource {resource} exhausted: {required} bytes required, {remaining} remaining")]
    ResourceExhausted {
        resource: ResourceId,
        required: u64,
        remaining: u64,
    },

    /// Drive not found.
    #[error("Drive not found: {0}")]
    DriveNotFound(String),

    /// Drive already exists.
    #[error("Drive already exists: {0}")]
    DriveExists(String),

    /// Drive is trashed and rejects mutations until recovered.
    #[error("Drive is trashed: {0}")]
    DriveTrashed(String),

    /// File not found in the drive's file list.
    #[error("File not found in drive {drive}: {path}")]
    FileNotFound { drive: String, path: String },

    /// Requested version does not exist for the file.
    #[error("Version {version} not found for {path}")]
    VersionNotFound { path: String, version: u64 },

    /// Invalid drive name or file path.
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
