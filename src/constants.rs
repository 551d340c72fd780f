// This file is part of Moraine.
//
// Copyright (C) 2025 Moraine Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

/// Namespace prefix mixed into every topic hash.
///
/// Keeps this crate's feeds disjoint from anything else published under the
/// same owner identity.
pub const TOPIC_NAMESPACE: &str = "moraine/v1:";

/// Default hard ceiling on sequential probes during a version scan.
pub const DEFAULT_SCAN_CEILING: u64 = 4096;

/// Access-control wrapping overhead applied on publish, in percent.
///
/// Empirical default, not a protocol guarantee. Tunable via
/// [`CapacityConfig`](crate::capacity::CapacityConfig).
pub const ACT_OVERHEAD_PERCENT: u64 = 20;

/// Safety margin applied on top of the full capacity estimate, in percent.
pub const SAFETY_MARGIN_PERCENT: u64 = 15;

/// Encoded size of the reference pair published with every list update.
pub const WRAPPED_REFERENCE_BYTES: u64 = 64; // two 32-byte content addresses
/// Encoded size of one feed-index value.
pub const FEED_INDEX_BYTES: u64 = 8;
/// Width of one topic address.
pub const TOPIC_BYTES: u64 = 32;

/// Reserved logical path of the per-owner drive list feed.
pub const DRIVE_INDEX_PATH: &str = "meta:drive-index";
/// Reserved logical path prefix of per-drive file list feeds.
pub const FILE_INDEX_PREFIX: &str = "meta:file-index";

pub const FEEDS_DB_NAME: &str = "feeds";
pub const BLOBS_DB_NAME: &str = "blobs";
pub const RESOURCES_DB_NAME: &str = "resources";
pub const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024; // 1 GB
pub const DEFAULT_MAX_DBS: u32 = 3;
