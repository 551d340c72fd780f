// This file is part of Moraine.
//
// Copyright (C) 2025 Moraine Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use crate::constants::TOPIC_NAMESPACE;
use crate::types::Topic;

/// Derives the feed topic for a logical path.
///
/// Backslash separators are normalized to forward slashes first, so the same
/// logical file maps to the same topic regardless of the caller's path style.
/// The namespace prefix is hashed together with the normalized path, keeping
/// these feeds disjoint from other applications writing under the same owner.
///
/// Pure, total, and deterministic.
pub fn derive_topic(logical_path: &str) -> Topic {
    let normalized = logical_path.replace('\\', "/");
    let mut hasher = blake3::Hasher::new();
    hasher.update(TOPIC_NAMESPACE.as_bytes());
    hasher.update(normalized.as_bytes());
    Topic(*hasher.finalize().as_bytes())
}
