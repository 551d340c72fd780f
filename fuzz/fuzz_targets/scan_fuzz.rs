#![no_main]

// This file is part of Moraine.
//
// Copyright (C) 2025 Moraine Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use moraine::client::{BlobClient, FeedClient};
use moraine::storage::memory::MemoryClient;
use moraine::topic::derive_topic;
use moraine::types::{FeedIndex, OwnerId, ResourceId};
use moraine::version::{Operation, VersionConfig, VersionMetadata, VersionStore};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    // Slot indices to populate, possibly sparse, possibly colliding.
    slots: Vec<u8>,
    ceiling: u8,
    payload: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let client = MemoryClient::new();
    let topic = derive_topic("fuzz/scan");
    let owner = OwnerId::derive("fuzz-owner");

    for slot in &input.slots {
        let slot = u64::from(*slot % 16);
        let Ok(index) = FeedIndex::new(slot) else {
            continue;
        };
        let mut metadata = VersionMetadata::new(
            "fuzz/scan",
            moraine::types::Reference([1u8; 32]),
            input.payload.len() as u64,
            Operation::Modify,
            ResourceId::derive("fuzz-resource"),
        );
        metadata.version = slot;
        let Ok(encoded) = metadata.encode() else {
            continue;
        };
        let Ok(blob) = client.blob_upload(&encoded) else {
            continue;
        };
        // Collisions with earlier writes are expected; ignore them.
        let _ = client.feed_write(topic, owner, index, blob);
    }

    let ceiling = u64::from(input.ceiling % 32) + 1;
    let store = VersionStore::with_config(client, VersionConfig { scan_ceiling: ceiling });

    // Scans and reads over arbitrary feed shapes MUST NOT panic/crash.
    let count = store.count_versions(topic, owner).expect("scan never fails");
    let history = store.history(topic, owner).expect("assembly never fails");

    assert!(history.len() as u64 <= count.total());
    let mut last = None;
    for entry in history.iter() {
        if let Some(previous) = last {
            assert!(entry.version > previous, "history must ascend");
        }
        last = Some(entry.version);
    }
});
