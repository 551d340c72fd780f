#![no_main]

// This file is part of Moraine.
//
// Copyright (C) 2025 Moraine Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.
use libfuzzer_sys::fuzz_target;
use moraine::version::VersionMetadata;

fuzz_target!(|data: &[u8]| {
    // Decoding hostile bytes MUST NOT panic/crash.
    let Ok(metadata) = VersionMetadata::decode(data) else {
        return;
    };

    // Anything that decodes must survive a round trip.
    let encoded = metadata.encode().expect("decoded metadata must re-encode");
    let again = VersionMetadata::decode(&encoded).expect("re-encoded metadata must decode");
    assert_eq!(again, metadata);
});
