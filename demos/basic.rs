// This file is part of Moraine.
//
// Copyright (C) 2025 Moraine Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use moraine::drive::DriveManager;
use moraine::storage::memory::MemoryClient;
use moraine::types::{OwnerId, ResourceId};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = MemoryClient::new();
    let admin = ResourceId::derive("admin");
    let workspace = ResourceId::derive("workspace");
    client.register_resource(admin, 1_000_000);
    client.register_resource(workspace, 1_000_000);

    let mut manager = DriveManager::open(client, OwnerId::derive("alice"), admin)?;

    // Create a drive and write a file three times
    manager.create_drive("workspace", workspace)?;
    manager.write_file("workspace", "docs/report.txt", b"draft")?;
    manager.write_file("workspace", "docs/report.txt", b"draft, revised")?;
    manager.write_file("workspace", "docs/report.txt", b"final")?;

    let info = manager.file_version_info("workspace", "docs/report.txt")?;
    println!(
        "docs/report.txt is at version {} of {}",
        info.current_version, info.total_versions
    );

    // Any version stays reachable
    let old = manager.download_version("workspace", "docs/report.txt", Some(1))?;
    println!("version 1 said: {}", String::from_utf8_lossy(&old));

    // Walk the full history
    for entry in manager.file_history("workspace", "docs/report.txt")?.iter() {
        println!(
            "  v{} {:?} {} bytes at {}",
            entry.version, entry.operation, entry.size, entry.timestamp
        );
    }

    // Trash appends a delete marker; recovery republishes the old payload
    manager.trash_file("workspace", "docs/report.txt")?;
    println!("trashed; head is now a delete marker");
    manager.recover_file("workspace", "docs/report.txt")?;
    let head = manager.download_version("workspace", "docs/report.txt", None)?;
    println!("recovered; head says: {}", String::from_utf8_lossy(&head));

    Ok(())
}
