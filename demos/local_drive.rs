// This file is part of Moraine.
//
// Copyright (C) 2025 Moraine Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use moraine::drive::DriveManager;
use moraine::storage::{LocalStore, LocalStoreConfig};
use moraine::types::{OwnerId, ResourceId};
use tempfile::tempdir;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = LocalStoreConfig {
        path: dir.path().join("local_drive.mdb"),
        ..Default::default()
    };
    let admin = ResourceId::derive("admin");
    let vault = ResourceId::derive("vault");
    let owner = OwnerId::derive("alice");

    // First session: create a drive and publish two versions
    {
        let store = LocalStore::open(config.clone())?;
        store.register_resource(admin, 1_000_000)?;
        store.register_resource(vault, 1_000_000)?;
        store.set_funding(Some(vault));

        let mut manager = DriveManager::open(store, owner, admin)?;
        manager.create_drive("vault", vault)?;
        manager.write_file("vault", "ledger.csv", b"date,amount\n")?;
        manager.write_file("vault", "ledger.csv", b"date,amount\n2026-01-02,42\n")?;
        println!("wrote two versions of vault/ledger.csv");
    }

    // Second session: everything reloads from disk
    {
        let store = LocalStore::open(config)?;
        let manager = DriveManager::open(store, owner, admin)?;
        let info = manager.file_version_info("vault", "ledger.csv")?;
        println!(
            "after reopen: version {} of {}",
            info.current_version, info.total_versions
        );
        let head = manager.download_version("vault", "ledger.csv", None)?;
        println!("head content:\n{}", String::from_utf8_lossy(&head));
    }

    Ok(())
}
