use moraine::client::ResourceClient;
use moraine::drive::{DriveManager, EntryStatus};
use moraine::error::Error;
use moraine::storage::memory::MemoryClient;
use moraine::types::{OwnerId, ResourceId};
use moraine::version::Operation;

const ADMIN: &str = "admin-resource";
const WORKSPACE: &str = "workspace-resource";

fn setup() -> Result<(MemoryClient, DriveManager<MemoryClient>), Box<dyn std::error::Error>> {
    let client = MemoryClient::new();
    client.register_resource(ResourceId::derive(ADMIN), 1_000_000);
    client.register_resource(ResourceId::derive(WORKSPACE), 1_000_000);
    let manager = DriveManager::open(
        client.clone(),
        OwnerId::derive("alice"),
        ResourceId::derive(ADMIN),
    )?;
    Ok((client, manager))
}

#[test]
fn test_report_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let (_client, mut manager) = setup()?;
    manager.create_drive("workspace", ResourceId::derive(WORKSPACE))?;

    // Create, then modify twice.
    let v0 = manager.write_file("workspace", "docs/report.txt", b"draft")?;
    let v1 = manager.write_file("workspace", "docs/report.txt", b"draft, revised")?;
    let v2 = manager.write_file("workspace", "docs/report.txt", b"final")?;
    assert_eq!(v0.get(), 0);
    assert_eq!(v1.get(), 1);
    assert_eq!(v2.get(), 2);

    let info = manager.file_version_info("workspace", "docs/report.txt")?;
    assert_eq!(info.current_version, 2);
    assert_eq!(info.total_versions, 3);
    assert!(!info.truncated);

    assert_eq!(
        manager.download_version("workspace", "docs/report.txt", None)?,
        b"final"
    );
    assert_eq!(
        manager.download_version("workspace", "docs/report.txt", Some(1))?,
        b"draft, revised"
    );

    let history = manager.file_history("workspace", "docs/report.txt")?;
    let operations: Vec<Operation> = history.iter().map(|m| m.operation).collect();
    assert_eq!(
        operations,
        vec![Operation::Create, Operation::Modify, Operation::Modify]
    );
    for (i, entry) in history.iter().enumerate() {
        assert_eq!(entry.version, i as u64);
    }
    Ok(())
}

#[test]
fn test_drive_creation_rules() -> Result<(), Box<dyn std::error::Error>> {
    let (_client, mut manager) = setup()?;

    manager.create_drive("workspace", ResourceId::derive(WORKSPACE))?;
    assert!(manager.drive("workspace").is_some());
    assert_eq!(manager.drives().count(), 1);

    let duplicate = manager.create_drive("workspace", ResourceId::derive(WORKSPACE));
    assert!(matches!(duplicate, Err(Error::DriveExists(_))));

    for bad in ["", "a/b", "a\\b", "meta:drive-index"] {
        let result = manager.create_drive(bad, ResourceId::derive(WORKSPACE));
        assert!(matches!(result, Err(Error::InvalidName(_))), "{bad:?}");
    }

    let unknown = manager.create_drive("second", ResourceId::derive("never-registered"));
    assert!(matches!(unknown, Err(Error::ResourceNotFound(_))));
    Ok(())
}

#[test]
fn test_trashed_drive_blocks_writes_not_reads() -> Result<(), Box<dyn std::error::Error>> {
    let (_client, mut manager) = setup()?;
    manager.create_drive("workspace", ResourceId::derive(WORKSPACE))?;
    manager.write_file("workspace", "a.txt", b"hello")?;

    manager.trash_drive("workspace")?;
    assert_eq!(
        manager.drive("workspace").map(|d| d.status),
        Some(EntryStatus::Trashed)
    );

    let write = manager.write_file("workspace", "a.txt", b"blocked");
    assert!(matches!(write, Err(Error::DriveTrashed(_))));

    // Reads keep working while trashed.
    assert_eq!(manager.download_version("workspace", "a.txt", None)?, b"hello");
    assert_eq!(manager.file_history("workspace", "a.txt")?.len(), 1);

    manager.recover_drive("workspace")?;
    manager.write_file("workspace", "a.txt", b"unblocked")?;
    assert_eq!(
        manager.download_version("workspace", "a.txt", None)?,
        b"unblocked"
    );
    Ok(())
}

#[test]
fn test_forget_drive_leaves_feeds_behind() -> Result<(), Box<dyn std::error::Error>> {
    let (_client, mut manager) = setup()?;
    manager.create_drive("workspace", ResourceId::derive(WORKSPACE))?;
    manager.write_file("workspace", "kept.txt", b"v0")?;
    manager.write_file("workspace", "kept.txt", b"v1")?;

    manager.forget_drive("workspace")?;
    assert!(manager.drive("workspace").is_none());
    let write = manager.write_file("workspace", "kept.txt", b"v2");
    assert!(matches!(write, Err(Error::DriveNotFound(_))));

    // Re-listing the drive finds the old version feeds untouched.
    manager.create_drive("workspace", ResourceId::derive(WORKSPACE))?;
    let info = manager.file_version_info("workspace", "kept.txt")?;
    assert_eq!(info.total_versions, 2);
    Ok(())
}

#[test]
fn test_destroy_drive_dilutes_the_resource() -> Result<(), Box<dyn std::error::Error>> {
    let (client, mut manager) = setup()?;
    let resource = ResourceId::derive(WORKSPACE);
    manager.create_drive("workspace", resource)?;
    manager.write_file("workspace", "a.txt", b"data")?;

    manager.destroy_drive("workspace")?;
    assert!(manager.drive("workspace").is_none());

    let status = client.resource_status(resource)?.expect("status should exist");
    assert!(!status.usable);

    // A diluted resource can never back a new drive.
    let reuse = manager.create_drive("reborn", resource);
    assert!(matches!(reuse, Err(Error::ResourceUnusable(_))));
    Ok(())
}

#[test]
fn test_trash_file_publishes_delete_marker() -> Result<(), Box<dyn std::error::Error>> {
    let (_client, mut manager) = setup()?;
    manager.create_drive("workspace", ResourceId::derive(WORKSPACE))?;
    manager.write_file("workspace", "doc.txt", b"v0")?;
    manager.write_file("workspace", "doc.txt", b"v1")?;

    let marker = manager.trash_file("workspace", "doc.txt")?;
    assert_eq!(marker.get(), 2);

    let entry = manager.file("workspace", "doc.txt")?.expect("entry should remain listed");
    assert_eq!(entry.status, EntryStatus::Trashed);
    assert!(entry.content.is_zero());
    assert_eq!(entry.size, 0);

    // The head is now a delete marker; older versions stay reachable.
    let head = manager.download_version("workspace", "doc.txt", None);
    assert!(matches!(head, Err(Error::FileNotFound { .. })));
    assert_eq!(manager.download_version("workspace", "doc.txt", Some(1))?, b"v1");

    let history = manager.file_history("workspace", "doc.txt")?;
    assert_eq!(history.len(), 3);
    assert_eq!(history.latest().map(|m| m.operation), Some(Operation::Delete));

    // Trashing twice is a no-op returning the existing marker.
    assert_eq!(manager.trash_file("workspace", "doc.txt")?.get(), 2);
    Ok(())
}

#[test]
fn test_recover_file_republishes_last_content() -> Result<(), Box<dyn std::error::Error>> {
    let (_client, mut manager) = setup()?;
    manager.create_drive("workspace", ResourceId::derive(WORKSPACE))?;
    manager.write_file("workspace", "doc.txt", b"v0")?;
    manager.write_file("workspace", "doc.txt", b"v1")?;
    manager.trash_file("workspace", "doc.txt")?;

    let recovered = manager.recover_file("workspace", "doc.txt")?;
    assert_eq!(recovered.get(), 3);

    let entry = manager.file("workspace", "doc.txt")?.expect("entry should exist");
    assert_eq!(entry.status, EntryStatus::Active);
    assert_eq!(manager.download_version("workspace", "doc.txt", None)?, b"v1");

    // History keeps the full story including the delete marker.
    let operations: Vec<Operation> = manager
        .file_history("workspace", "doc.txt")?
        .iter()
        .map(|m| m.operation)
        .collect();
    assert_eq!(
        operations,
        vec![
            Operation::Create,
            Operation::Modify,
            Operation::Delete,
            Operation::Modify,
        ]
    );

    // Recovering an active file is a no-op.
    assert_eq!(manager.recover_file("workspace", "doc.txt")?.get(), 3);
    Ok(())
}

#[test]
fn test_restore_version_copies_forward() -> Result<(), Box<dyn std::error::Error>> {
    let (_client, mut manager) = setup()?;
    manager.create_drive("workspace", ResourceId::derive(WORKSPACE))?;
    manager.write_file("workspace", "doc.txt", b"v0")?;
    manager.write_file("workspace", "doc.txt", b"v1")?;
    manager.write_file("workspace", "doc.txt", b"v2")?;

    let restored = manager.restore_version("workspace", "doc.txt", 0)?;
    assert_eq!(restored.get(), 3);

    // The feed never rewinds; the old payload becomes the new head.
    let info = manager.file_version_info("workspace", "doc.txt")?;
    assert_eq!(info.current_version, 3);
    assert_eq!(info.total_versions, 4);
    assert_eq!(manager.download_version("workspace", "doc.txt", None)?, b"v0");

    let missing = manager.restore_version("workspace", "doc.txt", 42);
    assert!(matches!(missing, Err(Error::VersionNotFound { version: 42, .. })));
    Ok(())
}

#[test]
fn test_restoring_a_delete_marker_retrashes() -> Result<(), Box<dyn std::error::Error>> {
    let (_client, mut manager) = setup()?;
    manager.create_drive("workspace", ResourceId::derive(WORKSPACE))?;
    manager.write_file("workspace", "doc.txt", b"v0")?;
    let marker = manager.trash_file("workspace", "doc.txt")?;
    manager.recover_file("workspace", "doc.txt")?;

    manager.restore_version("workspace", "doc.txt", marker.get())?;
    let entry = manager.file("workspace", "doc.txt")?.expect("entry should exist");
    assert_eq!(entry.status, EntryStatus::Trashed);
    Ok(())
}

#[test]
fn test_forget_file_drops_listing_only() -> Result<(), Box<dyn std::error::Error>> {
    let (_client, mut manager) = setup()?;
    manager.create_drive("workspace", ResourceId::derive(WORKSPACE))?;
    manager.write_file("workspace", "a.txt", b"a")?;
    manager.write_file("workspace", "b.txt", b"b")?;

    manager.forget_file("workspace", "a.txt")?;
    let paths: Vec<String> = manager
        .files("workspace")?
        .into_iter()
        .map(|e| e.path)
        .collect();
    assert_eq!(paths, vec!["b.txt".to_string()]);

    // The version feed survives the unlisting.
    let info = manager.file_version_info("workspace", "a.txt")?;
    assert_eq!(info.total_versions, 1);

    let again = manager.forget_file("workspace", "a.txt");
    assert!(matches!(again, Err(Error::FileNotFound { .. })));
    Ok(())
}

#[test]
fn test_capacity_gate_runs_before_any_write() -> Result<(), Box<dyn std::error::Error>> {
    let client = MemoryClient::new();
    client.register_resource(ResourceId::derive(ADMIN), 1_000_000);
    // Enough to exist, nowhere near enough for a file list write.
    client.register_resource(ResourceId::derive("starved"), 50);

    let mut manager = DriveManager::open(
        client.clone(),
        OwnerId::derive("alice"),
        ResourceId::derive(ADMIN),
    )?;
    manager.create_drive("tiny", ResourceId::derive("starved"))?;

    match manager.write_file("tiny", "doc.txt", b"payload") {
        Err(Error::CapacityExceeded { required, available }) => {
            assert!(required > available);
            assert_eq!(available, 50);
        }
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }

    // The gate fired before anything was published.
    assert!(manager.files("tiny")?.is_empty());
    let info = manager.file_version_info("tiny", "doc.txt");
    assert!(matches!(info, Err(Error::FileNotFound { .. })));
    Ok(())
}

#[test]
fn test_projection_reloads_from_feeds() -> Result<(), Box<dyn std::error::Error>> {
    let (client, mut manager) = setup()?;
    manager.create_drive("workspace", ResourceId::derive(WORKSPACE))?;
    manager.write_file("workspace", "docs/report.txt", b"persisted")?;
    manager.trash_drive("workspace")?;
    drop(manager);

    // A new manager over the same client rebuilds state from the lists.
    let mut reopened = DriveManager::open(
        client.clone(),
        OwnerId::derive("alice"),
        ResourceId::derive(ADMIN),
    )?;
    let drive = reopened.drive("workspace").expect("drive should reload");
    assert_eq!(drive.status, EntryStatus::Trashed);
    reopened.recover_drive("workspace")?;

    let entry = reopened
        .file("workspace", "docs/report.txt")?
        .expect("file should reload");
    assert_eq!(entry.current_version, 0);
    assert_eq!(entry.size, 9);
    assert_eq!(
        reopened.download_version("workspace", "docs/report.txt", None)?,
        b"persisted"
    );
    Ok(())
}

#[test]
fn test_owners_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
    let client = MemoryClient::new();
    client.register_resource(ResourceId::derive(ADMIN), 1_000_000);
    client.register_resource(ResourceId::derive(WORKSPACE), 1_000_000);

    let mut alice = DriveManager::open(
        client.clone(),
        OwnerId::derive("alice"),
        ResourceId::derive(ADMIN),
    )?;
    let mut bella = DriveManager::open(
        client.clone(),
        OwnerId::derive("bella"),
        ResourceId::derive(ADMIN),
    )?;

    alice.create_drive("workspace", ResourceId::derive(WORKSPACE))?;
    alice.write_file("workspace", "secret.txt", b"alice only")?;

    // Same topics, different owner, disjoint feeds.
    assert_eq!(bella.drives().count(), 0);
    bella.create_drive("workspace", ResourceId::derive(WORKSPACE))?;
    let info = bella.file_version_info("workspace", "secret.txt");
    assert!(matches!(info, Err(Error::FileNotFound { .. })));
    Ok(())
}

#[test]
fn test_backslash_paths_normalize() -> Result<(), Box<dyn std::error::Error>> {
    let (_client, mut manager) = setup()?;
    manager.create_drive("workspace", ResourceId::derive(WORKSPACE))?;

    manager.write_file("workspace", "docs\\report.txt", b"v0")?;
    // Same file under either separator style.
    assert_eq!(
        manager.download_version("workspace", "docs/report.txt", None)?,
        b"v0"
    );
    let info = manager.file_version_info("workspace", "docs\\report.txt")?;
    assert_eq!(info.total_versions, 1);
    Ok(())
}
