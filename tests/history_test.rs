use moraine::client::{BlobClient, FeedClient};
use moraine::storage::memory::MemoryClient;
use moraine::topic::derive_topic;
use moraine::types::{FeedIndex, OwnerId, ResourceId, Topic};
use moraine::version::{Operation, VersionConfig, VersionMetadata, VersionStore};

fn write_chain(
    client: &MemoryClient,
    store: &mut VersionStore<MemoryClient>,
    topic: Topic,
    owner: OwnerId,
    payloads: &[&[u8]],
) -> Result<(), Box<dyn std::error::Error>> {
    for (i, payload) in payloads.iter().enumerate() {
        let content = client.blob_upload(payload)?;
        let operation = if i == 0 { Operation::Create } else { Operation::Modify };
        store.write_version(
            topic,
            owner,
            VersionMetadata::new(
                "notes.txt",
                content,
                payload.len() as u64,
                operation,
                ResourceId::derive("history-resource"),
            ),
        )?;
    }
    Ok(())
}

#[test]
fn test_history_is_complete_and_ascending() -> Result<(), Box<dyn std::error::Error>> {
    let client = MemoryClient::new();
    let mut store = VersionStore::new(client.clone());
    let topic = derive_topic("notes.txt");
    let owner = OwnerId::derive("alice");

    write_chain(&client, &mut store, topic, owner, &[b"a", b"bb", b"ccc"])?;

    let history = store.history(topic, owner)?;
    assert_eq!(history.len(), 3);
    assert!(!history.is_truncated());
    for (i, entry) in history.iter().enumerate() {
        assert_eq!(entry.version, i as u64);
    }
    assert_eq!(history.latest().map(|m| m.size), Some(3));
    Ok(())
}

#[test]
fn test_history_of_empty_feed_is_empty() -> Result<(), Box<dyn std::error::Error>> {
    let client = MemoryClient::new();
    let store = VersionStore::new(client);
    let topic = derive_topic("never/written");
    let owner = OwnerId::derive("alice");

    let history = store.history(topic, owner)?;
    assert!(history.is_empty());
    assert!(!history.is_truncated());
    assert!(history.latest().is_none());
    Ok(())
}

#[test]
fn test_history_skips_unreadable_slot() -> Result<(), Box<dyn std::error::Error>> {
    let client = MemoryClient::new();
    let mut store = VersionStore::new(client.clone());
    let topic = derive_topic("notes.txt");
    let owner = OwnerId::derive("alice");

    write_chain(
        &client,
        &mut store,
        topic,
        owner,
        &[b"v0", b"v1", b"v2", b"v3", b"v4"],
    )?;
    let blob = client
        .feed_read(topic, owner, FeedIndex::new(2)?)?
        .expect("slot 2 should be populated");
    client.remove_blob(blob);

    // The failed slot is dropped; everything else still arrives in order.
    let history = store.history(topic, owner)?;
    let versions: Vec<u64> = history.iter().map(|m| m.version).collect();
    assert_eq!(versions, vec![0, 1, 3, 4]);
    Ok(())
}

#[test]
fn test_transport_failure_aborts_the_scan() -> Result<(), Box<dyn std::error::Error>> {
    let client = MemoryClient::new();
    let mut store = VersionStore::new(client.clone());
    let topic = derive_topic("notes.txt");
    let owner = OwnerId::derive("alice");

    write_chain(&client, &mut store, topic, owner, &[b"v0", b"v1", b"v2"])?;
    client.poison_slot(topic, owner, FeedIndex::new(1)?);

    // A transport failure is never folded into "end of history".
    assert!(matches!(
        store.count_versions(topic, owner),
        Err(moraine::Error::Transport(_))
    ));
    assert!(matches!(
        store.history(topic, owner),
        Err(moraine::Error::Transport(_))
    ));
    Ok(())
}

#[test]
fn test_history_skips_slot_with_corrupt_metadata() -> Result<(), Box<dyn std::error::Error>> {
    let client = MemoryClient::new();
    let mut store = VersionStore::new(client.clone());
    let topic = derive_topic("notes.txt");
    let owner = OwnerId::derive("alice");

    write_chain(&client, &mut store, topic, owner, &[b"v0", b"v1", b"v2"])?;
    let blob = client
        .feed_read(topic, owner, FeedIndex::new(1)?)?
        .expect("slot 1 should be populated");
    client.corrupt_blob(blob);

    let history = store.history(topic, owner)?;
    let versions: Vec<u64> = history.iter().map(|m| m.version).collect();
    assert_eq!(versions, vec![0, 2]);
    Ok(())
}

#[test]
fn test_history_reports_truncation() -> Result<(), Box<dyn std::error::Error>> {
    let client = MemoryClient::new();
    let mut store = VersionStore::with_config(client.clone(), VersionConfig { scan_ceiling: 2 });
    let topic = derive_topic("notes.txt");
    let owner = OwnerId::derive("alice");

    write_chain(&client, &mut store, topic, owner, &[b"v0", b"v1", b"v2"])?;

    let history = store.history(topic, owner)?;
    assert_eq!(history.len(), 3);
    assert!(history.is_truncated());
    Ok(())
}

#[test]
fn test_history_iterates_owned_and_borrowed() -> Result<(), Box<dyn std::error::Error>> {
    let client = MemoryClient::new();
    let mut store = VersionStore::new(client.clone());
    let topic = derive_topic("notes.txt");
    let owner = OwnerId::derive("alice");

    write_chain(&client, &mut store, topic, owner, &[b"v0", b"v1"])?;

    let history = store.history(topic, owner)?;
    let borrowed: Vec<u64> = (&history).into_iter().map(|m| m.version).collect();
    let owned: Vec<u64> = history.into_iter().map(|m| m.version).collect();
    assert_eq!(borrowed, owned);
    Ok(())
}
