//! Newest-message arbitration (C8), §8 invariant 4: two writes for the same
//! record that share a `messageTimestamp` are broken on the CID of their
//! full descriptor, not just the three fields common to every message.

use std::cmp::Ordering;

use dwn_node::provider::MessageStore;
use dwn_node::records::RecordsFilter;
use dwn_node::store::Entry;
use test_support::{MemoryStore, TestSigner, fixture};

#[tokio::test]
async fn same_timestamp_race_is_broken_on_the_full_descriptor_cid() {
    let alice = TestSigner::new("did:example:alice");
    let store = MemoryStore::new();
    let owner = alice.did().to_string();

    let first = fixture::write(
        &alice,
        fixture::WriteOptions {
            data: b"version one".to_vec(),
            data_format: "text/plain".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // Same record, same timestamp, different content — the race this
    // tiebreak exists to resolve.
    let mut second = fixture::write(
        &alice,
        fixture::WriteOptions {
            data: b"version two".to_vec(),
            data_format: "text/plain".to_string(),
            message_timestamp: Some(first.descriptor.base.message_timestamp.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    second.record_id = first.record_id.clone();

    let first_cid = dwn_node::cid::compute(&first.descriptor).unwrap();
    let second_cid = dwn_node::cid::compute(&second.descriptor).unwrap();
    assert_ne!(first_cid, second_cid, "the two writes must actually differ in full descriptor");

    store.put(&owner, &Entry::Write(first.clone())).await.unwrap();
    store.put(&owner, &Entry::Write(second.clone())).await.unwrap();

    let filter = RecordsFilter::new().record_id(&first.record_id).is_latest_base_state(true);
    let matched = store.find(&owner, filter).await.unwrap();
    assert_eq!(matched.len(), 1, "only the tiebreak winner should remain");

    let winner = matched[0].as_write().unwrap();
    let expected_data_cid = if first_cid.cmp(&second_cid) == Ordering::Greater {
        &first.descriptor.data_cid
    } else {
        &second.descriptor.data_cid
    };
    assert_eq!(&winner.descriptor.data_cid, expected_data_cid);
}
