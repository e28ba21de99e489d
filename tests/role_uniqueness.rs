//! Role-record uniqueness (SPEC_FULL.md §8 invariant 7): a recipient may
//! hold at most one `isLatestBaseState` role record at a given role path
//! within a context.

mod common;

use dwn_node::provider::MessageStore;
use dwn_node::records::Authorizer;
use dwn_node::store::Entry;
use dwn_node::Error;
use test_support::{MemoryStore, TestSigner, fixture};

#[tokio::test]
async fn second_role_record_for_the_same_recipient_is_rejected() {
    let alice = TestSigner::new("did:example:alice");
    let dave = TestSigner::new("did:example:dave");
    let store = MemoryStore::new();
    let owner = alice.did().to_string();

    let configure = fixture::configure(&alice, common::social_definition()).await.unwrap();
    store.put(&owner, &Entry::Configure(configure)).await.unwrap();

    let thread = fixture::write(
        &alice,
        fixture::WriteOptions {
            data: b"hello".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some(common::PROTOCOL_URI.to_string()),
            protocol_path: Some("thread".to_string()),
            recipient: Some(alice.did().to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    store.put(&owner, &Entry::Write(thread.clone())).await.unwrap();

    let first = fixture::write(
        &alice,
        fixture::WriteOptions {
            data: b"moderator".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some(common::PROTOCOL_URI.to_string()),
            protocol_path: Some("thread/moderator".to_string()),
            parent_id: Some(thread.record_id.clone()),
            parent_context_id: thread.context_id.clone(),
            recipient: Some(dave.did().to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let authorizer = Authorizer::new(common::PROTOCOL_URI);
    authorizer.verify_integrity(&owner, &first, &store).await.unwrap();
    store.put(&owner, &Entry::Write(first.clone())).await.unwrap();

    // A second, distinct moderator record naming Dave again within the same
    // thread: Dave already holds a role there.
    let second = fixture::write(
        &alice,
        fixture::WriteOptions {
            data: b"moderator again".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some(common::PROTOCOL_URI.to_string()),
            protocol_path: Some("thread/moderator".to_string()),
            parent_id: Some(thread.record_id.clone()),
            parent_context_id: thread.context_id.clone(),
            recipient: Some(dave.did().to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let err = authorizer.verify_integrity(&owner, &second, &store).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateRoleRecipientContext(_)));
}
