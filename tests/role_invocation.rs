//! Role invocation via the `protocolRole` signature-payload property, for a
//! `$contextRole`-marked rule set (C6 steps 5/6).

mod common;

use dwn_node::provider::MessageStore;
use dwn_node::records::Authorizer;
use dwn_node::store::Entry;
use dwn_node::{Context, Error};
use test_support::{MemoryStore, TestSigner, fixture};

#[tokio::test]
async fn role_holder_may_invoke_it_but_others_are_rejected() {
    let alice = TestSigner::new("did:example:alice");
    let dave = TestSigner::new("did:example:dave");
    let carol = TestSigner::new("did:example:carol");
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

    // Dave is installed as the thread's moderator, a context-scoped role.
    let moderator = fixture::write(
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
    store.put(&owner, &Entry::Write(moderator.clone())).await.unwrap();

    let authorizer = Authorizer::new(common::PROTOCOL_URI);
    let ctx = Context::new(&owner, dave.did());

    // Dave, the role holder, invokes it to post an announcement nested under
    // his own moderator role record.
    let announcement = fixture::write(
        &dave,
        fixture::WriteOptions {
            data: b"maintenance window".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some(common::PROTOCOL_URI.to_string()),
            protocol_path: Some("thread/moderator/announcement".to_string()),
            parent_id: Some(moderator.record_id.clone()),
            parent_context_id: moderator.context_id.clone(),
            protocol_role: Some("thread/moderator".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    authorizer.permit_write(&ctx, common::now(), &announcement, &store).await.unwrap();

    // Carol holds no role record for this thread; invoking the same role
    // resolves no matching role record.
    let carol_ctx = Context::new(&owner, carol.did());
    let forged = fixture::write(
        &carol,
        fixture::WriteOptions {
            data: b"not really a moderator".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some(common::PROTOCOL_URI.to_string()),
            protocol_path: Some("thread/moderator/announcement".to_string()),
            parent_id: Some(moderator.record_id.clone()),
            parent_context_id: moderator.context_id.clone(),
            protocol_role: Some("thread/moderator".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let err =
        authorizer.permit_write(&carol_ctx, common::now(), &forged, &store).await.unwrap_err();
    assert!(matches!(err, Error::MissingRole(_)));
}
