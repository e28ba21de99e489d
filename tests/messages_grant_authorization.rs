//! Messages-interface grant authorization (C7 §4.7): the target a grant is
//! checked against is resolved to a protocol before comparing it to the
//! grant's own scope — directly from a `RecordsWrite`/`RecordsDelete`'s
//! `descriptor.protocol`, or (one level of recursion) through the scope of
//! a permissions-protocol grant record when the target is itself one.

mod common;

use dwn_node::permissions::{GrantBuilder, Scope, authorize_messages, fetch_grant};
use dwn_node::provider::MessageStore;
use dwn_node::store::Entry;
use dwn_node::{Context, Error, Method};
use test_support::{MemoryStore, TestSigner, fixture};

async fn messages_grant(
    owner: &str, alice: &TestSigner, bob: &TestSigner, store: &MemoryStore, protocol: Option<&str>,
) -> dwn_node::permissions::Grant {
    let grant_data = GrantBuilder::new()
        .granted_for(owner)
        .date_expires("2035-01-01T00:00:00.000000Z")
        .scope(Scope::Messages { method: Method::Read, protocol: protocol.map(str::to_string) })
        .build()
        .unwrap();
    let grant_write = fixture::grant(alice, bob.did(), &grant_data).await.unwrap();
    store.put(owner, &Entry::Write(grant_write.clone())).await.unwrap();
    fetch_grant(owner, &grant_write.record_id, store).await.unwrap()
}

#[tokio::test]
async fn messages_grant_resolves_a_records_write_target() {
    let alice = TestSigner::new("did:example:alice");
    let bob = TestSigner::new("did:example:bob");
    let store = MemoryStore::new();
    let owner = alice.did().to_string();

    let configure = fixture::configure(&alice, common::social_definition()).await.unwrap();
    store.put(&owner, &Entry::Configure(configure)).await.unwrap();

    let post = fixture::write(
        &alice,
        fixture::WriteOptions {
            data: b"hello".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some(common::PROTOCOL_URI.to_string()),
            protocol_path: Some("thread".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    store.put(&owner, &Entry::Write(post.clone())).await.unwrap();

    let grant = messages_grant(&owner, &alice, &bob, &store, Some(common::PROTOCOL_URI)).await;
    let ctx = Context::new(&owner, bob.did());
    authorize_messages(&ctx, &grant, common::now(), Method::Read, &Entry::Write(post), &store)
        .await
        .unwrap();
}

#[tokio::test]
async fn messages_grant_rejects_a_target_outside_its_scoped_protocol() {
    let alice = TestSigner::new("did:example:alice");
    let bob = TestSigner::new("did:example:bob");
    let store = MemoryStore::new();
    let owner = alice.did().to_string();

    let post = fixture::write(
        &alice,
        fixture::WriteOptions {
            data: b"hello".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some("https://example.com/other".to_string()),
            protocol_path: Some("root".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    store.put(&owner, &Entry::Write(post.clone())).await.unwrap();

    let grant = messages_grant(&owner, &alice, &bob, &store, Some(common::PROTOCOL_URI)).await;
    let ctx = Context::new(&owner, bob.did());
    let err =
        authorize_messages(&ctx, &grant, common::now(), Method::Read, &Entry::Write(post), &store)
            .await
            .unwrap_err();
    assert!(matches!(err, Error::GrantScopeMismatch(_)));
}

#[tokio::test]
async fn messages_grant_recurses_through_a_permissions_protocol_target() {
    let alice = TestSigner::new("did:example:alice");
    let bob = TestSigner::new("did:example:bob");
    let carol = TestSigner::new("did:example:carol");
    let store = MemoryStore::new();
    let owner = alice.did().to_string();

    // An inner grant delegating Records access to the social protocol —
    // this is the target being resolved, not the grant invoked.
    let inner_grant_data = GrantBuilder::new()
        .granted_for(&owner)
        .date_expires("2035-01-01T00:00:00.000000Z")
        .scope(Scope::Records {
            method: Method::Write,
            protocol: common::PROTOCOL_URI.to_string(),
            options: None,
        })
        .build()
        .unwrap();
    let inner_grant = fixture::grant(&alice, carol.did(), &inner_grant_data).await.unwrap();
    store.put(&owner, &Entry::Write(inner_grant.clone())).await.unwrap();

    let grant = messages_grant(&owner, &alice, &bob, &store, Some(common::PROTOCOL_URI)).await;
    let ctx = Context::new(&owner, bob.did());
    authorize_messages(
        &ctx,
        &grant,
        common::now(),
        Method::Read,
        &Entry::Write(inner_grant),
        &store,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn messages_grant_resolves_a_records_delete_target_via_the_store() {
    let alice = TestSigner::new("did:example:alice");
    let bob = TestSigner::new("did:example:bob");
    let store = MemoryStore::new();
    let owner = alice.did().to_string();

    let configure = fixture::configure(&alice, common::social_definition()).await.unwrap();
    store.put(&owner, &Entry::Configure(configure)).await.unwrap();

    let post = fixture::write(
        &alice,
        fixture::WriteOptions {
            data: b"hello".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some(common::PROTOCOL_URI.to_string()),
            protocol_path: Some("thread".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    store.put(&owner, &Entry::Write(post.clone())).await.unwrap();
    let delete = fixture::delete(&alice, &post, false).await.unwrap();

    let grant = messages_grant(&owner, &alice, &bob, &store, Some(common::PROTOCOL_URI)).await;
    let ctx = Context::new(&owner, bob.did());
    authorize_messages(&ctx, &grant, common::now(), Method::Read, &Entry::Delete(delete), &store)
        .await
        .unwrap();
}
