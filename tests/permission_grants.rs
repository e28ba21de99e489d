//! Permission-grant authorization (C7): scope mismatches, a grant accepted
//! in scope that bypasses the protocol's own `$actions` rules, and a
//! revoked grant.

mod common;

use dwn_node::permissions::{GrantBuilder, RecordsOptions, Scope};
use dwn_node::provider::MessageStore;
use dwn_node::records::Authorizer;
use dwn_node::store::Entry;
use dwn_node::{Context, Error, Method};
use test_support::{MemoryStore, TestSigner, fixture};

#[tokio::test]
async fn grant_scoped_to_wrong_interface_is_rejected() {
    let alice = TestSigner::new("did:example:alice");
    let bob = TestSigner::new("did:example:bob");
    let store = MemoryStore::new();
    let owner = alice.did().to_string();

    let configure = fixture::configure(&alice, common::social_definition()).await.unwrap();
    store.put(&owner, &Entry::Configure(configure)).await.unwrap();

    let grant_data = GrantBuilder::new()
        .granted_for(&owner)
        .date_expires("2035-01-01T00:00:00.000000Z")
        .scope(Scope::Messages { method: Method::Write, protocol: None })
        .build()
        .unwrap();
    let grant = fixture::grant(&alice, bob.did(), &grant_data).await.unwrap();
    store.put(&owner, &Entry::Write(grant.clone())).await.unwrap();

    // `thread` is open to anyone anyway, so route the grant through a
    // rule-gated leaf to force the grant path to actually decide.
    let announcement = fixture::write(
        &bob,
        fixture::WriteOptions {
            data: b"breaking news".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some(common::PROTOCOL_URI.to_string()),
            protocol_path: Some("thread/moderator/announcement".to_string()),
            permission_grant_id: Some(grant.record_id.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let authorizer = Authorizer::new(common::PROTOCOL_URI);
    let ctx = Context::new(&owner, bob.did());
    let err =
        authorizer.permit_write(&ctx, common::now(), &announcement, &store).await.unwrap_err();
    assert!(matches!(err, Error::GrantInterfaceMismatch(_)));
}

#[tokio::test]
async fn grant_scoped_to_a_different_protocol_is_rejected() {
    let alice = TestSigner::new("did:example:alice");
    let bob = TestSigner::new("did:example:bob");
    let store = MemoryStore::new();
    let owner = alice.did().to_string();

    let configure = fixture::configure(&alice, common::social_definition()).await.unwrap();
    store.put(&owner, &Entry::Configure(configure)).await.unwrap();

    let grant_data = GrantBuilder::new()
        .granted_for(&owner)
        .date_expires("2035-01-01T00:00:00.000000Z")
        .scope(Scope::Records {
            method: Method::Write,
            protocol: "https://example.com/other".to_string(),
            options: None,
        })
        .build()
        .unwrap();
    let grant = fixture::grant(&alice, bob.did(), &grant_data).await.unwrap();
    store.put(&owner, &Entry::Write(grant.clone())).await.unwrap();

    let announcement = fixture::write(
        &bob,
        fixture::WriteOptions {
            data: b"breaking news".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some(common::PROTOCOL_URI.to_string()),
            protocol_path: Some("thread/moderator/announcement".to_string()),
            permission_grant_id: Some(grant.record_id.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let authorizer = Authorizer::new(common::PROTOCOL_URI);
    let ctx = Context::new(&owner, bob.did());
    let err =
        authorizer.permit_write(&ctx, common::now(), &announcement, &store).await.unwrap_err();
    assert!(matches!(err, Error::GrantScopeMismatch(_)));
}

#[tokio::test]
async fn grant_for_a_different_tenant_is_rejected() {
    let alice = TestSigner::new("did:example:alice");
    let bob = TestSigner::new("did:example:bob");
    let store = MemoryStore::new();
    let owner = alice.did().to_string();

    let configure = fixture::configure(&alice, common::social_definition()).await.unwrap();
    store.put(&owner, &Entry::Configure(configure)).await.unwrap();

    // The grant's own `grantedFor` names some other tenant's DWN, even
    // though it was stored (and is being invoked) against Alice's.
    let grant_data = GrantBuilder::new()
        .granted_for("did:example:someone-else")
        .date_expires("2035-01-01T00:00:00.000000Z")
        .scope(Scope::Records {
            method: Method::Write,
            protocol: common::PROTOCOL_URI.to_string(),
            options: None,
        })
        .build()
        .unwrap();
    let grant = fixture::grant(&alice, bob.did(), &grant_data).await.unwrap();
    store.put(&owner, &Entry::Write(grant.clone())).await.unwrap();

    let announcement = fixture::write(
        &bob,
        fixture::WriteOptions {
            data: b"breaking news".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some(common::PROTOCOL_URI.to_string()),
            protocol_path: Some("thread/moderator/announcement".to_string()),
            permission_grant_id: Some(grant.record_id.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let authorizer = Authorizer::new(common::PROTOCOL_URI);
    let ctx = Context::new(&owner, bob.did());
    let err =
        authorizer.permit_write(&ctx, common::now(), &announcement, &store).await.unwrap_err();
    assert!(matches!(err, Error::GrantTenantMismatch(_)));
}

#[tokio::test]
async fn grant_in_scope_bypasses_the_rule_set() {
    let alice = TestSigner::new("did:example:alice");
    let bob = TestSigner::new("did:example:bob");
    let store = MemoryStore::new();
    let owner = alice.did().to_string();

    let configure = fixture::configure(&alice, common::social_definition()).await.unwrap();
    store.put(&owner, &Entry::Configure(configure)).await.unwrap();

    let grant_data = GrantBuilder::new()
        .granted_for(&owner)
        .date_expires("2035-01-01T00:00:00.000000Z")
        .scope(Scope::Records {
            method: Method::Write,
            protocol: common::PROTOCOL_URI.to_string(),
            options: Some(RecordsOptions::ProtocolPath("thread/moderator/announcement".to_string())),
        })
        .build()
        .unwrap();
    let grant = fixture::grant(&alice, bob.did(), &grant_data).await.unwrap();
    store.put(&owner, &Entry::Write(grant.clone())).await.unwrap();

    // Bob holds no moderator role and the rule set only grants Create via
    // that role, but the grant authorizes the write directly.
    let announcement = fixture::write(
        &bob,
        fixture::WriteOptions {
            data: b"breaking news".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some(common::PROTOCOL_URI.to_string()),
            protocol_path: Some("thread/moderator/announcement".to_string()),
            permission_grant_id: Some(grant.record_id.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let authorizer = Authorizer::new(common::PROTOCOL_URI);
    let ctx = Context::new(&owner, bob.did());
    authorizer.permit_write(&ctx, common::now(), &announcement, &store).await.unwrap();
}

#[tokio::test]
async fn revoked_grant_is_rejected() {
    let alice = TestSigner::new("did:example:alice");
    let bob = TestSigner::new("did:example:bob");
    let store = MemoryStore::new();
    let owner = alice.did().to_string();

    let configure = fixture::configure(&alice, common::social_definition()).await.unwrap();
    store.put(&owner, &Entry::Configure(configure)).await.unwrap();

    let grant_data = GrantBuilder::new()
        .granted_for(&owner)
        .date_expires("2035-01-01T00:00:00.000000Z")
        .scope(Scope::Records {
            method: Method::Write,
            protocol: common::PROTOCOL_URI.to_string(),
            options: None,
        })
        .build()
        .unwrap();
    let grant = fixture::grant(&alice, bob.did(), &grant_data).await.unwrap();
    store.put(&owner, &Entry::Write(grant.clone())).await.unwrap();

    let revocation = fixture::revoke(&alice, &grant).await.unwrap();
    store.put(&owner, &Entry::Write(revocation)).await.unwrap();

    let announcement = fixture::write(
        &bob,
        fixture::WriteOptions {
            data: b"breaking news".to_vec(),
            data_format: "application/json".to_string(),
            protocol: Some(common::PROTOCOL_URI.to_string()),
            protocol_path: Some("thread/moderator/announcement".to_string()),
            permission_grant_id: Some(grant.record_id.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let authorizer = Authorizer::new(common::PROTOCOL_URI);
    let ctx = Context::new(&owner, bob.did());
    let err =
        authorizer.permit_write(&ctx, common::now(), &announcement, &store).await.unwrap_err();
    assert!(matches!(err, Error::GrantRevoked(_)));
}
