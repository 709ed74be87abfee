//! The shared-folder, move-out, link-expiry walkthrough.

use veil::{AccessLevel, Actor, ApiError, LinkOptions, NodeKind, VaultError};
use veil_testkit::{init_tracing, TestVault, HOUR_MS};

#[tokio::test]
async fn test_link_follows_tree_and_expires() {
    init_tracing();
    let fixture = TestVault::new();
    let vault = &fixture.vault;
    let u1 = fixture.user().await;
    let owner = Actor::User(&u1);

    // F is a root folder, X a file inside it.
    let f = fixture.folder(&u1, "F").await;
    let x = fixture.file(owner, &f, "X", b"quarterly numbers").await;

    // L: a viewer link on F, valid for one hour.
    let expires_at = fixture.now() + HOUR_MS;
    let link = vault
        .grant_link(
            &u1,
            &f,
            LinkOptions {
                expires_at: Some(expires_at),
                ..LinkOptions::default()
            },
        )
        .await
        .unwrap();
    let l = link.credentials();
    let via_link = Actor::Link(&l);

    assert_eq!(vault.authorize(via_link, &x).await.unwrap(), AccessLevel::Viewer);
    assert_eq!(vault.read_content(via_link, &x).await.unwrap(), b"quarterly numbers");

    // A viewer link cannot write.
    let err = vault.update_content(via_link, &x, b"tampered").await.unwrap_err();
    assert!(matches!(err, VaultError::PermissionDenied(_)));

    // Move X to a fresh root F2 that carries no grants.
    let f2 = vault
        .create_root(&u1, NodeKind::Folder, "F2", "inode/directory")
        .await
        .unwrap();
    vault.move_node(owner, &x, Some(&f2)).await.unwrap();

    assert_eq!(vault.authorize(via_link, &x).await.unwrap(), AccessLevel::Denied);
    let err = vault.read_content(via_link, &x).await.unwrap_err();
    assert_eq!(err.to_api(), ApiError::NotFound);

    // The owner still reads the moved file.
    assert_eq!(vault.read_content(owner, &x).await.unwrap(), b"quarterly numbers");

    // The link still works on F until it expires, inclusive of the instant.
    fixture.clock.set(expires_at);
    assert_eq!(vault.authorize(via_link, &f).await.unwrap(), AccessLevel::Viewer);

    fixture.clock.advance(1);
    assert_eq!(vault.authorize(via_link, &f).await.unwrap(), AccessLevel::Denied);

    // Internally the denial is an expiry; outside it is a plain not-found.
    let err = vault.list_children(via_link, &f).await.unwrap_err();
    assert!(matches!(err, VaultError::ExpiredGrant));
    assert_eq!(err.to_api(), ApiError::NotFound);
}

#[tokio::test]
async fn test_unknown_node_looks_like_denial() {
    let fixture = TestVault::new();
    let u1 = fixture.user().await;
    let u2 = fixture.user().await;
    let f = fixture.folder(&u1, "private").await;

    let missing = fixture
        .vault
        .read_attributes(Actor::User(&u2), &veil::NodeId::generate())
        .await
        .unwrap_err();
    let forbidden = fixture
        .vault
        .read_attributes(Actor::User(&u2), &f)
        .await
        .unwrap_err();

    assert!(matches!(missing, VaultError::NotFound(_)));
    assert!(matches!(forbidden, VaultError::PermissionDenied(_)));
    assert_eq!(missing.to_api(), forbidden.to_api());

    let missing_level = fixture
        .vault
        .authorize(Actor::User(&u2), &veil::NodeId::generate())
        .await
        .unwrap();
    let forbidden_level = fixture.vault.authorize(Actor::User(&u2), &f).await.unwrap();
    assert_eq!(missing_level, AccessLevel::Denied);
    assert_eq!(missing_level, forbidden_level);
}
