//! User grants, links, revocation and expiry cleanup.

use secrecy::SecretString;

use veil::perms::Unlock;
use veil::{AccessLevel, Actor, ApiError, LinkCredentials, LinkOptions, LinkPasswordChange, NodeKind, VaultError};
use veil_testkit::{multi_user_fixture, TestVault, HOUR_MS};

#[tokio::test]
async fn test_user_grant_gives_access_to_subtree() {
    let (fixture, users) = multi_user_fixture(2).await;
    let (alice, bob) = (&users[0], &users[1]);
    let vault = &fixture.vault;

    let docs = fixture.folder(alice, "docs").await;
    let inner = fixture.subfolder(Actor::User(alice), &docs, "inner").await;
    let file = fixture.file(Actor::User(alice), &inner, "plan.md", b"# plan").await;

    assert_eq!(vault.authorize(Actor::User(bob), &file).await.unwrap(), AccessLevel::Denied);

    vault
        .grant_to_user(alice, &docs, &bob.principal_id(), false, None)
        .await
        .unwrap();

    assert_eq!(vault.authorize(Actor::User(bob), &docs).await.unwrap(), AccessLevel::Viewer);
    assert_eq!(vault.authorize(Actor::User(bob), &file).await.unwrap(), AccessLevel::Viewer);
    assert_eq!(vault.read_content(Actor::User(bob), &file).await.unwrap(), b"# plan");

    let entry = vault.read_attributes(Actor::User(bob), &file).await.unwrap();
    assert_eq!(entry.name, "plan.md");
    assert_eq!(entry.size, 6);

    // Viewers cannot share onwards.
    let carol = fixture.user().await;
    let err = vault
        .grant_to_user(bob, &docs, &carol.principal_id(), false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_ancestor_edit_beats_closer_view() {
    let (fixture, users) = multi_user_fixture(2).await;
    let (alice, bob) = (&users[0], &users[1]);
    let vault = &fixture.vault;

    let top = fixture.folder(alice, "top").await;
    let mid = fixture.subfolder(Actor::User(alice), &top, "mid").await;
    let leaf = fixture.file(Actor::User(alice), &mid, "leaf", b"x").await;

    vault.grant_to_user(alice, &top, &bob.principal_id(), true, None).await.unwrap();
    vault.grant_to_user(alice, &mid, &bob.principal_id(), false, None).await.unwrap();

    assert_eq!(vault.authorize(Actor::User(bob), &leaf).await.unwrap(), AccessLevel::Editor);
    vault.update_content(Actor::User(bob), &leaf, b"edited by bob").await.unwrap();
    assert_eq!(vault.read_content(Actor::User(alice), &leaf).await.unwrap(), b"edited by bob");
}

#[tokio::test]
async fn test_editor_creates_nodes_owned_by_tree_owner() {
    let (fixture, users) = multi_user_fixture(2).await;
    let (alice, bob) = (&users[0], &users[1]);
    let vault = &fixture.vault;

    let shared = fixture.folder(alice, "shared").await;
    vault.grant_to_user(alice, &shared, &bob.principal_id(), true, None).await.unwrap();

    let draft = fixture.file(Actor::User(bob), &shared, "draft", b"bob wrote this").await;
    vault.rename(Actor::User(bob), &draft, "final").await.unwrap();

    assert_eq!(vault.authorize(Actor::User(alice), &draft).await.unwrap(), AccessLevel::Owner);
    let entry = vault.read_attributes(Actor::User(alice), &draft).await.unwrap();
    assert_eq!(entry.name, "final");
    assert_eq!(entry.kind, NodeKind::File);
}

#[tokio::test]
async fn test_revoke_removes_only_that_grant() {
    let (fixture, users) = multi_user_fixture(2).await;
    let (alice, bob) = (&users[0], &users[1]);
    let vault = &fixture.vault;

    let docs = fixture.folder(alice, "docs").await;
    let grant = vault.grant_to_user(alice, &docs, &bob.principal_id(), false, None).await.unwrap();
    let link = vault.grant_link(alice, &docs, LinkOptions::default()).await.unwrap();
    let credentials = link.credentials();

    // Only editors manage grants.
    let err = vault.revoke(bob, &grant).await.unwrap_err();
    assert!(matches!(err, VaultError::PermissionDenied(_)));

    vault.revoke(alice, &grant).await.unwrap();
    assert_eq!(vault.authorize(Actor::User(bob), &docs).await.unwrap(), AccessLevel::Denied);
    assert_eq!(vault.authorize(Actor::Link(&credentials), &docs).await.unwrap(), AccessLevel::Viewer);

    let err = vault.revoke(alice, &grant).await.unwrap_err();
    assert_eq!(err.to_api(), ApiError::NotFound);

    let remaining = vault.list_grants(alice, &docs).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, link.grant_id);
}

#[tokio::test]
async fn test_update_grant_edit_flag_keeps_wrap() {
    let (fixture, users) = multi_user_fixture(2).await;
    let (alice, bob) = (&users[0], &users[1]);
    let vault = &fixture.vault;

    let docs = fixture.folder(alice, "docs").await;
    let file = fixture.file(Actor::User(alice), &docs, "a", b"a").await;
    let grant = vault.grant_to_user(alice, &docs, &bob.principal_id(), false, None).await.unwrap();
    let before = vault.list_grants(alice, &docs).await.unwrap();

    assert!(vault.rename(Actor::User(bob), &file, "b").await.is_err());
    vault.update_grant(alice, &grant, true, None).await.unwrap();
    vault.rename(Actor::User(bob), &file, "b").await.unwrap();

    let after = vault.list_grants(alice, &docs).await.unwrap();
    assert!(after[0].edit);
    assert_eq!(after[0].wrapped_key, before[0].wrapped_key);

    let err = vault
        .update_grant(
            alice,
            &grant,
            true,
            Some(LinkPasswordChange {
                current: LinkCredentials::new(veil::LinkId::generate(), veil::LinkSecret::generate()),
                password: None,
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_password_link() {
    let fixture = TestVault::new();
    let vault = &fixture.vault;
    let alice = fixture.user().await;

    let album = fixture.folder(&alice, "album").await;
    let photo = fixture.file(Actor::User(&alice), &album, "beach.jpg", b"\xff\xd8jpeg").await;

    let link = vault
        .grant_link(
            &alice,
            &album,
            LinkOptions {
                password: Some(SecretString::from("sunset")),
                ..LinkOptions::default()
            },
        )
        .await
        .unwrap();

    let bare = link.credentials();
    let wrong = link.credentials().with_password(SecretString::from("sunrise"));
    let right = link.credentials().with_password(SecretString::from("sunset"));

    assert_eq!(vault.authorize(Actor::Link(&bare), &photo).await.unwrap(), AccessLevel::Denied);
    assert_eq!(vault.authorize(Actor::Link(&wrong), &photo).await.unwrap(), AccessLevel::Denied);
    assert_eq!(vault.authorize(Actor::Link(&right), &photo).await.unwrap(), AccessLevel::Viewer);
    assert_eq!(vault.read_content(Actor::Link(&right), &photo).await.unwrap(), b"\xff\xd8jpeg");

    // The token carries id and secret only; the password travels separately.
    let parsed = LinkCredentials::from_token(&link.token())
        .unwrap()
        .with_password(SecretString::from("sunset"));
    assert_eq!(vault.read_content(Actor::Link(&parsed), &photo).await.unwrap(), b"\xff\xd8jpeg");
}

#[tokio::test]
async fn test_link_password_change_rewraps() {
    let fixture = TestVault::new();
    let vault = &fixture.vault;
    let alice = fixture.user().await;

    let docs = fixture.folder(&alice, "docs").await;
    let file = fixture.file(Actor::User(&alice), &docs, "f", b"body").await;
    let link = vault.grant_link(&alice, &docs, LinkOptions::default()).await.unwrap();
    let before = vault.list_grants(&alice, &docs).await.unwrap();

    vault
        .update_grant(
            &alice,
            &link.grant_id,
            false,
            Some(LinkPasswordChange {
                current: link.credentials(),
                password: Some(SecretString::from("hunter2")),
            }),
        )
        .await
        .unwrap();

    let after = vault.list_grants(&alice, &docs).await.unwrap();
    assert!(after[0].is_password_protected());
    assert_ne!(after[0].wrapped_key.nonce(), before[0].wrapped_key.nonce());
    assert_eq!(after[0].link_id(), Some(&link.link_id));

    let bare = link.credentials();
    assert_eq!(vault.authorize(Actor::Link(&bare), &file).await.unwrap(), AccessLevel::Denied);

    let with_password = link.credentials().with_password(SecretString::from("hunter2"));
    assert_eq!(vault.read_content(Actor::Link(&with_password), &file).await.unwrap(), b"body");
}

#[tokio::test]
async fn test_link_password_change_checks_current_credentials() {
    let fixture = TestVault::new();
    let vault = &fixture.vault;
    let alice = fixture.user().await;

    let docs = fixture.folder(&alice, "docs").await;
    let file = fixture.file(Actor::User(&alice), &docs, "f", b"body").await;
    let link = vault.grant_link(&alice, &docs, LinkOptions::default()).await.unwrap();
    let before = vault.list_grants(&alice, &docs).await.unwrap();

    let forged = LinkCredentials::new(link.link_id, veil::LinkSecret::generate());
    let err = vault
        .update_grant(
            &alice,
            &link.grant_id,
            false,
            Some(LinkPasswordChange {
                current: forged,
                password: None,
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Integrity));

    // Nothing was written, so the link still opens.
    let after = vault.list_grants(&alice, &docs).await.unwrap();
    assert_eq!(after[0].wrapped_key, before[0].wrapped_key);
    assert_eq!(vault.read_content(Actor::Link(&link.credentials()), &file).await.unwrap(), b"body");

    vault
        .update_grant(
            &alice,
            &link.grant_id,
            false,
            Some(LinkPasswordChange {
                current: link.credentials(),
                password: Some(SecretString::from("hunter2")),
            }),
        )
        .await
        .unwrap();

    // A password-protected link needs its present password to change again.
    let err = vault
        .update_grant(
            &alice,
            &link.grant_id,
            false,
            Some(LinkPasswordChange {
                current: link.credentials(),
                password: None,
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::PermissionDenied(_)));

    vault
        .update_grant(
            &alice,
            &link.grant_id,
            false,
            Some(LinkPasswordChange {
                current: link.credentials().with_password(SecretString::from("hunter2")),
                password: None,
            }),
        )
        .await
        .unwrap();
    assert_eq!(vault.read_content(Actor::Link(&link.credentials()), &file).await.unwrap(), b"body");
}

#[tokio::test]
async fn test_link_with_wrong_secret_cannot_decrypt() {
    let fixture = TestVault::new();
    let vault = &fixture.vault;
    let alice = fixture.user().await;

    let docs = fixture.folder(&alice, "docs").await;
    let file = fixture.file(Actor::User(&alice), &docs, "f", b"body").await;
    let link = vault.grant_link(&alice, &docs, LinkOptions::default()).await.unwrap();

    let forged = LinkCredentials::new(link.link_id, veil::LinkSecret::generate());
    let err = vault.read_content(Actor::Link(&forged), &file).await.unwrap_err();
    assert!(matches!(err, VaultError::Integrity));
}

#[tokio::test]
async fn test_edit_link_can_write() {
    let fixture = TestVault::new();
    let vault = &fixture.vault;
    let alice = fixture.user().await;

    let inbox = fixture.folder(&alice, "inbox").await;
    let link = vault
        .grant_link(
            &alice,
            &inbox,
            LinkOptions {
                edit: true,
                ..LinkOptions::default()
            },
        )
        .await
        .unwrap();
    let credentials = link.credentials();

    let upload = fixture.file(Actor::Link(&credentials), &inbox, "upload.bin", b"\x00\x01").await;
    assert_eq!(vault.read_content(Actor::User(&alice), &upload).await.unwrap(), b"\x00\x01");
    assert_eq!(vault.authorize(Actor::Link(&credentials), &upload).await.unwrap(), AccessLevel::Editor);
}

#[tokio::test]
async fn test_key_path_unlocks_client_side() {
    let fixture = TestVault::new();
    let vault = &fixture.vault;
    let alice = fixture.user().await;

    let root = fixture.folder(&alice, "root").await;
    let mid = fixture.subfolder(Actor::User(&alice), &root, "mid").await;
    let leaf = fixture.file(Actor::User(&alice), &mid, "leaf", b"leaf").await;
    let link = vault.grant_link(&alice, &mid, LinkOptions::default()).await.unwrap();
    let credentials = link.credentials();

    let owner_path = vault.key_path(Actor::User(&alice), &leaf).await.unwrap();
    assert_eq!(owner_path.hops(), 3);

    let link_path = vault.key_path(Actor::Link(&credentials), &leaf).await.unwrap();
    assert_eq!(link_path.hops(), 2);

    // The path survives transport and unlocks with the link alone.
    let received = veil::KeyPath::from_bytes(&link_path.to_bytes().unwrap()).unwrap();
    let key = received
        .unlock(Unlock::Link(&credentials), &vault.config().link_kdf)
        .unwrap();
    let expected = vault.unlock_node_key(Actor::User(&alice), &leaf).await.unwrap();
    assert_eq!(key.as_bytes(), expected.as_bytes());

    let err = vault.key_path(Actor::Link(&credentials), &root).await.unwrap_err();
    assert!(err.is_denial());
}

#[tokio::test]
async fn test_expired_grants_are_purged() {
    let (fixture, users) = multi_user_fixture(2).await;
    let (alice, bob) = (&users[0], &users[1]);
    let vault = &fixture.vault;

    let docs = fixture.folder(alice, "docs").await;
    let expires_at = fixture.now() + HOUR_MS;
    let temporary = vault
        .grant_to_user(alice, &docs, &bob.principal_id(), true, Some(expires_at))
        .await
        .unwrap();
    let link = vault
        .grant_link(
            alice,
            &docs,
            LinkOptions {
                expires_at: Some(expires_at),
                ..LinkOptions::default()
            },
        )
        .await
        .unwrap();
    let permanent = vault.grant_link(alice, &docs, LinkOptions::default()).await.unwrap();

    assert!(vault.purge_expired_grants().await.unwrap().is_empty());
    assert_eq!(vault.authorize(Actor::User(bob), &docs).await.unwrap(), AccessLevel::Editor);

    fixture.clock.advance(HOUR_MS + 1);
    let err = vault.read_attributes(Actor::User(bob), &docs).await.unwrap_err();
    assert!(matches!(err, VaultError::ExpiredGrant));

    let mut purged = vault.purge_expired_grants().await.unwrap();
    purged.sort();
    let mut expected = vec![temporary, link.grant_id];
    expected.sort();
    assert_eq!(purged, expected);

    let left = vault.list_grants(alice, &docs).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, permanent.grant_id);

    // With the grant gone there is nothing left to call expired.
    let err = vault.read_attributes(Actor::User(bob), &docs).await.unwrap_err();
    assert!(matches!(err, VaultError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_grant_with_past_expiry_is_rejected() {
    let fixture = TestVault::new();
    let alice = fixture.user().await;
    let docs = fixture.folder(&alice, "docs").await;

    let err = fixture
        .vault
        .grant_link(
            &alice,
            &docs,
            LinkOptions {
                expires_at: Some(fixture.now() - 1),
                ..LinkOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::InvalidRequest(_)));
}
