//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use secrecy::SecretString;
use tracing_subscriber::filter::LevelFilter;

use veil::{Actor, NodeId, NodeKind, Session, Vault, VaultConfig};
use veil_store::{MemoryBlobStore, MemoryStore};

use crate::clock::ManualClock;
use crate::generators::TreeShape;

/// The password every fixture user registers with.
pub const PASSWORD: &str = "correct horse battery staple";

/// An in-memory vault.
pub type MemoryVault = Vault<MemoryStore, MemoryBlobStore>;

/// A test fixture: an in-memory vault on a manual clock, with fast KDFs.
pub struct TestVault {
    pub vault: MemoryVault,
    pub clock: Arc<ManualClock>,
}

impl TestVault {
    pub fn new() -> Self {
        Self::with_config(VaultConfig::insecure_fast())
    }

    pub fn with_config(config: VaultConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let vault = Vault::with_clock(MemoryStore::new(), MemoryBlobStore::new(), config, clock.clone());
        Self { vault, clock }
    }

    /// The fixture password as a secret.
    pub fn password() -> SecretString {
        SecretString::from(PASSWORD)
    }

    /// Current fixture time.
    pub fn now(&self) -> i64 {
        use veil::Clock;
        self.clock.now_millis()
    }

    /// Register a fresh user.
    pub async fn user(&self) -> Session {
        self.vault
            .register(&Self::password())
            .await
            .expect("register user")
    }

    /// Create a root folder owned by `owner`.
    pub async fn folder(&self, owner: &Session, name: &str) -> NodeId {
        self.vault
            .create_root(owner, NodeKind::Folder, name, "inode/directory")
            .await
            .expect("create root folder")
    }

    /// Create a folder under `parent`.
    pub async fn subfolder(&self, actor: Actor<'_>, parent: &NodeId, name: &str) -> NodeId {
        self.vault
            .create_child(actor, parent, NodeKind::Folder, name, "inode/directory")
            .await
            .expect("create folder")
    }

    /// Create a file under `parent` and write `content` to it.
    pub async fn file(&self, actor: Actor<'_>, parent: &NodeId, name: &str, content: &[u8]) -> NodeId {
        let id = self
            .vault
            .create_child(actor, parent, NodeKind::File, name, "application/octet-stream")
            .await
            .expect("create file");
        self.vault
            .update_content(actor, &id, content)
            .await
            .expect("write content");
        id
    }

    /// Build a folder tree of the given shape for `owner`.
    ///
    /// Returns ids indexed like the shape: `ids[0]` is the root.
    pub async fn tree(&self, owner: &Session, shape: &TreeShape) -> Vec<NodeId> {
        let mut ids = vec![self.folder(owner, "n0").await];
        for node in 1..shape.len() {
            let parent = ids[shape.parent_of(node).expect("non-root has a parent")];
            let id = self
                .subfolder(Actor::User(owner), &parent, &format!("n{node}"))
                .await;
            ids.push(id);
        }
        ids
    }
}

impl Default for TestVault {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixture with `count` registered users.
pub async fn multi_user_fixture(count: usize) -> (TestVault, Vec<Session>) {
    let fixture = TestVault::new();
    let mut users = Vec::with_capacity(count);
    for _ in 0..count {
        users.push(fixture.user().await);
    }
    (fixture, users)
}

/// Send debug-level tracing output to the test harness. Safe to call from
/// every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}
