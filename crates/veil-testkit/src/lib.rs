//! # Veil Testkit
//!
//! Testing utilities for Veil.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Clock**: [`ManualClock`], a clock tests move by hand to cross grant
//!   expiry deterministically
//! - **Fixtures**: [`TestVault`], an in-memory vault with cheap KDF settings
//!   and helpers for registering users and building trees
//! - **Generators**: Proptest strategies for names, contents and tree shapes
//!
//! ## Test Fixtures
//!
//! ```rust
//! use veil_testkit::TestVault;
//! use veil::Actor;
//!
//! # tokio_test_block(async {
//! let fixture = TestVault::new();
//! let alice = fixture.user().await;
//! let root = fixture.folder(&alice, "root").await;
//! let file = fixture.file(Actor::User(&alice), &root, "a.txt", b"hello").await;
//! assert_eq!(fixture.vault.read_content(Actor::User(&alice), &file).await.unwrap(), b"hello");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use veil_testkit::generators::{node_name, tree_shape};
//!
//! proptest! {
//!     #[test]
//!     fn names_round_trip(name in node_name(), shape in tree_shape(8)) {
//!         // build `shape`, rename nodes to `name`, read them back
//!     }
//! }
//! ```

pub mod clock;
pub mod fixtures;
pub mod generators;

pub use clock::{ManualClock, HOUR_MS};
pub use fixtures::{init_tracing, multi_user_fixture, MemoryVault, TestVault, PASSWORD};
pub use generators::{content, edit_flag, node_name, tree_shape, TreeShape};
