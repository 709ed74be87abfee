//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Veil. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use veil_core::{
    ChainLink, ChainSnapshot, Clock, EncryptedField, GrantId, GrantRecord, Grantee, LinkId, NodeId,
    NodeKind, NodeRecord, Nonce, PrincipalId, PrincipalRecord, Salt, SystemClock, WrappedKey,
    X25519PublicKey,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{MoveCommit, Store};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PRINCIPAL_COLUMNS: &str = "principal_id, public_key, wrapped_private_key, private_key_nonce,
    key_salt, auth_salt, password_verifier, created_at, updated_at";

const NODE_COLUMNS: &str = "node_id, parent_id, owner_id, kind, wrapped_key, wrap_nonce,
    wrap_ephemeral, name, name_nonce, mime_type, mime_nonce, content_nonce, size, created_at,
    modified_at";

const GRANT_COLUMNS: &str = "grant_id, node_id, grantee_kind, principal_id, link_id,
    password_salt, edit, expires_at, wrapped_key, wrap_nonce, wrap_ephemeral, created_by,
    created_at";

const GRANTEE_USER: i64 = 0;
const GRANTEE_LINK: i64 = 1;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migration::migrate(&mut conn, SystemClock.now_millis())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row conversion
// ─────────────────────────────────────────────────────────────────────────────

fn invalid(column: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(0, column.into(), Type::Blob)
}

fn fixed<const N: usize>(row: &Row<'_>, column: &str) -> rusqlite::Result<[u8; N]> {
    let bytes: Vec<u8> = row.get(column)?;
    bytes.try_into().map_err(|_| invalid(column))
}

fn fixed_opt<const N: usize>(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<[u8; N]>> {
    let bytes: Option<Vec<u8>> = row.get(column)?;
    bytes
        .map(|b| b.try_into().map_err(|_| invalid(column)))
        .transpose()
}

fn wrapped_key(row: &Row<'_>) -> rusqlite::Result<WrappedKey> {
    Ok(WrappedKey::from_parts(
        row.get("wrapped_key")?,
        Nonce::from_bytes(fixed(row, "wrap_nonce")?),
        fixed_opt(row, "wrap_ephemeral")?.map(X25519PublicKey::from_bytes),
    ))
}

fn row_to_principal(row: &Row<'_>) -> rusqlite::Result<PrincipalRecord> {
    Ok(PrincipalRecord {
        id: PrincipalId::from_bytes(fixed(row, "principal_id")?),
        public_key: X25519PublicKey::from_bytes(fixed(row, "public_key")?),
        wrapped_private_key: EncryptedField {
            nonce: Nonce::from_bytes(fixed(row, "private_key_nonce")?),
            ciphertext: row.get("wrapped_private_key")?,
        },
        key_salt: Salt::from_bytes(fixed(row, "key_salt")?),
        auth_salt: Salt::from_bytes(fixed(row, "auth_salt")?),
        password_verifier: fixed(row, "password_verifier")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_node(row: &Row<'_>) -> rusqlite::Result<NodeRecord> {
    let kind: u8 = row.get("kind")?;
    let size: i64 = row.get("size")?;

    Ok(NodeRecord {
        id: NodeId::from_bytes(fixed(row, "node_id")?),
        parent: fixed_opt(row, "parent_id")?.map(NodeId::from_bytes),
        owner: PrincipalId::from_bytes(fixed(row, "owner_id")?),
        kind: NodeKind::from_u8(kind)
            .ok_or_else(|| rusqlite::Error::InvalidColumnType(0, "kind".into(), Type::Integer))?,
        wrapped_key: wrapped_key(row)?,
        name: EncryptedField {
            nonce: Nonce::from_bytes(fixed(row, "name_nonce")?),
            ciphertext: row.get("name")?,
        },
        mime_type: EncryptedField {
            nonce: Nonce::from_bytes(fixed(row, "mime_nonce")?),
            ciphertext: row.get("mime_type")?,
        },
        content_nonce: fixed_opt(row, "content_nonce")?.map(Nonce::from_bytes),
        size: size as u64,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
    })
}

fn row_to_grant(row: &Row<'_>) -> rusqlite::Result<GrantRecord> {
    let grantee = match row.get::<_, i64>("grantee_kind")? {
        GRANTEE_USER => Grantee::User(PrincipalId::from_bytes(fixed(row, "principal_id")?)),
        GRANTEE_LINK => Grantee::Link {
            link_id: LinkId::from_bytes(fixed(row, "link_id")?),
            password_salt: fixed_opt(row, "password_salt")?.map(Salt::from_bytes),
        },
        _ => {
            return Err(rusqlite::Error::InvalidColumnType(
                0,
                "grantee_kind".into(),
                Type::Integer,
            ))
        }
    };

    Ok(GrantRecord {
        id: GrantId::from_bytes(fixed(row, "grant_id")?),
        node_id: NodeId::from_bytes(fixed(row, "node_id")?),
        grantee,
        edit: row.get("edit")?,
        expires_at: row.get("expires_at")?,
        wrapped_key: wrapped_key(row)?,
        created_by: PrincipalId::from_bytes(fixed(row, "created_by")?),
        created_at: row.get("created_at")?,
    })
}

/// Split a grantee into its `(kind, principal_id, link_id, password_salt)`
/// columns.
fn grantee_columns(grantee: &Grantee) -> (i64, Option<&[u8]>, Option<&[u8]>, Option<&[u8]>) {
    match grantee {
        Grantee::User(id) => (GRANTEE_USER, Some(id.as_bytes().as_slice()), None, None),
        Grantee::Link {
            link_id,
            password_salt,
        } => (
            GRANTEE_LINK,
            None,
            Some(link_id.as_bytes().as_slice()),
            password_salt.as_ref().map(|s| s.as_bytes().as_slice()),
        ),
    }
}

fn conflict_on_constraint(e: rusqlite::Error, what: String) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation => {
            StoreError::Conflict(what)
        }
        _ => StoreError::Database(e),
    }
}

fn node_exists(conn: &Connection, id: &NodeId) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM nodes WHERE node_id = ?1",
            params![id.as_bytes().as_slice()],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn get_node_in(conn: &Connection, id: &NodeId) -> Result<Option<NodeRecord>> {
    let mut stmt = conn.prepare_cached(&format!("SELECT {NODE_COLUMNS} FROM nodes WHERE node_id = ?1"))?;
    Ok(stmt
        .query_row(params![id.as_bytes().as_slice()], row_to_node)
        .optional()?)
}

fn grants_in(conn: &Connection, node_id: &NodeId) -> Result<Vec<GrantRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {GRANT_COLUMNS} FROM grants WHERE node_id = ?1 ORDER BY created_at, grant_id"
    ))?;
    let grants = stmt
        .query_map(params![node_id.as_bytes().as_slice()], row_to_grant)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(grants)
}

#[async_trait]
impl Store for SqliteStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Principals
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_principal(&self, principal: &PrincipalRecord) -> Result<()> {
        let p = principal.clone();
        self.run(move |conn| {
            conn.execute(
                &format!("INSERT INTO principals ({PRINCIPAL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![
                    p.id.as_bytes().as_slice(),
                    p.public_key.as_bytes().as_slice(),
                    p.wrapped_private_key.ciphertext,
                    p.wrapped_private_key.nonce.as_bytes().as_slice(),
                    p.key_salt.as_bytes().as_slice(),
                    p.auth_salt.as_bytes().as_slice(),
                    p.password_verifier.as_slice(),
                    p.created_at,
                    p.updated_at,
                ],
            )
            .map_err(|e| conflict_on_constraint(e, format!("principal {}", p.id)))?;
            Ok(())
        })
        .await
    }

    async fn get_principal(&self, id: &PrincipalId) -> Result<Option<PrincipalRecord>> {
        let id = *id;
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE principal_id = ?1"),
                    params![id.as_bytes().as_slice()],
                    row_to_principal,
                )
                .optional()?)
        })
        .await
    }

    async fn update_principal_keys(&self, principal: &PrincipalRecord) -> Result<()> {
        let p = principal.clone();
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE principals
                 SET wrapped_private_key = ?2, private_key_nonce = ?3, key_salt = ?4,
                     auth_salt = ?5, password_verifier = ?6, updated_at = ?7
                 WHERE principal_id = ?1",
                params![
                    p.id.as_bytes().as_slice(),
                    p.wrapped_private_key.ciphertext,
                    p.wrapped_private_key.nonce.as_bytes().as_slice(),
                    p.key_salt.as_bytes().as_slice(),
                    p.auth_salt.as_bytes().as_slice(),
                    p.password_verifier.as_slice(),
                    p.updated_at,
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("principal {}", p.id)));
            }
            Ok(())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Nodes
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_node(&self, node: &NodeRecord) -> Result<()> {
        let n = node.clone();
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if let Some(parent) = &n.parent {
                if !node_exists(&tx, parent)? {
                    return Err(StoreError::NotFound(format!("parent {}", parent)));
                }
            }

            tx.execute(
                &format!(
                    "INSERT INTO nodes ({NODE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    n.id.as_bytes().as_slice(),
                    n.parent.as_ref().map(|p| p.as_bytes().as_slice()),
                    n.owner.as_bytes().as_slice(),
                    n.kind.to_u8(),
                    n.wrapped_key.ciphertext(),
                    n.wrapped_key.nonce().as_bytes().as_slice(),
                    n.wrapped_key.ephemeral_public().map(|k| k.as_bytes().as_slice()),
                    n.name.ciphertext,
                    n.name.nonce.as_bytes().as_slice(),
                    n.mime_type.ciphertext,
                    n.mime_type.nonce.as_bytes().as_slice(),
                    n.content_nonce.as_ref().map(|c| c.as_bytes().as_slice()),
                    n.size as i64,
                    n.created_at,
                    n.modified_at,
                ],
            )
            .map_err(|e| conflict_on_constraint(e, format!("node {}", n.id)))?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_node(&self, id: &NodeId) -> Result<Option<NodeRecord>> {
        let id = *id;
        self.run(move |conn| get_node_in(conn, &id)).await
    }

    async fn update_node_attributes(&self, node: &NodeRecord) -> Result<()> {
        let n = node.clone();
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE nodes
                 SET name = ?2, name_nonce = ?3, mime_type = ?4, mime_nonce = ?5,
                     content_nonce = ?6, size = ?7, modified_at = ?8
                 WHERE node_id = ?1",
                params![
                    n.id.as_bytes().as_slice(),
                    n.name.ciphertext,
                    n.name.nonce.as_bytes().as_slice(),
                    n.mime_type.ciphertext,
                    n.mime_type.nonce.as_bytes().as_slice(),
                    n.content_nonce.as_ref().map(|c| c.as_bytes().as_slice()),
                    n.size as i64,
                    n.modified_at,
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("node {}", n.id)));
            }
            Ok(())
        })
        .await
    }

    async fn list_children(&self, parent: &NodeId) -> Result<Vec<NodeRecord>> {
        let parent = *parent;
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {NODE_COLUMNS} FROM nodes WHERE parent_id = ?1 ORDER BY created_at, node_id"
            ))?;
            let children = stmt
                .query_map(params![parent.as_bytes().as_slice()], row_to_node)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(children)
        })
        .await
    }

    async fn commit_move(&self, commit: &MoveCommit) -> Result<()> {
        let c = commit.clone();
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current: Option<Option<Vec<u8>>> = tx
                .query_row(
                    "SELECT parent_id FROM nodes WHERE node_id = ?1",
                    params![c.node_id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            let current = current.ok_or_else(|| StoreError::NotFound(format!("node {}", c.node_id)))?;
            let current_parent = current
                .map(|b| {
                    NodeId::try_from(b.as_slice())
                        .map_err(|_| StoreError::InvalidData("malformed parent_id".into()))
                })
                .transpose()?;

            if current_parent != c.expected_parent {
                return Err(StoreError::Conflict(format!(
                    "node {} was moved concurrently",
                    c.node_id
                )));
            }

            if let Some(new_parent) = &c.new_parent {
                if !node_exists(&tx, new_parent)? {
                    return Err(StoreError::NotFound(format!("parent {}", new_parent)));
                }

                // UNION (not UNION ALL) stops the walk on a repeated id.
                let cyclic: bool = tx.query_row(
                    "WITH RECURSIVE ancestors(id) AS (
                        SELECT ?1
                        UNION
                        SELECT n.parent_id FROM nodes n JOIN ancestors a ON n.node_id = a.id
                        WHERE n.parent_id IS NOT NULL
                     )
                     SELECT EXISTS(SELECT 1 FROM ancestors WHERE id = ?2)",
                    params![new_parent.as_bytes().as_slice(), c.node_id.as_bytes().as_slice()],
                    |row| row.get(0),
                )?;
                if cyclic {
                    return Err(StoreError::Cycle(format!(
                        "{} is inside {}",
                        new_parent, c.node_id
                    )));
                }
            }

            tx.execute(
                "UPDATE nodes
                 SET parent_id = ?2, wrapped_key = ?3, wrap_nonce = ?4, wrap_ephemeral = ?5,
                     modified_at = ?6
                 WHERE node_id = ?1",
                params![
                    c.node_id.as_bytes().as_slice(),
                    c.new_parent.as_ref().map(|p| p.as_bytes().as_slice()),
                    c.wrapped_key.ciphertext(),
                    c.wrapped_key.nonce().as_bytes().as_slice(),
                    c.wrapped_key.ephemeral_public().map(|k| k.as_bytes().as_slice()),
                    c.modified_at,
                ],
            )?;

            tx.execute(
                "WITH RECURSIVE subtree(id) AS (
                    SELECT ?1
                    UNION
                    SELECT n.node_id FROM nodes n JOIN subtree s ON n.parent_id = s.id
                 )
                 UPDATE nodes SET owner_id = ?2 WHERE node_id IN (SELECT id FROM subtree)",
                params![c.node_id.as_bytes().as_slice(), c.owner.as_bytes().as_slice()],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grants
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_grant(&self, grant: &GrantRecord) -> Result<()> {
        let g = grant.clone();
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if !node_exists(&tx, &g.node_id)? {
                return Err(StoreError::NotFound(format!("node {}", g.node_id)));
            }

            let (kind, principal_id, link_id, password_salt) = grantee_columns(&g.grantee);
            tx.execute(
                &format!(
                    "INSERT INTO grants ({GRANT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    g.id.as_bytes().as_slice(),
                    g.node_id.as_bytes().as_slice(),
                    kind,
                    principal_id,
                    link_id,
                    password_salt,
                    g.edit,
                    g.expires_at,
                    g.wrapped_key.ciphertext(),
                    g.wrapped_key.nonce().as_bytes().as_slice(),
                    g.wrapped_key.ephemeral_public().map(|k| k.as_bytes().as_slice()),
                    g.created_by.as_bytes().as_slice(),
                    g.created_at,
                ],
            )
            .map_err(|e| conflict_on_constraint(e, format!("grant {}", g.id)))?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_grant(&self, id: &GrantId) -> Result<Option<GrantRecord>> {
        let id = *id;
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {GRANT_COLUMNS} FROM grants WHERE grant_id = ?1"),
                    params![id.as_bytes().as_slice()],
                    row_to_grant,
                )
                .optional()?)
        })
        .await
    }

    async fn get_link_grant(&self, link_id: &LinkId) -> Result<Option<GrantRecord>> {
        let link_id = *link_id;
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {GRANT_COLUMNS} FROM grants WHERE link_id = ?1"),
                    params![link_id.as_bytes().as_slice()],
                    row_to_grant,
                )
                .optional()?)
        })
        .await
    }

    async fn update_grant(&self, grant: &GrantRecord) -> Result<()> {
        let g = grant.clone();
        self.run(move |conn| {
            let (kind, principal_id, link_id, password_salt) = grantee_columns(&g.grantee);
            let updated = conn.execute(
                "UPDATE grants
                 SET password_salt = ?5, edit = ?6, expires_at = ?7, wrapped_key = ?8,
                     wrap_nonce = ?9, wrap_ephemeral = ?10
                 WHERE grant_id = ?1 AND grantee_kind = ?2
                   AND principal_id IS ?3 AND link_id IS ?4",
                params![
                    g.id.as_bytes().as_slice(),
                    kind,
                    principal_id,
                    link_id,
                    password_salt,
                    g.edit,
                    g.expires_at,
                    g.wrapped_key.ciphertext(),
                    g.wrapped_key.nonce().as_bytes().as_slice(),
                    g.wrapped_key.ephemeral_public().map(|k| k.as_bytes().as_slice()),
                ],
            )?;
            if updated == 0 {
                let exists = conn
                    .query_row(
                        "SELECT 1 FROM grants WHERE grant_id = ?1",
                        params![g.id.as_bytes().as_slice()],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                return Err(if exists {
                    StoreError::Conflict(format!("grant {} grantee changed", g.id))
                } else {
                    StoreError::NotFound(format!("grant {}", g.id))
                });
            }
            Ok(())
        })
        .await
    }

    async fn delete_grant(&self, id: &GrantId) -> Result<bool> {
        let id = *id;
        self.run(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM grants WHERE grant_id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn list_grants(&self, node_id: &NodeId) -> Result<Vec<GrantRecord>> {
        let node_id = *node_id;
        self.run(move |conn| grants_in(conn, &node_id)).await
    }

    async fn delete_expired_grants(&self, now: i64) -> Result<Vec<GrantId>> {
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let ids = {
                let mut stmt = tx.prepare(
                    "SELECT grant_id FROM grants
                     WHERE expires_at IS NOT NULL AND expires_at < ?1
                     ORDER BY grant_id",
                )?;
                let ids = stmt
                    .query_map(params![now], |row| fixed::<16>(row, "grant_id"))?
                    .map(|r| r.map(GrantId::from_bytes))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                ids
            };
            tx.execute(
                "DELETE FROM grants WHERE expires_at IS NOT NULL AND expires_at < ?1",
                params![now],
            )?;
            tx.commit()?;
            Ok(ids)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chains
    // ─────────────────────────────────────────────────────────────────────────

    async fn chain_snapshot(&self, node_id: &NodeId, max_depth: usize) -> Result<Option<ChainSnapshot>> {
        let target = *node_id;
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let mut links = Vec::new();
            let mut current = Some(target);

            while let Some(id) = current {
                if links.len() >= max_depth {
                    return Err(StoreError::InvalidData(format!(
                        "ancestor chain of {} exceeds {} nodes",
                        target, max_depth
                    )));
                }
                let node = match get_node_in(&tx, &id)? {
                    Some(node) => node,
                    None if links.is_empty() => return Ok(None),
                    None => return Err(StoreError::InvalidData(format!("dangling parent {}", id))),
                };
                current = node.parent;
                let grants = grants_in(&tx, &id)?;
                links.push(ChainLink { node, grants });
            }

            tx.commit()?;
            Ok(Some(ChainSnapshot::new(links)))
        })
        .await
    }
}
