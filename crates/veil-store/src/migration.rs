//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection, now: i64) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{} is newer than supported v{}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Registered principals
        CREATE TABLE principals (
            principal_id BLOB PRIMARY KEY,        -- 16 bytes
            public_key BLOB NOT NULL,             -- 32 bytes, X25519
            wrapped_private_key BLOB NOT NULL,    -- AEAD ciphertext
            private_key_nonce BLOB NOT NULL,      -- 12 bytes
            key_salt BLOB NOT NULL,               -- 16 bytes
            auth_salt BLOB NOT NULL,              -- 16 bytes
            password_verifier BLOB NOT NULL,      -- 32 bytes
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Files and folders
        CREATE TABLE nodes (
            node_id BLOB PRIMARY KEY,             -- 16 bytes
            parent_id BLOB REFERENCES nodes(node_id),  -- NULL for roots
            owner_id BLOB NOT NULL,
            kind INTEGER NOT NULL,                -- 0=file, 1=folder
            wrapped_key BLOB NOT NULL,
            wrap_nonce BLOB NOT NULL,
            wrap_ephemeral BLOB,                  -- set when sealed to a public key
            name BLOB NOT NULL,
            name_nonce BLOB NOT NULL,
            mime_type BLOB NOT NULL,
            mime_nonce BLOB NOT NULL,
            content_nonce BLOB,
            size INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            modified_at INTEGER NOT NULL
        );

        -- User and link grants
        CREATE TABLE grants (
            grant_id BLOB PRIMARY KEY,
            node_id BLOB NOT NULL REFERENCES nodes(node_id),
            grantee_kind INTEGER NOT NULL,        -- 0=user, 1=link
            principal_id BLOB,                    -- user grants
            link_id BLOB UNIQUE,                  -- link grants
            password_salt BLOB,                   -- password-protected links
            edit INTEGER NOT NULL,
            expires_at INTEGER,
            wrapped_key BLOB NOT NULL,
            wrap_nonce BLOB NOT NULL,
            wrap_ephemeral BLOB,
            created_by BLOB NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX idx_nodes_parent ON nodes(parent_id);
        CREATE INDEX idx_grants_node ON grants(node_id);
        CREATE INDEX idx_grants_expiry ON grants(expires_at) WHERE expires_at IS NOT NULL;
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn, 0).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in ["principals", "nodes", "grants", "schema_migrations"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn, 0).unwrap();
        migrate(&mut conn, 1).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn, 0).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn, 0), Err(StoreError::Migration(_))));
    }
}
