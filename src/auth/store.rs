//! SQLite-backed credential store.
//!
//! Table:
//! - `users`: id, username (UNIQUE), password_hash, created_at
//!
//! Duplicate usernames are rejected by the UNIQUE constraint itself, so two
//! concurrent registrations can never both succeed.

use super::error::StoreError;
use super::hashing::StoredHash;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ValueRef;
use rusqlite::OptionalExtension;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// How long a writer waits on SQLite's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: u32 = 8;

/// Store-assigned user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a lookup hands back to the gate.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub id: UserId,
    pub hash: StoredHash,
}

/// Persistence for `(username, password_hash)` records.
///
/// Only creation and lookup exist; records are never updated or deleted.
pub trait CredentialStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::DuplicateUsername`] if the
    /// username is taken, leaving the existing record untouched.
    fn register(&self, username: &str, hash: &StoredHash) -> Result<UserId, StoreError>;

    /// Fetch the record for `username`; absence is `Ok(None)`.
    fn lookup(&self, username: &str) -> Result<Option<StoredCredential>, StoreError>;
}

/// Pooled SQLite implementation of [`CredentialStore`].
pub struct SqliteCredentialStore {
    pool: r2d2::Pool<SqliteConnectionManager>,
}

impl SqliteCredentialStore {
    /// Open (or create) the credential database at the given path.
    pub fn open(db_path: &Path, pool_size: u32) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA synchronous = NORMAL;")
        });
        let pool = r2d2::Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)?;

        let store = Self { pool };
        store.migrate(true)?;
        Ok(store)
    }

    /// Private in-memory database. A single connection is kept for the life of
    /// the pool because every new `:memory:` connection is a fresh database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(SqliteConnectionManager::memory())?;

        let store = Self { pool };
        store.migrate(false)?;
        Ok(store)
    }

    fn migrate(&self, wal: bool) -> Result<(), StoreError> {
        let conn = self.pool.get()?;

        // WAL mode for concurrent reads + crash safety
        if wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL CHECK (length(password_hash) > 0),
                created_at INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Count registered users.
    pub fn user_count(&self) -> Result<u64, StoreError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn register(&self, username: &str, hash: &StoredHash) -> Result<UserId, StoreError> {
        let conn = self.pool.get()?;
        let result = conn.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![username, hash.as_str(), chrono::Utc::now().timestamp()],
        );

        match result {
            Ok(_) => Ok(UserId(conn.last_insert_rowid())),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(StoreError::DuplicateUsername)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn lookup(&self, username: &str) -> Result<Option<StoredCredential>, StoreError> {
        let conn = self.pool.get()?;
        let row = conn
            .query_row(
                "SELECT id, password_hash FROM users WHERE username = ?1",
                rusqlite::params![username],
                |row| {
                    let id: i64 = row.get(0)?;
                    // Older databases stored the hash as a BLOB. Bytes that are
                    // not UTF-8 become an empty hash, which verifies as corrupt.
                    let hash = match row.get_ref(1)? {
                        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                            std::str::from_utf8(bytes).unwrap_or_default().to_owned()
                        }
                        _ => String::new(),
                    };
                    Ok(StoredCredential {
                        id: UserId(id),
                        hash: StoredHash::from_stored(hash),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hashing::{HashingPolicy, Verification};
    use std::sync::{Arc, Barrier};
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SqliteCredentialStore) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("credentials.db");
        let store = SqliteCredentialStore::open(&db_path, 4).unwrap();
        (tmp, store)
    }

    fn hash_of(password: &str) -> StoredHash {
        HashingPolicy::new(1_000).hash(password).unwrap()
    }

    #[test]
    fn register_and_lookup() {
        let (_tmp, store) = test_store();
        let hash = hash_of("s3cr3t");

        let id = store.register("alice", &hash).unwrap();
        let found = store.lookup("alice").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.hash, hash);
    }

    #[test]
    fn lookup_missing_user_is_none() {
        let (_tmp, store) = test_store();
        assert!(store.lookup("ghost").unwrap().is_none());
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let (_tmp, store) = test_store();
        let a = store.register("user_a", &hash_of("pw")).unwrap();
        let b = store.register("user_b", &hash_of("pw")).unwrap();
        assert!(b > a);
        assert_eq!(store.user_count().unwrap(), 2);
    }

    #[test]
    fn duplicate_username_fails_and_keeps_original_hash() {
        let (_tmp, store) = test_store();
        let original = hash_of("first");
        let id = store.register("alice", &original).unwrap();

        let result = store.register("alice", &hash_of("second"));
        assert!(matches!(result, Err(StoreError::DuplicateUsername)));

        let found = store.lookup("alice").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.hash, original);
        assert_eq!(store.user_count().unwrap(), 1);
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let (_tmp, store) = test_store();
        store.register("Alice", &hash_of("pw")).unwrap();
        store.register("alice", &hash_of("pw")).unwrap();
        assert!(store.lookup("ALICE").unwrap().is_none());
        assert_eq!(store.user_count().unwrap(), 2);
    }

    #[test]
    fn empty_hash_is_refused_by_schema() {
        let (_tmp, store) = test_store();
        let result = store.register("alice", &StoredHash::from_stored(""));
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.lookup("alice").unwrap().is_none());
    }

    #[test]
    fn records_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("credentials.db");
        let hash = hash_of("s3cr3t");
        let id = {
            let store = SqliteCredentialStore::open(&db_path, 2).unwrap();
            store.register("alice", &hash).unwrap()
        };

        let reopened = SqliteCredentialStore::open(&db_path, 2).unwrap();
        let found = reopened.lookup("alice").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.hash, hash);
    }

    #[test]
    fn blob_hashes_are_read_back() {
        let (_tmp, store) = test_store();
        let hash = hash_of("s3cr3t");
        {
            let conn = store.pool.get().unwrap();
            conn.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, 0)",
                rusqlite::params!["legacy", hash.as_str().as_bytes()],
            )
            .unwrap();
        }

        let found = store.lookup("legacy").unwrap().unwrap();
        assert_eq!(found.hash, hash);
    }

    #[test]
    fn non_utf8_blob_reads_back_as_corrupt() {
        let (_tmp, store) = test_store();
        {
            let conn = store.pool.get().unwrap();
            conn.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, 0)",
                rusqlite::params!["mangled", vec![0xffu8, 0xfe, 0x24, 0x70]],
            )
            .unwrap();
        }

        let found = store.lookup("mangled").unwrap().unwrap();
        assert_eq!(found.hash.as_str(), "");
        assert_eq!(
            HashingPolicy::new(1_000).verify("anything", &found.hash),
            Verification::Corrupt
        );
    }

    #[test]
    fn in_memory_store_keeps_records() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        store.register("alice", &hash_of("pw")).unwrap();
        assert!(store.lookup("alice").unwrap().is_some());
        assert!(matches!(
            store.register("alice", &hash_of("pw")),
            Err(StoreError::DuplicateUsername)
        ));
    }

    #[test]
    fn concurrent_registration_has_single_winner() {
        let (_tmp, store) = test_store();
        let store = Arc::new(store);
        let hash = hash_of("pw");
        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let hash = hash.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store.register("racer", &hash)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let created = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::DuplicateUsername)))
            .count();
        assert_eq!(created, 1);
        assert_eq!(duplicates, workers - 1);
        assert_eq!(store.user_count().unwrap(), 1);
    }
}
