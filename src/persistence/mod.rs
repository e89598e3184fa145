//! Durable client-side state behind a small `load`/`save` repository.
//!
//! Two independent namespaces are kept: deal plans (keyed `accountId:weekKey`)
//! and a flat context cache. Backends are swappable: in-memory for tests, a
//! JSON file per namespace, or a SQLite key-value table. Last writer wins;
//! there is no merge or conflict detection.

use std::fmt;

use thiserror::Error;

pub mod json_file;
pub mod memory;
pub mod sqlite;

pub use json_file::JsonFileRepository;
pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// Errors specific to persistence backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

impl StoreError {
    /// Transient failures worth retrying (busy database, interrupted IO).
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            StoreError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

/// Top-level storage namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    DealPlans,
    Context,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::DealPlans => "deal_plans",
            Namespace::Context => "context",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value persistence for serialized JSON values.
///
/// Implementations must make a successful `save` visible to the next `load`
/// in the same process.
pub trait StateRepository: Send + Sync {
    fn load(&self, namespace: Namespace, key: &str) -> Result<Option<String>, StoreError>;

    fn save(&self, namespace: Namespace, key: &str, value: &str) -> Result<(), StoreError>;

    /// All keys stored under a namespace, sorted ascending.
    fn keys(&self, namespace: Namespace) -> Result<Vec<String>, StoreError>;
}

/// Load and deserialize a value, treating a missing key as `None`.
pub fn load_json<T: serde::de::DeserializeOwned>(
    repo: &dyn StateRepository,
    namespace: Namespace,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match repo.load(namespace, key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize and save a value.
pub fn save_json<T: serde::Serialize>(
    repo: &dyn StateRepository,
    namespace: Namespace,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    repo.save(namespace, key, &raw)
}
