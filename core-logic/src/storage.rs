//! # Storage Backends
//!
//! Implementations of [`Store`] for the two files the bot keeps on disk
//! (the proxy list and the funded-wallet list) plus an SQLite alternative
//! for wallets.
//!
//! Flat files are always rewritten in full. The new contents go to a sibling
//! temp file first and are then renamed over the target, so a crash mid-write
//! leaves either the old list or the new one on disk.

use crate::config::ProxyEndpoint;
use crate::error::StorageError;
use crate::traits::Store;
use crate::utils::StoredWallet;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

async fn write_replace(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let io_err = |source| StorageError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}

async fn read_optional(path: &Path) -> Result<Option<String>, StorageError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

// --- Line-delimited proxy file ---

/// `proxy.txt`: one endpoint per line, blank lines ignored.
#[derive(Debug, Clone)]
pub struct LineFileStore {
    path: PathBuf,
}

impl LineFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Store<ProxyEndpoint> for LineFileStore {
    async fn load(&self) -> Result<Vec<ProxyEndpoint>, StorageError> {
        let Some(content) = read_optional(&self.path).await? else {
            return Ok(Vec::new());
        };
        Ok(content.lines().filter_map(ProxyEndpoint::parse_line).collect())
    }

    async fn rewrite(&self, items: &[ProxyEndpoint]) -> Result<(), StorageError> {
        let mut out = String::with_capacity(items.len() * 24);
        for p in items {
            out.push_str(p.as_str());
            out.push('\n');
        }
        write_replace(&self.path, out.as_bytes()).await?;
        debug!("Rewrote {} with {} entries", self.path.display(), items.len());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// --- Pretty-printed JSON array ---

/// A JSON array file holding any serializable record type.
#[derive(Debug, Clone)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<T> Store<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn load(&self) -> Result<Vec<T>, StorageError> {
        let Some(content) = read_optional(&self.path).await? else {
            return Ok(Vec::new());
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| StorageError::Malformed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn rewrite(&self, items: &[T]) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(items).map_err(|e| StorageError::Malformed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        write_replace(&self.path, &json).await
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// --- SQLite wallet table ---

/// Funded wallets in an SQLite table, ordered by insertion position.
#[derive(Debug, Clone)]
pub struct SqliteWalletStore {
    pool: SqlitePool,
    path: String,
}

impl SqliteWalletStore {
    pub async fn open(db_path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        // One connection: rewrites are whole-table transactions.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS wallets (
                position INTEGER PRIMARY KEY,
                address TEXT NOT NULL,
                private_key TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            path: db_path.to_string(),
        })
    }
}

#[async_trait]
impl Store<StoredWallet> for SqliteWalletStore {
    async fn load(&self) -> Result<Vec<StoredWallet>, StorageError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT address, private_key FROM wallets ORDER BY position")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(address, private_key)| StoredWallet::new(address, private_key))
            .collect())
    }

    async fn rewrite(&self, items: &[StoredWallet]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM wallets").execute(&mut *tx).await?;
        for (position, wallet) in items.iter().enumerate() {
            sqlx::query("INSERT INTO wallets (position, address, private_key) VALUES (?, ?, ?)")
                .bind(position as i64)
                .bind(&wallet.address)
                .bind(&wallet.private_key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite://{}", self.path)
    }
}
