use crate::error::StorageError;
use crate::traits::Store;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A generated wallet as it is written to the key file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct StoredWallet {
    pub address: String,
    pub private_key: String,
}

impl StoredWallet {
    pub fn new(address: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            private_key: private_key.into(),
        }
    }

    /// `0x1234...abcd` form used in log lines.
    pub fn short_address(&self) -> String {
        let chars: Vec<char> = self.address.chars().collect();
        if chars.len() <= 10 {
            return self.address.clone();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl fmt::Debug for StoredWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredWallet")
            .field("address", &self.address)
            .field("private_key", &"***REDACTED***")
            .finish()
    }
}

/// Funded wallets, in the order they were funded.
///
/// Appends go straight to the backing store: after `append` returns `Ok`, the
/// store holds every wallet appended so far and nothing else.
pub struct KeyStore {
    wallets: Vec<StoredWallet>,
    store: Box<dyn Store<StoredWallet>>,
}

impl KeyStore {
    /// Starts an empty key store. Nothing is written until the first append.
    pub fn fresh<S>(store: S) -> Self
    where
        S: Store<StoredWallet> + 'static,
    {
        Self {
            wallets: Vec::new(),
            store: Box::new(store),
        }
    }

    /// Loads whatever the store already holds.
    pub async fn open<S>(store: S) -> Result<Self, StorageError>
    where
        S: Store<StoredWallet> + 'static,
    {
        let wallets = store.load().await?;
        info!("Loaded {} wallets from {}", wallets.len(), store.describe());
        Ok(Self {
            wallets,
            store: Box::new(store),
        })
    }

    /// Appends one wallet and rewrites the store.
    ///
    /// On failure the wallet is dropped from memory again, keeping the list
    /// identical to what is on disk.
    pub async fn append(&mut self, wallet: StoredWallet) -> Result<(), StorageError> {
        self.wallets.push(wallet);
        if let Err(e) = self.store.rewrite(&self.wallets).await {
            self.wallets.pop();
            return Err(e);
        }
        debug!(
            "Key store {} now holds {} wallets",
            self.store.describe(),
            self.wallets.len()
        );
        Ok(())
    }

    pub fn wallets(&self) -> &[StoredWallet] {
        &self.wallets
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn location(&self) -> String {
        self.store.describe()
    }
}
