use core_logic::{StoredWallet, WalletError};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use ethers::utils::to_checksum;

/// Generates a fresh random keypair.
///
/// The address is EIP-55 checksummed and the key is `0x` + 64 lowercase hex chars.
pub fn create_wallet() -> StoredWallet {
    let wallet = LocalWallet::new(&mut ethers::core::rand::thread_rng());
    let private_key = format!("0x{}", hex::encode(wallet.signer().to_bytes()));
    StoredWallet::new(to_checksum(&wallet.address(), None), private_key)
}

/// Parses a `0x`-prefixed hex private key into a chain-bound signer.
pub fn signer_from_key(private_key: &str, chain_id: u64) -> Result<LocalWallet, WalletError> {
    let hex_part = private_key.strip_prefix("0x").unwrap_or(private_key);
    if hex_part.len() != 64 {
        return Err(WalletError::InvalidKeyLength {
            length: hex_part.len(),
        });
    }
    let wallet = hex_part
        .parse::<LocalWallet>()
        .map_err(|_| WalletError::InvalidKeyFormat)?;
    Ok(wallet.with_chain_id(chain_id))
}

/// Returns the EIP-55 checksummed form of `address`.
///
/// Mixed-case input with a wrong checksum is accepted and normalized, so
/// applying this twice gives the same string.
pub fn normalize_address(address: &str) -> Result<String, WalletError> {
    parse_address(address).map(|a| to_checksum(&a, None))
}

pub fn parse_address(address: &str) -> Result<Address, WalletError> {
    let trimmed = address.trim();
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(WalletError::InvalidAddress {
            address: trimmed.to_string(),
            reason: "expected 0x followed by 40 hex characters".to_string(),
        });
    }
    trimmed
        .parse::<Address>()
        .map_err(|e| WalletError::InvalidAddress {
            address: trimmed.to_string(),
            reason: e.to_string(),
        })
}
