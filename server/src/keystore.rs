//! Account keystore, optionally sealed under a passphrase.

use crate::error::Error;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Sealed section of a keystore file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Crypto {
    /// Base64 of the 12-byte nonce.
    pub nonce: String,
    /// Base64 of the sealed [Account] JSON.
    pub ciphertext: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct File {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crypto: Option<Crypto>,
}

/// Account the ingress sends on-chain transactions from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
}

fn cipher(passphrase: &str) -> ChaCha20Poly1305 {
    let key = Sha256::digest(passphrase.as_bytes());
    ChaCha20Poly1305::new(Key::from_slice(&key))
}

/// Read the keystore at `path`.
///
/// An empty `passphrase` expects a plaintext keystore.
pub fn load(path: &Path, passphrase: &str) -> Result<Account, Error> {
    let raw = std::fs::read(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&raw, passphrase)
}

fn parse(raw: &[u8], passphrase: &str) -> Result<Account, Error> {
    let file: File = serde_json::from_slice(raw)?;
    if passphrase.is_empty() {
        let address = file.address.ok_or(Error::MissingAddress)?;
        return Ok(Account { address });
    }

    let crypto = file.crypto.ok_or(Error::Decrypt)?;
    let nonce = STANDARD
        .decode(&crypto.nonce)
        .map_err(|_| Error::Base64("nonce"))?;
    if nonce.len() != 12 {
        return Err(Error::Length {
            field: "nonce",
            expected: 12,
            actual: nonce.len(),
        });
    }
    let ciphertext = STANDARD
        .decode(&crypto.ciphertext)
        .map_err(|_| Error::Base64("ciphertext"))?;
    let plaintext = cipher(passphrase)
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| Error::Decrypt)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Seal `account` under `passphrase`, returning the keystore JSON.
    fn seal(account: &Account, passphrase: &str, nonce: [u8; 12]) -> Result<String, Error> {
        let plaintext = serde_json::to_vec(account)?;
        let ciphertext = cipher(passphrase)
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| Error::Decrypt)?;
        let file = File {
            address: None,
            crypto: Some(Crypto {
                nonce: STANDARD.encode(nonce),
                ciphertext: STANDARD.encode(ciphertext),
            }),
        };
        Ok(serde_json::to_string(&file)?)
    }

    fn account() -> Account {
        Account {
            address: "0x3ccb0af2bfab2e3c1ee7d5e9e2b3ea8b0a6e5c1d".into(),
        }
    }

    #[test]
    fn test_plaintext() {
        let raw = serde_json::to_vec(&account()).unwrap();
        assert_eq!(parse(&raw, "").unwrap(), account());
        assert!(matches!(parse(b"{}", ""), Err(Error::MissingAddress)));
    }

    #[test]
    fn test_sealed() {
        let sealed = seal(&account(), "hunter2", [3; 12]).unwrap();
        assert_eq!(parse(sealed.as_bytes(), "hunter2").unwrap(), account());
        assert!(matches!(
            parse(sealed.as_bytes(), "hunter3"),
            Err(Error::Decrypt)
        ));

        // A sealed keystore has no plaintext address
        assert!(matches!(
            parse(sealed.as_bytes(), ""),
            Err(Error::MissingAddress)
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = load(Path::new("/nonexistent/keystore.json"), "");
        assert!(matches!(result, Err(Error::Read { .. })));
    }
}
