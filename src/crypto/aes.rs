use std::path::Path;

use aes_gcm::{Aes256Gcm, KeyInit, Nonce, aead::Aead};

use super::{
    Cipher,
    keys::{DataKey, KEY_LEN},
};
use crate::keyfile::KeyFile;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Native AES-256-GCM over whole files.
///
/// Layout of an encrypted file:
/// ```text
/// [ nonce (12) | ciphertext ... | tag (16) ]
/// ```
#[derive(Debug, Default)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    pub fn new() -> Self {
        Self
    }

    /// Encrypt `plaintext` under `key` with a fresh random nonce.
    pub fn encrypt(&self, key: &DataKey, plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
        let cipher = new_cipher(key)?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| anyhow::anyhow!("getrandom failed: {e}"))?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let sealed = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| anyhow::anyhow!("encrypt failed: {e}"))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub fn decrypt_with(&self, key: &DataKey, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        anyhow::ensure!(
            data.len() >= NONCE_LEN + TAG_LEN,
            "ciphertext is {} bytes, shorter than nonce + tag ({})",
            data.len(),
            NONCE_LEN + TAG_LEN
        );
        let cipher = new_cipher(key)?;
        let (nonce_bytes, sealed) = data.split_at(NONCE_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| anyhow::anyhow!("decrypt failed: authentication tag mismatch"))
    }
}

impl Cipher for AesGcmCipher {
    fn name(&self) -> &str {
        "aes-256-gcm"
    }

    fn decrypt_file(&self, key: &KeyFile, input: &Path) -> anyhow::Result<Vec<u8>> {
        let data = std::fs::read(input)?;
        let dek = key.load()?;
        self.decrypt_with(&dek, &data)
    }
}

fn new_cipher(key: &DataKey) -> anyhow::Result<Aes256Gcm> {
    anyhow::ensure!(
        key.len() == KEY_LEN,
        "data key is {} bytes, expected {KEY_LEN}",
        key.len()
    );
    Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|e| anyhow::anyhow!("invalid key: {e}"))
}
