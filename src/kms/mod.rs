pub mod cli;
pub mod cloud;

use base64::{Engine as _, engine::general_purpose::STANDARD};

/// Remote key-management service able to unwrap a data key.
pub trait KmsProvider {
    /// Send the wrapped key blob to the KMS and return the plaintext
    /// data key bytes.
    fn unwrap_blob(&self, ciphertext: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// Decode the base64 `Plaintext` field a KMS returns.
pub(crate) fn decode_plaintext(text: &str) -> anyhow::Result<Vec<u8>> {
    let trimmed = text.trim();
    anyhow::ensure!(!trimmed.is_empty(), "KMS returned an empty plaintext");
    let bytes = STANDARD
        .decode(trimmed)
        .map_err(|e| anyhow::anyhow!("KMS plaintext is not valid base64: {e}"))?;
    anyhow::ensure!(!bytes.is_empty(), "KMS returned a zero-length key");
    Ok(bytes)
}

pub(crate) fn encode_blob(ciphertext: &[u8]) -> String {
    STANDARD.encode(ciphertext)
}
