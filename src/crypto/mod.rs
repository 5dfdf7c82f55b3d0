pub mod aes;
pub mod keys;
pub mod openssl;

use std::path::Path;

use crate::{error::Result, keyfile::KeyFile};

/// A symmetric decrypt primitive applied to one file at a time.
pub trait Cipher {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Fail with [`crate::Error::Environment`] when a required external
    /// tool is missing. Checked once before any key material exists.
    fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    /// Decrypt the file at `input` with the recovered data key and
    /// return the plaintext. Nothing is written on failure.
    fn decrypt_file(&self, key: &KeyFile, input: &Path) -> anyhow::Result<Vec<u8>>;
}
