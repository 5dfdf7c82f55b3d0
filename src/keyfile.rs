//! Plaintext data key lifecycle: recover once, erase always.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use zeroize::Zeroizing;

use crate::{
    config::Config,
    crypto::keys::DataKey,
    error::{Error, Result},
    kms::KmsProvider,
    shred,
};

/// Guard over the plaintext key file on local storage.
///
/// The file is securely erased when the guard is dropped, so every exit
/// path after recovery (error returns, panics, interruption) cleans up.
/// Call [`KeyFile::erase`] on the success path to observe erase errors.
#[derive(Debug)]
pub struct KeyFile {
    path: PathBuf,
    passes: u32,
    erased: bool,
}

impl KeyFile {
    /// Make sure the plaintext data key exists at `config.key_path`.
    ///
    /// The KMS is only called when the key file is absent. A present key
    /// file is trusted as-is.
    pub fn recover(config: &Config, kms: &dyn KmsProvider) -> Result<KeyFile> {
        if !config.blob_path.exists() {
            return Err(Error::MissingInput(config.blob_path.clone()));
        }

        let guard = KeyFile {
            path: config.key_path.clone(),
            passes: config.shred_passes,
            erased: false,
        };

        if guard.path.exists() {
            log::debug!(
                "plaintext key already at {}, skipping KMS",
                guard.path.display()
            );
            return Ok(guard);
        }

        let blob = std::fs::read(&config.blob_path)
            .map_err(|e| Error::io(&config.blob_path, e))?;
        log::debug!(
            "unwrapping {} byte blob from {}",
            blob.len(),
            config.blob_path.display()
        );
        let plaintext = Zeroizing::new(kms.unwrap_blob(&blob).map_err(Error::Kms)?);

        guard.write(&plaintext)?;
        log::debug!(
            "recovered {} byte data key into {}",
            plaintext.len(),
            guard.path.display()
        );
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the key bytes into memory.
    pub fn load(&self) -> anyhow::Result<DataKey> {
        let bytes = std::fs::read(&self.path)?;
        anyhow::ensure!(!bytes.is_empty(), "key file {} is empty", self.path.display());
        Ok(DataKey::from_bytes(bytes))
    }

    /// Securely erase the key file now.
    pub fn erase(mut self) -> Result<()> {
        self.erased = true;
        shred::shred_file(&self.path, self.passes)
            .map(|_| ())
            .map_err(|source| Error::Erase {
                path: self.path.clone(),
                source,
                report: None,
            })
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let mut opts = OpenOptions::new();
        opts.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }

        let mut file = opts.open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        file.write_all(bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| Error::io(&self.path, e))
    }
}

impl Drop for KeyFile {
    fn drop(&mut self) {
        if self.erased {
            return;
        }
        match shred::shred_file(&self.path, self.passes) {
            Ok(true) => log::debug!("erased {} on drop", self.path.display()),
            Ok(false) => {}
            Err(e) => log::error!(
                "failed to erase plaintext key {}: {e}",
                self.path.display()
            ),
        }
    }
}
