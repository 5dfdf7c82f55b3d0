use std::{
    path::PathBuf,
    process::{Command, Stdio},
};

use super::Cipher;
use crate::{
    error::{Error, Result},
    keyfile::KeyFile,
};

/// Decrypts through the `openssl enc` command-line tool, passing the
/// plaintext key file as the passphrase source.
///
/// Compatible with files produced by
/// `openssl enc -aes-256-cbc -md sha256 -pass file:<key>`.
///
/// openssl only reads the first line of a `file:` passphrase. A key with
/// a newline or NUL before its end would silently decrypt under a prefix
/// of itself, so such keys are refused.
#[derive(Debug)]
pub struct OpensslCipher {
    program: PathBuf,
}

impl OpensslCipher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for OpensslCipher {
    fn default() -> Self {
        Self::new("openssl")
    }
}

impl Cipher for OpensslCipher {
    fn name(&self) -> &str {
        "openssl aes-256-cbc"
    }

    fn ensure_available(&self) -> Result<()> {
        let tool = self.program.display().to_string();
        let output = Command::new(&self.program)
            .arg("version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Environment {
                tool: tool.clone(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(Error::Environment {
                tool,
                reason: format!("`version` exited with {}", output.status),
            });
        }
        log::debug!("using {}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }

    fn decrypt_file(&self, key: &KeyFile, input: &std::path::Path) -> anyhow::Result<Vec<u8>> {
        check_passphrase(key.load()?.as_bytes())?;

        let mut pass = std::ffi::OsString::from("file:");
        pass.push(key.path());

        let output = Command::new(&self.program)
            .args(["enc", "-d", "-aes-256-cbc", "-md", "sha256", "-in"])
            .arg(input)
            .arg("-pass")
            .arg(pass)
            .stdin(Stdio::null())
            .output()?;

        anyhow::ensure!(
            output.status.success(),
            "openssl exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(output.stdout)
    }
}

/// The key must survive openssl's first-line read intact. A single
/// trailing newline is allowed since openssl strips it anyway.
fn check_passphrase(key: &[u8]) -> anyhow::Result<()> {
    let body = key.strip_suffix(b"\n").unwrap_or(key);
    anyhow::ensure!(!body.is_empty(), "data key is empty as an openssl passphrase");
    if let Some(pos) = body.iter().position(|&b| b == b'\n' || b == 0) {
        anyhow::bail!(
            "data key has a line break or NUL at byte {pos} of {}; openssl would only use the bytes before it",
            key.len()
        );
    }
    Ok(())
}
