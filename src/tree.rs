//! Mirror-decrypt a source tree into a destination tree.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::Context;
use walkdir::{DirEntry, WalkDir};

use crate::{
    crypto::Cipher,
    error::{Error, Result},
    interrupt,
    keyfile::KeyFile,
};

/// One file that could not be decrypted.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    /// Files successfully decrypted.
    pub decrypted: usize,
    pub failures: Vec<FileFailure>,
}

impl RunReport {
    /// Regular, non-hidden files seen, whether they succeeded or not.
    pub fn processed(&self) -> usize {
        self.decrypted + self.failures.len()
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct TreeDecryptor<'a> {
    source: &'a Path,
    dest: &'a Path,
    cipher: &'a dyn Cipher,
    stop: &'a AtomicBool,
}

impl<'a> TreeDecryptor<'a> {
    pub fn new(source: &'a Path, dest: &'a Path, cipher: &'a dyn Cipher) -> Self {
        Self {
            source,
            dest,
            cipher,
            stop: interrupt::flag(),
        }
    }

    /// Replace the process-wide interrupt flag.
    pub fn stop_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.stop = flag;
        self
    }

    /// Decrypt every regular, non-hidden file under the source root.
    ///
    /// Per-file failures are collected and the walk continues. Only an
    /// interrupt aborts the walk. The flag is also checked before the
    /// first and after the last file.
    pub fn run(&self, key: &KeyFile) -> Result<RunReport> {
        let mut report = RunReport::default();
        self.check_stop(&report)?;

        if !self.source.exists() {
            log::warn!(
                "source tree {} does not exist, nothing to decrypt",
                self.source.display()
            );
            return Ok(report);
        }

        let walker = WalkDir::new(self.source)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            self.check_stop(&report)?;

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.source.to_path_buf());
                    log::warn!("cannot read {}: {e}", path.display());
                    report.failures.push(FileFailure {
                        path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            match self.decrypt_one(key, entry.path()) {
                Ok(out) => {
                    log::debug!("{} -> {}", entry.path().display(), out.display());
                    report.decrypted += 1;
                }
                Err(e) => {
                    log::warn!("failed to decrypt {}: {e:#}", entry.path().display());
                    report.failures.push(FileFailure {
                        path: entry.path().to_path_buf(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        self.check_stop(&report)?;
        Ok(report)
    }

    fn check_stop(&self, report: &RunReport) -> Result<()> {
        if self.stop.load(Ordering::SeqCst) {
            log::warn!("interrupted after {} file(s)", report.processed());
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    fn decrypt_one(&self, key: &KeyFile, input: &Path) -> anyhow::Result<PathBuf> {
        let output = destination_for(self.source, self.dest, input)?;
        let plaintext = self
            .cipher
            .decrypt_file(key, input)
            .with_context(|| format!("{} decrypt", self.cipher.name()))?;

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        std::fs::write(&output, &plaintext)
            .with_context(|| format!("write {}", output.display()))?;
        Ok(output)
    }
}

/// Map a path under `source_root` to the same relative path under
/// `dest_root`.
pub fn destination_for(
    source_root: &Path,
    dest_root: &Path,
    path: &Path,
) -> anyhow::Result<PathBuf> {
    let rel = path.strip_prefix(source_root).with_context(|| {
        format!(
            "{} is not under {}",
            path.display(),
            source_root.display()
        )
    })?;
    Ok(dest_root.join(rel))
}

/// Dot-prefixed entries below the root. The root itself is never hidden,
/// even though it is conventionally named `.encrypted`.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}
