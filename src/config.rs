//! Run configuration, constructed once at startup and passed down.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Default number of random overwrite passes before the final zero pass.
pub const DEFAULT_SHRED_PASSES: u32 = 100;

/// Default bound on a single KMS unwrap call.
pub const DEFAULT_KMS_TIMEOUT: Duration = Duration::from_secs(30);

const KEY_DIR: &str = ".key";
const BLOB_FILE: &str = "ciphertext_blob_decoded";
const KEY_FILE: &str = "plaintext_key_decoded";
const SOURCE_DIR: &str = ".encrypted";
const DEST_DIR: &str = ".decrypted";

/// Which symmetric cipher decrypts the files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CipherKind {
    /// `openssl enc -d -aes-256-cbc` with the key file as passphrase.
    #[default]
    Openssl,
    /// Native AES-256-GCM, `[nonce | ciphertext | tag]` per file.
    AesGcm,
}

/// How the wrapped key blob is sent to the KMS.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum KmsKind {
    /// Shell out to `aws kms decrypt`.
    #[default]
    AwsCli,
    /// POST the KMS JSON API directly.
    Http,
}

#[derive(Clone, Debug)]
pub struct KmsConfig {
    pub kind: KmsKind,
    /// Endpoint override for [`KmsKind::Http`].
    pub endpoint: Option<String>,
    pub key_id: Option<String>,
    pub region: Option<String>,
    /// Upper bound on connecting to and hearing back from the KMS.
    pub timeout: Duration,
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            kind: KmsKind::default(),
            endpoint: None,
            key_id: None,
            region: None,
            timeout: DEFAULT_KMS_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Wrapped key blob, required input.
    pub blob_path: PathBuf,
    /// Plaintext data key, transient for one run.
    pub key_path: PathBuf,
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub shred_passes: u32,
    pub cipher: CipherKind,
    pub openssl_program: PathBuf,
    pub kms: KmsConfig,
}

impl Config {
    /// Standard layout under a project root:
    ///
    /// ```text
    /// <root>/.key/ciphertext_blob_decoded
    /// <root>/.key/plaintext_key_decoded
    /// <root>/.encrypted/**
    /// <root>/.decrypted/**
    /// ```
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let key_dir = root.join(KEY_DIR);
        Self {
            blob_path: key_dir.join(BLOB_FILE),
            key_path: key_dir.join(KEY_FILE),
            source_dir: root.join(SOURCE_DIR),
            dest_dir: root.join(DEST_DIR),
            shred_passes: DEFAULT_SHRED_PASSES,
            cipher: CipherKind::default(),
            openssl_program: PathBuf::from("openssl"),
            kms: KmsConfig::default(),
        }
    }

    pub fn shred_passes(mut self, passes: u32) -> Self {
        self.shred_passes = passes;
        self
    }

    pub fn cipher(mut self, cipher: CipherKind) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn openssl_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.openssl_program = program.into();
        self
    }

    pub fn kms(mut self, kms: KmsConfig) -> Self {
        self.kms = kms;
        self
    }
}
