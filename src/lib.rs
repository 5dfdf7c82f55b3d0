pub mod config;
pub mod crypto;
pub mod error;
pub mod interrupt;
pub mod keyfile;
pub mod kms;
pub mod shred;
pub mod tree;

pub use config::{CipherKind, Config, KmsConfig, KmsKind};
pub use crypto::Cipher;
pub use error::{Error, Result};
pub use keyfile::KeyFile;
pub use kms::KmsProvider;
pub use tree::{FileFailure, RunReport, TreeDecryptor};

/// Build the KMS backend named in the configuration.
pub fn kms_provider(cfg: &KmsConfig) -> Box<dyn KmsProvider> {
    match cfg.kind {
        KmsKind::AwsCli => Box::new(
            kms::cli::AwsCliProvider::new(cfg.region.clone(), cfg.key_id.clone())
                .timeout(cfg.timeout),
        ),
        KmsKind::Http => Box::new(
            kms::cloud::HttpKmsProvider::new(cfg.endpoint.clone(), cfg.key_id.clone())
                .timeout(cfg.timeout),
        ),
    }
}

/// Build the cipher backend named in the configuration.
pub fn cipher(config: &Config) -> Box<dyn Cipher> {
    match config.cipher {
        CipherKind::Openssl => Box::new(crypto::openssl::OpensslCipher::new(
            config.openssl_program.clone(),
        )),
        CipherKind::AesGcm => Box::new(crypto::aes::AesGcmCipher::new()),
    }
}

/// One full run: check preconditions, recover the data key, decrypt the
/// tree, erase the key.
///
/// Precondition failures return before any key material is written. Once
/// the key file exists it is erased on every path out of this function,
/// and termination signals are trapped (see [`interrupt`]).
pub fn run(config: &Config, kms: &dyn KmsProvider, cipher: &dyn Cipher) -> Result<RunReport> {
    if !config.blob_path.exists() {
        return Err(Error::MissingInput(config.blob_path.clone()));
    }
    cipher.ensure_available()?;

    let key = KeyFile::recover(config, kms)?;
    interrupt::install();
    log::debug!(
        "decrypting {} -> {} with {}",
        config.source_dir.display(),
        config.dest_dir.display(),
        cipher.name()
    );
    let report = TreeDecryptor::new(&config.source_dir, &config.dest_dir, cipher).run(&key)?;

    match key.erase() {
        Ok(()) => {
            log::debug!("erased {}", config.key_path.display());
            Ok(report)
        }
        Err(Error::Erase { path, source, .. }) => Err(Error::Erase {
            path,
            source,
            report: Some(report),
        }),
        Err(e) => Err(e),
    }
}
