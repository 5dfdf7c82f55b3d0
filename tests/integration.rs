use std::{
    cell::Cell,
    fs,
    net::TcpListener,
    path::Path,
    time::{Duration, Instant},
};

use envelope_decrypt::{
    Cipher, CipherKind, Config, Error, KeyFile, KmsProvider,
    crypto::{aes::AesGcmCipher, keys::DataKey, openssl::OpensslCipher},
    kms::cloud::HttpKmsProvider,
};
use tempfile::TempDir;

/// Stands in for the remote KMS: hands back a fixed data key and counts
/// calls.
struct FakeKms {
    key: DataKey,
    calls: Cell<usize>,
}

impl FakeKms {
    fn new() -> Self {
        Self {
            key: DataKey::generate(),
            calls: Cell::new(0),
        }
    }
}

impl KmsProvider for FakeKms {
    fn unwrap_blob(&self, ciphertext: &[u8]) -> anyhow::Result<Vec<u8>> {
        anyhow::ensure!(ciphertext == b"wrapped-key-blob", "unexpected blob");
        self.calls.set(self.calls.get() + 1);
        Ok(self.key.as_bytes().to_vec())
    }
}

struct DownKms;

impl KmsProvider for DownKms {
    fn unwrap_blob(&self, _ciphertext: &[u8]) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("connection refused")
    }
}

fn project() -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let cfg = Config::from_root(dir.path())
        .shred_passes(3)
        .cipher(CipherKind::AesGcm);
    fs::create_dir_all(cfg.blob_path.parent().unwrap()).unwrap();
    fs::write(&cfg.blob_path, b"wrapped-key-blob").unwrap();
    fs::create_dir_all(&cfg.source_dir).unwrap();
    (dir, cfg)
}

fn seal(kms: &FakeKms, root: &Path, rel: &str, plaintext: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let sealed = AesGcmCipher::new().encrypt(&kms.key, plaintext).unwrap();
    fs::write(path, sealed).unwrap();
}

#[test]
fn round_trip_mirrors_tree_and_erases_key() {
    let (_dir, cfg) = project();
    let kms = FakeKms::new();
    seal(&kms, &cfg.source_dir, "a/b/c.bin", b"nested payload");
    seal(&kms, &cfg.source_dir, "top.txt", b"hello");
    seal(&kms, &cfg.source_dir, "empty.dat", b"");
    fs::write(cfg.source_dir.join(".marker"), b"not encrypted").unwrap();

    let report = envelope_decrypt::run(&cfg, &kms, &AesGcmCipher::new()).unwrap();

    assert!(report.is_ok(), "failures: {:?}", report.failures);
    assert_eq!(report.decrypted, 3);
    assert_eq!(kms.calls.get(), 1);
    assert_eq!(
        fs::read(cfg.dest_dir.join("a/b/c.bin")).unwrap(),
        b"nested payload"
    );
    assert_eq!(fs::read(cfg.dest_dir.join("top.txt")).unwrap(), b"hello");
    assert!(fs::read(cfg.dest_dir.join("empty.dat")).unwrap().is_empty());
    assert!(!cfg.dest_dir.join(".marker").exists());
    assert!(!cfg.key_path.exists());
}

#[test]
fn empty_tree_still_erases_key() {
    let (_dir, cfg) = project();
    let kms = FakeKms::new();

    let report = envelope_decrypt::run(&cfg, &kms, &AesGcmCipher::new()).unwrap();

    assert_eq!(report.processed(), 0);
    assert_eq!(kms.calls.get(), 1);
    assert!(!cfg.key_path.exists());
}

#[test]
fn per_file_failures_are_reported_and_key_erased() {
    let (_dir, cfg) = project();
    let kms = FakeKms::new();
    seal(&kms, &cfg.source_dir, "good.bin", b"fine");
    fs::write(cfg.source_dir.join("corrupt.bin"), b"definitely not aes-gcm output").unwrap();

    let report = envelope_decrypt::run(&cfg, &kms, &AesGcmCipher::new()).unwrap();

    assert_eq!(report.decrypted, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, cfg.source_dir.join("corrupt.bin"));
    assert!(!cfg.dest_dir.join("corrupt.bin").exists());
    assert!(!cfg.key_path.exists());
}

#[test]
fn missing_blob_aborts_without_side_effects() {
    let (_dir, cfg) = project();
    let kms = FakeKms::new();
    seal(&kms, &cfg.source_dir, "file.bin", b"data");
    fs::remove_file(&cfg.blob_path).unwrap();

    let err = envelope_decrypt::run(&cfg, &kms, &AesGcmCipher::new()).unwrap_err();

    assert!(matches!(err, Error::MissingInput(_)));
    assert_eq!(kms.calls.get(), 0);
    assert!(!cfg.key_path.exists());
    assert!(!cfg.dest_dir.exists());
}

#[test]
fn missing_cipher_tool_aborts_before_key_recovery() {
    let (_dir, cfg) = project();
    let kms = FakeKms::new();
    let cipher = OpensslCipher::new("/nonexistent/bin/openssl-for-tests");

    let err = envelope_decrypt::run(&cfg, &kms, &cipher).unwrap_err();

    assert!(matches!(err, Error::Environment { .. }));
    assert_eq!(kms.calls.get(), 0);
    assert!(!cfg.key_path.exists());
}

#[test]
fn kms_failure_aborts_and_leaves_no_key() {
    let (_dir, cfg) = project();
    fs::write(cfg.source_dir.join("file.bin"), b"whatever").unwrap();

    let err = envelope_decrypt::run(&cfg, &DownKms, &AesGcmCipher::new()).unwrap_err();

    assert!(matches!(err, Error::Kms(_)));
    assert!(!cfg.key_path.exists());
    assert!(!cfg.dest_dir.exists());
}

#[test]
fn preexisting_key_skips_kms_and_is_erased() {
    let (_dir, cfg) = project();
    let kms = FakeKms::new();
    seal(&kms, &cfg.source_dir, "f.bin", b"from a leftover key");
    fs::write(&cfg.key_path, kms.key.as_bytes()).unwrap();

    let report = envelope_decrypt::run(&cfg, &kms, &AesGcmCipher::new()).unwrap();

    assert_eq!(report.decrypted, 1);
    assert_eq!(kms.calls.get(), 0);
    assert!(!cfg.key_path.exists());
}

#[test]
fn backends_follow_config() {
    let (_dir, cfg) = project();
    assert_eq!(envelope_decrypt::cipher(&cfg).name(), "aes-256-gcm");
    let cfg = cfg.cipher(CipherKind::Openssl);
    assert_eq!(envelope_decrypt::cipher(&cfg).name(), "openssl aes-256-cbc");
}

#[test]
fn silent_kms_endpoint_fails_within_timeout() {
    let (_dir, cfg) = project();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let kms = HttpKmsProvider::new(Some(format!("http://{}", listener.local_addr().unwrap())), None)
        .timeout(Duration::from_millis(500));

    let started = Instant::now();
    let err = envelope_decrypt::run(&cfg, &kms, &AesGcmCipher::new()).unwrap_err();

    assert!(matches!(err, Error::Kms(_)), "{err}");
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!cfg.key_path.exists());
    drop(listener);
}

/// Passes data through unchanged, but swaps the key file for a directory
/// so the final erase cannot open it.
struct SabotageKeyFile;

impl Cipher for SabotageKeyFile {
    fn name(&self) -> &str {
        "sabotage"
    }

    fn decrypt_file(&self, key: &KeyFile, input: &Path) -> anyhow::Result<Vec<u8>> {
        if key.path().is_file() {
            fs::remove_file(key.path())?;
            fs::create_dir(key.path())?;
        }
        Ok(fs::read(input)?)
    }
}

#[test]
fn erase_failure_keeps_run_report() {
    let (_dir, cfg) = project();
    let kms = FakeKms::new();
    fs::write(cfg.source_dir.join("a"), b"1").unwrap();
    fs::write(cfg.source_dir.join("b"), b"2").unwrap();

    let err = envelope_decrypt::run(&cfg, &kms, &SabotageKeyFile).unwrap_err();

    match err {
        Error::Erase {
            path,
            report: Some(report),
            ..
        } => {
            assert_eq!(path, cfg.key_path);
            assert_eq!(report.decrypted, 2);
            assert!(report.is_ok());
        }
        other => panic!("expected erase error with report, got {other:?}"),
    }
    assert_eq!(fs::read(cfg.dest_dir.join("b")).unwrap(), b"2");
}
