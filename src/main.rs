use std::{
    path::PathBuf,
    process,
    time::{Duration, Instant},
};

use clap::{ArgAction, Parser};
use envelope_decrypt::{
    CipherKind, Config, Error, KmsConfig, KmsKind, RunReport, config::DEFAULT_SHRED_PASSES,
};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "envelope-decrypt")]
#[command(about = "Unwrap the data key via KMS, decrypt .encrypted/ into .decrypted/, shred the key")]
struct Args {
    /// Timestamped debug logging of each operation
    #[arg(
        long,
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true"
    )]
    debug: bool,

    /// Project root holding .key/, .encrypted/ and .decrypted/
    #[arg(long, env = "ENVELOPE_DECRYPT_ROOT", default_value = ".")]
    root: PathBuf,

    /// Random overwrite passes before the final zero pass
    #[arg(long, env = "ENVELOPE_DECRYPT_SHRED_PASSES", default_value_t = DEFAULT_SHRED_PASSES)]
    shred_passes: u32,

    #[arg(long, value_enum, env = "ENVELOPE_DECRYPT_CIPHER", default_value_t = CipherKind::Openssl)]
    cipher: CipherKind,

    /// openssl binary used by the openssl cipher
    #[arg(long, env = "ENVELOPE_DECRYPT_OPENSSL", default_value = "openssl")]
    openssl: PathBuf,

    #[arg(long, value_enum, env = "ENVELOPE_DECRYPT_KMS", default_value_t = KmsKind::AwsCli)]
    kms: KmsKind,

    /// KMS endpoint for --kms=http
    #[arg(long, env = "ENVELOPE_DECRYPT_KMS_ENDPOINT")]
    kms_endpoint: Option<String>,

    #[arg(long, env = "ENVELOPE_DECRYPT_KMS_KEY_ID")]
    kms_key_id: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Seconds to wait on the KMS before giving up
    #[arg(long, value_name = "SECS", env = "ENVELOPE_DECRYPT_KMS_TIMEOUT", default_value_t = 30)]
    kms_timeout: u64,
}

impl Args {
    fn config(&self) -> Config {
        Config::from_root(&self.root)
            .shred_passes(self.shred_passes)
            .cipher(self.cipher)
            .openssl_program(&self.openssl)
            .kms(KmsConfig {
                kind: self.kms,
                endpoint: self.kms_endpoint.clone(),
                key_id: self.kms_key_id.clone(),
                region: self.region.clone(),
                timeout: Duration::from_secs(self.kms_timeout),
            })
    }
}

fn init_logger(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stdout)
        .format_timestamp_millis()
        .init();
}

fn main() {
    // Help, unknown flags and bad values all exit 1 with usage.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };
    init_logger(args.debug);

    let started = Instant::now();
    match run(&args) {
        Ok(report) => {
            print_report(&report, started);
            if !report.is_ok() {
                process::exit(1);
            }
        }
        Err(e) => {
            // The tree was processed before the erase failed.
            if let Error::Erase {
                report: Some(report),
                ..
            } = &e
            {
                print_report(report, started);
            }
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn print_report(report: &RunReport, started: Instant) {
    for failure in &report.failures {
        eprintln!("failed: {failure}");
    }
    println!(
        "decrypted {} file(s), {} failed in {} ms",
        report.decrypted,
        report.failures.len(),
        started.elapsed().as_millis()
    );
}

fn run(args: &Args) -> envelope_decrypt::Result<RunReport> {
    let config = args.config();
    log::debug!("config: {config:?}");

    let kms = envelope_decrypt::kms_provider(&config.kms);
    let cipher = envelope_decrypt::cipher(&config);
    envelope_decrypt::run(&config, kms.as_ref(), cipher.as_ref())
}
