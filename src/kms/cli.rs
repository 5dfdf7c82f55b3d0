use std::{
    io::Write,
    path::PathBuf,
    process::{Command, Stdio},
    time::Duration,
};

use super::{KmsProvider, decode_plaintext};
use crate::config::DEFAULT_KMS_TIMEOUT;

/// Unwraps through the AWS command-line tool:
///
/// ```text
/// aws kms decrypt --ciphertext-blob fileb:///dev/stdin \
///     --output text --query Plaintext \
///     --cli-connect-timeout T --cli-read-timeout T [--region R] [--key-id K]
/// ```
///
/// The blob goes in on stdin; the base64 plaintext comes back on stdout.
pub struct AwsCliProvider {
    program: PathBuf,
    region: Option<String>,
    key_id: Option<String>,
    timeout: Duration,
}

impl AwsCliProvider {
    pub fn new(region: Option<String>, key_id: Option<String>) -> Self {
        Self {
            program: PathBuf::from("aws"),
            region,
            key_id,
            timeout: DEFAULT_KMS_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "kms",
            "decrypt",
            "--ciphertext-blob",
            "fileb:///dev/stdin",
            "--output",
            "text",
            "--query",
            "Plaintext",
        ]);
        // The CLI reads 0 as "no timeout".
        let secs = self.timeout.as_secs().max(1).to_string();
        cmd.args([
            "--cli-connect-timeout",
            secs.as_str(),
            "--cli-read-timeout",
            secs.as_str(),
        ]);
        if let Some(region) = &self.region {
            cmd.args(["--region", region.as_str()]);
        }
        if let Some(key_id) = &self.key_id {
            cmd.args(["--key-id", key_id.as_str()]);
        }
        cmd
    }
}

impl KmsProvider for AwsCliProvider {
    fn unwrap_blob(&self, ciphertext: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow::anyhow!("cannot run {}: {e}", self.program.display()))?;

        // Blobs are a few hundred bytes, well under the pipe buffer.
        if let Some(mut stdin) = child.stdin.take() {
            // A tool that exits early closes the pipe; its exit status
            // is reported below.
            if let Err(e) = stdin.write_all(ciphertext) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }
        let output = child.wait_with_output()?;

        anyhow::ensure!(
            output.status.success(),
            "aws kms decrypt exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        let text = String::from_utf8(output.stdout)
            .map_err(|_| anyhow::anyhow!("aws kms decrypt printed non-UTF-8 output"))?;
        decode_plaintext(&text)
    }
}
