use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{KmsProvider, decode_plaintext, encode_blob};
use crate::config::DEFAULT_KMS_TIMEOUT;

const DEFAULT_ENDPOINT: &str = "https://kms.us-east-1.amazonaws.com";

/// KMS provider that talks JSON over HTTP in the AWS KMS `Decrypt`
/// shape. Any service exposing the same API (a local KMS emulator, a
/// signing proxy) works as the endpoint.
///
/// Requests are not SigV4-signed; point `endpoint` at something that
/// handles authentication.
///
/// Every call is bounded by `timeout`, covering connect, send and the
/// wait for a response.
pub struct HttpKmsProvider {
    endpoint: Option<String>,
    key_id: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct DecryptRequest<'a> {
    #[serde(rename = "CiphertextBlob")]
    ciphertext_blob: &'a str,
    #[serde(rename = "KeyId", skip_serializing_if = "Option::is_none")]
    key_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct DecryptResponse {
    #[serde(rename = "Plaintext")]
    plaintext: String,
}

impl HttpKmsProvider {
    pub fn new(endpoint: Option<String>, key_id: Option<String>) -> Self {
        Self {
            endpoint,
            key_id,
            timeout: DEFAULT_KMS_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn base_url(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    fn request_body(&self, ciphertext_b64: &str) -> anyhow::Result<serde_json::Value> {
        let body = DecryptRequest {
            ciphertext_blob: ciphertext_b64,
            key_id: self.key_id.as_deref(),
        };
        Ok(serde_json::to_value(&body)?)
    }
}

impl KmsProvider for HttpKmsProvider {
    fn unwrap_blob(&self, ciphertext: &[u8]) -> anyhow::Result<Vec<u8>> {
        let url = self.base_url();
        log::debug!("POST {url} TrentService.Decrypt ({} byte blob)", ciphertext.len());

        let body = self.request_body(&encode_blob(ciphertext))?;
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let resp: DecryptResponse = agent
            .post(url)
            .set("X-Amz-Target", "TrentService.Decrypt")
            .set("Content-Type", "application/x-amz-json-1.1")
            .send_json(body)?
            .into_json()?;

        decode_plaintext(&resp.plaintext)
    }
}
