// Relay submission.
//
// An assembled transaction is finalized exactly once: fetch a recent
// blockhash, sign, serialize, and hand the bytes to the private relay.
// One invocation performs one submission attempt; retrying the same
// serialized bytes after the blockhash window has closed cannot succeed,
// so any retry decision belongs to the operator, not this layer.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::json;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{signature::Keypair, signer::Signer, transaction::Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::assembler::AssembledTransaction;
use super::AttemptPhase;
use crate::config::RelayConfig;
use crate::error::ArbError;

pub struct RelaySubmitter {
    http: reqwest::Client,
    relay: RelayConfig,
    rpc: Arc<RpcClient>,
    rpc_timeout_ms: u64,
}

/// `result` field of a relay response: either a bare signature string or
/// an object wrapping one. Normalized here so nothing downstream ever
/// sees the raw shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelayResult {
    Signature(String),
    Wrapped { signature: String },
}

impl RelayResult {
    fn into_signature(self) -> String {
        match self {
            RelayResult::Signature(s) => s,
            RelayResult::Wrapped { signature } => signature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    result: Option<RelayResult>,
    error: Option<RelayErrorBody>,
}

impl RelaySubmitter {
    pub fn new(rpc: Arc<RpcClient>, relay: RelayConfig, rpc_timeout_ms: u64) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_millis(relay.submit_timeout_ms))
                .build()
                .expect("reqwest client"),
            relay,
            rpc,
            rpc_timeout_ms,
        }
    }

    /// Finalize and submit one assembled transaction.
    ///
    /// Returns the transaction signature reported by the relay.
    pub async fn finalize_and_submit(
        &self,
        assembled: &AssembledTransaction,
        signer: &Keypair,
    ) -> Result<String, ArbError> {
        debug!(
            phase = %AttemptPhase::Finalizing,
            instructions = assembled.instructions.len(),
            "finalizing transaction"
        );
        let blockhash = tokio::time::timeout(
            Duration::from_millis(self.rpc_timeout_ms),
            self.rpc.get_latest_blockhash(),
        )
        .await
        .map_err(|_| ArbError::NetworkTimeout {
            operation: "blockhash fetch",
            timeout_ms: self.rpc_timeout_ms,
        })?
        .map_err(|e| ArbError::ProviderUnavailable {
            venue: "rpc",
            source: e.into(),
        })?;

        let transaction = Transaction::new_signed_with_payer(
            &assembled.instructions,
            Some(&signer.pubkey()),
            &[signer],
            blockhash,
        );

        let bytes = bincode::serialize(&transaction).map_err(|e| ArbError::RelayRejected {
            message: format!("transaction serialization failed: {}", e),
        })?;
        let encoded = BASE64.encode(bytes);

        debug!(
            instructions = assembled.instructions.len(),
            serialized_len = encoded.len(),
            %blockhash,
            "transaction finalized"
        );

        self.submit_base64(&encoded).await
    }

    /// POST one serialized transaction to the relay and normalize the
    /// response down to a signature.
    pub async fn submit_base64(&self, tx_base64: &str) -> Result<String, ArbError> {
        debug!(phase = %AttemptPhase::Submitting, url = %self.relay.url, "submitting to relay");
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendTransaction",
            "params": [
                tx_base64,
                { "frontRunningProtection": self.relay.front_running_protection },
            ],
        });

        let response = self
            .http
            .post(&self.relay.url)
            .header("x-api-key", &self.relay.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ArbError::NetworkTimeout {
                        operation: "relay submit",
                        timeout_ms: self.relay.submit_timeout_ms,
                    }
                } else {
                    ArbError::RelayRejected {
                        message: format!("relay transport error: {}", e),
                    }
                }
            })?;

        let status = response.status();
        let parsed: RelayResponse =
            response.json().await.map_err(|e| ArbError::RelayRejected {
                message: format!("unparseable relay response (http {}): {}", status, e),
            })?;

        if let Some(err) = parsed.error {
            warn!(message = %err.message, "relay rejected transaction");
            return Err(classify_relay_error(err.message));
        }

        match parsed.result {
            Some(result) => {
                let signature = result.into_signature();
                info!(%signature, "transaction accepted by relay");
                Ok(signature)
            }
            None => Err(ArbError::RelayRejected {
                message: format!("relay response carried neither result nor error (http {})", status),
            }),
        }
    }
}

/// A rejection caused by the blockhash window closing is an expiry, not a
/// relay-side refusal; everything else surfaces verbatim.
fn classify_relay_error(message: String) -> ArbError {
    let lower = message.to_lowercase();
    if lower.contains("blockhash") || lower.contains("expired") {
        ArbError::Expired
    } else {
        ArbError::RelayRejected { message }
    }
}
