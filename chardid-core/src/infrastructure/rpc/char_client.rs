//! JSON-RPC client for the CHAR ordering service.
//!
//! Read path: decision-roll queries implementing [`BallotLog`]. Write
//! path: payload submission for authoring clients, with a free-slot
//! search and a confirmation poll.

use crate::domain::codec::strip_envelope;
use crate::foundation::{DidError, Result};
use crate::infrastructure::config::NodeConfig;
use crate::infrastructure::rpc::{BallotEntry, BallotLog};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const RPC_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CharRpcClient {
    http: reqwest::Client,
    url: String,
    user: String,
    password: String,
    app_domain: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct DecisionRollResponse {
    #[serde(default)]
    found: bool,
    #[serde(default, rename = "decisionroll")]
    decision_roll: Option<DecisionRoll>,
}

#[derive(Debug, Deserialize)]
struct DecisionRoll {
    #[serde(default)]
    data: String,
}

impl CharRpcClient {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|err| DidError::ballot_log("client init", err.to_string()))?;
        Ok(Self {
            http,
            url: format!("http://{}:{}/", config.rpc_host, config.rpc_port),
            user: config.rpc_user.clone(),
            password: config.rpc_password.clone(),
            app_domain: config.app_domain.clone(),
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": "chardid",
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .header("Content-Type", "text/plain")
            .json(&body)
            .send()
            .await
            .map_err(|err| DidError::ballot_log(method, err.to_string()))?;
        let parsed: RpcResponse =
            response.json().await.map_err(|err| DidError::ballot_log(method, format!("malformed response: {}", err)))?;
        if let Some(error) = parsed.error {
            return Err(DidError::ballot_log(method, format!("RPC error code {}: {}", error.code, error.message)));
        }
        parsed.result.ok_or_else(|| DidError::ballot_log(method, "missing result"))
    }

    async fn decision_roll(&self, ballot: u64) -> Result<DecisionRollResponse> {
        let result = self.rpc_call("getreferendumdecisionroll", json!([self.app_domain, ballot, 1])).await?;
        serde_json::from_value(result).map_err(|err| DidError::ballot_log("getreferendumdecisionroll", err.to_string()))
    }

    /// Submits a hex payload through `addbambookv`. `slotize` asks the
    /// service to place the value into the next free slot.
    pub async fn submit_payload(&self, payload: &[u8], slotize: bool) -> Result<()> {
        let app_hex = hex::encode(self.app_domain.as_bytes());
        let kv = json!([{ app_hex: hex::encode(payload) }]);
        self.rpc_call("addbambookv", json!([kv, slotize])).await?;
        info!("submitted payload len={} slotize={}", payload.len(), slotize);
        Ok(())
    }

    /// Probes forward from `start` for the first undecided ballot slot.
    pub async fn find_available_ballot(&self, start: u64) -> Result<u64> {
        let mut ballot = start;
        loop {
            let roll = self.decision_roll(ballot).await?;
            if !roll.found {
                debug!("found available ballot {}", ballot);
                return Ok(ballot);
            }
            ballot += 1;
        }
    }

    /// Polls `ballot` until the decided payload matches `payload`.
    /// Another author winning the slot is surfaced as an error; the caller
    /// decides whether to resubmit at a later ballot.
    pub async fn wait_for_confirmation(
        &self,
        ballot: u64,
        payload: &[u8],
        attempts: usize,
        poll_interval: Duration,
    ) -> Result<()> {
        for attempt in 0..attempts {
            let entry = self.get_ballot(ballot).await?;
            if entry.found {
                let decided = entry.bytes.as_deref().and_then(strip_envelope);
                if decided == Some(payload) {
                    info!("ballot {} confirmed after {} polls", ballot, attempt + 1);
                    return Ok(());
                }
                warn!("ballot {} decided with a different payload", ballot);
                return Err(DidError::ballot_log("confirmation", format!("ballot {} was won by another payload", ballot)));
            }
            tokio::time::sleep(poll_interval).await;
        }
        Err(DidError::ballot_log("confirmation", format!("ballot {} not decided after {} polls", ballot, attempts)))
    }
}

#[async_trait]
impl BallotLog for CharRpcClient {
    async fn next_ballot_number(&self, after: i64) -> Result<Option<u64>> {
        // Ballots are consumed strictly in sequence; the next number is
        // decided or nothing is.
        let candidate = (after + 1) as u64;
        let roll = self.decision_roll(candidate).await?;
        Ok(roll.found.then_some(candidate))
    }

    async fn get_ballot(&self, number: u64) -> Result<BallotEntry> {
        let roll = self.decision_roll(number).await?;
        if !roll.found {
            return Ok(BallotEntry { found: false, bytes: None });
        }
        let data = roll.decision_roll.map(|r| r.data).unwrap_or_default();
        if data.is_empty() {
            return Ok(BallotEntry { found: true, bytes: None });
        }
        let bytes = hex::decode(data.trim()).map_err(|err| DidError::ballot_log("get_ballot", format!("invalid hex: {}", err)))?;
        Ok(BallotEntry { found: true, bytes: Some(bytes) })
    }
}
