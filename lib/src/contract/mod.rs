// Copyright (c) 2024-2025 The Tapmint Project

//! Contract invoker
//!
//! Builds a contract call, simulates it so the node computes resource fees
//! and preview values, assembles with the simulation footprint, signs with
//! the submitter key, submits and polls for a terminal status. Read-only
//! calls share the simulate path and skip assemble / sign / submit.

use std::time::Duration;

use log::{debug, info};
use serde_json::{json, Value};
use stellar_xdr::curr::ScVal;

use crate::config::Network;
use crate::store::Submitter;
use crate::Error;

pub mod codes;
pub mod rpc;
pub mod xdr;

pub use rpc::{HttpRpc, RpcTransport};

/// Fixed delay between status polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Bounded poll attempts before a submission is reported as timed out
pub const POLL_ATTEMPTS: u32 = 10;

/// Result of a submitted invocation
#[derive(Clone, Debug)]
pub struct InvokeOutcome {
    /// Transaction hash as returned by the node
    pub hash: String,
    /// Preview return value from simulation (e.g. a token id)
    pub return_value: Option<ScVal>,
}

impl InvokeOutcome {
    /// Token id carried by the return value, when numeric
    pub fn token_id(&self) -> Option<u64> {
        match self.return_value {
            Some(ScVal::U32(v)) => Some(v as u64),
            Some(ScVal::U64(v)) => Some(v),
            _ => None,
        }
    }
}

/// Simulation results needed for assembly
struct Simulation {
    transaction_data: String,
    min_resource_fee: u64,
    return_value: Option<ScVal>,
}

/// Client for one deployed collection contract
pub struct ContractClient<R: RpcTransport> {
    rpc: R,
    network: Network,
    contract_id: [u8; 32],
    /// Source account used for read-only simulations
    source_account: String,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl<R: RpcTransport> ContractClient<R> {
    /// Create a client for a contract on a network
    pub fn new(rpc: R, network: Network, contract_id: [u8; 32], source_account: String) -> Self {
        Self {
            rpc,
            network,
            contract_id,
            source_account,
            poll_attempts: POLL_ATTEMPTS,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override the polling policy (tests)
    pub fn with_poll(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts;
        self.poll_interval = interval;
        self
    }

    /// Network passphrase for auth messages and envelopes
    pub fn network_passphrase(&self) -> &'static str {
        self.network.passphrase()
    }

    /// Contract id hash as hex, the form the auth message builder consumes
    pub fn contract_id_hex(&self) -> String {
        hex::encode(self.contract_id)
    }

    /// Simulate a transaction, returning footprint, fee and preview value
    async fn simulate(&self, tx: &stellar_xdr::curr::Transaction) -> Result<Simulation, Error> {
        let envelope = xdr::unsigned_envelope_base64(tx)?;

        let result = self
            .rpc
            .call("simulateTransaction", json!({ "transaction": envelope }))
            .await?;

        if let Some(err) = result.get("error").and_then(Value::as_str) {
            let code = codes::extract_contract_code(err);

            if code == Some(codes::STALE_NONCE) {
                return Err(Error::ReplayNonce);
            }

            return Err(Error::ContractSimulation {
                detail: err.to_string(),
                code,
            });
        }

        let transaction_data = result
            .get("transactionData")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        // The node reports the fee as a decimal string
        let min_resource_fee = match result.get("minResourceFee") {
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            _ => 0,
        };

        let return_value = result
            .get("results")
            .and_then(Value::as_array)
            .and_then(|r| r.first())
            .and_then(|r| r.get("xdr"))
            .and_then(Value::as_str)
            .map(xdr::decode_return_value)
            .transpose()?;

        Ok(Simulation {
            transaction_data,
            min_resource_fee,
            return_value,
        })
    }

    /// Current sequence number of an account
    async fn fetch_sequence(&self, address: &str) -> Result<i64, Error> {
        let key = xdr::account_key_base64(address)?;

        let result = self
            .rpc
            .call("getLedgerEntries", json!({ "keys": [key] }))
            .await?;

        let entry = result
            .get("entries")
            .and_then(Value::as_array)
            .and_then(|e| e.first())
            .and_then(|e| e.get("xdr"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::Validation(format!("account {address} not found on network"))
            })?;

        xdr::sequence_from_entry(entry)
    }

    /// Execute a read-only call via simulation
    async fn read(&self, function: &str, args: Vec<ScVal>) -> Result<ScVal, Error> {
        let source = xdr::muxed_account(&self.source_account)?;
        let tx = xdr::build_invoke_tx(source, 0, &self.contract_id, function, args)?;

        debug!("read-only call: {function}");

        let sim = self.simulate(&tx).await?;

        sim.return_value.ok_or_else(|| Error::ContractSimulation {
            detail: format!("{function} returned no value"),
            code: None,
        })
    }

    /// Build, simulate, assemble, sign, submit and poll one invocation
    async fn invoke(
        &self,
        submitter: &Submitter,
        function: &str,
        args: Vec<ScVal>,
    ) -> Result<InvokeOutcome, Error> {
        let address = submitter.address();
        let seq = self.fetch_sequence(&address).await?;

        let source = xdr::muxed_account(&address)?;
        let mut tx =
            xdr::build_invoke_tx(source, seq + 1, &self.contract_id, function, args)?;

        debug!("simulating {function} for {address}");
        let sim = self.simulate(&tx).await?;

        xdr::attach_simulation(&mut tx, &sim.transaction_data, sim.min_resource_fee)?;

        let envelope = xdr::sign_and_encode(tx, self.network.passphrase(), submitter)?;

        let sent = self
            .rpc
            .call("sendTransaction", json!({ "transaction": envelope }))
            .await?;

        let status = sent.get("status").and_then(Value::as_str).unwrap_or("");
        if status == "ERROR" {
            let detail = sent
                .get("errorResultXdr")
                .and_then(Value::as_str)
                .unwrap_or("submission rejected")
                .to_string();
            let code = codes::extract_contract_code(&detail);

            if code == Some(codes::STALE_NONCE) {
                return Err(Error::ReplayNonce);
            }

            return Err(Error::ContractExecution { code, detail });
        }

        let hash = sent
            .get("hash")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Transport("sendTransaction reply missing hash".into()))?
            .to_string();

        info!("submitted {function}: {hash}");

        self.poll_transaction(&hash, sim.return_value).await
    }

    /// Poll for a terminal transaction status
    async fn poll_transaction(
        &self,
        hash: &str,
        return_value: Option<ScVal>,
    ) -> Result<InvokeOutcome, Error> {
        for attempt in 0..self.poll_attempts {
            let result = self
                .rpc
                .call("getTransaction", json!({ "hash": hash }))
                .await?;

            let status = result.get("status").and_then(Value::as_str).unwrap_or("");
            debug!("poll {attempt}: {status}");

            match status {
                "SUCCESS" => {
                    return Ok(InvokeOutcome {
                        hash: hash.to_string(),
                        return_value,
                    });
                }
                "FAILED" => {
                    let detail = result
                        .get("resultXdr")
                        .and_then(Value::as_str)
                        .unwrap_or("transaction failed")
                        .to_string();
                    let code = codes::extract_contract_code(&result.to_string());

                    if code == Some(codes::STALE_NONCE) {
                        return Err(Error::ReplayNonce);
                    }

                    return Err(Error::ContractExecution { detail, code });
                }
                // NOT_FOUND / PENDING and anything else retries
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }

        Err(Error::Timeout)
    }

    // ---- read-only surface ----

    /// Stored replay nonce for a chip key
    pub async fn get_nonce(&self, public_key: &[u8; 65]) -> Result<u32, Error> {
        let v = self
            .read("get_nonce", vec![xdr::sc_bytes(public_key)?])
            .await?;
        xdr::scval_u32(&v)
    }

    /// Owner of a token
    pub async fn owner_of(&self, token_id: u64) -> Result<String, Error> {
        let v = self.read("owner_of", vec![xdr::sc_u64(token_id)]).await?;
        xdr::scval_address(&v)
    }

    /// Metadata URI of a token
    pub async fn token_uri(&self, token_id: u64) -> Result<String, Error> {
        let v = self.read("token_uri", vec![xdr::sc_u64(token_id)]).await?;
        xdr::scval_string(&v)
    }

    /// Token count held by an owner
    pub async fn balance(&self, owner: &str) -> Result<u32, Error> {
        let v = self.read("balance", vec![xdr::sc_address(owner)?]).await?;
        xdr::scval_u32(&v)
    }

    /// Token id bound to a chip key
    pub async fn token_id_for_key(&self, public_key: &[u8; 65]) -> Result<u32, Error> {
        let v = self
            .read("token_id", vec![xdr::sc_bytes(public_key)?])
            .await?;
        xdr::scval_u32(&v)
    }

    /// Chip key bound to a token id
    pub async fn public_key_of(&self, token_id: u64) -> Result<Vec<u8>, Error> {
        let v = self
            .read("public_key", vec![xdr::sc_u64(token_id)])
            .await?;
        xdr::scval_bytes(&v)
    }

    /// Next token id in the enumeration
    pub async fn next_token_id(&self) -> Result<u32, Error> {
        let v = self.read("next_token_id", vec![]).await?;
        xdr::scval_u32(&v)
    }

    // ---- write surface ----

    /// Submit a mint authorized by a chip signature
    #[allow(clippy::too_many_arguments)]
    pub async fn mint(
        &self,
        submitter: &Submitter,
        to: &str,
        message: &[u8],
        signature: &[u8; 64],
        recovery_id: u8,
        public_key: &[u8; 65],
        nonce: u32,
    ) -> Result<InvokeOutcome, Error> {
        let args = vec![
            xdr::sc_address(to)?,
            xdr::sc_bytes(message)?,
            xdr::sc_bytes(signature)?,
            xdr::sc_u32(recovery_id as u32),
            xdr::sc_bytes(public_key)?,
            xdr::sc_u32(nonce),
        ];

        self.invoke(submitter, "mint", args).await
    }

    /// Submit a claim authorized by a chip signature
    #[allow(clippy::too_many_arguments)]
    pub async fn claim(
        &self,
        submitter: &Submitter,
        claimant: &str,
        message: &[u8],
        signature: &[u8; 64],
        recovery_id: u8,
        public_key: &[u8; 65],
        nonce: u32,
    ) -> Result<InvokeOutcome, Error> {
        let args = vec![
            xdr::sc_address(claimant)?,
            xdr::sc_bytes(message)?,
            xdr::sc_bytes(signature)?,
            xdr::sc_u32(recovery_id as u32),
            xdr::sc_bytes(public_key)?,
            xdr::sc_u32(nonce),
        ];

        self.invoke(submitter, "claim", args).await
    }

    /// Submit a transfer authorized by a chip signature
    #[allow(clippy::too_many_arguments)]
    pub async fn transfer(
        &self,
        submitter: &Submitter,
        from: &str,
        to: &str,
        token_id: u64,
        message: &[u8],
        signature: &[u8; 64],
        recovery_id: u8,
        public_key: &[u8; 65],
        nonce: u32,
    ) -> Result<InvokeOutcome, Error> {
        let args = vec![
            xdr::sc_address(from)?,
            xdr::sc_address(to)?,
            xdr::sc_u64(token_id),
            xdr::sc_bytes(message)?,
            xdr::sc_bytes(signature)?,
            xdr::sc_u32(recovery_id as u32),
            xdr::sc_bytes(public_key)?,
            xdr::sc_u32(nonce),
        ];

        self.invoke(submitter, "transfer", args).await
    }
}
