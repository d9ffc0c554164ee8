// Copyright (c) 2024-2025 The Tapmint Project

//! Shared test harness: a scripted chip simulator speaking the real APDU
//! wire shapes, and a contract-node simulator speaking the RPC surface.

#![allow(unused)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::SigningKey;
use log::LevelFilter;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use stellar_xdr::curr::{
    AccountEntry, AccountEntryExt, ExtensionPoint, HostFunction, LedgerEntryData,
    LedgerFootprint, Limits, OperationBody, ReadXdr, ScVal, SequenceNumber,
    SorobanResources, SorobanTransactionData, Thresholds, TransactionEnvelope, VecM,
    WriteXdr,
};

use tapmint::apdu::status::{
    SW_APP_NOT_FOUND, SW_INS_NOT_SUPPORTED, SW_KEY_NOT_FOUND, SW_MEMORY_FULL, SW_OK,
    SW_WRONG_LENGTH,
};
use tapmint::apdu::{CommandApdu, StatusWord, CHIP_AID};
use tapmint::contract::xdr;
use tapmint::contract::{codes, RpcTransport};
use tapmint::core::sep53::{self, Function};
use tapmint::core::{curve, der, recover, PubKey65};
use tapmint::{ContractClient, InvokeOutcome};
use tapmint::session::CancelToken;
use tapmint::transport::{Connect, Exchange};
use tapmint::{Error, Network, StaticSecretStore, Submitter};

/// Network used across the harness
pub const TEST_NETWORK: Network = Network::Testnet;

/// Contract id hash used across the harness
pub const TEST_CONTRACT_ID: [u8; 32] = [0x42u8; 32];

/// Setup logging once per test binary
pub fn setup() {
    static INIT: OnceLock<()> = OnceLock::new();

    INIT.get_or_init(|| {
        let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
            Ok(Ok(l)) => l,
            _ => LevelFilter::Debug,
        };

        let _ = simplelog::SimpleLogger::init(log_level, simplelog::Config::default());
    });
}

/// Serialize tests that take the process-wide reader session
pub async fn session_lock() -> tokio::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();

    LOCK.get_or_init(|| tokio::sync::Mutex::new(())).lock().await
}

/// Deterministic submitter identity for tests
pub fn test_submitter_store() -> StaticSecretStore {
    StaticSecretStore::new(stellar_strkey::ed25519::PrivateKey([3u8; 32]).to_string())
}

pub fn test_submitter() -> Submitter {
    use tapmint::SecretStore;
    test_submitter_store().submitter().unwrap()
}

/// Another funded wallet
pub fn other_wallet() -> String {
    stellar_strkey::ed25519::PublicKey([8u8; 32]).to_string()
}

/// `n - s` over the secp256k1 group order (produces the high-S twin)
pub fn negate_s(s: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut borrow = 0u16;
    for i in (0..32).rev() {
        let minuend = curve::CURVE_ORDER[i] as u16;
        let subtrahend = s[i] as u16 + borrow;
        if minuend >= subtrahend {
            out[i] = (minuend - subtrahend) as u8;
            borrow = 0;
        } else {
            out[i] = (256 + minuend - subtrahend) as u8;
            borrow = 1;
        }
    }
    out
}

/// Minimal DER encoding of `(r, s)`, including high-bit zero padding
pub fn der_encode(r: &[u8; 32], s: &[u8; 32]) -> Vec<u8> {
    fn integer(v: &[u8; 32]) -> Vec<u8> {
        let mut body: Vec<u8> = v.iter().copied().skip_while(|b| *b == 0).collect();
        if body.is_empty() {
            body.push(0);
        }
        if body[0] & 0x80 != 0 {
            body.insert(0, 0x00);
        }

        let mut out = vec![0x02, body.len() as u8];
        out.extend_from_slice(&body);
        out
    }

    let r = integer(r);
    let s = integer(s);

    let mut out = vec![0x30, (r.len() + s.len()) as u8];
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    out
}

/// Uncompressed SEC1 key of a signer
pub fn pubkey65(signer: &SigningKey) -> PubKey65 {
    let point = signer.verifying_key().to_encoded_point(false);
    let mut out = [0u8; 65];
    out.copy_from_slice(point.as_bytes());
    out
}

/// Sign a hash the way the chip does, optionally forcing the high-S twin
pub fn chip_sign(signer: &SigningKey, hash: &[u8; 32], high_s: bool) -> Vec<u8> {
    let sig: k256::ecdsa::Signature = signer.sign_prehash(hash).unwrap();
    let bytes = sig.to_bytes();

    let r: [u8; 32] = bytes[..32].try_into().unwrap();
    let mut s: [u8; 32] = bytes[32..].try_into().unwrap();

    if high_s {
        s = negate_s(&s);
    }

    der_encode(&r, &s)
}

/// Sign and submit one mint directly through the contract client, the way
/// the orchestrator would after a chip exchange
pub async fn signed_mint_call(
    client: &ContractClient<MockRpc>,
    signer: &SigningKey,
    to: &str,
    nonce: u32,
) -> Result<InvokeOutcome, Error> {
    let key = pubkey65(signer);

    let auth = sep53::build_auth_message(
        &hex::encode(TEST_CONTRACT_ID),
        Function::Mint,
        &[to.to_string()],
        nonce,
        TEST_NETWORK.passphrase(),
    )
    .unwrap();

    let (r, s) = der::parse_signature(&chip_sign(signer, &auth.hash, false)).unwrap();
    let s = curve::normalize_s(&s);

    let mut signature = [0u8; 64];
    signature[..32].copy_from_slice(&r);
    signature[32..].copy_from_slice(&s);

    let rid = recover::resolve_recovery_id(&auth.hash, &r, &s, &key).unwrap();

    client
        .mint(&test_submitter(), to, &auth.message, &signature, rid, &key, nonce)
        .await
}

// ---- chip simulator ----

struct ChipInner {
    slots: Vec<SigningKey>,
    max_slots: usize,
    selected: bool,
    global_counter: u32,
    key_counters: HashMap<u8, u32>,
    high_s: bool,
    fail_select: bool,
}

/// Scripted chip speaking the APDU wire shapes over [Exchange]
#[derive(Clone)]
pub struct MockChip(Arc<Mutex<ChipInner>>);

impl MockChip {
    /// Empty chip with room for four keys
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(ChipInner {
            slots: Vec::new(),
            max_slots: 4,
            selected: false,
            global_counter: 0,
            key_counters: HashMap::new(),
            high_s: false,
            fail_select: false,
        })))
    }

    /// Chip pre-provisioned with one key at slot 1
    pub fn with_key(signer: SigningKey) -> Self {
        let chip = Self::new();
        chip.0.lock().unwrap().slots.push(signer);
        chip
    }

    pub fn with_capacity(self, max_slots: usize) -> Self {
        self.0.lock().unwrap().max_slots = max_slots;
        self
    }

    /// Emit high-S signatures, as mis-normalized chips do
    pub fn with_high_s(self) -> Self {
        self.0.lock().unwrap().high_s = true;
        self
    }

    /// Refuse applet selection
    pub fn with_select_failure(self) -> Self {
        self.0.lock().unwrap().fail_select = true;
        self
    }

    /// Key at a 1-based slot
    pub fn public_key(&self, key_index: u8) -> PubKey65 {
        let inner = self.0.lock().unwrap();
        pubkey65(&inner.slots[key_index as usize - 1])
    }

    pub fn signer(&self, key_index: u8) -> SigningKey {
        self.0.lock().unwrap().slots[key_index as usize - 1].clone()
    }
}

#[async_trait]
impl Exchange for MockChip {
    async fn exchange(&self, cmd: &CommandApdu) -> Result<(Vec<u8>, StatusWord), Error> {
        let mut inner = self.0.lock().unwrap();

        // SELECT
        if cmd.ins == 0xa4 {
            if inner.fail_select || cmd.data != CHIP_AID.to_vec() {
                return Ok((vec![], SW_APP_NOT_FOUND));
            }
            inner.selected = true;
            return Ok((vec![], SW_OK));
        }

        if !inner.selected {
            return Ok((vec![], SW_APP_NOT_FOUND));
        }

        match cmd.ins {
            // GET KEY INFO
            0x16 => {
                let idx = cmd.p1;
                let Some(signer) = idx
                    .checked_sub(1)
                    .and_then(|i| inner.slots.get(i as usize))
                else {
                    return Ok((vec![], SW_KEY_NOT_FOUND));
                };

                let mut body = inner.global_counter.to_be_bytes().to_vec();
                body.extend_from_slice(
                    &inner.key_counters.get(&idx).copied().unwrap_or(0).to_be_bytes(),
                );
                body.extend_from_slice(&pubkey65(signer));

                Ok((body, SW_OK))
            }
            // GENERATE KEY
            0x02 => {
                if inner.slots.len() >= inner.max_slots {
                    return Ok((vec![], SW_MEMORY_FULL));
                }

                inner.slots.push(SigningKey::random(&mut rand_core::OsRng));
                Ok((vec![inner.slots.len() as u8], SW_OK))
            }
            // GENERATE SIGNATURE
            0x18 => {
                let idx = cmd.p1;
                let hash: [u8; 32] = match cmd.data.as_slice().try_into() {
                    Ok(h) => h,
                    Err(_) => return Ok((vec![], SW_WRONG_LENGTH)),
                };

                let Some(signer) = idx
                    .checked_sub(1)
                    .and_then(|i| inner.slots.get(i as usize))
                    .cloned()
                else {
                    return Ok((vec![], SW_KEY_NOT_FOUND));
                };

                inner.global_counter += 1;
                let counter = inner.key_counters.entry(idx).or_insert(0);
                *counter += 1;
                let key_counter = *counter;

                let der = chip_sign(&signer, &hash, inner.high_s);

                let mut body = inner.global_counter.to_be_bytes().to_vec();
                body.extend_from_slice(&key_counter.to_be_bytes());
                body.extend_from_slice(&der);

                Ok((body, SW_OK))
            }
            _ => Ok((vec![], SW_INS_NOT_SUPPORTED)),
        }
    }
}

/// Connector handing out the scripted chip
#[derive(Clone)]
pub struct MockConnector {
    chip: MockChip,
    /// Never yield a tag; resolves only through cancellation
    hang: bool,
}

impl MockConnector {
    pub fn new(chip: MockChip) -> Self {
        Self { chip, hang: false }
    }

    pub fn hanging(chip: MockChip) -> Self {
        Self { chip, hang: true }
    }
}

#[async_trait]
impl Connect for MockConnector {
    type Transport = MockChip;

    async fn connect(&self, cancel: CancelToken) -> Result<MockChip, Error> {
        while self.hang {
            if cancel.is_cancelled() {
                return Err(Error::UserCancelled);
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        Ok(self.chip.clone())
    }
}

// ---- contract node simulator ----

struct NodeInner {
    /// Stored nonce per chip key (only keys the contract has accepted)
    nonces: HashMap<PubKey65, u32>,
    /// Chip key -> token id
    tokens: HashMap<PubKey65, u32>,
    /// Token id -> owner address
    owners: HashMap<u32, String>,
    next_token: u32,
    /// Polls a submitted transaction reports PENDING before SUCCESS
    pending_polls: u32,
    /// Never reach a terminal status
    always_pending: bool,
    submitted: HashMap<String, &'static str>,
    poll_counts: HashMap<String, u32>,
}

/// Scripted contract node behind [RpcTransport]
#[derive(Clone)]
pub struct MockRpc {
    inner: Arc<Mutex<NodeInner>>,
    hashes: Arc<AtomicU64>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(NodeInner {
                nonces: HashMap::new(),
                tokens: HashMap::new(),
                owners: HashMap::new(),
                next_token: 0,
                pending_polls: 1,
                always_pending: false,
                submitted: HashMap::new(),
                poll_counts: HashMap::new(),
            })),
            hashes: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_pending_polls(self, polls: u32) -> Self {
        self.inner.lock().unwrap().pending_polls = polls;
        self
    }

    /// Transactions never reach a terminal status
    pub fn always_pending(self) -> Self {
        self.inner.lock().unwrap().always_pending = true;
        self
    }

    pub fn owner_of(&self, token: u32) -> Option<String> {
        self.inner.lock().unwrap().owners.get(&token).cloned()
    }

    pub fn stored_nonce(&self, key: &PubKey65) -> Option<u32> {
        self.inner.lock().unwrap().nonces.get(key).copied()
    }

    fn contract_error(code: u32) -> Error {
        Error::ContractSimulation {
            detail: format!("host invocation failed: Error(Contract, #{code})"),
            code: Some(code),
        }
    }

    /// Decode one invocation out of an envelope
    fn decode_call(envelope_b64: &str) -> Result<(String, Vec<ScVal>), Error> {
        let envelope =
            TransactionEnvelope::from_xdr_base64(envelope_b64, Limits::none())
                .map_err(|e| Error::Transport(format!("envelope decode: {e}")))?;

        let tx = match envelope {
            TransactionEnvelope::Tx(env) => env.tx,
            _ => return Err(Error::Transport("unexpected envelope".into())),
        };

        let op = tx.operations.first().cloned().expect("one operation");
        let invoke = match op.body {
            OperationBody::InvokeHostFunction(op) => op,
            _ => return Err(Error::Transport("unexpected operation".into())),
        };

        let args = match invoke.host_function {
            HostFunction::InvokeContract(call) => call,
            _ => return Err(Error::Transport("unexpected host function".into())),
        };

        Ok((
            args.function_name.0.to_utf8_string().unwrap(),
            args.args.to_vec(),
        ))
    }

    /// Shared contract semantics: validate a call, optionally committing
    /// state. Returns the preview value.
    fn run_call(
        inner: &mut NodeInner,
        function: &str,
        args: &[ScVal],
        commit: bool,
    ) -> Result<ScVal, Error> {
        match function {
            "get_nonce" => {
                let key: PubKey65 = xdr::scval_bytes(&args[0])?
                    .try_into()
                    .map_err(|_| Self::contract_error(codes::INVALID_SIGNATURE))?;

                match inner.nonces.get(&key) {
                    Some(stored) => Ok(ScVal::U32(*stored)),
                    None => Err(Self::contract_error(codes::UNKNOWN_PUBLIC_KEY)),
                }
            }
            "token_id" => {
                let key: PubKey65 = xdr::scval_bytes(&args[0])?
                    .try_into()
                    .map_err(|_| Self::contract_error(codes::INVALID_SIGNATURE))?;

                match inner.tokens.get(&key) {
                    Some(token) => Ok(ScVal::U32(*token)),
                    None => Err(Self::contract_error(codes::NON_EXISTENT_TOKEN)),
                }
            }
            "owner_of" => {
                let token = xdr::scval_u64(&args[0])? as u32;
                match inner.owners.get(&token) {
                    Some(owner) => xdr::sc_address(owner),
                    None => Err(Self::contract_error(codes::TOKEN_NOT_CLAIMED)),
                }
            }
            "next_token_id" => Ok(ScVal::U32(inner.next_token)),
            "mint" => {
                let to = xdr::scval_address(&args[0])?;
                let (key, nonce) = Self::verify_auth(
                    inner,
                    Function::Mint,
                    &[to],
                    &args[1..],
                )?;

                if inner.tokens.contains_key(&key) {
                    return Err(Self::contract_error(codes::TOKEN_ALREADY_MINTED));
                }

                let token = inner.next_token;
                if commit {
                    inner.next_token += 1;
                    inner.tokens.insert(key, token);
                    inner.nonces.insert(key, nonce);
                }

                Ok(ScVal::U32(token))
            }
            "claim" => {
                let claimant = xdr::scval_address(&args[0])?;
                let key: PubKey65 = xdr::scval_bytes(&args[4])?
                    .try_into()
                    .map_err(|_| Self::contract_error(codes::INVALID_SIGNATURE))?;

                let token = *inner
                    .tokens
                    .get(&key)
                    .ok_or_else(|| Self::contract_error(codes::NON_EXISTENT_TOKEN))?;

                let (key, nonce) = Self::verify_auth(
                    inner,
                    Function::Claim,
                    &[claimant.clone(), token.to_string()],
                    &args[1..],
                )?;

                if inner.owners.contains_key(&token) {
                    return Err(Self::contract_error(codes::TOKEN_ALREADY_CLAIMED));
                }

                if commit {
                    inner.owners.insert(token, claimant);
                    inner.nonces.insert(key, nonce);
                }

                Ok(ScVal::U32(token))
            }
            "transfer" => {
                let from = xdr::scval_address(&args[0])?;
                let to = xdr::scval_address(&args[1])?;
                let token = xdr::scval_u64(&args[2])? as u32;

                let (key, nonce) = Self::verify_auth(
                    inner,
                    Function::Transfer,
                    &[from.clone(), to.clone(), (token as u64).to_string()],
                    &args[3..],
                )?;

                match inner.owners.get(&token) {
                    Some(owner) if *owner == from => (),
                    Some(_) => return Err(Self::contract_error(codes::INCORRECT_OWNER)),
                    None => return Err(Self::contract_error(codes::TOKEN_NOT_CLAIMED)),
                }

                if commit {
                    inner.owners.insert(token, to);
                    inner.nonces.insert(key, nonce);
                }

                Ok(ScVal::Void)
            }
            _ => Err(Self::contract_error(codes::NON_EXISTENT_TOKEN)),
        }
    }

    /// Contract-side auth verification: message reconstruction, SHA-256,
    /// low-S recovery, key equality and nonce advancement.
    fn verify_auth(
        inner: &NodeInner,
        function: Function,
        signed_args: &[String],
        tail: &[ScVal],
    ) -> Result<(PubKey65, u32), Error> {
        // tail: message, signature, recovery_id, public_key, nonce
        let message = xdr::scval_bytes(&tail[0])?;
        let signature = xdr::scval_bytes(&tail[1])?;
        let recovery_id = xdr::scval_u32(&tail[2])?;
        let key: PubKey65 = xdr::scval_bytes(&tail[3])?
            .try_into()
            .map_err(|_| Self::contract_error(codes::INVALID_SIGNATURE))?;
        let nonce = xdr::scval_u32(&tail[4])?;

        // The contract reconstructs the message from its typed arguments
        let expected = sep53::build_auth_message(
            &hex::encode(TEST_CONTRACT_ID),
            function,
            signed_args,
            nonce,
            TEST_NETWORK.passphrase(),
        )
        .unwrap();

        if expected.message != message {
            return Err(Self::contract_error(codes::INVALID_SIGNATURE));
        }

        let sig: [u8; 64] = signature
            .try_into()
            .map_err(|_| Self::contract_error(codes::INVALID_SIGNATURE))?;
        let r: [u8; 32] = sig[..32].try_into().unwrap();
        let s: [u8; 32] = sig[32..].try_into().unwrap();

        // Low-S is mandatory on chain
        if curve::normalize_s(&s) != s {
            return Err(Self::contract_error(codes::INVALID_SIGNATURE));
        }

        let hash: [u8; 32] = Sha256::digest(&message).into();
        let recovered = curve::recover(&hash, &r, &s, recovery_id as u8)
            .ok_or_else(|| Self::contract_error(codes::INVALID_SIGNATURE))?;

        if recovered != key {
            return Err(Self::contract_error(codes::INVALID_SIGNATURE));
        }

        // Nonce must advance: first use is 0, afterwards stored + 1
        let expected_nonce = inner.nonces.get(&key).map(|s| s + 1).unwrap_or(0);
        if nonce != expected_nonce {
            return Err(Self::contract_error(codes::STALE_NONCE));
        }

        Ok((key, nonce))
    }

    fn empty_soroban_data() -> String {
        SorobanTransactionData {
            ext: ExtensionPoint::V0,
            resources: SorobanResources {
                footprint: LedgerFootprint {
                    read_only: VecM::default(),
                    read_write: VecM::default(),
                },
                instructions: 0,
                read_bytes: 0,
                write_bytes: 0,
            },
            resource_fee: 0,
        }
        .to_xdr_base64(Limits::none())
        .unwrap()
    }

    fn account_entry_b64(address: &str) -> String {
        let entry = AccountEntry {
            account_id: xdr::account_id(address).unwrap(),
            balance: 10_000_000_000,
            seq_num: SequenceNumber(100),
            num_sub_entries: 0,
            inflation_dest: None,
            flags: 0,
            home_domain: Default::default(),
            thresholds: Thresholds([1, 0, 0, 0]),
            signers: VecM::default(),
            ext: AccountEntryExt::V0,
        };

        LedgerEntryData::Account(entry)
            .to_xdr_base64(Limits::none())
            .unwrap()
    }
}

#[async_trait]
impl RpcTransport for MockRpc {
    async fn call(&self, method: &str, params: Value) -> Result<Value, Error> {
        match method {
            "getLedgerEntries" => {
                // One account key per request in this client
                let address = test_submitter().address();
                Ok(json!({
                    "entries": [ { "xdr": Self::account_entry_b64(&address) } ],
                }))
            }
            "simulateTransaction" => {
                let envelope = params["transaction"].as_str().unwrap();
                let (function, args) = Self::decode_call(envelope)?;

                let mut inner = self.inner.lock().unwrap();
                match Self::run_call(&mut inner, &function, &args, false) {
                    Ok(value) => {
                        let xdr_b64 = value.to_xdr_base64(Limits::none()).unwrap();
                        Ok(json!({
                            "transactionData": Self::empty_soroban_data(),
                            "minResourceFee": "100",
                            "results": [ { "xdr": xdr_b64 } ],
                        }))
                    }
                    Err(e) => Ok(json!({ "error": e.to_string() })),
                }
            }
            "sendTransaction" => {
                let envelope = params["transaction"].as_str().unwrap();
                let (function, args) = Self::decode_call(envelope)?;

                let mut inner = self.inner.lock().unwrap();
                let status = match Self::run_call(&mut inner, &function, &args, true) {
                    Ok(_) => "SUCCESS",
                    Err(_) => "FAILED",
                };

                let hash = format!("{:064x}", self.hashes.fetch_add(1, Ordering::Relaxed));
                inner.submitted.insert(hash.clone(), status);

                Ok(json!({ "status": "PENDING", "hash": hash }))
            }
            "getTransaction" => {
                let hash = params["hash"].as_str().unwrap().to_string();

                let mut inner = self.inner.lock().unwrap();
                if inner.always_pending {
                    return Ok(json!({ "status": "PENDING" }));
                }

                let polls = inner.poll_counts.entry(hash.clone()).or_insert(0);
                *polls += 1;

                if *polls <= inner.pending_polls {
                    return Ok(json!({ "status": "NOT_FOUND" }));
                }

                match inner.submitted.get(&hash) {
                    Some(&"SUCCESS") => Ok(json!({ "status": "SUCCESS" })),
                    Some(_) => Ok(json!({
                        "status": "FAILED",
                        "resultXdr": "AAAA",
                    })),
                    None => Ok(json!({ "status": "NOT_FOUND" })),
                }
            }
            _ => Err(Error::Transport(format!("unexpected rpc method {method}"))),
        }
    }
}
