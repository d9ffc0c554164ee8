// Copyright (c) 2024-2025 The Tapmint Project

//! Operation orchestrator
//!
//! One pipeline covers every verb: open a reader session, read the chip
//! key, resolve the nonce, build and sign the auth message, derive the
//! recovery id and hand off to the contract invoker. All collaborators are
//! constructor dependencies; no shared state survives an operation.

use log::{debug, info};

use tapmint_core::sep53::Function;
use tapmint_core::{curve, der, recover, sep53, PubKey65};

use crate::chip::ChipHandle;
use crate::contract::{ContractClient, InvokeOutcome, RpcTransport};
use crate::nonce::NonceCoordinator;
use crate::session::{ReaderSession, SessionEvent};
use crate::store::SecretStore;
use crate::transport::Connect;
use crate::Error;

/// A user-initiated operation
#[derive(Clone, Debug, PartialEq)]
pub enum OperationRequest {
    Mint { to: String },
    Claim { claimant: String, token_id: u64 },
    Transfer { from: String, to: String, token_id: u64 },
}

impl OperationRequest {
    /// Contract function this operation invokes
    pub fn function(&self) -> Function {
        match self {
            OperationRequest::Mint { .. } => Function::Mint,
            OperationRequest::Claim { .. } => Function::Claim,
            OperationRequest::Transfer { .. } => Function::Transfer,
        }
    }

    /// Flat signed-argument list: addresses and decimal-string integers in
    /// declaration order
    pub fn auth_args(&self) -> Vec<String> {
        match self {
            OperationRequest::Mint { to } => vec![to.clone()],
            OperationRequest::Claim { claimant, token_id } => {
                vec![claimant.clone(), token_id.to_string()]
            }
            OperationRequest::Transfer { from, to, token_id } => {
                vec![from.clone(), to.clone(), token_id.to_string()]
            }
        }
    }

    /// Validate addresses and caller binding before any chip I/O
    fn validate(&self, submitter_address: &str) -> Result<(), Error> {
        let addresses: Vec<&String> = match self {
            OperationRequest::Mint { to } => vec![to],
            OperationRequest::Claim { claimant, .. } => vec![claimant],
            OperationRequest::Transfer { from, to, .. } => vec![from, to],
        };

        for a in addresses {
            if stellar_strkey::ed25519::PublicKey::from_string(a).is_err() {
                return Err(Error::Validation(format!("invalid address: {a}")));
            }
        }

        // A transfer is authorized by the wallet that owns the token
        if let OperationRequest::Transfer { from, .. } = self {
            if from != submitter_address {
                return Err(Error::Validation(
                    "transfer source must be the submitter wallet".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Published result of a completed operation
#[derive(Clone, Debug)]
pub struct OperationOutcome {
    /// Transaction hash as returned by the node
    pub tx_hash: String,
    /// Token id from the simulation preview, when the contract returns one
    pub token_id: Option<u64>,
    /// Chip key that authorized the operation
    pub chip_key: PubKey65,
    /// Nonce the signature was bound to
    pub nonce: u32,
}

/// Orchestrator for chip-authorized operations
pub struct Agent<C: Connect, R: RpcTransport, S: SecretStore> {
    connector: C,
    contract: ContractClient<R>,
    secrets: S,
    key_index: u8,
}

impl<C: Connect, R: RpcTransport, S: SecretStore> Agent<C, R, S> {
    /// Assemble an agent from its collaborators
    pub fn new(connector: C, contract: ContractClient<R>, secrets: S, key_index: u8) -> Self {
        Self {
            connector,
            contract,
            secrets,
            key_index,
        }
    }

    /// Contract client, for read-only surfaces that bypass the pipeline
    pub fn contract(&self) -> &ContractClient<R> {
        &self.contract
    }

    /// Execute one operation end to end.
    ///
    /// The reader session is invalidated before control returns, on every
    /// path. The submitter secret is resolved exactly once.
    pub async fn execute(&self, request: OperationRequest) -> Result<OperationOutcome, Error> {
        let submitter = self.secrets.submitter()?;
        request.validate(&submitter.address())?;

        let mut session = ReaderSession::begin()?;
        let result = self.run(&mut session, &submitter, request).await;
        session.close();

        result
    }

    async fn run(
        &self,
        session: &mut ReaderSession,
        submitter: &crate::store::Submitter,
        request: OperationRequest,
    ) -> Result<OperationOutcome, Error> {
        // Wait for a tag under the session watchdog
        let transport = match session.wait_for_tag(&self.connector).await {
            SessionEvent::TagReady(t) => t,
            SessionEvent::UserCancelled => return Err(Error::UserCancelled),
            SessionEvent::Timeout => return Err(Error::Timeout),
            SessionEvent::Error(e) => return Err(e),
        };

        let mut chip = ChipHandle::new(transport, self.key_index);

        // Read and validate the chip key
        let record = chip.read_auth_record().await?;
        let chip_key = curve::validate_pubkey(&record.public_key)?;

        // A mint for an already-bound key would burn a signature for
        // nothing; check before asking the chip to sign.
        if matches!(request, OperationRequest::Mint { .. }) {
            if let Ok(existing) = self.contract.token_id_for_key(&chip_key).await {
                return Err(Error::ContractExecution {
                    detail: format!("chip already minted as token {existing}"),
                    code: Some(crate::contract::codes::TOKEN_ALREADY_MINTED),
                });
            }
        }

        // Resolve the next acceptable nonce
        let nonce = NonceCoordinator::new(&self.contract)
            .next_nonce(&chip_key)
            .await?;

        // Build the auth message for this operation
        let auth = sep53::build_auth_message(
            &self.contract.contract_id_hex(),
            request.function(),
            &request.auth_args(),
            nonce,
            self.contract.network_passphrase(),
        )?;

        debug!(
            "auth message: {} bytes, hash {}",
            auth.message.len(),
            hex::encode(auth.hash)
        );

        // Chip signature over the hash
        let sig_record = chip.sign_hash(&auth.hash).await?;
        let (r, s) = der::parse_signature(&sig_record.der)?;

        // Low-S normalize and assemble the fixed 64-byte form
        let s = curve::normalize_s(&s);
        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&r);
        signature[32..].copy_from_slice(&s);

        // Derive the recovery id against the key read above. A mismatch is
        // a correctness failure; nothing is submitted.
        let recovery_id = recover::resolve_recovery_id(&auth.hash, &r, &s, &chip_key)?;

        debug!("recovery id {recovery_id}, nonce {nonce}");

        // Hand off to the invoker
        let outcome = self
            .submit(submitter, &request, &auth.message, &signature, recovery_id, &chip_key, nonce)
            .await?;

        info!(
            "{} complete: tx {}, token {:?}",
            request.function(),
            outcome.hash,
            outcome.token_id()
        );

        Ok(OperationOutcome {
            token_id: outcome.token_id(),
            tx_hash: outcome.hash,
            chip_key,
            nonce,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit(
        &self,
        submitter: &crate::store::Submitter,
        request: &OperationRequest,
        message: &[u8],
        signature: &[u8; 64],
        recovery_id: u8,
        chip_key: &PubKey65,
        nonce: u32,
    ) -> Result<InvokeOutcome, Error> {
        match request {
            OperationRequest::Mint { to } => {
                self.contract
                    .mint(submitter, to, message, signature, recovery_id, chip_key, nonce)
                    .await
            }
            OperationRequest::Claim { claimant, .. } => {
                self.contract
                    .claim(submitter, claimant, message, signature, recovery_id, chip_key, nonce)
                    .await
            }
            OperationRequest::Transfer { from, to, token_id } => {
                self.contract
                    .transfer(
                        submitter, from, to, *token_id, message, signature, recovery_id,
                        chip_key, nonce,
                    )
                    .await
            }
        }
    }
}
