// Copyright (c) 2024-2025 The Tapmint Project

//! Submitter identity and persisted user preferences
//!
//! The submitter secret is an authenticated secret held by the platform's
//! secure store ("available when unlocked, this device only"); this module
//! defines the seam and two portable backends (environment, static value).
//! Preferences are the only other persisted state: an optional contract id
//! override and the wallet address, stored as a small JSON record.

use std::path::Path;

use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Service tag under which the submitter secret is filed
pub const SECRET_SERVICE_TAG: &str = "tapmint.privatekey";

/// Account tag for the submitter secret entry
pub const SECRET_ACCOUNT_TAG: &str = "wallet_key";

/// Environment variable consulted by [EnvSecretStore]
pub const SECRET_ENV_VAR: &str = "TAPMINT_SUBMITTER_SECRET";

/// Read-only access to the submitter secret.
///
/// Resolved once per operation at hand-off time, never cached at module
/// scope.
pub trait SecretStore: Send + Sync {
    /// Resolve the submitter identity
    fn submitter(&self) -> Result<Submitter, Error>;
}

/// Secret store backed by an environment variable
#[derive(Clone, Debug, Default)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn submitter(&self) -> Result<Submitter, Error> {
        let seed = std::env::var(SECRET_ENV_VAR)
            .map_err(|_| Error::Validation(format!("{SECRET_ENV_VAR} not set")))?;

        Submitter::from_secret_seed(&seed)
    }
}

/// Secret store holding a configured seed (config file, tests)
#[derive(Clone)]
pub struct StaticSecretStore {
    seed: String,
}

impl StaticSecretStore {
    pub fn new(seed: impl Into<String>) -> Self {
        Self { seed: seed.into() }
    }
}

impl SecretStore for StaticSecretStore {
    fn submitter(&self) -> Result<Submitter, Error> {
        Submitter::from_secret_seed(&self.seed)
    }
}

/// The account that signs and submits contract invocations.
///
/// This is never the chip: the chip authorizes, the submitter pays.
pub struct Submitter {
    signing: SigningKey,
}

impl Submitter {
    /// Parse an `S...` strkey secret seed
    pub fn from_secret_seed(seed: &str) -> Result<Self, Error> {
        let key = stellar_strkey::ed25519::PrivateKey::from_string(seed)
            .map_err(|_| Error::Validation("invalid submitter secret seed".into()))?;

        Ok(Self {
            signing: SigningKey::from_bytes(&key.0),
        })
    }

    /// Public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// `G...` account address
    pub fn address(&self) -> String {
        stellar_strkey::ed25519::PublicKey(self.public_key()).to_string()
    }

    /// Sign a payload hash with the submitter key
    pub fn sign(&self, payload: &[u8]) -> [u8; 64] {
        self.signing.sign(payload).to_bytes()
    }

    /// Signature hint: trailing four bytes of the public key
    pub fn hint(&self) -> [u8; 4] {
        let pk = self.public_key();
        [pk[28], pk[29], pk[30], pk[31]]
    }
}

/// Persisted user preferences
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Contract id override of the build-time default
    pub contract_id: Option<String>,

    /// Wallet address shown in the UI
    pub wallet_address: Option<String>,
}

impl Preferences {
    /// Load preferences, returning defaults when the record does not exist
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Validation(format!("preferences {}: {e}", path.display())))?;

        serde_json::from_str(&raw)
            .map_err(|e| Error::Validation(format!("preferences parse: {e}")))
    }

    /// Persist preferences, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Validation(format!("preferences dir: {e}")))?;
        }

        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Validation(format!("preferences encode: {e}")))?;

        std::fs::write(path, raw)
            .map_err(|e| Error::Validation(format!("preferences {}: {e}", path.display())))
    }
}
