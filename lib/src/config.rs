// Copyright (c) 2024-2025 The Tapmint Project

//! Configuration surface
//!
//! Options are enumerated: network, horizon / RPC endpoints, contract id
//! and the submitter secret. File values (TOML) are overridden by CLI
//! arguments; the secret may instead come from the environment through the
//! secret store.

use std::path::Path;

use serde::Deserialize;

use crate::Error;

/// Supported networks
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Default,
    clap::ValueEnum,
    strum::Display,
    strum::EnumString,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
    Futurenet,
}

impl Network {
    /// Network passphrase, hashed into every auth message and envelope
    pub fn passphrase(&self) -> &'static str {
        match self {
            Network::Testnet => "Test SDF Network ; September 2015",
            Network::Mainnet => "Public Global Stellar Network ; September 2015",
            Network::Futurenet => "Test SDF Future Network ; October 2022",
        }
    }

    /// Default RPC endpoint
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Testnet => "https://soroban-testnet.stellar.org",
            Network::Mainnet => "https://mainnet.sorobanrpc.com",
            Network::Futurenet => "https://rpc-futurenet.stellar.org",
        }
    }

    /// Default horizon endpoint
    pub fn default_horizon_url(&self) -> &'static str {
        match self {
            Network::Testnet => "https://horizon-testnet.stellar.org",
            Network::Mainnet => "https://horizon.stellar.org",
            Network::Futurenet => "https://horizon-futurenet.stellar.org",
        }
    }
}

/// Agent configuration
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Target network
    #[serde(default)]
    pub network: Network,

    /// Horizon endpoint override
    pub horizon_url: Option<String>,

    /// RPC endpoint override
    pub rpc_url: Option<String>,

    /// Contract id: `C...` strkey or 64-digit hex
    pub contract_id: Option<String>,

    /// Submitter secret seed (`S...`); prefer the secret store over this
    pub submitter_secret: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Validation(format!("config {}: {e}", path.display())))?;

        toml::from_str(&raw).map_err(|e| Error::Validation(format!("config parse: {e}")))
    }

    /// Effective RPC endpoint
    pub fn rpc_url(&self) -> String {
        self.rpc_url
            .clone()
            .unwrap_or_else(|| self.network.default_rpc_url().to_string())
    }

    /// Effective horizon endpoint
    pub fn horizon_url(&self) -> String {
        self.horizon_url
            .clone()
            .unwrap_or_else(|| self.network.default_horizon_url().to_string())
    }

    /// Decode the configured contract id to its 32-byte hash
    pub fn contract_id_bytes(&self) -> Result<[u8; 32], Error> {
        let raw = self
            .contract_id
            .as_deref()
            .ok_or_else(|| Error::Validation("no contract id configured".into()))?;

        decode_contract_id(raw)
    }
}

/// Decode a contract id from `C...` strkey or hex form
pub fn decode_contract_id(raw: &str) -> Result<[u8; 32], Error> {
    if raw.starts_with('C') {
        let c = stellar_strkey::Contract::from_string(raw)
            .map_err(|_| Error::Validation(format!("invalid contract id: {raw}")))?;
        return Ok(c.0);
    }

    let bytes = tapmint_core::codec::decode_hex(raw)?;
    bytes
        .try_into()
        .map_err(|_| Error::Validation("contract id must be 32 bytes".into()))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn network_names_parse() {
        assert_eq!(Network::from_str("testnet").unwrap(), Network::Testnet);
        assert_eq!(Network::Mainnet.to_string(), "mainnet");
    }

    #[test]
    fn defaults_follow_network() {
        let cfg = Config {
            network: Network::Testnet,
            ..Default::default()
        };

        assert_eq!(cfg.rpc_url(), "https://soroban-testnet.stellar.org");
        assert_eq!(cfg.horizon_url(), "https://horizon-testnet.stellar.org");
    }

    #[test]
    fn overrides_win() {
        let cfg = Config {
            rpc_url: Some("http://localhost:8000".into()),
            ..Default::default()
        };

        assert_eq!(cfg.rpc_url(), "http://localhost:8000");
    }

    #[test]
    fn contract_id_from_hex() {
        let hex_id = "11".repeat(32);
        assert_eq!(decode_contract_id(&hex_id).unwrap(), [0x11u8; 32]);

        assert!(decode_contract_id("00ff").is_err());
    }

    #[test]
    fn config_from_toml() {
        let cfg: Config = toml::from_str(
            r#"
            network = "futurenet"
            rpc_url = "http://localhost:8000"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.network, Network::Futurenet);
        assert_eq!(cfg.rpc_url(), "http://localhost:8000");
        assert!(cfg.contract_id.is_none());
    }
}
