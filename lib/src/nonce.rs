// Copyright (c) 2024-2025 The Tapmint Project

//! Replay-nonce coordination
//!
//! The nonce lives in contract storage, keyed by chip public key; the host
//! never writes it, it only reads the reflection of on-chain state and
//! offers the next acceptable value.

use log::debug;

use tapmint_core::PubKey65;

use crate::contract::{codes, ContractClient, RpcTransport};
use crate::Error;

/// Read-side nonce coordinator over the contract client
pub struct NonceCoordinator<'a, R: RpcTransport> {
    contract: &'a ContractClient<R>,
}

impl<'a, R: RpcTransport> NonceCoordinator<'a, R> {
    pub fn new(contract: &'a ContractClient<R>) -> Self {
        Self { contract }
    }

    /// Next nonce the contract will accept for a chip key.
    ///
    /// A key the contract has never seen starts at zero; a stored value
    /// advances by one. Any other failure propagates.
    pub async fn next_nonce(&self, chip_key: &PubKey65) -> Result<u32, Error> {
        match self.contract.get_nonce(chip_key).await {
            Ok(stored) => {
                let next = stored
                    .checked_add(1)
                    .ok_or_else(|| Error::Validation("nonce space exhausted".into()))?;

                debug!("stored nonce {stored}, next {next}");
                Ok(next)
            }
            Err(Error::ContractSimulation {
                code: Some(codes::UNKNOWN_PUBLIC_KEY),
                ..
            }) => {
                debug!("chip key unknown to contract, nonce 0");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}
