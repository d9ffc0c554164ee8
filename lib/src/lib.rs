// Copyright (c) 2024-2025 The Tapmint Project

//! Tapmint host agent library (and CLI)
//!
//! Authorizes operations on a smart-contract NFT collection with an
//! off-card secp256k1 signer in a contactless chip: the agent drives the
//! chip over ISO-7816 APDUs, shapes the resulting signature, derives the
//! public-key recovery index, coordinates the replay nonce with the
//! contract and submits the invocation with a local submitter account.

/// Re-export `tapmint-apdu` for consumers
pub use tapmint_apdu::{self as apdu};

/// Re-export `tapmint-core` for consumers
pub use tapmint_core::{self as core, FieldElement, PubKey65};

pub mod transport;
pub use transport::{Connect, Exchange, GenericConnector, GenericTransport};

pub mod session;
pub use session::{CancelToken, ReaderSession, SessionEvent};

pub mod chip;
pub use chip::{ChipHandle, ChipState};

pub mod contract;
pub use contract::{ContractClient, HttpRpc, InvokeOutcome, RpcTransport};

pub mod nonce;
pub use nonce::NonceCoordinator;

pub mod agent;
pub use agent::{Agent, OperationOutcome, OperationRequest};

pub mod config;
pub use config::{Config, Network};

pub mod store;
pub use store::{EnvSecretStore, Preferences, SecretStore, StaticSecretStore, Submitter};

mod error;
pub use error::Error;
