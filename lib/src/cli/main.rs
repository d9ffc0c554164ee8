// Copyright (c) 2024-2025 The Tapmint Project

//! Command line utility for chip-authorized NFT operations

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, LevelFilter};

use tapmint::{
    config::decode_contract_id, transport::TcpConnector, Agent, ChipHandle, Config,
    ContractClient, EnvSecretStore, GenericConnector, HttpRpc, Network, OperationRequest,
    Preferences, ReaderSession, SecretStore, SessionEvent, StaticSecretStore, Submitter,
};

mod helpers;
use helpers::HexData;

/// Chip-authorized NFT operation agent
#[derive(Clone, Debug, Parser)]
struct Options {
    /// Configuration file (TOML)
    #[clap(long)]
    config: Option<PathBuf>,

    /// Preferences record
    #[clap(long)]
    prefs: Option<PathBuf>,

    /// Target network
    #[clap(long, value_enum)]
    network: Option<Network>,

    /// RPC endpoint override
    #[clap(long)]
    rpc_url: Option<String>,

    /// Contract id override (`C...` strkey or hex)
    #[clap(long)]
    contract_id: Option<String>,

    /// Reader backend
    #[clap(long, value_enum, default_value = "tcp")]
    reader: ReaderKind,

    /// Emulated chip address for the TCP reader
    #[clap(long, default_value = "127.0.0.1:9999")]
    tcp_addr: SocketAddr,

    /// Restrict PC/SC polling to a named reader
    #[clap(long)]
    reader_name: Option<String>,

    /// Chip key slot
    #[clap(long, default_value = "1")]
    key_index: u8,

    /// Enable verbose logging
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,

    /// Subcommand to execute
    #[clap(subcommand)]
    cmd: Actions,
}

/// Supported reader backends
#[derive(Copy, Clone, Debug, PartialEq, clap::ValueEnum, strum::Display)]
enum ReaderKind {
    /// Emulated chip over TCP
    Tcp,
    /// PC/SC contactless reader
    Pcsc,
}

#[derive(Clone, Debug, PartialEq, Parser)]
#[non_exhaustive]
enum Actions {
    /// Mint a token authorized by the presented chip
    Mint {
        /// Owner account for the minted token
        #[clap(long)]
        to: String,
    },

    /// Claim a minted token for a wallet
    Claim {
        /// Claimant account
        #[clap(long)]
        claimant: String,

        /// Token id being claimed
        #[clap(long)]
        token_id: u64,
    },

    /// Transfer a token, authorized by the presented chip
    Transfer {
        /// Sending wallet (must be the submitter wallet)
        #[clap(long)]
        from: String,

        /// Receiving wallet
        #[clap(long)]
        to: String,

        /// Token id being transferred
        #[clap(long)]
        token_id: u64,
    },

    /// Read the chip's auth record (counters and public key)
    ChipInfo,

    /// Read the stored replay nonce for a chip key
    Nonce {
        /// Chip public key (hex, 65 bytes); read from the chip when omitted
        #[clap(long)]
        public_key: Option<HexData<65>>,
    },

    /// Look up the owner of a token
    Owner {
        #[clap(long)]
        token_id: u64,
    },

    /// Look up the metadata URI of a token
    Uri {
        #[clap(long)]
        token_id: u64,
    },

    /// Token count held by a wallet
    Balance {
        #[clap(long)]
        owner: String,
    },

    /// Next token id in the enumeration
    NextTokenId,

    /// Update the persisted preferences record
    Prefs {
        /// Contract id override
        #[clap(long)]
        contract_id: Option<String>,

        /// Wallet address shown in the UI
        #[clap(long)]
        wallet_address: Option<String>,
    },
}

/// Secret store selected from configuration
enum CliSecrets {
    Static(StaticSecretStore),
    Env(EnvSecretStore),
}

impl SecretStore for CliSecrets {
    fn submitter(&self) -> Result<Submitter, tapmint::Error> {
        match self {
            CliSecrets::Static(s) => s.submitter(),
            CliSecrets::Env(s) => s.submitter(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Options::parse();

    simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default()).unwrap();

    // Load configuration and preferences
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(network) = args.network {
        config.network = network;
    }
    if let Some(rpc_url) = &args.rpc_url {
        config.rpc_url = Some(rpc_url.clone());
    }

    let prefs_path = args.prefs.clone().unwrap_or_else(default_prefs_path);
    let prefs = Preferences::load(&prefs_path)?;

    // Preferences update needs nothing else
    if let Actions::Prefs {
        contract_id,
        wallet_address,
    } = &args.cmd
    {
        let mut updated = prefs;
        if contract_id.is_some() {
            updated.contract_id = contract_id.clone();
        }
        if wallet_address.is_some() {
            updated.wallet_address = wallet_address.clone();
        }

        updated.save(&prefs_path)?;
        info!("preferences saved to {}", prefs_path.display());
        return Ok(());
    }

    // Contract id: CLI over config over preferences
    let contract_raw = args
        .contract_id
        .clone()
        .or_else(|| config.contract_id.clone())
        .or_else(|| prefs.contract_id.clone())
        .ok_or_else(|| anyhow::anyhow!("no contract id configured"))?;
    let contract_id = decode_contract_id(&contract_raw)?;

    let secrets = match &config.submitter_secret {
        Some(seed) => CliSecrets::Static(StaticSecretStore::new(seed.clone())),
        None => CliSecrets::Env(EnvSecretStore),
    };

    let rpc = HttpRpc::new(&config.rpc_url())?;
    let client = ContractClient::new(
        rpc,
        config.network,
        contract_id,
        secrets.submitter()?.address(),
    );

    let connector = match args.reader {
        ReaderKind::Tcp => GenericConnector::Tcp(TcpConnector {
            addr: args.tcp_addr,
        }),
        #[cfg(feature = "transport_pcsc")]
        ReaderKind::Pcsc => GenericConnector::Pcsc(tapmint::transport::PcscConnector {
            reader: args.reader_name.clone(),
        }),
        #[cfg(not(feature = "transport_pcsc"))]
        ReaderKind::Pcsc => {
            anyhow::bail!("built without PC/SC support (feature `transport_pcsc`)")
        }
    };

    debug!("using {} reader, network {}", args.reader, config.network);

    let agent = Agent::new(connector.clone(), client, secrets, args.key_index);

    execute(agent, connector, args).await
}

async fn execute(
    agent: Agent<GenericConnector, HttpRpc, CliSecrets>,
    connector: GenericConnector,
    args: Options,
) -> anyhow::Result<()> {
    match args.cmd {
        Actions::Mint { to } => {
            let outcome = agent.execute(OperationRequest::Mint { to }).await?;

            info!("minted token {:?} (tx {})", outcome.token_id, outcome.tx_hash);
        }
        Actions::Claim { claimant, token_id } => {
            let outcome = agent
                .execute(OperationRequest::Claim { claimant, token_id })
                .await?;

            info!("claimed token {:?} (tx {})", outcome.token_id, outcome.tx_hash);
        }
        Actions::Transfer { from, to, token_id } => {
            let outcome = agent
                .execute(OperationRequest::Transfer { from, to, token_id })
                .await?;

            info!("transferred token {token_id} (tx {})", outcome.tx_hash);
        }
        Actions::ChipInfo => {
            let record = read_chip_record(&connector, args.key_index).await?;

            info!("public key: {}", hex::encode(record.public_key));
            info!(
                "global counter: {}, key counter: {}",
                record.global_counter, record.key_counter
            );
        }
        Actions::Nonce { public_key } => {
            let key: [u8; 65] = match public_key {
                Some(k) => k.0,
                None => read_chip_record(&connector, args.key_index).await?.public_key,
            };

            let nonce = agent.contract().get_nonce(&key).await?;
            info!("stored nonce: {nonce}");
        }
        Actions::Owner { token_id } => {
            let owner = agent.contract().owner_of(token_id).await?;
            info!("owner of {token_id}: {owner}");
        }
        Actions::Uri { token_id } => {
            let uri = agent.contract().token_uri(token_id).await?;
            info!("token {token_id} uri: {uri}");
        }
        Actions::Balance { owner } => {
            let balance = agent.contract().balance(&owner).await?;
            info!("balance of {owner}: {balance}");
        }
        Actions::NextTokenId => {
            let next = agent.contract().next_token_id().await?;
            info!("next token id: {next}");
        }
        Actions::Prefs { .. } => unreachable!("handled before agent construction"),
    }

    Ok(())
}

/// Open a session and read the chip auth record
async fn read_chip_record(
    connector: &GenericConnector,
    key_index: u8,
) -> anyhow::Result<tapmint::apdu::key_info::ChipAuthRecord> {
    let mut session = ReaderSession::begin()?;

    let transport = match session.wait_for_tag(connector).await {
        SessionEvent::TagReady(t) => t,
        SessionEvent::UserCancelled => anyhow::bail!("cancelled"),
        SessionEvent::Timeout => anyhow::bail!("timed out waiting for a tag"),
        SessionEvent::Error(e) => return Err(e.into()),
    };

    let mut chip = ChipHandle::new(transport, key_index);
    let record = chip.read_auth_record().await;

    session.close();

    Ok(record?)
}

fn default_prefs_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config/tapmint/prefs.json")
}
