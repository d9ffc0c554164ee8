// Copyright (c) 2024-2025 The Tapmint Project

//! XDR assembly helpers for contract invocations
//!
//! Builds invoke-host-function transactions, attaches simulation results,
//! signs envelopes with the submitter key and decodes typed return values.
//! Wire strings from the node are treated as already-base64 XDR and never
//! re-encoded.

use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    AccountId, DecoratedSignature, Hash, HostFunction, InvokeContractArgs,
    InvokeHostFunctionOp, LedgerEntryData, LedgerKey, LedgerKeyAccount, Limits, Memo,
    MuxedAccount, Operation, OperationBody, Preconditions, PublicKey as XdrPublicKey,
    ReadXdr, ScAddress, ScBytes, ScSymbol, ScVal, SequenceNumber, Signature as XdrSignature,
    SignatureHint, SorobanTransactionData, Transaction, TransactionEnvelope, TransactionExt,
    TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction,
    TransactionV1Envelope, Uint256, VecM, WriteXdr,
};

use crate::store::Submitter;
use crate::Error;

/// Base transaction fee in stroops, before resource fees
pub const BASE_FEE: u32 = 100;

/// Network id: SHA-256 of the network passphrase
pub fn network_id(passphrase: &str) -> Hash {
    Hash(Sha256::digest(passphrase.as_bytes()).into())
}

/// Parse a `G...` address into an [AccountId]
pub fn account_id(address: &str) -> Result<AccountId, Error> {
    let pk = stellar_strkey::ed25519::PublicKey::from_string(address)
        .map_err(|_| Error::Validation(format!("invalid account address: {address}")))?;

    Ok(AccountId(XdrPublicKey::PublicKeyTypeEd25519(Uint256(pk.0))))
}

/// Parse a `G...` address into a [MuxedAccount] source
pub fn muxed_account(address: &str) -> Result<MuxedAccount, Error> {
    let pk = stellar_strkey::ed25519::PublicKey::from_string(address)
        .map_err(|_| Error::Validation(format!("invalid account address: {address}")))?;

    Ok(MuxedAccount::Ed25519(Uint256(pk.0)))
}

/// Address argument
pub fn sc_address(address: &str) -> Result<ScVal, Error> {
    Ok(ScVal::Address(ScAddress::Account(account_id(address)?)))
}

/// u32 argument
pub fn sc_u32(v: u32) -> ScVal {
    ScVal::U32(v)
}

/// u64 argument
pub fn sc_u64(v: u64) -> ScVal {
    ScVal::U64(v)
}

/// Byte-string argument
pub fn sc_bytes(bytes: &[u8]) -> Result<ScVal, Error> {
    let b = bytes
        .to_vec()
        .try_into()
        .map_err(|_| Error::Validation("byte argument too long".into()))?;

    Ok(ScVal::Bytes(ScBytes(b)))
}

/// Build an invoke-host-function transaction for one contract call
pub fn build_invoke_tx(
    source: MuxedAccount,
    seq_num: i64,
    contract_id: &[u8; 32],
    function: &str,
    args: Vec<ScVal>,
) -> Result<Transaction, Error> {
    let function_name = ScSymbol(
        function
            .try_into()
            .map_err(|_| Error::Validation(format!("function name too long: {function}")))?,
    );

    let invoke = InvokeHostFunctionOp {
        host_function: HostFunction::InvokeContract(InvokeContractArgs {
            contract_address: ScAddress::Contract(Hash(*contract_id)),
            function_name,
            args: args
                .try_into()
                .map_err(|_| Error::Validation("too many arguments".into()))?,
        }),
        auth: VecM::default(),
    };

    let operation = Operation {
        source_account: None,
        body: OperationBody::InvokeHostFunction(invoke),
    };

    Ok(Transaction {
        source_account: source,
        fee: BASE_FEE,
        seq_num: SequenceNumber(seq_num),
        cond: Preconditions::None,
        memo: Memo::None,
        operations: vec![operation]
            .try_into()
            .map_err(|_| Error::Validation("operation encode".into()))?,
        ext: TransactionExt::V0,
    })
}

/// Encode an unsigned envelope for simulation
pub fn unsigned_envelope_base64(tx: &Transaction) -> Result<String, Error> {
    let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
        tx: tx.clone(),
        signatures: VecM::default(),
    });

    envelope
        .to_xdr_base64(Limits::none())
        .map_err(|e| Error::Validation(format!("envelope encode: {e}")))
}

/// Attach simulation results: resource footprint and fee
pub fn attach_simulation(
    tx: &mut Transaction,
    transaction_data_b64: &str,
    min_resource_fee: u64,
) -> Result<(), Error> {
    let data = SorobanTransactionData::from_xdr_base64(transaction_data_b64, Limits::none())
        .map_err(|e| Error::Transport(format!("simulation data decode: {e}")))?;

    tx.ext = TransactionExt::V1(data);
    tx.fee = BASE_FEE
        .checked_add(min_resource_fee as u32)
        .ok_or_else(|| Error::Validation("resource fee overflow".into()))?;

    Ok(())
}

/// Sign a transaction with the submitter key and encode the envelope
pub fn sign_and_encode(
    tx: Transaction,
    passphrase: &str,
    submitter: &Submitter,
) -> Result<String, Error> {
    let payload = TransactionSignaturePayload {
        network_id: network_id(passphrase),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
    };

    let payload_bytes = payload
        .to_xdr(Limits::none())
        .map_err(|e| Error::Validation(format!("payload encode: {e}")))?;

    let hash = Sha256::digest(&payload_bytes);
    let signature = submitter.sign(&hash);

    let decorated = DecoratedSignature {
        hint: SignatureHint(submitter.hint()),
        signature: XdrSignature(
            signature
                .to_vec()
                .try_into()
                .map_err(|_| Error::Validation("signature encode".into()))?,
        ),
    };

    let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: vec![decorated]
            .try_into()
            .map_err(|_| Error::Validation("signature encode".into()))?,
    });

    envelope
        .to_xdr_base64(Limits::none())
        .map_err(|e| Error::Validation(format!("envelope encode: {e}")))
}

/// Ledger key for an account entry, base64 encoded
pub fn account_key_base64(address: &str) -> Result<String, Error> {
    let key = LedgerKey::Account(LedgerKeyAccount {
        account_id: account_id(address)?,
    });

    key.to_xdr_base64(Limits::none())
        .map_err(|e| Error::Validation(format!("ledger key encode: {e}")))
}

/// Decode the sequence number from an account ledger entry
pub fn sequence_from_entry(entry_b64: &str) -> Result<i64, Error> {
    let data = LedgerEntryData::from_xdr_base64(entry_b64, Limits::none())
        .map_err(|e| Error::Transport(format!("ledger entry decode: {e}")))?;

    match data {
        LedgerEntryData::Account(account) => Ok(account.seq_num.0),
        _ => Err(Error::Transport("ledger entry is not an account".into())),
    }
}

/// Decode a base64 ScVal return value
pub fn decode_return_value(b64: &str) -> Result<ScVal, Error> {
    ScVal::from_xdr_base64(b64, Limits::none())
        .map_err(|e| Error::Transport(format!("return value decode: {e}")))
}

/// Read a u32 return value
pub fn scval_u32(v: &ScVal) -> Result<u32, Error> {
    match v {
        ScVal::U32(x) => Ok(*x),
        _ => Err(Error::Transport(format!("expected u32 return, got {v:?}"))),
    }
}

/// Read a u64 return value
pub fn scval_u64(v: &ScVal) -> Result<u64, Error> {
    match v {
        ScVal::U64(x) => Ok(*x),
        ScVal::U32(x) => Ok(*x as u64),
        _ => Err(Error::Transport(format!("expected u64 return, got {v:?}"))),
    }
}

/// Read a string return value
pub fn scval_string(v: &ScVal) -> Result<String, Error> {
    match v {
        ScVal::String(s) => s
            .0
            .to_utf8_string()
            .map_err(|e| Error::Transport(format!("string return decode: {e}"))),
        ScVal::Symbol(s) => s
            .0
            .to_utf8_string()
            .map_err(|e| Error::Transport(format!("string return decode: {e}"))),
        _ => Err(Error::Transport(format!("expected string return, got {v:?}"))),
    }
}

/// Read a byte-string return value
pub fn scval_bytes(v: &ScVal) -> Result<Vec<u8>, Error> {
    match v {
        ScVal::Bytes(b) => Ok(b.0.to_vec()),
        _ => Err(Error::Transport(format!("expected bytes return, got {v:?}"))),
    }
}

/// Read an address return value as a strkey string.
///
/// Contract-typed addresses decode to their `C...` strkey; callers treat
/// that value as opaque.
pub fn scval_address(v: &ScVal) -> Result<String, Error> {
    match v {
        ScVal::Address(ScAddress::Account(AccountId(XdrPublicKey::PublicKeyTypeEd25519(
            Uint256(pk),
        )))) => Ok(stellar_strkey::ed25519::PublicKey(*pk).to_string()),
        ScVal::Address(ScAddress::Contract(Hash(h))) => {
            Ok(stellar_strkey::Contract(*h).to_string())
        }
        _ => Err(Error::Transport(format!("expected address return, got {v:?}"))),
    }
}
