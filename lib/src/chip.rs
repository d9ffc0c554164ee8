// Copyright (c) 2024-2025 The Tapmint Project

//! Chip command handler
//!
//! Drives the multi-APDU dance for one operation as an explicit state
//! machine:
//!
//! ```text
//!  START ─► SELECT_APP ──ok──► GET_KEY_INFO ──ok──► PUBKEY_READY
//!                                   │ key-not-found
//!                                   ▼
//!                              GENERATE_KEY ──ok──► {idx < target} ? loop : GET_KEY_INFO
//!                                   │ storage-full
//!                                   ▼
//!                                 FATAL
//!
//!  PUBKEY_READY ─(SELECT_APP)─► GENERATE_SIGNATURE ──ok──► SIG_READY
//! ```
//!
//! Transitions fire on APDU completions; non-success status words abort
//! without silent retries.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Mutex;

use tapmint_apdu::generate_key::{GenerateKey, GeneratedKey};
use tapmint_apdu::key_info::{ChipAuthRecord, GetKeyInfo};
use tapmint_apdu::select::SelectApp;
use tapmint_apdu::sign::{GenerateSignature, SignatureRecord};
use tapmint_apdu::status::{SW_KEY_NOT_FOUND, SW_MEMORY_FULL};
use tapmint_apdu::{ChipRequest, ChipResponse, StatusWord};

use crate::transport::Exchange;
use crate::Error;

/// Handler state, advanced by APDU completions
#[derive(Copy, Clone, Debug, PartialEq, strum::Display)]
pub enum ChipState {
    Start,
    Selected,
    PubkeyReady,
    SigReady,
    Fatal,
}

/// Handle for a connected chip, generic over the reader transport
pub struct ChipHandle<T: Exchange> {
    t: Arc<Mutex<T>>,
    key_index: u8,
    state: ChipState,
}

impl<T: Exchange> ChipHandle<T> {
    /// Wrap a connected transport, targeting a chip key slot
    pub fn new(t: T, key_index: u8) -> Self {
        Self {
            t: Arc::new(Mutex::new(t)),
            key_index,
            state: ChipState::Start,
        }
    }

    /// Current state machine position
    pub fn state(&self) -> ChipState {
        self.state
    }

    /// Issue one request and return the raw body and status word
    async fn request(&self, req: impl ChipRequest) -> Result<(Vec<u8>, StatusWord), Error> {
        let apdu = req.apdu();
        let t = self.t.lock().await;
        t.exchange(&apdu).await
    }

    /// Issue a request that must succeed, parsing the typed response
    async fn request_ok<R: ChipResponse>(&self, req: impl ChipRequest) -> Result<R, Error> {
        let (body, sw) = self.request(req).await?;

        if !sw.is_ok() {
            return Err(Error::ChipProtocol {
                detail: sw.describe().to_string(),
                sw: Some(sw.value()),
            });
        }

        R::parse(&body).map_err(Error::from)
    }

    /// Select the signing applet
    async fn select(&mut self) -> Result<(), Error> {
        self.request_ok::<tapmint_apdu::select::SelectResp>(SelectApp)
            .await?;
        self.state = ChipState::Selected;
        Ok(())
    }

    /// Read counters and public key for the target slot, generating keys
    /// until the slot exists.
    pub async fn read_auth_record(&mut self) -> Result<ChipAuthRecord, Error> {
        self.select().await?;

        // The chip assigns key indices sequentially; loop generation until
        // the requested slot appears, bounded by the slot space.
        for _ in 0..=u8::MAX as usize {
            let (body, sw) = self.request(GetKeyInfo::new(self.key_index)).await?;

            if sw.is_ok() {
                let record = ChipAuthRecord::parse(&body)?;
                debug!(
                    "chip key {} ready (global: {}, key: {})",
                    self.key_index, record.global_counter, record.key_counter
                );

                self.state = ChipState::PubkeyReady;
                return Ok(record);
            }

            if sw != SW_KEY_NOT_FOUND {
                return Err(Error::ChipProtocol {
                    detail: sw.describe().to_string(),
                    sw: Some(sw.value()),
                });
            }

            debug!("chip key {} not present, generating", self.key_index);

            // Generate until the chip hands back the requested slot, then
            // re-read its info.
            loop {
                let (body, sw) = self.request(GenerateKey).await?;

                if sw == SW_MEMORY_FULL {
                    self.state = ChipState::Fatal;
                    return Err(Error::ChipProtocol {
                        detail: "key storage full".to_string(),
                        sw: Some(sw.value()),
                    });
                }
                if !sw.is_ok() {
                    return Err(Error::ChipProtocol {
                        detail: sw.describe().to_string(),
                        sw: Some(sw.value()),
                    });
                }

                let generated = GeneratedKey::parse(&body)?;
                debug!("chip generated key index {}", generated.key_index);

                if generated.key_index >= self.key_index {
                    break;
                }
            }
        }

        self.state = ChipState::Fatal;
        Err(Error::ChipProtocol {
            detail: "key slot space exhausted".to_string(),
            sw: None,
        })
    }

    /// Request a signature over a 32-byte hash.
    ///
    /// The applet is re-selected first so a re-fielded tag signs reliably.
    pub async fn sign_hash(&mut self, msg_hash: &[u8]) -> Result<SignatureRecord, Error> {
        if self.state != ChipState::PubkeyReady {
            return Err(Error::Validation(format!(
                "chip key must be read before signing (state: {})",
                self.state
            )));
        }

        // Fatal invariant: the chip signs exactly 32 bytes
        let hash: [u8; 32] = msg_hash
            .try_into()
            .map_err(|_| Error::Validation("message hash must be 32 bytes".into()))?;

        self.select().await?;

        let record: SignatureRecord = self
            .request_ok(GenerateSignature::new(self.key_index, hash))
            .await?;

        if record.key_counter == 0 {
            // The chip has signed once; counters are informational
            warn!("chip reports key counter 0 after a successful signature");
        }

        debug!(
            "chip signature issued (global: {}, key: {}, der: {} bytes)",
            record.global_counter,
            record.key_counter,
            record.der.len()
        );

        self.state = ChipState::SigReady;
        Ok(record)
    }
}
