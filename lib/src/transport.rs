// Copyright (c) 2024-2025 The Tapmint Project

//! Transport abstraction over chip readers
//!
//! [Exchange] is the single operation the command handler needs: send one
//! framed APDU, get back the response body and raw status word. Concrete
//! transports cover PC/SC contactless readers (feature `transport_pcsc`)
//! and a TCP bridge for emulated chips (feature `transport_tcp`, 4-byte
//! big-endian length framing on both directions).

use async_trait::async_trait;
use log::trace;

use tapmint_apdu::{split_response, CommandApdu, StatusWord};

use crate::session::CancelToken;
use crate::Error;

/// APDU exchange with a connected tag
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Send a command, returning the response body and status word
    async fn exchange(&self, cmd: &CommandApdu) -> Result<(Vec<u8>, StatusWord), Error>;
}

/// Connect trait for supported reader backends.
///
/// `connect` blocks until a tag is in the field and connected exactly once;
/// the session layer wraps it with the watchdog and cancellation.
#[async_trait]
pub trait Connect: Send + Sync {
    type Transport: Exchange;

    async fn connect(&self, cancel: CancelToken) -> Result<Self::Transport, Error>;
}

/// TCP transport for emulated chips.
///
/// Frames are `len(4, big-endian) || payload`; responses carry the two
/// status bytes after `len` body bytes.
#[cfg(feature = "transport_tcp")]
pub struct TcpTransport {
    stream: tokio::sync::Mutex<tokio::net::TcpStream>,
}

#[cfg(feature = "transport_tcp")]
impl TcpTransport {
    /// Connect to an emulated chip at the provided address
    pub async fn new(addr: std::net::SocketAddr) -> Result<Self, Error> {
        let stream = tokio::net::TcpStream::connect(addr)
            .await
            .map_err(|e| Error::Transport(format!("tcp connect: {e}")))?;

        Ok(Self {
            stream: tokio::sync::Mutex::new(stream),
        })
    }
}

#[cfg(feature = "transport_tcp")]
#[async_trait]
impl Exchange for TcpTransport {
    async fn exchange(&self, cmd: &CommandApdu) -> Result<(Vec<u8>, StatusWord), Error> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let frame = cmd.encode()?;
        trace!("tcp > {}", hex::encode(&frame));

        let mut stream = self.stream.lock().await;

        stream
            .write_all(&(frame.len() as u32).to_be_bytes())
            .await
            .map_err(|e| Error::Transport(format!("tcp write: {e}")))?;
        stream
            .write_all(&frame)
            .await
            .map_err(|e| Error::Transport(format!("tcp write: {e}")))?;

        let mut len_bytes = [0u8; 4];
        stream
            .read_exact(&mut len_bytes)
            .await
            .map_err(|e| Error::Transport(format!("tcp read: {e}")))?;

        let body_len = u32::from_be_bytes(len_bytes) as usize;

        let mut wire = vec![0u8; body_len + 2];
        stream
            .read_exact(&mut wire)
            .await
            .map_err(|e| Error::Transport(format!("tcp read: {e}")))?;
        drop(stream);

        trace!("tcp < {}", hex::encode(&wire));

        let (body, sw) = split_response(&wire)?;
        Ok((body.to_vec(), sw))
    }
}

/// Connector for TCP chip emulators
#[cfg(feature = "transport_tcp")]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TcpConnector {
    pub addr: std::net::SocketAddr,
}

#[cfg(feature = "transport_tcp")]
#[async_trait]
impl Connect for TcpConnector {
    type Transport = TcpTransport;

    async fn connect(&self, cancel: CancelToken) -> Result<TcpTransport, Error> {
        if cancel.is_cancelled() {
            return Err(Error::UserCancelled);
        }

        TcpTransport::new(self.addr).await
    }
}

/// PC/SC transport for contactless readers
#[cfg(feature = "transport_pcsc")]
pub struct PcscTransport {
    card: std::sync::Arc<std::sync::Mutex<pcsc::Card>>,
}

#[cfg(feature = "transport_pcsc")]
#[async_trait]
impl Exchange for PcscTransport {
    async fn exchange(&self, cmd: &CommandApdu) -> Result<(Vec<u8>, StatusWord), Error> {
        let frame = cmd.encode()?;
        trace!("pcsc > {}", hex::encode(&frame));

        let card = self.card.clone();

        // pcsc transmits are blocking; run them off the async executor
        let wire = tokio::task::spawn_blocking(move || {
            let card = card
                .lock()
                .map_err(|_| Error::Transport("pcsc card lock poisoned".into()))?;

            let mut recv = [0u8; 264];
            let resp = card
                .transmit(&frame, &mut recv)
                .map_err(|e| Error::Transport(format!("pcsc transmit: {e}")))?;

            Ok::<_, Error>(resp.to_vec())
        })
        .await
        .map_err(|e| Error::Transport(format!("pcsc task: {e}")))??;

        trace!("pcsc < {}", hex::encode(&wire));

        let (body, sw) = split_response(&wire)?;
        Ok((body.to_vec(), sw))
    }
}

/// Connector for PC/SC readers.
///
/// Polls reader state until exactly one tag is in the field, then connects
/// once. More than one presented tag invalidates the attempt.
#[cfg(feature = "transport_pcsc")]
#[derive(Clone, Debug, Default)]
pub struct PcscConnector {
    /// Restrict polling to a single named reader
    pub reader: Option<String>,
}

#[cfg(feature = "transport_pcsc")]
#[async_trait]
impl Connect for PcscConnector {
    type Transport = PcscTransport;

    async fn connect(&self, cancel: CancelToken) -> Result<PcscTransport, Error> {
        let filter = self.reader.clone();

        let card = tokio::task::spawn_blocking(move || poll_for_tag(filter, cancel))
            .await
            .map_err(|e| Error::Transport(format!("pcsc task: {e}")))??;

        Ok(PcscTransport {
            card: std::sync::Arc::new(std::sync::Mutex::new(card)),
        })
    }
}

/// Blocking poll loop: wait for a single present tag and connect to it
#[cfg(feature = "transport_pcsc")]
fn poll_for_tag(filter: Option<String>, cancel: CancelToken) -> Result<pcsc::Card, Error> {
    use std::ffi::CString;

    let ctx = pcsc::Context::establish(pcsc::Scope::User)
        .map_err(|e| Error::Transport(format!("pcsc context: {e}")))?;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::UserCancelled);
        }

        let mut readers_buf = [0u8; 2048];
        let readers = ctx
            .list_readers(&mut readers_buf)
            .map_err(|e| Error::Transport(format!("pcsc readers: {e}")))?;

        let mut present: Vec<CString> = Vec::new();

        for name in readers {
            if let Some(filter) = &filter {
                if name.to_string_lossy() != filter.as_str() {
                    continue;
                }
            }

            let mut states = [pcsc::ReaderState::new(name.to_owned(), pcsc::State::UNAWARE)];
            if ctx
                .get_status_change(std::time::Duration::from_millis(250), &mut states)
                .is_ok()
                && states[0].event_state().contains(pcsc::State::PRESENT)
            {
                present.push(name.to_owned());
            }
        }

        match present.len() {
            0 => std::thread::sleep(std::time::Duration::from_millis(250)),
            1 => {
                let card = ctx
                    .connect(&present[0], pcsc::ShareMode::Shared, pcsc::Protocols::ANY)
                    .map_err(|e| Error::Transport(format!("pcsc connect: {e}")))?;
                return Ok(card);
            }
            _ => return Err(Error::Validation("present one tag only".into())),
        }
    }
}

/// Generic transport, hiding the reader backend from the handler
pub enum GenericTransport {
    #[cfg(feature = "transport_tcp")]
    Tcp(TcpTransport),
    #[cfg(feature = "transport_pcsc")]
    Pcsc(PcscTransport),
}

#[cfg(feature = "transport_tcp")]
impl From<TcpTransport> for GenericTransport {
    fn from(t: TcpTransport) -> Self {
        Self::Tcp(t)
    }
}

#[cfg(feature = "transport_pcsc")]
impl From<PcscTransport> for GenericTransport {
    fn from(t: PcscTransport) -> Self {
        Self::Pcsc(t)
    }
}

#[async_trait]
impl Exchange for GenericTransport {
    async fn exchange(&self, cmd: &CommandApdu) -> Result<(Vec<u8>, StatusWord), Error> {
        match self {
            #[cfg(feature = "transport_tcp")]
            Self::Tcp(t) => t.exchange(cmd).await,
            #[cfg(feature = "transport_pcsc")]
            Self::Pcsc(t) => t.exchange(cmd).await,
        }
    }
}

/// Generic connector selected from CLI / config options
#[derive(Clone, Debug)]
pub enum GenericConnector {
    #[cfg(feature = "transport_tcp")]
    Tcp(TcpConnector),
    #[cfg(feature = "transport_pcsc")]
    Pcsc(PcscConnector),
}

#[async_trait]
impl Connect for GenericConnector {
    type Transport = GenericTransport;

    async fn connect(&self, cancel: CancelToken) -> Result<GenericTransport, Error> {
        match self {
            #[cfg(feature = "transport_tcp")]
            Self::Tcp(c) => c.connect(cancel).await.map(GenericTransport::from),
            #[cfg(feature = "transport_pcsc")]
            Self::Pcsc(c) => c.connect(cancel).await.map(GenericTransport::from),
        }
    }
}
