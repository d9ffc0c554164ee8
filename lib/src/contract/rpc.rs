// Copyright (c) 2024-2025 The Tapmint Project

//! JSON-RPC transport for the Soroban RPC endpoint
//!
//! [RpcTransport] is the seam the client calls through; the HTTP
//! implementation posts JSON-RPC 2.0 requests with `reqwest`. Tests script
//! the trait directly.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use log::trace;
use serde_json::{json, Value};

use crate::Error;

/// One JSON-RPC call against the node
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, Error>;
}

/// HTTP JSON-RPC transport
pub struct HttpRpc {
    client: reqwest::Client,
    url: reqwest::Url,
    next_id: AtomicU64,
}

impl HttpRpc {
    /// Create a transport for the provided endpoint URL
    pub fn new(url: &str) -> Result<Self, Error> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| Error::Validation(format!("rpc url: {e}")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            url,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl RpcTransport for HttpRpc {
    async fn call(&self, method: &str, params: Value) -> Result<Value, Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        trace!("rpc > {method} {params}");

        let resp = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("rpc send: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("rpc http status {status}")));
        }

        let reply: Value = resp
            .json()
            .await
            .map_err(|e| Error::Transport(format!("rpc decode: {e}")))?;

        trace!("rpc < {reply}");

        if let Some(err) = reply.get("error") {
            return Err(Error::Transport(format!("rpc error: {err}")));
        }

        reply
            .get("result")
            .cloned()
            .ok_or_else(|| Error::Transport("rpc reply missing result".into()))
    }
}
