//! Transport layer for the pipeline feed
//!
//! The connection only needs a reliable ordered text transport that can be
//! opened, written to, read from and closed. Writing and reading are split
//! into separate halves so the receive loop can read while the caller sends.

mod client;
#[cfg(test)]
pub(crate) mod memory;

pub use client::WsConnector;

use async_trait::async_trait;

use crate::error::Result;

/// Write half of an open transport
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame
    async fn send(&mut self, text: String) -> Result<()>;

    /// Close the transport from the local side
    async fn close(&mut self) -> Result<()>;
}

/// Read half of an open transport
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame, or `None` once the transport has closed
    async fn next_frame(&mut self) -> Option<Result<String>>;
}

/// Both halves of an open transport
pub struct Transport {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Opens transports to an endpoint
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a transport, attaching `headers` as connection metadata
    async fn open(&self, endpoint: &str, headers: &[(String, String)]) -> Result<Transport>;
}
