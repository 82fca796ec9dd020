//! In-memory transport for tests

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{FrameSink, FrameSource, Transport};
use crate::error::{PipelineError, Result};

/// Remote end of an in-memory transport
pub(crate) struct Remote {
    /// Frames to deliver to the client; dropping it closes the transport
    pub inbound: Option<mpsc::UnboundedSender<Result<String>>>,
    /// Frames the client sent
    pub outbound: mpsc::UnboundedReceiver<String>,
    /// Fires when the client closes its sink
    pub closed: mpsc::UnboundedReceiver<()>,
}

impl Remote {
    pub fn push(&self, frame: impl Into<String>) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.send(Ok(frame.into()));
        }
    }

    pub fn fail(&self, err: PipelineError) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.send(Err(err));
        }
    }

    /// Close the transport from the remote side
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    pub fn sent(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

struct MemorySink {
    outbound: mpsc::UnboundedSender<String>,
    closed: mpsc::UnboundedSender<()>,
    open: bool,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, text: String) -> Result<()> {
        if !self.open {
            return Err(PipelineError::TransportError("sink closed".to_string()));
        }
        self.outbound
            .send(text)
            .map_err(|_| PipelineError::TransportError("remote gone".to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        let _ = self.closed.send(());
        Ok(())
    }
}

struct MemorySource {
    inbound: mpsc::UnboundedReceiver<Result<String>>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        self.inbound.recv().await
    }
}

pub(crate) fn pair() -> (Transport, Remote) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();

    let transport = Transport {
        sink: Box::new(MemorySink {
            outbound: outbound_tx,
            closed: closed_tx,
            open: true,
        }),
        source: Box::new(MemorySource {
            inbound: inbound_rx,
        }),
    };
    let remote = Remote {
        inbound: Some(inbound_tx),
        outbound: outbound_rx,
        closed: closed_rx,
    };
    (transport, remote)
}
