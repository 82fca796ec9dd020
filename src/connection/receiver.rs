//! Background receive loop
//!
//! Pulls frames off the transport, decodes them and hands each one to the
//! message handler, strictly one at a time and in arrival order.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::{MessageHandler, Shared};
use crate::error::{PipelineError, Result};
use crate::metrics::metrics;
use crate::parser::FeedMessage;
use crate::websocket::FrameSource;

/// Run the loop until the transport closes, a frame fails to decode, the
/// handler fails or panics, or the lifecycle is cancelled. Tears the
/// connection down before returning; errors are logged, never propagated.
pub(crate) async fn run(
    mut source: Box<dyn FrameSource>,
    handler: Box<dyn MessageHandler>,
    shared: Arc<Shared>,
) {
    match receive(source.as_mut(), handler.as_ref(), &shared.cancel).await {
        Ok(()) => debug!("Receive loop cancelled"),
        Err(PipelineError::TransportClosed) => info!("Transport closed, stopping receive loop"),
        Err(e) => {
            metrics().receive_failures.inc();
            error!(error = %e, "Receive loop failed, closing connection");
        }
    }

    shared.teardown().await;
}

async fn receive(
    source: &mut dyn FrameSource,
    handler: &dyn MessageHandler,
    cancel: &CancellationToken,
) -> Result<()> {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            frame = source.next_frame() => frame,
        };

        let raw = match frame {
            Some(Ok(raw)) => raw,
            Some(Err(e)) => return Err(e),
            None => return Err(PipelineError::TransportClosed),
        };
        metrics().frames_received.inc();

        let message = FeedMessage::parse(&raw)?;
        if let Some(trade) = message.as_trade() {
            metrics().trades_decoded.inc();
            trace!(trade = %trade, "Trade received");
        } else {
            trace!(kind = ?message.message_type(), "Control message received");
        }

        match AssertUnwindSafe(handler.handle(message)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(PipelineError::HandlerError(format!("{:#}", e))),
            Err(panic) => {
                return Err(PipelineError::HandlerError(format!(
                    "handler panicked: {}",
                    panic_message(panic.as_ref())
                )))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}
