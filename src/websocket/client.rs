//! WebSocket transport for the pipeline feed
//!
//! Handles connection setup with auth headers and frame reception.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderName, HeaderValue},
        protocol::Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use super::{Connector, FrameSink, FrameSource, Transport};
use crate::error::{PipelineError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens tokio-tungstenite WebSocket connections
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, endpoint: &str, headers: &[(String, String)]) -> Result<Transport> {
        let mut request = endpoint.into_client_request().map_err(|e| {
            PipelineError::ConnectError(format!("Invalid endpoint {}: {}", endpoint, e))
        })?;

        for (name, value) in headers {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                PipelineError::ConnectError(format!("Invalid header name {}: {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                PipelineError::ConnectError(format!("Invalid value for header {}: {}", name, e))
            })?;
            request.headers_mut().insert(header, value);
        }

        info!(endpoint = %endpoint, "Connecting to pipeline WebSocket");

        let (ws_stream, response) = connect_async(request).await.map_err(|e| {
            PipelineError::ConnectError(format!("Failed to connect: {}", e))
        })?;

        info!(status = ?response.status(), "WebSocket connected");

        let (sink, stream) = ws_stream.split();
        Ok(Transport {
            sink: Box::new(WsSink { sink }),
            source: Box::new(WsSource { stream }),
        })
    }
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| PipelineError::TransportError(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.sink
            .close()
            .await
            .map_err(|e| PipelineError::TransportError(e.to_string()))
    }
}

struct WsSource {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    debug!(len = text.len(), "Received text message");
                    return Some(Ok(text));
                }
                Some(Ok(Message::Binary(data))) => {
                    // Convert binary to text if needed
                    return Some(Ok(String::from_utf8_lossy(&data).to_string()));
                }
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite queues the pong itself
                    debug!("Received ping");
                }
                Some(Ok(Message::Pong(_))) => {
                    debug!("Received pong");
                }
                Some(Ok(Message::Close(frame))) => {
                    warn!(frame = ?frame, "Received close frame");
                    return None;
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    error!(error = %e, "WebSocket error");
                    return Some(Err(PipelineError::TransportError(e.to_string())));
                }
                None => {
                    debug!("WebSocket stream ended");
                    return None;
                }
            }
        }
    }
}
