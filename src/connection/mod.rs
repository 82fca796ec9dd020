//! Connection lifecycle for the pipeline feed
//!
//! A [`Connection`] moves through `Idle -> Open -> Streaming -> Closing -> Idle`.
//! `connect` opens the transport, `start` spawns the receive loop, and
//! `shutdown` sends the close request, closes the transport and joins the
//! loop. [`Connection::session`] wraps `start`/`shutdown` around a caller
//! body so teardown runs on every exit path.

mod receiver;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, Result};
use crate::metrics::metrics;
use crate::parser::{ControlRequest, FeedMessage};
use crate::subscription::SubscriptionTarget;
use crate::websocket::{Connector, FrameSink, FrameSource, WsConnector};

/// Production endpoint of the pipeline feed
pub const DEFAULT_ENDPOINT: &str = "wss://api.fenixblockchain.com/ws";

/// Protocol version sent with every connection
pub const API_VERSION: &str = "beta";

/// Receives every message the feed delivers.
///
/// Invoked once per inbound frame, strictly sequentially: the receive loop
/// awaits each call before reading the next frame. Returning an error stops
/// the loop and closes the connection.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: FeedMessage) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(FeedMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, message: FeedMessage) -> anyhow::Result<()> {
        (self)(message).await
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Open,
    Streaming,
    Closing,
}

/// State shared between the foreground path and the receive loop for one
/// connect..shutdown lifecycle
pub(crate) struct Shared {
    /// Write half, behind the send lock; taken on teardown
    sink: Mutex<Option<Box<dyn FrameSink>>>,
    connected: AtomicBool,
    cancel: CancellationToken,
}

impl Shared {
    fn detached() -> Self {
        Self {
            sink: Mutex::new(None),
            connected: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    fn open(sink: Box<dyn FrameSink>) -> Self {
        Self {
            sink: Mutex::new(Some(sink)),
            connected: AtomicBool::new(true),
            cancel: CancellationToken::new(),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn subscribe(&self, target: SubscriptionTarget, name: Option<&str>) -> Result<()> {
        debug!(kind = %target, name = ?name, "Subscribing");
        let channel = target.channel_name(name)?;
        self.send(ControlRequest::Subscribe { channel }).await
    }

    async fn unsubscribe(&self, target: SubscriptionTarget, name: Option<&str>) -> Result<()> {
        debug!(kind = %target, name = ?name, "Unsubscribing");
        let channel = target.channel_name(name)?;
        self.send(ControlRequest::Unsubscribe { channel }).await
    }

    async fn send(&self, request: ControlRequest) -> Result<()> {
        let text = request.to_json()?;

        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(PipelineError::NotConnected)?;

        debug!(message = %text, "Sending message");
        if let Err(e) = sink.send(text).await {
            warn!(error = %e, request = request.name(), "Failed to send request");
            return Err(e);
        }
        metrics()
            .requests_sent
            .with_label_values(&[request.name()])
            .inc();
        Ok(())
    }

    /// Send the close request and close the transport. Safe to call any
    /// number of times; only the first call touches the transport.
    async fn teardown(&self) {
        let sink = self.sink.lock().await.take();
        self.connected.store(false, Ordering::SeqCst);

        let Some(mut sink) = sink else {
            return;
        };

        match ControlRequest::Close.to_json() {
            Ok(text) => {
                debug!(message = %text, "Sending message");
                if let Err(e) = sink.send(text).await {
                    debug!(error = %e, "Close request not delivered");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode close request"),
        }

        if let Err(e) = sink.close().await {
            debug!(error = %e, "Transport close failed");
        }

        info!("Connection closed");
    }
}

/// Cloneable handle for sending requests on the current lifecycle
#[derive(Clone)]
pub struct Subscriber {
    shared: Arc<Shared>,
}

impl Subscriber {
    /// Request trades for a channel. Fire-and-forget: any acknowledgement
    /// arrives later through the message handler.
    pub async fn subscribe(&self, target: SubscriptionTarget, name: Option<&str>) -> Result<()> {
        self.shared.subscribe(target, name).await
    }

    pub async fn unsubscribe(&self, target: SubscriptionTarget, name: Option<&str>) -> Result<()> {
        self.shared.unsubscribe(target, name).await
    }

    /// False once the transport has closed, from either side
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }
}

/// Client connection to the pipeline feed
pub struct Connection {
    endpoint: String,
    api_key: String,
    connector: Arc<dyn Connector>,
    runtime: Option<Handle>,
    state: ConnectionState,
    shared: Arc<Shared>,
    source: Option<Box<dyn FrameSource>>,
    handler: Option<Box<dyn MessageHandler>>,
    receiver: Option<JoinHandle<()>>,
}

impl Connection {
    /// Create an idle connection authenticated with `api_key`
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            connector: Arc::new(WsConnector),
            runtime: None,
            state: ConnectionState::Idle,
            shared: Arc::new(Shared::detached()),
            source: None,
            handler: None,
            receiver: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Use a different transport
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Spawn the receive loop on `runtime` instead of the current runtime
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Change the endpoint; only allowed while idle
    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) -> Result<()> {
        if self.state != ConnectionState::Idle {
            return Err(PipelineError::AlreadyConnected);
        }
        self.endpoint = endpoint.into();
        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current state. A streaming connection whose transport has closed
    /// reports `Closing` until `shutdown` joins the receive loop.
    pub fn state(&self) -> ConnectionState {
        match self.state {
            ConnectionState::Streaming if !self.shared.is_connected() => ConnectionState::Closing,
            state => state,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Open the transport and register the handler
    pub async fn connect(&mut self, handler: impl MessageHandler) -> Result<()> {
        if self.state != ConnectionState::Idle {
            return Err(PipelineError::AlreadyConnected);
        }

        debug!(endpoint = %self.endpoint, "Connecting");
        let headers = vec![
            ("authorization".to_string(), format!("bearer {}", self.api_key)),
            ("x-api-version".to_string(), API_VERSION.to_string()),
        ];

        let transport = self
            .connector
            .open(&self.endpoint, &headers)
            .await
            .map_err(|e| match e {
                PipelineError::ConnectError(_) => e,
                other => PipelineError::ConnectError(other.to_string()),
            })?;

        self.shared = Arc::new(Shared::open(transport.sink));
        self.source = Some(transport.source);
        self.handler = Some(Box::new(handler));
        self.state = ConnectionState::Open;

        info!(endpoint = %self.endpoint, "Connected to pipeline feed");
        Ok(())
    }

    /// Spawn the receive loop
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Open => {}
            ConnectionState::Streaming => return Err(PipelineError::AlreadyStreaming),
            ConnectionState::Idle | ConnectionState::Closing => {
                return Err(PipelineError::NotConnected)
            }
        }

        let runtime = match &self.runtime {
            Some(runtime) => runtime.clone(),
            None => Handle::try_current().map_err(|_| PipelineError::RuntimeUnavailable)?,
        };
        let source = self.source.take().ok_or(PipelineError::NotConnected)?;
        let handler = self.handler.take().ok_or(PipelineError::NotConnected)?;

        debug!("Starting receive loop");
        self.receiver = Some(runtime.spawn(receiver::run(source, handler, self.shared.clone())));
        self.state = ConnectionState::Streaming;
        Ok(())
    }

    /// Handle for sending requests on the current lifecycle
    pub fn subscriber(&self) -> Subscriber {
        Subscriber {
            shared: self.shared.clone(),
        }
    }

    pub async fn subscribe(&self, target: SubscriptionTarget, name: Option<&str>) -> Result<()> {
        self.shared.subscribe(target, name).await
    }

    pub async fn unsubscribe(&self, target: SubscriptionTarget, name: Option<&str>) -> Result<()> {
        self.shared.unsubscribe(target, name).await
    }

    /// Close the connection and wait for the receive loop to finish.
    ///
    /// Sends the close request, closes the transport, drops the handler and
    /// joins the loop. Never fails and may be called repeatedly.
    pub async fn shutdown(&mut self) {
        if self.state == ConnectionState::Idle {
            debug!("Connection already idle");
            return;
        }

        debug!("Shutting down connection");
        self.state = ConnectionState::Closing;
        self.shared.teardown().await;
        self.shared.cancel.cancel();
        self.handler = None;
        self.source = None;

        if let Some(task) = self.receiver.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Receive loop task failed");
            }
        }
        self.state = ConnectionState::Idle;
    }

    /// Run `body` with the receive loop active, then shut down.
    ///
    /// Shutdown runs whether `body` returns `Ok`, returns `Err` or panics; a
    /// panic resumes once teardown has finished.
    pub async fn session<F, Fut, T, E>(&mut self, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Subscriber) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<PipelineError>,
    {
        if let Err(e) = self.start() {
            self.shutdown().await;
            return Err(e.into());
        }

        debug!("Entering session");
        let outcome = AssertUnwindSafe(body(self.subscriber()))
            .catch_unwind()
            .await;
        debug!("Exiting session");
        self.shutdown().await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.receiver.take() {
            warn!("Connection dropped while streaming, aborting receive loop");
            self.shared.cancel.cancel();
            task.abort();
        }
    }
}
