//! Fenix Pipeline - streaming trade feed client
//!
//! This crate connects to the Fenix Pipeline WebSocket feed, manages
//! channel subscriptions, and delivers decoded trade events to a caller
//! supplied handler in arrival order.

pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod parser;
pub mod subscription;
pub mod trade;
pub mod websocket;

pub use config::Config;
pub use connection::{
    Connection, ConnectionState, MessageHandler, Subscriber, API_VERSION, DEFAULT_ENDPOINT,
};
pub use error::{PipelineError, Result};
pub use parser::{ControlRequest, FeedMessage};
pub use subscription::{Subscription, SubscriptionTarget};
pub use trade::Trade;
pub use websocket::{Connector, FrameSink, FrameSource, Transport, WsConnector};
