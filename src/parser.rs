//! Parser module for pipeline WebSocket messages
//!
//! Encodes outbound control requests and classifies inbound frames into
//! decoded trades or opaque passthrough messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::trade::Trade;

/// Frame type carrying trade events
pub const DATA_TYPE: &str = "data";

/// Control request sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "lowercase")]
pub enum ControlRequest {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Close,
}

impl ControlRequest {
    /// Request name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ControlRequest::Subscribe { .. } => "subscribe",
            ControlRequest::Unsubscribe { .. } => "unsubscribe",
            ControlRequest::Close => "close",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PipelineError::TransportError(format!("Failed to encode request: {}", e)))
    }
}

/// Message delivered to the handler
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// A decoded `data` frame
    Trade(Trade),
    /// Any other frame (subscription acknowledgements, errors, ...), unchanged
    Other(Value),
}

impl FeedMessage {
    /// Parse a raw text frame
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;

        let frame_type = value
            .get("type")
            .ok_or_else(|| PipelineError::DecodeError("frame has no 'type' field".to_string()))?;

        if frame_type.as_str() == Some(DATA_TYPE) {
            let payload = value
                .get("message")
                .and_then(|m| m.get("data"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    PipelineError::DecodeError("data frame has no 'message.data' string".to_string())
                })?;
            return Ok(FeedMessage::Trade(Trade::from_json(payload)?));
        }

        Ok(FeedMessage::Other(value))
    }

    /// The `type` discriminator of a passthrough message
    pub fn message_type(&self) -> Option<&str> {
        match self {
            FeedMessage::Trade(_) => Some(DATA_TYPE),
            FeedMessage::Other(value) => value.get("type").and_then(Value::as_str),
        }
    }

    pub fn as_trade(&self) -> Option<&Trade> {
        match self {
            FeedMessage::Trade(trade) => Some(trade),
            FeedMessage::Other(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data_frame(payload: &str) -> String {
        json!({ "type": "data", "message": { "data": payload } }).to_string()
    }

    #[test]
    fn test_encode_requests() {
        let subscribe = ControlRequest::Subscribe {
            channel: "trades/market/btc-usdt".to_string(),
        };
        let value: Value = serde_json::from_str(&subscribe.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "request": "subscribe", "channel": "trades/market/btc-usdt" })
        );

        let unsubscribe = ControlRequest::Unsubscribe {
            channel: "trades/all".to_string(),
        };
        let value: Value = serde_json::from_str(&unsubscribe.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "request": "unsubscribe", "channel": "trades/all" })
        );

        assert_eq!(
            ControlRequest::Close.to_json().unwrap(),
            r#"{"request":"close"}"#
        );
    }

    #[test]
    fn test_parse_data_frame() {
        let raw = data_frame(
            r#"{"timestamp":1.0,"exchange":"x","market":"btc-usdt","euid":"e1","price":100.5,"quantity":2.0,"direction":"buy"}"#,
        );

        let msg = FeedMessage::parse(&raw).unwrap();
        if let FeedMessage::Trade(trade) = msg {
            assert_eq!(trade.key(), "x:btc-usdt:e1");
            assert_eq!(trade.price(), 100.5);
        } else {
            panic!("Expected Trade");
        }
    }

    #[test]
    fn test_parse_passthrough_frame() {
        let raw = r#"{"type":"subscribed","channel":"trades/market/btc-usdt"}"#;

        let msg = FeedMessage::parse(raw).unwrap();
        assert_eq!(msg.message_type(), Some("subscribed"));
        assert!(msg.as_trade().is_none());
        assert_eq!(
            msg,
            FeedMessage::Other(json!({ "type": "subscribed", "channel": "trades/market/btc-usdt" }))
        );
    }

    #[test]
    fn test_malformed_data_payload_is_error() {
        let raw = data_frame(r#"{"timestamp":1.0,"exchange":"x"}"#);
        assert!(matches!(
            FeedMessage::parse(&raw),
            Err(PipelineError::DecodeError(_))
        ));

        let raw = json!({ "type": "data", "message": {} }).to_string();
        assert!(matches!(
            FeedMessage::parse(&raw),
            Err(PipelineError::DecodeError(_))
        ));
    }

    #[test]
    fn test_non_string_type_passes_through() {
        let msg = FeedMessage::parse(r#"{"type":5,"x":1}"#).unwrap();
        assert_eq!(msg, FeedMessage::Other(json!({ "type": 5, "x": 1 })));
        assert_eq!(msg.message_type(), None);

        let msg = FeedMessage::parse(r#"{"type":null}"#).unwrap();
        assert_eq!(msg, FeedMessage::Other(json!({ "type": null })));
    }

    #[test]
    fn test_missing_type_is_error() {
        assert!(FeedMessage::parse(r#"{"channel":"x"}"#).is_err());
        assert!(FeedMessage::parse("not json").is_err());
    }
}
