//! Trade events decoded from the pipeline feed

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single executed trade reported by an exchange.
///
/// Immutable once decoded. Equality and hashing are structural over every
/// field, so two trades with identical fields compare equal even if they came
/// from different frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Trade {
    /// Event time in seconds since the Unix epoch (fractional)
    timestamp: OrderedFloat<f64>,

    /// Exchange that reported the trade
    exchange: String,

    /// Market (pair) the trade executed on, e.g. "btc-usdt"
    market: String,

    /// Exchange-assigned trade identifier
    #[serde(rename = "euid")]
    external_id: String,

    price: OrderedFloat<f64>,

    quantity: OrderedFloat<f64>,

    /// Taker side as reported by the feed ("buy" / "sell")
    direction: String,
}

impl Trade {
    pub fn new(
        timestamp: f64,
        exchange: impl Into<String>,
        market: impl Into<String>,
        external_id: impl Into<String>,
        price: f64,
        quantity: f64,
        direction: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: OrderedFloat(timestamp),
            exchange: exchange.into(),
            market: market.into(),
            external_id: external_id.into(),
            price: OrderedFloat(price),
            quantity: OrderedFloat(quantity),
            direction: direction.into(),
        }
    }

    /// Decode a trade from its JSON-encoded field set
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Identity key in the form `exchange:market:external_id`
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.exchange, self.market, self.external_id)
    }

    /// Render every field, for diagnostics
    pub fn describe(&self) -> String {
        format!(
            "Trade(id={}, timestamp={}, exchange={}, pair={}, euid={}, price={}, quantity={}, direction={})",
            self.key(),
            self.timestamp,
            self.exchange,
            self.market,
            self.external_id,
            self.price,
            self.quantity,
            self.direction
        )
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp.into_inner()
    }

    /// Event time as a UTC datetime, if the timestamp is representable
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        let ts = self.timestamp.into_inner();
        if !ts.is_finite() {
            return None;
        }
        let secs = ts.floor();
        let nanos = (((ts - secs) * 1e9).round() as u32).min(999_999_999);
        Utc.timestamp_opt(secs as i64, nanos).single()
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn price(&self) -> f64 {
        self.price.into_inner()
    }

    pub fn quantity(&self) -> f64 {
        self.quantity.into_inner()
    }

    pub fn direction(&self) -> &str {
        &self.direction
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trade(id={})", self.key())
    }
}
