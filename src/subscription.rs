//! Subscription targets and channel naming
//!
//! A subscription request is a (target, name) pair. `ByMarket` and
//! `ByExchange` require a name, `All` forbids one.

use std::fmt;
use std::str::FromStr;

use crate::error::{PipelineError, Result};

/// Kind of trade channel a client can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionTarget {
    /// Trades for one market across exchanges
    ByMarket,
    /// Trades for every market on one exchange
    ByExchange,
    /// Every trade on the feed
    All,
}

impl SubscriptionTarget {
    /// Wire prefix of the channel
    pub fn prefix(&self) -> &'static str {
        match self {
            SubscriptionTarget::ByMarket => "trades/market",
            SubscriptionTarget::ByExchange => "trades/exchange",
            SubscriptionTarget::All => "trades/all",
        }
    }

    /// Build the wire channel identifier for this target
    pub fn channel_name(&self, name: Option<&str>) -> Result<String> {
        let name = name.filter(|n| !n.is_empty());
        match (self, name) {
            (SubscriptionTarget::All, Some(name)) => Err(PipelineError::InvalidArgument(format!(
                "name '{}' invalid when using ALL qualifier",
                name
            ))),
            (SubscriptionTarget::All, None) => Ok(self.prefix().to_string()),
            (_, None) => Err(PipelineError::InvalidArgument(format!(
                "name required for {}",
                self
            ))),
            (_, Some(name)) => Ok(format!("{}/{}", self.prefix(), name)),
        }
    }
}

impl fmt::Display for SubscriptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionTarget::ByMarket => "TRADES_BY_MARKET",
            SubscriptionTarget::ByExchange => "TRADES_BY_EXCHANGE",
            SubscriptionTarget::All => "ALL_TRADES",
        };
        f.write_str(name)
    }
}

impl FromStr for SubscriptionTarget {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "TRADES_BY_MARKET" => Ok(SubscriptionTarget::ByMarket),
            "TRADES_BY_EXCHANGE" => Ok(SubscriptionTarget::ByExchange),
            "ALL_TRADES" => Ok(SubscriptionTarget::All),
            other => Err(PipelineError::InvalidArgument(format!(
                "unknown subscription type: {}",
                other
            ))),
        }
    }
}

/// A validated (target, name) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub target: SubscriptionTarget,
    pub name: Option<String>,
}

impl Subscription {
    pub fn new(target: SubscriptionTarget, name: Option<&str>) -> Result<Self> {
        target.channel_name(name)?;
        Ok(Self {
            target,
            name: name.filter(|n| !n.is_empty()).map(str::to_string),
        })
    }

    pub fn channel(&self) -> Result<String> {
        self.target.channel_name(self.name.as_deref())
    }

    /// Parse a `/`-separated list such as `trades_by_market:btc-usdt/all_trades:`
    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        raw.split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for Subscription {
    type Err = PipelineError;

    /// Parse `kind:name`, with an empty name for `all_trades:`
    fn from_str(s: &str) -> Result<Self> {
        let (kind, name) = s.split_once(':').unwrap_or((s, ""));
        let target: SubscriptionTarget = kind.parse()?;
        Subscription::new(target, Some(name.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_channels() {
        assert_eq!(
            SubscriptionTarget::ByMarket
                .channel_name(Some("btc-usdt"))
                .unwrap(),
            "trades/market/btc-usdt"
        );
        assert_eq!(
            SubscriptionTarget::ByExchange
                .channel_name(Some("binance"))
                .unwrap(),
            "trades/exchange/binance"
        );
    }

    #[test]
    fn test_all_channel() {
        assert_eq!(
            SubscriptionTarget::All.channel_name(None).unwrap(),
            "trades/all"
        );
        assert_eq!(
            SubscriptionTarget::All.channel_name(Some("")).unwrap(),
            "trades/all"
        );
    }

    #[test]
    fn test_all_rejects_name() {
        assert!(matches!(
            SubscriptionTarget::All.channel_name(Some("btc-usdt")),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_named_target_requires_name() {
        assert!(matches!(
            SubscriptionTarget::ByMarket.channel_name(None),
            Err(PipelineError::InvalidArgument(_))
        ));
        assert!(matches!(
            SubscriptionTarget::ByExchange.channel_name(Some("")),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(
            "trades_by_market".parse::<SubscriptionTarget>().unwrap(),
            SubscriptionTarget::ByMarket
        );
        assert_eq!(
            "ALL_TRADES".parse::<SubscriptionTarget>().unwrap(),
            SubscriptionTarget::All
        );
        assert!("trades".parse::<SubscriptionTarget>().is_err());
    }

    #[test]
    fn test_parse_subscription_list() {
        let subs =
            Subscription::parse_list("trades_by_market:btc-usdt/all_trades:/trades_by_exchange:x")
                .unwrap();
        assert_eq!(subs.len(), 3);
        assert_eq!(subs[0].channel().unwrap(), "trades/market/btc-usdt");
        assert_eq!(subs[1].target, SubscriptionTarget::All);
        assert_eq!(subs[1].name, None);
        assert_eq!(subs[2].channel().unwrap(), "trades/exchange/x");
    }

    #[test]
    fn test_parse_subscription_invalid() {
        assert!("trades_by_market:".parse::<Subscription>().is_err());
        assert!("all_trades:btc-usdt".parse::<Subscription>().is_err());
    }
}
