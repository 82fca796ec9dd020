//! Feed metrics
//!
//! Counters are registered with the default prometheus registry on first use.

use std::sync::OnceLock;

use prometheus::{IntCounter, IntCounterVec, Opts};
use tracing::warn;

/// Counters for a pipeline client process
pub struct FeedMetrics {
    /// Text frames pulled off the transport
    pub frames_received: IntCounter,
    /// Data frames decoded into trades
    pub trades_decoded: IntCounter,
    /// Control requests sent, labelled by request name
    pub requests_sent: IntCounterVec,
    /// Connection teardowns triggered by the receive loop
    pub receive_failures: IntCounter,
}

pub fn metrics() -> &'static FeedMetrics {
    static METRICS: OnceLock<FeedMetrics> = OnceLock::new();
    METRICS.get_or_init(FeedMetrics::register)
}

impl FeedMetrics {
    fn register() -> Self {
        let frames_received = IntCounter::new(
            "pipeline_frames_received_total",
            "Frames received from the pipeline feed",
        )
        .expect("valid metric definition");
        let trades_decoded = IntCounter::new(
            "pipeline_trades_decoded_total",
            "Trade events decoded from data frames",
        )
        .expect("valid metric definition");
        let requests_sent = IntCounterVec::new(
            Opts::new(
                "pipeline_requests_sent_total",
                "Control requests sent to the pipeline feed",
            ),
            &["request"],
        )
        .expect("valid metric definition");
        let receive_failures = IntCounter::new(
            "pipeline_receive_failures_total",
            "Receive loops that ended with an error",
        )
        .expect("valid metric definition");

        let registry = prometheus::default_registry();
        for collector in [
            Box::new(frames_received.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(trades_decoded.clone()),
            Box::new(requests_sent.clone()),
            Box::new(receive_failures.clone()),
        ] {
            if let Err(e) = registry.register(collector) {
                warn!(error = %e, "Failed to register metric");
            }
        }

        Self {
            frames_received,
            trades_decoded,
            requests_sent,
            receive_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_registered_once() {
        let first = metrics() as *const FeedMetrics;
        let second = metrics() as *const FeedMetrics;
        assert_eq!(first, second);

        metrics().requests_sent.with_label_values(&["subscribe"]).inc();
        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"pipeline_requests_sent_total".to_string()));
    }
}
