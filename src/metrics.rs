//! Prometheus metrics for the filtering engine
//!
//! Each `QueryEngine` owns its own `prometheus::Registry`, so several engines
//! in one process never collide on metric names and tests stay isolated.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::error::{Error, Result};
use crate::query::strategy::Tier;

/// Engine metric handles
pub struct EngineMetrics {
    registry: Registry,

    /// Queries by primary tier and outcome (hit, miss, rejected)
    pub queries_total: IntCounterVec,

    /// Orchestrated query latency
    pub query_duration: Histogram,

    /// Cache lookups by result (hit, miss)
    pub cache_requests: IntCounterVec,

    /// Registry builds performed
    pub registry_builds: IntCounter,

    /// Cards in the current registry
    pub indexed_cards: IntGauge,
}

impl EngineMetrics {
    /// Create and register all metrics
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let queries_total = IntCounterVec::new(
            Opts::new("cardsift_queries_total", "Total queries executed"),
            &["tier", "outcome"],
        )?;
        let query_duration = Histogram::with_opts(
            HistogramOpts::new(
                "cardsift_query_duration_seconds",
                "Query latency in seconds",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.01, 0.1, 1.0]),
        )?;
        let cache_requests = IntCounterVec::new(
            Opts::new("cardsift_cache_requests_total", "Result cache lookups"),
            &["result"],
        )?;
        let registry_builds = IntCounter::new(
            "cardsift_registry_builds_total",
            "Card registry builds performed",
        )?;
        let indexed_cards = IntGauge::new("cardsift_indexed_cards", "Cards in the current registry")?;

        registry.register(Box::new(queries_total.clone()))?;
        registry.register(Box::new(query_duration.clone()))?;
        registry.register(Box::new(cache_requests.clone()))?;
        registry.register(Box::new(registry_builds.clone()))?;
        registry.register(Box::new(indexed_cards.clone()))?;

        Ok(Self {
            registry,
            queries_total,
            query_duration,
            cache_requests,
            registry_builds,
            indexed_cards,
        })
    }

    /// Record one finished query
    pub fn record_query(&self, tier: Option<Tier>, cache_hit: bool, seconds: f64) {
        let tier = tier.map(Tier::as_str).unwrap_or("none");
        let outcome = if cache_hit { "hit" } else { "miss" };
        self.queries_total.with_label_values(&[tier, outcome]).inc();
        self.cache_requests.with_label_values(&[outcome]).inc();
        self.query_duration.observe(seconds);
    }

    /// Record a query rejected before evaluation
    pub fn record_rejected(&self) {
        self.queries_total
            .with_label_values(&["none", "rejected"])
            .inc();
    }

    /// Record a registry build
    pub fn record_build(&self, cards: usize) {
        self.registry_builds.inc();
        self.indexed_cards.set(cards as i64);
    }

    /// Render all metrics in the Prometheus text format
    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_text() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.record_query(Some(Tier::Bitmap), false, 0.002);
        metrics.record_query(Some(Tier::Bitmap), true, 0.0001);
        metrics.record_build(42);

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("cardsift_queries_total{outcome=\"miss\",tier=\"bitmap\"} 1"));
        assert!(text.contains("cardsift_cache_requests_total{result=\"hit\"} 1"));
        assert!(text.contains("cardsift_indexed_cards 42"));
        assert!(text.contains("cardsift_registry_builds_total 1"));
    }

    #[test]
    fn test_independent_registries() {
        let a = EngineMetrics::new().unwrap();
        let b = EngineMetrics::new().unwrap();
        a.record_rejected();
        assert_eq!(
            a.queries_total.with_label_values(&["none", "rejected"]).get(),
            1
        );
        assert_eq!(
            b.queries_total.with_label_values(&["none", "rejected"]).get(),
            0
        );
    }
}
