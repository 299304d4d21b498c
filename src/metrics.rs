//! Metrics and monitoring for Galvani
//!
//! ## Table of Contents
//! - **GalvaniMetrics**: Prometheus metrics registry
//! - **Timer**: Helper for measuring operation duration
//!
//! The registry covers predictions (by model and status), prediction
//! latency, ensemble member outcomes, cache hits/misses, and batch item
//! outcomes. Serving the registry over HTTP is the embedding service's
//! concern.

use crate::error::{GalvaniError, Result};
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};

/// Core metrics for Galvani
pub struct GalvaniMetrics {
    registry: Registry,

    /// Predictions by model and status
    pub predictions_total: CounterVec,
    /// Prediction latency by model
    pub prediction_latency: HistogramVec,
    /// Ensemble member outcomes
    pub ensemble_members: CounterVec,
    /// Property cache hits/misses
    pub cache_events: CounterVec,
    /// Batch item outcomes
    pub batch_items: CounterVec,
}

impl GalvaniMetrics {
    /// Create a new metrics instance
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let predictions_total = CounterVec::new(
            Opts::new("galvani_predictions_total", "Total predictions"),
            &["model", "status"],
        )?;
        let prediction_latency = HistogramVec::new(
            HistogramOpts::new("galvani_prediction_latency_seconds", "Prediction latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["model"],
        )?;
        let ensemble_members = CounterVec::new(
            Opts::new(
                "galvani_ensemble_members_total",
                "Ensemble member outcomes",
            ),
            &["status"],
        )?;
        let cache_events = CounterVec::new(
            Opts::new("galvani_cache_events_total", "Property cache events"),
            &["result"],
        )?;
        let batch_items = CounterVec::new(
            Opts::new("galvani_batch_items_total", "Batch item outcomes"),
            &["status"],
        )?;

        registry.register(Box::new(predictions_total.clone()))?;
        registry.register(Box::new(prediction_latency.clone()))?;
        registry.register(Box::new(ensemble_members.clone()))?;
        registry.register(Box::new(cache_events.clone()))?;
        registry.register(Box::new(batch_items.clone()))?;

        Ok(Self {
            registry,
            predictions_total,
            prediction_latency,
            ensemble_members,
            cache_events,
            batch_items,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a prediction outcome
    pub fn record_prediction(&self, model: &str, success: bool, latency_secs: f64) {
        let status = if success { "success" } else { "failed" };
        self.predictions_total
            .with_label_values(&[model, status])
            .inc();
        self.prediction_latency
            .with_label_values(&[model])
            .observe(latency_secs);
    }

    /// Record an ensemble member outcome
    pub fn record_ensemble_member(&self, success: bool) {
        let status = if success { "success" } else { "failed" };
        self.ensemble_members.with_label_values(&[status]).inc();
    }

    /// Record a property cache hit or miss
    pub fn record_cache(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_events.with_label_values(&[result]).inc();
    }

    /// Record a batch item outcome
    pub fn record_batch_item(&self, success: bool) {
        let status = if success { "success" } else { "failed" };
        self.batch_items.with_label_values(&[status]).inc();
    }

    /// Gather all metrics as Prometheus text format
    pub fn gather_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| GalvaniError::metrics(format!("encode error: {}", e)))?;
        String::from_utf8(buffer).map_err(|e| GalvaniError::metrics(format!("utf8 error: {}", e)))
    }
}

/// Timer for measuring operation duration
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Get elapsed time in seconds
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Stop and return elapsed seconds
    pub fn stop(self) -> f64 {
        self.elapsed_secs()
    }
}
