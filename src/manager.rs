//! Model registry, routing, and ensembling
//!
//! ## Table of Contents
//! - **ModelManager**: Registry + routing table + prediction entry points
//! - **BatchOutcome** / **BatchItemError**: Per-index batch reporting
//!
//! The registry and routing table are built once at startup and treated as
//! read-only afterwards. Ensemble prediction fans out one task per
//! candidate and settles all of them: individual failures are captured,
//! and the call only fails when every candidate failed.

use crate::builder::EngineConfig;
use crate::error::{GalvaniError, Result};
use crate::metrics::{GalvaniMetrics, Timer};
use crate::predictor::{BoxedPredictor, Predictor};
use crate::types::{self, ModelDescriptor, PredictionRequest, PredictionResponse, SystemType};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Failure report for one batch item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemError {
    /// Index of the failed request in the batch
    pub index: usize,
    /// Error description
    pub error: String,
    /// System type of the failed request
    pub system_type: SystemType,
}

/// Result of a batch prediction call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Unique batch identifier
    pub batch_id: String,
    /// Number of requests submitted
    pub total_requests: usize,
    /// Number of successful predictions
    pub successful: usize,
    /// Number of failed predictions
    pub failed: usize,
    /// Successful predictions, in request order
    pub results: Vec<PredictionResponse>,
    /// Per-index failures
    pub errors: Vec<BatchItemError>,
    /// Wall-clock processing time in milliseconds
    pub processing_time_ms: f64,
    /// When the batch completed
    pub timestamp: DateTime<Utc>,
}

/// Owns the model registry and routes requests to predictors
pub struct ModelManager {
    models: HashMap<String, BoxedPredictor>,
    routing: HashMap<SystemType, Vec<String>>,
    config: EngineConfig,
    metrics: Option<Arc<GalvaniMetrics>>,
}

impl ModelManager {
    /// Create an empty manager with the default routing table
    pub fn new(config: EngineConfig) -> Self {
        Self {
            models: HashMap::new(),
            routing: default_routing(),
            config,
            metrics: None,
        }
    }

    /// Record prediction outcomes on the given metrics registry
    pub fn with_metrics(mut self, metrics: Arc<GalvaniMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a model under its identifier
    pub fn register(&mut self, model: BoxedPredictor) {
        info!(model = model.model_id(), version = model.version(), "Registered model");
        self.models.insert(model.model_id().to_string(), model);
    }

    /// Number of registered models
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Descriptors for every registered model
    pub fn descriptors(&self) -> Vec<ModelDescriptor> {
        let mut descriptors: Vec<ModelDescriptor> = self
            .models
            .values()
            .map(|model| ModelDescriptor {
                model_id: model.model_id().to_string(),
                version: model.version().to_string(),
                model_kind: model.model_kind().to_string(),
                supported_systems: model.supported_systems(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        descriptors
    }

    /// First registered candidate for a system type
    fn model_for(&self, system: SystemType) -> Result<&BoxedPredictor> {
        let candidates = self
            .routing
            .get(&system)
            .map(Vec::as_slice)
            .unwrap_or_default();

        candidates
            .iter()
            .find_map(|id| self.models.get(id))
            .ok_or_else(|| GalvaniError::NoModelForSystem(system.to_string()))
    }

    /// All registered candidates for a system type, in routing order
    fn models_for(&self, system: SystemType) -> Vec<BoxedPredictor> {
        let candidates = self
            .routing
            .get(&system)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut models: Vec<BoxedPredictor> = candidates
            .iter()
            .filter_map(|id| self.models.get(id).cloned())
            .collect();
        if let Some(cap) = self.config.max_ensemble_members {
            models.truncate(cap);
        }
        models
    }

    /// Generate a prediction with the first eligible model
    pub async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
        request.validate()?;

        let timer = Timer::start();
        let model = self.model_for(request.system_type)?;
        let model_id = model.model_id().to_string();

        let result = model.predict(request).await;
        let elapsed = timer.stop();
        if let Some(metrics) = &self.metrics {
            metrics.record_prediction(&model_id, result.is_ok(), elapsed);
        }

        let mut response = result?;
        response.processing_time_ms = elapsed * 1000.0;
        info!(
            prediction_id = %response.prediction_id,
            model = %model_id,
            confidence = response.confidence_score,
            "Prediction completed"
        );
        Ok(response)
    }

    /// Generate an ensemble prediction across all eligible models
    ///
    /// Candidates run concurrently; individual failures are tolerated.
    /// Fails with [`GalvaniError::EnsembleExhausted`] only when every
    /// candidate failed.
    pub async fn ensemble_predict(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
        request.validate()?;

        let timer = Timer::start();
        let models = self.models_for(request.system_type);
        if models.is_empty() {
            return Err(GalvaniError::NoModelForSystem(
                request.system_type.to_string(),
            ));
        }

        let outcomes = join_all(models.iter().map(|model| model.predict(request))).await;

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        // join_all preserves candidate insertion order, so the first
        // success is deterministic regardless of completion order.
        for (model, outcome) in models.iter().zip(outcomes) {
            match outcome {
                Ok(response) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_ensemble_member(true);
                    }
                    successes.push(response);
                }
                Err(err) => {
                    warn!(model = model.model_id(), error = %err, "Ensemble member failed");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_ensemble_member(false);
                    }
                    failures.push(format!("{}: {}", model.model_id(), err));
                }
            }
        }

        if successes.is_empty() {
            return Err(GalvaniError::EnsembleExhausted(format!(
                "all {} candidates failed ({})",
                models.len(),
                failures.join("; ")
            )));
        }

        let mut response = aggregate(successes);
        response.processing_time_ms = timer.stop() * 1000.0;
        Ok(response)
    }

    /// Process a batch of requests with per-item isolation
    ///
    /// Each item runs under its own timeout; failures are reported at
    /// their index and never fail the batch itself. The batch is rejected
    /// only when it exceeds the configured size cap.
    pub async fn batch_predict(&self, requests: &[PredictionRequest]) -> Result<BatchOutcome> {
        if requests.len() > self.config.max_batch_size {
            return Err(GalvaniError::validation(format!(
                "batch size exceeds maximum of {} predictions",
                self.config.max_batch_size
            )));
        }

        let timer = Timer::start();
        let batch_id = types::batch_id();
        info!(batch_id = %batch_id, batch_size = requests.len(), "Processing batch");

        let outcomes = join_all(requests.iter().map(|request| async move {
            match tokio::time::timeout(self.config.prediction_timeout, self.predict(request)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(GalvaniError::simulation(format!(
                    "prediction timed out after {:?}",
                    self.config.prediction_timeout
                ))),
            }
        }))
        .await;

        let mut results = Vec::new();
        let mut errors = Vec::new();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            if let Some(metrics) = &self.metrics {
                metrics.record_batch_item(outcome.is_ok());
            }
            match outcome {
                Ok(response) => results.push(response),
                Err(err) => errors.push(BatchItemError {
                    index,
                    error: err.to_string(),
                    system_type: requests[index].system_type,
                }),
            }
        }

        Ok(BatchOutcome {
            batch_id,
            total_requests: requests.len(),
            successful: results.len(),
            failed: errors.len(),
            results,
            errors,
            processing_time_ms: timer.stop() * 1000.0,
            timestamp: Utc::now(),
        })
    }
}

/// Static routing table: system type → ordered candidate model identifiers
fn default_routing() -> HashMap<SystemType, Vec<String>> {
    let mut routing = HashMap::new();
    routing.insert(
        SystemType::Pem,
        vec!["amphlett-static".to_string(), "larminie-static".to_string()],
    );
    routing.insert(SystemType::Sofc, vec!["amphlett-static".to_string()]);
    routing.insert(SystemType::Pafc, vec!["amphlett-static".to_string()]);
    for system in [
        SystemType::Mfc,
        SystemType::Mec,
        SystemType::Mdc,
        SystemType::Mes,
        SystemType::Bes,
    ] {
        routing.insert(system, vec!["mfc-empirical".to_string()]);
    }
    routing
}

/// Average successful member results into one ensemble response
///
/// Numeric metric values and confidences are arithmetic means; template
/// fields (units, optimizations) come from the first member in candidate
/// order.
fn aggregate(predictions: Vec<PredictionResponse>) -> PredictionResponse {
    let n = predictions.len() as f64;
    let mean = |extract: &dyn Fn(&PredictionResponse) -> f64| {
        predictions.iter().map(extract).sum::<f64>() / n
    };

    let avg_power = mean(&|p| p.power_output.value);
    let avg_efficiency = mean(&|p| p.efficiency.value);
    let avg_confidence = mean(&|p| p.power_output.confidence);

    let voltages: Vec<f64> = predictions
        .iter()
        .filter_map(|p| p.voltage.as_ref().map(|m| m.value))
        .collect();
    let currents: Vec<f64> = predictions
        .iter()
        .filter_map(|p| p.current_density.as_ref().map(|m| m.value))
        .collect();

    let mut result = predictions
        .into_iter()
        .next()
        .expect("aggregate called with at least one prediction");

    result.power_output.value = avg_power;
    result.power_output.confidence = avg_confidence;
    result.efficiency.value = avg_efficiency;
    result.efficiency.confidence = avg_confidence;
    if let Some(voltage) = result.voltage.as_mut() {
        if !voltages.is_empty() {
            voltage.value = voltages.iter().sum::<f64>() / voltages.len() as f64;
            voltage.confidence = avg_confidence;
        }
    }
    if let Some(current) = result.current_density.as_mut() {
        if !currents.is_empty() {
            current.value = currents.iter().sum::<f64>() / currents.len() as f64;
            current.confidence = avg_confidence;
        }
    }
    result.model_type = "ensemble".to_string();
    result.confidence_score = avg_confidence;
    result.prediction_id = types::prediction_id();
    result.timestamp = Utc::now();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::empirical::EmpiricalPredictor;
    use crate::predictor::{ModelInputs, Predictor, RawPrediction};
    use crate::types::{MaterialSpec, OperatingConditions, PredictionMetric, SystemConfiguration};
    use async_trait::async_trait;

    struct FixedPredictor {
        id: &'static str,
        power: f64,
        confidence: f64,
        fail: bool,
    }

    impl FixedPredictor {
        fn new(id: &'static str, power: f64, confidence: f64) -> Self {
            Self {
                id,
                power,
                confidence,
                fail: false,
            }
        }

        fn failing(id: &'static str) -> Self {
            Self {
                id,
                power: 0.0,
                confidence: 0.0,
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Predictor for FixedPredictor {
        fn model_id(&self) -> &str {
            self.id
        }

        fn version(&self) -> &str {
            "0.0.1"
        }

        fn supported_systems(&self) -> Vec<SystemType> {
            vec![SystemType::Pem, SystemType::Sofc, SystemType::Pafc]
        }

        fn preprocess(&self, _request: &PredictionRequest) -> Result<ModelInputs> {
            Ok(ModelInputs::Features(Vec::new()))
        }

        async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
            if self.fail {
                return Err(GalvaniError::simulation("solver diverged"));
            }
            let raw = RawPrediction {
                power_density: self.power,
                voltage: 0.7,
                current_density: 0.0,
                efficiency_pct: 50.0,
            };
            Ok(self.postprocess(&raw, request))
        }

        fn postprocess(
            &self,
            raw: &RawPrediction,
            _request: &PredictionRequest,
        ) -> PredictionResponse {
            PredictionResponse {
                prediction_id: types::prediction_id(),
                power_output: PredictionMetric::new(raw.power_density, "mW/cm²", self.confidence),
                efficiency: PredictionMetric::new(raw.efficiency_pct, "%", self.confidence),
                current_density: None,
                voltage: Some(PredictionMetric::new(raw.voltage, "V", self.confidence)),
                optimizations: Vec::new(),
                model_version: "0.0.1".to_string(),
                model_type: self.id.to_string(),
                confidence_score: self.confidence,
                processing_time_ms: 0.0,
                timestamp: Utc::now(),
                material_insights: None,
            }
        }
    }

    fn mfc_request() -> PredictionRequest {
        PredictionRequest::new(
            SystemType::Mfc,
            SystemConfiguration::new(100.0, 2.0),
            OperatingConditions::new(298.15, 7.0).with_substrate(1.0),
            MaterialSpec::new("carbon_cloth", "carbon_cloth", 10.0),
        )
    }

    fn pem_request() -> PredictionRequest {
        PredictionRequest::new(
            SystemType::Pem,
            SystemConfiguration::new(500.0, 0.5),
            OperatingConditions::new(353.15, 7.0),
            MaterialSpec::new("platinum", "platinum", 50.0),
        )
    }

    fn manager_with(models: Vec<BoxedPredictor>) -> ModelManager {
        let mut manager = ModelManager::new(EngineConfig::default());
        for model in models {
            manager.register(model);
        }
        manager
    }

    #[tokio::test]
    async fn test_routes_microbial_request_to_empirical_model() {
        let manager = manager_with(vec![Arc::new(EmpiricalPredictor::new())]);
        let response = manager.predict(&mfc_request()).await.unwrap();
        assert_eq!(response.model_type, "mfc-empirical");
    }

    #[tokio::test]
    async fn test_missing_model_for_system_type() {
        let manager = manager_with(vec![Arc::new(EmpiricalPredictor::new())]);
        let err = manager.predict(&pem_request()).await.unwrap_err();
        assert!(matches!(err, GalvaniError::NoModelForSystem(_)));
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_routing() {
        let manager = manager_with(vec![Arc::new(EmpiricalPredictor::new())]);
        let mut request = mfc_request();
        request.conditions.ph = 15.0;
        let err = manager.predict(&request).await.unwrap_err();
        assert!(matches!(err, GalvaniError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ensemble_averages_member_values() {
        let manager = manager_with(vec![
            Arc::new(FixedPredictor::new("amphlett-static", 2.0, 0.8)),
            Arc::new(FixedPredictor::new("larminie-static", 4.0, 0.9)),
        ]);

        let response = manager.ensemble_predict(&pem_request()).await.unwrap();
        assert!((response.power_output.value - 3.0).abs() < 1e-9);
        assert!((response.confidence_score - 0.85).abs() < 1e-9);
        assert_eq!(response.model_type, "ensemble");
    }

    #[tokio::test]
    async fn test_ensemble_tolerates_partial_failure() {
        let manager = manager_with(vec![
            Arc::new(FixedPredictor::failing("amphlett-static")),
            Arc::new(FixedPredictor::new("larminie-static", 4.0, 0.9)),
        ]);

        let response = manager.ensemble_predict(&pem_request()).await.unwrap();
        assert!((response.power_output.value - 4.0).abs() < 1e-9);
        assert_eq!(response.model_type, "ensemble");
    }

    #[tokio::test]
    async fn test_ensemble_exhausted_when_all_fail() {
        let manager = manager_with(vec![
            Arc::new(FixedPredictor::failing("amphlett-static")),
            Arc::new(FixedPredictor::failing("larminie-static")),
        ]);

        let err = manager.ensemble_predict(&pem_request()).await.unwrap_err();
        assert!(matches!(err, GalvaniError::EnsembleExhausted(_)));
    }

    #[tokio::test]
    async fn test_ensemble_member_cap() {
        let mut config = EngineConfig::default();
        config.max_ensemble_members = Some(1);
        let mut manager = ModelManager::new(config);
        manager.register(Arc::new(FixedPredictor::new("amphlett-static", 2.0, 0.8)));
        manager.register(Arc::new(FixedPredictor::new("larminie-static", 4.0, 0.9)));

        let response = manager.ensemble_predict(&pem_request()).await.unwrap();
        // Only the first candidate contributes.
        assert!((response.power_output.value - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_batch_isolates_failures_per_index() {
        let manager = manager_with(vec![Arc::new(EmpiricalPredictor::new())]);
        let requests = vec![mfc_request(), pem_request(), mfc_request()];

        let outcome = manager.batch_predict(&requests).await.unwrap();
        assert_eq!(outcome.total_requests, 3);
        assert_eq!(outcome.successful, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.errors[0].index, 1);
        assert_eq!(outcome.errors[0].system_type, SystemType::Pem);
    }

    #[tokio::test]
    async fn test_batch_size_cap_enforced() {
        let mut config = EngineConfig::default();
        config.max_batch_size = 2;
        let mut manager = ModelManager::new(config);
        manager.register(Arc::new(EmpiricalPredictor::new()));

        let requests = vec![mfc_request(), mfc_request(), mfc_request()];
        let err = manager.batch_predict(&requests).await.unwrap_err();
        assert!(matches!(err, GalvaniError::Validation(_)));
    }

    #[tokio::test]
    async fn test_descriptors_sorted_by_model_id() {
        let manager = manager_with(vec![
            Arc::new(FixedPredictor::new("larminie-static", 4.0, 0.9)),
            Arc::new(FixedPredictor::new("amphlett-static", 2.0, 0.8)),
            Arc::new(EmpiricalPredictor::new()),
        ]);

        let descriptors = manager.descriptors();
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[0].model_id, "amphlett-static");
        assert_eq!(descriptors[2].model_id, "mfc-empirical");
    }
}
