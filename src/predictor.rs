//! Predictor capability contract
//!
//! ## Table of Contents
//! - **Predictor**: Trait every model variant implements
//! - **ModelInputs**: Model-specific parameter space from preprocessing
//! - **RawPrediction**: Intermediate numbers before postprocessing
//!
//! Every model follows the same shape: `preprocess` turns the unified
//! request into the model's own parameter space, `predict` computes raw
//! output and postprocesses it into the unified metric format, and the
//! default `confidence`/`optimizations` hooks can be overridden per model.

use crate::error::Result;
use crate::solver::SolverParams;
use crate::types::{OptimizationRecommendation, PredictionRequest, PredictionResponse, SystemType};
use async_trait::async_trait;
use std::sync::Arc;

/// Model-specific parameter space produced by preprocessing
#[derive(Debug, Clone)]
pub enum ModelInputs {
    /// Normalized feature vector for empirical correlations
    Features(Vec<f64>),
    /// Parameter set for a polarization solver
    Solver(SolverParams),
}

/// Intermediate prediction values before postprocessing
#[derive(Debug, Clone, Default)]
pub struct RawPrediction {
    /// Power density in mW/cm²
    pub power_density: f64,
    /// Operating voltage in V
    pub voltage: f64,
    /// Current density in mA/cm²
    pub current_density: f64,
    /// Efficiency in percent
    pub efficiency_pct: f64,
}

/// Trait for implementing prediction models
///
/// # Example
///
/// ```rust,ignore
/// use galvani::predictor::{ModelInputs, Predictor, RawPrediction};
/// use async_trait::async_trait;
///
/// struct ConstantModel;
///
/// #[async_trait]
/// impl Predictor for ConstantModel {
///     fn model_id(&self) -> &str { "constant" }
///     fn version(&self) -> &str { "0.0.1" }
///     fn supported_systems(&self) -> Vec<SystemType> { vec![SystemType::Mfc] }
///     // preprocess / predict ...
/// }
/// ```
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Model identifier used in the routing table
    fn model_id(&self) -> &str;

    /// Model version
    fn version(&self) -> &str;

    /// Kind of model, for descriptors and logging
    fn model_kind(&self) -> &str {
        "predictor"
    }

    /// System types this model can predict
    fn supported_systems(&self) -> Vec<SystemType>;

    /// Check whether the model supports a system type
    fn supports(&self, system: SystemType) -> bool {
        self.supported_systems().contains(&system)
    }

    /// Translate the unified request into this model's parameter space
    fn preprocess(&self, request: &PredictionRequest) -> Result<ModelInputs>;

    /// Generate a prediction in the unified metric format
    ///
    /// Calls `preprocess`, computes raw output, then `postprocess`. Must
    /// fail with [`GalvaniError::UnsupportedSystem`] when `supports` is
    /// false and propagate numeric failures as
    /// [`GalvaniError::Computation`] carrying the offending parameter.
    ///
    /// [`GalvaniError::UnsupportedSystem`]: crate::error::GalvaniError::UnsupportedSystem
    /// [`GalvaniError::Computation`]: crate::error::GalvaniError::Computation
    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse>;

    /// Convert raw model output into the unified metric format
    ///
    /// Fills metrics, confidence, and optimization recommendations; the
    /// caller stamps timing and any supplementary insights.
    fn postprocess(&self, raw: &RawPrediction, request: &PredictionRequest) -> PredictionResponse;

    /// Confidence score for a prediction
    ///
    /// Default: base 0.70, +0.05 for each of flow rate present, substrate
    /// concentration present, anode modifications present, cathode
    /// modifications present; capped at 0.95.
    fn confidence(&self, _partial: &RawPrediction, request: &PredictionRequest) -> f64 {
        let mut confidence: f64 = 0.70;
        if request.conditions.flow_rate_ml_min.is_some() {
            confidence += 0.05;
        }
        if request.conditions.substrate_g_l.is_some() {
            confidence += 0.05;
        }
        if !request.materials.anode_modifications.is_empty() {
            confidence += 0.05;
        }
        if !request.materials.cathode_modifications.is_empty() {
            confidence += 0.05;
        }
        confidence.min(0.95)
    }

    /// Optimization recommendations for a prediction
    ///
    /// Default: none. Models override this with their own rule sets.
    fn optimizations(
        &self,
        _partial: &RawPrediction,
        _request: &PredictionRequest,
    ) -> Vec<OptimizationRecommendation> {
        Vec::new()
    }
}

/// Type alias for a shared model instance
pub type BoxedPredictor = Arc<dyn Predictor>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MaterialSpec, OperatingConditions, SystemConfiguration};

    struct Probe;

    #[async_trait]
    impl Predictor for Probe {
        fn model_id(&self) -> &str {
            "probe"
        }

        fn version(&self) -> &str {
            "0.0.0"
        }

        fn supported_systems(&self) -> Vec<SystemType> {
            vec![SystemType::Mfc]
        }

        fn preprocess(&self, _request: &PredictionRequest) -> Result<ModelInputs> {
            Ok(ModelInputs::Features(Vec::new()))
        }

        async fn predict(&self, _request: &PredictionRequest) -> Result<PredictionResponse> {
            unimplemented!("contract probe only")
        }

        fn postprocess(
            &self,
            _raw: &RawPrediction,
            _request: &PredictionRequest,
        ) -> PredictionResponse {
            unimplemented!("contract probe only")
        }
    }

    fn request() -> PredictionRequest {
        PredictionRequest::new(
            SystemType::Mfc,
            SystemConfiguration::new(100.0, 2.0),
            OperatingConditions::new(298.15, 7.0),
            MaterialSpec::new("carbon_cloth", "carbon_cloth", 10.0),
        )
    }

    #[test]
    fn test_default_confidence_base() {
        let raw = RawPrediction::default();
        assert!((Probe.confidence(&raw, &request()) - 0.70).abs() < 1e-9);
    }

    #[test]
    fn test_default_confidence_bonuses_capped() {
        let raw = RawPrediction::default();
        let mut req = request();
        req.conditions.flow_rate_ml_min = Some(5.0);
        req.conditions.substrate_g_l = Some(1.0);
        req.materials.anode_modifications.push("ammonia-treated".into());
        req.materials.cathode_modifications.push("pt-coated".into());
        // 0.70 + 4 * 0.05 = 0.90, below the cap
        assert!((Probe.confidence(&raw, &req) - 0.90).abs() < 1e-9);
    }

    #[test]
    fn test_supports_via_supported_systems() {
        assert!(Probe.supports(SystemType::Mfc));
        assert!(!Probe.supports(SystemType::Pem));
    }
}
