//! EngineBuilder for configuring and constructing the prediction engine
//!
//! ## Table of Contents
//! - **EngineConfig**: Complete configuration struct
//! - **EngineBuilder**: Builder pattern for ModelManager construction
//!
//! Configuration is an explicit struct constructed once and passed into
//! the manager and the materials provider; there is no ambient global
//! state.

use crate::empirical::EmpiricalPredictor;
use crate::error::Result;
use crate::manager::ModelManager;
use crate::materials::source::BoxedPropertySource;
use crate::materials::MaterialsProvider;
use crate::metrics::GalvaniMetrics;
use crate::predictor::BoxedPredictor;
use crate::solver::{BoxedSolver, ReferenceSolver, SolverVariant};
use crate::validated::ValidatedModelAdapter;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default values shared between the config and its docs
pub(crate) mod defaults {
    use std::time::Duration;

    /// External solver call budget
    pub const SOLVER_TIMEOUT: Duration = Duration::from_secs(30);
    /// Property source call budget
    pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
    /// Property cache TTL (30 days)
    pub const CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
    /// Per-item prediction budget
    pub const PREDICTION_TIMEOUT: Duration = Duration::from_secs(30);
    /// Batch size hard cap
    pub const MAX_BATCH_SIZE: usize = 100;
}

/// Complete engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Budget for one external solver invocation
    pub solver_timeout: Duration,
    /// Budget for one property source call
    pub lookup_timeout: Duration,
    /// Property cache TTL
    pub cache_ttl: Duration,
    /// Budget for one prediction (applied per batch item)
    pub prediction_timeout: Duration,
    /// Maximum requests per batch call
    pub max_batch_size: usize,
    /// Maximum ensemble member count (None = all registered candidates)
    pub max_ensemble_members: Option<usize>,
    /// Enable the Prometheus metrics registry
    pub metrics_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            solver_timeout: defaults::SOLVER_TIMEOUT,
            lookup_timeout: defaults::LOOKUP_TIMEOUT,
            cache_ttl: defaults::CACHE_TTL,
            prediction_timeout: defaults::PREDICTION_TIMEOUT,
            max_batch_size: defaults::MAX_BATCH_SIZE,
            max_ensemble_members: None,
            metrics_enabled: true,
        }
    }
}

/// Builder for constructing a configured [`ModelManager`]
pub struct EngineBuilder {
    config: EngineConfig,
    materials: Option<Arc<MaterialsProvider>>,
    property_source: Option<BoxedPropertySource>,
    solver: Option<BoxedSolver>,
    extra_models: Vec<BoxedPredictor>,
}

impl EngineBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            materials: None,
            property_source: None,
            solver: None,
            extra_models: Vec::new(),
        }
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the solver call timeout
    pub fn with_solver_timeout(mut self, timeout: Duration) -> Self {
        self.config.solver_timeout = timeout;
        self
    }

    /// Set the property cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Set the batch size cap
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.config.max_batch_size = size.max(1);
        self
    }

    /// Cap the ensemble member count
    pub fn with_max_ensemble_members(mut self, members: usize) -> Self {
        self.config.max_ensemble_members = Some(members.max(1));
        self
    }

    /// Enable or disable metrics
    pub fn with_metrics_enabled(mut self, enabled: bool) -> Self {
        self.config.metrics_enabled = enabled;
        self
    }

    /// Attach a preconfigured materials provider
    pub fn with_materials(mut self, provider: Arc<MaterialsProvider>) -> Self {
        self.materials = Some(provider);
        self
    }

    /// Build a materials provider over this source, using the configured
    /// cache TTL and lookup timeout
    pub fn with_property_source(mut self, source: BoxedPropertySource) -> Self {
        self.property_source = Some(source);
        self
    }

    /// Use a custom polarization solver
    pub fn with_solver(mut self, solver: BoxedSolver) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Register an additional model
    pub fn with_model(mut self, model: BoxedPredictor) -> Self {
        self.extra_models.push(model);
        self
    }

    /// Build the configured [`ModelManager`]
    pub fn build(self) -> Result<ModelManager> {
        let solver = self
            .solver
            .unwrap_or_else(|| Arc::new(ReferenceSolver::new()));

        let metrics = if self.config.metrics_enabled {
            Some(Arc::new(GalvaniMetrics::new()?))
        } else {
            None
        };

        let materials = match (self.materials, self.property_source) {
            (Some(provider), _) => Some(provider),
            (None, Some(source)) => {
                let mut provider = MaterialsProvider::new(source)
                    .with_cache_ttl(self.config.cache_ttl)
                    .with_lookup_timeout(self.config.lookup_timeout);
                if let Some(metrics) = &metrics {
                    provider = provider.with_metrics(metrics.clone());
                }
                Some(Arc::new(provider))
            }
            (None, None) => None,
        };

        let mut manager = ModelManager::new(self.config.clone());
        if let Some(metrics) = metrics {
            manager = manager.with_metrics(metrics);
        }

        for variant in [SolverVariant::Amphlett, SolverVariant::LarminieDicks] {
            let mut adapter = ValidatedModelAdapter::new(variant, solver.clone())
                .with_solver_timeout(self.config.solver_timeout);
            if let Some(provider) = &materials {
                adapter = adapter.with_materials(provider.clone());
            }
            manager.register(Arc::new(adapter));
        }
        manager.register(Arc::new(EmpiricalPredictor::new()));

        for model in self.extra_models {
            manager.register(model);
        }

        info!(models = manager.model_count(), "Engine initialized");
        Ok(manager)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::source::StaticPropertySource;
    use crate::types::{
        MaterialSpec, OperatingConditions, PredictionRequest, SystemConfiguration, SystemType,
    };

    #[test]
    fn test_default_config_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_batch_size, 100);
        assert_eq!(config.cache_ttl, Duration::from_secs(30 * 24 * 60 * 60));
        assert!(config.max_ensemble_members.is_none());
    }

    #[tokio::test]
    async fn test_built_engine_serves_all_system_types() {
        let manager = EngineBuilder::new()
            .with_metrics_enabled(false)
            .build()
            .unwrap();
        assert_eq!(manager.model_count(), 3);

        let mfc = PredictionRequest::new(
            SystemType::Mfc,
            SystemConfiguration::new(100.0, 2.0),
            OperatingConditions::new(298.15, 7.0).with_substrate(1.0),
            MaterialSpec::new("carbon_cloth", "carbon_cloth", 10.0),
        );
        assert!(manager.predict(&mfc).await.is_ok());

        let pem = PredictionRequest::new(
            SystemType::Pem,
            SystemConfiguration::new(500.0, 0.5),
            OperatingConditions::new(353.15, 7.0),
            MaterialSpec::new("platinum", "platinum", 50.0),
        );
        assert!(manager.predict(&pem).await.is_ok());
        assert!(manager.ensemble_predict(&pem).await.is_ok());
    }

    #[tokio::test]
    async fn test_builder_with_materials_provider() {
        let provider = Arc::new(MaterialsProvider::new(Arc::new(
            StaticPropertySource::new(),
        )));
        let manager = EngineBuilder::new()
            .with_materials(provider)
            .with_metrics_enabled(false)
            .build()
            .unwrap();

        let pem = PredictionRequest::new(
            SystemType::Pem,
            SystemConfiguration::new(500.0, 0.5),
            OperatingConditions::new(353.15, 7.0),
            MaterialSpec::new("platinum", "platinum", 50.0),
        );
        let response = manager.predict(&pem).await.unwrap();
        assert!(response.material_insights.is_some());
    }

    #[tokio::test]
    async fn test_builder_constructs_provider_from_source() {
        let manager = EngineBuilder::new()
            .with_property_source(Arc::new(StaticPropertySource::new()))
            .with_metrics_enabled(false)
            .build()
            .unwrap();

        let pem = PredictionRequest::new(
            SystemType::Pem,
            SystemConfiguration::new(500.0, 0.5),
            OperatingConditions::new(353.15, 7.0),
            MaterialSpec::new("platinum", "platinum", 50.0),
        );
        let response = manager.predict(&pem).await.unwrap();
        assert!(response.material_insights.is_some());
    }
}
