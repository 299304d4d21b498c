//! Validated fuel-cell model adapter
//!
//! ## Table of Contents
//! - **ValidatedModelAdapter**: Predictor wrapping a polarization solver
//! - **MaterialAdjustments**: Parameter tweaks derived from material lookups
//!
//! The adapter translates the unified request into the solver's native
//! parameter set, optionally adjusts those parameters from material
//! property lookups, runs the solver under a timeout, and converts the
//! polarization curve into the unified metric format. Material lookup
//! failures are non-fatal: the solver runs unadjusted.

use crate::error::{GalvaniError, Result};
use crate::materials::MaterialsProvider;
use crate::metrics::Timer;
use crate::predictor::{ModelInputs, Predictor, RawPrediction};
use crate::solver::{BoxedSolver, PolarizationCurve, PolarizationSolver, SolverParams, SolverVariant};
use crate::types::{
    self, CompatibilityReport, ElectrodeInsight, MaterialInsights, MaterialRecord,
    OptimizationRecommendation, PredictionMetric, PredictionRequest, PredictionResponse,
    SystemType,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const STANDARD_POTENTIAL_V: f64 = 1.229;
const OPERATING_REGION_MIN_V: f64 = 0.4;
const SOFC_MIN_TEMPERATURE_K: f64 = 973.15;

/// Parameter adjustments derived from material property lookups
#[derive(Debug, Clone)]
struct MaterialAdjustments {
    conductivity_factor: f64,
    catalyst_activity: f64,
    insights: MaterialInsights,
}

impl Default for MaterialAdjustments {
    fn default() -> Self {
        Self {
            conductivity_factor: 1.0,
            catalyst_activity: 1.0,
            insights: MaterialInsights::default(),
        }
    }
}

/// Predictor for PEM / SOFC / PAFC systems backed by a polarization solver
pub struct ValidatedModelAdapter {
    variant: SolverVariant,
    solver: BoxedSolver,
    materials: Option<Arc<MaterialsProvider>>,
    solver_timeout: Duration,
}

impl ValidatedModelAdapter {
    /// Create an adapter for a solver variant
    pub fn new(variant: SolverVariant, solver: BoxedSolver) -> Self {
        Self {
            variant,
            solver,
            materials: None,
            solver_timeout: Duration::from_secs(30),
        }
    }

    /// Enable material-derived parameter adjustments
    pub fn with_materials(mut self, provider: Arc<MaterialsProvider>) -> Self {
        self.materials = Some(provider);
        self
    }

    /// Set the solver call timeout
    pub fn with_solver_timeout(mut self, timeout: Duration) -> Self {
        self.solver_timeout = timeout;
        self
    }

    /// Map the unified request onto the solver's native parameter set
    fn map_request(&self, request: &PredictionRequest) -> SolverParams {
        let mut params = SolverParams::for_variant(self.variant);
        params.temperature_k = request.conditions.temperature_k;
        params.active_area_cm2 = request.materials.anode_area_cm2;
        params.p_h2_atm = request.conditions.pressure_atm;
        // Air-fed cathode.
        params.p_o2_atm = request.conditions.pressure_atm * 0.21;

        if request.system_type == SystemType::Sofc {
            params.temperature_k = params.temperature_k.max(SOFC_MIN_TEMPERATURE_K);
        }
        params
    }

    async fn material_adjustments(
        &self,
        provider: &MaterialsProvider,
        request: &PredictionRequest,
    ) -> MaterialAdjustments {
        let mut adjustments = MaterialAdjustments::default();

        let anode = provider.get(&request.materials.anode_material, None).await;
        let cathode = provider
            .get(&request.materials.cathode_material, None)
            .await;

        let anode_conductivity = anode.label("electrical_conductivity").to_string();
        match anode_conductivity.as_str() {
            "high" => adjustments.conductivity_factor *= 1.1,
            "very_high" => adjustments.conductivity_factor *= 1.2,
            "low" => adjustments.conductivity_factor *= 0.8,
            _ => {}
        }
        adjustments.insights.anode = Some(ElectrodeInsight {
            material: request.materials.anode_material.clone(),
            conductivity: anode_conductivity,
            catalytic_activity: None,
        });

        let cathode_conductivity = cathode.label("electrical_conductivity").to_string();
        if matches!(cathode_conductivity.as_str(), "high" | "very_high") {
            adjustments.conductivity_factor *= 1.1;
        }
        let catalyst = cathode.label("catalytic_activity").to_string();
        match catalyst.as_str() {
            "excellent" => adjustments.catalyst_activity = 1.3,
            "good" => adjustments.catalyst_activity = 1.1,
            _ => {}
        }
        adjustments.insights.cathode = Some(ElectrodeInsight {
            material: request.materials.cathode_material.clone(),
            conductivity: cathode_conductivity,
            catalytic_activity: Some(catalyst),
        });

        adjustments.insights.compatibility = Some(check_compatibility(&anode, &cathode));
        adjustments
    }

    fn curve_to_raw(&self, curve: &PolarizationCurve, request: &PredictionRequest) -> RawPrediction {
        let power_density = curve.max_power_w() * 1000.0 / request.materials.anode_area_cm2;
        let voltage = curve
            .mean_voltage_above(OPERATING_REGION_MIN_V)
            .unwrap_or(0.7);
        let efficiency_pct = curve
            .max_efficiency()
            .map(|e| e * 100.0)
            .unwrap_or_else(|| voltage / STANDARD_POTENTIAL_V * 100.0);
        let current_density = if voltage > 0.0 {
            power_density / voltage
        } else {
            0.0
        };

        RawPrediction {
            power_density,
            voltage,
            current_density,
            efficiency_pct,
        }
    }
}

/// Check compatibility between electrode materials
///
/// Baseline 0.8; penalized for galvanic corrosion risk (formation energy
/// gap above 2 eV/atom) and for a low/high conductivity mismatch.
fn check_compatibility(anode: &MaterialRecord, cathode: &MaterialRecord) -> CompatibilityReport {
    let mut report = CompatibilityReport {
        score: 0.8,
        issues: Vec::new(),
        recommendations: Vec::new(),
    };

    let anode_formation = anode.number("formation_energy_per_atom").unwrap_or(0.0);
    let cathode_formation = cathode.number("formation_energy_per_atom").unwrap_or(0.0);
    if (anode_formation - cathode_formation).abs() > 2.0 {
        report.score -= 0.2;
        report.issues.push("High galvanic corrosion risk".to_string());
        report
            .recommendations
            .push("Consider using materials with similar nobility".to_string());
    }

    let anode_conductivity = anode.label("electrical_conductivity");
    let cathode_conductivity = cathode.label("electrical_conductivity");
    if anode_conductivity == "low" && matches!(cathode_conductivity, "high" | "very_high") {
        report.score -= 0.1;
        report
            .issues
            .push("Conductivity mismatch may limit performance".to_string());
        report
            .recommendations
            .push("Upgrade anode material conductivity".to_string());
    }

    report
}

fn apply_adjustments(params: &mut SolverParams, adjustments: &MaterialAdjustments) {
    if adjustments.catalyst_activity != 1.0 {
        params.exchange_current_a *= adjustments.catalyst_activity;
    }
    if adjustments.conductivity_factor != 1.0 {
        params.resistance_ohm /= adjustments.conductivity_factor;
    }
    if adjustments.conductivity_factor > 1.0 {
        params.limiting_current_a *= adjustments.conductivity_factor.sqrt();
    }
}

#[async_trait]
impl Predictor for ValidatedModelAdapter {
    fn model_id(&self) -> &str {
        self.variant.model_id()
    }

    fn version(&self) -> &str {
        "1.4.0"
    }

    fn model_kind(&self) -> &str {
        "polarization"
    }

    fn supported_systems(&self) -> Vec<SystemType> {
        vec![SystemType::Pem, SystemType::Sofc, SystemType::Pafc]
    }

    fn preprocess(&self, request: &PredictionRequest) -> Result<ModelInputs> {
        Ok(ModelInputs::Solver(self.map_request(request)))
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
        if !self.supports(request.system_type) {
            return Err(GalvaniError::UnsupportedSystem(
                request.system_type.to_string(),
            ));
        }

        let timer = Timer::start();
        let mut params = match self.preprocess(request)? {
            ModelInputs::Solver(params) => params,
            ModelInputs::Features(_) => {
                return Err(GalvaniError::internal(
                    "adapter preprocessing produced a feature vector",
                ))
            }
        };

        let mut insights = None;
        if let Some(provider) = &self.materials {
            let adjustments = self.material_adjustments(provider, request).await;
            debug!(
                conductivity_factor = adjustments.conductivity_factor,
                catalyst_activity = adjustments.catalyst_activity,
                "Applying material adjustments"
            );
            apply_adjustments(&mut params, &adjustments);
            insights = Some(adjustments.insights);
        }

        info!(variant = ?self.variant, "Running polarization simulation");
        let curve = tokio::time::timeout(self.solver_timeout, self.solver.solve(&params))
            .await
            .map_err(|_| {
                GalvaniError::simulation(format!(
                    "polarization solver timed out after {:?}",
                    self.solver_timeout
                ))
            })??;

        let raw = self.curve_to_raw(&curve, request);
        let mut response = self.postprocess(&raw, request);
        response.material_insights = insights;
        response.processing_time_ms = timer.stop() * 1000.0;
        Ok(response)
    }

    fn postprocess(&self, raw: &RawPrediction, request: &PredictionRequest) -> PredictionResponse {
        let confidence = self.confidence(raw, request);
        PredictionResponse {
            prediction_id: types::prediction_id(),
            power_output: PredictionMetric::new(raw.power_density, "mW/cm²", confidence),
            efficiency: PredictionMetric::new(raw.efficiency_pct, "%", confidence),
            current_density: Some(PredictionMetric::new(
                raw.current_density,
                "mA/cm²",
                confidence,
            )),
            voltage: Some(PredictionMetric::new(raw.voltage, "V", confidence)),
            optimizations: self.optimizations(raw, request),
            model_version: self.version().to_string(),
            model_type: self.model_id().to_string(),
            confidence_score: confidence,
            processing_time_ms: 0.0,
            timestamp: Utc::now(),
            material_insights: None,
        }
    }

    /// Operating-point recommendations for fuel-cell systems
    fn optimizations(
        &self,
        _partial: &RawPrediction,
        request: &PredictionRequest,
    ) -> Vec<OptimizationRecommendation> {
        let mut recommendations = Vec::new();

        let (optimal_temperature_k, rationale) = match request.system_type {
            SystemType::Pem => (
                353.15,
                "PEM fuel cells typically operate optimally at 80°C",
            ),
            SystemType::Sofc => (
                1073.15,
                "Solid-oxide chemistry requires high operating temperature",
            ),
            SystemType::Pafc => (453.15, "Phosphoric-acid cells run optimally near 180°C"),
            _ => (353.15, "Fuel cells benefit from elevated temperature"),
        };
        if (request.conditions.temperature_k - optimal_temperature_k).abs() > 10.0 {
            recommendations.push(OptimizationRecommendation {
                parameter: "temperature".to_string(),
                current_value: request.conditions.temperature_k,
                recommended_value: optimal_temperature_k,
                expected_improvement_pct: 15.0,
                confidence: 0.85,
                rationale: rationale.to_string(),
            });
        }

        if request.conditions.pressure_atm < 2.0 {
            recommendations.push(OptimizationRecommendation {
                parameter: "pressure".to_string(),
                current_value: request.conditions.pressure_atm,
                recommended_value: 3.0,
                expected_improvement_pct: 20.0,
                confidence: 0.80,
                rationale: "Higher pressure improves reactant concentration and performance"
                    .to_string(),
            });
        }

        if request.materials.anode_area_cm2 < 100.0 {
            recommendations.push(OptimizationRecommendation {
                parameter: "electrode_area".to_string(),
                current_value: request.materials.anode_area_cm2,
                recommended_value: request.materials.anode_area_cm2 * 2.0,
                expected_improvement_pct: 80.0,
                confidence: 0.90,
                rationale: "Larger electrode area provides more reaction sites".to_string(),
            });
        }

        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::source::StaticPropertySource;
    use crate::solver::{MockPolarizationSolver, ReferenceSolver};
    use crate::types::{MaterialSpec, OperatingConditions, PropertyValue, SystemConfiguration};
    use std::collections::BTreeMap;

    fn pem_request() -> PredictionRequest {
        PredictionRequest::new(
            SystemType::Pem,
            SystemConfiguration::new(500.0, 0.5),
            OperatingConditions::new(353.15, 7.0).with_pressure(1.0),
            MaterialSpec::new("platinum", "platinum", 50.0),
        )
    }

    fn fixed_curve() -> PolarizationCurve {
        PolarizationCurve {
            current_a: vec![1.0, 2.0, 3.0],
            voltage_v: vec![0.9, 0.6, 0.3],
            power_w: vec![0.9, 1.2, 0.9],
            efficiency: vec![0.58, 0.38, 0.19],
        }
    }

    fn record(properties: Vec<(&str, PropertyValue)>) -> MaterialRecord {
        MaterialRecord {
            material_id: "test".to_string(),
            formula: "X".to_string(),
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
            from_fallback: false,
        }
    }

    #[tokio::test]
    async fn test_postprocess_conversion_laws() {
        let mut solver = MockPolarizationSolver::new();
        solver.expect_solve().returning(|_| Ok(fixed_curve()));
        solver.expect_name().return_const("mock".to_string());

        let adapter = ValidatedModelAdapter::new(SolverVariant::Amphlett, Arc::new(solver));
        let response = adapter.predict(&pem_request()).await.unwrap();

        // max power 1.2 W over 50 cm² -> 24 mW/cm²
        assert!((response.power_output.value - 24.0).abs() < 1e-9);
        // operating voltage: mean of samples above 0.4 V -> (0.9 + 0.6) / 2
        let voltage = response.voltage.as_ref().unwrap().value;
        assert!((voltage - 0.75).abs() < 1e-9);
        // efficiency: max sample as percent
        assert!((response.efficiency.value - 58.0).abs() < 1e-9);
        assert_eq!(response.model_type, "amphlett-static");
    }

    #[tokio::test]
    async fn test_efficiency_falls_back_to_thermodynamic_ratio() {
        let mut solver = MockPolarizationSolver::new();
        solver.expect_solve().returning(|_| {
            let mut curve = fixed_curve();
            curve.efficiency.clear();
            Ok(curve)
        });
        solver.expect_name().return_const("mock".to_string());

        let adapter = ValidatedModelAdapter::new(SolverVariant::Amphlett, Arc::new(solver));
        let response = adapter.predict(&pem_request()).await.unwrap();

        assert!((response.efficiency.value - 0.75 / STANDARD_POTENTIAL_V * 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_solver_failure_propagates_as_simulation_error() {
        let mut solver = MockPolarizationSolver::new();
        solver
            .expect_solve()
            .returning(|_| Err(GalvaniError::simulation("diverged")));
        solver.expect_name().return_const("mock".to_string());

        let adapter = ValidatedModelAdapter::new(SolverVariant::Amphlett, Arc::new(solver));
        let err = adapter.predict(&pem_request()).await.unwrap_err();
        assert!(matches!(err, GalvaniError::Simulation(_)));
    }

    struct SlowSolver;

    #[async_trait]
    impl PolarizationSolver for SlowSolver {
        async fn solve(&self, _params: &SolverParams) -> Result<PolarizationCurve> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(fixed_curve())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_slow_solver_times_out() {
        let adapter = ValidatedModelAdapter::new(SolverVariant::Amphlett, Arc::new(SlowSolver))
            .with_solver_timeout(Duration::from_millis(10));
        let err = adapter.predict(&pem_request()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_unsupported_system_rejected() {
        let solver = Arc::new(ReferenceSolver::new());
        let adapter = ValidatedModelAdapter::new(SolverVariant::Amphlett, solver);

        let mut request = pem_request();
        request.system_type = SystemType::Mfc;
        let err = adapter.predict(&request).await.unwrap_err();
        assert!(matches!(err, GalvaniError::UnsupportedSystem(_)));
    }

    #[tokio::test]
    async fn test_sofc_temperature_clamped_up() {
        let solver = Arc::new(ReferenceSolver::new());
        let adapter = ValidatedModelAdapter::new(SolverVariant::Amphlett, solver);

        let mut request = pem_request();
        request.system_type = SystemType::Sofc;
        request.conditions.temperature_k = 353.15;

        match adapter.preprocess(&request).unwrap() {
            ModelInputs::Solver(params) => {
                assert!((params.temperature_k - SOFC_MIN_TEMPERATURE_K).abs() < 1e-9)
            }
            ModelInputs::Features(_) => panic!("expected solver params"),
        }
    }

    #[tokio::test]
    async fn test_material_insights_attached() {
        let provider = Arc::new(MaterialsProvider::new(Arc::new(
            StaticPropertySource::new(),
        )));
        let adapter =
            ValidatedModelAdapter::new(SolverVariant::LarminieDicks, Arc::new(ReferenceSolver::new()))
                .with_materials(provider);

        let response = adapter.predict(&pem_request()).await.unwrap();
        let insights = response.material_insights.unwrap();
        assert_eq!(insights.anode.unwrap().conductivity, "high");
        let compatibility = insights.compatibility.unwrap();
        assert!((0.0..=1.0).contains(&compatibility.score));
    }

    #[test]
    fn test_adjustments_scale_solver_parameters() {
        let mut params = SolverParams::for_variant(SolverVariant::LarminieDicks);
        let base_exchange = params.exchange_current_a;
        let base_resistance = params.resistance_ohm;
        let base_limiting = params.limiting_current_a;

        let adjustments = MaterialAdjustments {
            conductivity_factor: 1.21,
            catalyst_activity: 1.3,
            insights: MaterialInsights::default(),
        };
        apply_adjustments(&mut params, &adjustments);

        assert!((params.exchange_current_a - base_exchange * 1.3).abs() < 1e-15);
        assert!((params.resistance_ohm - base_resistance / 1.21).abs() < 1e-9);
        assert!((params.limiting_current_a - base_limiting * 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_compatibility_penalties() {
        let noble = record(vec![
            ("formation_energy_per_atom", PropertyValue::Number(0.0)),
            (
                "electrical_conductivity",
                PropertyValue::Label("low".to_string()),
            ),
        ]);
        let base = record(vec![
            ("formation_energy_per_atom", PropertyValue::Number(-2.5)),
            (
                "electrical_conductivity",
                PropertyValue::Label("very_high".to_string()),
            ),
        ]);

        let report = check_compatibility(&noble, &base);
        assert!((report.score - 0.5).abs() < 1e-9);
        assert_eq!(report.issues.len(), 2);
    }

    #[test]
    fn test_matched_electrodes_keep_baseline_score() {
        let a = record(vec![
            ("formation_energy_per_atom", PropertyValue::Number(0.0)),
            (
                "electrical_conductivity",
                PropertyValue::Label("high".to_string()),
            ),
        ]);
        let report = check_compatibility(&a, &a.clone());
        assert!((report.score - 0.8).abs() < 1e-9);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn test_low_pressure_and_small_area_recommendations() {
        let solver = Arc::new(ReferenceSolver::new());
        let adapter = ValidatedModelAdapter::new(SolverVariant::Amphlett, solver);

        let response = adapter.predict(&pem_request()).await.unwrap();
        let parameters: Vec<&str> = response
            .optimizations
            .iter()
            .map(|r| r.parameter.as_str())
            .collect();

        // 1 atm and 50 cm² both trigger; 353.15 K is already optimal for PEM.
        assert!(parameters.contains(&"pressure"));
        assert!(parameters.contains(&"electrode_area"));
        assert!(!parameters.contains(&"temperature"));
    }
}
