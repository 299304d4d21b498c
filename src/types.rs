//! Core types for Galvani predictions
//!
//! ## Table of Contents
//! - **SystemType**: Supported electrochemical system kinds
//! - **PredictionRequest**: Validated description of a system to predict
//! - **PredictionMetric** / **OptimizationRecommendation**: Unified outputs
//! - **MaterialRecord**: Property record produced by the materials provider
//! - **PredictionResponse**: Complete prediction result
//! - **ModelDescriptor**: Read-only description of a registered model

use crate::error::{GalvaniError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Supported electrochemical system kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemType {
    /// Microbial fuel cell
    Mfc,
    /// Microbial electrolysis cell
    Mec,
    /// Microbial desalination cell
    Mdc,
    /// Microbial electrosynthesis system
    Mes,
    /// Bioelectrochemical system (generic)
    Bes,
    /// Proton-exchange-membrane fuel cell
    Pem,
    /// Solid-oxide fuel cell
    Sofc,
    /// Phosphoric-acid fuel cell
    Pafc,
}

impl SystemType {
    /// All supported system types
    pub const ALL: [SystemType; 8] = [
        SystemType::Mfc,
        SystemType::Mec,
        SystemType::Mdc,
        SystemType::Mes,
        SystemType::Bes,
        SystemType::Pem,
        SystemType::Sofc,
        SystemType::Pafc,
    ];

    /// Whether this is a biologically catalyzed system
    pub fn is_microbial(&self) -> bool {
        matches!(
            self,
            SystemType::Mfc
                | SystemType::Mec
                | SystemType::Mdc
                | SystemType::Mes
                | SystemType::Bes
        )
    }

    /// Whether this is a conventional fuel cell chemistry
    pub fn is_fuel_cell(&self) -> bool {
        !self.is_microbial()
    }

    /// Wire name used by the API layer
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemType::Mfc => "MFC",
            SystemType::Mec => "MEC",
            SystemType::Mdc => "MDC",
            SystemType::Mes => "MES",
            SystemType::Bes => "BES",
            SystemType::Pem => "PEM",
            SystemType::Sofc => "SOFC",
            SystemType::Pafc => "PAFC",
        }
    }
}

impl fmt::Display for SystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reactor feeding regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowMode {
    /// Closed batch operation
    Batch,
    /// Continuous flow-through
    Continuous,
    /// Fed-batch operation
    FedBatch,
}

/// Geometric and design configuration of the reactor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfiguration {
    /// Reactor volume in mL
    pub reactor_volume_ml: f64,
    /// Electrode spacing in cm
    pub electrode_spacing_cm: f64,
    /// Number of chambers (1-10)
    pub chambers: u32,
    /// Feeding regime, if known
    pub flow_mode: Option<FlowMode>,
}

impl SystemConfiguration {
    /// Create a configuration with the default two-chamber layout
    pub fn new(reactor_volume_ml: f64, electrode_spacing_cm: f64) -> Self {
        Self {
            reactor_volume_ml,
            electrode_spacing_cm,
            chambers: 2,
            flow_mode: None,
        }
    }

    /// Set the chamber count
    pub fn with_chambers(mut self, chambers: u32) -> Self {
        self.chambers = chambers;
        self
    }

    /// Set the feeding regime
    pub fn with_flow_mode(mut self, mode: FlowMode) -> Self {
        self.flow_mode = Some(mode);
        self
    }
}

/// Operating conditions of the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatingConditions {
    /// Temperature in Kelvin (273.15 - 373.15)
    pub temperature_k: f64,
    /// pH value (0 - 14)
    pub ph: f64,
    /// Flow rate in mL/min
    pub flow_rate_ml_min: Option<f64>,
    /// Substrate concentration in g/L
    pub substrate_g_l: Option<f64>,
    /// External resistance in Ohms
    pub external_resistance_ohm: Option<f64>,
    /// Pressure in atm
    pub pressure_atm: f64,
}

impl OperatingConditions {
    /// Create conditions at atmospheric pressure
    pub fn new(temperature_k: f64, ph: f64) -> Self {
        Self {
            temperature_k,
            ph,
            flow_rate_ml_min: None,
            substrate_g_l: None,
            external_resistance_ohm: None,
            pressure_atm: 1.0,
        }
    }

    /// Set the flow rate
    pub fn with_flow_rate(mut self, ml_min: f64) -> Self {
        self.flow_rate_ml_min = Some(ml_min);
        self
    }

    /// Set the substrate concentration
    pub fn with_substrate(mut self, g_l: f64) -> Self {
        self.substrate_g_l = Some(g_l);
        self
    }

    /// Set the external resistance
    pub fn with_external_resistance(mut self, ohm: f64) -> Self {
        self.external_resistance_ohm = Some(ohm);
        self
    }

    /// Set the operating pressure
    pub fn with_pressure(mut self, atm: f64) -> Self {
        self.pressure_atm = atm;
        self
    }
}

/// Electrode and membrane material specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialSpec {
    /// Anode material name
    pub anode_material: String,
    /// Cathode material name
    pub cathode_material: String,
    /// Membrane type, if any
    pub membrane: Option<String>,
    /// Anode surface area in cm²
    pub anode_area_cm2: f64,
    /// Cathode surface area in cm²
    pub cathode_area_cm2: f64,
    /// Surface modifications applied to the anode
    pub anode_modifications: Vec<String>,
    /// Surface modifications applied to the cathode
    pub cathode_modifications: Vec<String>,
}

impl MaterialSpec {
    /// Create a specification with equal electrode areas
    pub fn new(anode: impl Into<String>, cathode: impl Into<String>, area_cm2: f64) -> Self {
        Self {
            anode_material: anode.into(),
            cathode_material: cathode.into(),
            membrane: None,
            anode_area_cm2: area_cm2,
            cathode_area_cm2: area_cm2,
            anode_modifications: Vec::new(),
            cathode_modifications: Vec::new(),
        }
    }

    /// Set the membrane type
    pub fn with_membrane(mut self, membrane: impl Into<String>) -> Self {
        self.membrane = Some(membrane.into());
        self
    }

    /// Add an anode surface modification
    pub fn with_anode_modification(mut self, modification: impl Into<String>) -> Self {
        self.anode_modifications.push(modification.into());
        self
    }

    /// Add a cathode surface modification
    pub fn with_cathode_modification(mut self, modification: impl Into<String>) -> Self {
        self.cathode_modifications.push(modification.into());
        self
    }
}

/// Complete description of a system to predict
///
/// Immutable once constructed; `validate` enforces the field ranges before
/// the request reaches any model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Kind of electrochemical system
    pub system_type: SystemType,
    /// Reactor geometry
    pub configuration: SystemConfiguration,
    /// Operating conditions
    pub conditions: OperatingConditions,
    /// Electrode and membrane materials
    pub materials: MaterialSpec,
}

impl PredictionRequest {
    /// Assemble a request from its parts
    pub fn new(
        system_type: SystemType,
        configuration: SystemConfiguration,
        conditions: OperatingConditions,
        materials: MaterialSpec,
    ) -> Self {
        Self {
            system_type,
            configuration,
            conditions,
            materials,
        }
    }

    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<()> {
        if self.configuration.reactor_volume_ml <= 0.0 {
            return Err(GalvaniError::validation("reactor_volume_ml must be > 0"));
        }
        if self.configuration.electrode_spacing_cm <= 0.0 {
            return Err(GalvaniError::validation("electrode_spacing_cm must be > 0"));
        }
        if !(1..=10).contains(&self.configuration.chambers) {
            return Err(GalvaniError::validation("chambers must be in 1..=10"));
        }
        if !(273.15..=373.15).contains(&self.conditions.temperature_k) {
            return Err(GalvaniError::validation(
                "temperature_k must be in [273.15, 373.15]",
            ));
        }
        if !(0.0..=14.0).contains(&self.conditions.ph) {
            return Err(GalvaniError::validation("ph must be in [0, 14]"));
        }
        if let Some(flow) = self.conditions.flow_rate_ml_min {
            if flow < 0.0 {
                return Err(GalvaniError::validation("flow_rate_ml_min must be >= 0"));
            }
        }
        if let Some(substrate) = self.conditions.substrate_g_l {
            if substrate < 0.0 {
                return Err(GalvaniError::validation("substrate_g_l must be >= 0"));
            }
        }
        if let Some(resistance) = self.conditions.external_resistance_ohm {
            if resistance < 0.0 {
                return Err(GalvaniError::validation(
                    "external_resistance_ohm must be >= 0",
                ));
            }
        }
        if self.conditions.pressure_atm < 0.0 {
            return Err(GalvaniError::validation("pressure_atm must be >= 0"));
        }
        if self.materials.anode_area_cm2 <= 0.0 {
            return Err(GalvaniError::validation("anode_area_cm2 must be > 0"));
        }
        if self.materials.cathode_area_cm2 <= 0.0 {
            return Err(GalvaniError::validation("cathode_area_cm2 must be > 0"));
        }
        Ok(())
    }
}

/// Individual predicted metric with its confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionMetric {
    /// Predicted value
    pub value: f64,
    /// Unit of the value
    pub unit: String,
    /// Confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Absolute uncertainty, when the model reports one
    pub uncertainty: Option<f64>,
}

impl PredictionMetric {
    /// Create a metric, clamping confidence into [0, 1]
    pub fn new(value: f64, unit: impl Into<String>, confidence: f64) -> Self {
        Self {
            value,
            unit: unit.into(),
            confidence: confidence.clamp(0.0, 1.0),
            uncertainty: None,
        }
    }

    /// Attach an uncertainty estimate
    pub fn with_uncertainty(mut self, uncertainty: f64) -> Self {
        self.uncertainty = Some(uncertainty);
        self
    }
}

/// Actionable recommendation for improving predicted performance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    /// Parameter to change
    pub parameter: String,
    /// Current value of the parameter
    pub current_value: f64,
    /// Recommended value
    pub recommended_value: f64,
    /// Expected improvement in percent
    pub expected_improvement_pct: f64,
    /// Confidence in the recommendation (0.0 - 1.0)
    pub confidence: f64,
    /// Human-readable rationale
    pub rationale: String,
}

/// Numeric or qualitative material property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag (e.g. `is_metal`)
    Flag(bool),
    /// Numeric value
    Number(f64),
    /// Qualitative label: low / moderate / high / very_high / excellent / good / unknown
    Label(String),
}

impl PropertyValue {
    /// Numeric value, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Qualitative label, if this is one
    pub fn as_label(&self) -> Option<&str> {
        match self {
            PropertyValue::Label(l) => Some(l),
            _ => None,
        }
    }

    /// Boolean flag, if this is one
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            PropertyValue::Flag(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Flag(v) => write!(f, "{}", v),
            PropertyValue::Number(v) => write!(f, "{}", v),
            PropertyValue::Label(v) => write!(f, "{}", v),
        }
    }
}

/// Resolved material property record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    /// Source identifier, or `custom_<name>` for fallback records
    pub material_id: String,
    /// Chemical formula or original material name
    pub formula: String,
    /// Named properties
    pub properties: BTreeMap<String, PropertyValue>,
    /// Whether this record came from the curated fallback table
    pub from_fallback: bool,
}

impl MaterialRecord {
    /// Look up a property by name
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Qualitative label for a property, defaulting to "unknown"
    pub fn label(&self, name: &str) -> &str {
        self.properties
            .get(name)
            .and_then(PropertyValue::as_label)
            .unwrap_or("unknown")
    }

    /// Numeric value for a property, if present
    pub fn number(&self, name: &str) -> Option<f64> {
        self.properties.get(name).and_then(PropertyValue::as_number)
    }
}

/// Per-electrode material insight attached to a fuel-cell prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectrodeInsight {
    /// Material name as requested
    pub material: String,
    /// Derived conductivity label
    pub conductivity: String,
    /// Catalytic activity label, when known
    pub catalytic_activity: Option<String>,
}

/// Electrode material compatibility assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityReport {
    /// Compatibility score (0.0 - 1.0)
    pub score: f64,
    /// Detected issues
    pub issues: Vec<String>,
    /// Suggested remedies
    pub recommendations: Vec<String>,
}

/// Supplementary material insights for a prediction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialInsights {
    /// Anode material insight
    pub anode: Option<ElectrodeInsight>,
    /// Cathode material insight
    pub cathode: Option<ElectrodeInsight>,
    /// Electrode pairing compatibility
    pub compatibility: Option<CompatibilityReport>,
}

/// Complete prediction result in the unified metric format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Unique prediction identifier
    pub prediction_id: String,
    /// Predicted power density
    pub power_output: PredictionMetric,
    /// Predicted efficiency in percent
    pub efficiency: PredictionMetric,
    /// Predicted current density
    pub current_density: Option<PredictionMetric>,
    /// Predicted operating voltage
    pub voltage: Option<PredictionMetric>,
    /// Optimization recommendations
    pub optimizations: Vec<OptimizationRecommendation>,
    /// Version of the model that produced this result
    pub model_version: String,
    /// Model type tag ("ensemble" for aggregated results)
    pub model_type: String,
    /// Overall confidence (0.0 - 1.0)
    pub confidence_score: f64,
    /// Wall-clock processing time in milliseconds
    pub processing_time_ms: f64,
    /// When the prediction was produced
    pub timestamp: DateTime<Utc>,
    /// Supplementary material insights, when a provider was consulted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_insights: Option<MaterialInsights>,
}

/// Read-only description of a registered model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier used in the routing table
    pub model_id: String,
    /// Model version
    pub version: String,
    /// Kind of model (empirical / polarization)
    pub model_kind: String,
    /// System types this model can predict
    pub supported_systems: Vec<SystemType>,
}

/// Generate a prediction identifier (`pred_` + 12 hex chars)
pub fn prediction_id() -> String {
    format!("pred_{}", &Uuid::new_v4().simple().to_string()[..12])
}

/// Generate a batch identifier (`batch_` + 12 hex chars)
pub fn batch_id() -> String {
    format!("batch_{}", &Uuid::new_v4().simple().to_string()[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PredictionRequest {
        PredictionRequest::new(
            SystemType::Mfc,
            SystemConfiguration::new(100.0, 2.0),
            OperatingConditions::new(298.15, 7.0).with_substrate(1.0),
            MaterialSpec::new("carbon_cloth", "carbon_cloth", 10.0),
        )
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_temperature_out_of_range() {
        let mut req = request();
        req.conditions.temperature_k = 400.0;
        let err = req.validate().unwrap_err();
        assert!(matches!(err, GalvaniError::Validation(_)));
        assert!(err.to_string().contains("temperature_k"));
    }

    #[test]
    fn test_negative_area_rejected() {
        let mut req = request();
        req.materials.anode_area_cm2 = -1.0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_system_type_wire_names() {
        let json = serde_json::to_string(&SystemType::Mfc).unwrap();
        assert_eq!(json, "\"MFC\"");
        let back: SystemType = serde_json::from_str("\"SOFC\"").unwrap();
        assert_eq!(back, SystemType::Sofc);
    }

    #[test]
    fn test_microbial_split() {
        assert!(SystemType::Mfc.is_microbial());
        assert!(SystemType::Bes.is_microbial());
        assert!(SystemType::Pem.is_fuel_cell());
        assert!(!SystemType::Pafc.is_microbial());
    }

    #[test]
    fn test_metric_confidence_clamped() {
        let metric = PredictionMetric::new(1.0, "mW/cm²", 1.4);
        assert_eq!(metric.confidence, 1.0);
    }

    #[test]
    fn test_prediction_id_shape() {
        let id = prediction_id();
        assert!(id.starts_with("pred_"));
        assert_eq!(id.len(), "pred_".len() + 12);
    }

    #[test]
    fn test_property_value_untagged_serde() {
        let v: PropertyValue = serde_json::from_str("true").unwrap();
        assert_eq!(v.as_flag(), Some(true));
        let v: PropertyValue = serde_json::from_str("1.5").unwrap();
        assert_eq!(v.as_number(), Some(1.5));
        let v: PropertyValue = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(v.as_label(), Some("high"));
    }
}
