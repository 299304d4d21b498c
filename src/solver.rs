//! Polarization-curve solvers for fuel-cell predictions
//!
//! ## Table of Contents
//! - **PolarizationSolver**: Trait for steady-state fuel-cell solvers
//! - **ReferenceSolver**: Built-in implementation of the three variants
//! - **SolverParams** / **PolarizationCurve**: Solver input and output
//!
//! The solver is a collaborator behind a trait so the validated-model
//! adapter can run against a mock in tests or a remote implementation in
//! production. `ReferenceSolver` evaluates three classic static models
//! (Amphlett, Larminie-Dicks, Chamberline-Kim) with fixed documented
//! constants.

use crate::error::{GalvaniError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fuel-cell model variant evaluated by the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolverVariant {
    /// Amphlett semi-empirical PEM model (Nernst + activation ξ-coefficients
    /// + membrane resistance from water content)
    Amphlett,
    /// Larminie-Dicks lumped-parameter model
    LarminieDicks,
    /// Chamberline-Kim empirical voltage model
    ChamberlineKim,
}

impl SolverVariant {
    /// Model identifier used in the routing table
    pub fn model_id(&self) -> &'static str {
        match self {
            SolverVariant::Amphlett => "amphlett-static",
            SolverVariant::LarminieDicks => "larminie-static",
            SolverVariant::ChamberlineKim => "chamberline-static",
        }
    }
}

/// Current sweep bounds in Amps
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurrentSweep {
    /// First sampled current
    pub start_a: f64,
    /// Last sampled current
    pub stop_a: f64,
    /// Step between samples
    pub step_a: f64,
}

/// Native parameter set of the polarization solvers
///
/// Values differ per variant but are fixed, documented constants;
/// `for_variant` seeds them and the adapter overrides the operating
/// conditions (temperature, area, partial pressures).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverParams {
    /// Which model variant to evaluate
    pub variant: SolverVariant,
    /// Cell temperature in Kelvin
    pub temperature_k: f64,
    /// Active electrode area in cm²
    pub active_area_cm2: f64,
    /// Hydrogen partial pressure in atm
    pub p_h2_atm: f64,
    /// Oxygen partial pressure in atm
    pub p_o2_atm: f64,
    /// Number of cells in the stack
    pub cells: u32,
    /// Open-circuit potential in V
    pub open_circuit_v: f64,
    /// Membrane water content λ (Amphlett)
    pub membrane_lambda: f64,
    /// Tafel / concentration slope in V
    pub tafel_slope_v: f64,
    /// Electronic resistance in Ω
    pub resistance_ohm: f64,
    /// Exchange current in A
    pub exchange_current_a: f64,
    /// Internal (crossover) current in A
    pub internal_current_a: f64,
    /// Limiting current in A
    pub limiting_current_a: f64,
    /// Maximum current density in A/cm² (Amphlett)
    pub max_current_density: f64,
    /// Current sweep bounds
    pub sweep: CurrentSweep,
}

impl SolverParams {
    /// Seed the fixed constants for a variant
    pub fn for_variant(variant: SolverVariant) -> Self {
        match variant {
            SolverVariant::Amphlett => Self {
                variant,
                temperature_k: 343.15,
                active_area_cm2: 50.6,
                p_h2_atm: 1.0,
                p_o2_atm: 1.0,
                cells: 1,
                open_circuit_v: 1.229,
                membrane_lambda: 23.0,
                tafel_slope_v: 0.016,
                resistance_ohm: 0.0,
                exchange_current_a: 1.0e-5,
                internal_current_a: 0.0,
                limiting_current_a: 100.0,
                max_current_density: 1.5,
                sweep: CurrentSweep {
                    start_a: 0.1,
                    stop_a: 75.0,
                    step_a: 0.1,
                },
            },
            SolverVariant::LarminieDicks => Self {
                variant,
                temperature_k: 343.15,
                active_area_cm2: 50.6,
                p_h2_atm: 1.0,
                p_o2_atm: 1.0,
                cells: 1,
                open_circuit_v: 1.229,
                membrane_lambda: 23.0,
                tafel_slope_v: 0.05,
                resistance_ohm: 0.0018,
                exchange_current_a: 1.0e-5,
                internal_current_a: 0.002,
                limiting_current_a: 100.0,
                max_current_density: 1.5,
                sweep: CurrentSweep {
                    start_a: 0.1,
                    stop_a: 60.0,
                    step_a: 0.1,
                },
            },
            SolverVariant::ChamberlineKim => Self {
                variant,
                temperature_k: 343.15,
                active_area_cm2: 50.6,
                p_h2_atm: 1.0,
                p_o2_atm: 1.0,
                cells: 1,
                open_circuit_v: 1.229,
                membrane_lambda: 23.0,
                tafel_slope_v: 0.016,
                resistance_ohm: 0.0018,
                exchange_current_a: 1.0e-5,
                internal_current_a: 0.0,
                limiting_current_a: 100.0,
                max_current_density: 1.5,
                sweep: CurrentSweep {
                    start_a: 0.1,
                    stop_a: 60.0,
                    step_a: 0.1,
                },
            },
        }
    }
}

/// Sampled polarization curve
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolarizationCurve {
    /// Sampled currents in A
    pub current_a: Vec<f64>,
    /// Stack voltage at each sample in V
    pub voltage_v: Vec<f64>,
    /// Output power at each sample in W
    pub power_w: Vec<f64>,
    /// Efficiency fraction at each sample
    pub efficiency: Vec<f64>,
}

impl PolarizationCurve {
    /// Highest sampled power in W
    pub fn max_power_w(&self) -> f64 {
        self.power_w.iter().copied().fold(0.0, f64::max)
    }

    /// Mean voltage over samples above the threshold, if any
    pub fn mean_voltage_above(&self, threshold_v: f64) -> Option<f64> {
        let above: Vec<f64> = self
            .voltage_v
            .iter()
            .copied()
            .filter(|v| *v > threshold_v)
            .collect();
        if above.is_empty() {
            None
        } else {
            Some(above.iter().sum::<f64>() / above.len() as f64)
        }
    }

    /// Highest sampled efficiency fraction, if any
    pub fn max_efficiency(&self) -> Option<f64> {
        self.efficiency
            .iter()
            .copied()
            .fold(None, |acc, e| Some(acc.map_or(e, |a: f64| a.max(e))))
    }
}

/// Trait for steady-state polarization solvers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PolarizationSolver: Send + Sync {
    /// Evaluate the polarization curve for the given parameters
    async fn solve(&self, params: &SolverParams) -> Result<PolarizationCurve>;

    /// Solver name for metrics/logging
    fn name(&self) -> &str;
}

/// Type alias for a shared solver instance
pub type BoxedSolver = Arc<dyn PolarizationSolver>;

// Fixed physical constants shared by the variants.
const FARADAY_HHV_V: f64 = 1.482;
const FUEL_UTILIZATION: f64 = 0.95;
const MEMBRANE_THICKNESS_CM: f64 = 0.0178;

/// Built-in solver evaluating the classic static models
#[derive(Debug, Clone, Default)]
pub struct ReferenceSolver;

impl ReferenceSolver {
    /// Create a reference solver
    pub fn new() -> Self {
        Self
    }

    fn cell_voltage(&self, params: &SolverParams, current_a: f64) -> Option<f64> {
        let voltage = match params.variant {
            SolverVariant::Amphlett => self.amphlett_voltage(params, current_a)?,
            SolverVariant::LarminieDicks => self.larminie_voltage(params, current_a)?,
            SolverVariant::ChamberlineKim => self.chamberline_voltage(params, current_a)?,
        };
        if voltage.is_finite() && voltage > 0.0 {
            Some(voltage)
        } else {
            None
        }
    }

    /// Amphlett: Nernst potential minus activation, ohmic, and
    /// concentration losses; membrane resistivity from water content λ.
    fn amphlett_voltage(&self, params: &SolverParams, current_a: f64) -> Option<f64> {
        let t = params.temperature_k;
        let area = params.active_area_cm2;
        let j = current_a / area;
        if j >= params.max_current_density {
            return None;
        }

        let e_nernst = 1.229 - 8.5e-4 * (t - 298.15)
            + 4.3085e-5 * t * (params.p_h2_atm.ln() + 0.5 * params.p_o2_atm.ln());

        // Dissolved gas concentrations at the catalyst interface (mol/cm³).
        let c_o2 = params.p_o2_atm / (5.08e6 * (-498.0 / t).exp());
        let c_h2 = params.p_h2_atm / (1.09e6 * (77.0 / t).exp());

        let xi1 = -0.948;
        let xi2 = 0.00286 + 2.0e-4 * area.ln() + 4.3e-5 * c_h2.ln();
        let xi3 = 7.6e-5;
        let xi4 = -1.93e-4;
        let eta_activation = -(xi1 + xi2 * t + xi3 * t * c_o2.ln() + xi4 * t * current_a.ln());

        let rho_m = 181.6
            * (1.0 + 0.03 * j + 0.062 * (t / 303.0).powi(2) * j.powf(2.5))
            / ((params.membrane_lambda - 0.634 - 3.0 * j) * (4.18 * (t - 303.0) / t).exp());
        let r_membrane = rho_m * MEMBRANE_THICKNESS_CM / area;
        let eta_ohmic = current_a * (r_membrane + params.resistance_ohm);

        let eta_concentration = -params.tafel_slope_v * (1.0 - j / params.max_current_density).ln();

        Some(e_nernst - eta_activation - eta_ohmic - eta_concentration)
    }

    /// Larminie-Dicks: logarithmic activation with crossover current,
    /// linear ohmic loss, logarithmic concentration term.
    fn larminie_voltage(&self, params: &SolverParams, current_a: f64) -> Option<f64> {
        let i = current_a + params.internal_current_a;
        if i >= params.limiting_current_a {
            return None;
        }
        // Activation slope A ≈ RT/(2αF); 0.06 V at the reference conditions.
        let activation_slope = 0.06;
        let eta_activation = activation_slope * (i / params.exchange_current_a).ln();
        let eta_ohmic = params.resistance_ohm * i;
        let eta_concentration = -params.tafel_slope_v * (1.0 - i / params.limiting_current_a).ln();

        Some(params.open_circuit_v - eta_activation - eta_ohmic - eta_concentration)
    }

    /// Chamberline-Kim: Tafel drop plus linear resistance plus exponential
    /// mass-transport term (m = 3e-5 V, n = 8 cm²/A).
    fn chamberline_voltage(&self, params: &SolverParams, current_a: f64) -> Option<f64> {
        const M_COEFF_V: f64 = 3.0e-5;
        const N_COEFF: f64 = 8.0;
        let j = current_a / params.active_area_cm2;
        let eta_tafel = params.tafel_slope_v * (current_a / params.exchange_current_a).ln();
        let eta_ohmic = params.resistance_ohm * current_a;
        let eta_transport = M_COEFF_V * (N_COEFF * j).exp();

        Some(params.open_circuit_v - eta_tafel - eta_ohmic - eta_transport)
    }
}

#[async_trait]
impl PolarizationSolver for ReferenceSolver {
    async fn solve(&self, params: &SolverParams) -> Result<PolarizationCurve> {
        if params.active_area_cm2 <= 0.0 {
            return Err(GalvaniError::simulation("active area must be positive"));
        }
        if params.sweep.step_a <= 0.0 {
            return Err(GalvaniError::simulation("current sweep step must be positive"));
        }

        let mut curve = PolarizationCurve::default();
        let mut current = params.sweep.start_a;
        while current <= params.sweep.stop_a {
            match self.cell_voltage(params, current) {
                Some(cell_v) => {
                    let stack_v = cell_v * params.cells as f64;
                    curve.current_a.push(current);
                    curve.voltage_v.push(stack_v);
                    curve.power_w.push(stack_v * current);
                    curve.efficiency.push(FUEL_UTILIZATION * cell_v / FARADAY_HHV_V);
                }
                // Past the feasible operating region; stop the sweep.
                None => break,
            }
            current += params.sweep.step_a;
        }

        if curve.current_a.is_empty() {
            return Err(GalvaniError::simulation(format!(
                "no feasible operating points for {:?}",
                params.variant
            )));
        }
        Ok(curve)
    }

    fn name(&self) -> &str {
        "reference"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pem_params(variant: SolverVariant) -> SolverParams {
        let mut params = SolverParams::for_variant(variant);
        params.temperature_k = 353.15;
        params.active_area_cm2 = 50.0;
        params.p_h2_atm = 1.0;
        params.p_o2_atm = 0.21;
        params
    }

    #[tokio::test]
    async fn test_amphlett_curve_is_physical() {
        let curve = ReferenceSolver::new()
            .solve(&pem_params(SolverVariant::Amphlett))
            .await
            .unwrap();

        assert!(!curve.current_a.is_empty());
        for v in &curve.voltage_v {
            assert!(*v > 0.0 && *v < 1.3, "voltage out of range: {}", v);
        }
        assert!(curve.max_power_w() > 0.0);
    }

    #[tokio::test]
    async fn test_voltage_decreases_with_current() {
        let curve = ReferenceSolver::new()
            .solve(&pem_params(SolverVariant::LarminieDicks))
            .await
            .unwrap();

        let first = curve.voltage_v.first().unwrap();
        let last = curve.voltage_v.last().unwrap();
        assert!(first > last);
    }

    #[tokio::test]
    async fn test_chamberline_has_transport_limited_tail() {
        let curve = ReferenceSolver::new()
            .solve(&pem_params(SolverVariant::ChamberlineKim))
            .await
            .unwrap();

        // The exponential term must bend the tail down faster than the
        // ohmic slope alone.
        let n = curve.voltage_v.len();
        assert!(n > 10);
        let early_drop = curve.voltage_v[0] - curve.voltage_v[1];
        let late_drop = curve.voltage_v[n - 2] - curve.voltage_v[n - 1];
        assert!(late_drop > early_drop * 0.1);
    }

    #[tokio::test]
    async fn test_efficiency_tracks_voltage() {
        let curve = ReferenceSolver::new()
            .solve(&pem_params(SolverVariant::Amphlett))
            .await
            .unwrap();

        let max_eff = curve.max_efficiency().unwrap();
        let max_v = curve.voltage_v.iter().copied().fold(0.0, f64::max);
        assert!((max_eff - FUEL_UTILIZATION * max_v / FARADAY_HHV_V).abs() < 1e-9);
        assert!(max_eff > 0.0 && max_eff < 1.0);
    }

    #[tokio::test]
    async fn test_bad_area_rejected() {
        let mut params = pem_params(SolverVariant::Amphlett);
        params.active_area_cm2 = 0.0;
        let err = ReferenceSolver::new().solve(&params).await.unwrap_err();
        assert!(matches!(err, GalvaniError::Simulation(_)));
    }

    #[test]
    fn test_mean_voltage_above_threshold() {
        let curve = PolarizationCurve {
            current_a: vec![1.0, 2.0, 3.0],
            voltage_v: vec![0.9, 0.5, 0.2],
            power_w: vec![0.9, 1.0, 0.6],
            efficiency: vec![0.6, 0.3, 0.1],
        };
        assert!((curve.mean_voltage_above(0.4).unwrap() - 0.7).abs() < 1e-9);
        assert!(curve.mean_voltage_above(1.0).is_none());
    }
}
