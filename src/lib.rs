//! # Galvani
//!
//! A Rust-native prediction engine for electrochemical energy systems:
//! microbial fuel cells and PEM / SOFC / PAFC fuel cells.
//!
//! ## Features
//!
//! - **Model Routing**: Static routing table from system type to an
//!   ordered list of candidate models
//! - **Ensemble Prediction**: Concurrent settle-all fan-out across all
//!   eligible models with arithmetic-mean aggregation
//! - **Empirical Model**: Closed-form power/voltage/efficiency
//!   correlations for microbial systems
//! - **Polarization Models**: Amphlett, Larminie-Dicks, and
//!   Chamberline-Kim fuel-cell curves behind a solver trait
//! - **Material Properties**: Cached lookups with curated fallbacks,
//!   scoring, recommendations, and comparisons
//! - **Metrics**: Prometheus-compatible counters and histograms
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use galvani::{EngineBuilder, PredictionRequest, SystemType};
//! use galvani::types::{MaterialSpec, OperatingConditions, SystemConfiguration};
//!
//! #[tokio::main]
//! async fn main() -> galvani::Result<()> {
//!     let engine = EngineBuilder::new().build()?;
//!
//!     let request = PredictionRequest::new(
//!         SystemType::Mfc,
//!         SystemConfiguration::new(100.0, 2.0),
//!         OperatingConditions::new(303.15, 7.0).with_substrate(1.0),
//!         MaterialSpec::new("carbon_cloth", "carbon_cloth", 10.0),
//!     );
//!
//!     let prediction = engine.predict(&request).await?;
//!     println!("{} mW/cm²", prediction.power_output.value);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod builder;
pub mod empirical;
pub mod error;
pub mod manager;
pub mod materials;
pub mod metrics;
pub mod predictor;
pub mod solver;
pub mod types;
pub mod validated;

// Re-exports for ergonomic API
pub use builder::{EngineBuilder, EngineConfig};
pub use empirical::EmpiricalPredictor;
pub use error::{GalvaniError, Result};
pub use manager::{BatchOutcome, ModelManager};
pub use materials::{Application, Constraints, MaterialsProvider};
pub use metrics::GalvaniMetrics;
pub use predictor::{BoxedPredictor, Predictor};
pub use solver::{PolarizationSolver, ReferenceSolver, SolverVariant};
pub use types::{PredictionRequest, PredictionResponse, SystemType};
pub use validated::ValidatedModelAdapter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builder::{EngineBuilder, EngineConfig};
    pub use crate::error::Result;
    pub use crate::manager::ModelManager;
    pub use crate::materials::{Application, MaterialsProvider};
    pub use crate::predictor::Predictor;
    pub use crate::types::{
        MaterialSpec, OperatingConditions, PredictionRequest, PredictionResponse,
        SystemConfiguration, SystemType,
    };
}

/// Install a tracing subscriber honoring `RUST_LOG`
///
/// Intended for binaries and examples embedding the engine; calling it
/// twice is harmless.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
