//! External property sources for the materials provider
//!
//! ## Table of Contents
//! - **PropertySource**: Trait for property database backends
//! - **HttpPropertySource**: JSON client for a Materials-Project-style API
//! - **StaticPropertySource**: Curated in-memory entries for offline use

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One candidate entry returned by a property source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Source-side material identifier
    pub material_id: String,
    /// Pretty chemical formula
    #[serde(alias = "formula_pretty")]
    pub formula: String,
    /// Energy above the convex hull in eV/atom (stability)
    #[serde(alias = "e_above_hull")]
    pub energy_above_hull: Option<f64>,
    /// Electronic band gap in eV
    pub band_gap: Option<f64>,
    /// Formation energy in eV/atom
    pub formation_energy_per_atom: Option<f64>,
    /// Density in g/cm³
    pub density: Option<f64>,
    /// Whether the material is metallic
    pub is_metal: Option<bool>,
    /// Bulk modulus in GPa
    pub bulk_modulus: Option<f64>,
    /// Shear modulus in GPa
    pub shear_modulus: Option<f64>,
    /// Total magnetization in μB
    pub total_magnetization: Option<f64>,
}

/// Trait for property database backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PropertySource: Send + Sync {
    /// Search for entries matching a chemical formula
    async fn search(&self, formula: &str, properties: &[String]) -> Result<Vec<SourceEntry>>;

    /// Source name for metrics/logging
    fn name(&self) -> &str;
}

/// Type alias for a shared property source
pub type BoxedPropertySource = Arc<dyn PropertySource>;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<SourceEntry>,
}

/// JSON client for a Materials-Project-style summary endpoint
pub struct HttpPropertySource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpPropertySource {
    /// Create a client for the given endpoint
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl PropertySource for HttpPropertySource {
    async fn search(&self, formula: &str, properties: &[String]) -> Result<Vec<SourceEntry>> {
        let url = format!("{}/materials/summary", self.base_url.trim_end_matches('/'));
        let fields = {
            let mut fields = vec!["material_id".to_string(), "formula_pretty".to_string()];
            fields.extend(properties.iter().cloned());
            fields.join(",")
        };

        debug!(formula = formula, "Querying property source");
        let response = self
            .client
            .get(&url)
            .query(&[("formula", formula), ("_fields", fields.as_str())])
            .header("X-API-KEY", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await?;

        Ok(response.data)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Curated in-memory property source
///
/// Entries cover the common electrode formulas so the engine runs without
/// network access; additional entries can be registered per formula.
#[derive(Debug, Clone)]
pub struct StaticPropertySource {
    entries: HashMap<String, Vec<SourceEntry>>,
}

impl StaticPropertySource {
    /// Create a source preloaded with the reference electrode entries
    pub fn new() -> Self {
        let mut entries: HashMap<String, Vec<SourceEntry>> = HashMap::new();

        let mut insert = |formula: &str, entry: SourceEntry| {
            entries.entry(formula.to_string()).or_default().push(entry);
        };

        insert(
            "C",
            SourceEntry {
                material_id: "ref-c-graphite".to_string(),
                formula: "C".to_string(),
                energy_above_hull: Some(0.0),
                band_gap: Some(0.0),
                formation_energy_per_atom: Some(0.0),
                density: Some(2.26),
                is_metal: Some(true),
                ..Default::default()
            },
        );
        insert(
            "Pt",
            SourceEntry {
                material_id: "ref-pt".to_string(),
                formula: "Pt".to_string(),
                energy_above_hull: Some(0.0),
                band_gap: Some(0.0),
                formation_energy_per_atom: Some(0.0),
                density: Some(21.45),
                is_metal: Some(true),
                ..Default::default()
            },
        );
        insert(
            "Ti",
            SourceEntry {
                material_id: "ref-ti".to_string(),
                formula: "Ti".to_string(),
                energy_above_hull: Some(0.0),
                band_gap: Some(0.0),
                formation_energy_per_atom: Some(0.0),
                density: Some(4.51),
                is_metal: Some(true),
                ..Default::default()
            },
        );
        insert(
            "Ni",
            SourceEntry {
                material_id: "ref-ni".to_string(),
                formula: "Ni".to_string(),
                energy_above_hull: Some(0.0),
                band_gap: Some(0.0),
                formation_energy_per_atom: Some(0.0),
                density: Some(8.91),
                is_metal: Some(true),
                ..Default::default()
            },
        );
        insert(
            "Cu",
            SourceEntry {
                material_id: "ref-cu".to_string(),
                formula: "Cu".to_string(),
                energy_above_hull: Some(0.0),
                band_gap: Some(0.0),
                formation_energy_per_atom: Some(0.0),
                density: Some(8.96),
                is_metal: Some(true),
                ..Default::default()
            },
        );
        insert(
            "Ag",
            SourceEntry {
                material_id: "ref-ag".to_string(),
                formula: "Ag".to_string(),
                energy_above_hull: Some(0.0),
                band_gap: Some(0.0),
                formation_energy_per_atom: Some(0.0),
                density: Some(10.49),
                is_metal: Some(true),
                ..Default::default()
            },
        );
        insert(
            "MnO2",
            SourceEntry {
                material_id: "ref-mno2".to_string(),
                formula: "MnO2".to_string(),
                energy_above_hull: Some(0.02),
                band_gap: Some(0.27),
                formation_energy_per_atom: Some(-1.78),
                density: Some(5.03),
                is_metal: Some(false),
                ..Default::default()
            },
        );

        Self { entries }
    }

    /// Register an additional entry for a formula
    pub fn with_entry(mut self, formula: impl Into<String>, entry: SourceEntry) -> Self {
        self.entries.entry(formula.into()).or_default().push(entry);
        self
    }
}

impl Default for StaticPropertySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PropertySource for StaticPropertySource {
    async fn search(&self, formula: &str, _properties: &[String]) -> Result<Vec<SourceEntry>> {
        Ok(self.entries.get(formula).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_known_formula() {
        let source = StaticPropertySource::new();
        let entries = source.search("Pt", &[]).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].is_metal, Some(true));
    }

    #[tokio::test]
    async fn test_static_source_unknown_formula_is_empty() {
        let source = StaticPropertySource::new();
        let entries = source.search("Xx9", &[]).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_with_entry_appends() {
        let source = StaticPropertySource::new().with_entry(
            "C",
            SourceEntry {
                material_id: "ref-c-diamond".to_string(),
                formula: "C".to_string(),
                energy_above_hull: Some(0.14),
                band_gap: Some(5.5),
                ..Default::default()
            },
        );
        let entries = source.search("C", &[]).await.unwrap();
        assert_eq!(entries.len(), 2);
    }
}
