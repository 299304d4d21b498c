//! Material property provider
//!
//! ## Table of Contents
//! - **MaterialsProvider**: Lookup, caching, fallback, scoring, comparison
//! - **Application**: Electrode/membrane application kinds
//! - **MaterialRecommendation**: Scored recommendation with reasoning
//!
//! Lookups resolve a common material name to a chemical formula, query the
//! configured property source, pick the most thermodynamically stable
//! match, derive qualitative conductivity and corrosion labels, and write
//! through to the cache. Every failure path degrades to a hand-curated
//! fallback record; `get` never errors.

pub mod cache;
pub mod source;

use crate::error::{GalvaniError, Result};
use crate::metrics::GalvaniMetrics;
use crate::types::{MaterialRecord, PropertyValue};
use cache::{keys, BoxedPropertyCache, CachedRecord, MemoryCache, PropertyCache};
use futures::future::join_all;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use source::{BoxedPropertySource, PropertySource, SourceEntry};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Properties fetched when the caller does not name a subset
pub const DEFAULT_PROPERTIES: &[&str] = &[
    "band_gap",
    "density",
    "e_above_hull",
    "formation_energy_per_atom",
    "bulk_modulus",
    "shear_modulus",
    "total_magnetization",
    "is_metal",
];

/// Fixed property set used by material comparison matrices
pub const COMPARISON_PROPERTIES: &[&str] = &[
    "electrical_conductivity",
    "corrosion_resistance",
    "cost",
    "band_gap",
    "density",
    "formation_energy_per_atom",
];

const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

lazy_static! {
    /// Common electrode/membrane names mapped to chemical formulas.
    /// Polymers carry no formula and resolve from the fallback table.
    static ref COMMON_MATERIALS: HashMap<&'static str, Option<&'static str>> = {
        let mut m = HashMap::new();
        m.insert("carbon_cloth", Some("C"));
        m.insert("carbon_felt", Some("C"));
        m.insert("carbon_brush", Some("C"));
        m.insert("graphite", Some("C"));
        m.insert("stainless_steel", Some("Fe0.7Cr0.2Ni0.1"));
        m.insert("carbon_nanotubes", Some("C"));
        m.insert("graphene", Some("C"));
        m.insert("titanium", Some("Ti"));
        m.insert("platinum", Some("Pt"));
        m.insert("platinum_carbon", Some("Pt"));
        m.insert("mno2", Some("MnO2"));
        m.insert("activated_carbon", Some("C"));
        m.insert("copper", Some("Cu"));
        m.insert("nickel", Some("Ni"));
        m.insert("silver", Some("Ag"));
        m.insert("nafion", None);
        m.insert("pem", None);
        m.insert("cation_exchange", None);
        m.insert("anion_exchange", None);
        m
    };

    static ref FALLBACK_PROPERTIES: HashMap<&'static str, Vec<(&'static str, &'static str)>> = {
        let mut m = HashMap::new();
        m.insert("carbon_cloth", vec![
            ("electrical_conductivity", "high"),
            ("corrosion_resistance", "high"),
            ("surface_area", "high"),
            ("biocompatibility", "excellent"),
            ("cost", "low"),
        ]);
        m.insert("carbon_felt", vec![
            ("electrical_conductivity", "moderate"),
            ("corrosion_resistance", "high"),
            ("surface_area", "very_high"),
            ("biocompatibility", "excellent"),
            ("cost", "low"),
        ]);
        m.insert("platinum", vec![
            ("electrical_conductivity", "very_high"),
            ("corrosion_resistance", "excellent"),
            ("catalytic_activity", "excellent"),
            ("cost", "very_high"),
        ]);
        m.insert("nafion", vec![
            ("proton_conductivity", "high"),
            ("water_uptake", "moderate"),
            ("chemical_stability", "excellent"),
            ("temperature_range", "0-80°C"),
            ("cost", "high"),
        ]);
        m
    };

}

/// Application a material is recommended or scored for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Application {
    /// Anode electrode
    Anode,
    /// Cathode electrode
    Cathode,
    /// Separator membrane
    Membrane,
}

impl Application {
    fn candidates(&self) -> &'static [&'static str] {
        match self {
            Application::Anode => &["carbon_cloth", "carbon_felt", "graphite", "stainless_steel"],
            Application::Cathode => &["platinum", "mno2", "activated_carbon", "carbon_cloth"],
            Application::Membrane => &["nafion", "pem", "cation_exchange"],
        }
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Application::Anode => "anode",
            Application::Cathode => "cathode",
            Application::Membrane => "membrane",
        };
        write!(f, "{}", name)
    }
}

/// Constraints applied when scoring recommendations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraints {
    /// Maximum acceptable cost label
    pub max_cost: Option<String>,
    /// Minimum acceptable conductivity label
    pub min_conductivity: Option<String>,
}

/// Scored material recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialRecommendation {
    /// Material name
    pub material: String,
    /// Resolved property record
    pub record: MaterialRecord,
    /// Suitability score (0.0 - 1.0)
    pub score: f64,
    /// Why the material suits the application
    pub reasoning: String,
}

/// Application-specific note attached to a comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonNote {
    /// Summary message
    pub message: String,
    /// Supporting reasoning
    pub reasoning: String,
}

/// Side-by-side material comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialComparison {
    /// Resolved records by material name
    pub materials: BTreeMap<String, MaterialRecord>,
    /// Property → material → rendered value ("N/A" when unavailable)
    pub matrix: BTreeMap<String, BTreeMap<String, String>>,
    /// Application-specific notes
    pub recommendations: Vec<ComparisonNote>,
}

/// Resolves material names to property records with caching and fallback
pub struct MaterialsProvider {
    source: BoxedPropertySource,
    cache: BoxedPropertyCache,
    cache_ttl: Duration,
    lookup_timeout: Duration,
    metrics: Option<Arc<GalvaniMetrics>>,
}

impl MaterialsProvider {
    /// Create a provider over a property source with an in-memory cache
    pub fn new(source: BoxedPropertySource) -> Self {
        Self {
            source,
            cache: Arc::new(MemoryCache::new()),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            lookup_timeout: Duration::from_secs(10),
            metrics: None,
        }
    }

    /// Use a custom cache backend
    pub fn with_cache(mut self, cache: BoxedPropertyCache) -> Self {
        self.cache = cache;
        self
    }

    /// Set the cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the source call timeout
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Record cache hits/misses on the given metrics registry
    pub fn with_metrics(mut self, metrics: Arc<GalvaniMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resolve a material name to a property record
    ///
    /// Never fails: any lookup error or unmapped material degrades to the
    /// curated fallback record for that name.
    pub async fn get(&self, name: &str, properties: Option<&[String]>) -> MaterialRecord {
        let requested: Vec<String> = match properties {
            Some(props) => props.to_vec(),
            None => DEFAULT_PROPERTIES.iter().map(|p| p.to_string()).collect(),
        };

        match self.try_fetch(name, &requested).await {
            Ok(record) => record,
            Err(err) => {
                warn!(material = name, error = %err, "Property lookup failed, using fallback");
                self.fallback_record(name)
            }
        }
    }

    async fn try_fetch(&self, name: &str, requested: &[String]) -> Result<MaterialRecord> {
        let normalized = normalize(name);
        let key = keys::material(&normalized, requested);

        if let Some(cached) = self.cache.get(&key).await? {
            debug!(material = %normalized, "Cache hit");
            if let Some(metrics) = &self.metrics {
                metrics.record_cache(true);
            }
            return Ok(cached.record);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_cache(false);
        }

        let formula = match COMMON_MATERIALS.get(normalized.as_str()) {
            Some(Some(formula)) => formula.to_string(),
            // Polymers and other non-crystalline materials only exist in
            // the fallback table.
            Some(None) => return Ok(self.fallback_record(name)),
            None => name.to_string(),
        };

        debug!(material = %normalized, formula = %formula, "Querying property source");
        let entries = tokio::time::timeout(
            self.lookup_timeout,
            self.source.search(&formula, requested),
        )
        .await
        .map_err(|_| {
            GalvaniError::lookup(format!(
                "property source timed out after {:?}",
                self.lookup_timeout
            ))
        })??;

        if entries.is_empty() {
            return Ok(self.fallback_record(name));
        }

        // Most thermodynamically stable match wins.
        let best = entries
            .iter()
            .min_by(|a, b| {
                let ea = a.energy_above_hull.unwrap_or(f64::INFINITY);
                let eb = b.energy_above_hull.unwrap_or(f64::INFINITY);
                ea.partial_cmp(&eb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("entries is non-empty, checked above");

        let record = self.build_record(best, requested);
        let cached = CachedRecord::new(record.clone(), self.cache_ttl.as_secs());
        if let Err(err) = self.cache.put(&key, cached).await {
            warn!(material = %normalized, error = %err, "Cache write failed");
        }

        Ok(record)
    }

    fn build_record(&self, entry: &SourceEntry, requested: &[String]) -> MaterialRecord {
        let mut properties = BTreeMap::new();
        for name in requested {
            if let Some(value) = entry_property(entry, name) {
                properties.insert(name.clone(), value);
            }
        }
        properties.insert(
            "electrical_conductivity".to_string(),
            PropertyValue::Label(estimate_conductivity(entry).to_string()),
        );
        properties.insert(
            "corrosion_resistance".to_string(),
            PropertyValue::Label(estimate_corrosion_resistance(entry).to_string()),
        );

        MaterialRecord {
            material_id: entry.material_id.clone(),
            formula: entry.formula.clone(),
            properties,
            from_fallback: false,
        }
    }

    fn fallback_record(&self, name: &str) -> MaterialRecord {
        let normalized = normalize(name);
        let mut properties = BTreeMap::new();

        match FALLBACK_PROPERTIES.get(normalized.as_str()) {
            Some(defaults) => {
                for (key, value) in defaults {
                    properties.insert(key.to_string(), PropertyValue::Label(value.to_string()));
                }
            }
            None => {
                for key in ["electrical_conductivity", "corrosion_resistance", "cost"] {
                    properties.insert(key.to_string(), PropertyValue::Label("unknown".to_string()));
                }
            }
        }

        MaterialRecord {
            material_id: format!("custom_{}", normalized),
            formula: name.to_string(),
            properties,
            from_fallback: true,
        }
    }

    /// Rank candidate materials for an application
    ///
    /// Returns at most five recommendations, sorted by descending score.
    pub async fn recommend(
        &self,
        application: Application,
        constraints: Option<&Constraints>,
    ) -> Vec<MaterialRecommendation> {
        let candidates = application.candidates();
        let records = join_all(candidates.iter().map(|name| self.get(name, None))).await;

        let mut recommendations: Vec<MaterialRecommendation> = candidates
            .iter()
            .zip(records)
            .map(|(name, record)| {
                let score = score_material(&record, application, constraints);
                MaterialRecommendation {
                    material: name.to_string(),
                    reasoning: reasoning_for(name, application),
                    record,
                    score,
                }
            })
            .collect();

        recommendations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        recommendations.truncate(5);
        recommendations
    }

    /// Compare 2-10 materials over the fixed property set
    pub async fn compare(
        &self,
        materials: &[String],
        application: Option<Application>,
    ) -> Result<MaterialComparison> {
        if materials.len() < 2 {
            return Err(GalvaniError::validation(
                "at least 2 materials required for comparison",
            ));
        }
        if materials.len() > 10 {
            return Err(GalvaniError::validation(
                "maximum 10 materials for comparison",
            ));
        }

        let records = join_all(materials.iter().map(|name| self.get(name, None))).await;
        let materials_by_name: BTreeMap<String, MaterialRecord> = materials
            .iter()
            .cloned()
            .zip(records)
            .collect();

        let mut matrix = BTreeMap::new();
        for property in COMPARISON_PROPERTIES {
            let mut row = BTreeMap::new();
            for (name, record) in &materials_by_name {
                let rendered = record
                    .property(property)
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                row.insert(name.clone(), rendered);
            }
            matrix.insert(property.to_string(), row);
        }

        let mut recommendations = Vec::new();
        if let Some(application) = application {
            if let Some((best, _)) = materials_by_name
                .iter()
                .map(|(name, record)| (name, score_material(record, application, None)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            {
                recommendations.push(ComparisonNote {
                    message: format!(
                        "For {} applications, {} appears most suitable",
                        application, best
                    ),
                    reasoning: reasoning_for(best, application),
                });
            }
        }

        Ok(MaterialComparison {
            materials: materials_by_name,
            matrix,
            recommendations,
        })
    }
}

fn normalize(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

fn entry_property(entry: &SourceEntry, name: &str) -> Option<PropertyValue> {
    match name {
        "band_gap" => entry.band_gap.map(PropertyValue::Number),
        "density" => entry.density.map(PropertyValue::Number),
        "e_above_hull" => entry.energy_above_hull.map(PropertyValue::Number),
        "formation_energy_per_atom" => entry.formation_energy_per_atom.map(PropertyValue::Number),
        "bulk_modulus" => entry.bulk_modulus.map(PropertyValue::Number),
        "shear_modulus" => entry.shear_modulus.map(PropertyValue::Number),
        "total_magnetization" => entry.total_magnetization.map(PropertyValue::Number),
        "is_metal" => entry.is_metal.map(PropertyValue::Flag),
        _ => None,
    }
}

/// Qualitative conductivity from the metallicity flag or band gap
fn estimate_conductivity(entry: &SourceEntry) -> &'static str {
    if entry.is_metal == Some(true) {
        return "high";
    }
    match entry.band_gap {
        Some(gap) if gap == 0.0 => "high",
        Some(gap) if gap < 1.5 => "moderate",
        Some(_) => "low",
        None => "unknown",
    }
}

/// Qualitative corrosion resistance from formation energy per atom
fn estimate_corrosion_resistance(entry: &SourceEntry) -> &'static str {
    match entry.formation_energy_per_atom {
        Some(energy) if energy < -2.0 => "high",
        Some(energy) if energy < -1.0 => "moderate",
        Some(_) => "low",
        None => "unknown",
    }
}

/// Score a material record for an application
pub fn score_material(
    record: &MaterialRecord,
    application: Application,
    constraints: Option<&Constraints>,
) -> f64 {
    let mut score: f64 = 0.5;
    let conductivity = record.label("electrical_conductivity");

    match application {
        Application::Anode => {
            if conductivity == "high" {
                score += 0.2;
            }
            if record.label("biocompatibility") == "excellent" {
                score += 0.2;
            }
            if matches!(record.label("surface_area"), "high" | "very_high") {
                score += 0.1;
            }
        }
        Application::Cathode => {
            if matches!(conductivity, "high" | "very_high") {
                score += 0.2;
            }
            if record.label("catalytic_activity") == "excellent" {
                score += 0.3;
            }
        }
        Application::Membrane => {}
    }

    if let Some(constraints) = constraints {
        if constraints.max_cost.as_deref() == Some("low") && record.label("cost") == "low" {
            score += 0.1;
        }
        if constraints.min_conductivity.is_some() && conductivity == "high" {
            score += 0.1;
        }
    }

    score.min(1.0)
}

/// Static reasoning text keyed by (material, application)
fn reasoning_for(material: &str, application: Application) -> String {
    let known = match (normalize(material).as_str(), application) {
        ("carbon_cloth", Application::Anode) => Some(
            "Excellent biocompatibility, high surface area, and low cost make it ideal for microbial colonization",
        ),
        ("carbon_felt", Application::Anode) => {
            Some("Very high surface area provides maximum biofilm attachment sites")
        }
        ("platinum", Application::Cathode) => {
            Some("Superior catalytic activity for oxygen reduction reaction, though expensive")
        }
        ("mno2", Application::Cathode) => {
            Some("Cost-effective catalyst with good performance in neutral pH conditions")
        }
        ("nafion", Application::Membrane) => {
            Some("Industry standard proton exchange membrane with excellent stability")
        }
        _ => None,
    };

    known
        .map(str::to_string)
        .unwrap_or_else(|| format!("Suitable material for {} applications", application))
}
