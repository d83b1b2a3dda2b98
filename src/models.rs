//! Data models for the hazard report.
//!
//! This module contains the input records (area of interest, hazard
//! sources), the typed rows returned by the report tables, and the
//! finished lookup bundle handed to report rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Spatial reference of a polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

/// Polygon in Esri JSON form (rings of `[x, y]` pairs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polygon {
    pub rings: Vec<Vec<[f64; 2]>>,
    pub spatial_reference: SpatialReference,
}

/// The area a report is generated for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaOfInterest {
    /// Human-readable description shown on the cover page.
    pub description: String,
    pub polygon: Polygon,
}

/// One configured feature service to intersect against the AOI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HazardSource {
    /// Absolute URL or a path relative to the service base URL.
    pub path: String,
    /// Three-letter hazard code, e.g. `FLH`.
    pub hazard_code: String,
}

impl HazardSource {
    pub fn new(path: impl Into<String>, hazard_code: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hazard_code: hazard_code.into(),
        }
    }

    /// Identifier used for progress tracking.
    pub fn progress_id(&self) -> String {
        format!("{} ({})", self.hazard_code, self.path)
    }

    /// Name of the attribute field holding unit codes on this layer.
    pub fn unit_field(&self) -> String {
        format!("{}HazardUnit", self.hazard_code)
    }
}

impl fmt::Display for HazardSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.progress_id())
    }
}

/// Result of intersecting one source with the AOI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardInfo {
    pub url: String,
    pub hazard_code: String,
    /// Unit codes present in the AOI; may contain duplicates.
    pub units: Vec<String>,
}

impl HazardInfo {
    pub fn has_units(&self) -> bool {
        !self.units.is_empty()
    }
}

/// Derive the hazard code from a unit code: its last three characters,
/// upper-cased. Shorter inputs are upper-cased whole.
pub fn hazard_code_of(unit_code: &str) -> String {
    let count = unit_code.chars().count();
    let suffix: String = unit_code.chars().skip(count.saturating_sub(3)).collect();
    suffix.to_uppercase()
}

/// Row of the hazard groupings table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupingRow {
    #[serde(default)]
    pub hazard_code: Option<String>,
    #[serde(default)]
    pub hazard_group: Option<String>,
}

/// Row of the hazard group text table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupTextRow {
    #[serde(default)]
    pub hazard_group: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Row of the intro-text or reference-text tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HazardTextRow {
    #[serde(default)]
    pub hazard: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Row of the hazard unit text table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnitTextRow {
    #[serde(default)]
    pub hazard_unit: Option<String>,
    #[serde(default)]
    pub hazard_name: Option<String>,
    #[serde(default)]
    pub how_to_use: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit_name: Option<String>,
}

/// Row of the static report text table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportTextRow {
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Row of the "other data" table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherDataRow {
    #[serde(rename = "Data", default)]
    pub data: Option<String>,
    #[serde(rename = "Introduction", default)]
    pub introduction: Option<String>,
    #[serde(rename = "HowToUse", default)]
    pub how_to_use: Option<String>,
    #[serde(rename = "References_", default)]
    pub references: Option<String>,
}

/// Display fields of one hazard unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub name: String,
    pub how_to_use: String,
    pub description: String,
    pub unit_code: String,
    pub category: String,
}

impl From<&UnitTextRow> for UnitDescriptor {
    fn from(row: &UnitTextRow) -> Self {
        Self {
            name: row.hazard_name.clone().unwrap_or_default(),
            how_to_use: row.how_to_use.clone().unwrap_or_default(),
            description: row.description.clone().unwrap_or_default(),
            unit_code: row.hazard_unit.clone().unwrap_or_default(),
            category: row.unit_name.clone().unwrap_or_default(),
        }
    }
}

/// Groups and their hazard codes, in report section order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderedGroups {
    entries: Vec<(String, Vec<String>)>,
}

impl OrderedGroups {
    /// Add an empty group; no-op if already present.
    pub fn insert_group(&mut self, group: &str) {
        if !self.contains(group) {
            self.entries.push((group.to_string(), Vec::new()));
        }
    }

    pub fn contains(&self, group: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == group)
    }

    /// Append a hazard code to a group, creating the group at the end if needed.
    pub fn push_code(&mut self, group: &str, hazard_code: &str) {
        self.insert_group(group);
        if let Some((_, codes)) = self.entries.iter_mut().find(|(name, _)| name == group) {
            codes.push(hazard_code.to_string());
        }
    }

    #[cfg(test)]
    pub fn get(&self, group: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(name, _)| name == group)
            .map(|(_, codes)| codes.as_slice())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, codes)| (name.as_str(), codes.as_slice()))
    }

    /// Whether any group lists the hazard code.
    pub fn contains_code(&self, hazard_code: &str) -> bool {
        self.entries
            .iter()
            .any(|(_, codes)| codes.iter().any(|c| c == hazard_code))
    }
}

/// Everything report rendering needs for one AOI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportData {
    pub group_to_hazard_codes: OrderedGroups,
    pub hazard_code_to_units: HashMap<String, Vec<UnitDescriptor>>,
    pub group_to_text: HashMap<String, String>,
    pub section_to_text: HashMap<String, String>,
    /// Group names in display order.
    pub group_order: Vec<String>,
    pub intro_text: Vec<HazardTextRow>,
    pub references: Vec<HazardTextRow>,
    pub other_data: HashMap<String, OtherDataRow>,
    /// Sources that returned at least one unit (map layers to draw).
    pub sources_with_results: Vec<HazardSource>,
}

impl ReportData {
    /// Intro text of a hazard: first matching row, or empty.
    pub fn intro_text_for(&self, hazard_code: &str) -> &str {
        self.intro_text
            .iter()
            .find(|row| row.hazard.as_deref() == Some(hazard_code))
            .and_then(|row| row.text.as_deref())
            .unwrap_or("")
    }

    /// Reference texts for a hazard, in table order.
    pub fn references_for(&self, hazard_code: &str) -> Vec<&str> {
        self.references
            .iter()
            .filter(|row| row.hazard.as_deref() == Some(hazard_code))
            .filter_map(|row| row.text.as_deref())
            .collect()
    }

    /// Name of a hazard, taken from its first unit.
    pub fn hazard_name_for(&self, hazard_code: &str) -> Option<&str> {
        self.hazard_code_to_units
            .get(hazard_code)
            .and_then(|units| units.first())
            .map(|unit| unit.name.as_str())
    }

    /// Unit descriptors flattened in group display order.
    pub fn summary_rows(&self) -> Vec<&UnitDescriptor> {
        self.group_to_hazard_codes
            .iter()
            .flat_map(|(_, codes)| codes.iter())
            .filter_map(|code| self.hazard_code_to_units.get(code))
            .flat_map(|units| units.iter())
            .collect()
    }

    pub fn section_text(&self, section: &str) -> &str {
        self.section_to_text
            .get(section)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Metadata about one generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Description of the area of interest.
    pub aoi_description: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of hazard sources queried.
    pub sources_queried: usize,
    /// Number of sources with at least one unit in the AOI.
    pub sources_with_results: usize,
    /// Number of distinct hazards described.
    pub hazards_found: usize,
    /// Duration of the aggregation in seconds.
    pub duration_seconds: f64,
}

/// The complete hazard report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub data: ReportData,
}
