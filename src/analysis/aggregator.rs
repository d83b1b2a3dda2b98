//! Lookup map building.
//!
//! Pure folds from the raw table rows into the keyed maps consumed by
//! report rendering. Nothing here touches the network.

use crate::models::{
    hazard_code_of, GroupTextRow, GroupingRow, HazardInfo, HazardSource, HazardTextRow,
    OrderedGroups, OtherDataRow, ReportData, ReportTextRow, UnitDescriptor, UnitTextRow,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::warn;

/// Raw rows gathered by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct LookupRows {
    pub groupings: Vec<GroupingRow>,
    pub group_text: Vec<GroupTextRow>,
    pub intro_text: Vec<HazardTextRow>,
    pub unit_text: Vec<UnitTextRow>,
    pub references: Vec<HazardTextRow>,
    pub report_text: Vec<ReportTextRow>,
    pub other_data: Vec<OtherDataRow>,
    pub sources_with_results: Vec<HazardSource>,
}

/// Union of the unit codes of every source, deduplicated and sorted.
pub fn distinct_unit_codes(infos: &[HazardInfo]) -> Vec<String> {
    infos
        .iter()
        .filter(|info| info.has_units())
        .flat_map(|info| info.units.iter().cloned())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// Hazard codes of the given unit codes, deduplicated and sorted.
pub fn distinct_hazard_codes(unit_codes: &[String]) -> Vec<String> {
    unit_codes
        .iter()
        .map(|unit| hazard_code_of(unit))
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// Group names in the order first seen in the grouping rows.
pub fn distinct_groups(groupings: &[GroupingRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut groups = Vec::new();
    for group in groupings.iter().filter_map(|row| row.hazard_group.as_deref()) {
        if seen.insert(group) {
            groups.push(group.to_string());
        }
    }
    groups
}

/// Group name -> display text. Later rows win.
pub fn group_to_text(rows: &[GroupTextRow]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for row in rows {
        let Some(ref group) = row.hazard_group else {
            warn!("Skipping group text row without a HazardGroup");
            continue;
        };
        map.insert(group.clone(), row.text.clone().unwrap_or_default());
    }
    map
}

/// Group name -> hazard codes.
///
/// Groups are laid out in group-text row order, which is the report
/// section order. Codes are appended in grouping-row order. A group
/// without a text row is appended after the others.
pub fn group_to_hazard_codes(
    group_text: &[GroupTextRow],
    groupings: &[GroupingRow],
) -> OrderedGroups {
    let mut groups = OrderedGroups::default();
    for group in group_text.iter().filter_map(|row| row.hazard_group.as_deref()) {
        groups.insert_group(group);
    }

    for row in groupings {
        let (Some(group), Some(code)) = (row.hazard_group.as_deref(), row.hazard_code.as_deref())
        else {
            warn!(
                "Skipping incomplete grouping row: code {:?}, group {:?}",
                row.hazard_code, row.hazard_group
            );
            continue;
        };
        if !groups.contains(group) {
            warn!("Hazard group '{}' has no group text row; placing it last", group);
        }
        groups.push_code(group, code);
    }

    groups
}

/// Hazard code -> unit descriptors, in table row order.
pub fn hazard_code_to_units(rows: &[UnitTextRow]) -> HashMap<String, Vec<UnitDescriptor>> {
    let mut map: HashMap<String, Vec<UnitDescriptor>> = HashMap::new();

    for row in rows {
        let Some(ref unit) = row.hazard_unit else {
            warn!("Skipping unit text row without a HazardUnit: {:?}", row.hazard_name);
            continue;
        };
        map.entry(hazard_code_of(unit))
            .or_default()
            .push(UnitDescriptor::from(row));
    }

    map
}

/// Report section -> text. Later rows win.
pub fn section_to_text(rows: &[ReportTextRow]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for row in rows {
        let Some(ref section) = row.section else {
            warn!("Skipping report text row without a Section");
            continue;
        };
        map.insert(section.clone(), row.text.clone().unwrap_or_default());
    }
    map
}

/// "Other data" rows keyed by their `Data` name. Later rows win.
pub fn other_data_map(rows: &[OtherDataRow]) -> HashMap<String, OtherDataRow> {
    let mut map = HashMap::new();
    for row in rows {
        let Some(ref name) = row.data else {
            warn!("Skipping other data row without a Data name");
            continue;
        };
        map.insert(name.clone(), row.clone());
    }
    map
}

/// Hazard codes that have unit descriptions but belong to no group.
/// These are never rendered.
pub fn orphaned_hazard_codes(
    units: &HashMap<String, Vec<UnitDescriptor>>,
    groups: &OrderedGroups,
) -> Vec<String> {
    let mut orphans: Vec<String> = units
        .keys()
        .filter(|code| !groups.contains_code(code))
        .cloned()
        .collect();
    orphans.sort();
    orphans
}

/// Fold every row collection into the finished bundle.
pub fn build_report_data(rows: LookupRows) -> ReportData {
    let group_to_hazard_codes = group_to_hazard_codes(&rows.group_text, &rows.groupings);
    let hazard_code_to_units = hazard_code_to_units(&rows.unit_text);

    let orphans = orphaned_hazard_codes(&hazard_code_to_units, &group_to_hazard_codes);
    if !orphans.is_empty() {
        warn!(
            "Unit descriptions without a hazard group will not be rendered: {}",
            orphans.join(", ")
        );
    }

    ReportData {
        group_order: group_to_hazard_codes.names(),
        group_to_hazard_codes,
        hazard_code_to_units,
        group_to_text: group_to_text(&rows.group_text),
        section_to_text: section_to_text(&rows.report_text),
        intro_text: rows.intro_text,
        references: rows.references,
        other_data: other_data_map(&rows.other_data),
        sources_with_results: rows.sources_with_results,
    }
}
