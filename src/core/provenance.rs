//! Audit records explaining how a room's heat loss figure came about.
//!
//! A [`CalculationProvenance`] is built from the same inputs as the calculation plus its result. It
//! captures a flat snapshot of every input consumed, values that look like they were assumed rather
//! than measured, policy defaults, and warnings. Overrides start empty and are only ever added by
//! the caller, see [`crate::core::overrides`].

use crate::core::analysis::{
    detect_anomalies, HeatLossAnomaly, MAX_EXPECTED_FABRIC_RATIO, MAX_EXPECTED_LOSS_PER_M2,
    MIN_EXPECTED_FABRIC_RATIO, MIN_EXPECTED_LOSS_PER_M2,
};
use crate::core::heat_loss::room::{
    floor_u_value, wall_u_value, window_u_value, HeatLossResult, DEFAULT_AIR_CHANGES_PER_HOUR,
};
use crate::core::heat_loss::temperatures::{
    resolve_design_temperatures, DesignTemperatures, TargetTemperatureSource,
};
use crate::core::lookups::LookupProvider;
use crate::input::{
    BuildingData, ClimateData, DesignConditions, GlazingType, OutsideTemperatureSource, Room,
    DEFAULT_SAFETY_MARGIN, DEFAULT_THERMAL_BRIDGING,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::IntoEnumIterator;
use strum_macros::Display;
use tracing::error;

pub const METHOD: &str = "EN12831_SIMPLIFIED";
/// Bump whenever the heat loss formulas change so stored records stay interpretable.
pub const METHOD_VERSION: &str = "1.0.0";

/// Ceiling height commonly entered when none was measured, in m.
pub const COMMON_CEILING_HEIGHT: f64 = 2.4;
pub const HIGH_TARGET_TEMPERATURE: f64 = 25.;

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CalculationReason {
    #[default]
    InitialCalculation,
    Recalculation,
    InputsChanged,
    ManualOverride,
}

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Warning,
    Info,
}

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WarningCategory {
    Plausibility,
    Comfort,
    Consistency,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Assumption {
    pub code: String,
    pub field: String,
    pub description: String,
    pub impact: Impact,
    pub value: Value,
    pub alternatives: Option<Vec<Value>>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DefaultApplied {
    pub field: String,
    pub value: Value,
    pub source: String,
    pub description: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Warning {
    pub code: String,
    pub severity: Severity,
    pub category: WarningCategory,
    pub message: String,
    pub suggested_fix: String,
    pub affected_fields: Vec<String>,
    pub context: Value,
}

/// A manual adjustment of a calculated or assumed value, recorded by the application.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Override {
    pub field: String,
    pub original_value: Value,
    pub override_value: Value,
    pub reason: String,
    pub overridden_by: String,
    pub overridden_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CalculationProvenance {
    pub method: String,
    pub method_version: String,
    pub inputs_snapshot: IndexMap<String, Value>,
    pub assumptions: Vec<Assumption>,
    pub defaults_applied: Vec<DefaultApplied>,
    pub overrides: Vec<Override>,
    pub warnings: Vec<Warning>,
    pub calculated_at: DateTime<Utc>,
    pub reason: CalculationReason,
}

impl CalculationProvenance {
    pub fn with_override(mut self, record: Override) -> Self {
        self.overrides.push(record);
        self
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings
            .iter()
            .any(|warning| warning.severity == Severity::Warning)
    }
}

pub fn build_heat_loss_provenance(
    room: &Room,
    building: &BuildingData,
    climate: &ClimateData,
    design_conditions: &DesignConditions,
    lookups: &impl LookupProvider,
    result: &HeatLossResult,
    reason: CalculationReason,
) -> CalculationProvenance {
    let temperatures = resolve_design_temperatures(room, climate, design_conditions, lookups);

    let mut warnings = vec![];
    if !is_close!(temperatures.delta_t, result.delta_t, abs_tol = 1e-9) {
        error!(
            room = room.id.as_str(),
            recorded = result.delta_t,
            resolved = temperatures.delta_t,
            "Provenance temperature difference does not match the calculation"
        );
        warnings.push(delta_t_mismatch_warning(&temperatures, result));
    }
    warnings.extend(
        detect_anomalies(result, room)
            .iter()
            .map(|anomaly| anomaly_warning(anomaly, result)),
    );
    if temperatures.target > HIGH_TARGET_TEMPERATURE {
        warnings.push(high_target_temperature_warning(room, &temperatures));
    }

    CalculationProvenance {
        method: METHOD.to_string(),
        method_version: METHOD_VERSION.to_string(),
        inputs_snapshot: snapshot_with_temperatures(
            room,
            building,
            climate,
            design_conditions,
            lookups,
            &temperatures,
        ),
        assumptions: detect_assumptions(room, building, design_conditions, lookups),
        defaults_applied: defaults_applied(room, climate, design_conditions, &temperatures),
        overrides: vec![],
        warnings,
        calculated_at: result.calculated_at,
        reason,
    }
}

/// Flat capture of every input value the calculation consumes for a room.
pub fn snapshot_inputs(
    room: &Room,
    building: &BuildingData,
    climate: &ClimateData,
    design_conditions: &DesignConditions,
    lookups: &impl LookupProvider,
) -> IndexMap<String, Value> {
    let temperatures = resolve_design_temperatures(room, climate, design_conditions, lookups);
    snapshot_with_temperatures(
        room,
        building,
        climate,
        design_conditions,
        lookups,
        &temperatures,
    )
}

fn snapshot_with_temperatures(
    room: &Room,
    building: &BuildingData,
    climate: &ClimateData,
    design_conditions: &DesignConditions,
    lookups: &impl LookupProvider,
    temperatures: &DesignTemperatures,
) -> IndexMap<String, Value> {
    let mut snapshot: IndexMap<String, Value> = IndexMap::new();
    let mut put = |key: String, value: Value| {
        snapshot.insert(key, value);
    };

    put("room.id".into(), json!(room.id));
    put("room.name".into(), json!(room.name));
    put("room.type".into(), json!(room.room_type));
    put("room.area".into(), json!(room.area));
    put("room.volume".into(), json!(room.volume));
    put("room.ceiling_height".into(), json!(room.ceiling_height));
    put("room.perimeter".into(), json!(room.perimeter));
    put("room.target_temperature".into(), json!(temperatures.target));
    put(
        "room.target_temperature_source".into(),
        json!(temperatures.target_source),
    );

    put(
        "climate.outside_design_temp".into(),
        json!(climate.outside_design_temp),
    );
    put(
        "climate.outside_design_temp_source".into(),
        json!(climate.outside_design_temp_source),
    );
    put("climate.postcode".into(), json!(climate.postcode));
    put("climate.region".into(), json!(climate.region));
    put("climate.wind_speed".into(), json!(climate.wind_speed));
    put("climate.altitude".into(), json!(climate.altitude));
    put("delta_t".into(), json!(temperatures.delta_t));

    put(
        "building.air_changes_per_hour".into(),
        json!(building
            .air_changes_per_hour
            .unwrap_or(DEFAULT_AIR_CHANGES_PER_HOUR)),
    );
    put(
        "building.air_changes_per_hour_given".into(),
        json!(building.air_changes_per_hour.is_some()),
    );
    put("building.wall_u_value".into(), json!(building.wall_u_value));
    put("building.roof_u_value".into(), json!(building.roof_u_value));
    put("building.floor_u_value".into(), json!(building.floor_u_value));
    put(
        "building.wall_construction".into(),
        json!(building.wall_construction),
    );
    put(
        "building.roof_construction".into(),
        json!(building.roof_construction),
    );
    put(
        "building.floor_construction".into(),
        json!(building.floor_construction),
    );
    put(
        "building.construction_year".into(),
        json!(building.construction_year),
    );

    let floor = floor_u_value(building, lookups);
    put("floor.u_value".into(), json!(floor.value));
    put("floor.u_value_source".into(), json!(floor.source));

    for wall in &room.walls {
        let prefix = format!("walls.{}", wall.id);
        put(format!("{prefix}.length"), json!(wall.length));
        put(format!("{prefix}.height"), json!(wall.height));
        put(format!("{prefix}.is_external"), json!(wall.is_external));
        if wall.is_external {
            let u_value = wall_u_value(wall, building, lookups);
            put(format!("{prefix}.u_value"), json!(u_value.value));
            put(format!("{prefix}.u_value_source"), json!(u_value.source));
        }
    }

    for window in &room.windows {
        let prefix = format!("windows.{}", window.id);
        let u_value = window_u_value(window, lookups);
        put(format!("{prefix}.width"), json!(window.width));
        put(format!("{prefix}.height"), json!(window.height));
        put(format!("{prefix}.wall_id"), json!(window.wall_id));
        put(format!("{prefix}.glazing_type"), json!(window.glazing_type));
        put(format!("{prefix}.u_value"), json!(u_value.value));
        put(format!("{prefix}.u_value_source"), json!(u_value.source));
    }

    for door in &room.doors {
        let prefix = format!("doors.{}", door.id);
        put(format!("{prefix}.width"), json!(door.width));
        put(format!("{prefix}.height"), json!(door.height));
        put(format!("{prefix}.wall_id"), json!(door.wall_id));
        put(format!("{prefix}.is_external"), json!(door.is_external));
        put(format!("{prefix}.u_value"), json!(door.u_value));
    }

    put(
        "design_conditions.safety_margin".into(),
        json!(design_conditions.safety_margin),
    );
    put(
        "design_conditions.thermal_bridging".into(),
        json!(design_conditions.thermal_bridging),
    );
    put(
        "design_conditions.infiltration_rate".into(),
        json!(design_conditions.infiltration_rate),
    );
    put(
        "design_conditions.flow_temperature".into(),
        json!(design_conditions.flow_temperature),
    );

    snapshot
}

/// Values that look defaulted rather than deliberately chosen.
///
/// Detection compares against the magnitudes defaults are usually entered as, so a user who really
/// did measure e.g. 1.0 air changes per hour is reported too.
fn detect_assumptions(
    room: &Room,
    building: &BuildingData,
    design_conditions: &DesignConditions,
    lookups: &impl LookupProvider,
) -> Vec<Assumption> {
    let mut assumptions = vec![];

    match building.air_changes_per_hour {
        None => assumptions.push(air_change_assumption(format!(
            "No air change rate was given so {DEFAULT_AIR_CHANGES_PER_HOUR} ACH was assumed"
        ))),
        Some(ach) if ach == DEFAULT_AIR_CHANGES_PER_HOUR => {
            assumptions.push(air_change_assumption(format!(
                "Air change rate of {ach} ACH matches the usual default and may not have been measured"
            )))
        }
        Some(_) => {}
    }

    let inferred_walls = room
        .walls
        .iter()
        .filter(|wall| wall.is_external && wall.u_value.is_none())
        .collect_vec();
    if let (Some(wall), None) = (inferred_walls.first(), building.wall_u_value) {
        let u_value = wall_u_value(wall, building, lookups).value;
        let wall_ids = inferred_walls.iter().map(|wall| wall.id.as_str()).join(", ");
        match &building.wall_construction {
            Some(construction) => assumptions.push(Assumption {
                code: "WALL_U_VALUE_FROM_CONSTRUCTION".to_string(),
                field: "building.wall_u_value".to_string(),
                description: format!(
                    "Wall U-value of {u_value} W/m²K inferred from construction type '{construction}' for {wall_ids}"
                ),
                impact: Impact::Medium,
                value: json!(u_value),
                alternatives: None,
            }),
            None => assumptions.push(Assumption {
                code: "WALL_U_VALUE_FALLBACK".to_string(),
                field: "building.wall_u_value".to_string(),
                description: format!(
                    "No wall U-value or construction type was given; {u_value} W/m²K assumed for {wall_ids}"
                ),
                impact: Impact::High,
                value: json!(u_value),
                alternatives: Some(construction_alternatives(lookups, &WALL_ALTERNATIVES)),
            }),
        }
    }

    if building.floor_u_value.is_none() && building.floor_construction.is_none() {
        let u_value = floor_u_value(building, lookups).value;
        assumptions.push(Assumption {
            code: "FLOOR_U_VALUE_FALLBACK".to_string(),
            field: "building.floor_u_value".to_string(),
            description: format!(
                "No floor U-value or construction type was given; {u_value} W/m²K assumed"
            ),
            impact: Impact::High,
            value: json!(u_value),
            alternatives: Some(construction_alternatives(lookups, &FLOOR_ALTERNATIVES)),
        });
    }

    match room.ceiling_height {
        None => assumptions.push(ceiling_height_assumption(
            format!("No ceiling height was given; {COMMON_CEILING_HEIGHT} m is typical"),
            Value::Null,
        )),
        Some(height) if height == COMMON_CEILING_HEIGHT => {
            assumptions.push(ceiling_height_assumption(
                format!("Ceiling height of {height} m matches the usual default and may not have been measured"),
                json!(height),
            ))
        }
        Some(_) => {}
    }

    if design_conditions.thermal_bridging == DEFAULT_THERMAL_BRIDGING {
        assumptions.push(Assumption {
            code: "THERMAL_BRIDGING_DEFAULT".to_string(),
            field: "design_conditions.thermal_bridging".to_string(),
            description: format!(
                "Thermal bridging Y-value of {DEFAULT_THERMAL_BRIDGING} W/m²K is the default for unassessed junctions"
            ),
            impact: Impact::Low,
            value: json!(design_conditions.thermal_bridging),
            alternatives: Some(vec![json!(0.08), json!(0.1), json!(0.25)]),
        });
    }

    for window in room.windows.iter().filter(|window| window.u_value.is_none()) {
        let u_value = lookups.u_value_for_glazing(window.glazing_type);
        assumptions.push(Assumption {
            code: "WINDOW_U_VALUE_FROM_GLAZING".to_string(),
            field: format!("windows.{}.u_value", window.id),
            description: format!(
                "Window '{}' has no U-value; {u_value} W/m²K assumed for {} glazing",
                window.id, window.glazing_type
            ),
            impact: Impact::Medium,
            value: json!(u_value),
            alternatives: Some(
                GlazingType::iter()
                    .filter(|glazing_type| *glazing_type != window.glazing_type)
                    .map(|glazing_type| json!(lookups.u_value_for_glazing(glazing_type)))
                    .collect(),
            ),
        });
    }

    assumptions
}

const WALL_ALTERNATIVES: [&str; 4] = [
    "cavity_unfilled",
    "cavity_filled",
    "timber_frame",
    "insulated_modern",
];
const FLOOR_ALTERNATIVES: [&str; 3] = ["solid_uninsulated", "suspended_timber", "solid_insulated"];

fn construction_alternatives(lookups: &impl LookupProvider, constructions: &[&str]) -> Vec<Value> {
    constructions
        .iter()
        .map(|construction| json!(lookups.u_value_for_construction(construction)))
        .collect()
}

fn air_change_assumption(description: String) -> Assumption {
    Assumption {
        code: "AIR_CHANGE_RATE_ASSUMED".to_string(),
        field: "building.air_changes_per_hour".to_string(),
        description,
        impact: Impact::Medium,
        value: json!(DEFAULT_AIR_CHANGES_PER_HOUR),
        alternatives: Some(vec![json!(0.5), json!(1.5), json!(2.0)]),
    }
}

fn ceiling_height_assumption(description: String, value: Value) -> Assumption {
    Assumption {
        code: "CEILING_HEIGHT_ASSUMED".to_string(),
        field: "room.ceiling_height".to_string(),
        description,
        impact: Impact::Low,
        value,
        alternatives: Some(vec![json!(2.3), json!(2.5), json!(2.7)]),
    }
}

fn defaults_applied(
    room: &Room,
    climate: &ClimateData,
    design_conditions: &DesignConditions,
    temperatures: &DesignTemperatures,
) -> Vec<DefaultApplied> {
    let mut defaults = vec![];

    let target_source = match temperatures.target_source {
        TargetTemperatureSource::Room => None,
        TargetTemperatureSource::DesignConditions => Some("design_conditions.room_temperatures"),
        TargetTemperatureSource::RoomTypeLookup => Some("room_type_lookup"),
    };
    if let Some(source) = target_source {
        defaults.push(DefaultApplied {
            field: "room.target_temperature".to_string(),
            value: json!(temperatures.target),
            source: source.to_string(),
            description: format!(
                "Design temperature of {}°C for a {} taken from the room type table",
                temperatures.target, room.room_type
            ),
        });
    }

    let outside_source = match climate.outside_design_temp_source {
        OutsideTemperatureSource::UserSupplied => None,
        OutsideTemperatureSource::PostcodeLookup => climate
            .postcode
            .as_deref()
            .map(|postcode| ("postcode_lookup", postcode)),
        OutsideTemperatureSource::RegionLookup => climate
            .region
            .as_deref()
            .map(|region| ("region_lookup", region)),
    };
    if let Some((source, key)) = outside_source {
        defaults.push(DefaultApplied {
            field: "climate.outside_design_temp".to_string(),
            value: json!(climate.outside_design_temp),
            source: source.to_string(),
            description: format!(
                "Outside design temperature of {}°C looked up for '{key}'",
                climate.outside_design_temp
            ),
        });
    }

    let margin = design_conditions.safety_margin;
    defaults.push(DefaultApplied {
        field: "design_conditions.safety_margin".to_string(),
        value: json!(margin),
        source: if margin == DEFAULT_SAFETY_MARGIN {
            "industry_standard"
        } else {
            "design_conditions"
        }
        .to_string(),
        description: format!("Safety margin of {margin}% added to the total heat loss"),
    });

    defaults
}

fn anomaly_warning(anomaly: &HeatLossAnomaly, result: &HeatLossResult) -> Warning {
    let (code, severity, suggested_fix, affected_fields, context) = match *anomaly {
        HeatLossAnomaly::LowLossDensity { loss_per_m2 } => (
            "LOW_HEAT_LOSS_DENSITY",
            Severity::Info,
            "Check that all external walls and windows have been entered and that U-values are not understated",
            vec!["walls", "windows", "room.area"],
            json!({
                "loss_per_m2": loss_per_m2,
                "min_expected": MIN_EXPECTED_LOSS_PER_M2,
                "max_expected": MAX_EXPECTED_LOSS_PER_M2,
            }),
        ),
        HeatLossAnomaly::HighLossDensity { loss_per_m2 } => (
            "HIGH_HEAT_LOSS_DENSITY",
            Severity::Warning,
            "Check element dimensions, U-values and the room floor area",
            vec!["walls", "windows", "room.area", "building.air_changes_per_hour"],
            json!({
                "loss_per_m2": loss_per_m2,
                "min_expected": MIN_EXPECTED_LOSS_PER_M2,
                "max_expected": MAX_EXPECTED_LOSS_PER_M2,
            }),
        ),
        HeatLossAnomaly::HighVentilationShare { fabric_ratio } => (
            "HIGH_VENTILATION_RATIO",
            Severity::Warning,
            "Check the air change rate and room volume; a measured air permeability gives a better rate",
            vec!["building.air_changes_per_hour", "room.volume"],
            json!({
                "fabric_ratio": fabric_ratio,
                "fabric_loss": result.fabric_loss,
                "ventilation_loss": result.ventilation_loss,
                "min_expected": MIN_EXPECTED_FABRIC_RATIO,
            }),
        ),
        HeatLossAnomaly::HighFabricShare { fabric_ratio } => (
            "HIGH_FABRIC_RATIO",
            Severity::Info,
            "Check the air change rate has not been understated and U-values are not overstated",
            vec!["building.air_changes_per_hour", "walls", "windows"],
            json!({
                "fabric_ratio": fabric_ratio,
                "fabric_loss": result.fabric_loss,
                "ventilation_loss": result.ventilation_loss,
                "max_expected": MAX_EXPECTED_FABRIC_RATIO,
            }),
        ),
    };

    Warning {
        code: code.to_string(),
        severity,
        category: WarningCategory::Plausibility,
        message: anomaly.message(),
        suggested_fix: suggested_fix.to_string(),
        affected_fields: affected_fields.into_iter().map(String::from).collect(),
        context,
    }
}

fn high_target_temperature_warning(room: &Room, temperatures: &DesignTemperatures) -> Warning {
    Warning {
        code: "HIGH_TARGET_TEMPERATURE".to_string(),
        severity: Severity::Warning,
        category: WarningCategory::Comfort,
        message: format!(
            "Target temperature of {}°C for '{}' is above {HIGH_TARGET_TEMPERATURE}°C",
            temperatures.target, room.name
        ),
        suggested_fix: "Confirm the room really needs to be heated this warm; design temperatures are usually 18-22°C".to_string(),
        affected_fields: vec!["room.target_temperature".to_string()],
        context: json!({
            "target_temperature": temperatures.target,
            "target_temperature_source": temperatures.target_source,
            "threshold": HIGH_TARGET_TEMPERATURE,
        }),
    }
}

fn delta_t_mismatch_warning(temperatures: &DesignTemperatures, result: &HeatLossResult) -> Warning {
    Warning {
        code: "PROVENANCE_DELTA_T_MISMATCH".to_string(),
        severity: Severity::Warning,
        category: WarningCategory::Consistency,
        message: format!(
            "The result was calculated with a temperature difference of {} K but these inputs give {} K",
            result.delta_t, temperatures.delta_t
        ),
        suggested_fix: "Recalculate the room so the result and this record share the same inputs".to_string(),
        affected_fields: vec![
            "room.target_temperature".to_string(),
            "climate.outside_design_temp".to_string(),
        ],
        context: json!({
            "result_delta_t": result.delta_t,
            "resolved_delta_t": temperatures.delta_t,
        }),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InputDrift {
    pub key: String,
    pub recorded: Option<Value>,
    pub current: Option<Value>,
}

/// Compare the inputs a provenance record was made from with a fresh snapshot of the current
/// inputs (see [`snapshot_inputs`]). Keys are reported in recorded order followed by new keys.
pub fn detect_input_drift(
    provenance: &CalculationProvenance,
    current: &IndexMap<String, Value>,
) -> Vec<InputDrift> {
    let recorded = &provenance.inputs_snapshot;

    let changed_or_removed = recorded.iter().filter_map(|(key, recorded_value)| {
        match current.get(key) {
            Some(current_value) if current_value == recorded_value => None,
            current_value => Some(InputDrift {
                key: key.clone(),
                recorded: Some(recorded_value.clone()),
                current: current_value.cloned(),
            }),
        }
    });
    let added = current
        .iter()
        .filter(|(key, _)| !recorded.contains_key(*key))
        .map(|(key, current_value)| InputDrift {
            key: key.clone(),
            recorded: None,
            current: Some(current_value.clone()),
        });

    changed_or_removed.chain(added).collect()
}
