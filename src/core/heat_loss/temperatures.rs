use crate::core::lookups::LookupProvider;
use crate::input::{ClimateData, DesignConditions, Room, RoomType};
use serde::Serialize;
use strum_macros::Display;

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetTemperatureSource {
    /// set on the room itself
    Room,
    /// from the room temperature table in the design conditions
    DesignConditions,
    /// from the room type lookup
    RoomTypeLookup,
}

/// The temperatures a room is designed against. Both the calculation and its provenance record
/// resolve temperatures through here so they cannot disagree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DesignTemperatures {
    pub target: f64,
    pub target_source: TargetTemperatureSource,
    pub outside: f64,
    /// may be negative when the outside design temperature exceeds the target
    pub delta_t: f64,
}

pub fn resolve_target_temperature(
    room_type: RoomType,
    target_temperature: Option<f64>,
    design_conditions: &DesignConditions,
    lookups: &impl LookupProvider,
) -> (f64, TargetTemperatureSource) {
    if let Some(target) = target_temperature {
        return (target, TargetTemperatureSource::Room);
    }

    match design_conditions.room_temperatures.get(&room_type) {
        Some(target) => (*target, TargetTemperatureSource::DesignConditions),
        None => (
            lookups.target_temperature_for_room_type(room_type),
            TargetTemperatureSource::RoomTypeLookup,
        ),
    }
}

pub fn resolve_design_temperatures(
    room: &Room,
    climate: &ClimateData,
    design_conditions: &DesignConditions,
    lookups: &impl LookupProvider,
) -> DesignTemperatures {
    let (target, target_source) = resolve_target_temperature(
        room.room_type,
        room.target_temperature,
        design_conditions,
        lookups,
    );

    DesignTemperatures {
        target,
        target_source,
        outside: climate.outside_design_temp,
        delta_t: target - climate.outside_design_temp,
    }
}
