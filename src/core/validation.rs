//! Advisory checks on a heat loss request.
//!
//! Nothing here stops a calculation: each function returns human-readable messages and the caller
//! decides whether a non-empty list should block.

use crate::core::heat_loss::temperatures::resolve_target_temperature;
use crate::core::lookups::LookupProvider;
use crate::input::{DesignConditions, Input, RoomInput};
use std::collections::HashSet;

pub const MIN_AIR_CHANGES_PER_HOUR: f64 = 0.1;
pub const MAX_AIR_CHANGES_PER_HOUR: f64 = 10.;
/// UK design temperatures are well below this
pub const MAX_OUTSIDE_DESIGN_TEMPERATURE: f64 = 10.;
pub const MIN_SAFETY_MARGIN: f64 = 0.;
pub const MAX_SAFETY_MARGIN: f64 = 50.;
pub const MAX_TARGET_TEMPERATURE: f64 = 30.;

pub fn validate_heat_loss_inputs(input: &Input, lookups: &impl LookupProvider) -> Vec<String> {
    let mut issues = vec![];

    if let Some(ach) = input.building.air_changes_per_hour {
        if !(MIN_AIR_CHANGES_PER_HOUR..=MAX_AIR_CHANGES_PER_HOUR).contains(&ach) {
            issues.push(format!(
                "Air changes per hour of {ach} is outside the expected range {MIN_AIR_CHANGES_PER_HOUR}-{MAX_AIR_CHANGES_PER_HOUR}"
            ));
        }
    }

    match input.climate.resolve(lookups) {
        Ok(climate) if climate.outside_design_temp > MAX_OUTSIDE_DESIGN_TEMPERATURE => {
            issues.push(format!(
                "Outside design temperature of {}°C is unusually warm (expected at most {MAX_OUTSIDE_DESIGN_TEMPERATURE}°C)",
                climate.outside_design_temp
            ));
        }
        Ok(_) => {}
        Err(_) => issues.push(
            "No outside design temperature was given and none could be found for the postcode or region"
                .to_string(),
        ),
    }

    let safety_margin = input.design_conditions.safety_margin;
    if !(MIN_SAFETY_MARGIN..=MAX_SAFETY_MARGIN).contains(&safety_margin) {
        issues.push(format!(
            "Safety margin of {safety_margin}% is outside the expected range {MIN_SAFETY_MARGIN}-{MAX_SAFETY_MARGIN}%"
        ));
    }

    let mut room_ids = HashSet::new();
    for room in &input.rooms {
        if !room_ids.insert(room.id.as_str()) {
            issues.push(format!("Room id '{}' is used more than once", room.id));
        }
        issues.extend(validate_room_inputs(
            room,
            &input.design_conditions,
            lookups,
        ));
    }

    issues
}

pub fn validate_room_inputs(
    room: &RoomInput,
    design_conditions: &DesignConditions,
    lookups: &impl LookupProvider,
) -> Vec<String> {
    let mut issues = vec![];
    let mut issue = |message: String| issues.push(format!("Room '{}': {message}", room.name));

    if !(room.area > 0.) {
        issue(format!("area must be greater than zero (got {})", room.area));
    }
    if !(room.volume > 0.) {
        issue(format!("volume must be greater than zero (got {})", room.volume));
    }
    if let Some(ceiling_height) = room.ceiling_height {
        if !(ceiling_height > 0.) {
            issue(format!(
                "ceiling height must be greater than zero (got {ceiling_height})"
            ));
        }
    }

    let (target, _) = resolve_target_temperature(
        room.room_type,
        room.target_temperature,
        design_conditions,
        lookups,
    );
    if target > MAX_TARGET_TEMPERATURE {
        issue(format!(
            "target temperature of {target}°C exceeds {MAX_TARGET_TEMPERATURE}°C"
        ));
    }

    for door in &room.doors {
        match door.u_value {
            None => issue(format!(
                "door '{}' has no U-value; door U-values are mandatory",
                door.id
            )),
            Some(u_value) if !(u_value.is_finite() && u_value > 0.) => issue(format!(
                "door '{}' has an invalid U-value of {u_value}; it must be greater than zero",
                door.id
            )),
            Some(_) => {}
        }
    }

    let wall_ids: HashSet<&str> = room.walls.iter().map(|wall| wall.id.as_str()).collect();
    let openings = room
        .windows
        .iter()
        .map(|window| ("window", window.id.as_str(), window.wall_id.as_str()))
        .chain(
            room.doors
                .iter()
                .map(|door| ("door", door.id.as_str(), door.wall_id.as_str())),
        );
    let mut element_ids = HashSet::new();
    for wall in &room.walls {
        if !element_ids.insert(wall.id.as_str()) {
            issue(format!("element id '{}' is used more than once", wall.id));
        }
    }
    for (kind, id, wall_id) in openings {
        if !element_ids.insert(id) {
            issue(format!("element id '{id}' is used more than once"));
        }
        if !wall_ids.contains(wall_id) {
            issue(format!("{kind} '{id}' refers to unknown wall '{wall_id}'"));
        }
    }

    issues
}
