#![allow(clippy::too_many_arguments)]

pub mod core;
pub mod errors;
pub mod input;
pub mod output;

#[macro_use]
extern crate is_close;

use crate::core::analysis::{analyze_heat_loss_result, loss_per_m2};
use crate::core::heat_loss::building::{calculate_building_heat_loss, calculate_total_heat_load};
use crate::core::heat_loss::room::{CeilingLoss, ElementLoss, HeatLossResult};
use crate::core::lookups::LookupProvider;
use crate::core::provenance::{build_heat_loss_provenance, CalculationProvenance};
use crate::core::validation::validate_heat_loss_inputs;
use crate::errors::{HeatLossError, OutputError};
use crate::input::{ingest_for_processing, Room};
use crate::output::Output;
use bitflags::bitflags;
use csv::WriterBuilder;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;
use std::io::{Read, Write};
use tracing::{info, warn};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct ProjectFlags: u8 {
        /// Refuse to calculate when validation reports any issue.
        const STRICT_VALIDATION = 0b1;
        const SKIP_PROVENANCE_OUTPUT = 0b10;
    }
}

pub const ROOM_HEAT_LOSS_OUTPUT_KEY: &str = "room_heat_loss";
pub const PROVENANCE_OUTPUT_KEY: &str = "provenance";

#[derive(Clone, Debug, Serialize)]
pub struct RoomResults {
    pub room_name: String,
    pub result: HeatLossResult,
    pub warnings: Vec<String>,
    pub provenance: CalculationProvenance,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProjectResults {
    pub rooms: Vec<RoomResults>,
    /// Sum of required output across rooms, in W
    pub total_heat_load: f64,
    pub validation_issues: Vec<String>,
}

pub fn run_project(
    input: impl Read,
    output: impl Output,
    lookups: &impl LookupProvider,
    flags: &ProjectFlags,
) -> Result<ProjectResults, HeatLossError> {
    let input = ingest_for_processing(input)?;

    let validation_issues = validate_heat_loss_inputs(&input, lookups);
    for issue in &validation_issues {
        warn!("{issue}");
    }
    if flags.contains(ProjectFlags::STRICT_VALIDATION) && !validation_issues.is_empty() {
        return Err(HeatLossError::ValidationFailed(validation_issues));
    }

    let climate = input.climate.resolve(lookups)?;
    let rooms = input.rooms_for_calculation()?;

    info!(
        rooms = rooms.len(),
        outside_design_temp = climate.outside_design_temp,
        "Calculating room heat losses"
    );

    let results = calculate_building_heat_loss(
        &rooms,
        &input.building,
        &climate,
        &input.design_conditions,
        lookups,
    );
    let total_heat_load = calculate_total_heat_load(&results);

    let room_results = rooms
        .iter()
        .zip(results)
        .map(|(room, result)| {
            let provenance = build_heat_loss_provenance(
                room,
                &input.building,
                &climate,
                &input.design_conditions,
                lookups,
                &result,
                input.reason,
            );
            RoomResults {
                room_name: room.name.clone(),
                warnings: analyze_heat_loss_result(&result, room),
                result,
                provenance,
            }
        })
        .collect_vec();

    info!(total_heat_load, "Calculated total heat load");

    if !output.is_noop() {
        write_room_heat_loss_file(&output, &rooms, &room_results, total_heat_load)
            .map_err(|error| HeatLossError::FailureInOutput(OutputError::new(error)))?;
        if !flags.contains(ProjectFlags::SKIP_PROVENANCE_OUTPUT) {
            write_provenance_file(&output, &room_results)
                .map_err(|error| HeatLossError::FailureInOutput(OutputError::new(error)))?;
        }
    }

    Ok(ProjectResults {
        rooms: room_results,
        total_heat_load,
        validation_issues,
    })
}

const ROOM_HEAT_LOSS_HEADINGS: [(&str, &str); 15] = [
    ("Room id", ""),
    ("Room name", ""),
    ("Delta T", "[K]"),
    ("Walls", "[W]"),
    ("Windows", "[W]"),
    ("Doors", "[W]"),
    ("Floor", "[W]"),
    ("Ceiling", "[W]"),
    ("Thermal bridging", "[W]"),
    ("Fabric loss", "[W]"),
    ("Ventilation loss", "[W]"),
    ("Total loss", "[W]"),
    ("Required output", "[W]"),
    ("Loss per floor area", "[W/m2]"),
    ("Overridden", ""),
];

fn write_room_heat_loss_file(
    output: &impl Output,
    rooms: &[Room],
    room_results: &[RoomResults],
    total_heat_load: f64,
) -> anyhow::Result<()> {
    let writer = output.writer_for_location_key(ROOM_HEAT_LOSS_OUTPUT_KEY, "csv")?;
    let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);

    writer.write_record(ROOM_HEAT_LOSS_HEADINGS.iter().map(|(heading, _)| *heading))?;
    writer.write_record(ROOM_HEAT_LOSS_HEADINGS.iter().map(|(_, units)| *units))?;

    for (room, RoomResults { result, .. }) in rooms.iter().zip(room_results) {
        let breakdown = &result.breakdown;
        let ceiling = match breakdown.ceiling {
            CeilingLoss::Pending => "pending".to_string(),
            CeilingLoss::Calculated { loss } => loss.to_string(),
        };
        writer.write_record([
            result.room_id.clone(),
            room.name.clone(),
            result.delta_t.to_string(),
            element_total(&breakdown.walls).to_string(),
            element_total(&breakdown.windows).to_string(),
            element_total(&breakdown.doors).to_string(),
            breakdown.floor.to_string(),
            ceiling,
            breakdown.thermal_bridging.to_string(),
            result.fabric_loss.to_string(),
            result.ventilation_loss.to_string(),
            result.total_loss.to_string(),
            result.required_output.to_string(),
            loss_per_m2(result, room)
                .map(|value| value.to_string())
                .unwrap_or_default(),
            result.overridden.to_string(),
        ])?;
    }

    writer.write_record(["Total heat load".to_string(), total_heat_load.to_string()])?;

    writer.flush()?;

    Ok(())
}

fn element_total(elements: &[ElementLoss]) -> f64 {
    elements.iter().map(|element| element.loss).sum()
}

fn write_provenance_file(output: &impl Output, room_results: &[RoomResults]) -> anyhow::Result<()> {
    let provenance_by_room = room_results
        .iter()
        .map(|room| (room.result.room_id.as_str(), &room.provenance))
        .collect::<IndexMap<_, _>>();

    let mut writer = output.writer_for_location_key(PROVENANCE_OUTPUT_KEY, "json")?;
    serde_json::to_writer_pretty(&mut writer, &provenance_by_room)?;
    writer.flush()?;

    Ok(())
}
