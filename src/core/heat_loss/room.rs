use crate::core::heat_loss::temperatures::resolve_design_temperatures;
use crate::core::lookups::{LookupProvider, UNKNOWN_CONSTRUCTION};
use crate::input::{BuildingData, ClimateData, DesignConditions, Room, Wall, Window};
use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::Display;
use tracing::debug;

/// Volumetric heat capacity of air in Wh/(m3.K)
pub const AIR_HEAT_CAPACITY: f64 = 0.33;

/// Fraction of the air temperature difference applied to ground floors, approximating the ground
/// being warmer than the outside design temperature.
pub const GROUND_DELTA_T_FACTOR: f64 = 0.5;

/// Air change rate used when the building does not state one.
pub const DEFAULT_AIR_CHANGES_PER_HOUR: f64 = 1.0;

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UValueSource {
    /// stated on the wall or window itself
    Element,
    /// building-wide override
    Building,
    /// looked up from the building's construction type
    Construction,
    /// looked up from the window's glazing type
    Glazing,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedUValue {
    pub value: f64,
    pub source: UValueSource,
}

impl ResolvedUValue {
    fn new(value: f64, source: UValueSource) -> Self {
        Self { value, source }
    }
}

pub fn wall_u_value(
    wall: &Wall,
    building: &BuildingData,
    lookups: &impl LookupProvider,
) -> ResolvedUValue {
    match (wall.u_value, building.wall_u_value) {
        (Some(u_value), _) => ResolvedUValue::new(u_value, UValueSource::Element),
        (None, Some(u_value)) => ResolvedUValue::new(u_value, UValueSource::Building),
        (None, None) => ResolvedUValue::new(
            lookups.u_value_for_construction(
                building
                    .wall_construction
                    .as_deref()
                    .unwrap_or(UNKNOWN_CONSTRUCTION),
            ),
            UValueSource::Construction,
        ),
    }
}

pub fn window_u_value(window: &Window, lookups: &impl LookupProvider) -> ResolvedUValue {
    match window.u_value {
        Some(u_value) => ResolvedUValue::new(u_value, UValueSource::Element),
        None => ResolvedUValue::new(
            lookups.u_value_for_glazing(window.glazing_type),
            UValueSource::Glazing,
        ),
    }
}

pub fn floor_u_value(building: &BuildingData, lookups: &impl LookupProvider) -> ResolvedUValue {
    match building.floor_u_value {
        Some(u_value) => ResolvedUValue::new(u_value, UValueSource::Building),
        None => ResolvedUValue::new(
            lookups.u_value_for_construction(
                building
                    .floor_construction
                    .as_deref()
                    .unwrap_or(UNKNOWN_CONSTRUCTION),
            ),
            UValueSource::Construction,
        ),
    }
}

/// Area of a wall left once the windows and doors sitting on it are taken out.
pub fn net_wall_area(wall: &Wall, room: &Room) -> f64 {
    let window_area: f64 = room
        .windows
        .iter()
        .filter(|window| window.wall_id == wall.id)
        .map(Window::area)
        .sum();
    let door_area: f64 = room
        .doors
        .iter()
        .filter(|door| door.wall_id == wall.id)
        .map(|door| door.area())
        .sum();

    wall.gross_area() - window_area - door_area
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ElementLoss {
    pub id: String,
    pub area: f64,
    pub u_value: f64,
    pub loss: f64,
}

/// Heat loss through the ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CeilingLoss {
    /// Not calculated until rooms can be placed on a storey; contributes nothing to the total.
    Pending,
    Calculated { loss: f64 },
}

impl CeilingLoss {
    pub fn watts(&self) -> f64 {
        match self {
            CeilingLoss::Pending => 0.,
            CeilingLoss::Calculated { loss } => *loss,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, CeilingLoss::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeatLossBreakdown {
    pub walls: Vec<ElementLoss>,
    pub windows: Vec<ElementLoss>,
    pub doors: Vec<ElementLoss>,
    pub floor: f64,
    pub ceiling: CeilingLoss,
    pub thermal_bridging: f64,
}

impl HeatLossBreakdown {
    pub fn fabric_loss(&self) -> f64 {
        let element_loss = |elements: &[ElementLoss]| -> f64 {
            elements.iter().map(|element| element.loss).sum()
        };

        element_loss(&self.walls)
            + element_loss(&self.windows)
            + element_loss(&self.doors)
            + self.floor
            + self.ceiling.watts()
            + self.thermal_bridging
    }
}

/// The outcome of a heat loss calculation for a single room. All losses are in W.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeatLossResult {
    pub room_id: String,
    pub fabric_loss: f64,
    pub ventilation_loss: f64,
    pub total_loss: f64,
    pub breakdown: HeatLossBreakdown,
    pub required_output: f64,
    /// temperature difference the losses were calculated against
    pub delta_t: f64,
    pub calculated_at: DateTime<Utc>,
    pub overridden: bool,
}

pub fn required_output_for(total_loss: f64, safety_margin: f64) -> f64 {
    total_loss * (1. + safety_margin / 100.)
}

pub fn calculate_room_heat_loss(
    room: &Room,
    building: &BuildingData,
    climate: &ClimateData,
    design_conditions: &DesignConditions,
    lookups: &impl LookupProvider,
) -> HeatLossResult {
    let delta_t =
        resolve_design_temperatures(room, climate, design_conditions, lookups).delta_t;

    let external_walls = room.walls.iter().filter(|wall| wall.is_external);

    let walls = external_walls
        .clone()
        .filter_map(|wall| {
            let net_area = net_wall_area(wall, room);
            if net_area <= 0. {
                return None;
            }
            let u_value = wall_u_value(wall, building, lookups).value;
            Some(ElementLoss {
                id: wall.id.clone(),
                area: net_area,
                u_value,
                loss: u_value * net_area * delta_t,
            })
        })
        .collect();

    // every window counts, whichever wall it sits on
    let windows = room
        .windows
        .iter()
        .map(|window| {
            let area = window.area();
            let u_value = window_u_value(window, lookups).value;
            ElementLoss {
                id: window.id.clone(),
                area,
                u_value,
                loss: u_value * area * delta_t,
            }
        })
        .collect();

    let doors = room
        .doors
        .iter()
        .filter(|door| door.is_external)
        .map(|door| {
            let area = door.area();
            ElementLoss {
                id: door.id.clone(),
                area,
                u_value: door.u_value,
                loss: door.u_value * area * delta_t,
            }
        })
        .collect();

    let floor =
        floor_u_value(building, lookups).value * room.area * (delta_t * GROUND_DELTA_T_FACTOR);

    let gross_external_wall_area: f64 = external_walls.map(Wall::gross_area).sum();
    let thermal_bridging = design_conditions.thermal_bridging * gross_external_wall_area * delta_t;

    let breakdown = HeatLossBreakdown {
        walls,
        windows,
        doors,
        floor,
        ceiling: CeilingLoss::Pending,
        thermal_bridging,
    };

    let air_changes_per_hour = building
        .air_changes_per_hour
        .unwrap_or(DEFAULT_AIR_CHANGES_PER_HOUR);
    let ventilation_loss = AIR_HEAT_CAPACITY * air_changes_per_hour * room.volume * delta_t;

    let fabric_loss = breakdown.fabric_loss();
    let total_loss = fabric_loss + ventilation_loss;
    let required_output = required_output_for(total_loss, design_conditions.safety_margin);

    debug!(
        room = room.id.as_str(),
        delta_t, fabric_loss, ventilation_loss, required_output, "Calculated room heat loss"
    );

    HeatLossResult {
        room_id: room.id.clone(),
        fabric_loss,
        ventilation_loss,
        total_loss,
        breakdown,
        required_output,
        delta_t,
        calculated_at: Utc::now(),
        overridden: false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::lookups::StandardLookups;
    use crate::input::{Door, GlazingType, RoomType};
    use approx::assert_relative_eq;
    use rstest::*;

    pub(crate) fn wall(id: &str, length: f64, height: f64, is_external: bool) -> Wall {
        Wall {
            id: id.to_string(),
            length,
            height,
            is_external,
            u_value: None,
        }
    }

    pub(crate) fn window(id: &str, wall_id: &str, width: f64, height: f64) -> Window {
        Window {
            id: id.to_string(),
            width,
            height,
            wall_id: wall_id.to_string(),
            u_value: None,
            glazing_type: GlazingType::Double,
        }
    }

    pub(crate) fn door(id: &str, wall_id: &str, is_external: bool, u_value: f64) -> Door {
        Door {
            id: id.to_string(),
            width: 1.,
            height: 2.,
            wall_id: wall_id.to_string(),
            is_external,
            u_value,
        }
    }

    /// 20m2 living room at 21C with a single 10m2 external wall at U=1.5
    pub(crate) fn sample_room() -> Room {
        Room {
            id: "living".to_string(),
            name: "Living room".to_string(),
            room_type: RoomType::LivingRoom,
            area: 20.,
            volume: 50.,
            ceiling_height: Some(2.5),
            perimeter: 18.,
            target_temperature: Some(21.),
            walls: vec![Wall {
                u_value: Some(1.5),
                ..wall("w1", 4., 2.5, true)
            }],
            windows: vec![],
            doors: vec![],
        }
    }

    pub(crate) fn sample_building() -> BuildingData {
        BuildingData {
            air_changes_per_hour: Some(1.0),
            floor_u_value: Some(0.25),
            ..Default::default()
        }
    }

    #[fixture]
    fn room() -> Room {
        sample_room()
    }

    #[fixture]
    fn building() -> BuildingData {
        sample_building()
    }

    #[fixture]
    fn climate() -> ClimateData {
        ClimateData::with_outside_design_temp(-3.)
    }

    #[rstest]
    fn should_calculate_wall_and_ventilation_loss(
        room: Room,
        building: BuildingData,
        climate: ClimateData,
    ) {
        let result = calculate_room_heat_loss(
            &room,
            &building,
            &climate,
            &DesignConditions::default(),
            &StandardLookups,
        );

        assert_eq!(result.delta_t, 24.);
        assert_eq!(result.breakdown.walls.len(), 1);
        assert_relative_eq!(result.breakdown.walls[0].loss, 360., max_relative = 1e-9);
        assert_relative_eq!(result.ventilation_loss, 396., max_relative = 1e-9);
        // 0.25 * 20 * 12
        assert_relative_eq!(result.breakdown.floor, 60., max_relative = 1e-9);
        // 0.15 * 10 * 24
        assert_relative_eq!(result.breakdown.thermal_bridging, 36., max_relative = 1e-9);
        assert_relative_eq!(result.fabric_loss, 456., max_relative = 1e-9);
    }

    #[rstest]
    fn should_keep_totals_consistent(
        mut room: Room,
        building: BuildingData,
        climate: ClimateData,
    ) {
        room.windows.push(window("g1", "w1", 1.5, 1.2));
        room.doors.push(door("d1", "w1", true, 3.0));
        let design_conditions = DesignConditions {
            safety_margin: 15.,
            ..Default::default()
        };

        let result = calculate_room_heat_loss(
            &room,
            &building,
            &climate,
            &design_conditions,
            &StandardLookups,
        );

        assert_eq!(
            result.total_loss,
            result.fabric_loss + result.ventilation_loss
        );
        assert_relative_eq!(result.required_output, result.total_loss * 1.15, max_relative = 1e-9);
        assert!(!result.overridden);
    }

    #[rstest]
    fn should_subtract_openings_from_wall_area(
        mut room: Room,
        building: BuildingData,
        climate: ClimateData,
    ) {
        room.windows.push(window("g1", "w1", 2., 1.));
        room.doors.push(door("d1", "w1", true, 3.0));

        let result = calculate_room_heat_loss(
            &room,
            &building,
            &climate,
            &DesignConditions::default(),
            &StandardLookups,
        );

        assert_relative_eq!(result.breakdown.walls[0].area, 6., max_relative = 1e-9);
        assert_relative_eq!(result.breakdown.walls[0].loss, 1.5 * 6. * 24., max_relative = 1e-9);
        assert_relative_eq!(result.breakdown.windows[0].loss, 2.8 * 2. * 24., max_relative = 1e-9);
        assert_relative_eq!(result.breakdown.doors[0].loss, 3.0 * 2. * 24., max_relative = 1e-9);
        // bridging uses the gross wall area
        assert_relative_eq!(result.breakdown.thermal_bridging, 0.15 * 10. * 24., max_relative = 1e-9);
    }

    #[rstest]
    fn should_ignore_internal_walls_and_doors(
        mut room: Room,
        building: BuildingData,
        climate: ClimateData,
    ) {
        room.walls.push(Wall {
            u_value: Some(2.0),
            ..wall("w2", 3., 2.5, false)
        });
        room.doors.push(door("d1", "w2", false, 3.0));

        let result = calculate_room_heat_loss(
            &room,
            &building,
            &climate,
            &DesignConditions::default(),
            &StandardLookups,
        );

        assert_eq!(
            result
                .breakdown
                .walls
                .iter()
                .map(|wall| wall.id.as_str())
                .collect::<Vec<_>>(),
            vec!["w1"]
        );
        assert!(result.breakdown.doors.is_empty());
        assert_relative_eq!(result.breakdown.thermal_bridging, 36., max_relative = 1e-9);
    }

    #[rstest]
    fn should_count_windows_on_internal_walls(
        mut room: Room,
        building: BuildingData,
        climate: ClimateData,
    ) {
        room.walls.push(wall("w2", 3., 2.5, false));
        room.windows.push(window("borrowed-light", "w2", 1., 1.));

        let result = calculate_room_heat_loss(
            &room,
            &building,
            &climate,
            &DesignConditions::default(),
            &StandardLookups,
        );

        assert_eq!(result.breakdown.windows.len(), 1);
        assert_relative_eq!(result.breakdown.windows[0].loss, 2.8 * 24., max_relative = 1e-9);
    }

    #[rstest]
    fn should_drop_wall_fully_covered_by_openings(
        mut room: Room,
        building: BuildingData,
        climate: ClimateData,
    ) {
        room.windows.push(window("g1", "w1", 4., 2.5));
        room.doors.push(door("d1", "w1", true, 3.0));

        let result = calculate_room_heat_loss(
            &room,
            &building,
            &climate,
            &DesignConditions::default(),
            &StandardLookups,
        );

        assert!(result.breakdown.walls.is_empty());
        assert!(result.fabric_loss.is_finite());
    }

    #[rstest]
    fn should_drop_wall_exactly_covered_by_openings(
        mut room: Room,
        building: BuildingData,
        climate: ClimateData,
    ) {
        // 8m2 window plus 2m2 door on a 10m2 wall
        room.windows.push(window("g1", "w1", 4., 2.));
        room.doors.push(door("d1", "w1", true, 3.0));

        let result = calculate_room_heat_loss(
            &room,
            &building,
            &climate,
            &DesignConditions::default(),
            &StandardLookups,
        );

        assert!(result.breakdown.walls.is_empty());
        assert_eq!(result.breakdown.windows.len(), 1);
        assert_eq!(result.breakdown.doors.len(), 1);
    }

    #[rstest]
    fn should_resolve_wall_u_value_in_order(room: Room) {
        let lookups = StandardLookups;
        let mut building = BuildingData {
            wall_u_value: Some(0.3),
            wall_construction: Some("solid_brick".to_string()),
            ..Default::default()
        };
        let mut bare_wall = room.walls[0].clone();
        bare_wall.u_value = None;

        assert_eq!(
            wall_u_value(&bare_wall, &building, &lookups),
            ResolvedUValue::new(0.3, UValueSource::Building)
        );

        bare_wall.u_value = Some(1.1);
        assert_eq!(
            wall_u_value(&bare_wall, &building, &lookups),
            ResolvedUValue::new(1.1, UValueSource::Element)
        );

        bare_wall.u_value = None;
        building.wall_u_value = None;
        assert_eq!(
            wall_u_value(&bare_wall, &building, &lookups),
            ResolvedUValue::new(2.1, UValueSource::Construction)
        );
    }

    #[rstest]
    fn should_leave_ceiling_pending(room: Room, building: BuildingData, climate: ClimateData) {
        let result = calculate_room_heat_loss(
            &room,
            &building,
            &climate,
            &DesignConditions::default(),
            &StandardLookups,
        );

        assert!(result.breakdown.ceiling.is_pending());
        assert_eq!(result.breakdown.ceiling.watts(), 0.);
    }

    #[rstest]
    fn should_default_air_change_rate(room: Room, climate: ClimateData) {
        let building = BuildingData::default();

        let result = calculate_room_heat_loss(
            &room,
            &building,
            &climate,
            &DesignConditions::default(),
            &StandardLookups,
        );

        assert_relative_eq!(result.ventilation_loss, 396., max_relative = 1e-9);
    }

    #[rstest]
    fn should_produce_negative_losses_when_outside_is_warmer(
        room: Room,
        building: BuildingData,
    ) {
        let result = calculate_room_heat_loss(
            &room,
            &building,
            &ClimateData::with_outside_design_temp(25.),
            &DesignConditions::default(),
            &StandardLookups,
        );

        assert_eq!(result.delta_t, -4.);
        assert!(result.total_loss < 0.);
    }
}
