use crate::core::heat_loss::room::{calculate_room_heat_loss, HeatLossResult};
use crate::core::lookups::LookupProvider;
use crate::input::{BuildingData, ClimateData, DesignConditions, Room};
use rayon::prelude::*;

/// Calculate heat loss for every room of a building. Rooms are independent of each other so they
/// are spread across the rayon thread pool; results come back in the order the rooms were given.
pub fn calculate_building_heat_loss(
    rooms: &[Room],
    building: &BuildingData,
    climate: &ClimateData,
    design_conditions: &DesignConditions,
    lookups: &impl LookupProvider,
) -> Vec<HeatLossResult> {
    rooms
        .par_iter()
        .map(|room| calculate_room_heat_loss(room, building, climate, design_conditions, lookups))
        .collect()
}

/// Sum of the required emitter output across rooms, in W.
pub fn calculate_total_heat_load(results: &[HeatLossResult]) -> f64 {
    results.iter().map(|result| result.required_output).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::heat_loss::room::tests::{sample_building, sample_room, wall, window};
    use crate::core::lookups::StandardLookups;
    use crate::input::RoomType;
    use approx::assert_relative_eq;
    use rstest::*;

    #[fixture]
    fn rooms() -> Vec<Room> {
        let mut bedroom = sample_room();
        bedroom.id = "bedroom".to_string();
        bedroom.room_type = RoomType::Bedroom;
        bedroom.target_temperature = None;
        bedroom.walls.push(wall("w2", 3., 2.4, true));
        bedroom.windows.push(window("g1", "w2", 1.2, 1.2));

        let mut hall = sample_room();
        hall.id = "hall".to_string();
        hall.room_type = RoomType::Hall;
        hall.walls.clear();

        vec![sample_room(), bedroom, hall]
    }

    #[rstest]
    fn should_calculate_each_room_independently(rooms: Vec<Room>) {
        let building = sample_building();
        let climate = ClimateData::with_outside_design_temp(-3.);
        let design_conditions = DesignConditions::default();

        let results = calculate_building_heat_loss(
            &rooms,
            &building,
            &climate,
            &design_conditions,
            &StandardLookups,
        );

        assert_eq!(
            results
                .iter()
                .map(|result| result.room_id.as_str())
                .collect::<Vec<_>>(),
            vec!["living", "bedroom", "hall"]
        );
        for (room, result) in rooms.iter().zip(&results) {
            let single = calculate_room_heat_loss(
                room,
                &building,
                &climate,
                &design_conditions,
                &StandardLookups,
            );
            assert_eq!(result.total_loss, single.total_loss);
            assert_eq!(result.breakdown, single.breakdown);
        }
    }

    #[rstest]
    fn should_sum_required_output_for_total_heat_load(rooms: Vec<Room>) {
        let results = calculate_building_heat_loss(
            &rooms,
            &sample_building(),
            &ClimateData::with_outside_design_temp(-3.),
            &DesignConditions::default(),
            &StandardLookups,
        );

        let expected: f64 = results.iter().map(|result| result.required_output).sum();

        assert_relative_eq!(
            calculate_total_heat_load(&results),
            expected,
            max_relative = 1e-12
        );
    }

    #[rstest]
    fn should_have_no_heat_load_without_rooms() {
        assert_eq!(calculate_total_heat_load(&[]), 0.);
    }
}
