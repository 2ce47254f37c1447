use crate::core::lookups::LookupProvider;
use crate::core::provenance::CalculationReason;
use crate::errors::MissingRequiredFieldError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Read};
use strum_macros::{Display, EnumIter};

pub fn ingest_for_processing(json: impl Read) -> Result<Input, anyhow::Error> {
    let reader = BufReader::new(json);

    let input: Input = serde_json::from_reader(reader)?;

    Ok(input)
}

/// A heat loss calculation request for a whole building, as supplied by the caller.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Input {
    pub building: BuildingData,
    pub climate: ClimateInput,
    #[serde(default)]
    pub design_conditions: DesignConditions,
    pub rooms: Vec<RoomInput>,
    #[serde(default)]
    pub reason: CalculationReason,
}

impl Input {
    /// Convert the requested rooms into the calculation model, rejecting any room that is missing
    /// a field the calculation has no fallback for.
    pub fn rooms_for_calculation(&self) -> Result<Vec<Room>, MissingRequiredFieldError> {
        self.rooms.iter().cloned().map(Room::try_from).collect()
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Display, EnumIter, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoomType {
    LivingRoom,
    DiningRoom,
    Kitchen,
    Bedroom,
    Bathroom,
    EnSuite,
    Toilet,
    Hall,
    Landing,
    Study,
    Utility,
    Conservatory,
    Other,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumIter, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GlazingType {
    Single,
    #[default]
    Double,
    DoubleLowE,
    Triple,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Wall {
    pub id: String,
    pub length: f64,
    pub height: f64,
    pub is_external: bool,
    pub u_value: Option<f64>,
}

impl Wall {
    pub fn gross_area(&self) -> f64 {
        self.length * self.height
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Window {
    pub id: String,
    pub width: f64,
    pub height: f64,
    pub wall_id: String,
    pub u_value: Option<f64>,
    #[serde(default)]
    pub glazing_type: GlazingType,
}

impl Window {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// A door as received in a request. The U-value is optional here only so that a missing value can
/// be reported; the calculation model requires it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DoorInput {
    pub id: String,
    pub width: f64,
    pub height: f64,
    pub wall_id: String,
    pub is_external: bool,
    pub u_value: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Door {
    pub id: String,
    pub width: f64,
    pub height: f64,
    pub wall_id: String,
    pub is_external: bool,
    pub u_value: f64,
}

impl Door {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

impl TryFrom<DoorInput> for Door {
    type Error = MissingRequiredFieldError;

    fn try_from(input: DoorInput) -> Result<Self, Self::Error> {
        let u_value = input
            .u_value
            .ok_or_else(|| MissingRequiredFieldError::new("door", &input.id, "u_value"))?;

        Ok(Self {
            id: input.id,
            width: input.width,
            height: input.height,
            wall_id: input.wall_id,
            is_external: input.is_external,
            u_value,
        })
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoomInput {
    pub id: String,
    pub name: String,
    pub room_type: RoomType,
    pub area: f64,
    pub volume: f64,
    pub ceiling_height: Option<f64>,
    pub perimeter: f64,
    pub target_temperature: Option<f64>,
    #[serde(default)]
    pub walls: Vec<Wall>,
    #[serde(default)]
    pub windows: Vec<Window>,
    #[serde(default)]
    pub doors: Vec<DoorInput>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub room_type: RoomType,
    pub area: f64,
    pub volume: f64,
    pub ceiling_height: Option<f64>,
    pub perimeter: f64,
    pub target_temperature: Option<f64>,
    pub walls: Vec<Wall>,
    pub windows: Vec<Window>,
    pub doors: Vec<Door>,
}

impl TryFrom<RoomInput> for Room {
    type Error = MissingRequiredFieldError;

    fn try_from(input: RoomInput) -> Result<Self, Self::Error> {
        let doors = input
            .doors
            .into_iter()
            .map(Door::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: input.id,
            name: input.name,
            room_type: input.room_type,
            area: input.area,
            volume: input.volume,
            ceiling_height: input.ceiling_height,
            perimeter: input.perimeter,
            target_temperature: input.target_temperature,
            walls: input.walls,
            windows: input.windows,
            doors,
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BuildingData {
    pub air_changes_per_hour: Option<f64>,
    pub wall_u_value: Option<f64>,
    pub roof_u_value: Option<f64>,
    pub floor_u_value: Option<f64>,
    pub wall_construction: Option<String>,
    pub roof_construction: Option<String>,
    pub floor_construction: Option<String>,
    pub construction_year: Option<u16>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClimateInput {
    pub outside_design_temp: Option<f64>,
    pub postcode: Option<String>,
    pub region: Option<String>,
    pub wind_speed: Option<f64>,
    pub altitude: Option<f64>,
}

impl ClimateInput {
    /// Settle the outside design temperature, looking it up by postcode and then region when the
    /// request does not state one.
    pub fn resolve(
        &self,
        lookups: &impl LookupProvider,
    ) -> Result<ClimateData, MissingRequiredFieldError> {
        let (outside_design_temp, source) = match self.outside_design_temp {
            Some(temp) => (temp, OutsideTemperatureSource::UserSupplied),
            None => {
                let from_postcode = self.postcode.as_deref().and_then(|postcode| {
                    lookups
                        .outside_design_temperature(Some(postcode), None)
                        .map(|temp| (temp, OutsideTemperatureSource::PostcodeLookup))
                });
                let from_region = || {
                    self.region.as_deref().and_then(|region| {
                        lookups
                            .outside_design_temperature(None, Some(region))
                            .map(|temp| (temp, OutsideTemperatureSource::RegionLookup))
                    })
                };
                from_postcode.or_else(from_region).ok_or_else(|| {
                    MissingRequiredFieldError::new("climate", "request", "outside_design_temp")
                })?
            }
        };

        Ok(ClimateData {
            outside_design_temp,
            outside_design_temp_source: source,
            postcode: self.postcode.clone(),
            region: self.region.clone(),
            wind_speed: self.wind_speed,
            altitude: self.altitude,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutsideTemperatureSource {
    #[default]
    UserSupplied,
    PostcodeLookup,
    RegionLookup,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClimateData {
    pub outside_design_temp: f64,
    pub outside_design_temp_source: OutsideTemperatureSource,
    pub postcode: Option<String>,
    pub region: Option<String>,
    pub wind_speed: Option<f64>,
    pub altitude: Option<f64>,
}

impl ClimateData {
    pub fn with_outside_design_temp(outside_design_temp: f64) -> Self {
        Self {
            outside_design_temp,
            outside_design_temp_source: OutsideTemperatureSource::UserSupplied,
            postcode: None,
            region: None,
            wind_speed: None,
            altitude: None,
        }
    }
}

pub(crate) const DEFAULT_SAFETY_MARGIN: f64 = 10.;
pub(crate) const DEFAULT_THERMAL_BRIDGING: f64 = 0.15;
const DEFAULT_INFILTRATION_RATE: f64 = 0.5;
const DEFAULT_FLOW_TEMPERATURE: f64 = 55.;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DesignConditions {
    /// percentage added on top of the total loss when sizing emitters
    pub safety_margin: f64,
    /// Y-value in W/m2K
    pub thermal_bridging: f64,
    pub infiltration_rate: f64,
    pub flow_temperature: f64,
    pub room_temperatures: IndexMap<RoomType, f64>,
}

impl Default for DesignConditions {
    fn default() -> Self {
        Self {
            safety_margin: DEFAULT_SAFETY_MARGIN,
            thermal_bridging: DEFAULT_THERMAL_BRIDGING,
            infiltration_rate: DEFAULT_INFILTRATION_RATE,
            flow_temperature: DEFAULT_FLOW_TEMPERATURE,
            room_temperatures: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lookups::StandardLookups;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    #[fixture]
    fn request_json() -> serde_json::Value {
        json!({
            "building": {
                "air_changes_per_hour": 1.5,
                "wall_construction": "cavity_filled"
            },
            "climate": {
                "postcode": "SW1A 1AA"
            },
            "design_conditions": {
                "safety_margin": 15.0,
                "room_temperatures": {"bedroom": 19.0}
            },
            "rooms": [{
                "id": "r1",
                "name": "Main bedroom",
                "room_type": "bedroom",
                "area": 12.0,
                "volume": 28.8,
                "ceiling_height": 2.4,
                "perimeter": 14.0,
                "target_temperature": null,
                "walls": [{"id": "w1", "length": 4.0, "height": 2.4, "is_external": true, "u_value": null}],
                "windows": [{"id": "g1", "width": 1.2, "height": 1.0, "wall_id": "w1", "u_value": null, "glazing_type": "triple"}],
                "doors": [{"id": "d1", "width": 0.8, "height": 2.0, "wall_id": "w1", "is_external": false, "u_value": null}]
            }]
        })
    }

    #[rstest]
    fn should_ingest_request(request_json: serde_json::Value) {
        let input = ingest_for_processing(request_json.to_string().as_bytes()).unwrap();

        assert_eq!(input.building.air_changes_per_hour, Some(1.5));
        assert_eq!(input.design_conditions.safety_margin, 15.0);
        assert_eq!(
            input.design_conditions.thermal_bridging,
            DEFAULT_THERMAL_BRIDGING
        );
        assert_eq!(
            input.design_conditions.room_temperatures[&RoomType::Bedroom],
            19.0
        );
        assert_eq!(input.rooms[0].windows[0].glazing_type, GlazingType::Triple);
        assert_eq!(input.reason, CalculationReason::InitialCalculation);
    }

    #[rstest]
    fn should_reject_unknown_fields(mut request_json: serde_json::Value) {
        request_json["building"]["colour"] = json!("red");

        assert!(ingest_for_processing(request_json.to_string().as_bytes()).is_err());
    }

    #[rstest]
    fn should_refuse_room_with_door_missing_u_value(request_json: serde_json::Value) {
        let input = ingest_for_processing(request_json.to_string().as_bytes()).unwrap();

        assert_eq!(
            input.rooms_for_calculation(),
            Err(MissingRequiredFieldError::new("door", "d1", "u_value"))
        );
    }

    #[rstest]
    fn should_convert_room_when_door_u_value_present(mut request_json: serde_json::Value) {
        request_json["rooms"][0]["doors"][0]["u_value"] = json!(3.0);
        let input = ingest_for_processing(request_json.to_string().as_bytes()).unwrap();

        let rooms = input.rooms_for_calculation().unwrap();

        assert_eq!(rooms[0].doors[0].u_value, 3.0);
        assert_eq!(rooms[0].doors[0].area(), 1.6);
    }

    #[rstest]
    fn should_resolve_outside_temperature_from_postcode() {
        let climate = ClimateInput {
            postcode: Some("SW1A 1AA".to_string()),
            region: Some("scotland".to_string()),
            ..Default::default()
        };

        let resolved = climate.resolve(&StandardLookups).unwrap();

        assert_eq!(resolved.outside_design_temp, -1.8);
        assert_eq!(
            resolved.outside_design_temp_source,
            OutsideTemperatureSource::PostcodeLookup
        );
    }

    #[rstest]
    fn should_fall_back_to_region_when_postcode_unknown() {
        let climate = ClimateInput {
            postcode: Some("ZZ9 9ZZ".to_string()),
            region: Some("scotland".to_string()),
            ..Default::default()
        };

        let resolved = climate.resolve(&StandardLookups).unwrap();

        assert_eq!(resolved.outside_design_temp, -4.2);
        assert_eq!(
            resolved.outside_design_temp_source,
            OutsideTemperatureSource::RegionLookup
        );
    }

    #[rstest]
    fn should_prefer_supplied_outside_temperature() {
        let climate = ClimateInput {
            outside_design_temp: Some(-3.),
            postcode: Some("SW1A 1AA".to_string()),
            ..Default::default()
        };

        let resolved = climate.resolve(&StandardLookups).unwrap();

        assert_eq!(resolved.outside_design_temp, -3.);
        assert_eq!(
            resolved.outside_design_temp_source,
            OutsideTemperatureSource::UserSupplied
        );
    }

    #[rstest]
    fn should_error_when_outside_temperature_unresolvable() {
        assert!(ClimateInput::default().resolve(&StandardLookups).is_err());
    }
}
