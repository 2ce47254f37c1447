//! Lookup tables the heat loss calculation draws U-values and design temperatures from.
//!
//! The calculation only depends on the [`LookupProvider`] trait, so an application can inject its
//! own tables (e.g. from a product database). [`StandardLookups`] carries typical UK values.

use crate::input::{GlazingType, RoomType};
use tracing::warn;

/// Tag used when a building does not state a construction type for an element.
pub const UNKNOWN_CONSTRUCTION: &str = "unknown";

/// U-value assumed for constructions that cannot be identified, in W/m2K (solid brick).
pub const FALLBACK_CONSTRUCTION_U_VALUE: f64 = 2.1;

pub trait LookupProvider: Sync {
    /// U-value in W/m2K for a wall, roof or floor construction tag.
    fn u_value_for_construction(&self, tag: &str) -> f64;

    /// U-value in W/m2K for a glazing type.
    fn u_value_for_glazing(&self, glazing_type: GlazingType) -> f64;

    /// Internal design temperature in degrees C for a type of room.
    fn target_temperature_for_room_type(&self, room_type: RoomType) -> f64;

    /// Outside design temperature in degrees C for a postcode or region, if known.
    fn outside_design_temperature(&self, postcode: Option<&str>, region: Option<&str>)
        -> Option<f64>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StandardLookups;

impl LookupProvider for StandardLookups {
    fn u_value_for_construction(&self, tag: &str) -> f64 {
        let normalised = normalise_tag(tag);
        match construction_u_value(&normalised) {
            Some(u_value) => u_value,
            None => {
                if normalised != UNKNOWN_CONSTRUCTION {
                    warn!(
                        construction = tag,
                        fallback = FALLBACK_CONSTRUCTION_U_VALUE,
                        "Unrecognised construction type, using fallback U-value"
                    );
                }
                FALLBACK_CONSTRUCTION_U_VALUE
            }
        }
    }

    fn u_value_for_glazing(&self, glazing_type: GlazingType) -> f64 {
        match glazing_type {
            GlazingType::Single => 4.8,
            GlazingType::Double => 2.8,
            GlazingType::DoubleLowE => 1.6,
            GlazingType::Triple => 1.0,
        }
    }

    fn target_temperature_for_room_type(&self, room_type: RoomType) -> f64 {
        match room_type {
            RoomType::LivingRoom | RoomType::DiningRoom | RoomType::Study => 21.,
            RoomType::Bathroom | RoomType::EnSuite => 22.,
            RoomType::Kitchen
            | RoomType::Bedroom
            | RoomType::Toilet
            | RoomType::Hall
            | RoomType::Landing
            | RoomType::Other => 18.,
            RoomType::Utility => 16.,
            RoomType::Conservatory => 21.,
        }
    }

    fn outside_design_temperature(
        &self,
        postcode: Option<&str>,
        region: Option<&str>,
    ) -> Option<f64> {
        postcode
            .and_then(|postcode| postcode_area_design_temperature(&postcode_area(postcode)))
            .or_else(|| region.and_then(|region| region_design_temperature(&normalise_tag(region))))
    }
}

fn normalise_tag(tag: &str) -> String {
    tag.trim().to_lowercase().replace(&[' ', '-'][..], "_")
}

fn construction_u_value(tag: &str) -> Option<f64> {
    Some(match tag {
        // walls
        "solid_brick" => 2.1,
        "solid_stone" => 1.7,
        "cavity_unfilled" => 1.5,
        "cavity_filled" => 0.55,
        "timber_frame" => 0.45,
        "system_built" => 1.0,
        "external_insulation" => 0.3,
        "insulated_modern" => 0.28,
        // roofs
        "pitched_uninsulated" => 2.3,
        "pitched_100mm" => 0.4,
        "pitched_200mm" => 0.2,
        "pitched_270mm" => 0.16,
        "flat_uninsulated" => 1.5,
        "flat_insulated" => 0.25,
        // floors
        "solid_uninsulated" => 0.7,
        "suspended_timber" => 0.8,
        "solid_insulated" => 0.25,
        "suspended_insulated" => 0.25,
        _ => return None,
    })
}

/// The leading letters of a UK postcode, e.g. "SW" for "SW1A 1AA".
fn postcode_area(postcode: &str) -> String {
    postcode
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn postcode_area_design_temperature(area: &str) -> Option<f64> {
    Some(match area {
        "E" | "EC" | "N" | "NW" | "SE" | "SW" | "W" | "WC" => -1.8,
        "B" => -3.4,
        "M" => -2.2,
        "L" => -1.9,
        "LS" => -2.8,
        "NE" => -3.0,
        "BS" => -2.2,
        "CF" => -2.0,
        "PL" => -0.3,
        "EH" => -3.4,
        "G" => -3.9,
        "AB" => -4.1,
        "BT" => -2.2,
        _ => return None,
    })
}

fn region_design_temperature(region: &str) -> Option<f64> {
    Some(match region {
        "london" => -1.8,
        "south_east" => -2.0,
        "south_west" => -0.7,
        "east_anglia" => -2.7,
        "midlands" => -3.4,
        "north_west" => -2.2,
        "north_east" => -3.0,
        "yorkshire" => -2.8,
        "wales" => -2.0,
        "scotland" => -4.2,
        "northern_ireland" => -2.4,
        _ => return None,
    })
}
