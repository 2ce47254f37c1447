//! Sanity heuristics over a calculated room heat loss.
//!
//! The same checks feed the plain messages returned by [`analyze_heat_loss_result`] and the
//! structured warnings on a provenance record.

use crate::core::heat_loss::room::HeatLossResult;
use crate::input::Room;

/// Typical UK rooms lose 40-120 W/m2; these bounds leave headroom either side.
pub const MIN_EXPECTED_LOSS_PER_M2: f64 = 30.;
pub const MAX_EXPECTED_LOSS_PER_M2: f64 = 150.;
pub const MIN_EXPECTED_FABRIC_RATIO: f64 = 0.4;
pub const MAX_EXPECTED_FABRIC_RATIO: f64 = 0.9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HeatLossAnomaly {
    LowLossDensity { loss_per_m2: f64 },
    HighLossDensity { loss_per_m2: f64 },
    HighVentilationShare { fabric_ratio: f64 },
    HighFabricShare { fabric_ratio: f64 },
}

impl HeatLossAnomaly {
    pub fn message(&self) -> String {
        match self {
            HeatLossAnomaly::LowLossDensity { loss_per_m2 } => format!(
                "Heat loss of {loss_per_m2:.1} W/m² is unusually low (typical range 40-120 W/m²)"
            ),
            HeatLossAnomaly::HighLossDensity { loss_per_m2 } => format!(
                "Heat loss of {loss_per_m2:.1} W/m² is unusually high (typical range 40-120 W/m²)"
            ),
            HeatLossAnomaly::HighVentilationShare { fabric_ratio } => format!(
                "Ventilation loss unusually high: fabric accounts for only {:.0}% of the total",
                fabric_ratio * 100.
            ),
            HeatLossAnomaly::HighFabricShare { fabric_ratio } => format!(
                "Fabric loss unusually dominant: fabric accounts for {:.0}% of the total",
                fabric_ratio * 100.
            ),
        }
    }
}

pub fn loss_per_m2(result: &HeatLossResult, room: &Room) -> Option<f64> {
    (room.area > 0.).then(|| result.total_loss / room.area)
}

pub fn fabric_ratio(result: &HeatLossResult) -> Option<f64> {
    (result.total_loss != 0.).then(|| result.fabric_loss / result.total_loss)
}

pub fn detect_anomalies(result: &HeatLossResult, room: &Room) -> Vec<HeatLossAnomaly> {
    let mut anomalies = vec![];

    if let Some(loss_per_m2) = loss_per_m2(result, room) {
        if loss_per_m2 < MIN_EXPECTED_LOSS_PER_M2 {
            anomalies.push(HeatLossAnomaly::LowLossDensity { loss_per_m2 });
        } else if loss_per_m2 > MAX_EXPECTED_LOSS_PER_M2 {
            anomalies.push(HeatLossAnomaly::HighLossDensity { loss_per_m2 });
        }
    }

    if let Some(fabric_ratio) = fabric_ratio(result) {
        if fabric_ratio < MIN_EXPECTED_FABRIC_RATIO {
            anomalies.push(HeatLossAnomaly::HighVentilationShare { fabric_ratio });
        } else if fabric_ratio > MAX_EXPECTED_FABRIC_RATIO {
            anomalies.push(HeatLossAnomaly::HighFabricShare { fabric_ratio });
        }
    }

    anomalies
}

pub fn analyze_heat_loss_result(result: &HeatLossResult, room: &Room) -> Vec<String> {
    detect_anomalies(result, room)
        .iter()
        .map(HeatLossAnomaly::message)
        .collect()
}
