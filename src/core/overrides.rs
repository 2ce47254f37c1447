use crate::core::heat_loss::room::HeatLossResult;
use crate::core::provenance::{CalculationProvenance, Override};
use chrono::Utc;
use serde_json::json;
use tracing::info;

pub const REQUIRED_OUTPUT_FIELD: &str = "required_output";

/// Replace the required emitter output of a calculated room with a manually chosen figure.
///
/// Neither argument is modified. The returned result is flagged as overridden and the returned
/// provenance carries one more [`Override`] entry recording the original figure.
pub fn apply_required_output_override(
    result: &HeatLossResult,
    provenance: &CalculationProvenance,
    required_output: f64,
    reason: &str,
    overridden_by: &str,
) -> (HeatLossResult, CalculationProvenance) {
    info!(
        room = result.room_id.as_str(),
        from = result.required_output,
        to = required_output,
        by = overridden_by,
        "Overriding required output"
    );

    let record = Override {
        field: REQUIRED_OUTPUT_FIELD.to_string(),
        original_value: json!(result.required_output),
        override_value: json!(required_output),
        reason: reason.to_string(),
        overridden_by: overridden_by.to_string(),
        overridden_at: Utc::now(),
    };

    (
        HeatLossResult {
            required_output,
            overridden: true,
            ..result.clone()
        },
        provenance.clone().with_override(record),
    )
}
