pub mod analysis;
pub mod heat_loss;
pub mod lookups;
pub mod overrides;
pub mod provenance;
pub mod validation;
