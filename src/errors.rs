use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeatLossError {
    #[error("Request was considered invalid due to error: {0}")]
    InvalidRequest(#[from] anyhow::Error),
    #[error("Request is missing a mandatory field: {0}")]
    MissingRequiredField(#[from] MissingRequiredFieldError),
    #[error("Request failed strict validation: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
    #[error("Error while writing outputs: {0}")]
    FailureInOutput(OutputError),
}

/// A field that the calculation has no fallback for was not supplied.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{entity} '{id}' has no value for '{field}'")]
pub struct MissingRequiredFieldError {
    pub entity: &'static str,
    pub id: String,
    pub field: &'static str,
}

impl MissingRequiredFieldError {
    pub(crate) fn new(entity: &'static str, id: &str, field: &'static str) -> Self {
        Self {
            entity,
            id: id.to_string(),
            field,
        }
    }
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct OutputError {
    error: anyhow::Error,
}

impl OutputError {
    pub(crate) fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}
