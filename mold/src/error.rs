use thiserror::Error;

use crate::boolean::BooleanError;

/// Reasons a mold pipeline run aborts. The message is the diagnostic shown
/// to the user.
#[derive(Debug, Error)]
pub enum MoldError {
    /// Missing target or not a surface mesh. Nothing was mutated.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// No vertices or no vertical extent. Nothing was mutated.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
    /// The mesh being cut may hold the solver's partial output.
    #[error("boolean solver failed while {stage}: {source}")]
    BooleanSolverFailure {
        stage: String,
        source: BooleanError,
    },
    /// The top cut has been applied but the shell was not closed.
    #[error("no upward facing faces found near the cut at z = {height:.3}")]
    NoExtrusionFaces { height: f32 },
}

pub type MoldResult<T> = Result<T, MoldError>;

impl MoldError {
    pub(crate) fn boolean(stage: impl Into<String>) -> impl FnOnce(BooleanError) -> Self {
        let stage = stage.into();
        move |source| MoldError::BooleanSolverFailure { stage, source }
    }
}
