// Error type for the model layer.
//
// Errors split into two groups. Per-piece errors (a score that fails to
// load, an analyzer that fails on one piece) are recoverable: a batch
// records them against the piece and carries on. Everything else (bad
// chains, bad settings, unreadable input locations) stops the call.

use std::path::PathBuf;
use thiserror::Error;
use vizitka_analysis::{AnalysisError, ChainError};
use vizitka_score::ScoreError;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("No pieces to analyze")]
    NoPieces,

    #[error("No score files found in '{0}'")]
    NoFiles(PathBuf),

    #[error("Cannot import '{0}': not a file or directory")]
    UnknownInput(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ChainError> for ModelError {
    fn from(err: ChainError) -> Self {
        ModelError::Analysis(err.into())
    }
}

impl ModelError {
    /// True for errors confined to one piece, which a batch skips.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ModelError::Score(_) => true,
            ModelError::Analysis(err) => !matches!(
                err,
                AnalysisError::Chain(_)
                    | AnalysisError::MissingSetting { .. }
                    | AnalysisError::InvalidSetting { .. }
                    | AnalysisError::UnknownSetting { .. }
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_piece_errors_are_recoverable() {
        let load = ModelError::from(ScoreError::NotFound(PathBuf::from("x.mid")));
        assert!(load.is_recoverable());
        let failed = ModelError::from(AnalysisError::Failed {
            analyzer: "vertical_interval".into(),
            reason: "bad pitch".into(),
        });
        assert!(failed.is_recoverable());
    }

    #[test]
    fn configuration_errors_are_fatal() {
        assert!(!ModelError::from(ChainError::Empty).is_recoverable());
        assert!(!ModelError::NoPieces.is_recoverable());
        let unknown = ModelError::from(AnalysisError::UnknownSetting {
            analyzer: "ngram".into(),
            setting: "m".into(),
            possible: "n".into(),
        });
        assert!(!unknown.is_recoverable());
    }
}
