// Error types for analyzers and chain resolution.
//
// `AnalysisError` covers everything that can go wrong while configuring or
// running a single analyzer. `ChainError` covers chains that are rejected
// before any analyzer runs: unknown names, and pipelines whose steps cannot
// consume their predecessor's output.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{analyzer}: missing required setting '{setting}'")]
    MissingSetting {
        analyzer: String,
        setting: String,
    },

    #[error("{analyzer}: setting '{setting}' expects {expected}, got {found}")]
    InvalidSetting {
        analyzer: String,
        setting: String,
        expected: String,
        found: String,
    },

    #[error("{analyzer}: unknown setting '{setting}' (recognised: {possible})")]
    UnknownSetting {
        analyzer: String,
        setting: String,
        possible: String,
    },

    #[error("{analyzer}: input table is not moment-aligned")]
    NotMomentAligned { analyzer: String },

    #[error("{analyzer}: input table is not a summary")]
    NotSummary { analyzer: String },

    #[error("{analyzer}: missing input '{input}'")]
    MissingInput { analyzer: String, input: String },

    #[error("{analyzer}: no column labelled '{column}' in input")]
    UnknownColumn { analyzer: String, column: String },

    #[error("cannot combine moment-aligned and summary tables")]
    MixedAlignment,

    #[error("malformed table: {reason}")]
    MalformedTable { reason: String },

    #[error("{analyzer} failed: {reason}")]
    Failed { analyzer: String, reason: String },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("analyzer chain is empty")]
    Empty,

    #[error("unknown analyzer '{name}' (known: {known})")]
    UnknownAnalyzer { name: String, known: String },

    #[error("{analyzer} reads the score and cannot follow {previous}")]
    ScoreInputAfter { analyzer: String, previous: String },

    #[error(
        "{analyzer} needs moment-aligned input but {previous} produces a summary, \
         and {analyzer} has no moment-aligned input of its own"
    )]
    MomentsLost { analyzer: String, previous: String },

    #[error("{analyzer} needs a summary input but {previous} produces moments")]
    SummaryExpected { analyzer: String, previous: String },

    #[error("{analyzer} reads output of {expected}, not of {previous}")]
    WrongProducer {
        analyzer: String,
        previous: String,
        expected: String,
    },

    #[error("{analyzer} cannot start a chain and has no default input")]
    NoSource { analyzer: String },

    #[error("analyzer inputs nest deeper than {limit} levels at {analyzer}")]
    TooDeep { analyzer: String, limit: usize },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
