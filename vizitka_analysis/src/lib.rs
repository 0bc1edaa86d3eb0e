// Vizitka analyzers and result tables.
//
// Analyzers turn a score, or tables derived from it, into a `Table`.
// Indexers produce tables whose rows are moments (onset offsets);
// experimenters produce summary tables with labelled rows. Analyzers are
// chained by name: each step consumes the previous step's table, and the
// chain is resolved and validated against a `Registry` before it runs.
//
// Architecture:
// - table.rs / value.rs: `Table`, `RowIndex`, `Column`, cell `Value`s
// - settings.rs: `Settings` maps, typed getters, per-analyzer `SettingSpec`s
// - analyzer.rs: the `Analyzer` trait, `Signature`, `Inputs`
// - registry.rs: long/short name lookup of built-in analyzers
// - chain.rs: `ChainResolver`, `ResolvedChain`, chain validation
// - indexers/: noterest and multistop, duration, meter and ties,
//   intervals, consonance, active voices, n-grams, windows
// - experimenters/: frequency, aggregator
//
// Running resolved chains, caching, and multi-piece fan-out live in the
// model crate; this crate has no notion of a piece beyond a `Score`.

pub mod analyzer;
pub mod chain;
pub mod error;
pub mod experimenters;
pub mod indexers;
pub mod registry;
pub mod settings;
pub mod table;
pub mod value;

pub use analyzer::{Accepts, Analyzer, AnalyzerKind, DirectInput, Inputs, Signature};
pub use chain::{ChainResolver, ChainSettings, ResolvedChain, ResolvedInput, ResolvedStep};
pub use error::{AnalysisError, ChainError, Result};
pub use registry::Registry;
pub use settings::{SettingDefault, SettingKind, SettingSpec, Settings};
pub use table::{Alignment, Column, ColumnKey, RowIndex, Table};
pub use value::Value;
