// A collection of pieces analyzed together.
//
// `AggregatedPieces::get` resolves the chain once against the shared
// registry and configuration, so chain and settings errors surface before
// any piece runs. Each piece then runs the resolved chain against its own
// cache. With `AnalysisConfig::parallel` the pieces run on the rayon pool
// via `par_iter_mut`; no locking is needed because every cache is owned by
// its piece. Outcomes are returned in piece order either way.
//
// A piece that fails (unreadable file, analyzer error on that piece) does
// not abort the batch: its outcome is `PieceOutcome::Failed` and the
// remaining pieces still produce tables.
//
// Concatenated columns are prefixed with the piece title. Titles repeat in
// real collections (two settings of one chorale), so a repeated title gets
// a `_2`, `_3`, ... suffix in piece order to keep every column key unique.

use crate::config::AnalysisConfig;
use crate::error::{ModelError, Result};
use crate::indexed_piece::IndexedPiece;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use vizitka_analysis::{ChainResolver, ChainSettings, Registry, ResolvedChain, Table};

/// How per-piece tables are merged into `AggregatedResult::combined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combination {
    /// No combined table.
    #[default]
    PerPiece,
    /// Column-wise union; each column is prefixed with its piece title.
    Concatenate,
    /// Summary tables added label by label.
    Sum,
}

#[derive(Debug)]
pub enum PieceOutcome {
    Analyzed { title: String, table: Arc<Table> },
    Failed { title: String, error: ModelError },
}

impl PieceOutcome {
    pub fn title(&self) -> &str {
        match self {
            PieceOutcome::Analyzed { title, .. } | PieceOutcome::Failed { title, .. } => title,
        }
    }

    pub fn table(&self) -> Option<&Arc<Table>> {
        match self {
            PieceOutcome::Analyzed { table, .. } => Some(table),
            PieceOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug)]
pub struct AggregatedResult {
    /// One outcome per piece, in piece order.
    pub outcomes: Vec<PieceOutcome>,
    pub combined: Option<Table>,
}

impl AggregatedResult {
    pub fn successes(&self) -> impl Iterator<Item = (&str, &Arc<Table>)> {
        self.outcomes.iter().filter_map(|o| match o {
            PieceOutcome::Analyzed { title, table } => Some((title.as_str(), table)),
            PieceOutcome::Failed { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ModelError)> {
        self.outcomes.iter().filter_map(|o| match o {
            PieceOutcome::Failed { title, error } => Some((title.as_str(), error)),
            PieceOutcome::Analyzed { .. } => None,
        })
    }
}

/// Metadata gathered across a collection. Lists follow piece order and
/// skip pieces that do not set the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedMetadata {
    pub titles: Vec<String>,
    pub composers: Vec<String>,
    pub dates: Vec<String>,
    /// Earliest and latest year among `dates`.
    pub date_range: Option<(u32, u32)>,
    pub locales: Vec<String>,
    pub pathnames: Vec<String>,
}

pub struct AggregatedPieces {
    pieces: Vec<IndexedPiece>,
    registry: Arc<Registry>,
    config: Arc<AnalysisConfig>,
}

impl AggregatedPieces {
    pub fn new(pieces: Vec<IndexedPiece>) -> Self {
        Self::with_config(pieces, AnalysisConfig::default())
    }

    /// A collection whose pieces all share `config` and the default
    /// registry.
    pub fn with_config(pieces: Vec<IndexedPiece>, config: AnalysisConfig) -> Self {
        Self::with_registry(pieces, Arc::new(Registry::with_defaults()), config)
    }

    /// A collection whose pieces all resolve chains against `registry`.
    /// Each piece's cache is cleared.
    pub fn with_registry(pieces: Vec<IndexedPiece>, registry: Arc<Registry>, config: AnalysisConfig) -> Self {
        let config = Arc::new(config);
        let pieces = pieces
            .into_iter()
            .map(|p| p.with_registry(Arc::clone(&registry)).with_config(Arc::clone(&config)))
            .collect();
        AggregatedPieces {
            pieces,
            registry,
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn pieces(&self) -> &[IndexedPiece] {
        &self.pieces
    }

    pub fn pieces_mut(&mut self) -> &mut [IndexedPiece] {
        &mut self.pieces
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Take the pieces back out, caches intact.
    pub fn into_pieces(self) -> Vec<IndexedPiece> {
        self.pieces
    }

    /// Run `chain` on every piece and optionally combine the results.
    pub fn get(
        &mut self,
        chain: &[&str],
        settings: &ChainSettings,
        parts: Option<&[&str]>,
        combination: Combination,
    ) -> Result<AggregatedResult> {
        if self.pieces.is_empty() {
            return Err(ModelError::NoPieces);
        }
        let resolved = ChainResolver::new(&self.registry, &self.config.defaults, settings).resolve(chain)?;
        info!(
            chain = ?resolved.names(),
            pieces = self.pieces.len(),
            parallel = self.config.parallel,
            "Running chain on collection"
        );

        let outcomes: Vec<PieceOutcome> = if self.config.parallel {
            self.pieces
                .par_iter_mut()
                .map(|piece| run_piece(piece, &resolved, parts))
                .collect()
        } else {
            self.pieces
                .iter_mut()
                .map(|piece| run_piece(piece, &resolved, parts))
                .collect()
        };

        let combined = combine(&outcomes, combination)?;
        Ok(AggregatedResult { outcomes, combined })
    }

    /// Clear every piece's cache.
    pub fn clear_cache(&mut self) {
        for piece in &mut self.pieces {
            piece.clear_cache();
        }
    }

    /// Metadata across all pieces. Pieces whose scores fail to load are
    /// logged and left out.
    pub fn metadata(&mut self) -> AggregatedMetadata {
        let mut out = AggregatedMetadata::default();
        for piece in &mut self.pieces {
            let fallback_title = piece.title();
            let meta = match piece.metadata() {
                Ok(meta) => meta,
                Err(error) => {
                    warn!(title = %fallback_title, %error, "Skipping piece metadata");
                    continue;
                }
            };
            out.titles.push(meta.title.clone());
            out.composers.extend(meta.composer.clone());
            out.dates.extend(meta.date.clone());
            out.locales.extend(meta.locale_of_composition.clone());
            if !meta.pathname.is_empty() {
                out.pathnames.push(meta.pathname.clone());
            }
        }
        out.date_range = make_date_range(&out.dates);
        out
    }
}

fn run_piece(piece: &mut IndexedPiece, chain: &ResolvedChain, parts: Option<&[&str]>) -> PieceOutcome {
    match piece.run_resolved(chain, parts) {
        Ok(table) => PieceOutcome::Analyzed {
            title: piece.title(),
            table,
        },
        Err(error) => {
            let title = piece.title();
            warn!(%title, %error, recoverable = error.is_recoverable(), "Piece failed");
            PieceOutcome::Failed { title, error }
        }
    }
}

fn combine(outcomes: &[PieceOutcome], combination: Combination) -> Result<Option<Table>> {
    let tables: Vec<(&str, &Arc<Table>)> = outcomes
        .iter()
        .filter_map(|o| o.table().map(|t| (o.title(), t)))
        .collect();
    if tables.is_empty() {
        return Ok(None);
    }
    match combination {
        Combination::PerPiece => Ok(None),
        Combination::Concatenate => {
            let prefixes = unique_titles(tables.iter().map(|(title, _)| *title));
            let relabelled: Vec<Table> = tables
                .iter()
                .zip(&prefixes)
                .map(|((_, t), prefix)| t.relabel_parts(prefix))
                .collect();
            Ok(Some(Table::concat(&relabelled)?))
        }
        Combination::Sum => {
            let owned: Vec<Table> = tables.iter().map(|(_, t)| Table::clone(t)).collect();
            Ok(Some(Table::sum_summaries(&owned)?))
        }
    }
}

/// `titles` with repeats suffixed `_2`, `_3`, ... so that no two are equal.
fn unique_titles<'a>(titles: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut used = HashSet::new();
    titles
        .map(|title| {
            let mut label = title.to_string();
            let mut n = 1;
            while !used.insert(label.clone()) {
                n += 1;
                label = format!("{title}_{n}");
            }
            label
        })
        .collect()
}

/// Earliest and latest year in `dates`. Each date is `YYYY/MM/DD`
/// (month and day optional) or a range `YYYY/MM/DD to YYYY/MM/DD`.
/// Unparseable dates are ignored.
pub fn make_date_range(dates: &[String]) -> Option<(u32, u32)> {
    let years: BTreeSet<u32> = dates
        .iter()
        .flat_map(|date| date.split(" to "))
        .filter_map(|part| part.trim().split('/').next()?.trim().parse().ok())
        .collect();
    Some((*years.first()?, *years.last()?))
}
