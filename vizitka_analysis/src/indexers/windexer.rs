// Sliding windows over a moment-aligned table.
//
// Each row of the output stands for the `window_size` consecutive input
// rows starting at that moment. A column's cell joins the values present
// in its window with spaces, so a window over noterest reads `E4 G4 E4`.
// The last `window_size - 1` rows start no full window and are dropped. A
// window larger than the input table is an error.

use crate::analyzer::{Accepts, Analyzer, AnalyzerKind, Inputs, Signature};
use crate::error::{AnalysisError, Result};
use crate::settings::{SettingDefault, SettingKind, SettingSpec, Settings};
use crate::table::{Column, ColumnKey, RowIndex, Table};
use crate::value::Value;

pub struct WindexerIndexer;

const SETTINGS: &[SettingSpec] = &[SettingSpec::new(
    "window_size",
    SettingKind::AtLeast(1),
    SettingDefault::Unsigned(4),
)];

impl Analyzer for WindexerIndexer {
    fn name(&self) -> &'static str {
        "windexer"
    }

    fn short_name(&self) -> &'static str {
        "wi"
    }

    fn signature(&self) -> Signature {
        Signature {
            kind: AnalyzerKind::Indexer,
            accepts: Accepts::Moments,
            default_source: Some("noterest"),
            requires: &[],
        }
    }

    fn possible_settings(&self) -> &'static [SettingSpec] {
        SETTINGS
    }

    fn run(&self, inputs: &Inputs<'_>, settings: &Settings) -> Result<Table> {
        let input = inputs.moments(self.name())?;
        let moments = input.require_moments(self.name())?;
        let size = (settings.unsigned(self.name(), "window_size")? as usize).max(1);
        if size > moments.len() {
            return Err(AnalysisError::Failed {
                analyzer: self.name().to_string(),
                reason: format!("window of {size} rows is larger than the {} input rows", moments.len()),
            });
        }

        let starts = moments.len() - size + 1;
        let columns = input
            .columns()
            .iter()
            .map(|column| Column {
                key: ColumnKey::new(self.name(), column.key.part.clone()),
                cells: column.cells.windows(size).map(join_window).collect(),
            })
            .collect();
        Ok(Table::new(RowIndex::Moments(moments[..starts].to_vec()), columns))
    }
}

fn join_window(window: &[Option<Value>]) -> Option<Value> {
    let present: Vec<String> = window.iter().flatten().map(Value::to_string).collect();
    (!present.is_empty()).then(|| Value::Text(present.join(" ")))
}
