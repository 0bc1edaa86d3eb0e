// Labeled result tables.
//
// Every analyzer returns a `Table`. Rows are either moments (onset offsets,
// strictly increasing) or summary labels (distinct strings, in the order the
// producing analyzer chose). Columns are keyed by the analyzer that wrote
// them and the part (or part combination, like `0,1`) they describe. Cells
// are optional: a moment-aligned column has `None` wherever its part has no
// new value at that moment.
//
// Invariants maintained by every constructor:
// - every column has exactly one cell per row
// - moment rows are strictly increasing (sorted, no duplicates)
// - label rows contain no duplicates
//
// Tables built outside this crate go through `Table::try_new`, and
// deserialized tables through the same check, so lookups by row never see
// a short column or an unsorted index.

use crate::error::{AnalysisError, Result};
use crate::value::Value;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use vizitka_score::Offset;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowIndex {
    Moments(Vec<Offset>),
    Labels(Vec<String>),
}

impl RowIndex {
    pub fn len(&self) -> usize {
        match self {
            RowIndex::Moments(m) => m.len(),
            RowIndex::Labels(l) => l.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn alignment(&self) -> Alignment {
        match self {
            RowIndex::Moments(_) => Alignment::Moments,
            RowIndex::Labels(_) => Alignment::Summary,
        }
    }
}

/// What a table's rows are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alignment {
    Moments,
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnKey {
    pub analyzer: String,
    pub part: String,
}

impl ColumnKey {
    pub fn new(analyzer: impl Into<String>, part: impl Into<String>) -> Self {
        ColumnKey {
            analyzer: analyzer.into(),
            part: part.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub key: ColumnKey,
    pub cells: Vec<Option<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    index: RowIndex,
    columns: Vec<Column>,
}

#[derive(Deserialize)]
struct RawTable {
    index: RowIndex,
    columns: Vec<Column>,
}

impl TryFrom<RawTable> for Table {
    type Error = AnalysisError;

    fn try_from(raw: RawTable) -> Result<Self> {
        Table::try_new(raw.index, raw.columns)
    }
}

impl Table {
    /// Build a table from an index and columns produced in this crate.
    /// Columns shorter or longer than the index are padded with `None` or
    /// truncated.
    pub(crate) fn new(index: RowIndex, mut columns: Vec<Column>) -> Self {
        let rows = index.len();
        for column in &mut columns {
            column.cells.resize(rows, None);
        }
        Table { index, columns }
    }

    /// Build a table, checking that moments are strictly increasing, labels
    /// are distinct, and every column has one cell per row.
    pub fn try_new(index: RowIndex, columns: Vec<Column>) -> Result<Self> {
        let malformed = |reason: String| AnalysisError::MalformedTable { reason };
        match &index {
            RowIndex::Moments(moments) => {
                if let Some(pair) = moments.windows(2).find(|w| w[0] >= w[1]) {
                    return Err(malformed(format!(
                        "moment {} does not follow {}",
                        pair[1].quarters(),
                        pair[0].quarters()
                    )));
                }
            }
            RowIndex::Labels(labels) => {
                let mut seen = BTreeSet::new();
                if let Some(repeat) = labels.iter().find(|l| !seen.insert(l.as_str())) {
                    return Err(malformed(format!("label '{repeat}' appears twice")));
                }
            }
        }
        if let Some(column) = columns.iter().find(|c| c.cells.len() != index.len()) {
            return Err(malformed(format!(
                "column {}/{} has {} cells for {} rows",
                column.key.analyzer,
                column.key.part,
                column.cells.len(),
                index.len()
            )));
        }
        Ok(Table { index, columns })
    }

    pub fn empty_moments() -> Self {
        Table::new(RowIndex::Moments(Vec::new()), Vec::new())
    }

    /// One column per `(part, series)`; the row index is the sorted union
    /// of every series' offsets. A repeated offset within one series keeps
    /// the last value.
    pub fn from_moment_series(analyzer: &str, series: Vec<(String, Vec<(Offset, Value)>)>) -> Self {
        let moments: Vec<Offset> = series
            .iter()
            .flat_map(|(_, s)| s.iter().map(|(off, _)| *off))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let columns = series
            .into_iter()
            .map(|(part, values)| {
                let mut cells = vec![None; moments.len()];
                for (off, value) in values {
                    if let Ok(row) = moments.binary_search(&off) {
                        cells[row] = Some(value);
                    }
                }
                Column {
                    key: ColumnKey::new(analyzer, part),
                    cells,
                }
            })
            .collect();
        Table::new(RowIndex::Moments(moments), columns)
    }

    /// One column per `(part, series)`; labels appear in first-seen order
    /// across all series.
    pub fn from_label_series(analyzer: &str, series: Vec<(String, Vec<(String, Value)>)>) -> Self {
        let mut labels: Vec<String> = Vec::new();
        let mut positions: FxHashMap<String, usize> = FxHashMap::default();
        for (_, values) in &series {
            for (label, _) in values {
                if !positions.contains_key(label) {
                    positions.insert(label.clone(), labels.len());
                    labels.push(label.clone());
                }
            }
        }
        let columns = series
            .into_iter()
            .map(|(part, values)| {
                let mut cells = vec![None; labels.len()];
                for (label, value) in values {
                    cells[positions[&label]] = Some(value);
                }
                Column {
                    key: ColumnKey::new(analyzer, part),
                    cells,
                }
            })
            .collect();
        Table::new(RowIndex::Labels(labels), columns)
    }

    pub fn index(&self) -> &RowIndex {
        &self.index
    }

    pub fn alignment(&self) -> Alignment {
        self.index.alignment()
    }

    pub fn is_moment_aligned(&self) -> bool {
        self.alignment() == Alignment::Moments
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn moments(&self) -> Option<&[Offset]> {
        match &self.index {
            RowIndex::Moments(m) => Some(m),
            RowIndex::Labels(_) => None,
        }
    }

    pub fn labels(&self) -> Option<&[String]> {
        match &self.index {
            RowIndex::Labels(l) => Some(l),
            RowIndex::Moments(_) => None,
        }
    }

    /// Moment index, or `NotMomentAligned` naming the analyzer that needed it.
    pub fn require_moments(&self, analyzer: &str) -> Result<&[Offset]> {
        self.moments().ok_or_else(|| AnalysisError::NotMomentAligned {
            analyzer: analyzer.to_string(),
        })
    }

    pub fn require_labels(&self, analyzer: &str) -> Result<&[String]> {
        self.labels().ok_or_else(|| AnalysisError::NotSummary {
            analyzer: analyzer.to_string(),
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Part labels of all columns, in column order.
    pub fn parts(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.key.part.as_str()).collect()
    }

    /// First column describing `part`.
    pub fn column(&self, part: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.key.part == part)
    }

    pub fn cell(&self, row: usize, part: &str) -> Option<&Value> {
        self.column(part)?.cells.get(row)?.as_ref()
    }

    /// Cell of `part` at exactly moment `at`.
    pub fn value_at(&self, part: &str, at: Offset) -> Option<&Value> {
        let row = self.moments()?.binary_search(&at).ok()?;
        self.cell(row, part)
    }

    /// Value of `label` in `part` for a summary table.
    pub fn value_for(&self, part: &str, label: &str) -> Option<&Value> {
        let row = self.labels()?.iter().position(|l| l == label)?;
        self.cell(row, part)
    }

    /// The `(moment, value)` pairs of one column where a value is present.
    pub fn series(&self, column: &Column) -> Vec<(Offset, Value)> {
        let Some(moments) = self.moments() else {
            return Vec::new();
        };
        moments
            .iter()
            .zip(&column.cells)
            .filter_map(|(off, cell)| cell.clone().map(|v| (*off, v)))
            .collect()
    }

    /// Copy with every empty cell filled from the closest earlier value in
    /// its column.
    pub fn ffill(&self) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let mut last: Option<Value> = None;
                let cells = c
                    .cells
                    .iter()
                    .map(|cell| {
                        if cell.is_some() {
                            last.clone_from(cell);
                        }
                        last.clone()
                    })
                    .collect();
                Column {
                    key: c.key.clone(),
                    cells,
                }
            })
            .collect();
        Table::new(self.index.clone(), columns)
    }

    /// Copy with every column's part prefixed, e.g. `Chorale: 0,1`.
    pub fn relabel_parts(&self, prefix: &str) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                key: ColumnKey::new(c.key.analyzer.clone(), format!("{prefix}: {}", c.key.part)),
                cells: c.cells.clone(),
            })
            .collect();
        Table::new(self.index.clone(), columns)
    }

    /// Column-wise union: rows are the union of the tables' rows (sorted
    /// for moments, first-seen order for labels), columns are appended in
    /// order. All tables must share one alignment.
    pub fn concat(tables: &[Table]) -> Result<Table> {
        let Some(first) = tables.first() else {
            return Ok(Table::empty_moments());
        };
        let alignment = first.alignment();
        if tables.iter().any(|t| t.alignment() != alignment) {
            return Err(AnalysisError::MixedAlignment);
        }

        let index = match alignment {
            Alignment::Moments => RowIndex::Moments(
                tables
                    .iter()
                    .flat_map(|t| t.moments().unwrap_or_default().iter().copied())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect(),
            ),
            Alignment::Summary => {
                let mut labels: Vec<String> = Vec::new();
                for label in tables.iter().flat_map(|t| t.labels().unwrap_or_default()) {
                    if !labels.contains(label) {
                        labels.push(label.clone());
                    }
                }
                RowIndex::Labels(labels)
            }
        };

        let mut columns = Vec::new();
        for table in tables {
            let rows = table.row_positions(&index);
            for c in &table.columns {
                let mut cells = vec![None; index.len()];
                for (cell, row) in c.cells.iter().zip(&rows) {
                    cells[*row].clone_from(cell);
                }
                columns.push(Column {
                    key: c.key.clone(),
                    cells,
                });
            }
        }
        Ok(Table::new(index, columns))
    }

    /// Sum summary tables label-wise. Columns with the same key are added
    /// together; the result is integer when every summed value is an integer.
    pub fn sum_summaries(tables: &[Table]) -> Result<Table> {
        if tables.iter().any(|t| !matches!(t.alignment(), Alignment::Summary)) {
            return Err(AnalysisError::MixedAlignment);
        }
        let mut keys: Vec<ColumnKey> = Vec::new();
        let mut sums: FxHashMap<(ColumnKey, String), Value> = FxHashMap::default();
        let mut labels: Vec<String> = Vec::new();

        for table in tables {
            let table_labels = table.labels().unwrap_or_default();
            for column in &table.columns {
                if !keys.contains(&column.key) {
                    keys.push(column.key.clone());
                }
                for (label, cell) in table_labels.iter().zip(&column.cells) {
                    let Some(value) = cell else { continue };
                    if !labels.contains(label) {
                        labels.push(label.clone());
                    }
                    let slot = (column.key.clone(), label.clone());
                    let next = match sums.remove(&slot) {
                        Some(prev) => add_values(&prev, value),
                        None => value.clone(),
                    };
                    sums.insert(slot, next);
                }
            }
        }

        let columns = keys
            .into_iter()
            .map(|key| {
                let cells = labels
                    .iter()
                    .map(|label| sums.get(&(key.clone(), label.clone())).cloned())
                    .collect();
                Column { key, cells }
            })
            .collect();
        Ok(Table::new(RowIndex::Labels(labels), columns))
    }

    /// Row in `target` for each of this table's rows. `target` must contain
    /// all of them.
    fn row_positions(&self, target: &RowIndex) -> Vec<usize> {
        match (&self.index, target) {
            (RowIndex::Moments(own), RowIndex::Moments(all)) => own
                .iter()
                .map(|m| all.binary_search(m).unwrap_or_default())
                .collect(),
            (RowIndex::Labels(own), RowIndex::Labels(all)) => own
                .iter()
                .map(|l| all.iter().position(|x| x == l).unwrap_or_default())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Numeric sum; text values are not summable and keep the left operand.
pub(crate) fn add_values(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Value::Int(x + y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Value::Float(x + y),
            _ => a.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn off(q: f64) -> Offset {
        Offset::from_quarters(q)
    }

    #[test]
    fn moment_series_union_is_sorted_and_unique() {
        let table = Table::from_moment_series(
            "noterest",
            vec![
                ("0".into(), vec![(off(0.0), "C4".into()), (off(2.0), "D4".into())]),
                ("1".into(), vec![(off(0.0), "C3".into()), (off(1.0), "G3".into())]),
            ],
        );
        assert_eq!(table.moments().unwrap(), &[off(0.0), off(1.0), off(2.0)]);
        assert_eq!(table.value_at("0", off(1.0)), None);
        assert_eq!(table.value_at("1", off(1.0)), Some(&Value::from("G3")));
        assert!(table.columns().iter().all(|c| c.cells.len() == 3));
    }

    #[test]
    fn ffill_carries_values_forward() {
        let table = Table::from_moment_series(
            "x",
            vec![
                ("0".into(), vec![(off(0.0), "A".into())]),
                ("1".into(), vec![(off(1.0), "B".into())]),
            ],
        );
        let filled = table.ffill();
        assert_eq!(filled.value_at("0", off(1.0)), Some(&Value::from("A")));
        assert_eq!(filled.value_at("1", off(0.0)), None);
    }

    #[test]
    fn concat_rejects_mixed_alignment() {
        let moments = Table::empty_moments();
        let summary = Table::from_label_series("f", vec![("0".into(), vec![("a".into(), Value::Int(1))])]);
        assert!(matches!(
            Table::concat(&[moments, summary]),
            Err(AnalysisError::MixedAlignment)
        ));
    }

    #[test]
    fn try_new_rejects_malformed_shapes() {
        let column = |n: usize| Column {
            key: ColumnKey::new("x", "0"),
            cells: vec![Some(Value::Int(1)); n],
        };
        assert!(Table::try_new(RowIndex::Moments(vec![off(0.0), off(1.0)]), vec![column(2)]).is_ok());
        for (index, cells) in [
            (RowIndex::Moments(vec![off(0.0), off(1.0)]), 1),
            (RowIndex::Moments(vec![off(0.0), off(1.0)]), 3),
            (RowIndex::Moments(vec![off(1.0), off(0.0)]), 2),
            (RowIndex::Moments(vec![off(1.0), off(1.0)]), 2),
            (RowIndex::Labels(vec!["a".into(), "a".into()]), 2),
        ] {
            assert!(matches!(
                Table::try_new(index, vec![column(cells)]),
                Err(AnalysisError::MalformedTable { .. })
            ));
        }
    }

    #[test]
    fn deserializing_checks_the_shape() {
        let good = Table::from_moment_series("x", vec![("0".into(), vec![(off(0.0), Value::Int(1))])]);
        let json = serde_json::to_string(&good).unwrap();
        assert_eq!(serde_json::from_str::<Table>(&json).unwrap(), good);

        let mut raw: serde_json::Value = serde_json::from_str(&json).unwrap();
        raw["columns"][0]["cells"] = serde_json::json!([]);
        let err = serde_json::from_value::<Table>(raw).unwrap_err();
        assert!(err.to_string().contains("0 cells for 1 rows"));
    }

    #[test]
    fn concat_unions_moments() {
        let a = Table::from_moment_series("x", vec![("0".into(), vec![(off(0.0), Value::Int(1))])])
            .relabel_parts("A");
        let b = Table::from_moment_series("x", vec![("0".into(), vec![(off(1.0), Value::Int(2))])])
            .relabel_parts("B");
        let both = Table::concat(&[a, b]).unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(both.parts(), vec!["A: 0", "B: 0"]);
        assert_eq!(both.value_at("B: 0", off(1.0)), Some(&Value::Int(2)));
        assert_eq!(both.value_at("B: 0", off(0.0)), None);
    }

    #[test]
    fn sum_summaries_adds_by_label() {
        let a = Table::from_label_series(
            "frequency",
            vec![("0".into(), vec![("M3".into(), Value::Int(2)), ("P5".into(), Value::Int(1))])],
        );
        let b = Table::from_label_series(
            "frequency",
            vec![("0".into(), vec![("P5".into(), Value::Int(3)), ("m6".into(), Value::Int(1))])],
        );
        let sum = Table::sum_summaries(&[a, b]).unwrap();
        assert_eq!(sum.value_for("0", "M3"), Some(&Value::Int(2)));
        assert_eq!(sum.value_for("0", "P5"), Some(&Value::Int(4)));
        assert_eq!(sum.value_for("0", "m6"), Some(&Value::Int(1)));
    }

    #[test]
    fn serializes_to_json() {
        let table = Table::from_label_series("f", vec![("0".into(), vec![("a".into(), Value::Int(1))])]);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["index"]["labels"][0], "a");
        assert_eq!(json["columns"][0]["key"]["analyzer"], "f");
        assert_eq!(json["columns"][0]["cells"][0], 1);
    }
}
