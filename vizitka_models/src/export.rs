// Table export.

use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;
use vizitka_analysis::Table;

/// Write `table` to `path` as pretty-printed JSON.
pub fn write_table_json(table: &Table, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, table)?;
    writer.flush()?;
    debug!(path = %path.display(), rows = table.len(), "Exported table");
    Ok(())
}
