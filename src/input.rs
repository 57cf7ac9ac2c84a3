use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::batch::BatchTable;
use crate::record::RawRecord;

/// Load a single client record from a JSON object file.
pub fn load_record(path: &Path) -> Result<RawRecord> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read record file at {}", path.display()))?;
    let doc: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("record file {} is not valid JSON", path.display()))?;
    let record = RawRecord::from_json(&doc)
        .with_context(|| format!("record file {} rejected", path.display()))?;
    info!(path = %path.display(), fields = record.len(), "loaded record input");
    Ok(record)
}

/// Load a batch table from a delimited file, or from stdin when `path` is `-`.
pub fn load_batch(path: &Path, delimiter: u8) -> Result<BatchTable> {
    if path == Path::new("-") {
        let mut buffer = Vec::new();
        io::stdin()
            .read_to_end(&mut buffer)
            .context("failed to read batch table from stdin")?;
        let table = BatchTable::from_reader(buffer.as_slice(), delimiter)
            .context("batch table from stdin rejected")?;
        info!(rows = table.len(), "loaded batch from stdin");
        return Ok(table);
    }

    let table = BatchTable::from_path(path, delimiter)
        .with_context(|| format!("batch file {} rejected", path.display()))?;
    info!(
        path = %path.display(),
        rows = table.len(),
        columns = table.headers().len(),
        "loaded batch input"
    );
    Ok(table)
}
