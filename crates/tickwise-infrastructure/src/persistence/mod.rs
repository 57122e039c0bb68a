//! Append-only CSV stores. An append is complete (flushed and synced) before it returns.

pub mod ledger_csv;
pub mod valuation_csv;

pub use ledger_csv::CsvLedgerRepository;
pub use valuation_csv::CsvValuationRepository;

use std::fs::{self, OpenOptions};
use std::path::Path;

/// Appends one row, writing `header` first when the file is new or empty.
fn append_row(path: &Path, header: &[&str], row: &[String]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("failed to create dir {}: {}", parent.display(), err))?;
        }
    }
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format!("failed to open {}: {}", path.display(), err))?;

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if needs_header {
        wtr.write_record(header)
            .map_err(|err| format!("failed to write header to {}: {}", path.display(), err))?;
    }
    wtr.write_record(row)
        .map_err(|err| format!("failed to append to {}: {}", path.display(), err))?;
    wtr.flush()
        .map_err(|err| format!("failed to flush {}: {}", path.display(), err))?;
    let file = wtr
        .into_inner()
        .map_err(|err| format!("failed to finish {}: {}", path.display(), err))?;
    file.sync_all()
        .map_err(|err| format!("failed to sync {}: {}", path.display(), err))
}

/// Opens a store for reading. A missing file is an empty store.
fn open_reader(path: &Path) -> Result<Option<csv::Reader<fs::File>>, String> {
    if !path.exists() {
        return Ok(None);
    }
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map(Some)
        .map_err(|err| format!("failed to open {}: {}", path.display(), err))
}
