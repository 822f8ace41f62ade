//! Result table export.

use std::{io::Write, path::Path};

use log::info;

use crate::{error::Result, record::FeatureRecord};

/// Writes records as CSV with a header row. Undefined values become empty
/// cells.
pub fn write_records_to<W: Write>(writer: W, records: &[FeatureRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in records {
        csv.serialize(record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes records to a CSV file, replacing any previous content.
pub fn write_records(path: &Path, records: &[FeatureRecord]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_records_to(file, records)?;
    info!("Wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}
