//! CSV export of a run's resolved records
//!
//! Every record resolved during a run, target or not, is written to one
//! timestamped file so a run's full result pages can be reviewed later.

use crate::output::{OutputError, OutputResult};
use crate::rank::RankedRecord;
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const CSV_HEADER: [&str; 6] = ["keyword", "no", "rank", "nvMid", "mallName", "productName"];

// Spreadsheet tools need the byte order mark to pick up UTF-8.
const UTF8_BOM: &str = "\u{feff}";

/// File name for an export taken at `now`
pub fn export_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("rank_results_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Writes the records to a new CSV file under `dir`
///
/// # Arguments
///
/// * `records` - Every record resolved during the run, in encounter order
/// * `dir` - Export directory; created if missing
/// * `now` - Timestamp used in the file name
///
/// # Returns
///
/// * `Ok(Some(path))` - Path of the written file
/// * `Ok(None)` - Nothing to export
/// * `Err(OutputError)` - Failed to write the file
pub fn export_records<Tz: TimeZone>(
    records: &[RankedRecord],
    dir: &Path,
    now: &DateTime<Tz>,
) -> OutputResult<Option<PathBuf>>
where
    Tz::Offset: Display,
{
    if records.is_empty() {
        return Ok(None);
    }

    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(now));
    if path.exists() {
        return Err(OutputError::Write(format!(
            "{} already exists",
            path.display()
        )));
    }

    let csv = format_records_csv(records);

    let mut file = File::create(&path)?;
    file.write_all(UTF8_BOM.as_bytes())?;
    file.write_all(csv.as_bytes())?;

    Ok(Some(path))
}

/// Formats records as CSV text, header included
pub fn format_records_csv(records: &[RankedRecord]) -> String {
    let mut csv = String::new();
    push_row(&mut csv, CSV_HEADER.iter().copied());

    for record in records {
        let no = record.sequence_number.to_string();
        let rank = record.rank.to_string();
        let id = record.identifier.to_string();
        push_row(
            &mut csv,
            [
                record.keyword.as_str(),
                no.as_str(),
                rank.as_str(),
                id.as_str(),
                record.store_name.as_str(),
                record.title.as_str(),
            ],
        );
    }

    csv
}

fn push_row<'a>(csv: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            csv.push(',');
        }
        csv.push_str(&quote_field(field));
    }
    csv.push('\n');
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
