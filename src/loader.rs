use crate::error::{PipelineError, Result};
use crate::types::{RawRow, Record};
use crate::util::{parse_date_safe, parse_f64_safe};
use csv::{ReaderBuilder, StringRecord};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub unparsed_dates: usize,
    pub unparsed_counts: usize,
    pub missing_countries: usize,
    pub malformed_rows: usize,
}

/// The input as read: its header, every kept line verbatim, and the parsed
/// view of each line at the same index.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    pub records: Vec<Record>,
}

/// Read the dataset and coerce its date column.
///
/// Only a missing or unreadable file is fatal. Dates and counts that fail to
/// parse become `None` and are tallied in the [`LoadReport`]; those rows are
/// kept. Lines the CSV reader cannot decode at all are skipped and counted
/// as malformed.
pub fn load_dataset(path: &Path) -> Result<(Dataset, LoadReport)> {
    let input_error = |source| PipelineError::Input {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(input_error)?;
    let headers = rdr.headers().map_err(input_error)?.clone();

    let mut report = LoadReport::default();
    let mut data = Dataset {
        headers,
        ..Dataset::default()
    };

    for (line, result) in rdr.records().enumerate() {
        report.total_rows += 1;
        let decoded = result.and_then(|raw| {
            let row = raw.deserialize::<RawRow>(Some(&data.headers))?;
            Ok((raw, row))
        });
        let (raw, row) = match decoded {
            Ok(pair) => pair,
            Err(e) => {
                debug!(line = line + 2, error = %e, "skipping malformed row");
                report.malformed_rows += 1;
                continue;
            }
        };

        let country = row
            .country
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if country.is_empty() {
            report.missing_countries += 1;
        }

        let date = parse_date_safe(row.date.as_deref());
        if date.is_none() {
            report.unparsed_dates += 1;
        }

        let daily_count = parse_f64_safe(row.daily_count.as_deref());
        if daily_count.is_none() {
            report.unparsed_counts += 1;
        }

        data.rows.push(raw);
        data.records.push(Record {
            country,
            date,
            daily_count,
        });
    }

    if report.malformed_rows > 0 {
        warn!(
            malformed = report.malformed_rows,
            "some input lines could not be decoded"
        );
    }

    Ok((data, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_input(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_parses_dates_and_counts() {
        let file = write_input(
            "country,date,daily_count\nA,2020-01-05,10\nA,2020-01-20,5\nB,2020-02-01,7\n",
        );
        let (data, report) = load_dataset(file.path()).unwrap();
        let records = &data.records;

        assert_eq!(records.len(), 3);
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.unparsed_dates, 0);
        assert_eq!(records[0].country, "A");
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2020, 1, 5));
        assert_eq!(records[2].daily_count, Some(7.0));
    }

    #[test]
    fn test_unparseable_dates_are_kept_and_counted() {
        let file = write_input("country,date,daily_count\nA,garbage,10\nA,2020-01-20,5\n");
        let (data, report) = load_dataset(file.path()).unwrap();
        let records = &data.records;

        assert_eq!(records.len(), 2);
        assert_eq!(report.unparsed_dates, 1);
        assert_eq!(records[0].date, None);
        assert_eq!(records[0].daily_count, Some(10.0));
    }

    #[test]
    fn test_accepts_spanish_headers_and_extra_columns() {
        let file = write_input(
            "Pais,Fecha,Casos Diarios,Region\nEl Salvador,2021-03-01,4,Central\n",
        );
        let (data, _) = load_dataset(file.path()).unwrap();
        let records = &data.records;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].country, "El Salvador");
        assert_eq!(records[0].daily_count, Some(4.0));
    }

    #[test]
    fn test_raw_lines_are_kept_verbatim() {
        let file = write_input(
            "Pais,Fecha,Casos Diarios,Region\nB,2020-01-02,1,North\nA,garbage,n/a,South\n",
        );
        let (data, _) = load_dataset(file.path()).unwrap();

        assert_eq!(data.headers, vec!["Pais", "Fecha", "Casos Diarios", "Region"]);
        assert_eq!(data.rows.len(), data.records.len());
        assert_eq!(data.rows[1], vec!["A", "garbage", "n/a", "South"]);
        assert_eq!(data.records[1].daily_count, None);
    }

    #[test]
    fn test_non_numeric_counts_become_none() {
        let file = write_input("country,date,daily_count\nA,2020-01-05,n/a\n");
        let (data, report) = load_dataset(file.path()).unwrap();
        let records = &data.records;

        assert_eq!(records[0].daily_count, None);
        assert_eq!(report.unparsed_counts, 1);
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let err = load_dataset(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::Input { .. }));
    }
}
