use crate::error::{PipelineError, Result};
use csv::StringRecord;
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|source| PipelineError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Write raw records under `headers`. Lines may be longer than the header.
pub fn write_records(path: &Path, headers: &StringRecord, rows: &[StringRecord]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    wtr.write_record(headers)?;
    for r in rows {
        wtr.write_record(r)?;
    }
    wtr.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Delete an artifact left by an earlier run. A missing file is fine.
pub fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let s = serde_json::to_string_pretty(value)?;
    write_text(path, &s)
}

pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    std::fs::write(path, contents).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
fn read_csv<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path).map_err(|source| PipelineError::Input {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rows = Vec::new();
    for result in rdr.deserialize::<T>() {
        rows.push(result?);
    }
    Ok(rows)
}

#[cfg(test)]
/// Read back a monthly aggregate written by [`write_csv`].
pub fn read_monthly_csv(path: &Path) -> Result<Vec<crate::types::MonthlyAggregate>> {
    read_csv(path)
}

#[cfg(test)]
/// Read back the calendar totals written by [`write_json`].
pub fn read_calendar_json(path: &Path) -> Result<Vec<crate::types::CalendarTotal>> {
    let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Input {
        path: path.to_path_buf(),
        source: source.into(),
    })?;
    Ok(serde_json::from_str(&text)?)
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CalendarTotal, MonthlyAggregate};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[test]
    fn test_monthly_csv_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("monthly.csv");
        let rows = vec![
            MonthlyAggregate {
                country: "El Salvador".into(),
                month_start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                monthly_count: 15.0,
            },
            MonthlyAggregate {
                country: "Guatemala, Rep.".into(),
                month_start: NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
                monthly_count: 7.25,
            },
        ];

        write_csv(&path, &rows).unwrap();
        let back = read_monthly_csv(&path).unwrap();
        assert_eq!(back, rows);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("country,month_start,monthly_count\n"));
        assert!(text.contains("2020-01-01"));
    }

    #[test]
    fn test_calendar_json_is_an_array_of_objects() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("totals.json");
        let rows = vec![CalendarTotal {
            country: "A".into(),
            month_number: 3,
            month_name: "March".into(),
            total_count: 12.0,
        }];

        write_json(&path, &rows).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["month_name"], "March");
        assert_eq!(read_calendar_json(&path).unwrap(), rows);
    }

    #[test]
    fn test_write_records_keeps_fields_verbatim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sorted.csv");
        let headers = StringRecord::from(vec!["Pais", "Casos Diarios", "month_start"]);
        let rows = vec![StringRecord::from(vec!["A, B", "n/a", ""])];

        write_records(&path, &headers, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Pais,Casos Diarios,month_start\n\"A, B\",n/a,\n");
    }

    #[test]
    fn test_remove_stale_ignores_missing_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.csv");
        remove_stale(&path).unwrap();

        std::fs::write(&path, "x").unwrap();
        remove_stale(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_write_into_file_as_directory_fails_with_io_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let err = write_text(&blocker.join("chart.html"), "<html>").unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
