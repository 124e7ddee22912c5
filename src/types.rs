use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// One line of the input file, every field kept as text until cleaned.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(alias = "Pais")]
    pub country: Option<String>,
    #[serde(alias = "Fecha")]
    pub date: Option<String>,
    #[serde(alias = "Casos Diarios")]
    pub daily_count: Option<String>,
}

/// A loaded row. `date` and `daily_count` are `None` when the source value
/// could not be parsed; the row itself is always kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub country: String,
    pub date: Option<NaiveDate>,
    pub daily_count: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Tabled, Clone, PartialEq)]
pub struct MonthlyAggregate {
    pub country: String,
    pub month_start: NaiveDate,
    pub monthly_count: f64,
}

/// Monthly aggregate plus its trailing three-period moving average.
#[derive(Debug, Serialize, Deserialize, Tabled, Clone, PartialEq)]
pub struct TrendRow {
    pub country: String,
    pub month_start: NaiveDate,
    pub monthly_count: f64,
    #[serde(rename = "mm3")]
    #[tabled(rename = "mm3")]
    pub moving_average: f64,
}

#[derive(Debug, Serialize, Deserialize, Tabled, Clone, PartialEq)]
pub struct CalendarTotal {
    pub country: String,
    pub month_number: u32,
    pub month_name: String,
    pub total_count: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct PeakRecord {
    pub country: String,
    #[tabled(display_with = "display_option")]
    pub peak_date: Option<NaiveDate>,
    #[tabled(display_with = "display_option")]
    pub month_number: Option<u32>,
    #[tabled(display_with = "display_option")]
    pub month_name: Option<String>,
    pub peak_value: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CountryYearRow {
    pub country: String,
    pub year: i32,
    pub month_start: NaiveDate,
    pub month_number: u32,
    pub month_name: String,
    pub monthly_count: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct ComparisonRow {
    pub country: String,
    pub year: i32,
    pub month_number: u32,
    pub month_name: String,
    pub monthly_count: f64,
}

fn display_option<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}
