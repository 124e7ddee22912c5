// Stage functions of the pipeline.
//
// Each one is a pure mapping from one table to another; writing the result
// to disk is the caller's job (see `pipeline.rs`).
use crate::loader::Dataset;
use crate::types::{
    CalendarTotal, ComparisonRow, CountryYearRow, MonthlyAggregate, PeakRecord, Record, TrendRow,
};
use crate::util::{average, month_name, month_start};
use chrono::{Datelike, NaiveDate};
use csv::StringRecord;
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Trailing window used for the moving average.
pub const MOVING_AVERAGE_WINDOW: usize = 3;

/// Number of countries sampled alongside the anchor or target country.
pub const SAMPLED_COUNTRIES: usize = 2;

/// Sum daily counts per (country, first day of month).
///
/// Rows without a country or a parsed date have no bucket and are left out.
/// A missing count contributes nothing but still opens its bucket. The
/// result is ordered by (country, month_start).
pub fn monthly_aggregate(records: &[Record]) -> Vec<MonthlyAggregate> {
    let mut map: BTreeMap<(String, NaiveDate), f64> = BTreeMap::new();
    for r in records {
        let Some(date) = r.date else { continue };
        if r.country.is_empty() {
            continue;
        }
        let e = map.entry((r.country.clone(), month_start(date))).or_insert(0.0);
        *e += r.daily_count.unwrap_or(0.0);
    }
    map.into_iter()
        .map(|((country, month_start), monthly_count)| MonthlyAggregate {
            country,
            month_start,
            monthly_count,
        })
        .collect()
}

/// Copy of the input ordered by (country, date), every original column kept
/// verbatim and a `month_start` column appended. Rows without a country sort
/// after all named countries, undated rows last within their country. The
/// sort is stable so equal keys keep source order.
pub fn sorted_export(data: &Dataset) -> (StringRecord, Vec<StringRecord>) {
    let mut order: Vec<usize> = (0..data.records.len()).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (&data.records[a], &data.records[b]);
        missing_last(a.country.is_empty(), b.country.is_empty())
            .then_with(|| a.country.cmp(&b.country))
            .then_with(|| match (a.date, b.date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (x, y) => missing_last(x.is_none(), y.is_none()),
            })
    });

    let width = data.headers.len();
    let mut headers = data.headers.clone();
    headers.push_field("month_start");

    let rows = order
        .into_iter()
        .map(|i| {
            let mut row = data.rows[i].clone();
            while row.len() < width {
                row.push_field("");
            }
            let month = data.records[i]
                .date
                .map(|d| month_start(d).to_string())
                .unwrap_or_default();
            row.push_field(&month);
            row
        })
        .collect();
    (headers, rows)
}

fn missing_last(a_missing: bool, b_missing: bool) -> Ordering {
    a_missing.cmp(&b_missing)
}

/// Sorted, deduplicated, non-empty country names.
pub fn distinct_countries(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !r.country.is_empty())
        .map(|r| r.country.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Uniformly sample up to `amount` distinct entries of `candidates` without
/// replacement. Deterministic for a given candidate order and RNG state.
pub fn sample_countries<R: Rng + ?Sized>(
    candidates: &[String],
    amount: usize,
    rng: &mut R,
) -> Vec<String> {
    let n = amount.min(candidates.len());
    candidates.choose_multiple(rng, n).cloned().collect()
}

/// The anchor followed by up to two countries drawn from the others.
///
/// `countries` must already be sorted and distinct (see
/// [`distinct_countries`]); the anchor is removed from the candidate pool so
/// the selection never holds duplicates.
pub fn select_trend_countries<R: Rng + ?Sized>(
    countries: &[String],
    anchor: &str,
    rng: &mut R,
) -> Vec<String> {
    let candidates: Vec<String> = countries
        .iter()
        .filter(|c| c.as_str() != anchor)
        .cloned()
        .collect();
    let mut selected = vec![anchor.to_string()];
    selected.extend(sample_countries(&candidates, SAMPLED_COUNTRIES, rng));
    selected
}

/// Filter the monthly aggregate to `selected` and attach the moving average.
///
/// Rows are ordered by (country, month). Position `i` of a country's series
/// averages its `min(i + 1, 3)` most recent monthly values.
pub fn compute_trends(monthly: &[MonthlyAggregate], selected: &[String]) -> Vec<TrendRow> {
    let mut subset: Vec<&MonthlyAggregate> = monthly
        .iter()
        .filter(|m| selected.iter().any(|s| s == &m.country))
        .collect();
    subset.sort_by(|a, b| {
        a.country
            .cmp(&b.country)
            .then_with(|| a.month_start.cmp(&b.month_start))
    });

    let mut rows = Vec::with_capacity(subset.len());
    let mut window: Vec<f64> = Vec::with_capacity(MOVING_AVERAGE_WINDOW);
    let mut current: Option<&str> = None;
    for m in subset {
        if current != Some(m.country.as_str()) {
            window.clear();
            current = Some(m.country.as_str());
        }
        if window.len() == MOVING_AVERAGE_WINDOW {
            window.remove(0);
        }
        window.push(m.monthly_count);
        rows.push(TrendRow {
            country: m.country.clone(),
            month_start: m.month_start,
            monthly_count: m.monthly_count,
            moving_average: average(&window),
        });
    }
    rows
}

/// Seasonal totals: each country's trend values summed per month number
/// across every year, ordered by (country, month_number).
pub fn calendar_totals(trends: &[TrendRow]) -> Vec<CalendarTotal> {
    let mut map: BTreeMap<(String, u32), f64> = BTreeMap::new();
    for t in trends {
        *map.entry((t.country.clone(), t.month_start.month()))
            .or_insert(0.0) += t.monthly_count;
    }
    map.into_iter()
        .map(|((country, month_number), total_count)| CalendarTotal {
            country,
            month_number,
            month_name: month_name(month_number).to_string(),
            total_count,
        })
        .collect()
}

/// The row holding the largest daily count. Ties go to the row that appears
/// first in source order; rows without a count are ignored.
pub fn find_peak(records: &[Record]) -> Option<PeakRecord> {
    let mut best: Option<(&Record, f64)> = None;
    for r in records {
        let Some(value) = r.daily_count else { continue };
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if value <= top => {}
            _ => best = Some((r, value)),
        }
    }
    best.map(|(r, value)| PeakRecord {
        country: r.country.clone(),
        peak_date: r.date,
        month_number: r.date.map(|d| d.month()),
        month_name: r.date.map(|d| month_name(d.month()).to_string()),
        peak_value: value,
    })
}

/// Monthly totals for one country within one calendar year.
///
/// Returns an empty vector when the country has no dated rows in that year.
pub fn country_year_slice(records: &[Record], country: &str, year: i32) -> Vec<CountryYearRow> {
    let mut map: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for r in records.iter().filter(|r| r.country == country) {
        let Some(date) = r.date.filter(|d| d.year() == year) else {
            continue;
        };
        *map.entry(month_start(date)).or_insert(0.0) += r.daily_count.unwrap_or(0.0);
    }
    map.into_iter()
        .map(|(month_start, monthly_count)| CountryYearRow {
            country: country.to_string(),
            year,
            month_start,
            month_number: month_start.month(),
            month_name: month_name(month_start.month()).to_string(),
            monthly_count,
        })
        .collect()
}

/// Pick the countries compared against `target`.
///
/// An explicit list wins (minus the target and duplicates). Otherwise the
/// `preferred` names present in the dataset are taken first, and any slots
/// left out of two are filled by sampling the remaining countries.
pub fn select_comparison_countries<R: Rng + ?Sized>(
    countries: &[String],
    target: &str,
    explicit: Option<&[String]>,
    preferred: &[String],
    rng: &mut R,
) -> Vec<String> {
    let mut selected = vec![target.to_string()];

    if let Some(explicit) = explicit {
        for c in explicit {
            if !selected.contains(c) {
                selected.push(c.clone());
            }
        }
        return selected;
    }

    for p in preferred {
        if selected.len() > SAMPLED_COUNTRIES {
            break;
        }
        if countries.contains(p) && !selected.contains(p) {
            selected.push(p.clone());
        }
    }

    let missing = (SAMPLED_COUNTRIES + 1).saturating_sub(selected.len());
    if missing > 0 {
        let remaining: Vec<String> = countries
            .iter()
            .filter(|c| !selected.contains(c))
            .cloned()
            .collect();
        selected.extend(sample_countries(&remaining, missing, rng));
    }
    selected
}

/// Monthly totals per (country, year, month_number) for `selected`,
/// optionally restricted to a single year. Ordered by
/// (country, year, month_number).
pub fn build_comparison(
    records: &[Record],
    selected: &[String],
    year: Option<i32>,
) -> Vec<ComparisonRow> {
    let mut map: BTreeMap<(String, i32, u32), f64> = BTreeMap::new();
    for r in records {
        let Some(date) = r.date else { continue };
        if year.is_some_and(|y| y != date.year()) {
            continue;
        }
        if !selected.iter().any(|s| s == &r.country) {
            continue;
        }
        *map.entry((r.country.clone(), date.year(), date.month()))
            .or_insert(0.0) += r.daily_count.unwrap_or(0.0);
    }
    map.into_iter()
        .map(|((country, year, month_number), monthly_count)| ComparisonRow {
            country,
            year,
            month_number,
            month_name: month_name(month_number).to_string(),
            monthly_count,
        })
        .collect()
}
