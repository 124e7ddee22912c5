//! Interactive HTML charts.
//!
//! Each chart is a standalone document that pulls Plotly from its CDN and
//! embeds the traces as JSON. The builders only reshape aggregate tables
//! into traces; no figures are computed here.

use crate::error::Result;
use crate::output::write_text;
use crate::types::{CalendarTotal, ComparisonRow, CountryYearRow, TrendRow};
use crate::util::month_names;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub x: Vec<String>,
    pub y: Vec<f64>,
    pub dashed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub legend_title: String,
    pub kind: ChartKind,
    /// Fixed category order for the x axis, when it is not chronological.
    pub x_categories: Option<Vec<String>>,
    pub series: Vec<Series>,
}

impl ChartSpec {
    fn traces(&self) -> Vec<Value> {
        self.series
            .iter()
            .map(|s| {
                let hover = format!(
                    "<b>{}</b><br>{}=%{{x}}<br>{}=%{{y:,.2f}}<extra></extra>",
                    s.name, self.x_title, self.y_title
                );
                let dash = if s.dashed { "dash" } else { "solid" };
                match self.kind {
                    ChartKind::Line => json!({
                        "type": "scatter",
                        "mode": "lines+markers",
                        "name": s.name,
                        "x": s.x,
                        "y": s.y,
                        "line": { "dash": dash },
                        "hovertemplate": hover,
                    }),
                    ChartKind::Bar => json!({
                        "type": "bar",
                        "name": s.name,
                        "x": s.x,
                        "y": s.y,
                        "hovertemplate": hover,
                    }),
                }
            })
            .collect()
    }

    fn layout(&self) -> Value {
        let mut xaxis = json!({ "title": { "text": self.x_title } });
        if let Some(categories) = &self.x_categories {
            xaxis["categoryorder"] = json!("array");
            xaxis["categoryarray"] = json!(categories);
        }
        json!({
            "title": { "text": self.title },
            "xaxis": xaxis,
            "yaxis": { "title": { "text": self.y_title }, "tickformat": ",.2f" },
            "legend": { "title": { "text": self.legend_title } },
            "hovermode": "x unified",
            "barmode": "group",
        })
    }
}

/// Render a complete HTML document for `spec`.
pub fn render_html(spec: &ChartSpec) -> Result<String> {
    let traces = script_safe(&serde_json::to_string(&spec.traces())?);
    let layout = script_safe(&serde_json::to_string(&spec.layout())?);
    let title = escape_html(&spec.title);

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <script src="{PLOTLY_CDN}"></script>
    <style>
        body {{ font-family: -apple-system, 'Segoe UI', Helvetica, Arial, sans-serif; margin: 0; }}
        #chart {{ width: 100%; height: 100vh; }}
    </style>
</head>
<body>
    <div id="chart"></div>
    <script>
        Plotly.newPlot("chart", {traces}, {layout}, {{ responsive: true }});
    </script>
</body>
</html>
"#
    ))
}

pub fn write_chart(path: &Path, spec: &ChartSpec) -> Result<()> {
    let html = render_html(spec)?;
    write_text(path, &html)
}

/// Line chart of the seasonal totals, one line per country.
pub fn calendar_chart(totals: &[CalendarTotal]) -> ChartSpec {
    let mut by_country: BTreeMap<&str, Series> = BTreeMap::new();
    for t in totals {
        let s = by_country
            .entry(t.country.as_str())
            .or_insert_with(|| new_series(&t.country, false));
        s.x.push(t.month_name.clone());
        s.y.push(t.total_count);
    }
    ChartSpec {
        title: "Monthly case evolution by country (calendar-month totals)".into(),
        x_title: "Month".into(),
        y_title: "Total cases".into(),
        legend_title: "Country".into(),
        kind: ChartKind::Line,
        x_categories: Some(month_names().iter().map(|m| m.to_string()).collect()),
        series: by_country.into_values().collect(),
    }
}

/// Monthly counts as solid lines and their moving average as dashed lines.
pub fn trend_chart(trends: &[TrendRow]) -> ChartSpec {
    let mut by_country: BTreeMap<&str, (Series, Series)> = BTreeMap::new();
    for t in trends {
        let (monthly, mm3) = by_country.entry(t.country.as_str()).or_insert_with(|| {
            (
                new_series(&t.country, false),
                new_series(&format!("{} (MM3)", t.country), true),
            )
        });
        let label = t.month_start.format("%Y-%m").to_string();
        monthly.x.push(label.clone());
        monthly.y.push(t.monthly_count);
        mm3.x.push(label);
        mm3.y.push(t.moving_average);
    }
    ChartSpec {
        title: "Monthly cases and 3-month moving average".into(),
        x_title: "Month".into(),
        y_title: "Cases".into(),
        legend_title: "Series".into(),
        kind: ChartKind::Line,
        x_categories: None,
        series: by_country
            .into_values()
            .flat_map(|(monthly, mm3)| [monthly, mm3])
            .collect(),
    }
}

pub fn country_year_chart(rows: &[CountryYearRow]) -> ChartSpec {
    let (country, year) = rows
        .first()
        .map(|r| (r.country.clone(), r.year.to_string()))
        .unwrap_or_default();
    let mut series = new_series(&country, false);
    for r in rows {
        series.x.push(r.month_name.clone());
        series.y.push(r.monthly_count);
    }
    ChartSpec {
        title: format!("Monthly cases in {country} during {year}"),
        x_title: "Month".into(),
        y_title: "Cases".into(),
        legend_title: "Country".into(),
        kind: ChartKind::Bar,
        x_categories: Some(month_names().iter().map(|m| m.to_string()).collect()),
        series: vec![series],
    }
}

/// One line per (country, year) over the twelve calendar months.
pub fn comparison_chart(rows: &[ComparisonRow], title: &str) -> ChartSpec {
    let mut by_key: BTreeMap<(&str, i32), Series> = BTreeMap::new();
    for r in rows {
        let s = by_key
            .entry((r.country.as_str(), r.year))
            .or_insert_with(|| new_series(&format!("{} {}", r.country, r.year), false));
        s.x.push(r.month_name.clone());
        s.y.push(r.monthly_count);
    }
    ChartSpec {
        title: title.to_string(),
        x_title: "Month".into(),
        y_title: "Cases".into(),
        legend_title: "Country / year".into(),
        kind: ChartKind::Line,
        x_categories: Some(month_names().iter().map(|m| m.to_string()).collect()),
        series: by_key.into_values().collect(),
    }
}

fn new_series(name: &str, dashed: bool) -> Series {
    Series {
        name: name.to_string(),
        x: Vec::new(),
        y: Vec::new(),
        dashed,
    }
}

/// Keep embedded JSON from closing the surrounding `<script>` element.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trend(country: &str, month: u32, count: f64, mm: f64) -> TrendRow {
        TrendRow {
            country: country.into(),
            month_start: NaiveDate::from_ymd_opt(2020, month, 1).unwrap(),
            monthly_count: count,
            moving_average: mm,
        }
    }

    #[test]
    fn test_trend_chart_pairs_solid_and_dashed_series() {
        let spec = trend_chart(&[
            trend("A", 1, 15.0, 15.0),
            trend("A", 2, 7.0, 11.0),
            trend("B", 1, 3.0, 3.0),
        ]);

        let names: Vec<&str> = spec.series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "A (MM3)", "B", "B (MM3)"]);
        assert!(!spec.series[0].dashed);
        assert!(spec.series[1].dashed);
        assert_eq!(spec.series[1].y, vec![15.0, 11.0]);
        assert_eq!(spec.series[0].x, vec!["2020-01", "2020-02"]);
    }

    #[test]
    fn test_calendar_chart_groups_by_country() {
        let totals = vec![
            CalendarTotal {
                country: "A".into(),
                month_number: 1,
                month_name: "January".into(),
                total_count: 5.0,
            },
            CalendarTotal {
                country: "B".into(),
                month_number: 1,
                month_name: "January".into(),
                total_count: 2.0,
            },
        ];
        let spec = calendar_chart(&totals);
        assert_eq!(spec.series.len(), 2);
        assert_eq!(spec.x_categories.as_ref().map(|c| c.len()), Some(12));
    }

    #[test]
    fn test_rendered_html_is_self_contained_and_escaped() {
        let spec = ChartSpec {
            title: "Cases <script>".into(),
            x_title: "Month".into(),
            y_title: "Cases".into(),
            legend_title: "Country".into(),
            kind: ChartKind::Line,
            x_categories: None,
            series: vec![Series {
                name: "</script>".into(),
                x: vec!["Jan".into()],
                y: vec![1.0],
                dashed: true,
            }],
        };
        let html = render_html(&spec).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(PLOTLY_CDN));
        assert!(html.contains("<title>Cases &lt;script&gt;</title>"));
        assert!(html.contains("\"dash\":\"dash\""));
        assert_eq!(html.matches("</script>").count(), 2);
    }

    #[test]
    fn test_bar_chart_for_country_year() {
        let rows = vec![CountryYearRow {
            country: "A".into(),
            year: 2021,
            month_start: NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
            month_number: 3,
            month_name: "March".into(),
            monthly_count: 9.0,
        }];
        let spec = country_year_chart(&rows);
        assert_eq!(spec.kind, ChartKind::Bar);
        assert_eq!(spec.title, "Monthly cases in A during 2021");
        let html = render_html(&spec).unwrap();
        assert!(html.contains("\"type\":\"bar\""));
    }

    fn comparison(country: &str, year: i32, month: u32, name: &str, count: f64) -> ComparisonRow {
        ComparisonRow {
            country: country.into(),
            year,
            month_number: month,
            month_name: name.into(),
            monthly_count: count,
        }
    }

    #[test]
    fn test_comparison_chart_one_series_per_country_year() {
        let rows = vec![
            comparison("A", 2020, 1, "January", 4.0),
            comparison("A", 2020, 2, "February", 6.0),
            comparison("A", 2021, 1, "January", 1.0),
            comparison("B", 2020, 3, "March", 9.0),
        ];
        let spec = comparison_chart(&rows, "A vs B");

        assert_eq!(spec.kind, ChartKind::Line);
        assert_eq!(spec.title, "A vs B");
        let names: Vec<&str> = spec.series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A 2020", "A 2021", "B 2020"]);
        assert_eq!(spec.series[0].x, vec!["January", "February"]);
        assert_eq!(spec.series[0].y, vec![4.0, 6.0]);

        let categories = spec.x_categories.unwrap();
        assert_eq!(categories.len(), 12);
        assert_eq!(categories.first().map(String::as_str), Some("January"));
        assert_eq!(categories.last().map(String::as_str), Some("December"));
    }
}
