//! Pipeline context.
//!
//! Holds the configuration and every table produced so far. Each step reads
//! its inputs from the context and fails with [`PipelineError::Precondition`]
//! when the step that produces them has not run. Reloading the input clears
//! every derived table.

use crate::charts;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::loader::{load_dataset, Dataset, LoadReport};
use crate::output::{preview_table_rows, remove_stale, write_csv, write_json, write_records};
use crate::reports;
use crate::types::{
    CalendarTotal, ComparisonRow, CountryYearRow, MonthlyAggregate, PeakRecord, Record, TrendRow,
};
use crate::util::{format_int, format_number};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

pub struct Pipeline {
    config: PipelineConfig,
    data: Option<Dataset>,
    monthly: Option<Vec<MonthlyAggregate>>,
    trends: Option<Vec<TrendRow>>,
    calendar: Option<Vec<CalendarTotal>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            data: None,
            monthly: None,
            trends: None,
            calendar: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn monthly(&self) -> Option<&[MonthlyAggregate]> {
        self.monthly.as_deref()
    }

    pub fn trends(&self) -> Option<&[TrendRow]> {
        self.trends.as_deref()
    }

    pub fn calendar(&self) -> Option<&[CalendarTotal]> {
        self.calendar.as_deref()
    }

    /// A fresh RNG for one sampling step, so every selection depends only
    /// on the seed and its own candidate list.
    fn seeded_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.config.seed)
    }

    fn require_data(&self, stage: &'static str) -> Result<&Dataset> {
        self.data.as_ref().ok_or(PipelineError::Precondition {
            stage,
            requires: "the loaded dataset",
        })
    }

    fn require_records(&self, stage: &'static str) -> Result<&[Record]> {
        Ok(&self.require_data(stage)?.records)
    }

    /// Step 1: load the dataset and coerce dates.
    pub fn load(&mut self) -> Result<LoadReport> {
        let (data, report) = load_dataset(&self.config.input_csv)?;
        info!(
            path = %self.config.input_csv.display(),
            "Loaded {} rows; unparsed dates: {}; unparsed counts: {}",
            format_int(report.total_rows),
            format_int(report.unparsed_dates),
            format_int(report.unparsed_counts)
        );
        if report.missing_countries > 0 {
            warn!(
                "{} rows have no country and are left out of groupings",
                format_int(report.missing_countries)
            );
        }

        self.data = Some(data);
        self.monthly = None;
        self.trends = None;
        self.calendar = None;
        Ok(report)
    }

    /// Step 2: per-country monthly totals.
    pub fn build_monthly_aggregation(&mut self) -> Result<&[MonthlyAggregate]> {
        let records = self.require_records("monthly aggregation")?;
        let monthly = reports::monthly_aggregate(records);

        preview_table_rows(&monthly, self.config.preview_rows);
        write_csv(&self.config.monthly_csv, &monthly)?;
        info!(path = %self.config.monthly_csv.display(), rows = monthly.len(), "Monthly aggregate saved");

        self.trends = None;
        self.calendar = None;
        Ok(self.monthly.insert(monthly).as_slice())
    }

    /// Step 3: (country, date) sorted copy of the input, every column kept.
    pub fn sort_and_export(&self) -> Result<()> {
        let data = self.require_data("sorted export")?;
        let (headers, rows) = reports::sorted_export(data);
        write_records(&self.config.sorted_csv, &headers, &rows)?;
        info!(path = %self.config.sorted_csv.display(), rows = rows.len(), "Sorted dataset saved");
        Ok(())
    }

    /// Step 4: anchor plus two sampled countries, with moving averages.
    pub fn select_countries_and_trends(&mut self) -> Result<&[TrendRow]> {
        let records = self.require_records("trend selection")?;
        let monthly = self.monthly.as_deref().ok_or(PipelineError::Precondition {
            stage: "trend selection",
            requires: "the monthly aggregate",
        })?;

        let countries = reports::distinct_countries(records);
        let selected = reports::select_trend_countries(
            &countries,
            &self.config.anchor_country,
            &mut self.seeded_rng(),
        );
        info!(?selected, "Countries selected for trend analysis");

        let trends = reports::compute_trends(monthly, &selected);
        preview_table_rows(&trends, self.config.preview_rows);
        write_csv(&self.config.trends_csv, &trends)?;
        info!(path = %self.config.trends_csv.display(), rows = trends.len(), "Trend table saved");

        self.calendar = None;
        Ok(self.trends.insert(trends).as_slice())
    }

    /// Step 5: seasonal totals of the trend subset.
    pub fn aggregate_by_calendar_month(&mut self) -> Result<&[CalendarTotal]> {
        let trends = self.trends.as_deref().ok_or(PipelineError::Precondition {
            stage: "calendar aggregation",
            requires: "the trend table",
        })?;
        let totals = reports::calendar_totals(trends);

        preview_table_rows(&totals, self.config.preview_rows * 2);
        write_json(&self.config.calendar_json, &totals)?;
        info!(path = %self.config.calendar_json.display(), rows = totals.len(), "Calendar totals saved");

        Ok(self.calendar.insert(totals).as_slice())
    }

    /// Step 6: calendar evolution chart. Rebuilds the calendar totals from
    /// the trend table when they have not been computed yet.
    pub fn plot_calendar_evolution(&mut self) -> Result<()> {
        if self.calendar.is_none() {
            info!("Calendar totals missing; computing them from the trend table");
            self.aggregate_by_calendar_month()?;
        }
        let totals = self.calendar.as_deref().unwrap_or_default();
        charts::write_chart(&self.config.calendar_chart_html, &charts::calendar_chart(totals))?;
        info!(path = %self.config.calendar_chart_html.display(), "Calendar chart saved");
        Ok(())
    }

    /// Trend chart. Runs the trend selection first when it has not run.
    pub fn plot_trends(&mut self) -> Result<()> {
        if self.trends.is_none() {
            info!("Trend table missing; computing it from the monthly aggregate");
            self.select_countries_and_trends()?;
        }
        let trends = self.trends.as_deref().unwrap_or_default();
        charts::write_chart(&self.config.trends_chart_html, &charts::trend_chart(trends))?;
        info!(path = %self.config.trends_chart_html.display(), "Trend chart saved");
        Ok(())
    }

    /// Step 7: the single largest daily count. `None` when no row carries
    /// a count; nothing is written in that case.
    pub fn find_peak(&self) -> Result<Option<PeakRecord>> {
        let records = self.require_records("peak finder")?;
        let Some(peak) = reports::find_peak(records) else {
            info!("No numeric daily counts; peak not written");
            remove_stale(&self.config.peak_csv)?;
            return Ok(None);
        };

        info!(
            country = %peak.country,
            date = ?peak.peak_date,
            "Peak daily count: {}",
            format_number(peak.peak_value, 2)
        );
        write_csv(&self.config.peak_csv, std::slice::from_ref(&peak))?;
        info!(path = %self.config.peak_csv.display(), "Peak saved");
        Ok(Some(peak))
    }

    /// Step 8: one country, one year. An empty slice is logged and leaves
    /// no file behind, removing any left by an earlier run.
    pub fn country_year_slice(&self, country: &str, year: i32) -> Result<Option<Vec<CountryYearRow>>> {
        let records = self.require_records("country-year slice")?;
        let rows = reports::country_year_slice(records, country, year);
        if rows.is_empty() {
            info!(country, year, "No rows for country/year; nothing written");
            remove_stale(&self.config.country_year_csv)?;
            remove_stale(&self.config.country_year_chart_html)?;
            return Ok(None);
        }

        preview_table_rows(&rows, self.config.preview_rows);
        write_csv(&self.config.country_year_csv, &rows)?;
        charts::write_chart(
            &self.config.country_year_chart_html,
            &charts::country_year_chart(&rows),
        )?;
        info!(path = %self.config.country_year_csv.display(), rows = rows.len(), "Country-year slice saved");
        Ok(Some(rows))
    }

    /// Step 9: compare `target` against a few other countries, over every
    /// year or, with `year`, over that year only.
    pub fn compare_countries(
        &self,
        target: &str,
        others: Option<&[String]>,
        year: Option<i32>,
    ) -> Result<Option<Vec<ComparisonRow>>> {
        let records = self.require_records("country comparison")?;
        let countries = reports::distinct_countries(records);
        let selected = reports::select_comparison_countries(
            &countries,
            target,
            others,
            &self.config.preferred_comparison,
            &mut self.seeded_rng(),
        );
        info!(?selected, ?year, "Countries selected for comparison");

        let (csv_path, html_path, title) = match year {
            Some(y) => (
                &self.config.comparison_year_csv,
                &self.config.comparison_year_chart_html,
                format!("Monthly cases in {y}: {}", selected.join(", ")),
            ),
            None => (
                &self.config.comparison_csv,
                &self.config.comparison_chart_html,
                format!("Monthly cases by year: {}", selected.join(", ")),
            ),
        };

        let rows = reports::build_comparison(records, &selected, year);
        if rows.is_empty() {
            info!(?year, "No rows for the compared countries; nothing written");
            remove_stale(csv_path)?;
            remove_stale(html_path)?;
            return Ok(None);
        }

        preview_table_rows(&rows, self.config.preview_rows);
        write_csv(csv_path, &rows)?;
        charts::write_chart(html_path, &charts::comparison_chart(&rows, &title))?;
        info!(path = %csv_path.display(), rows = rows.len(), "Comparison saved");
        Ok(Some(rows))
    }

    /// Every step in order.
    pub fn run_all(&mut self) -> Result<()> {
        self.load()?;
        self.build_monthly_aggregation()?;
        self.sort_and_export()?;
        self.select_countries_and_trends()?;
        self.aggregate_by_calendar_month()?;
        self.plot_calendar_evolution()?;
        self.plot_trends()?;
        self.find_peak()?;

        let slice_country = self.config.slice_country().to_string();
        self.country_year_slice(&slice_country, self.config.slice_year)?;

        let target = self.config.comparison_country().to_string();
        let others = self.config.comparison_others.clone();
        self.compare_countries(&target, others.as_deref(), None)?;
        self.compare_countries(&target, others.as_deref(), Some(self.config.comparison_year))?;

        info!(
            monthly = self.monthly().map_or(0, <[_]>::len),
            trends = self.trends().map_or(0, <[_]>::len),
            calendar = self.calendar().map_or(0, <[_]>::len),
            "Pipeline finished"
        );
        Ok(())
    }
}
