use std::path::PathBuf;

/// Every knob of a pipeline run.
///
/// `Default` reproduces the standard run; override individual fields with
/// struct-update syntax:
///
/// ```ignore
/// let config = PipelineConfig {
///     input_csv: "data/other.csv".into(),
///     seed: 7,
///     ..PipelineConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_csv: PathBuf,
    pub monthly_csv: PathBuf,
    pub sorted_csv: PathBuf,
    pub trends_csv: PathBuf,
    pub calendar_json: PathBuf,
    pub calendar_chart_html: PathBuf,
    pub trends_chart_html: PathBuf,
    pub peak_csv: PathBuf,
    pub country_year_csv: PathBuf,
    pub country_year_chart_html: PathBuf,
    pub comparison_csv: PathBuf,
    pub comparison_chart_html: PathBuf,
    pub comparison_year_csv: PathBuf,
    pub comparison_year_chart_html: PathBuf,

    /// Country always part of the trend selection.
    pub anchor_country: String,
    /// Seed for every sampled country selection.
    pub seed: u64,

    /// Country for the country-year slice; the anchor when `None`.
    pub slice_country: Option<String>,
    pub slice_year: i32,

    /// Country compared against the others; the anchor when `None`.
    pub comparison_country: Option<String>,
    /// Overrides the preferred/sampled selection when set.
    pub comparison_others: Option<Vec<String>>,
    pub preferred_comparison: Vec<String>,
    /// Year of the single-year comparison variant.
    pub comparison_year: i32,

    /// `tracing` filter directive, e.g. `info` or `covid_trends=debug`.
    pub log_level: String,
    /// Rows shown in each console preview.
    pub preview_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let analysis = PathBuf::from("analisis");
        Self {
            input_csv: PathBuf::from("dataset_covid.csv"),
            monthly_csv: PathBuf::from("casos_mensuales_por_pais.csv"),
            sorted_csv: PathBuf::from("dataset_covid_ordenado.csv"),
            trends_csv: analysis.join("tendencias_paises.csv"),
            calendar_json: analysis.join("total_mensual_por_pais.json"),
            calendar_chart_html: analysis.join("evolucion_mensual_por_pais.html"),
            trends_chart_html: analysis.join("tendencias_paises.html"),
            peak_csv: analysis.join("pico_maximo.csv"),
            country_year_csv: analysis.join("casos_pais_anio.csv"),
            country_year_chart_html: analysis.join("casos_pais_anio.html"),
            comparison_csv: analysis.join("comparacion_paises.csv"),
            comparison_chart_html: analysis.join("comparacion_paises.html"),
            comparison_year_csv: analysis.join("comparacion_paises_anio.csv"),
            comparison_year_chart_html: analysis.join("comparacion_paises_anio.html"),
            anchor_country: "El Salvador".to_string(),
            seed: 42,
            slice_country: None,
            slice_year: 2021,
            comparison_country: None,
            comparison_others: None,
            preferred_comparison: vec!["Guatemala".to_string(), "Honduras".to_string()],
            comparison_year: 2021,
            log_level: "info".to_string(),
            preview_rows: 12,
        }
    }
}

impl PipelineConfig {
    #[cfg(test)]
    /// Same file names, rooted at `dir` instead of the working directory.
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let base = Self::default();
        Self {
            input_csv: dir.join(&base.input_csv),
            monthly_csv: dir.join(&base.monthly_csv),
            sorted_csv: dir.join(&base.sorted_csv),
            trends_csv: dir.join(&base.trends_csv),
            calendar_json: dir.join(&base.calendar_json),
            calendar_chart_html: dir.join(&base.calendar_chart_html),
            trends_chart_html: dir.join(&base.trends_chart_html),
            peak_csv: dir.join(&base.peak_csv),
            country_year_csv: dir.join(&base.country_year_csv),
            country_year_chart_html: dir.join(&base.country_year_chart_html),
            comparison_csv: dir.join(&base.comparison_csv),
            comparison_chart_html: dir.join(&base.comparison_chart_html),
            comparison_year_csv: dir.join(&base.comparison_year_csv),
            comparison_year_chart_html: dir.join(&base.comparison_year_chart_html),
            ..base
        }
    }

    pub fn slice_country(&self) -> &str {
        self.slice_country.as_deref().unwrap_or(&self.anchor_country)
    }

    pub fn comparison_country(&self) -> &str {
        self.comparison_country
            .as_deref()
            .unwrap_or(&self.anchor_country)
    }
}
