use crate::core::calendar::analyze_calendar;
use crate::core::loader::{load_data, FOLDER_COLUMN};
use crate::core::preprocess::{preprocess_listings, revenue_columns};
use crate::core::regression::regression_model;
use crate::core::{AnalysisResult, ConfigProvider, Pipeline, RawDatasets, Storage};
use crate::domain::model::{ListingRevenue, ModelReport};
use crate::domain::table::{Cell, Table};
use crate::utils::error::{EtlError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const CALENDAR_STATS_FILE: &str = "calendar_stats.csv";
pub const CALENDAR_REVENUE_FILE: &str = "calendar_revenue.csv";
pub const LISTINGS_REVENUE_FILE: &str = "listings_revenue.csv";
pub const MODEL_INPUT_FILE: &str = "model_input.csv";
pub const COEFFICIENTS_FILE: &str = "coefficients.csv";
pub const SUMMARY_FILE: &str = "model_summary.json";

/// 從城市資料夾讀入，輸出模型報告壓縮檔
pub struct RevenuePipeline<S: Storage, C: ConfigProvider> {
    source: S,
    sink: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> RevenuePipeline<S, C> {
    /// `source` 以資料根目錄為基準，`sink` 以輸出目錄為基準
    pub fn new(source: S, sink: S, config: C) -> Self {
        Self {
            source,
            sink,
            config,
        }
    }
}

#[derive(Debug, Serialize)]
struct ModelSummary<'a> {
    cities: &'a [String],
    listings_with_revenue: usize,
    model_rows: usize,
    review_count: usize,
    calendar_start: Option<NaiveDate>,
    calendar_end: Option<NaiveDate>,
    #[serde(flatten)]
    report: &'a ModelReport,
}

pub fn calendar_revenue_table(revenue: &[ListingRevenue]) -> Result<Table> {
    let mut columns = vec!["listing_id".to_string(), FOLDER_COLUMN.to_string()];
    columns.extend(revenue_columns());
    let mut table = Table::new(columns);

    for r in revenue {
        let mut row = vec![
            Cell::Number(r.listing_id as f64),
            Cell::Text(r.folder.clone()),
        ];
        row.extend(r.months.iter().map(|&m| Cell::Number(m)));
        row.push(Cell::Number(r.booked_months as f64));
        row.push(Cell::Number(r.revenue_year));
        row.push(Cell::Number(r.revenue_month_mean));
        table.push_row(row)?;
    }
    Ok(table)
}

fn serialize_csv<T: Serialize>(records: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

fn summary_json(result: &AnalysisResult) -> Result<String> {
    let date_range = result.calendar.date_range;
    let summary = ModelSummary {
        cities: &result.cities,
        listings_with_revenue: result.prepared.visual.len(),
        model_rows: result.prepared.features.len(),
        review_count: result.review_count,
        calendar_start: date_range.map(|(start, _)| start),
        calendar_end: date_range.map(|(_, end)| end),
        report: &result.report,
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for RevenuePipeline<S, C> {
    async fn extract(&self) -> Result<RawDatasets> {
        tracing::info!("📂 Reading city folders from: {}", self.config.data_path());
        load_data(&self.source).await
    }

    async fn transform(&self, data: RawDatasets) -> Result<AnalysisResult> {
        let calendar = analyze_calendar(&data.calendar)?;
        let prepared = preprocess_listings(
            &data.listings,
            &calendar.revenue,
            &self.config.preprocess_settings(),
        )?;
        let (_, report) = regression_model(&prepared.features, &self.config.model_settings())?;

        for weight in report.coefficients.iter().take(10) {
            tracing::info!("  {:>12.2}  {}", weight.coef, weight.feature);
        }

        Ok(AnalysisResult {
            cities: data.cities,
            review_count: data.reviews.len(),
            calendar,
            prepared,
            report,
        })
    }

    async fn load(&self, result: AnalysisResult) -> Result<String> {
        let load = self.config.load_settings();
        let output_path = format!("{}/{}", self.config.output_path(), load.archive_name);

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

            zip.start_file::<_, ()>(CALENDAR_STATS_FILE, FileOptions::default())?;
            zip.write_all(&serialize_csv(&result.calendar.stats)?)?;

            zip.start_file::<_, ()>(CALENDAR_REVENUE_FILE, FileOptions::default())?;
            let revenue = calendar_revenue_table(&result.calendar.revenue)?;
            zip.write_all(revenue.to_csv_string()?.as_bytes())?;

            if load.include_visual {
                zip.start_file::<_, ()>(LISTINGS_REVENUE_FILE, FileOptions::default())?;
                zip.write_all(result.prepared.visual.to_csv_string()?.as_bytes())?;
            }

            zip.start_file::<_, ()>(MODEL_INPUT_FILE, FileOptions::default())?;
            zip.write_all(result.prepared.features.to_csv_string()?.as_bytes())?;

            zip.start_file::<_, ()>(COEFFICIENTS_FILE, FileOptions::default())?;
            zip.write_all(&serialize_csv(&result.report.coefficients)?)?;

            zip.start_file::<_, ()>(SUMMARY_FILE, FileOptions::default())?;
            zip.write_all(summary_json(&result)?.as_bytes())?;

            let cursor = zip.finish()?;
            cursor.into_inner()
        };

        tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
        self.sink.write_file(&load.archive_name, &zip_data).await?;

        Ok(output_path)
    }
}
