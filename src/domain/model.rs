use crate::domain::table::Table;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type ListingId = i64;

pub const MONTHS: usize = 12;

/// 所有城市資料夾合併後的原始資料
#[derive(Debug, Clone, Default)]
pub struct RawDatasets {
    pub cities: Vec<String>,
    pub listings: Table,
    pub calendar: Table,
    pub reviews: Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub listing_id: ListingId,
    pub month: u32,
    pub folder: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRevenue {
    pub listing_id: ListingId,
    pub folder: String,
    /// index 0 為一月
    pub months: [f64; MONTHS],
    pub booked_months: u32,
    pub revenue_year: f64,
    pub revenue_month_mean: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarAnalysis {
    pub stats: Vec<MonthlyRevenue>,
    pub revenue: Vec<ListingRevenue>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

#[derive(Debug, Clone, Default)]
pub struct PreparedListings {
    /// listings 加上營收欄位，供視覺化使用
    pub visual: Table,
    /// 清理、編碼、過濾後的模型輸入
    pub features: Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientWeight {
    pub feature: String,
    pub coef: f64,
    pub abs_coef: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub target: String,
    pub intercept: f64,
    pub r2: f64,
    pub mse: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub coefficients: Vec<CoefficientWeight>,
}

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub cities: Vec<String>,
    pub review_count: usize,
    pub calendar: CalendarAnalysis,
    pub prepared: PreparedListings,
    pub report: ModelReport,
}
