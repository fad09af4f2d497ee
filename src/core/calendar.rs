use crate::core::loader::FOLDER_COLUMN;
use crate::domain::model::{CalendarAnalysis, ListingId, ListingRevenue, MonthlyRevenue, MONTHS};
use crate::domain::table::{Cell, Table};
use crate::utils::error::{EtlError, Result};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static CURRENCY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\$,]").expect("currency pattern is valid"));

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// calendar 中代表「可訂」的 available 值，營收只計入這些天
const AVAILABLE_FLAG: &str = "t";

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    // 帶時間的格式只取日期部分
    let date_part = raw.split([' ', 'T']).next().unwrap_or(raw);
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// "$1,250.00" -> 1250.0
pub fn parse_price(cell: &Cell) -> Result<Option<f64>> {
    match cell {
        Cell::Null => Ok(None),
        Cell::Number(value) => Ok(Some(*value)),
        Cell::Text(text) => {
            let cleaned = CURRENCY_PATTERN.replace_all(text, "");
            cleaned
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| EtlError::processing(format!("Unparseable price '{}'", text)))
        }
    }
}

/// 把 calendar 逐日資料彙總成每月營收，並樞紐成每個 listing 一列。
///
/// 只計入 `available == "t"` 的日子；沒有任何入帳的月份補 0，
/// `booked_months` 為補 0 前有資料的月份數。
pub fn analyze_calendar(calendar: &Table) -> Result<CalendarAnalysis> {
    let listing_idx = calendar.require_column("calendar", "listing_id")?;
    let date_idx = calendar.require_column("calendar", "date")?;
    let available_idx = calendar.require_column("calendar", "available")?;
    let price_idx = calendar.require_column("calendar", "price")?;
    let folder_idx = calendar.require_column("calendar", FOLDER_COLUMN)?;

    let mut groups: BTreeMap<(ListingId, u32, String), f64> = BTreeMap::new();
    let mut first_date: Option<NaiveDate> = None;
    let mut last_date: Option<NaiveDate> = None;
    let mut skipped = 0usize;

    for (row_number, row) in calendar.rows().iter().enumerate() {
        let date = match &row[date_idx] {
            Cell::Null => {
                skipped += 1;
                continue;
            }
            cell => {
                let raw = cell.to_string();
                parse_date(&raw).ok_or_else(|| {
                    EtlError::processing(format!(
                        "Unparseable calendar date '{}' at row {}",
                        raw,
                        row_number + 1
                    ))
                })?
            }
        };
        first_date = Some(first_date.map_or(date, |d| d.min(date)));
        last_date = Some(last_date.map_or(date, |d| d.max(date)));

        if row[available_idx].as_text() != Some(AVAILABLE_FLAG) {
            continue;
        }

        let (Some(listing_id), Cell::Text(folder)) = (row[listing_idx].as_id(), &row[folder_idx])
        else {
            skipped += 1;
            continue;
        };

        let price = parse_price(&row[price_idx])?.unwrap_or(0.0);
        *groups
            .entry((listing_id, date.month(), folder.clone()))
            .or_insert(0.0) += price;
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} calendar rows without date, listing or folder", skipped);
    }

    let stats: Vec<MonthlyRevenue> = groups
        .into_iter()
        .map(|((listing_id, month, folder), revenue)| MonthlyRevenue {
            listing_id,
            month,
            folder,
            revenue,
        })
        .collect();

    let revenue = pivot_revenue(&stats);

    tracing::info!(
        "📅 Calendar aggregated into {} listing-months across {} listings",
        stats.len(),
        revenue.len()
    );

    Ok(CalendarAnalysis {
        stats,
        revenue,
        date_range: first_date.zip(last_date),
    })
}

fn pivot_revenue(stats: &[MonthlyRevenue]) -> Vec<ListingRevenue> {
    let mut pivot: BTreeMap<(ListingId, &str), [Option<f64>; MONTHS]> = BTreeMap::new();
    for stat in stats {
        let months = pivot
            .entry((stat.listing_id, stat.folder.as_str()))
            .or_insert([None; MONTHS]);
        months[(stat.month - 1) as usize] = Some(stat.revenue);
    }

    pivot
        .into_iter()
        .map(|((listing_id, folder), months)| {
            let booked_months = months.iter().filter(|m| m.is_some()).count() as u32;
            let months = months.map(|m| m.unwrap_or(0.0));
            let revenue_year: f64 = months.iter().sum();
            ListingRevenue {
                listing_id,
                folder: folder.to_string(),
                months,
                booked_months,
                revenue_year,
                revenue_month_mean: revenue_year / booked_months as f64,
            }
        })
        .collect()
}
