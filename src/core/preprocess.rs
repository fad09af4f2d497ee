use crate::config::settings::PreprocessSettings;
use crate::core::loader::FOLDER_COLUMN;
use crate::domain::model::{ListingId, ListingRevenue, PreparedListings, MONTHS};
use crate::domain::table::{Cell, ColumnKind, Table};
use crate::utils::error::Result;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

static NUMERIC_NOISE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\$,%]").expect("numeric noise pattern is valid"));

pub const LISTING_ID_COLUMN: &str = "id";
pub const BOOKED_MONTHS_COLUMN: &str = "booked_months";
pub const REVENUE_YEAR_COLUMN: &str = "revenue_year";
pub const REVENUE_MONTH_MEAN_COLUMN: &str = "revenue_month_mean";
pub const ACCOMMODATES_COLUMN: &str = "accommodates";
pub const NEIGHBOURHOOD_COLUMN: &str = "neighbourhood_cleansed";
pub const PROPERTY_TYPE_COLUMN: &str = "property_type";

/// 空值在字數統計中視為文字 "nan"
const NULL_TEXT: &str = "nan";

/// 合併後附加在 listings 之後的營收欄位，月份欄以 1..12 命名
pub fn revenue_columns() -> Vec<String> {
    let mut columns: Vec<String> = (1..=MONTHS).map(|m| m.to_string()).collect();
    columns.push(BOOKED_MONTHS_COLUMN.to_string());
    columns.push(REVENUE_YEAR_COLUMN.to_string());
    columns.push(REVENUE_MONTH_MEAN_COLUMN.to_string());
    columns
}

fn revenue_cells(revenue: &ListingRevenue) -> Vec<Cell> {
    let mut cells: Vec<Cell> = revenue.months.iter().map(|&m| Cell::Number(m)).collect();
    cells.push(Cell::Number(revenue.booked_months as f64));
    cells.push(Cell::Number(revenue.revenue_year));
    cells.push(Cell::Number(revenue.revenue_month_mean));
    cells
}

type RevenueIndex<'a> = HashMap<(ListingId, &'a str), &'a ListingRevenue>;

/// 內部合併：只保留能對上營收的列
fn join_revenue(
    table: &Table,
    keys: &[Option<(ListingId, String)>],
    index: &RevenueIndex<'_>,
) -> Result<Table> {
    let mut columns = table.columns().to_vec();
    columns.extend(revenue_columns());
    let mut joined = Table::new(columns);

    for (row, key) in table.rows().iter().zip(keys) {
        let Some((id, folder)) = key else { continue };
        if let Some(revenue) = index.get(&(*id, folder.as_str())) {
            let mut cells = row.clone();
            cells.extend(revenue_cells(revenue));
            joined.push_row(cells)?;
        }
    }
    Ok(joined)
}

fn contains_any(name: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| name.contains(k.as_str()))
}

fn strip_numeric(cell: &Cell, failures: &mut usize) -> Cell {
    match cell {
        Cell::Text(text) => {
            let cleaned = NUMERIC_NOISE_PATTERN.replace_all(text, "");
            match cleaned.trim().parse::<f64>() {
                Ok(value) => Cell::Number(value),
                Err(_) => {
                    *failures += 1;
                    Cell::Null
                }
            }
        }
        other => other.clone(),
    }
}

fn char_count(cell: &Cell) -> Cell {
    let count = match cell {
        Cell::Null => NULL_TEXT.chars().count(),
        other => other.to_string().chars().count(),
    };
    Cell::Number(count as f64)
}

fn one_hot_encode(table: &mut Table, column: &str) -> Result<usize> {
    let Some(values) = table.take_column(column) else {
        return Ok(0);
    };

    let labels: Vec<Option<String>> = values
        .iter()
        .map(|cell| (!cell.is_null()).then(|| cell.to_string()))
        .collect();
    let categories: BTreeSet<&str> = labels.iter().flatten().map(String::as_str).collect();

    let mut added = 0;
    for category in categories {
        let name = format!("{}_{}", column, category);
        if table.has_column(&name) {
            tracing::warn!("⚠️ Dummy column '{}' already exists, skipped", name);
            continue;
        }
        let cells = labels
            .iter()
            .map(|label| {
                let hit = label.as_deref() == Some(category);
                Cell::Number(if hit { 1.0 } else { 0.0 })
            })
            .collect();
        table.add_column(name, cells)?;
        added += 1;
    }
    Ok(added)
}

/// 出現次數低於門檻的類別，其 dummy 欄位名稱
fn rare_dummies(visual: &Table, column: &str, min_listings: usize) -> Vec<String> {
    let mut rare: Vec<String> = visual
        .value_counts(column)
        .into_iter()
        .filter(|(_, count)| *count < min_listings)
        .map(|(value, _)| format!("{}_{}", column, value))
        .collect();
    rare.sort();
    rare
}

fn numeric_below(row: &[Cell], index: usize, limit: f64) -> bool {
    row[index].as_f64().is_some_and(|value| value < limit)
}

/// 把營收併入 listings 並清理成可直接迴歸的數值表。
///
/// 回傳的 `visual` 是未經清理的 listings 加上營收欄位；`features`
/// 只含數值欄位且沒有空值。
pub fn preprocess_listings(
    listings: &Table,
    revenue: &[ListingRevenue],
    settings: &PreprocessSettings,
) -> Result<PreparedListings> {
    let id_idx = listings.require_column("listings", LISTING_ID_COLUMN)?;
    let folder_idx = listings.require_column("listings", FOLDER_COLUMN)?;

    let index: RevenueIndex<'_> = revenue
        .iter()
        .map(|r| ((r.listing_id, r.folder.as_str()), r))
        .collect();
    let keys: Vec<Option<(ListingId, String)>> = listings
        .rows()
        .iter()
        .map(|row| Some((row[id_idx].as_id()?, row[folder_idx].to_string())))
        .collect();

    let visual = join_revenue(listings, &keys, &index)?;
    tracing::info!(
        "🔗 {} of {} listings matched calendar revenue",
        visual.len(),
        listings.len()
    );

    let original_text = listings.text_columns();
    let mut work = listings.clone();

    // 網址、爬蟲資訊、座標、房東資訊等與營收無關的欄位
    let keyword_drop: Vec<String> = work
        .columns()
        .iter()
        .filter(|c| contains_any(c, &settings.drop_keywords))
        .filter(|c| !settings.keep_columns.contains(c))
        .cloned()
        .collect();
    work.drop_columns(&keyword_drop);
    work.drop_columns(&settings.manual_drop);
    tracing::debug!("Dropped columns by keyword: {:?}", keyword_drop);

    // 價格、費用欄位去除 $ , % 後轉為數值
    for column in original_text
        .iter()
        .filter(|c| contains_any(c, &settings.numeric_keywords))
    {
        let Some(index) = work.column_index(column) else {
            continue;
        };
        let mut failures = 0;
        work.map_column(index, |cell| strip_numeric(cell, &mut failures));
        if failures > 0 {
            tracing::warn!(
                "⚠️ {} values of '{}' are not numeric, treated as missing",
                failures,
                column
            );
        }
    }

    let sparse: Vec<String> = (0..work.width())
        .filter(|&i| work.null_fraction(i) > settings.missing_threshold)
        .map(|i| work.columns()[i].clone())
        .collect();
    work.drop_columns(&sparse);
    if !sparse.is_empty() {
        tracing::info!(
            "🧹 Dropped {} columns with more than {:.0}% missing values",
            sparse.len(),
            settings.missing_threshold * 100.0
        );
    }

    // 描述性文字改為字數
    let count_columns: Vec<String> = work
        .text_columns()
        .into_iter()
        .filter(|c| contains_any(c, &settings.count_keywords))
        .collect();
    for column in &count_columns {
        let Some(values) = work.take_column(column) else {
            continue;
        };
        let name = format!("{}_count", column);
        if work.has_column(&name) {
            tracing::warn!("⚠️ Count column '{}' already exists, skipped", name);
            continue;
        }
        let counts = values.iter().map(char_count).collect();
        work.add_column(name, counts)?;
    }

    let categorical: Vec<String> = (0..work.width())
        .filter(|&i| work.column_kind(i) == ColumnKind::Text)
        .map(|i| work.columns()[i].clone())
        .collect();
    let mut dummies = 0;
    for column in &categorical {
        dummies += one_hot_encode(&mut work, column)?;
    }
    tracing::debug!(
        "One-hot encoded {} columns into {} dummies",
        categorical.len(),
        dummies
    );

    let mut features = join_revenue(&work, &keys, &index)?;
    features.drop_columns(&[LISTING_ID_COLUMN]);

    let revenue_idx = features.require_column("features", REVENUE_YEAR_COLUMN)?;
    let matched = features.len();
    features.retain_rows(|row| numeric_below(row, revenue_idx, settings.max_revenue_year));
    match features.column_index(ACCOMMODATES_COLUMN) {
        Some(idx) => {
            features.retain_rows(|row| numeric_below(row, idx, settings.max_accommodates))
        }
        None => tracing::warn!(
            "⚠️ '{}' column not available, accommodation filter skipped",
            ACCOMMODATES_COLUMN
        ),
    }
    tracing::debug!(
        "Outlier filter kept {} of {} rows",
        features.len(),
        matched
    );

    let mut rare = rare_dummies(&visual, NEIGHBOURHOOD_COLUMN, settings.min_neighbourhood_listings);
    rare.extend(rare_dummies(
        &visual,
        PROPERTY_TYPE_COLUMN,
        settings.min_property_type_listings,
    ));
    let rare_dropped = features.drop_columns(&rare);

    let null_rows = features.drop_null_rows();

    tracing::info!(
        "✅ Model input ready: {} rows x {} columns ({} rare dummies removed, {} rows with missing values dropped)",
        features.len(),
        features.width(),
        rare_dropped,
        null_rows
    );

    Ok(PreparedListings { visual, features })
}
