use crate::core::{RawDatasets, Storage};
use crate::domain::table::{Cell, Table};
use crate::utils::error::{EtlError, Result};

pub const LISTINGS_FILE: &str = "listings.csv";
pub const CALENDAR_FILE: &str = "calendar.csv";
pub const REVIEWS_FILE: &str = "reviews.csv";

/// 每筆資料所屬城市資料夾的欄名
pub const FOLDER_COLUMN: &str = "folder";

/// 讀取資料根目錄下每個城市資料夾並合併成三張表。
///
/// listings 只保留所有城市共有的欄位；calendar 與 reviews 取欄位聯集，
/// 缺少的欄位補空值。
pub async fn load_data<S: Storage>(storage: &S) -> Result<RawDatasets> {
    let cities = storage.list_dirs("").await?;
    if cities.is_empty() {
        return Err(EtlError::processing(
            "No city folders found in the data path",
        ));
    }

    tracing::info!("🏙️ Found {} city folders: {}", cities.len(), cities.join(", "));

    let mut datasets: Option<RawDatasets> = None;
    for city in &cities {
        let listings = read_city_table(storage, city, LISTINGS_FILE).await?;
        let calendar = read_city_table(storage, city, CALENDAR_FILE).await?;
        let reviews = read_city_table(storage, city, REVIEWS_FILE).await?;

        tracing::debug!(
            "{}: {} listings, {} calendar rows, {} reviews",
            city,
            listings.len(),
            calendar.len(),
            reviews.len()
        );

        match datasets.as_mut() {
            None => {
                datasets = Some(RawDatasets {
                    cities: Vec::new(),
                    listings,
                    calendar,
                    reviews,
                });
            }
            Some(acc) => {
                let before = acc.listings.width();
                acc.listings.append_common(listings);
                if acc.listings.width() < before {
                    tracing::warn!(
                        "⚠️ {} listings lack {} shared columns, dropped from all cities",
                        city,
                        before - acc.listings.width()
                    );
                }
                acc.calendar.append_union(calendar);
                acc.reviews.append_union(reviews);
            }
        }
    }

    let mut datasets = datasets.unwrap_or_default();
    datasets.cities = cities;

    tracing::info!(
        "✅ Loaded {} listings, {} calendar rows, {} reviews",
        datasets.listings.len(),
        datasets.calendar.len(),
        datasets.reviews.len()
    );

    Ok(datasets)
}

async fn read_city_table<S: Storage>(storage: &S, city: &str, file: &str) -> Result<Table> {
    let path = format!("{}/{}", city, file);
    let data = storage.read_file(&path).await?;
    let mut table = Table::from_csv_bytes(&data)?;

    // 既有的 folder 欄位以資料夾名稱為準
    table.drop_columns(&[FOLDER_COLUMN]);
    let folder = vec![Cell::Text(city.to_string()); table.len()];
    table.add_column(FOLDER_COLUMN, folder)?;
    Ok(table)
}
