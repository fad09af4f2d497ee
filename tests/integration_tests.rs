use abnb_revenue::core::Pipeline;
use abnb_revenue::{CliConfig, EtlEngine, EtlError, LocalStorage, RevenuePipeline, TomlConfig};
use std::fs;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

struct CitySpec<'a> {
    name: &'a str,
    id_offset: usize,
    neighbourhoods: &'a [&'a str],
}

fn write_city(root: &Path, spec: &CitySpec<'_>, listings: usize) {
    let dir = root.join(spec.name);
    fs::create_dir_all(&dir).unwrap();

    let mut listings_csv = String::from(
        "id,listing_url,scrape_id,name,summary,host_id,host_name,price,cleaning_fee,accommodates,bedrooms,bathrooms,room_type,property_type,neighbourhood_cleansed,latitude,longitude,availability_365,square_feet\n",
    );
    let mut calendar_csv = String::from("listing_id,date,available,price\n");
    let mut reviews_csv = String::from("listing_id,id,date,reviewer_name,comments\n");

    for i in 0..listings {
        let id = spec.id_offset + i;
        let accommodates = if i % 10 == 9 { 10 } else { i % 6 + 1 };
        let price = 40.0 + 20.0 * accommodates as f64 + (i % 5) as f64 * 3.0;
        let cleaning_fee = if i % 10 == 0 {
            String::new()
        } else {
            format!("${:.2}", 5.0 + (i % 4) as f64 * 5.0)
        };
        let room_type = if i % 2 == 0 { "Entire home/apt" } else { "Private room" };
        let property_type = if i % 3 == 0 { "House" } else { "Apartment" };
        let neighbourhood = spec.neighbourhoods[i % spec.neighbourhoods.len()];
        let summary = "Nice place ".repeat(i % 4 + 1);
        let square_feet = if i % 7 == 0 { "450" } else { "" };

        listings_csv.push_str(&format!(
            "{id},https://example.com/rooms/{id},20160104,Listing {id},{summary},{host},Host {host},${price:.2},{cleaning_fee},{accommodates},{bedrooms},1,{room_type},{property_type},{neighbourhood},47.6,-122.3,{availability},{square_feet}\n",
            host = 900 + i,
            bedrooms = accommodates / 2,
            availability = 100 + i * 5,
        ));

        for month in 1..=12 {
            for day in [1, 15] {
                let available = if (month + i) % 3 != 0 { "t" } else { "f" };
                let day_price = if available == "t" {
                    format!("${:.2}", price)
                } else {
                    String::new()
                };
                calendar_csv.push_str(&format!(
                    "{id},2016-{month:02}-{day:02},{available},{day_price}\n"
                ));
            }
        }

        for review in 0..2 {
            reviews_csv.push_str(&format!(
                "{id},{},2016-03-0{},Guest,Lovely stay\n",
                id * 10 + review,
                review + 1
            ));
        }
    }

    fs::write(dir.join("listings.csv"), listings_csv).unwrap();
    fs::write(dir.join("calendar.csv"), calendar_csv).unwrap();
    fs::write(dir.join("reviews.csv"), reviews_csv).unwrap();
}

fn write_dataset(root: &Path) {
    write_city(
        root,
        &CitySpec {
            name: "seattle",
            id_offset: 1000,
            neighbourhoods: &["Belltown", "Fremont", "Ballard"],
        },
        30,
    );
    write_city(
        root,
        &CitySpec {
            name: "boston",
            id_offset: 5000,
            neighbourhoods: &["Back Bay", "Fenway"],
        },
        30,
    );
}

fn read_zip_entry(archive: &mut zip::ZipArchive<std::io::Cursor<Vec<u8>>>, name: &str) -> String {
    let mut file = archive.by_name(name).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

#[tokio::test]
async fn test_end_to_end_revenue_report() {
    let data_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    write_dataset(data_dir.path());

    let data_path = data_dir.path().to_str().unwrap().to_string();
    let output_path = output_dir.path().to_str().unwrap().to_string();

    let config = CliConfig {
        data_path: Some(data_path.clone()),
        output_path: Some(output_path.clone()),
        ..Default::default()
    };
    let pipeline = RevenuePipeline::new(
        LocalStorage::new(data_path),
        LocalStorage::new(output_path.clone()),
        config,
    );
    let engine = EtlEngine::new_with_monitoring(pipeline, false);

    let report_path = engine.run().await.unwrap();
    assert!(report_path.ends_with("abnb_report.zip"));

    let full_path = output_dir.path().join("abnb_report.zip");
    assert!(full_path.exists());

    let zip_data = fs::read(&full_path).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    for expected in [
        "calendar_stats.csv",
        "calendar_revenue.csv",
        "listings_revenue.csv",
        "model_input.csv",
        "coefficients.csv",
        "model_summary.json",
    ] {
        assert!(names.contains(&expected.to_string()), "missing {}", expected);
    }

    let stats = read_zip_entry(&mut archive, "calendar_stats.csv");
    assert!(stats.starts_with("listing_id,month,folder,revenue\n"));
    // 每個 listing 12 個月中有 8 個月可訂
    assert_eq!(stats.lines().count(), 1 + 60 * 8);

    let model_input = read_zip_entry(&mut archive, "model_input.csv");
    let header = model_input.lines().next().unwrap();
    assert!(header.contains("folder_seattle"));
    assert!(header.contains("summary_count"));
    assert!(header.contains("price"));
    assert!(!header.contains("listing_url"));
    assert!(!header.contains("host_name"));
    assert!(!header.contains("square_feet"));
    assert!(!header.split(',').any(|c| c == "id"));

    let coefficients = read_zip_entry(&mut archive, "coefficients.csv");
    assert!(coefficients.starts_with("feature,coef,abs_coef\n"));
    assert!(!coefficients.contains("revenue_month_mean"));

    let summary: serde_json::Value =
        serde_json::from_str(&read_zip_entry(&mut archive, "model_summary.json")).unwrap();
    assert_eq!(summary["cities"], serde_json::json!(["boston", "seattle"]));
    assert_eq!(summary["review_count"], 120);
    assert_eq!(summary["listings_with_revenue"], 60);
    assert_eq!(summary["target"], "revenue_year");
    assert_eq!(summary["calendar_start"], "2016-01-01");
    assert_eq!(summary["calendar_end"], "2016-12-15");
    assert!(summary["r2"].as_f64().unwrap().is_finite());

    // 10 人房與缺清潔費的列被移除
    let model_rows = summary["model_rows"].as_u64().unwrap() as usize;
    assert_eq!(model_rows, 48);
    let n_train = summary["n_train"].as_u64().unwrap() as usize;
    let n_test = summary["n_test"].as_u64().unwrap() as usize;
    assert_eq!(n_train + n_test, model_rows);
    assert_eq!(n_test, 15);

    let abs: Vec<f64> = summary["coefficients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["abs_coef"].as_f64().unwrap())
        .collect();
    assert!(abs.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_transform_revenue_matches_calendar() {
    let data_dir = TempDir::new().unwrap();
    write_dataset(data_dir.path());
    let data_path = data_dir.path().to_str().unwrap().to_string();

    let config = CliConfig {
        data_path: Some(data_path.clone()),
        ..Default::default()
    };
    let pipeline = RevenuePipeline::new(
        LocalStorage::new(data_path.clone()),
        LocalStorage::new(data_path),
        config,
    );

    let raw = pipeline.extract().await.unwrap();
    assert_eq!(raw.listings.len(), 60);
    assert_eq!(raw.calendar.len(), 60 * 24);

    let result = pipeline.transform(raw).await.unwrap();
    let first = result
        .calendar
        .revenue
        .iter()
        .find(|r| r.listing_id == 1000)
        .unwrap();

    // listing 1000: 容納 1 人，價格 60，(month + 0) % 3 != 0 的月份可訂，每月兩天
    assert_eq!(first.folder, "seattle");
    assert_eq!(first.booked_months, 8);
    assert_eq!(first.months[0], 120.0);
    assert_eq!(first.months[2], 0.0);
    assert_eq!(first.revenue_year, 960.0);
    assert_eq!(first.revenue_month_mean, 120.0);
}

#[tokio::test]
async fn test_toml_config_controls_archive() {
    let data_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    write_dataset(data_dir.path());

    let toml_content = format!(
        r#"
[pipeline]
name = "integration"

[source]
data_path = "{}"

[preprocess]
min_property_type_listings = 50

[model]
test_size = 0.25
random_state = 7

[load]
output_path = "{}"
archive_name = "integration.zip"
include_visual = false
"#,
        data_dir.path().display(),
        output_dir.path().display()
    );
    let config = TomlConfig::from_toml_str(&toml_content).unwrap();
    let pipeline = RevenuePipeline::new(
        LocalStorage::new(config.source.data_path.clone()),
        LocalStorage::new(config.load.output_path.clone()),
        config,
    );

    let report_path = EtlEngine::new(pipeline).run().await.unwrap();
    assert!(report_path.ends_with("integration.zip"));

    let zip_data = fs::read(output_dir.path().join("integration.zip")).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    assert!(archive.by_name("listings_revenue.csv").is_err());

    // 每種房型都少於 50 筆，dummy 欄位全數移除
    let model_input = read_zip_entry(&mut archive, "model_input.csv");
    let header = model_input.lines().next().unwrap();
    assert!(!header.contains("property_type_"));
    assert!(header.contains("neighbourhood_cleansed_Fenway"));

    let summary: serde_json::Value =
        serde_json::from_str(&read_zip_entry(&mut archive, "model_summary.json")).unwrap();
    assert_eq!(summary["n_test"], 12);
}

#[tokio::test]
async fn test_empty_data_folder_fails() {
    let data_dir = TempDir::new().unwrap();
    let data_path = data_dir.path().to_str().unwrap().to_string();

    let config = CliConfig {
        data_path: Some(data_path.clone()),
        ..Default::default()
    };
    let pipeline = RevenuePipeline::new(
        LocalStorage::new(data_path.clone()),
        LocalStorage::new(data_path),
        config,
    );

    let err = EtlEngine::new(pipeline).run().await.unwrap_err();
    assert!(matches!(err, EtlError::ProcessingError { .. }));
}
