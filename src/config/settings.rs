use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_file_name, validate_non_empty_string, validate_range, Validate,
};
use serde::{Deserialize, Serialize};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// listings 清理規則。關鍵字皆以子字串比對欄名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    pub drop_keywords: Vec<String>,
    pub keep_columns: Vec<String>,
    pub manual_drop: Vec<String>,
    pub numeric_keywords: Vec<String>,
    pub count_keywords: Vec<String>,
    pub missing_threshold: f64,
    pub max_revenue_year: f64,
    pub max_accommodates: f64,
    pub min_neighbourhood_listings: usize,
    pub min_property_type_listings: usize,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            drop_keywords: strings(&[
                "url",
                "scrape",
                "itude",
                "_id",
                "listing",
                "availablity",
                "instant",
                "host",
                "since",
                "first",
                "last",
                "license",
                "verification",
                "avail",
            ]),
            keep_columns: strings(&["availability_365"]),
            manual_drop: strings(&["room_type", "neighbourhood"]),
            numeric_keywords: strings(&["price", "fee", "deposit", "extra"]),
            count_keywords: strings(&[
                "name",
                "description",
                "about",
                "overview",
                "summary",
                "space",
                "notes",
                "amenities",
            ]),
            missing_threshold: 0.30,
            max_revenue_year: 150_000.0,
            max_accommodates: 8.5,
            min_neighbourhood_listings: 10,
            min_property_type_listings: 20,
        }
    }
}

impl Validate for PreprocessSettings {
    fn validate(&self) -> Result<()> {
        validate_range("preprocess.missing_threshold", self.missing_threshold, 0.0, 1.0)?;
        validate_range(
            "preprocess.max_revenue_year",
            self.max_revenue_year,
            0.0,
            f64::MAX,
        )?;
        validate_range(
            "preprocess.max_accommodates",
            self.max_accommodates,
            0.0,
            f64::MAX,
        )?;
        for keyword in self
            .drop_keywords
            .iter()
            .chain(&self.numeric_keywords)
            .chain(&self.count_keywords)
        {
            validate_non_empty_string("preprocess keyword", keyword)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub target: String,
    pub drop_columns: Vec<String>,
    pub test_size: f64,
    pub random_state: u64,
}

impl ModelSettings {
    pub fn default_drop_columns() -> Vec<String> {
        let mut columns: Vec<String> = (1..=12).map(|m| m.to_string()).collect();
        columns.extend(strings(&[
            "booked_months",
            "revenue_year",
            "revenue_month_mean",
        ]));
        columns
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            target: "revenue_year".to_string(),
            drop_columns: Self::default_drop_columns(),
            test_size: 0.30,
            random_state: 42,
        }
    }
}

impl Validate for ModelSettings {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("model.target", &self.target)?;
        // 測試集與訓練集都至少要有一筆
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(EtlError::InvalidConfigValueError {
                field: "model.test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "Value must be strictly between 0 and 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSettings {
    pub archive_name: String,
    pub include_visual: bool,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            archive_name: "abnb_report.zip".to_string(),
            include_visual: true,
        }
    }
}

impl Validate for LoadSettings {
    fn validate(&self) -> Result<()> {
        validate_file_name("load.archive_name", &self.archive_name, "zip")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PreprocessSettings::default().validate().is_ok());
        assert!(ModelSettings::default().validate().is_ok());
        assert!(LoadSettings::default().validate().is_ok());
    }

    #[test]
    fn test_default_drop_columns_cover_revenue() {
        let drop = ModelSettings::default_drop_columns();
        assert_eq!(drop.len(), 15);
        assert!(drop.contains(&"12".to_string()));
        assert!(drop.contains(&"revenue_month_mean".to_string()));
    }

    #[test]
    fn test_test_size_bounds() {
        let mut settings = ModelSettings::default();
        settings.test_size = 1.0;
        assert!(settings.validate().is_err());
        settings.test_size = 0.0;
        assert!(settings.validate().is_err());
    }
}
