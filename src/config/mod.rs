#[cfg(feature = "cli")]
pub mod cli;
pub mod settings;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::config::settings::{LoadSettings, ModelSettings, PreprocessSettings};
#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_path, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATA_PATH: &str = "./data";
pub const DEFAULT_OUTPUT_PATH: &str = "./output";

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Serialize, Deserialize, Parser)]
#[command(name = "abnb-revenue")]
#[command(about = "Explain short-term-rental revenue from listing features")]
pub struct CliConfig {
    /// Folder holding one sub-folder per city with listings/calendar/reviews CSV files
    #[arg(long)]
    pub data_path: Option<String>,

    #[arg(long)]
    pub output_path: Option<String>,

    /// TOML configuration file; command line flags override it
    #[arg(short, long)]
    pub config: Option<String>,

    /// Regression target column
    #[arg(long)]
    pub target: Option<String>,

    /// Columns excluded from the regression features
    #[arg(long, value_delimiter = ',')]
    pub drop_columns: Vec<String>,

    #[arg(long)]
    pub test_size: Option<f64>,

    #[arg(long)]
    pub random_state: Option<u64>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process CPU and memory per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 把命令列參數覆蓋到模型設定上
    pub fn apply_model_overrides(&self, settings: &mut ModelSettings) {
        if let Some(target) = &self.target {
            settings.target = target.clone();
        }
        if !self.drop_columns.is_empty() {
            settings.drop_columns = self.drop_columns.clone();
        }
        if let Some(test_size) = self.test_size {
            settings.test_size = test_size;
        }
        if let Some(random_state) = self.random_state {
            settings.random_state = random_state;
        }
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn data_path(&self) -> &str {
        self.data_path.as_deref().unwrap_or(DEFAULT_DATA_PATH)
    }

    fn output_path(&self) -> &str {
        self.output_path.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH)
    }

    fn preprocess_settings(&self) -> PreprocessSettings {
        PreprocessSettings::default()
    }

    fn model_settings(&self) -> ModelSettings {
        let mut settings = ModelSettings::default();
        self.apply_model_overrides(&mut settings);
        settings
    }

    fn load_settings(&self) -> LoadSettings {
        LoadSettings::default()
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("data_path", self.data_path())?;
        validate_path("output_path", self.output_path())?;
        self.model_settings().validate()
    }
}
