pub mod calendar;
pub mod etl;
pub mod loader;
pub mod pipeline;
pub mod preprocess;
pub mod regression;

pub use crate::domain::model::{AnalysisResult, RawDatasets};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
