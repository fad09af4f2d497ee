use crate::config::settings::{LoadSettings, ModelSettings, PreprocessSettings};
use crate::domain::model::{AnalysisResult, RawDatasets};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// 列出子目錄名稱 (已排序)，一般檔案不列入
    fn list_dirs(&self, path: &str)
        -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn data_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn preprocess_settings(&self) -> PreprocessSettings;
    fn model_settings(&self) -> ModelSettings;
    fn load_settings(&self) -> LoadSettings;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<RawDatasets>;
    async fn transform(&self, data: RawDatasets) -> Result<AnalysisResult>;
    async fn load(&self, result: AnalysisResult) -> Result<String>;
}
