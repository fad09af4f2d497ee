use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting revenue analysis");
        self.monitor.log_stats("Start");

        tracing::info!("📥 Loading city datasets...");
        let raw_data = self.pipeline.extract().await?;
        tracing::info!(
            "Extracted {} listings from {} cities",
            raw_data.listings.len(),
            raw_data.cities.len()
        );
        self.monitor.log_stats("Extract");

        tracing::info!("🔄 Analysing calendar and fitting model...");
        let result = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "Model fitted on {} listings with {} features",
            result.report.n_train,
            result.report.coefficients.len()
        );
        self.monitor.log_stats("Transform");

        tracing::info!("💾 Writing report...");
        let output_path = self.pipeline.load(result).await?;
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}
