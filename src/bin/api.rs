use corep_assistant::{api::start_server, config::Settings, pipeline::AssessmentPipeline};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;

    info!("PRA COREP Own Funds Assistant - API Server");
    info!(provider = %settings.provider, model = %settings.model, "Completion backend");
    info!("Port: {}", settings.port);

    let pipeline = Arc::new(AssessmentPipeline::from_settings(&settings)?);

    info!("Pipeline initialized");

    start_server(pipeline, settings.port).await?;

    Ok(())
}
