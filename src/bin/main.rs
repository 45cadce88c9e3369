//! One-shot assessment: `assess <scenario text>` or scenario on stdin.
//! Prints the assessment as JSON.

use corep_assistant::{config::Settings, pipeline::AssessmentPipeline};
use std::io::Read;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut scenario = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if scenario.trim().is_empty() {
        std::io::stdin().read_to_string(&mut scenario)?;
    }
    if scenario.trim().is_empty() {
        eprintln!("usage: assess <scenario text>   (or pipe the scenario on stdin)");
        std::process::exit(2);
    }

    let settings = Settings::from_env()?;
    let pipeline = AssessmentPipeline::from_settings(&settings)?;

    info!(provider = %settings.provider, model = %settings.model, "Running assessment");

    match pipeline.run(scenario.trim()).await {
        Ok(assessment) => {
            println!("{}", serde_json::to_string_pretty(&assessment)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("Assessment failed at {:?} stage: {}", e.stage(), e);
            if let Some(raw) = e.raw_text() {
                eprintln!("\nRaw model output:\n{}", raw);
            }
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
