use anyhow::Result;
use tracing::info;

use boxscore_predict::config::PipelineConfig;
use boxscore_predict::{logging, pipeline};

fn main() -> Result<()> {
    logging::init();
    let cfg = PipelineConfig::load();

    let report = pipeline::predict(&cfg)?;

    for (season, m) in &report.by_season {
        info!(season, samples = m.samples, accuracy = m.accuracy, "season accuracy");
    }
    info!(samples = report.overall.samples, "scored predictions");
    println!("Accuracy Score: {}", report.overall.accuracy);

    Ok(())
}
