use anyhow::Result;

use boxscore_predict::config::PipelineConfig;
use boxscore_predict::{games_dataset, logging, pipeline};

fn main() -> Result<()> {
    logging::init();
    let cfg = PipelineConfig::load();

    let summary = pipeline::build(&cfg)?;

    println!("Box score build complete");
    println!("Dataset: {}", cfg.dataset_path.display());
    println!("Pages: {}/{}", summary.pages_parsed, summary.pages_total);
    println!("Rows: {}", summary.rows);
    if !summary.failures.is_empty() {
        println!(
            "Skipped: {} (see {})",
            summary.failures.len(),
            games_dataset::report_path(&cfg.dataset_path).display()
        );
        for failure in summary.failures.iter().take(8) {
            println!(" - {}: {}", failure.path.display(), failure.error);
        }
    }

    Ok(())
}
