// Pull all sightings for a survey series out of the photo-id store,
// make estimated sizes consistent across years, and write Mark input files.
//
// usage: sloop-to-mark [-v] <species> <site> <survey-file>

use anyhow::Result;
use clap::Parser;
use tracing::info;

use skink_survey::{init_tracing, run_mark_formatting, CliArgs, RunConfig};

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    let config = RunConfig::from_args(args)?;
    info!(
        "Mark formatting: species {} site {} surveys {}",
        config.species,
        config.site,
        config.survey_file.display()
    );

    let summary = run_mark_formatting(&config)?;

    for file in &summary.files {
        info!("✓ Wrote {}", file.display());
    }

    Ok(())
}
