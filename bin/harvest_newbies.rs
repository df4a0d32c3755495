// Extract newbies (animals only seen in the most recent survey) so their
// photos can be added to the reference library by hand.
//
// Writes <site>_<species>_newbies.csv and a fresh <site>_<species>/ photo directory.
//
// usage: harvest-newbies [-v] <species> <site> <survey-file>

use anyhow::Result;
use clap::Parser;
use tracing::info;

use skink_survey::{init_tracing, run_newbie_harvest, CliArgs, RunConfig};

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    let config = RunConfig::from_args(args)?;
    info!(
        "Newbie harvest: species {} site {} surveys {}",
        config.species,
        config.site,
        config.survey_file.display()
    );

    let summary = run_newbie_harvest(&config)?;

    info!(
        "✓ {} newbies, {} photos copied to {}",
        summary.newbies,
        summary.photos_copied,
        summary.photo_dir.display()
    );
    info!("✓ Wrote {}", summary.csv_path.display());

    Ok(())
}
