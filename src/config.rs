// ⚙️ Run Configuration - species table, command line, logging
// Both binaries take: [-v] <species> <site> <survey-file>

use crate::error::{Result, SurveyError};
use crate::rules::MergeRuleSet;
use crate::sheet::resolve_sheet_path;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// SPECIES
// ============================================================================

/// Each species has its own sighting store and photo library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Species {
    Otago,
    Grand,
}

impl Species {
    /// Name used on the command line, as the sheet name and in output file names
    pub fn name(&self) -> &'static str {
        match self {
            Species::Otago => "otago",
            Species::Grand => "grand",
        }
    }

    /// Sighting store database name
    pub fn database(&self) -> &'static str {
        match self {
            Species::Otago => "otagolive",
            Species::Grand => "grandlive",
        }
    }

    /// Default location of the original capture photos
    pub fn photo_source(&self) -> &'static str {
        match self {
            Species::Otago => "/media/GAOS_DB/OtagoSkinkSloopData/db/images/originals/",
            Species::Grand => "/media/GAOS_DB/GrandSkinkSloopData/db/images/originals/",
        }
    }
}

impl FromStr for Species {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "otago" => Ok(Species::Otago),
            "grand" => Ok(Species::Grand),
            other => Err(SurveyError::UnknownSpecies(other.to_string())),
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// COMMAND LINE
// ============================================================================

#[derive(Parser, Debug, Clone)]
#[command(version)]
#[command(about = "Skink survey sightings: photo-id store → analysis files")]
pub struct CliArgs {
    /// Dump processing details (debug logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Species: otago or grand
    pub species: String,

    /// Site name, exactly as in the survey sheet header
    pub site: String,

    /// Survey sheet (CSV), or a directory holding <species>.csv
    pub survey_file: PathBuf,

    /// Directory holding the <database>.db sighting stores
    #[arg(long, default_value = ".", env = "SKINK_DB_DIR")]
    pub db_dir: PathBuf,

    /// Directory output files are written to
    #[arg(long, default_value = ".", env = "SKINK_OUT_DIR")]
    pub out_dir: PathBuf,

    /// Override the species' photo library location
    #[arg(long, env = "SKINK_PHOTO_ROOT")]
    pub photo_root: Option<PathBuf>,

    /// JSON file of split-survey merge directives (replaces the built-in ones)
    #[arg(long, env = "SKINK_MERGE_RULES")]
    pub merge_rules: Option<PathBuf>,
}

// ============================================================================
// RUN CONFIG
// ============================================================================

/// Everything one run needs, resolved from the command line
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub species: Species,
    pub site: String,
    pub survey_file: PathBuf,
    pub db_dir: PathBuf,
    pub out_dir: PathBuf,
    pub photo_root: Option<PathBuf>,
    pub merge_rules: Option<PathBuf>,
    pub verbose: bool,
}

impl RunConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        Ok(RunConfig {
            species: args.species.parse()?,
            site: args.site,
            survey_file: args.survey_file,
            db_dir: args.db_dir,
            out_dir: args.out_dir,
            photo_root: args.photo_root,
            merge_rules: args.merge_rules,
            verbose: args.verbose,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.db_dir.join(format!("{}.db", self.species.database()))
    }

    pub fn sheet_path(&self) -> PathBuf {
        resolve_sheet_path(&self.survey_file, self.species.name())
    }

    pub fn photo_source(&self) -> PathBuf {
        self.photo_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.species.photo_source()))
    }

    /// `<site>_<species>`, the stem of every output file
    pub fn output_stem(&self) -> String {
        format!("{}_{}", self.site, self.species)
    }

    pub fn output_path(&self, suffix: &str) -> PathBuf {
        self.out_dir.join(format!("{}{}", self.output_stem(), suffix))
    }

    pub fn merge_rule_set(&self) -> Result<MergeRuleSet> {
        match &self.merge_rules {
            Some(path) => MergeRuleSet::from_file(path),
            None => Ok(MergeRuleSet::builtin()),
        }
    }
}

// ============================================================================
// LOGGING
// ============================================================================

/// Log to stderr; `-v` turns on debug output for this crate,
/// otherwise RUST_LOG or info
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("skink_survey=debug,sloop_to_mark=debug,harvest_newbies=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

// ============================================================================
// TESTS
// ============================================================================
