// Skink Survey - Core Library
// Survey grouping, sighting ledger, size reconciliation and Mark encoding,
// shared by the sloop-to-mark and harvest-newbies binaries.

pub mod config;
pub mod db;
pub mod encoder;
pub mod error;
pub mod ledger;
pub mod newbies;
pub mod pipeline;
pub mod reconciliation;
pub mod rules;
pub mod sheet;
pub mod size;
pub mod survey;

// Re-export commonly used types
pub use config::{init_tracing, CliArgs, RunConfig, Species};
pub use db::{
    insert_captures, populate, setup_database,
    CaptureRow, RawSighting, SightingField, SightingStore, SqliteSightingStore,
};
pub use encoder::EncounterHistoryEncoder;
pub use error::{Result, SurveyError};
pub use ledger::{Identifier, Individual, Ledger, PhotoTags, SightingPayload, SightingRecord};
pub use newbies::{collect_newbies, collect_photos, create_photo_dir, write_newbies, Newbie};
pub use pipeline::{run_mark_formatting, run_newbie_harvest, HarvestSummary, MarkSummary};
pub use reconciliation::{ReconciliationReport, SizeFit, SizeReconciliationEngine};
pub use rules::{ActiveMerge, MergeDirective, MergeRuleSet};
pub use sheet::{SiteSurveys, SurveySheet};
pub use size::SizeEstimate;
pub use survey::{Survey, SurveyDate, SurveySeries, SurveySeriesBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
