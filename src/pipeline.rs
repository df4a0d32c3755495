// 🔁 Pipelines - sheet → store → ledger → output files
// Strictly left to right; each stage finishes before the next starts.
// The sheet is read before the store is touched.

use crate::config::RunConfig;
use crate::db::{populate, SightingField, SightingStore, SqliteSightingStore};
use crate::encoder::EncounterHistoryEncoder;
use crate::ledger::{Ledger, PhotoTags};
use crate::newbies::{collect_newbies, collect_photos, create_photo_dir, write_newbies};
use crate::reconciliation::SizeReconciliationEngine;
use crate::sheet::{SiteSurveys, SurveySheet};
use crate::size::SizeEstimate;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// What the Mark formatting run produced
#[derive(Debug, Clone)]
pub struct MarkSummary {
    pub sightings: usize,
    pub individuals: usize,
    pub binary_rows: usize,
    pub cohort_rows: usize,
    pub occasions: usize,
    pub files: Vec<PathBuf>,
}

/// What the newbie harvest produced
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    pub sightings: usize,
    pub newbies: usize,
    pub photos_copied: usize,
    pub csv_path: PathBuf,
    pub photo_dir: PathBuf,
}

fn load_site_surveys(config: &RunConfig) -> Result<SiteSurveys> {
    let sheet_path = config.sheet_path();
    let sheet = SurveySheet::from_path(&sheet_path)
        .with_context(|| format!("Failed to read survey sheet {}", sheet_path.display()))?;
    let surveys = sheet.extract_surveys(&config.site)?;

    info!(
        "✓ {} survey dates in {} surveys for {}",
        surveys.series.survey_count(),
        surveys.series.surveys().len(),
        config.site
    );
    surveys.series.dump_surveys();
    Ok(surveys)
}

fn open_store(config: &RunConfig) -> Result<SqliteSightingStore> {
    let store = SqliteSightingStore::open(&config.database_path())?;
    info!("✓ Connected to {}", config.database_path().display());
    Ok(store)
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

// ============================================================================
// MARK FORMATTING
// ============================================================================

pub fn run_mark_formatting(config: &RunConfig) -> Result<MarkSummary> {
    let surveys = load_site_surveys(config)?;
    let store = open_store(config)?;
    format_for_mark(config, surveys, &store)
}

/// Reconcile sizes and write the .inp files plus survey metadata
pub fn format_for_mark<S: SightingStore + ?Sized>(
    config: &RunConfig,
    surveys: SiteSurveys,
    store: &S,
) -> Result<MarkSummary> {
    let SiteSurveys { series, keep_size_one } = surveys;
    let rules = config.merge_rule_set().context("Failed to load merge rules")?;

    let mut ledger: Ledger<SizeEstimate> = Ledger::new();
    let sightings = populate(store, &series, SightingField::EstimatedSize, &mut ledger, SizeEstimate::parse)
        .context("Failed to query sightings")?;
    info!("✓ Loaded {} sightings of {} animals", sightings, ledger.len());
    ledger.dump_individuals(&series);

    let report = SizeReconciliationEngine::new().reconcile(&series, &mut ledger);
    info!("{}", report.summary());
    ledger.dump_individuals(&series);

    let encoder = EncounterHistoryEncoder::new(&series, keep_size_one, &rules);

    let meta_path = config.output_path("_surveys.txt");
    let inp_path = config.output_path(".inp");
    let cohort_path = config.output_path("_cohort.inp");

    let mut meta = create_output(&meta_path)?;
    encoder.write_metadata(&mut meta)?;
    meta.flush()?;

    let mut inp = create_output(&inp_path)?;
    let binary_rows = encoder.write_binary(&mut inp, &ledger)?;
    inp.flush()?;

    let mut cohort = create_output(&cohort_path)?;
    let cohort_rows = encoder.write_cohort(&mut cohort, &ledger)?;
    cohort.flush()?;

    info!(
        "✓ {} encounter histories ({} cohort) over {} occasions",
        binary_rows,
        cohort_rows,
        encoder.occasion_count()
    );

    Ok(MarkSummary {
        sightings,
        individuals: ledger.len(),
        binary_rows,
        cohort_rows,
        occasions: encoder.occasion_count(),
        files: vec![meta_path, inp_path, cohort_path],
    })
}

// ============================================================================
// NEWBIE HARVEST
// ============================================================================

pub fn run_newbie_harvest(config: &RunConfig) -> Result<HarvestSummary> {
    let surveys = load_site_surveys(config)?;
    let store = open_store(config)?;
    harvest_newbies(config, surveys, &store)
}

/// Pick out newbies, copy their photos and list them in a CSV
pub fn harvest_newbies<S: SightingStore + ?Sized>(
    config: &RunConfig,
    surveys: SiteSurveys,
    store: &S,
) -> Result<HarvestSummary> {
    let series = surveys.series;

    let mut ledger: Ledger<PhotoTags> = Ledger::new();
    let sightings = populate(store, &series, SightingField::SightingId, &mut ledger, |tag| {
        PhotoTags(tag.map(str::to_string).into_iter().collect())
    })
    .context("Failed to query sightings")?;
    info!("✓ Loaded {} sightings of {} animals", sightings, ledger.len());
    ledger.dump_individuals(&series);

    let newbies = collect_newbies(&series, &ledger);
    info!("✓ {} newbies", newbies.len());

    let photo_dir = config.out_dir.join(config.output_stem());
    create_photo_dir(&photo_dir)?;
    let photos_copied = collect_photos(&config.photo_source(), &photo_dir, &newbies);

    let csv_path = config.output_path("_newbies.csv");
    let mut csv = create_output(&csv_path)?;
    write_newbies(&mut csv, &newbies)?;
    csv.flush()?;

    Ok(HarvestSummary {
        sightings,
        newbies: newbies.len(),
        photos_copied,
        csv_path,
        photo_dir,
    })
}

// ============================================================================
// TESTS
// ============================================================================
