// 🗄️ Sighting Store - photo-id capture records per site and date
// The store is opened read-only. Every query is one autocommit statement,
// so no lock is held from one survey date to the next.

use crate::error::{Result, SurveyError};
use crate::ledger::{Identifier, Ledger, SightingPayload};
use crate::survey::{SurveyDate, SurveySeries};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use tracing::debug;

/// Capture event type recorded for photo identification
pub const PHOTO_ID_EVENT: &str = "PhotoID";

// ============================================================================
// CORE TYPES
// ============================================================================

/// Which capture column travels with each sighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SightingField {
    /// Field estimate of size class (Mark pipeline)
    EstimatedSize,

    /// Capture record id, names the photo files (harvesting pipeline)
    SightingId,
}

impl SightingField {
    pub fn column(&self) -> &'static str {
        match self {
            SightingField::EstimatedSize => "EST_SIZE_CLASS",
            SightingField::SightingId => "SL_ID",
        }
    }
}

/// One capture row as stored: individual id plus the selected field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSighting {
    pub individual: Option<String>,
    pub value: Option<String>,
}

/// CaptureRow - a full capture record, for seeding a store
#[derive(Debug, Clone)]
pub struct CaptureRow {
    pub individual_id: Option<String>,
    pub est_size_class: Option<String>,
    pub sl_id: i64,
    pub event: String,
    pub site: String,
    pub capture_time: String,
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// SightingStore - where raw capture events come from
pub trait SightingStore {
    /// Photo-id sightings at `site` on `date`
    fn sightings_on(&self, site: &str, date: SurveyDate, field: SightingField) -> Result<Vec<RawSighting>>;
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteSightingStore {
    conn: Connection,
}

impl SqliteSightingStore {
    /// Open an existing store read-only
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| SurveyError::StoreConnection {
            path: path.to_path_buf(),
            source,
        })?;

        // read-only open is lazy; touch the schema so a bad file fails here
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|source| SurveyError::StoreConnection {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(SqliteSightingStore { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteSightingStore { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SightingStore for SqliteSightingStore {
    fn sightings_on(&self, site: &str, date: SurveyDate, field: SightingField) -> Result<Vec<RawSighting>> {
        let sql = format!(
            "SELECT \"INDIVIDUAL_ID\", \"{}\" FROM \"CAPTURE\"
             WHERE \"EVENT\" = ?1 AND \"SITE\" = ?2 AND date(\"CAPTURE_TIME\") = ?3
             ORDER BY rowid",
            field.column()
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;

        let sightings = stmt
            .query_map(
                params![PHOTO_ID_EVENT, site, date.format("%Y-%m-%d").to_string()],
                |row| {
                    Ok(RawSighting {
                        individual: value_to_text(row.get(0)?),
                        value: value_to_text(row.get(1)?),
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sightings)
    }
}

/// Render any SQLite value as text; integral reals lose their ".0"
fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) if f.fract() == 0.0 => Some(format!("{}", f as i64)),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

// ============================================================================
// LEDGER POPULATION
// ============================================================================

/// Query every survey date in order and add each sighting to the ledger
///
/// Returns the number of sightings added.
pub fn populate<S, P, F>(
    store: &S,
    series: &SurveySeries,
    field: SightingField,
    ledger: &mut Ledger<P>,
    mut to_payload: F,
) -> Result<usize>
where
    S: SightingStore + ?Sized,
    P: SightingPayload,
    F: FnMut(Option<&str>) -> P,
{
    let mut added = 0;
    for date in series.dates_in_order() {
        let sightings = store.sightings_on(series.site(), date, field)?;
        debug!(site = series.site(), %date, count = sightings.len(), "survey date queried");
        for sighting in sightings {
            let key = Identifier::from_raw(sighting.individual.as_deref());
            ledger.add_sighting(date, key, to_payload(sighting.value.as_deref()));
            added += 1;
        }
    }
    Ok(added)
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS \"CAPTURE\" (
            \"SL_ID\" INTEGER PRIMARY KEY,
            \"INDIVIDUAL_ID\" TEXT,
            \"EST_SIZE_CLASS\" TEXT,
            \"EVENT\" TEXT NOT NULL,
            \"SITE\" TEXT NOT NULL,
            \"CAPTURE_TIME\" TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_capture_site_time ON \"CAPTURE\"(\"SITE\", \"CAPTURE_TIME\")",
        [],
    )?;

    Ok(())
}

pub fn insert_captures(conn: &Connection, rows: &[CaptureRow]) -> Result<usize> {
    let mut inserted = 0;
    for row in rows {
        conn.execute(
            "INSERT INTO \"CAPTURE\" (
                \"SL_ID\", \"INDIVIDUAL_ID\", \"EST_SIZE_CLASS\", \"EVENT\", \"SITE\", \"CAPTURE_TIME\"
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.sl_id,
                row.individual_id,
                row.est_size_class,
                row.event,
                row.site,
                row.capture_time,
            ],
        )?;
        inserted += 1;
    }
    Ok(inserted)
}

// ============================================================================
// TESTS
// ============================================================================
