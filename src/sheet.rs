// 📂 Survey Sheet Reader - CSV export of the per-species survey sheet
// Layout:
//   row 0   site names (column headers)
//   row 1   per-site flag: closed to size-1 births during the survey window
//   row 2+  survey date or blank, per site column

use crate::error::{Result, SurveyError};
use crate::survey::{SurveyDate, SurveySeries};
use chrono::{Days, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::io::Read;
use std::path::{Path, PathBuf};

const HEADER_ROW: usize = 0;
const FLAG_ROW: usize = 1;
const FIRST_DATE_ROW: usize = 2;

/// Surveys for one site plus its size-1 policy
#[derive(Debug, Clone)]
pub struct SiteSurveys {
    pub series: SurveySeries,

    /// Size-1 animals count as sightings at this site
    pub keep_size_one: bool,
}

#[derive(Debug, Clone)]
pub struct SurveySheet {
    rows: Vec<StringRecord>,
}

impl SurveySheet {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        Self::from_csv(rdr)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        Self::from_csv(rdr)
    }

    fn from_csv<R: Read>(mut rdr: csv::Reader<R>) -> Result<Self> {
        let rows = rdr.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(SurveySheet { rows })
    }

    fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or("")
    }

    /// Column whose row-0 cell is exactly the site name
    pub fn find_column(&self, site: &str) -> Result<usize> {
        self.rows
            .get(HEADER_ROW)
            .and_then(|headers| headers.iter().position(|h| h == site))
            .ok_or_else(|| SurveyError::SiteNotFound {
                site: site.to_string(),
            })
    }

    pub fn keep_size_one(&self, column: usize) -> bool {
        is_truthy(self.cell(FLAG_ROW, column))
    }

    /// Group the site's date column into a survey series
    pub fn extract_surveys(&self, site: &str) -> Result<SiteSurveys> {
        let column = self.find_column(site)?;

        let mut markers = Vec::new();
        for row in FIRST_DATE_ROW..self.rows.len() {
            let value = self.cell(row, column).trim();
            if value.is_empty() {
                markers.push(None);
                continue;
            }
            let date = parse_survey_date(value).ok_or_else(|| SurveyError::InvalidDate {
                row,
                column,
                value: value.to_string(),
            })?;
            markers.push(Some(date));
        }

        Ok(SiteSurveys {
            series: SurveySeries::from_markers(site, markers),
            keep_size_one: self.keep_size_one(column),
        })
    }
}

/// A directory holds one `<species>.csv` per species; a file is the sheet itself
pub fn resolve_sheet_path(path: &Path, species: &str) -> PathBuf {
    if path.is_dir() {
        path.join(format!("{}.csv", species))
    } else {
        path.to_path_buf()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "1.0" | "true" | "yes" | "y" | "x"
    )
}

/// ISO date, day/month/year, ISO date-time, or spreadsheet serial day number
pub fn parse_survey_date(value: &str) -> Option<SurveyDate> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%d/%m/%Y") {
        return Some(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }

    // 1900 date system: serial 1 is 1900-01-01, via the 1899-12-30 epoch
    let serial: f64 = value.parse().ok()?;
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.trunc() as u64))
}

// ============================================================================
// TESTS
// ============================================================================
