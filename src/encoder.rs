// 📝 Encounter History Encoder - ledger → Mark .inp files
// One character per encounter occasion, one line per animal:
//   binary:  0/1              "0110 1;\r\n"
//   cohort:  0/A/B/C/D        "0AB0 1;\r\n"
// Plus the survey metadata file describing primary/secondary occasions.

use crate::error::{Result, SurveyError};
use crate::ledger::{Individual, Ledger};
use crate::rules::{ActiveMerge, MergeRuleSet};
use crate::size::SizeEstimate;
use crate::survey::{SurveyDate, SurveySeries};
use std::io::Write;
use tracing::debug;

/// Mark's line terminator
pub const CRLF: &str = "\r\n";

/// Every history describes exactly one animal
pub const ONE_ANIMAL: &str = " 1;";

const COHORT_WITH_SIZE_ONE: &[u8; 5] = b"0ABCD";
const COHORT_WITHOUT_SIZE_ONE: &[u8; 5] = b"00ABC";

// ============================================================================
// ENCODER
// ============================================================================

pub struct EncounterHistoryEncoder<'a> {
    series: &'a SurveySeries,

    /// Site is closed to size-1 births during the survey window
    keep_size_one: bool,

    /// Split surveys folded into one column, ordered by column
    merges: Vec<ActiveMerge>,
}

impl<'a> EncounterHistoryEncoder<'a> {
    pub fn new(series: &'a SurveySeries, keep_size_one: bool, rules: &MergeRuleSet) -> Self {
        EncounterHistoryEncoder {
            series,
            keep_size_one,
            merges: rules.active_for(series),
        }
    }

    pub fn merges(&self) -> &[ActiveMerge] {
        &self.merges
    }

    /// Encounter occasions after split surveys are folded
    pub fn occasion_count(&self) -> usize {
        self.series.survey_count() - self.merges.len()
    }

    /// Secondary occasions per survey after split surveys are folded
    pub fn secondary_counts(&self) -> Vec<usize> {
        self.series
            .surveys()
            .iter()
            .enumerate()
            .map(|(i, survey)| {
                let folded = self.merges.iter().filter(|m| m.survey_index == i).count();
                survey.len() - folded
            })
            .collect()
    }

    fn folds_into_previous(&self, column: usize) -> bool {
        self.merges.iter().any(|m| m.second_column == column)
    }

    /// Walk the dates, emit one char each, folding split-survey pairs
    fn encode<F>(&self, individual: &Individual<SizeEstimate>, mut emit: F, fold: fn(u8, u8) -> u8) -> Result<String>
    where
        F: FnMut(SurveyDate, Option<SizeEstimate>) -> Result<u8>,
    {
        let mut history: Vec<u8> = Vec::with_capacity(self.series.survey_count());
        for (column, date) in self.series.dates_in_order().enumerate() {
            let seen = individual.record_on(&date).map(|r| r.payload);
            history.push(emit(date, seen)?);

            if self.folds_into_previous(column) && history.len() >= 2 {
                let second = history.pop().unwrap_or(b'0');
                let first = history.pop().unwrap_or(b'0');
                history.push(fold(first, second));
            }
        }
        Ok(String::from_utf8_lossy(&history).into_owned())
    }

    /// 0/1 history; size-1 sightings count only if the site keeps them
    pub fn binary_history(&self, individual: &Individual<SizeEstimate>) -> Result<String> {
        let keep_size_one = self.keep_size_one;
        self.encode(
            individual,
            |_, seen| {
                Ok(match seen {
                    Some(size) if keep_size_one || size.value() > 1.0 => b'1',
                    _ => b'0',
                })
            },
            fold_binary,
        )
    }

    /// Cohort letter history; fails if a size is not a reconciled class
    pub fn cohort_history(&self, individual: &Individual<SizeEstimate>) -> Result<String> {
        let table = if self.keep_size_one {
            COHORT_WITH_SIZE_ONE
        } else {
            COHORT_WITHOUT_SIZE_ONE
        };
        self.encode(
            individual,
            |date, seen| match seen {
                None => Ok(b'0'),
                Some(size) => match size.class() {
                    Some(class) => Ok(table[usize::from(class)]),
                    None => Err(SurveyError::UnreconciledSize {
                        individual: individual.key.to_string(),
                        date,
                        size: size.value(),
                    }),
                },
            },
            fold_cohort,
        )
    }

    /// Write the binary .inp file; all-zero histories are left out
    pub fn write_binary<W: Write>(&self, out: &mut W, ledger: &Ledger<SizeEstimate>) -> Result<usize> {
        let mut written = 0;
        for individual in ledger.individuals() {
            let history = self.binary_history(individual)?;
            if history.bytes().any(|c| c == b'1') {
                write!(out, "{}{}{}", history, ONE_ANIMAL, CRLF)?;
                debug!(individual = %individual.key, %history, "binary history");
                written += 1;
            }
        }
        Ok(written)
    }

    /// Write the cohort .inp file; histories with no letter are left out
    pub fn write_cohort<W: Write>(&self, out: &mut W, ledger: &Ledger<SizeEstimate>) -> Result<usize> {
        let mut written = 0;
        for individual in ledger.individuals() {
            let history = self.cohort_history(individual)?;
            if history.bytes().any(|c| c != b'0') {
                write!(out, "{}{}{}", history, ONE_ANIMAL, CRLF)?;
                debug!(individual = %individual.key, %history, "cohort history");
                written += 1;
            }
        }
        Ok(written)
    }

    /// Write the survey metadata file
    ///
    /// Line 1 is the inter-occasion intervals for RMark: 0.0 within a
    /// survey, the year gap between surveys, blank after the last one.
    /// The rest is a human-readable summary.
    pub fn write_metadata<W: Write>(&self, out: &mut W) -> Result<()> {
        let counts = self.secondary_counts();
        let mut gaps = self.series.series_gaps();

        for count in &counts {
            for _ in 1..*count {
                out.write_all(b"0.0 ")?;
            }
            let gap = gaps.next().map(format_years).unwrap_or_default();
            write!(out, "{} ", gap)?;
        }
        out.write_all(CRLF.as_bytes())?;

        write!(out, "{} encounter occasions (total surveys){}", self.occasion_count(), CRLF)?;
        write!(out, "{} primary occasions (survey years){}", counts.len(), CRLF)?;
        out.write_all(b"Secondary occasions (surveys per year):")?;
        for count in &counts {
            write!(out, " {}", count)?;
        }
        out.write_all(CRLF.as_bytes())?;

        if counts.len() > 1 {
            out.write_all(b"Years between survey series: ")?;
            for gap in self.series.series_gaps() {
                write!(out, "{} ", format_years(gap))?;
            }
            out.write_all(CRLF.as_bytes())?;
        }

        Ok(())
    }
}

/// Either day seen means seen
fn fold_binary(first: u8, second: u8) -> u8 {
    if first == b'0' && second == b'0' {
        b'0'
    } else {
        b'1'
    }
}

/// Both days should carry the same letter; if not, A beats B beats C beats D
fn fold_cohort(first: u8, second: u8) -> u8 {
    for letter in [b'A', b'B', b'C', b'D'] {
        if first == letter || second == letter {
            return letter;
        }
    }
    b'0'
}

/// Years the way the analysis scripts expect them: "1.0", "0.98", "2.5"
pub fn format_years(years: f64) -> String {
    if years.fract() == 0.0 {
        format!("{:.1}", years)
    } else {
        format!("{}", years)
    }
}

// ============================================================================
// TESTS
// ============================================================================
