// 🏷️ Column Merge Rules - Rules as Data
// A split survey (one visit spread over two consecutive days) is folded
// into a single encounter occasion. Which surveys were split is data, not code.

use crate::error::Result;
use crate::survey::{SurveyDate, SurveySeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

// ============================================================================
// MERGE DIRECTIVE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDirective {
    /// Site the split survey belongs to (exact match)
    pub site: String,

    /// First day of the split survey
    pub first: SurveyDate,

    /// Second day, folded into the first day's column
    pub second: SurveyDate,

    /// Description/notes about this directive
    #[serde(default)]
    pub note: Option<String>,
}

impl MergeDirective {
    pub fn new(site: impl Into<String>, first: SurveyDate, second: SurveyDate) -> Self {
        MergeDirective {
            site: site.into(),
            first,
            second,
            note: None,
        }
    }

    /// Where this directive lands in the series, if it applies at all
    ///
    /// Applies only when the site matches and `second` directly follows
    /// `first` inside one survey.
    pub fn locate(&self, series: &SurveySeries) -> Option<ActiveMerge> {
        if self.site != series.site() {
            return None;
        }

        let mut column = 0;
        for (survey_index, survey) in series.surveys().iter().enumerate() {
            let dates = survey.dates();
            if let Some(pos) = dates.windows(2).position(|w| w[0] == self.first && w[1] == self.second) {
                return Some(ActiveMerge {
                    survey_index,
                    second_column: column + pos + 1,
                });
            }
            column += dates.len();
        }
        None
    }
}

/// A directive resolved against one survey series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveMerge {
    /// Survey holding both days
    pub survey_index: usize,

    /// Position of the second day in `dates_in_order()`
    pub second_column: usize,
}

// ============================================================================
// RULE SET
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MergeRuleSet {
    directives: Vec<MergeDirective>,
}

impl MergeRuleSet {
    /// Create an empty rule set
    pub fn new() -> Self {
        MergeRuleSet { directives: Vec::new() }
    }

    /// The known split surveys
    pub fn builtin() -> Self {
        let mut rules = MergeRuleSet::new();

        // Airport was surveyed across 5 and 6 April 2006; the only site surveyed then
        if let (Some(first), Some(second)) = (
            NaiveDate::from_ymd_opt(2006, 4, 5),
            NaiveDate::from_ymd_opt(2006, 4, 6),
        ) {
            let mut airport = MergeDirective::new("Airport", first, second);
            airport.note = Some("split survey 5/6 April 2006".to_string());
            rules.add_directive(airport);
        }

        rules
    }

    /// Load directives from a JSON array, replacing the built-in ones
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let directives: Vec<MergeDirective> = serde_json::from_str(&content)?;
        Ok(MergeRuleSet::from_directives(directives))
    }

    pub fn from_directives(directives: Vec<MergeDirective>) -> Self {
        MergeRuleSet { directives }
    }

    pub fn add_directive(&mut self, directive: MergeDirective) {
        self.directives.push(directive);
    }

    pub fn directives(&self) -> &[MergeDirective] {
        &self.directives
    }

    /// Resolve every directive that applies to this series, in column order
    pub fn active_for(&self, series: &SurveySeries) -> Vec<ActiveMerge> {
        let mut active = Vec::new();
        for directive in &self.directives {
            match directive.locate(series) {
                Some(merge) => {
                    if !active.contains(&merge) {
                        active.push(merge);
                    }
                }
                None if directive.site == series.site() => {
                    warn!(
                        site = %directive.site,
                        first = %directive.first,
                        second = %directive.second,
                        "merge directive does not match consecutive survey dates, ignored"
                    );
                }
                None => {}
            }
        }
        active.sort_by_key(|m| m.second_column);
        active
    }

    pub fn rule_count(&self) -> usize {
        self.directives.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> SurveyDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn airport_series() -> SurveySeries {
        SurveySeries::from_markers(
            "Airport",
            vec![
                Some(d(2006, 4, 4)),
                Some(d(2006, 4, 5)),
                Some(d(2006, 4, 6)),
                None,
                Some(d(2007, 4, 5)),
            ],
        )
    }

    #[test]
    fn test_builtin_airport_rule_is_active() {
        let rules = MergeRuleSet::builtin();
        assert_eq!(rules.rule_count(), 1);

        let active = rules.active_for(&airport_series());
        assert_eq!(
            active,
            vec![ActiveMerge {
                survey_index: 0,
                second_column: 2
            }]
        );
    }

    #[test]
    fn test_rule_ignored_for_other_sites() {
        let series = SurveySeries::from_markers(
            "Macraes",
            vec![Some(d(2006, 4, 5)), Some(d(2006, 4, 6))],
        );
        assert!(MergeRuleSet::builtin().active_for(&series).is_empty());
    }

    #[test]
    fn test_rule_needs_consecutive_dates_in_one_survey() {
        let series = SurveySeries::from_markers(
            "Airport",
            vec![Some(d(2006, 4, 5)), None, Some(d(2006, 4, 6))],
        );
        assert!(MergeRuleSet::builtin().active_for(&series).is_empty());
    }

    #[test]
    fn test_load_rules_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merges.json");
        fs::write(
            &path,
            r#"[
                {"site": "Airport", "first": "2007-04-05", "second": "2007-04-06"},
                {"site": "Gorge", "first": "2009-01-10", "second": "2009-01-11", "note": "rain"}
            ]"#,
        )
        .unwrap();

        let rules = MergeRuleSet::from_file(&path).unwrap();

        assert_eq!(rules.rule_count(), 2);
        assert_eq!(rules.directives()[0].first, d(2007, 4, 5));
        assert_eq!(rules.directives()[1].note.as_deref(), Some("rain"));
        // the file replaces the built-in 2006 rule
        assert!(rules.active_for(&airport_series()).is_empty());
    }

    #[test]
    fn test_malformed_rules_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merges.json");
        fs::write(&path, "not json").unwrap();

        assert!(MergeRuleSet::from_file(&path).is_err());
    }
}
