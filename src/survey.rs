// 📅 Survey Grouper - dates → surveys → survey series
// One Survey is a season's worth of survey dates (a primary occasion);
// each date inside it is a secondary occasion.

use chrono::NaiveDate;
use tracing::debug;

/// A survey date: year, month, day with no time component
pub type SurveyDate = NaiveDate;

// ============================================================================
// SURVEY
// ============================================================================

/// Survey - ordered dates belonging to one primary occasion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Survey {
    dates: Vec<SurveyDate>,
}

impl Survey {
    pub fn new(dates: Vec<SurveyDate>) -> Self {
        Survey { dates }
    }

    pub fn dates(&self) -> &[SurveyDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// First date of the survey, used as the reference point for gaps
    pub fn start(&self) -> Option<SurveyDate> {
        self.dates.first().copied()
    }

    pub fn contains(&self, date: &SurveyDate) -> bool {
        self.dates.contains(date)
    }
}

// ============================================================================
// SURVEY SERIES
// ============================================================================

/// SurveySeries - all surveys for one site, in chronological order
#[derive(Debug, Clone, PartialEq)]
pub struct SurveySeries {
    site: String,
    surveys: Vec<Survey>,
}

impl SurveySeries {
    pub fn new(site: impl Into<String>, surveys: Vec<Survey>) -> Self {
        SurveySeries {
            site: site.into(),
            surveys: surveys.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }

    /// Partition a column of date-or-blank markers into surveys
    ///
    /// A run of dates is one survey, any run of blanks separates surveys,
    /// leading blanks are ignored and a trailing run of dates closes itself.
    pub fn from_markers<I>(site: impl Into<String>, markers: I) -> Self
    where
        I: IntoIterator<Item = Option<SurveyDate>>,
    {
        let mut builder = SurveySeriesBuilder::new(site);
        for marker in markers {
            match marker {
                Some(date) => builder.add_survey(date),
                None => builder.end_series(),
            }
        }
        builder.finish()
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn surveys(&self) -> &[Survey] {
        &self.surveys
    }

    /// Every date across the series: outer by survey, inner by date order.
    /// Call again to restart.
    pub fn dates_in_order(&self) -> impl Iterator<Item = SurveyDate> + Clone + '_ {
        self.surveys.iter().flat_map(|s| s.dates.iter().copied())
    }

    /// Years between the first dates of consecutive surveys, to 2 decimals
    pub fn series_gaps(&self) -> impl Iterator<Item = f64> + Clone + '_ {
        self.surveys.windows(2).filter_map(|pair| {
            let start1 = pair[0].start()?;
            let start2 = pair[1].start()?;
            Some(years_between(start1, start2))
        })
    }

    /// Total number of survey dates (encounter occasions before any merges)
    pub fn survey_count(&self) -> usize {
        self.surveys.iter().map(Survey::len).sum()
    }

    /// Index of the survey holding this date
    pub fn survey_index_of(&self, date: &SurveyDate) -> Option<usize> {
        self.surveys.iter().position(|s| s.contains(date))
    }

    pub fn dump_surveys(&self) {
        for (i, survey) in self.surveys.iter().enumerate() {
            debug!(site = %self.site, survey = i, dates = ?survey.dates, "survey");
        }
    }
}

/// Elapsed years between two dates, 365-day years, rounded to 2 decimals
///
/// A whole day count over 365 never lands on a hundredths half step (the
/// nearest is 36/73 of the way), so rounding mode does not change the result.
pub fn years_between(from: SurveyDate, to: SurveyDate) -> f64 {
    let years = (to - from).num_days() as f64 / 365.0;
    (years * 100.0).round() / 100.0
}

// ============================================================================
// BUILDER
// ============================================================================

/// Incremental assembly of a SurveySeries, one cell at a time
#[derive(Debug)]
pub struct SurveySeriesBuilder {
    site: String,
    surveys: Vec<Survey>,
    current: Vec<SurveyDate>,
}

impl SurveySeriesBuilder {
    pub fn new(site: impl Into<String>) -> Self {
        SurveySeriesBuilder {
            site: site.into(),
            surveys: Vec::new(),
            current: Vec::new(),
        }
    }

    /// Add a survey date to the survey being assembled
    pub fn add_survey(&mut self, date: SurveyDate) {
        self.current.push(date);
    }

    /// Close the survey being assembled; no-op if it is empty
    pub fn end_series(&mut self) {
        if !self.current.is_empty() {
            let dates = std::mem::take(&mut self.current);
            self.surveys.push(Survey::new(dates));
        }
    }

    pub fn finish(mut self) -> SurveySeries {
        self.end_series();
        SurveySeries {
            site: self.site,
            surveys: self.surveys,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Option<SurveyDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    #[test]
    fn test_grouping_splits_on_blank_runs() {
        let markers = vec![
            None,
            d(2010, 1, 5),
            d(2010, 1, 6),
            None,
            None,
            None,
            d(2011, 1, 4),
            None,
            d(2012, 1, 10),
            d(2012, 1, 11),
            d(2012, 1, 12),
        ];
        let non_blank = markers.iter().filter(|m| m.is_some()).count();

        let series = SurveySeries::from_markers("Airport", markers);

        assert_eq!(series.surveys().len(), 3);
        assert_eq!(series.surveys()[0].len(), 2);
        assert_eq!(series.surveys()[1].len(), 1);
        assert_eq!(series.surveys()[2].len(), 3);
        assert_eq!(series.survey_count(), non_blank);
        assert_eq!(series.site(), "Airport");
    }

    #[test]
    fn test_trailing_blanks_do_not_add_empty_survey() {
        let series = SurveySeries::from_markers("Site", vec![d(2010, 2, 1), None, None]);
        assert_eq!(series.surveys().len(), 1);
    }

    #[test]
    fn test_all_blank_column_has_no_surveys() {
        let series = SurveySeries::from_markers("Site", vec![None, None]);
        assert!(series.surveys().is_empty());
        assert_eq!(series.dates_in_order().count(), 0);
        assert_eq!(series.series_gaps().count(), 0);
    }

    #[test]
    fn test_dates_in_order_is_restartable() {
        let series = SurveySeries::from_markers(
            "Site",
            vec![d(2010, 1, 5), d(2010, 1, 6), None, d(2011, 1, 4)],
        );

        let first: Vec<_> = series.dates_in_order().collect();
        let second: Vec<_> = series.dates_in_order().collect();

        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                d(2010, 1, 5).unwrap(),
                d(2010, 1, 6).unwrap(),
                d(2011, 1, 4).unwrap()
            ]
        );
    }

    #[test]
    fn test_series_gaps_between_survey_starts() {
        let series = SurveySeries::from_markers(
            "Site",
            vec![
                d(2010, 1, 5),
                d(2010, 1, 20),
                None,
                d(2011, 1, 5),
                None,
                d(2012, 12, 20),
            ],
        );

        let gaps: Vec<f64> = series.series_gaps().collect();
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0], 1.0);
        // 715 days / 365
        assert_eq!(gaps[1], 1.96);
    }

    #[test]
    fn test_years_between_near_rounding_boundaries() {
        let from = d(2010, 1, 1).unwrap();
        let after = |days: u64| years_between(from, from + chrono::Days::new(days));

        assert_eq!(after(365), 1.0);
        assert_eq!(after(366), 1.0);
        assert_eq!(after(177), 0.48);
        assert_eq!(after(188), 0.52);
        assert_eq!(after(396), 1.08);
        assert_eq!(after(407), 1.12);
    }

    #[test]
    fn test_single_survey_has_no_gaps() {
        let series = SurveySeries::from_markers("Site", vec![d(2010, 1, 5), d(2010, 1, 6)]);
        assert_eq!(series.series_gaps().count(), 0);
    }

    #[test]
    fn test_builder_end_series_without_dates_is_noop() {
        let mut builder = SurveySeriesBuilder::new("Site");
        builder.end_series();
        builder.add_survey(d(2010, 1, 5).unwrap());
        builder.end_series();
        builder.end_series();
        let series = builder.finish();

        assert_eq!(series.surveys().len(), 1);
        assert_eq!(series.survey_index_of(&d(2010, 1, 5).unwrap()), Some(0));
        assert_eq!(series.survey_index_of(&d(2010, 1, 6).unwrap()), None);
    }
}
