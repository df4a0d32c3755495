// ⚖️ Size Reconciliation Engine - consistent size classes across years
// Each animal gets one size class per survey, following the growth model:
//   1 → 2 → 3 → 4, one class per year, capped at 4
//
// The start class is the best fit (least absolute residual) of that model
// against the mean estimated size per survey. Equal residuals pick the
// larger start class.

use crate::ledger::{Identifier, Individual, Ledger};
use crate::size::{SizeEstimate, MAX_SIZE_CLASS};
use crate::survey::SurveySeries;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

/// How one animal's sizes were fitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeFit {
    pub individual: String,

    /// Survey index of the first sized sighting
    pub first_sighting: usize,

    /// Size class assigned in the first-sighting survey
    pub start_class: u8,

    /// Residual for start classes 1, 2, 3, 4
    pub residuals: [f64; 4],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub fits: Vec<SizeFit>,

    /// Animals never given a non-zero size estimate; fitted as fully grown
    /// from the last survey on
    pub never_sized: Vec<String>,
}

impl ReconciliationReport {
    pub fn reconciled_count(&self) -> usize {
        self.fits.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Size reconciliation: {} animals fitted, {} never sized",
            self.fits.len(),
            self.never_sized.len()
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct SizeReconciliationEngine {
    /// Residuals closer than this are treated as tied (default: 1e-9)
    pub tolerance: f64,
}

impl SizeReconciliationEngine {
    pub fn new() -> Self {
        SizeReconciliationEngine { tolerance: 1e-9 }
    }

    pub fn with_tolerance(tolerance: f64) -> Self {
        SizeReconciliationEngine { tolerance }
    }

    /// Rewrite every animal's records to the fitted size classes
    pub fn reconcile(
        &self,
        series: &SurveySeries,
        ledger: &mut Ledger<SizeEstimate>,
    ) -> ReconciliationReport {
        // Surveys are assumed to be a whole number of years apart
        let years_to_next: Vec<f64> = series.series_gaps().map(f64::round).collect();

        let mut report = ReconciliationReport::default();

        for individual in ledger.individuals_mut() {
            let observed = observed_sizes(series, individual);

            // With no sized survey every start class fits equally and 4 wins the tie
            let first_sighting = match observed.iter().position(Option::is_some) {
                Some(first) => first,
                None => {
                    debug!(individual = %individual.key, "never sized, fitted from the last survey");
                    report.never_sized.push(individual.key.to_string());
                    observed.len().saturating_sub(1)
                }
            };

            let gaps = years_to_next.get(first_sighting..).unwrap_or(&[]);
            let (start_class, residuals) = self.best_start(&observed[first_sighting..], gaps);

            debug!(
                individual = %individual.key,
                ?observed,
                start_class,
                ?residuals,
                "size fit"
            );

            assign_sizes(series, individual, first_sighting, start_class);

            report.fits.push(SizeFit {
                individual: individual.key.to_string(),
                first_sighting,
                start_class,
                residuals,
            });
        }

        report
    }

    /// Pick the start class with the least residual, larger class on a tie
    pub fn best_start(&self, observed: &[Option<f64>], gaps: &[f64]) -> (u8, [f64; 4]) {
        let mut residuals = [0.0; 4];
        let mut best = 1;
        let mut best_residual = f64::INFINITY;

        for class in 1..=MAX_SIZE_CLASS {
            let residual = try_fit(observed, gaps, f64::from(class));
            residuals[usize::from(class - 1)] = residual;
            if residual <= best_residual + self.tolerance {
                best = class;
                best_residual = residual;
            }
        }

        (best, residuals)
    }
}

impl Default for SizeReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean of the non-zero size estimates in each survey, None where unsized
pub fn observed_sizes(series: &SurveySeries, individual: &Individual<SizeEstimate>) -> Vec<Option<f64>> {
    series
        .surveys()
        .iter()
        .map(|survey| {
            let sized: Vec<f64> = survey
                .dates()
                .iter()
                .filter_map(|date| individual.record_on(date))
                .map(|record| record.payload.value())
                .filter(|&size| size > 0.0)
                .collect();
            if sized.is_empty() {
                None
            } else {
                Some(sized.iter().sum::<f64>() / sized.len() as f64)
            }
        })
        .collect()
}

/// Residual between idealised growth from `start` and the observed sizes
///
/// `gaps[i]` is the number of years from survey `i` to survey `i + 1`;
/// predicted size grows by that many classes, capped at 4.
pub fn try_fit(observed: &[Option<f64>], gaps: &[f64], start: f64) -> f64 {
    let cap = f64::from(MAX_SIZE_CLASS);
    let mut predicted = start;
    let mut residual = 0.0;

    for (i, size) in observed.iter().enumerate() {
        if let Some(size) = size {
            residual += (size - predicted).abs();
        }
        if let Some(gap) = gaps.get(i) {
            predicted = (predicted + gap).min(cap);
        }
    }

    residual
}

/// Overwrite sizes from the first-sighting survey on, one class per survey
fn assign_sizes(
    series: &SurveySeries,
    individual: &mut Individual<SizeEstimate>,
    first_sighting: usize,
    start_class: u8,
) {
    let mut derived = start_class;
    for survey in &series.surveys()[first_sighting..] {
        for date in survey.dates() {
            if let Some(record) = individual.record_on_mut(date) {
                record.payload = SizeEstimate::from_class(derived);
            }
        }
        if derived < MAX_SIZE_CLASS {
            derived += 1;
        }
    }
}

/// Sizes assigned to one animal per survey after reconciliation (testing/debug aid)
pub fn sizes_by_survey(series: &SurveySeries, ledger: &Ledger<SizeEstimate>, key: &Identifier) -> Vec<Option<f64>> {
    match ledger.get(key) {
        Some(individual) => observed_sizes(series, individual),
        None => vec![None; series.surveys().len()],
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::SurveyDate;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> SurveyDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Three yearly surveys, two dates each
    fn three_year_series() -> SurveySeries {
        SurveySeries::from_markers(
            "Site",
            vec![
                Some(d(2010, 1, 5)),
                Some(d(2010, 1, 6)),
                None,
                Some(d(2011, 1, 5)),
                Some(d(2011, 1, 6)),
                None,
                Some(d(2012, 1, 5)),
                Some(d(2012, 1, 6)),
            ],
        )
    }

    fn key(s: &str) -> Identifier {
        Identifier::Concrete(s.to_string())
    }

    #[test]
    fn test_try_fit_follows_gaps_and_caps() {
        let observed = [Some(1.0), None, Some(4.0)];
        let gaps = [1.0, 1.0];

        assert_relative_eq!(try_fit(&observed, &gaps, 1.0), 1.0);
        assert_relative_eq!(try_fit(&observed, &gaps, 2.0), 1.0);
        assert_relative_eq!(try_fit(&observed, &gaps, 3.0), 2.0);
        assert_relative_eq!(try_fit(&observed, &gaps, 4.0), 3.0);

        // two-year gap jumps two classes
        assert_relative_eq!(try_fit(&[Some(1.0), Some(3.0)], &[2.0], 1.0), 0.0);
        // growth stops at 4
        assert_relative_eq!(try_fit(&[Some(4.0), Some(4.0)], &[3.0], 3.0), 1.0);
    }

    #[test]
    fn test_tie_prefers_larger_start_class() {
        let engine = SizeReconciliationEngine::new();

        let (start, residuals) = engine.best_start(&[Some(1.0), None, Some(4.0)], &[1.0, 1.0]);
        assert_eq!(residuals, [1.0, 1.0, 2.0, 3.0]);
        assert_eq!(start, 2);

        // 2.5 is equally far from 2 and 3
        let (start, _) = engine.best_start(&[Some(2.5)], &[]);
        assert_eq!(start, 3);
    }

    #[test]
    fn test_strictly_better_smaller_class_wins() {
        let engine = SizeReconciliationEngine::new();
        let (start, _) = engine.best_start(&[Some(1.0), Some(2.0)], &[1.0]);
        assert_eq!(start, 1);
    }

    #[test]
    fn test_reconcile_overwrites_every_date_per_survey() {
        let series = three_year_series();
        let mut ledger = Ledger::new();
        ledger.add_sighting(d(2010, 1, 5), key("A"), SizeEstimate(1.0));
        ledger.add_sighting(d(2010, 1, 6), key("A"), SizeEstimate(2.0));
        ledger.add_sighting(d(2011, 1, 6), key("A"), SizeEstimate::UNSIZED);
        ledger.add_sighting(d(2012, 1, 5), key("A"), SizeEstimate(3.5));

        let report = SizeReconciliationEngine::new().reconcile(&series, &mut ledger);

        assert_eq!(report.reconciled_count(), 1);
        // observed [1.5, -, 3.5]: start 1 and start 2 both leave 1.0, larger wins
        assert_eq!(report.fits[0].start_class, 2);
        let sizes: Vec<f64> = ledger.get(&key("A")).unwrap().records.iter().map(|r| r.payload.value()).collect();
        assert_eq!(sizes, vec![2.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_reconciled_sizes_are_monotonic_and_capped() {
        let series = three_year_series();
        let mut ledger = Ledger::new();
        ledger.add_sighting(d(2010, 1, 5), key("big"), SizeEstimate(4.0));
        ledger.add_sighting(d(2011, 1, 5), key("big"), SizeEstimate(3.0));
        ledger.add_sighting(d(2012, 1, 6), key("big"), SizeEstimate(2.0));
        ledger.add_sighting(d(2010, 1, 6), key("small"), SizeEstimate(1.0));
        ledger.add_sighting(d(2012, 1, 5), key("small"), SizeEstimate(1.5));

        SizeReconciliationEngine::new().reconcile(&series, &mut ledger);

        for individual in ledger.individuals() {
            let per_survey = sizes_by_survey(&series, &ledger, &individual.key);
            let assigned: Vec<f64> = per_survey.into_iter().flatten().collect();
            assert!(assigned.windows(2).all(|w| w[0] <= w[1]), "{:?}", assigned);
            assert!(assigned.iter().all(|&s| (1.0..=4.0).contains(&s) && s.fract() == 0.0));
        }
    }

    #[test]
    fn test_first_sighting_skips_earlier_surveys() {
        let series = three_year_series();
        let mut ledger = Ledger::new();
        // unsized in 2010, first sized in 2011
        ledger.add_sighting(d(2010, 1, 5), key("A"), SizeEstimate::UNSIZED);
        ledger.add_sighting(d(2011, 1, 5), key("A"), SizeEstimate(3.0));
        ledger.add_sighting(d(2012, 1, 5), key("A"), SizeEstimate(4.0));

        let report = SizeReconciliationEngine::new().reconcile(&series, &mut ledger);

        assert_eq!(report.fits[0].first_sighting, 1);
        assert_eq!(report.fits[0].start_class, 3);
        let records = &ledger.get(&key("A")).unwrap().records;
        assert_eq!(records[0].payload, SizeEstimate::UNSIZED);
        assert_eq!(records[1].payload, SizeEstimate(3.0));
        assert_eq!(records[2].payload, SizeEstimate(4.0));
    }

    #[test]
    fn test_never_sized_animal_is_fully_grown_in_last_survey() {
        let series = three_year_series();
        let mut ledger = Ledger::new();
        ledger.add_sighting(d(2012, 1, 6), Identifier::AnonymousSingleton, SizeEstimate::UNSIZED);
        ledger.add_sighting(d(2011, 1, 5), key("A"), SizeEstimate::UNSIZED);
        ledger.add_sighting(d(2012, 1, 5), key("A"), SizeEstimate::UNSIZED);

        let report = SizeReconciliationEngine::new().reconcile(&series, &mut ledger);

        assert_eq!(report.reconciled_count(), 2);
        assert_eq!(report.never_sized, vec!["SINGLETON_SO_FAR".to_string(), "A".to_string()]);
        for fit in &report.fits {
            assert_eq!(fit.first_sighting, 2);
            assert_eq!(fit.start_class, 4);
            assert_eq!(fit.residuals, [0.0; 4]);
        }

        assert_eq!(ledger.individuals()[0].records[0].payload, SizeEstimate(4.0));
        // only the last survey is re-walked
        let records = &ledger.get(&key("A")).unwrap().records;
        assert_eq!(records[0].payload, SizeEstimate::UNSIZED);
        assert_eq!(records[1].payload, SizeEstimate(4.0));
    }

    #[test]
    fn test_observed_sizes_average_non_zero_only() {
        let series = three_year_series();
        let mut ledger = Ledger::new();
        ledger.add_sighting(d(2010, 1, 5), key("A"), SizeEstimate(2.0));
        ledger.add_sighting(d(2010, 1, 6), key("A"), SizeEstimate(3.0));
        ledger.add_sighting(d(2011, 1, 5), key("A"), SizeEstimate::UNSIZED);

        let observed = observed_sizes(&series, ledger.get(&key("A")).unwrap());
        assert_eq!(observed, vec![Some(2.5), None, None]);
    }
}
