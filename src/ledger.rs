// 🦎 Sighting Ledger - per-animal history of (date, payload) records
// Identity is a tagged variant, never a magic string:
// - Concrete ids merge across dates, same-day repeats use the payload merge policy
// - Anonymous singletons are one animal, one date, forever
// - Unmatched (never compared) animals are kept one entry per sighting, with a warning

use crate::survey::{SurveyDate, SurveySeries};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Raw store value for an animal matching has not been checked for
pub const NEVER_COMPARED: &str = "NEVER_COMPARED";

/// Raw store value for an animal seen exactly once so far
pub const SINGLETON_SO_FAR: &str = "SINGLETON_SO_FAR";

// ============================================================================
// IDENTIFIER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// A matched individual id
    Concrete(String),

    /// Seen once, never merged with anything
    AnonymousSingleton,

    /// Matching incomplete for this animal; every sighting stands alone
    UnmatchedPending,
}

impl Identifier {
    /// Decode the individual id column of a capture record
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some(SINGLETON_SO_FAR) => Identifier::AnonymousSingleton,
            Some(NEVER_COMPARED) => Identifier::UnmatchedPending,
            Some(id) => Identifier::Concrete(id.to_string()),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identifier::AnonymousSingleton)
    }

    /// Whether sightings under this identifier merge into one animal
    pub fn is_mergeable(&self) -> bool {
        matches!(self, Identifier::Concrete(_))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Concrete(id) => f.write_str(id),
            Identifier::AnonymousSingleton => f.write_str(SINGLETON_SO_FAR),
            Identifier::UnmatchedPending => f.write_str(NEVER_COMPARED),
        }
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// What a sighting carries, and how two sightings on one day combine
pub trait SightingPayload: Clone + fmt::Debug {
    /// Fold a later same-day sighting into this one
    fn merge_same_day(&mut self, later: Self);
}

/// Capture record ids for one animal on one day (harvesting pipeline)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhotoTags(pub Vec<String>);

impl PhotoTags {
    pub fn single(tag: impl Into<String>) -> Self {
        PhotoTags(vec![tag.into()])
    }

    pub fn tags(&self) -> &[String] {
        &self.0
    }
}

impl SightingPayload for PhotoTags {
    /// Every tag is kept so every photo can be collected
    fn merge_same_day(&mut self, later: Self) {
        self.0.extend(later.0);
    }
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SightingRecord<P> {
    pub date: SurveyDate,
    pub payload: P,
}

/// One animal and its sightings, at most one record per date
#[derive(Debug, Clone)]
pub struct Individual<P> {
    pub key: Identifier,
    pub records: Vec<SightingRecord<P>>,
}

impl<P> Individual<P> {
    fn new(key: Identifier, date: SurveyDate, payload: P) -> Self {
        Individual {
            key,
            records: vec![SightingRecord { date, payload }],
        }
    }

    pub fn record_on(&self, date: &SurveyDate) -> Option<&SightingRecord<P>> {
        self.records.iter().find(|r| r.date == *date)
    }

    pub fn record_on_mut(&mut self, date: &SurveyDate) -> Option<&mut SightingRecord<P>> {
        self.records.iter_mut().find(|r| r.date == *date)
    }

    pub fn seen_on(&self, date: &SurveyDate) -> bool {
        self.record_on(date).is_some()
    }
}

// ============================================================================
// LEDGER
// ============================================================================

/// Ledger - every animal seen in a survey series, in order of first appearance
#[derive(Debug, Clone)]
pub struct Ledger<P> {
    individuals: Vec<Individual<P>>,
    /// Position of each mergeable identifier in `individuals`
    index: HashMap<Identifier, usize>,
}

impl<P: SightingPayload> Ledger<P> {
    pub fn new() -> Self {
        Ledger {
            individuals: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Record a sighting of `key` on `date`
    pub fn add_sighting(&mut self, date: SurveyDate, key: Identifier, payload: P) {
        if key == Identifier::UnmatchedPending {
            warn!(%date, "adding {} animal as newly seen, matching has not been checked", NEVER_COMPARED);
        }
        if key.is_mergeable() {
            self.merge_keyed(date, key, payload);
        } else {
            self.individuals.push(Individual::new(key, date, payload));
        }
    }

    fn merge_keyed(&mut self, date: SurveyDate, key: Identifier, payload: P) {
        match self.index.get(&key).copied() {
            Some(i) => {
                let individual = &mut self.individuals[i];
                match individual.record_on_mut(&date) {
                    Some(record) => record.payload.merge_same_day(payload),
                    None => individual.records.push(SightingRecord { date, payload }),
                }
            }
            None => {
                self.index.insert(key.clone(), self.individuals.len());
                self.individuals.push(Individual::new(key, date, payload));
            }
        }
    }

    pub fn individuals(&self) -> &[Individual<P>] {
        &self.individuals
    }

    pub fn individuals_mut(&mut self) -> &mut [Individual<P>] {
        &mut self.individuals
    }

    pub fn get(&self, key: &Identifier) -> Option<&Individual<P>> {
        self.index.get(key).map(|&i| &self.individuals[i])
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Total number of (animal, date) records
    pub fn record_count(&self) -> usize {
        self.individuals.iter().map(|i| i.records.len()).sum()
    }

    pub fn dump_individuals(&self, series: &SurveySeries) {
        for individual in &self.individuals {
            let dates: Vec<_> = individual.records.iter().map(|r| r.date).collect();
            let payloads: Vec<_> = individual.records.iter().map(|r| &r.payload).collect();
            debug!(
                site = series.site(),
                individual = %individual.key,
                ?dates,
                ?payloads,
                "ledger entry"
            );
        }
    }
}

impl<P: SightingPayload> Default for Ledger<P> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
