use std::collections::BTreeMap;

use crate::model::{ObservationCriteria, ObservationRecord, TemporalPredicate, TimeInterval};

/// Read access to stored observation results.
pub trait ObservationStore: Send + Sync {
    fn get_result(&self, id: &str) -> Option<&ObservationRecord>;

    /// Ids of the results matching every facet of `criteria`, in ascending order.
    fn filter_result_ids(&self, criteria: &ObservationCriteria) -> Vec<String>;
}

/// Whether a result's sampling interval can hold rows for `predicate`.
pub fn interval_matches(sampling: &TimeInterval, predicate: &TemporalPredicate) -> bool {
    match *predicate {
        TemporalPredicate::Equals(e) => sampling.contains(e),
        TemporalPredicate::Before(b) => sampling.begins_before(b),
        TemporalPredicate::After(a) => sampling.ends_after(a),
        TemporalPredicate::During { begin, end } => {
            sampling.begins_before(end) && sampling.ends_after(begin)
        }
    }
}

fn facet_matches(allowed: &[String], value: Option<&String>) -> bool {
    allowed.is_empty() || value.map_or(false, |v| allowed.contains(v))
}

pub fn record_matches(record: &ObservationRecord, criteria: &ObservationCriteria) -> bool {
    facet_matches(&criteria.procedures, record.procedure.as_ref())
        && facet_matches(&criteria.observed_properties, record.observed_property.as_ref())
        && facet_matches(
            &criteria.features_of_interest,
            record.feature_of_interest.as_ref(),
        )
        && criteria
            .event_time
            .iter()
            .all(|predicate| interval_matches(&record.sampling_time, predicate))
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, ObservationRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, returning the one it replaced under the same id.
    pub fn insert(&mut self, record: ObservationRecord) -> Option<ObservationRecord> {
        self.records.insert(record.id.clone(), record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ObservationRecord> {
        self.records.values()
    }
}

impl Extend<ObservationRecord> for MemoryStore {
    fn extend<I: IntoIterator<Item = ObservationRecord>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl FromIterator<ObservationRecord> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = ObservationRecord>>(iter: I) -> Self {
        let mut store = MemoryStore::new();
        store.extend(iter);
        store
    }
}

impl ObservationStore for MemoryStore {
    fn get_result(&self, id: &str) -> Option<&ObservationRecord> {
        self.records.get(id)
    }

    fn filter_result_ids(&self, criteria: &ObservationCriteria) -> Vec<String> {
        self.records
            .values()
            .filter(|record| record_matches(record, criteria))
            .map(|record| record.id.clone())
            .collect()
    }
}
