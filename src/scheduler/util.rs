use crate::model::{Assignment, Event, EventId, PersonId};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

pub(super) fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Écart entre deux événements disjoints (zéro s'ils se chevauchent).
pub(super) fn gap_between(a: &Event, b: &Event) -> Duration {
    if a.end() <= b.start {
        b.start - a.end()
    } else if b.end() <= a.start {
        a.start - b.end()
    } else {
        Duration::zero()
    }
}

pub(super) fn find_assignment_index(
    assignments: &[Assignment],
    event_id: &EventId,
    person_id: &PersonId,
    role: &str,
) -> Option<usize> {
    assignments
        .iter()
        .position(|a| &a.event_id == event_id && &a.person_id == person_id && a.role == role)
}

pub(super) fn filled(assignments: &[Assignment], event_id: &EventId, role: &str) -> u32 {
    let n = assignments
        .iter()
        .filter(|a| &a.event_id == event_id && a.role == role)
        .count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Écart-type de population ; 0 pour zéro ou une valeur.
pub(crate) fn population_stdev<I: IntoIterator<Item = u32>>(values: I) -> f64 {
    let values: Vec<f64> = values.into_iter().map(f64::from).collect();
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

pub(crate) fn counts_by_person(assignments: &[Assignment]) -> BTreeMap<PersonId, u32> {
    let mut out = BTreeMap::new();
    for a in assignments {
        *out.entry(a.person_id.clone()).or_insert(0u32) += 1;
    }
    out
}
