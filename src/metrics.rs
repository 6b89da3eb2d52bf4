//! Indicateurs de qualité d'une solution.
//!
//! | Indicateur | Définition |
//! |---|---|
//! | `per_person_counts` | nombre d'affectations (verrouillées ou non) par personne |
//! | `stdev` | écart-type de population de ces comptes |
//! | `hard_violations` | violations dures présentes dans la solution |
//! | `soft_penalty_sum` | somme des pénalités souples |
//! | `health_score` | 0–100 |
//!
//! Le score de santé n'est défini qu'à ses extrémités : aucune violation dure et
//! dispersion sous le seuil → 100, au moins une violation dure → 0. Entre les deux
//! (dispersion au-dessus du seuil sans violation dure) on renvoie 50 avec
//! `health_provisional = true`.

use crate::model::{Assignment, PersonId};
use crate::scheduler::util::{counts_by_person, population_stdev};
use crate::solution::ConstraintViolation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const HEALTH_MAX: u8 = 100;
pub const HEALTH_PROVISIONAL: u8 = 50;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fairness {
    pub stdev: f64,
    pub per_person_counts: BTreeMap<PersonId, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub health_score: u8,
    #[serde(default)]
    pub health_provisional: bool,
    pub hard_violations: usize,
    #[serde(default)]
    pub soft_penalty_sum: f64,
    pub fairness: Fairness,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            health_score: HEALTH_MAX,
            health_provisional: false,
            hard_violations: 0,
            soft_penalty_sum: 0.0,
            fairness: Fairness::default(),
        }
    }
}

/// Calcule les indicateurs à partir des seules affectations et violations de la solution.
pub fn compute_metrics(
    assignments: &[Assignment],
    violations: &[ConstraintViolation],
    fairness_threshold: f64,
) -> Metrics {
    let per_person_counts = counts_by_person(assignments);
    let stdev = population_stdev(per_person_counts.values().copied());
    let hard_violations = violations.iter().filter(|v| v.is_hard()).count();
    let soft_penalty_sum = violations
        .iter()
        .filter(|v| !v.is_hard())
        .map(|v| v.penalty)
        .sum();
    let (health_score, health_provisional) = health(hard_violations, stdev, fairness_threshold);

    Metrics {
        health_score,
        health_provisional,
        hard_violations,
        soft_penalty_sum,
        fairness: Fairness {
            stdev,
            per_person_counts,
        },
    }
}

fn health(hard_violations: usize, stdev: f64, threshold: f64) -> (u8, bool) {
    if hard_violations > 0 {
        (0, false)
    } else if stdev <= threshold {
        (HEALTH_MAX, false)
    } else {
        (HEALTH_PROVISIONAL, true)
    }
}

impl Metrics {
    pub fn count_for(&self, person: &PersonId) -> u32 {
        self.fairness
            .per_person_counts
            .get(person)
            .copied()
            .unwrap_or(0)
    }
}
