use super::engine::{evaluate, hits, Candidate, EvalContext, Loads, Problem, Verdict};
use super::util;
use crate::metrics::compute_metrics;
use crate::model::{Assignment, Event, Severity};
use crate::solution::{ConstraintViolation, Solution, UnmetRequirement, ViolationKind};
use std::collections::BTreeMap;

pub const COVERAGE_CONSTRAINT_ID: &str = "coverage";

/// Audite chaque affectation contre toutes les autres (contraintes dures et souples).
pub(super) fn detect_conflicts(
    problem: &Problem<'_>,
    assignments: &[Assignment],
) -> Vec<ConstraintViolation> {
    let loads = Loads::from_assignments(assignments);
    let mut out = Vec::new();

    for (idx, a) in assignments.iter().enumerate() {
        let (Some(person), Some(event)) = (problem.person(&a.person_id), problem.event(&a.event_id))
        else {
            continue;
        };
        let ctx = EvalContext::new(problem, assignments, &loads).skipping(idx);
        for hit in hits(Candidate::new(person, event, &a.role), ctx) {
            let violation = match hit.severity {
                Severity::Hard => ConstraintViolation::hard(hit.constraint_id, hit.kind, hit.reason),
                Severity::Soft => {
                    ConstraintViolation::soft(hit.constraint_id, hit.kind, hit.score, hit.reason)
                }
            };
            out.push(violation.on(a));
        }
    }

    out
}

/// Besoins non couverts, chacun accompagné d'une violation dure `coverage-gap`.
pub(super) fn coverage_gaps(
    problem: &Problem<'_>,
    assignments: &[Assignment],
    incomplete: bool,
) -> (Vec<UnmetRequirement>, Vec<ConstraintViolation>) {
    let loads = Loads::from_assignments(assignments);
    let mut unmet = Vec::new();
    let mut violations = Vec::new();

    for event in &problem.workspace.events {
        for req in &event.requirements {
            let filled = util::filled(assignments, &event.id, &req.role);
            if filled >= req.count {
                continue;
            }
            let shortfall = req.count - filled;
            let ctx = EvalContext::new(problem, assignments, &loads);
            let message = diagnose_gap(ctx, event, &req.role, shortfall, incomplete);
            let gap = UnmetRequirement {
                event_id: event.id.clone(),
                role: req.role.clone(),
                shortfall,
            };
            violations.push(
                ConstraintViolation::hard(COVERAGE_CONSTRAINT_ID, ViolationKind::CoverageGap, message)
                    .on_slot(&gap.slot()),
            );
            unmet.push(gap);
        }
    }

    (unmet, violations)
}

fn diagnose_gap(
    ctx: EvalContext<'_, '_>,
    event: &Event,
    role: &str,
    shortfall: u32,
    incomplete: bool,
) -> String {
    let people = &ctx.problem.workspace.people;
    let mut eligible = 0usize;
    let mut blockers: BTreeMap<ViolationKind, (usize, String)> = BTreeMap::new();

    for person in people {
        match evaluate(Candidate::new(person, event, role), ctx) {
            Verdict::HardViolation { kind, reason, .. } => {
                let entry = blockers.entry(kind).or_insert((0, reason));
                entry.0 += 1;
            }
            _ => eligible += 1,
        }
    }

    let slot = format!("{}/{}", event.id.as_str(), role);
    if eligible > 0 {
        return if incomplete {
            format!("{slot}: {shortfall} slot(s) not attempted, solve budget exhausted")
        } else {
            format!("{slot}: {shortfall} open slot(s), {eligible} eligible candidate(s)")
        };
    }
    if people.is_empty() {
        return format!("{slot}: short by {shortfall}, no people in workspace");
    }
    // Bloqueur dominant : le plus fréquent, puis l'ordre des variantes.
    let dominant = blockers
        .iter()
        .max_by(|(ka, (na, _)), (kb, (nb, _))| na.cmp(nb).then(kb.cmp(ka)));
    match dominant {
        Some((kind, (count, reason))) => format!(
            "{slot}: short by {shortfall}, no eligible candidate; main blocker {} ({}/{}): {}",
            kind.as_str(),
            count,
            people.len(),
            reason
        ),
        None => format!("{slot}: short by {shortfall}, no eligible candidate"),
    }
}

/// Seul point de dérivation des besoins non couverts, violations et métriques.
pub(super) fn finalize(
    problem: &Problem<'_>,
    assignments: Vec<Assignment>,
    incomplete: bool,
) -> Solution {
    let (unmet, mut violations) = coverage_gaps(problem, &assignments, incomplete);
    violations.extend(detect_conflicts(problem, &assignments));
    let metrics = compute_metrics(
        &assignments,
        &violations,
        problem.workspace.organization.fairness_threshold,
    );
    Solution {
        assignments,
        unmet,
        violations,
        metrics,
        incomplete,
    }
}
