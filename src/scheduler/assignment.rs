use super::conflicts::finalize;
use super::engine::{evaluate, Candidate, EvalContext, Loads, Problem, Verdict};
use super::{mutate, util, LoadError, SchedError, SolveOptions, SolvePhase};
use crate::model::{Assignment, Event, PersonId};
use crate::solution::Solution;
use std::collections::BTreeSet;
use std::time::Instant;

/// Créneaux restant à pourvoir pour un (événement, rôle).
#[derive(Debug)]
struct WorkItem<'a> {
    event: &'a Event,
    role: &'a str,
    remaining: u32,
    eligible: usize,
}

struct Run {
    phase: SolvePhase,
}

impl Run {
    fn advance(&mut self, next: SolvePhase) {
        debug_assert!(next > self.phase, "solve phases only move forward");
        crate::log_debug!(from = ?self.phase, to = ?next, "solve phase");
        self.phase = next;
    }
}

pub(super) fn solve(
    problem: &Problem<'_>,
    input: &[Assignment],
    opts: SolveOptions,
) -> Result<Solution, SchedError> {
    let started = Instant::now();
    let mut run = Run {
        phase: SolvePhase::Loaded,
    };

    run.advance(SolvePhase::Seeding);
    let locked: Vec<Assignment> = input.iter().filter(|a| a.locked).cloned().collect();
    validate_locked(problem, &locked)?;
    let mut assignments = locked.clone();
    let mut loads = Loads::from_assignments(&assignments);

    run.advance(SolvePhase::Assigning);
    let worklist = build_worklist(problem, &assignments, &loads);
    let mut iterations = 0usize;
    let mut incomplete = false;

    'items: for item in &worklist {
        for _ in 0..item.remaining {
            if budget_exhausted(opts, iterations, started) {
                crate::log_warn!(iterations, "solve budget exhausted, returning partial solution");
                incomplete = true;
                break 'items;
            }
            iterations += 1;
            let Some(person_id) = pick(problem, &assignments, &loads, item) else {
                crate::log_debug!(
                    event = item.event.id.as_str(),
                    role = item.role,
                    "no eligible candidate"
                );
                break;
            };
            loads.add(&person_id);
            assignments.push(Assignment::new(
                item.event.id.clone(),
                person_id,
                item.role.to_string(),
            ));
        }
    }

    let greedy = finalize(problem, assignments, incomplete);

    run.advance(SolvePhase::Repairing);
    // Budget épuisé : pas de réparation, la solution partielle est rendue telle quelle.
    let repaired = if greedy.incomplete {
        greedy
    } else {
        mutate::repair(problem, &greedy, opts)?
    };

    run.advance(SolvePhase::Finalized);
    check_invariants(problem, &locked, &repaired)?;
    Ok(repaired)
}

fn budget_exhausted(opts: SolveOptions, iterations: usize, started: Instant) -> bool {
    opts.max_iterations.is_some_and(|max| iterations >= max)
        || opts
            .time_budget
            .is_some_and(|budget| started.elapsed() >= budget)
}

/// Ordre « le plus contraint d'abord » : nombre de candidats éligibles croissant.
fn build_worklist<'a>(
    problem: &Problem<'a>,
    assignments: &[Assignment],
    loads: &Loads,
) -> Vec<WorkItem<'a>> {
    let workspace = problem.workspace;
    let ctx = EvalContext::new(problem, assignments, loads);
    let mut items = Vec::new();
    for event in &workspace.events {
        for req in &event.requirements {
            let filled = util::filled(assignments, &event.id, &req.role);
            if filled >= req.count {
                continue;
            }
            let eligible = workspace
                .people
                .iter()
                .filter(|p| !evaluate(Candidate::new(p, event, &req.role), ctx).is_hard())
                .count();
            items.push(WorkItem {
                event,
                role: req.role.as_str(),
                remaining: req.count - filled,
                eligible,
            });
        }
    }
    items.sort_by(|a, b| {
        a.eligible
            .cmp(&b.eligible)
            .then(a.event.start.cmp(&b.event.start))
            .then(a.event.id.cmp(&b.event.id))
            .then(a.role.cmp(b.role))
    });
    items
}

/// Choix : charge croissante, puis pénalité souple, puis identifiant.
fn pick(
    problem: &Problem<'_>,
    assignments: &[Assignment],
    loads: &Loads,
    item: &WorkItem<'_>,
) -> Option<PersonId> {
    let ctx = EvalContext::new(problem, assignments, loads);
    problem
        .workspace
        .people
        .iter()
        .filter_map(|p| match evaluate(Candidate::new(p, item.event, item.role), ctx) {
            Verdict::HardViolation { .. } => None,
            verdict => Some((loads.count(&p.id), verdict.penalty(), &p.id)),
        })
        .min_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.total_cmp(&b.1))
                .then(a.2.cmp(b.2))
        })
        .map(|(_, _, id)| id.clone())
}

pub(super) fn validate_locked(
    problem: &Problem<'_>,
    locked: &[Assignment],
) -> Result<(), LoadError> {
    let mut seen = BTreeSet::new();
    for a in locked {
        let event = problem
            .event(&a.event_id)
            .ok_or_else(|| LoadError::LockedUnknownEvent(a.event_id.as_str().to_string()))?;
        problem
            .person(&a.person_id)
            .ok_or_else(|| LoadError::LockedUnknownPerson(a.person_id.as_str().to_string()))?;
        let required = event.required(&a.role);
        if required == 0 {
            return Err(LoadError::LockedRoleNotRequired {
                event: a.event_id.as_str().to_string(),
                role: a.role.clone(),
            });
        }
        if !seen.insert((&a.event_id, &a.person_id, a.role.as_str())) {
            return Err(LoadError::LockedDuplicate {
                event: a.event_id.as_str().to_string(),
                person: a.person_id.as_str().to_string(),
                role: a.role.clone(),
            });
        }
        if util::filled(locked, &a.event_id, &a.role) > required {
            return Err(LoadError::LockedOverCapacity {
                event: a.event_id.as_str().to_string(),
                role: a.role.clone(),
            });
        }
    }
    Ok(())
}

/// Une violation ici est un défaut du solveur, jamais une situation normale.
fn check_invariants(
    problem: &Problem<'_>,
    locked: &[Assignment],
    solution: &Solution,
) -> Result<(), SchedError> {
    if let Some(lost) = locked.iter().find(|a| !solution.assignments.contains(a)) {
        return Err(SchedError::InvariantBreach(format!(
            "locked assignment {}/{} of {} missing from output",
            lost.event_id.as_str(),
            lost.role,
            lost.person_id.as_str()
        )));
    }
    for event in &problem.workspace.events {
        for req in &event.requirements {
            let filled = util::filled(&solution.assignments, &event.id, &req.role);
            if filled > req.count {
                return Err(SchedError::InvariantBreach(format!(
                    "{}/{} holds {} of {} required",
                    event.id.as_str(),
                    req.role,
                    filled,
                    req.count
                )));
            }
        }
    }
    Ok(())
}
