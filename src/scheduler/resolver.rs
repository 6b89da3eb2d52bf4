//! Moteur de suggestions : propose des remèdes classés, ne modifie jamais rien.
//!
//! Utilisé par la passe de réparation du solveur et par la validation d'éditions
//! manuelles. Chaque appel travaille sur un instantané immuable des affectations.

use super::engine::{evaluate, Candidate, EvalContext, Loads, Problem};
use super::mutate::Edit;
use super::util;
use super::SolveOptions;
use crate::model::{Assignment, Event, EventId, Person, PersonId, SlotRef};
use crate::solution::{ConstraintViolation, ViolationKind};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum Action {
    /// `person` prend `role` sur `to_event`, en quittant éventuellement `from`
    /// (qui est alors repris par `backfill`).
    Reassign {
        person: PersonId,
        role: String,
        to_event: EventId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<SlotRef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backfill: Option<PersonId>,
    },
    /// Remplace `remove` par `add` sur un même créneau.
    Swap {
        event_id: EventId,
        role: String,
        remove: PersonId,
        add: PersonId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(flatten)]
    pub action: Action,
    pub score: f64,
    pub reasoning: String,
}

impl Suggestion {
    /// Traduction en éditions, appliquables via la validation d'éditions.
    pub fn edits(&self) -> Vec<Edit> {
        match &self.action {
            Action::Reassign {
                person,
                role,
                to_event,
                from,
                backfill,
            } => {
                let mut out = Vec::new();
                if let Some(slot) = from {
                    out.push(Edit::Unassign {
                        event_id: slot.event_id.clone(),
                        person_id: person.clone(),
                        role: slot.role.clone(),
                    });
                }
                out.push(Edit::Assign(Assignment::new(
                    to_event.clone(),
                    person.clone(),
                    role.clone(),
                )));
                if let (Some(slot), Some(q)) = (from, backfill) {
                    out.push(Edit::Assign(Assignment::new(
                        slot.event_id.clone(),
                        q.clone(),
                        slot.role.clone(),
                    )));
                }
                out
            }
            Action::Swap {
                event_id,
                role,
                remove,
                add,
            } => vec![
                Edit::Unassign {
                    event_id: event_id.clone(),
                    person_id: remove.clone(),
                    role: role.clone(),
                },
                Edit::Assign(Assignment::new(event_id.clone(), add.clone(), role.clone())),
            ],
        }
    }
}

/// Suggestions classées ; `incomplete` si le budget d'évaluations est épuisé.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    pub items: Vec<Suggestion>,
    pub incomplete: bool,
}

struct Search<'p, 'a> {
    problem: &'p Problem<'a>,
    left: usize,
    exhausted: bool,
}

impl<'p, 'a> Search<'p, 'a> {
    /// Vrai si le candidat n'enfreint aucune contrainte dure (consomme le budget).
    fn eligible(
        &mut self,
        person: &Person,
        event: &Event,
        role: &str,
        assignments: &[Assignment],
        loads: &Loads,
    ) -> bool {
        if self.left == 0 {
            self.exhausted = true;
            return false;
        }
        self.left -= 1;
        let ctx = EvalContext::new(self.problem, assignments, loads);
        !evaluate(Candidate::new(person, event, role), ctx).is_hard()
    }

    fn people_by_id(&self) -> Vec<&'a Person> {
        let mut people: Vec<&'a Person> = self.problem.workspace.people.iter().collect();
        people.sort_by(|a, b| a.id.cmp(&b.id));
        people
    }
}

pub(super) fn suggest(
    problem: &Problem<'_>,
    assignments: &[Assignment],
    violation: &ConstraintViolation,
    opts: SolveOptions,
) -> Suggestions {
    let mut search = Search {
        problem,
        left: opts.suggest_budget,
        exhausted: false,
    };

    let mut items = match violation.kind {
        ViolationKind::Availability => availability_moves(&mut search, assignments, violation),
        ViolationKind::Fairness => fairness_swaps(&mut search, assignments, violation, opts),
        ViolationKind::CoverageGap => coverage_candidates(&mut search, assignments, violation),
        ViolationKind::RoleQualification
        | ViolationKind::DoubleBooking
        | ViolationKind::CustomInterval => replacements(&mut search, assignments, violation),
        ViolationKind::Blackout
        | ViolationKind::ResourceExclusivity
        | ViolationKind::Capacity
        | ViolationKind::Locked
        | ViolationKind::InvalidEdit => Vec::new(),
    };

    items.sort_by(|a, b| b.score.total_cmp(&a.score));
    items.truncate(opts.max_suggestions);
    Suggestions {
        items,
        incomplete: search.exhausted,
    }
}

/// Affectations sans celle visée par la violation.
struct Vacated {
    trial: Vec<Assignment>,
    from: Option<SlotRef>,
    locked: bool,
}

impl Vacated {
    /// Mention ajoutée au raisonnement quand il faut d'abord déverrouiller.
    fn unlock_note(&self) -> String {
        match (&self.from, self.locked) {
            (Some(slot), true) => format!(
                " (locked: unlock {}/{} first)",
                slot.event_id.as_str(),
                slot.role
            ),
            _ => String::new(),
        }
    }
}

/// Retire l'affectation visée, verrouillée ou non : on ne fait que proposer.
fn without_target(
    assignments: &[Assignment],
    event_id: &EventId,
    person_id: &PersonId,
    role: &str,
) -> Vacated {
    let mut trial = assignments.to_vec();
    match util::find_assignment_index(assignments, event_id, person_id, role) {
        Some(i) => {
            let removed = trial.remove(i);
            Vacated {
                trial,
                from: Some(removed.slot()),
                locked: removed.locked,
            }
        }
        None => Vacated {
            trial,
            from: None,
            locked: false,
        },
    }
}

fn availability_moves(
    search: &mut Search<'_, '_>,
    assignments: &[Assignment],
    violation: &ConstraintViolation,
) -> Vec<Suggestion> {
    let Some((event_id, person_id, role)) = violation.assignment() else {
        return Vec::new();
    };
    let problem = search.problem;
    let (Some(person), Some(event)) = (problem.person(person_id), problem.event(event_id)) else {
        return Vec::new();
    };
    let vacated = without_target(assignments, event_id, person_id, role);
    let trial = &vacated.trial;
    let from = &vacated.from;
    let loads = Loads::from_assignments(trial);
    let window = Duration::days(1);

    let mut nearby: Vec<&Event> = problem
        .workspace
        .events
        .iter()
        .filter(|e| e.id != event.id && e.required(role) > 0)
        .filter(|e| (e.start - event.start).abs() <= window)
        .collect();
    // proximité d'abord ; à distance égale, même type d'événement puis id
    nearby.sort_by_key(|e| {
        (
            (e.start - event.start).abs(),
            e.event_type != event.event_type,
            e.id.clone(),
        )
    });

    let mut out = Vec::new();
    for target in nearby {
        if util::filled(trial, &target.id, role) >= target.required(role) {
            continue;
        }
        if !search.eligible(person, target, role, trial, &loads) {
            continue;
        }
        let delta = (target.start - event.start).abs();
        let score = 1.0 - delta.num_minutes() as f64 / window.num_minutes() as f64;
        let same_type = target.event_type == event.event_type;

        let backfill = from.as_ref().and_then(|_| {
            let mut moved = trial.clone();
            moved.push(Assignment::new(
                target.id.clone(),
                person.id.clone(),
                role.to_string(),
            ));
            let moved_loads = Loads::from_assignments(&moved);
            least_loaded_eligible(search, event, role, &moved, &moved_loads, Some(&person.id))
        });

        out.push(Suggestion {
            action: Action::Reassign {
                person: person.id.clone(),
                role: role.to_string(),
                to_event: target.id.clone(),
                from: from.clone(),
                backfill: backfill.clone(),
            },
            score,
            reasoning: format!(
                "{} is available for {} ({}h from {}{}){}{}",
                person.id.as_str(),
                target.id.as_str(),
                delta.num_hours(),
                event.id.as_str(),
                if same_type { ", same type" } else { "" },
                backfill
                    .map(|q| format!(", {} can take over {}", q.as_str(), event.id.as_str()))
                    .unwrap_or_default(),
                vacated.unlock_note()
            ),
        });
    }
    out
}

fn least_loaded_eligible(
    search: &mut Search<'_, '_>,
    event: &Event,
    role: &str,
    assignments: &[Assignment],
    loads: &Loads,
    exclude: Option<&PersonId>,
) -> Option<PersonId> {
    let mut best: Option<(u32, PersonId)> = None;
    for q in search.people_by_id() {
        if Some(&q.id) == exclude {
            continue;
        }
        let load = loads.count(&q.id);
        if best.as_ref().is_some_and(|(l, _)| *l <= load) {
            continue;
        }
        if search.eligible(q, event, role, assignments, loads) {
            best = Some((load, q.id.clone()));
        }
    }
    best.map(|(_, id)| id)
}

fn fairness_swaps(
    search: &mut Search<'_, '_>,
    assignments: &[Assignment],
    violation: &ConstraintViolation,
    opts: SolveOptions,
) -> Vec<Suggestion> {
    let Some(person_id) = violation.person_id.as_ref() else {
        return Vec::new();
    };
    let problem = search.problem;
    let loads = Loads::from_assignments(assignments);
    let mean = loads.mean(problem.people_count());
    let counts = util::counts_by_person(assignments);
    let before = util::population_stdev(counts.values().copied());

    let mut out = Vec::new();
    for (i, a) in assignments.iter().enumerate() {
        if &a.person_id != person_id || a.locked {
            continue;
        }
        let Some(event) = problem.event(&a.event_id) else {
            continue;
        };
        let mut trial = assignments.to_vec();
        trial.remove(i);
        let trial_loads = Loads::from_assignments(&trial);

        for q in search.people_by_id() {
            if &q.id == person_id {
                continue;
            }
            let load = loads.count(&q.id);
            if f64::from(load) > mean - opts.fairness_margin {
                continue;
            }
            if !search.eligible(q, event, &a.role, &trial, &trial_loads) {
                continue;
            }
            let after = stdev_after_move(&counts, person_id, &q.id);
            let improvement = before - after;
            if improvement <= EPSILON {
                continue;
            }
            out.push(Suggestion {
                action: Action::Swap {
                    event_id: a.event_id.clone(),
                    role: a.role.clone(),
                    remove: person_id.clone(),
                    add: q.id.clone(),
                },
                score: improvement,
                reasoning: format!(
                    "{} holds {} (mean {:.2}); {} holds {}; stdev {:.3} -> {:.3}",
                    person_id.as_str(),
                    loads.count(person_id),
                    mean,
                    q.id.as_str(),
                    load,
                    before,
                    after
                ),
            });
        }
    }
    out
}

fn stdev_after_move(counts: &BTreeMap<PersonId, u32>, from: &PersonId, to: &PersonId) -> f64 {
    let mut moved = counts.clone();
    if let Some(c) = moved.get_mut(from) {
        *c = c.saturating_sub(1);
    }
    *moved.entry(to.clone()).or_insert(0) += 1;
    util::population_stdev(moved.values().copied().filter(|c| *c > 0))
}

fn coverage_candidates(
    search: &mut Search<'_, '_>,
    assignments: &[Assignment],
    violation: &ConstraintViolation,
) -> Vec<Suggestion> {
    let (Some(event_id), Some(role)) = (violation.event_id.as_ref(), violation.role.as_deref())
    else {
        return Vec::new();
    };
    let problem = search.problem;
    let Some(event) = problem.event(event_id) else {
        return Vec::new();
    };
    let loads = Loads::from_assignments(assignments);
    let mut out = Vec::new();

    for q in search.people_by_id() {
        if !search.eligible(q, event, role, assignments, &loads) {
            continue;
        }
        let load = loads.count(&q.id);
        out.push(Suggestion {
            action: Action::Reassign {
                person: q.id.clone(),
                role: role.to_string(),
                to_event: event.id.clone(),
                from: None,
                backfill: None,
            },
            score: 0.5 + 0.5 / (1.0 + f64::from(load)),
            reasoning: format!(
                "{} is qualified and free for {}/{} (load {})",
                q.id.as_str(),
                event.id.as_str(),
                role,
                load
            ),
        });
    }

    out.extend(displacement_chains(search, assignments, event, role));
    out
}

/// Libère une personne bloquée uniquement par une affectation non verrouillée
/// qui chevauche l'événement, puis remplace cette affectation.
fn displacement_chains(
    search: &mut Search<'_, '_>,
    assignments: &[Assignment],
    event: &Event,
    role: &str,
) -> Vec<Suggestion> {
    let problem = search.problem;
    let mut out = Vec::new();

    for p in search.people_by_id() {
        if !p.qualifies_for(role) || p.is_unavailable(event.start, event.end()) {
            continue;
        }
        for (i, a) in assignments.iter().enumerate() {
            if a.person_id != p.id || a.locked {
                continue;
            }
            if a.event_id == event.id && a.role == role {
                continue;
            }
            let Some(blocking) = problem.event(&a.event_id) else {
                continue;
            };
            if !blocking.overlaps(event) {
                continue;
            }
            let mut trial = assignments.to_vec();
            let vacated = trial.remove(i);
            let trial_loads = Loads::from_assignments(&trial);
            if !search.eligible(p, event, role, &trial, &trial_loads) {
                continue;
            }
            trial.push(Assignment::new(event.id.clone(), p.id.clone(), role.to_string()));
            let moved_loads = Loads::from_assignments(&trial);
            let Some(backfill) = least_loaded_eligible(
                search,
                blocking,
                &vacated.role,
                &trial,
                &moved_loads,
                Some(&p.id),
            ) else {
                continue;
            };
            let backfill_load = moved_loads.count(&backfill);
            out.push(Suggestion {
                action: Action::Reassign {
                    person: p.id.clone(),
                    role: role.to_string(),
                    to_event: event.id.clone(),
                    from: Some(vacated.slot()),
                    backfill: Some(backfill.clone()),
                },
                score: 0.25 + 0.25 / (1.0 + f64::from(backfill_load)),
                reasoning: format!(
                    "move {} from {}/{} to {}/{}, {} covers {}/{}",
                    p.id.as_str(),
                    vacated.event_id.as_str(),
                    vacated.role,
                    event.id.as_str(),
                    role,
                    backfill.as_str(),
                    vacated.event_id.as_str(),
                    vacated.role
                ),
            });
        }
    }
    out
}

fn replacements(
    search: &mut Search<'_, '_>,
    assignments: &[Assignment],
    violation: &ConstraintViolation,
) -> Vec<Suggestion> {
    let Some((event_id, person_id, role)) = violation.assignment() else {
        return Vec::new();
    };
    let problem = search.problem;
    let Some(event) = problem.event(event_id) else {
        return Vec::new();
    };
    let vacated = without_target(assignments, event_id, person_id, role);
    if vacated.from.is_none() {
        return Vec::new();
    }
    let trial = &vacated.trial;
    let loads = Loads::from_assignments(trial);

    let mut out = Vec::new();
    for q in search.people_by_id() {
        if &q.id == person_id || !search.eligible(q, event, role, trial, &loads) {
            continue;
        }
        let load = loads.count(&q.id);
        out.push(Suggestion {
            action: Action::Swap {
                event_id: event_id.clone(),
                role: role.to_string(),
                remove: person_id.clone(),
                add: q.id.clone(),
            },
            score: 0.5 + 0.5 / (1.0 + f64::from(load)),
            reasoning: format!(
                "{} can replace {} on {}/{} (load {}){}",
                q.id.as_str(),
                person_id.as_str(),
                event_id.as_str(),
                role,
                load,
                vacated.unlock_note()
            ),
        });
    }
    out
}
