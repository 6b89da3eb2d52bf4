use super::conflicts::finalize;
use super::engine::{evaluate, Candidate, EvalContext, Loads, Problem, Verdict};
use super::{resolver, util, SchedError, SolveOptions};
use crate::model::{Assignment, EventId, PersonId, SlotRef};
use crate::solution::{ConstraintViolation, Solution, ViolationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Édition élémentaire proposée par une surface interactive ou par le résolveur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Edit {
    Assign(Assignment),
    Unassign {
        event_id: EventId,
        person_id: PersonId,
        role: String,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EditValidation {
    pub is_valid: bool,
    pub violations: Vec<ConstraintViolation>,
    pub warnings: Vec<String>,
}

fn edit_violation(
    kind: ViolationKind,
    slot: &SlotRef,
    person: &PersonId,
    message: String,
) -> ConstraintViolation {
    let mut v = ConstraintViolation::hard("edit", kind, message).on_slot(slot);
    v.person_id = Some(person.clone());
    v
}

/// Applique les éditions sur une copie et juge le résultat ; l'entrée n'est jamais modifiée.
pub(super) fn validate_edits(
    problem: &Problem<'_>,
    assignments: &[Assignment],
    edits: &[Edit],
) -> Result<(EditValidation, Vec<Assignment>), SchedError> {
    let mut patched = assignments.to_vec();
    let mut added: Vec<Assignment> = Vec::new();
    let mut vacated: BTreeSet<SlotRef> = BTreeSet::new();
    let mut violations = Vec::new();
    let mut warnings = Vec::new();

    for edit in edits {
        match edit {
            Edit::Assign(a) => {
                let event = problem
                    .event(&a.event_id)
                    .ok_or_else(|| SchedError::UnknownEvent(a.event_id.as_str().to_string()))?;
                problem
                    .person(&a.person_id)
                    .ok_or_else(|| SchedError::UnknownPerson(a.person_id.as_str().to_string()))?;
                if event.required(&a.role) == 0 {
                    violations.push(edit_violation(
                        ViolationKind::InvalidEdit,
                        &a.slot(),
                        &a.person_id,
                        format!("role {} is not required by {}", a.role, a.event_id.as_str()),
                    ));
                    continue;
                }
                if patched.iter().any(|x| x.same_slot_holder(a)) {
                    violations.push(edit_violation(
                        ViolationKind::InvalidEdit,
                        &a.slot(),
                        &a.person_id,
                        format!(
                            "{} already holds {}/{}",
                            a.person_id.as_str(),
                            a.event_id.as_str(),
                            a.role
                        ),
                    ));
                    continue;
                }
                patched.push(a.clone());
                added.push(a.clone());
            }
            Edit::Unassign {
                event_id,
                person_id,
                role,
            } => {
                problem
                    .event(event_id)
                    .ok_or_else(|| SchedError::UnknownEvent(event_id.as_str().to_string()))?;
                problem
                    .person(person_id)
                    .ok_or_else(|| SchedError::UnknownPerson(person_id.as_str().to_string()))?;
                let slot = SlotRef {
                    event_id: event_id.clone(),
                    role: role.clone(),
                };
                match util::find_assignment_index(&patched, event_id, person_id, role) {
                    None => violations.push(edit_violation(
                        ViolationKind::InvalidEdit,
                        &slot,
                        person_id,
                        format!(
                            "{} does not hold {}/{}",
                            person_id.as_str(),
                            event_id.as_str(),
                            role
                        ),
                    )),
                    Some(i) if patched[i].locked => violations.push(edit_violation(
                        ViolationKind::Locked,
                        &slot,
                        person_id,
                        format!(
                            "locked assignment {}/{} of {} cannot be removed",
                            event_id.as_str(),
                            role,
                            person_id.as_str()
                        ),
                    )),
                    Some(i) => {
                        let removed = patched.remove(i);
                        added.retain(|a| !a.same_slot_holder(&removed));
                        vacated.insert(slot);
                    }
                }
            }
        }
    }

    let mut checked = BTreeSet::new();
    for a in &added {
        let slot = a.slot();
        if !checked.insert(slot.clone()) {
            continue;
        }
        let required = problem.event(&a.event_id).map_or(0, |e| e.required(&a.role));
        let filled = util::filled(&patched, &a.event_id, &a.role);
        if filled > required {
            violations.push(
                ConstraintViolation::hard(
                    "edit",
                    ViolationKind::Capacity,
                    format!(
                        "{}/{} would hold {} of {} required",
                        a.event_id.as_str(),
                        a.role,
                        filled,
                        required
                    ),
                )
                .on_slot(&slot),
            );
        }
    }

    let loads = Loads::from_assignments(&patched);
    for a in &added {
        let Some(idx) = util::find_assignment_index(&patched, &a.event_id, &a.person_id, &a.role)
        else {
            continue;
        };
        let (Some(person), Some(event)) = (problem.person(&a.person_id), problem.event(&a.event_id))
        else {
            continue;
        };
        let ctx = EvalContext::new(problem, &patched, &loads).skipping(idx);
        match evaluate(Candidate::new(person, event, &a.role), ctx) {
            Verdict::HardViolation {
                constraint_id,
                kind,
                reason,
            } => violations.push(ConstraintViolation::hard(constraint_id, kind, reason).on(a)),
            Verdict::SoftPenalty { reason, .. } => warnings.push(format!(
                "{}/{}: {}",
                a.event_id.as_str(),
                a.role,
                reason
            )),
            Verdict::Ok => {}
        }
    }

    for slot in &vacated {
        let required = problem.event(&slot.event_id).map_or(0, |e| e.required(&slot.role));
        let filled = util::filled(&patched, &slot.event_id, &slot.role);
        if filled < required {
            warnings.push(format!(
                "{}/{} now short by {}",
                slot.event_id.as_str(),
                slot.role,
                required - filled
            ));
        }
    }

    let validation = EditValidation {
        is_valid: violations.is_empty(),
        violations,
        warnings,
    };
    Ok((validation, patched))
}

pub(super) fn apply_edits(
    problem: &Problem<'_>,
    solution: &Solution,
    edits: &[Edit],
) -> Result<Solution, SchedError> {
    let (validation, patched) = validate_edits(problem, &solution.assignments, edits)?;
    if let Some(first) = validation.violations.first() {
        return Err(SchedError::EditRejected(first.message.clone()));
    }
    Ok(finalize(problem, patched, solution.incomplete))
}

/// Vrai si une des éditions retire une affectation verrouillée.
fn touches_locked(assignments: &[Assignment], edits: &[Edit]) -> bool {
    edits.iter().any(|edit| match edit {
        Edit::Unassign {
            event_id,
            person_id,
            role,
        } => util::find_assignment_index(assignments, event_id, person_id, role)
            .is_some_and(|i| assignments[i].locked),
        Edit::Assign(_) => false,
    })
}

/// Passe de réparation : comble les trous de couverture tant qu'un balayage progresse.
pub(super) fn repair(
    problem: &Problem<'_>,
    solution: &Solution,
    opts: SolveOptions,
) -> Result<Solution, SchedError> {
    let mut current = solution.clone();
    loop {
        let mut changed = false;
        let gaps: Vec<ConstraintViolation> = current
            .violations
            .iter()
            .filter(|v| v.kind == ViolationKind::CoverageGap)
            .cloned()
            .collect();

        for gap in &gaps {
            let still_open = current.unmet.iter().any(|u| {
                Some(&u.event_id) == gap.event_id.as_ref() && Some(&u.role) == gap.role.as_ref()
            });
            if !still_open {
                continue;
            }
            let suggestions = resolver::suggest(problem, &current.assignments, gap, opts);
            for s in suggestions
                .items
                .iter()
                .filter(|s| s.score > opts.repair_threshold)
                .filter(|s| !touches_locked(&current.assignments, &s.edits()))
            {
                let (validation, patched) =
                    validate_edits(problem, &current.assignments, &s.edits())?;
                if validation.is_valid {
                    crate::log_debug!(score = s.score, reasoning = %s.reasoning, "repair applied");
                    current = finalize(problem, patched, current.incomplete);
                    changed = true;
                    break;
                }
            }
        }

        if !changed {
            return Ok(current);
        }
    }
}
