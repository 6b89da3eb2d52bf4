mod assignment;
mod conflicts;
mod engine;
mod mutate;
mod resolver;
mod types;
pub(crate) mod util;

pub use conflicts::COVERAGE_CONSTRAINT_ID;
pub use engine::{
    evaluate, hits, Candidate, EvalContext, Hit, Loads, Problem, Verdict, SOFT_RULE_PENALTY,
};
pub use mutate::{Edit, EditValidation};
pub use resolver::{Action, Suggestion, Suggestions};
pub use types::{LoadError, SchedError, SolveOptions, SolvePhase};

use crate::model::{Assignment, EventId, PersonId, Workspace};
use crate::solution::{ConstraintViolation, Solution};

/// Solveur : encapsule un workspace validé et les options de résolution.
///
/// Toutes les opérations sont pures vis-à-vis de leurs entrées : une `Solution`
/// n'est jamais modifiée en place.
#[derive(Debug, Clone)]
pub struct Solver<'a> {
    problem: Problem<'a>,
    opts: SolveOptions,
}

impl<'a> Solver<'a> {
    /// Valide le workspace ; aucune résolution n'est tentée sur un workspace incohérent.
    pub fn new(workspace: &'a Workspace, opts: SolveOptions) -> Result<Self, LoadError> {
        Ok(Self {
            problem: Problem::new(workspace)?,
            opts,
        })
    }

    pub fn problem(&self) -> &Problem<'a> {
        &self.problem
    }

    pub fn options(&self) -> SolveOptions {
        self.opts
    }

    /// Résolution gloutonne puis réparation. Seules les affectations `locked` de
    /// l'entrée sont conservées ; les autres sont recalculées.
    pub fn solve(&self, locked: &[Assignment]) -> Result<Solution, SchedError> {
        assignment::solve(&self.problem, locked, self.opts)
    }

    /// Passe de réparation seule, sur une solution existante.
    pub fn repair(&self, solution: &Solution) -> Result<Solution, SchedError> {
        assignment::validate_locked(&self.problem, &locked_of(solution))?;
        mutate::repair(&self.problem, solution, self.opts)
    }

    /// Évalue un candidat contre des affectations données.
    pub fn evaluate(
        &self,
        person_id: &PersonId,
        event_id: &EventId,
        role: &str,
        assignments: &[Assignment],
    ) -> Result<Verdict, SchedError> {
        let person = self
            .problem
            .person(person_id)
            .ok_or_else(|| SchedError::UnknownPerson(person_id.as_str().to_string()))?;
        let event = self
            .problem
            .event(event_id)
            .ok_or_else(|| SchedError::UnknownEvent(event_id.as_str().to_string()))?;
        let loads = Loads::from_assignments(assignments);
        let ctx = EvalContext::new(&self.problem, assignments, &loads);
        Ok(evaluate(Candidate::new(person, event, role), ctx))
    }

    pub fn validate(
        &self,
        solution: &Solution,
        edits: &[Edit],
    ) -> Result<EditValidation, SchedError> {
        mutate::validate_edits(&self.problem, &solution.assignments, edits).map(|(v, _)| v)
    }

    /// Applique des éditions ; refusées en bloc à la première violation dure.
    pub fn apply(&self, solution: &Solution, edits: &[Edit]) -> Result<Solution, SchedError> {
        mutate::apply_edits(&self.problem, solution, edits)
    }

    pub fn suggest(&self, solution: &Solution, violation: &ConstraintViolation) -> Suggestions {
        resolver::suggest(&self.problem, &solution.assignments, violation, self.opts)
    }

    /// Copie de la solution dont chaque violation porte sa meilleure suggestion.
    pub fn with_suggestions(&self, solution: &Solution) -> Solution {
        let mut out = solution.clone();
        for v in &mut out.violations {
            v.suggestion = self.suggest(solution, v).items.into_iter().next();
        }
        out
    }

    /// Recalcule besoins non couverts, violations et métriques d'une liste d'affectations.
    pub fn finalize(&self, assignments: Vec<Assignment>) -> Solution {
        conflicts::finalize(&self.problem, assignments, false)
    }
}

fn locked_of(solution: &Solution) -> Vec<Assignment> {
    solution.locked().cloned().collect()
}
