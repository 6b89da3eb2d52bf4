use super::util;
use super::LoadError;
use crate::model::{
    Assignment, Constraint, ConstraintKind, Event, EventId, Person, PersonId, Scope, Severity,
    Workspace, WorkspaceIndex,
};
use crate::solution::ViolationKind;
use std::collections::BTreeMap;

/// Pénalité d'une règle normalement dure déclarée `soft`, avant pondération.
pub const SOFT_RULE_PENALTY: f64 = 10.0;
const EPSILON: f64 = 1e-9;

/// Instantané immuable d'un workspace validé, partagé par toutes les évaluations.
#[derive(Debug, Clone)]
pub struct Problem<'a> {
    pub workspace: &'a Workspace,
    pub index: WorkspaceIndex,
    pub constraints: Vec<Constraint>,
}

impl<'a> Problem<'a> {
    pub fn new(workspace: &'a Workspace) -> Result<Self, LoadError> {
        workspace.validate()?;
        Ok(Self {
            workspace,
            index: workspace.index(),
            constraints: Constraint::resolve(&workspace.constraints),
        })
    }

    pub fn person(&self, id: &PersonId) -> Option<&'a Person> {
        self.index.person(self.workspace, id)
    }

    pub fn event(&self, id: &EventId) -> Option<&'a Event> {
        self.index.event(self.workspace, id)
    }

    pub fn people_count(&self) -> usize {
        self.workspace.people.len()
    }
}

/// Charges par personne, dérivées uniquement d'une liste d'affectations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Loads {
    per_person: BTreeMap<PersonId, u32>,
    total: usize,
}

impl Loads {
    pub fn from_assignments(assignments: &[Assignment]) -> Self {
        Self {
            per_person: util::counts_by_person(assignments),
            total: assignments.len(),
        }
    }

    pub fn count(&self, person: &PersonId) -> u32 {
        self.per_person.get(person).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn mean(&self, people: usize) -> f64 {
        if people == 0 {
            0.0
        } else {
            self.total as f64 / people as f64
        }
    }

    pub(super) fn add(&mut self, person: &PersonId) {
        *self.per_person.entry(person.clone()).or_insert(0) += 1;
        self.total += 1;
    }
}

/// Contexte d'évaluation : problème, affectations en cours et charges associées.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'p, 'a> {
    pub problem: &'p Problem<'a>,
    pub assignments: &'p [Assignment],
    pub loads: &'p Loads,
    /// Affectation ignorée (audit d'une affectation existante contre les autres).
    pub skip: Option<usize>,
}

impl<'p, 'a> EvalContext<'p, 'a> {
    pub fn new(problem: &'p Problem<'a>, assignments: &'p [Assignment], loads: &'p Loads) -> Self {
        Self {
            problem,
            assignments,
            loads,
            skip: None,
        }
    }

    pub fn skipping(mut self, index: usize) -> Self {
        self.skip = Some(index);
        self
    }

    fn others(&self) -> impl Iterator<Item = &'p Assignment> + '_ {
        let skip = self.skip;
        self.assignments
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != skip)
            .map(|(_, a)| a)
    }

    fn skipped(&self) -> Option<&'p Assignment> {
        self.skip.and_then(|i| self.assignments.get(i))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Candidate<'c> {
    pub person: &'c Person,
    pub event: &'c Event,
    pub role: &'c str,
}

impl<'c> Candidate<'c> {
    pub fn new(person: &'c Person, event: &'c Event, role: &'c str) -> Self {
        Self {
            person,
            event,
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Ok,
    HardViolation {
        constraint_id: String,
        kind: ViolationKind,
        reason: String,
    },
    SoftPenalty {
        score: f64,
        reason: String,
    },
}

impl Verdict {
    pub fn is_hard(&self) -> bool {
        matches!(self, Verdict::HardViolation { .. })
    }

    pub fn penalty(&self) -> f64 {
        match self {
            Verdict::SoftPenalty { score, .. } => *score,
            _ => 0.0,
        }
    }
}

/// Résultat d'une contrainte individuelle.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub constraint_id: String,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub score: f64,
    pub reason: String,
}

pub fn violation_kind(kind: &ConstraintKind) -> ViolationKind {
    match kind {
        ConstraintKind::Availability => ViolationKind::Availability,
        ConstraintKind::RoleQualification => ViolationKind::RoleQualification,
        ConstraintKind::DoubleBooking => ViolationKind::DoubleBooking,
        ConstraintKind::ResourceExclusivity => ViolationKind::ResourceExclusivity,
        ConstraintKind::Blackout => ViolationKind::Blackout,
        ConstraintKind::FairnessThreshold { .. } => ViolationKind::Fairness,
        ConstraintKind::CustomInterval { .. } => ViolationKind::CustomInterval,
    }
}

/// Évalue un candidat. Fonction pure du candidat et du contexte.
pub fn evaluate(candidate: Candidate<'_>, ctx: EvalContext<'_, '_>) -> Verdict {
    let mut score = 0.0;
    let mut reasons = Vec::new();
    for c in &ctx.problem.constraints {
        let Some(hit) = check(c, candidate, ctx) else {
            continue;
        };
        match hit.severity {
            Severity::Hard => {
                return Verdict::HardViolation {
                    constraint_id: hit.constraint_id,
                    kind: hit.kind,
                    reason: hit.reason,
                }
            }
            Severity::Soft => {
                score += hit.score;
                reasons.push(hit.reason);
            }
        }
    }
    if score > EPSILON {
        Verdict::SoftPenalty {
            score,
            reason: reasons.join("; "),
        }
    } else {
        Verdict::Ok
    }
}

/// Toutes les contraintes touchées, dures comme souples, dans l'ordre du jeu résolu.
pub fn hits(candidate: Candidate<'_>, ctx: EvalContext<'_, '_>) -> Vec<Hit> {
    ctx.problem
        .constraints
        .iter()
        .filter_map(|c| check(c, candidate, ctx))
        .collect()
}

fn applies(c: &Constraint, cand: Candidate<'_>, ctx: EvalContext<'_, '_>) -> bool {
    match &c.scope {
        Scope::Global => true,
        Scope::Person(id) => &cand.person.id == id,
        Scope::Team(team) => ctx.problem.index.is_member(team, &cand.person.id),
        Scope::Resource(res) => cand.event.resource.as_deref() == Some(res.as_str()),
    }
}

fn check(c: &Constraint, cand: Candidate<'_>, ctx: EvalContext<'_, '_>) -> Option<Hit> {
    if !applies(c, cand, ctx) {
        return None;
    }
    let person = cand.person;
    let event = cand.event;

    let reason = match &c.kind {
        ConstraintKind::Availability => person
            .is_unavailable(event.start, event.end())
            .then(|| {
                format!(
                    "{} is unavailable during {}",
                    person.id.as_str(),
                    event.id.as_str()
                )
            }),
        ConstraintKind::RoleQualification => (!person.qualifies_for(cand.role)).then(|| {
            format!(
                "{} is not qualified for role {}",
                person.id.as_str(),
                cand.role
            )
        }),
        ConstraintKind::DoubleBooking => double_booking(cand, ctx),
        ConstraintKind::ResourceExclusivity => resource_clash(cand, ctx),
        ConstraintKind::Blackout => ctx
            .problem
            .workspace
            .holidays
            .iter()
            .find(|h| h.blocks(event))
            .map(|h| format!("{} falls inside blackout {}", event.id.as_str(), h.name)),
        ConstraintKind::FairnessThreshold { max_above_mean } => {
            return fairness(c, *max_above_mean, cand, ctx);
        }
        ConstraintKind::CustomInterval { min_rest_hours } => rest_gap(*min_rest_hours, cand, ctx),
    }?;

    let score = match c.severity {
        Severity::Hard => 0.0,
        Severity::Soft => SOFT_RULE_PENALTY * c.weight,
    };
    Some(Hit {
        constraint_id: c.id.clone(),
        kind: violation_kind(&c.kind),
        severity: c.severity,
        score,
        reason,
    })
}

fn double_booking(cand: Candidate<'_>, ctx: EvalContext<'_, '_>) -> Option<String> {
    let event = cand.event;
    for other in ctx.others().filter(|a| a.person_id == cand.person.id) {
        if other.event_id == event.id {
            if other.role == cand.role {
                return Some(format!(
                    "{} already holds {}/{}",
                    cand.person.id.as_str(),
                    event.id.as_str(),
                    cand.role
                ));
            }
            if !event.allow_multi_role {
                return Some(format!(
                    "{} already holds role {} on {}",
                    cand.person.id.as_str(),
                    other.role,
                    event.id.as_str()
                ));
            }
            continue;
        }
        let Some(other_event) = ctx.problem.event(&other.event_id) else {
            continue;
        };
        if util::overlaps(event.start, event.end(), other_event.start, other_event.end())
            && !(event.allow_multi_role && other_event.allow_multi_role)
        {
            return Some(format!(
                "{} is already booked on overlapping {}",
                cand.person.id.as_str(),
                other_event.id.as_str()
            ));
        }
    }
    None
}

fn resource_clash(cand: Candidate<'_>, ctx: EvalContext<'_, '_>) -> Option<String> {
    let event = cand.event;
    let resource = event.resource.as_deref()?;
    ctx.others()
        .filter(|a| a.event_id != event.id)
        .filter_map(|a| ctx.problem.event(&a.event_id))
        .find(|other| other.resource.as_deref() == Some(resource) && other.overlaps(event))
        .map(|other| {
            format!(
                "resource {} already used by overlapping {}",
                resource,
                other.id.as_str()
            )
        })
}

fn rest_gap(min_rest_hours: u32, cand: Candidate<'_>, ctx: EvalContext<'_, '_>) -> Option<String> {
    let event = cand.event;
    ctx.others()
        .filter(|a| a.person_id == cand.person.id && a.event_id != event.id)
        .filter_map(|a| ctx.problem.event(&a.event_id))
        .filter(|other| !other.overlaps(event))
        .find(|other| util::gap_between(event, other).num_minutes() < i64::from(min_rest_hours) * 60)
        .map(|other| {
            format!(
                "less than {}h rest between {} and {}",
                min_rest_hours,
                other.id.as_str(),
                event.id.as_str()
            )
        })
}

fn fairness(
    c: &Constraint,
    max_above_mean: f64,
    cand: Candidate<'_>,
    ctx: EvalContext<'_, '_>,
) -> Option<Hit> {
    let people = ctx.problem.people_count();
    if people == 0 {
        return None;
    }
    let mut count = ctx.loads.count(&cand.person.id);
    let mut total = ctx.loads.total();
    if let Some(skipped) = ctx.skipped() {
        total = total.saturating_sub(1);
        if skipped.person_id == cand.person.id {
            count = count.saturating_sub(1);
        }
    }
    let post = f64::from(count + 1);
    let mean = (total + 1) as f64 / people as f64;
    let excess = post - mean;

    match c.severity {
        Severity::Hard if excess > max_above_mean + EPSILON => Some(Hit {
            constraint_id: c.id.clone(),
            kind: ViolationKind::Fairness,
            severity: Severity::Hard,
            score: 0.0,
            reason: format!(
                "{} would hold {} assignments, {:.2} above the mean",
                cand.person.id.as_str(),
                count + 1,
                excess
            ),
        }),
        Severity::Hard => None,
        Severity::Soft => {
            let score = c.weight * (excess - max_above_mean).max(0.0);
            (score > EPSILON).then(|| Hit {
                constraint_id: c.id.clone(),
                kind: ViolationKind::Fairness,
                severity: Severity::Soft,
                score,
                reason: format!(
                    "{} sits {:.2} above the mean load",
                    cand.person.id.as_str(),
                    excess
                ),
            })
        }
    }
}
