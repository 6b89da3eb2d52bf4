use std::time::Duration;
use thiserror::Error;

/// Options de résolution
#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Nombre maximal de créneaux traités avant d'abandonner (solution incomplète).
    pub max_iterations: Option<usize>,
    /// Budget temps, vérifié entre deux créneaux.
    pub time_budget: Option<Duration>,
    /// Une suggestion n'est appliquée en réparation que si son score dépasse ce seuil.
    pub repair_threshold: f64,
    pub max_suggestions: usize,
    /// Écart sous la moyenne requis pour recevoir une charge transférée.
    pub fairness_margin: f64,
    /// Nombre maximal d'évaluations par appel à `suggest`.
    pub suggest_budget: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iterations: None,
            time_budget: None,
            repair_threshold: 0.25,
            max_suggestions: 3,
            fairness_margin: 0.5,
            suggest_budget: 10_000,
        }
    }
}

/// Phases d'une résolution ; `Finalized` est terminale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SolvePhase {
    Loaded,
    Seeding,
    Assigning,
    Repairing,
    Finalized,
}

/// Workspace ou affectations verrouillées incohérents : rien n'est tenté.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("duplicate person id: {0}")]
    DuplicatePerson(String),
    #[error("duplicate event id: {0}")]
    DuplicateEvent(String),
    #[error("duplicate {0}")]
    Duplicate(String),
    #[error("invalid time range on {0}")]
    InvalidInterval(String),
    #[error("{owner} references undefined role {role}")]
    UndefinedRole { owner: String, role: String },
    #[error("{owner} references unknown person {person}")]
    UnknownPerson { owner: String, person: String },
    #[error("{owner} references unknown team {team}")]
    UnknownTeam { owner: String, team: String },
    #[error("{event} references unknown resource {resource}")]
    UnknownResource { event: String, resource: String },
    #[error("invalid constraint {id}: {reason}")]
    InvalidConstraint { id: String, reason: String },
    #[error("locked assignment references unknown event {0}")]
    LockedUnknownEvent(String),
    #[error("locked assignment references unknown person {0}")]
    LockedUnknownPerson(String),
    #[error("locked assignment on event {event}: role {role} is not required")]
    LockedRoleNotRequired { event: String, role: String },
    #[error("locked assignment duplicated: {person} on {event}/{role}")]
    LockedDuplicate {
        event: String,
        person: String,
        role: String,
    },
    #[error("locked assignments exceed requirement on {event}/{role}")]
    LockedOverCapacity { event: String, role: String },
}

#[derive(Error, Debug)]
pub enum SchedError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("unknown person: {0}")]
    UnknownPerson(String),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("edit rejected: {0}")]
    EditRejected(String),
    #[error("invariant breach: {0}")]
    InvariantBreach(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
