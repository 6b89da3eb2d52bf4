#![forbid(unsafe_code)]
//! Roster-solver : solveur d'affectation de rosters local (sans BD).
//!
//! - Contraintes dures et souples déclaratives, jeu intégré surchargeable.
//! - Résolution gloutonne « le plus contraint d'abord », puis réparation.
//! - Métriques d'équité et score de santé, suggestions classées.
//! - Export JSON/CSV/ICS ; tout en UTC, parsing RFC3339.

/// Trace de debug, compilée uniquement avec la feature `logging`.
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        tracing::debug!($($arg)*);
    }};
}

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        tracing::warn!($($arg)*);
    }};
}

pub(crate) use log_debug;
pub(crate) use log_warn;

pub mod io;
pub mod metrics;
pub mod model;
pub mod scheduler;
pub mod solution;
pub mod storage;
pub mod template;

pub use metrics::{Fairness, Metrics};
pub use model::{
    Assignment, BlackoutRule, Constraint, ConstraintKind, Event, EventId, Holiday, Organization,
    Person, PersonId, Resource, RoleRequirement, Scope, Severity, SlotRef, Team, Unavailability,
    Workspace,
};
pub use scheduler::{
    Action, Edit, EditValidation, LoadError, SchedError, SolveOptions, Solver, Suggestion,
    Suggestions, Verdict,
};
pub use solution::{ConstraintViolation, Solution, UnmetRequirement, ViolationKind};
pub use storage::{JsonStorage, Storage};
pub use template::{generate_events, load_template_from_file, EventSlot, Template};
