use crate::metrics::Metrics;
use crate::model::{Assignment, EventId, PersonId, Severity, SlotRef};
use crate::scheduler::Suggestion;
use serde::{Deserialize, Serialize};

/// Besoin non couvert après résolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmetRequirement {
    pub event_id: EventId,
    pub role: String,
    pub shortfall: u32,
}

impl UnmetRequirement {
    pub fn slot(&self) -> SlotRef {
        SlotRef {
            event_id: self.event_id.clone(),
            role: self.role.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    Availability,
    RoleQualification,
    DoubleBooking,
    ResourceExclusivity,
    Blackout,
    Fairness,
    CustomInterval,
    CoverageGap,
    Capacity,
    Locked,
    InvalidEdit,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Availability => "availability",
            ViolationKind::RoleQualification => "role-qualification",
            ViolationKind::DoubleBooking => "double-booking",
            ViolationKind::ResourceExclusivity => "resource-exclusivity",
            ViolationKind::Blackout => "blackout",
            ViolationKind::Fairness => "fairness",
            ViolationKind::CustomInterval => "custom-interval",
            ViolationKind::CoverageGap => "coverage-gap",
            ViolationKind::Capacity => "capacity",
            ViolationKind::Locked => "locked",
            ViolationKind::InvalidEdit => "invalid-edit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub constraint_id: String,
    pub kind: ViolationKind,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<PersonId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub penalty: f64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
}

impl ConstraintViolation {
    pub fn hard<C: Into<String>, M: Into<String>>(
        constraint_id: C,
        kind: ViolationKind,
        message: M,
    ) -> Self {
        Self {
            constraint_id: constraint_id.into(),
            kind,
            severity: Severity::Hard,
            event_id: None,
            person_id: None,
            role: None,
            penalty: 0.0,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn soft<C: Into<String>, M: Into<String>>(
        constraint_id: C,
        kind: ViolationKind,
        penalty: f64,
        message: M,
    ) -> Self {
        Self {
            severity: Severity::Soft,
            penalty,
            ..Self::hard(constraint_id, kind, message)
        }
    }

    pub fn on(mut self, assignment: &Assignment) -> Self {
        self.event_id = Some(assignment.event_id.clone());
        self.person_id = Some(assignment.person_id.clone());
        self.role = Some(assignment.role.clone());
        self
    }

    pub fn on_slot(mut self, slot: &SlotRef) -> Self {
        self.event_id = Some(slot.event_id.clone());
        self.role = Some(slot.role.clone());
        self
    }

    pub fn is_hard(&self) -> bool {
        self.severity == Severity::Hard
    }

    /// Affectation visée, si la violation en concerne une.
    pub fn assignment(&self) -> Option<(&EventId, &PersonId, &str)> {
        match (&self.event_id, &self.person_id, &self.role) {
            (Some(e), Some(p), Some(r)) => Some((e, p, r.as_str())),
            _ => None,
        }
    }
}

/// Résultat d'une résolution. Jamais modifié en place : les éditions produisent une nouvelle Solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub unmet: Vec<UnmetRequirement>,
    #[serde(default)]
    pub violations: Vec<ConstraintViolation>,
    pub metrics: Metrics,
    #[serde(default)]
    pub incomplete: bool,
}

impl Solution {
    pub fn hard_violations(&self) -> impl Iterator<Item = &ConstraintViolation> {
        self.violations.iter().filter(|v| v.is_hard())
    }

    pub fn assignments_for<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> impl Iterator<Item = &'a Assignment> + 'a {
        self.assignments
            .iter()
            .filter(move |a| &a.event_id == event_id)
    }

    pub fn locked(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(|a| a.locked)
    }

    pub fn is_fully_covered(&self, event_id: &EventId) -> bool {
        !self.unmet.iter().any(|u| &u.event_id == event_id)
    }
}
