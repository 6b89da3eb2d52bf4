use crate::scheduler::LoadError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Identifiant fort pour Person
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifiant fort pour Event
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Personne affectable à des rôles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<Unavailability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

impl Person {
    pub fn new<I: AsRef<str>, N: Into<String>>(id: I, name: N) -> Self {
        Self {
            id: PersonId::new(id),
            name: name.into(),
            roles: BTreeSet::new(),
            unavailable: Vec::new(),
            team: None,
        }
    }

    pub fn with_roles<R, S>(mut self, roles: R) -> Self
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_unavailability(mut self, period: Unavailability) -> Self {
        self.unavailable.push(period);
        self
    }

    pub fn qualifies_for(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Vrai si `[start, end)` croise une période d'indisponibilité.
    pub fn is_unavailable(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.unavailable
            .iter()
            .any(|u| u.start < end && start < u.end)
    }
}

/// Période d'indisponibilité d'une personne (intervalle UTC [start, end)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unavailability {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Unavailability {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, String> {
        if end <= start {
            return Err("unavailability end must be after start".to_string());
        }
        Ok(Self { start, end })
    }
}

/// Besoin d'un événement : `count` personnes tenant `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequirement {
    pub role: String,
    pub count: u32,
}

impl RoleRequirement {
    pub fn new<S: Into<String>>(role: S, count: u32) -> Self {
        Self {
            role: role.into(),
            count,
        }
    }
}

/// Événement à staffer (UTC)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: String,
    pub start: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub requirements: Vec<RoleRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<String>,
    #[serde(default)]
    pub allow_multi_role: bool,
}

impl Event {
    pub fn new<I: AsRef<str>, T: Into<String>>(
        id: I,
        event_type: T,
        start: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Self {
        Self {
            id: EventId::new(id),
            event_type: event_type.into(),
            start,
            duration_minutes,
            requirements: Vec::new(),
            resource: None,
            teams: Vec::new(),
            allow_multi_role: false,
        }
    }

    pub fn with_requirement<S: Into<String>>(mut self, role: S, count: u32) -> Self {
        self.requirements.push(RoleRequirement::new(role, count));
        self
    }

    pub fn with_resource<S: Into<String>>(mut self, resource: S) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Nombre requis pour `role` (0 si l'événement ne le demande pas).
    pub fn required(&self, role: &str) -> u32 {
        self.requirements
            .iter()
            .filter(|r| r.role == role)
            .map(|r| r.count)
            .sum()
    }

    pub fn overlaps(&self, other: &Event) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub members: Vec<PersonId>,
}

/// Ressource à usage exclusif (salle, ligne de garde, véhicule...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlackoutRule {
    /// Tous les jours de la fenêtre sont bloqués.
    FullBlock,
    /// Seuls les vendredis et lundis de la fenêtre sont bloqués.
    LongWeekend,
}

/// Jour férié ou fenêtre de blackout (bornes incluses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default = "default_blackout_rule")]
    pub rule: BlackoutRule,
    /// Types d'événements concernés ; vide = tous.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_types: Vec<String>,
}

fn default_blackout_rule() -> BlackoutRule {
    BlackoutRule::FullBlock
}

impl Holiday {
    pub fn blocks(&self, event: &Event) -> bool {
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return false;
        }
        let day = event.date();
        if day < self.start || day > self.end {
            return false;
        }
        match self.rule {
            BlackoutRule::FullBlock => true,
            BlackoutRule::LongWeekend => matches!(day.weekday(), Weekday::Fri | Weekday::Mon),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Hard,
    Soft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum Scope {
    Global,
    Person(PersonId),
    Team(String),
    Resource(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ConstraintKind {
    Availability,
    RoleQualification,
    DoubleBooking,
    ResourceExclusivity,
    Blackout,
    FairnessThreshold {
        #[serde(default)]
        max_above_mean: f64,
    },
    CustomInterval {
        min_rest_hours: u32,
    },
}

impl ConstraintKind {
    pub fn label(&self) -> &'static str {
        match self {
            ConstraintKind::Availability => "availability",
            ConstraintKind::RoleQualification => "role-qualification",
            ConstraintKind::DoubleBooking => "double-booking",
            ConstraintKind::ResourceExclusivity => "resource-exclusivity",
            ConstraintKind::Blackout => "blackout",
            ConstraintKind::FairnessThreshold { .. } => "fairness-threshold",
            ConstraintKind::CustomInterval { .. } => "custom-interval",
        }
    }

    fn same_variant(&self, other: &ConstraintKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Contrainte déclarative : portée, sévérité et nature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    #[serde(default = "default_scope")]
    pub scope: Scope,
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: ConstraintKind,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_scope() -> Scope {
    Scope::Global
}

fn default_weight() -> f64 {
    1.0
}

impl Constraint {
    pub fn new<S: Into<String>>(id: S, severity: Severity, kind: ConstraintKind) -> Self {
        Self {
            id: id.into(),
            scope: Scope::Global,
            severity,
            kind,
            weight: 1.0,
        }
    }

    pub fn scoped(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Jeu intégré, toujours actif sauf remplacement global de même nature.
    pub fn builtins() -> Vec<Constraint> {
        vec![
            Constraint::new("availability", Severity::Hard, ConstraintKind::Availability),
            Constraint::new(
                "role-qualification",
                Severity::Hard,
                ConstraintKind::RoleQualification,
            ),
            Constraint::new("double-booking", Severity::Hard, ConstraintKind::DoubleBooking),
            Constraint::new(
                "resource-exclusivity",
                Severity::Hard,
                ConstraintKind::ResourceExclusivity,
            ),
            Constraint::new("blackout", Severity::Hard, ConstraintKind::Blackout),
            Constraint::new(
                "fairness-pressure",
                Severity::Soft,
                ConstraintKind::FairnessThreshold {
                    max_above_mean: 0.0,
                },
            ),
        ]
    }

    /// Fusionne les contraintes du workspace dans le jeu intégré.
    pub fn resolve(custom: &[Constraint]) -> Vec<Constraint> {
        let mut out = Self::builtins();
        let builtin_count = out.len();
        for c in custom {
            let replaced = if c.scope == Scope::Global {
                out.iter_mut()
                    .take(builtin_count)
                    .find(|b| b.kind.same_variant(&c.kind))
            } else {
                None
            };
            match replaced {
                Some(slot) => *slot = c.clone(),
                None => out.push(c.clone()),
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    /// Écart-type d'équité toléré pour un score de santé de 100.
    #[serde(default = "default_fairness_threshold")]
    pub fairness_threshold: f64,
}

fn default_fairness_threshold() -> f64 {
    1.0
}

impl Default for Organization {
    fn default() -> Self {
        Self {
            name: String::new(),
            fairness_threshold: default_fairness_threshold(),
        }
    }
}

/// Affectation d'une personne à un rôle d'un événement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub event_id: EventId,
    pub person_id: PersonId,
    pub role: String,
    #[serde(default)]
    pub locked: bool,
}

impl Assignment {
    pub fn new<S: Into<String>>(event_id: EventId, person_id: PersonId, role: S) -> Self {
        Self {
            event_id,
            person_id,
            role: role.into(),
            locked: false,
        }
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    pub fn slot(&self) -> SlotRef {
        SlotRef {
            event_id: self.event_id.clone(),
            role: self.role.clone(),
        }
    }

    pub fn same_slot_holder(&self, other: &Assignment) -> bool {
        self.event_id == other.event_id
            && self.person_id == other.person_id
            && self.role == other.role
    }
}

/// Référence (événement, rôle).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub event_id: EventId,
    pub role: String,
}

/// Description complète d'une organisation à planifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub organization: Organization,
    /// Catalogue de rôles ; vide = union des rôles des personnes.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<Team>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holidays: Vec<Holiday>,
}

impl Workspace {
    pub fn find_person_by_id<'a>(&'a self, id: &PersonId) -> Option<&'a Person> {
        self.people.iter().find(|p| &p.id == id)
    }
    pub fn find_event_by_id<'a>(&'a self, id: &EventId) -> Option<&'a Event> {
        self.events.iter().find(|e| &e.id == id)
    }

    pub fn role_catalogue(&self) -> BTreeSet<String> {
        if !self.roles.is_empty() {
            return self.roles.clone();
        }
        self.people
            .iter()
            .flat_map(|p| p.roles.iter().cloned())
            .collect()
    }

    /// Vérifie la cohérence interne avant toute tentative d'affectation.
    pub fn validate(&self) -> Result<(), LoadError> {
        let mut person_ids = BTreeSet::new();
        for p in &self.people {
            if !person_ids.insert(&p.id) {
                return Err(LoadError::DuplicatePerson(p.id.as_str().to_string()));
            }
            if p.unavailable.iter().any(|u| u.end <= u.start) {
                return Err(LoadError::InvalidInterval(format!("person {}", p.id.as_str())));
            }
        }

        let catalogue = self.role_catalogue();
        if !self.roles.is_empty() {
            for p in &self.people {
                if let Some(role) = p.roles.iter().find(|r| !catalogue.contains(*r)) {
                    return Err(LoadError::UndefinedRole {
                        owner: format!("person {}", p.id.as_str()),
                        role: role.clone(),
                    });
                }
            }
        }

        let team_ids: BTreeSet<&str> = self.teams.iter().map(|t| t.id.as_str()).collect();
        if team_ids.len() != self.teams.len() {
            return Err(LoadError::Duplicate("team".into()));
        }
        let resource_ids: BTreeSet<&str> = self.resources.iter().map(|r| r.id.as_str()).collect();
        if resource_ids.len() != self.resources.len() {
            return Err(LoadError::Duplicate("resource".into()));
        }

        for t in &self.teams {
            if let Some(m) = t.members.iter().find(|m| !person_ids.contains(m)) {
                return Err(LoadError::UnknownPerson {
                    owner: format!("team {}", t.id),
                    person: m.as_str().to_string(),
                });
            }
        }
        for p in &self.people {
            if let Some(team) = p.team.as_deref().filter(|t| !team_ids.contains(t)) {
                return Err(LoadError::UnknownTeam {
                    owner: format!("person {}", p.id.as_str()),
                    team: team.to_string(),
                });
            }
        }

        let mut event_ids = BTreeSet::new();
        for e in &self.events {
            if !event_ids.insert(&e.id) {
                return Err(LoadError::DuplicateEvent(e.id.as_str().to_string()));
            }
            if e.duration_minutes == 0 {
                return Err(LoadError::InvalidInterval(format!("event {}", e.id.as_str())));
            }
            let mut seen = BTreeSet::new();
            for req in &e.requirements {
                if !catalogue.contains(&req.role) {
                    return Err(LoadError::UndefinedRole {
                        owner: format!("event {}", e.id.as_str()),
                        role: req.role.clone(),
                    });
                }
                if !seen.insert(req.role.as_str()) {
                    return Err(LoadError::Duplicate(format!(
                        "requirement {} on event {}",
                        req.role,
                        e.id.as_str()
                    )));
                }
            }
            if let Some(res) = e.resource.as_deref().filter(|r| !resource_ids.contains(r)) {
                return Err(LoadError::UnknownResource {
                    event: e.id.as_str().to_string(),
                    resource: res.to_string(),
                });
            }
            if let Some(team) = e.teams.iter().find(|t| !team_ids.contains(t.as_str())) {
                return Err(LoadError::UnknownTeam {
                    owner: format!("event {}", e.id.as_str()),
                    team: team.clone(),
                });
            }
        }

        for h in &self.holidays {
            if h.end < h.start {
                return Err(LoadError::InvalidInterval(format!("holiday {}", h.name)));
            }
        }

        for c in &self.constraints {
            if !(c.weight.is_finite() && c.weight >= 0.0) {
                return Err(LoadError::InvalidConstraint {
                    id: c.id.clone(),
                    reason: "weight must be a non-negative number".into(),
                });
            }
            match &c.scope {
                Scope::Global => {}
                Scope::Person(pid) if !person_ids.contains(pid) => {
                    return Err(LoadError::UnknownPerson {
                        owner: format!("constraint {}", c.id),
                        person: pid.as_str().to_string(),
                    });
                }
                Scope::Team(t) if !team_ids.contains(t.as_str()) => {
                    return Err(LoadError::UnknownTeam {
                        owner: format!("constraint {}", c.id),
                        team: t.clone(),
                    });
                }
                Scope::Resource(r) if !resource_ids.contains(r.as_str()) => {
                    return Err(LoadError::UnknownResource {
                        event: format!("constraint {}", c.id),
                        resource: r.clone(),
                    });
                }
                _ => {}
            }
            if let ConstraintKind::FairnessThreshold { max_above_mean } = c.kind {
                if !(max_above_mean.is_finite() && max_above_mean >= 0.0) {
                    return Err(LoadError::InvalidConstraint {
                        id: c.id.clone(),
                        reason: "max_above_mean must be a non-negative number".into(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn index(&self) -> WorkspaceIndex {
        WorkspaceIndex::build(self)
    }
}

/// Index par identifiant vers les positions dans le workspace.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceIndex {
    people: BTreeMap<PersonId, usize>,
    events: BTreeMap<EventId, usize>,
    team_members: BTreeMap<String, BTreeSet<PersonId>>,
}

impl WorkspaceIndex {
    pub fn build(ws: &Workspace) -> Self {
        let people = ws
            .people
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        let events = ws
            .events
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        let mut team_members: BTreeMap<String, BTreeSet<PersonId>> = BTreeMap::new();
        for t in &ws.teams {
            team_members
                .entry(t.id.clone())
                .or_default()
                .extend(t.members.iter().cloned());
        }
        for p in &ws.people {
            if let Some(team) = &p.team {
                team_members
                    .entry(team.clone())
                    .or_default()
                    .insert(p.id.clone());
            }
        }
        Self {
            people,
            events,
            team_members,
        }
    }

    pub fn person<'a>(&self, ws: &'a Workspace, id: &PersonId) -> Option<&'a Person> {
        self.people.get(id).and_then(|&i| ws.people.get(i))
    }

    pub fn event<'a>(&self, ws: &'a Workspace, id: &EventId) -> Option<&'a Event> {
        self.events.get(id).and_then(|&i| ws.events.get(i))
    }

    pub fn is_member(&self, team: &str, person: &PersonId) -> bool {
        self.team_members
            .get(team)
            .is_some_and(|members| members.contains(person))
    }
}
