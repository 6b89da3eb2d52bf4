use crate::model::{Event, RoleRequirement};
use crate::storage::write_json_atomic;
use anyhow::{bail, ensure, Context, Result};
use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Modèle d'événements récurrents, développé sur une période.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Longueur du cycle pour les jours relatifs (`days` > 7).
    #[serde(default = "default_cycle")]
    pub rotation_cycle_days: u16,
    #[serde(default)]
    pub slots: Vec<EventSlot>,
}

fn default_cycle() -> u16 {
    7
}

impl Template {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.id.trim().is_empty(), "template has no id");
        ensure!(!self.name.trim().is_empty(), "template {} has no name", self.id);
        ensure!(
            self.rotation_cycle_days > 0,
            "template {}: rotation cycle must last at least one day",
            self.id
        );
        ensure!(!self.slots.is_empty(), "template {} defines no slot", self.id);
        self.slots
            .iter()
            .try_for_each(EventSlot::validate)
            .with_context(|| format!("template {}", self.id))?;
        check_slot_pairs(&self.slots)
    }

    /// Créneaux actifs pour une date donnée, `offset` jours après le début.
    fn slots_on(&self, date: NaiveDate, offset: i64) -> impl Iterator<Item = &EventSlot> {
        let weekday = date.weekday().number_from_monday();
        let cycle_day = offset.rem_euclid(i64::from(self.rotation_cycle_days));
        self.slots
            .iter()
            .filter(move |slot| slot.runs_on(weekday, cycle_day))
    }
}

/// Événement type : un par jour correspondant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSlot {
    pub event_type: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// 1..=7 : lundi à dimanche. Au-delà : jour du cycle (8 = premier jour).
    pub days: Vec<u8>,
    pub requirements: Vec<RoleRequirement>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub teams: Vec<String>,
    #[serde(default)]
    pub allow_multi_role: bool,
}

impl EventSlot {
    fn validate(&self) -> Result<()> {
        let kind = &self.event_type;
        ensure!(!kind.trim().is_empty(), "slot without event_type");
        ensure!(!self.days.is_empty(), "slot {kind} is never scheduled");
        ensure!(self.start_time != self.end_time, "slot {kind} has zero length");
        ensure!(!self.requirements.is_empty(), "slot {kind} requires nobody");
        if let Some(req) = self.requirements.iter().find(|r| r.count == 0) {
            bail!("slot {kind} requires zero {}", req.role);
        }
        Ok(())
    }

    fn runs_on(&self, weekday: u32, cycle_day: i64) -> bool {
        self.days.iter().map(|&d| u32::from(d)).any(|d| match d {
            1..=7 => d == weekday,
            _ => i64::from(d) - 8 == cycle_day,
        })
    }

    /// Bornes en minutes depuis minuit ; un créneau de nuit déborde sur le lendemain.
    fn span(&self) -> (u32, u32) {
        let from = self.start_time.num_seconds_from_midnight() / 60;
        let to = self.end_time.num_seconds_from_midnight() / 60;
        if to <= from {
            (from, to + MINUTES_PER_DAY)
        } else {
            (from, to)
        }
    }

    fn duration_minutes(&self) -> u32 {
        let (from, to) = self.span();
        to - from
    }

    fn to_event(&self, date: NaiveDate) -> Event {
        let start = Utc.from_utc_datetime(&date.and_time(self.start_time));
        let mut event = Event::new(
            format!("{}-{}", self.event_type, date.format("%Y-%m-%d")),
            self.event_type.clone(),
            start,
            self.duration_minutes(),
        );
        event.requirements = self.requirements.clone();
        event.resource = self.resource.clone();
        event.teams = self.teams.clone();
        event.allow_multi_role = self.allow_multi_role;
        event
    }
}

/// Développe le template sur `[start, end]` ; ids déterministes `{event_type}-{YYYY-MM-DD}`.
pub fn generate_events(template: &Template, start: NaiveDate, end: NaiveDate) -> Result<Vec<Event>> {
    template.validate()?;
    ensure!(start <= end, "range {start}..{end} is reversed");

    let mut events: Vec<Event> = start
        .iter_days()
        .take_while(|date| *date <= end)
        .flat_map(|date| {
            let offset = date.signed_duration_since(start).num_days();
            template.slots_on(date, offset).map(move |slot| slot.to_event(date))
        })
        .collect();

    // un jour de semaine et un jour de cycle peuvent tomber sur la même date
    {
        let mut seen = BTreeSet::new();
        if let Some(dup) = events.iter().find(|e| !seen.insert(&e.id)) {
            bail!(
                "template {} produces {} twice: two slots of the same type fall on one date",
                template.id,
                dup.id.as_str()
            );
        }
    }

    events.sort_by(|a, b| (a.start, &a.id).cmp(&(b.start, &b.id)));
    Ok(events)
}

pub fn export_template_json<P: AsRef<Path>>(path: P, template: &Template) -> Result<()> {
    template.validate()?;
    write_json_atomic(path, template)
}

pub fn load_template_from_file<P: AsRef<Path>>(path: P) -> Result<Template> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read template {}", path.display()))?;
    let template: Template = serde_json::from_str(&raw)
        .with_context(|| format!("invalid template JSON in {}", path.display()))?;
    template.validate()?;
    Ok(template)
}

/// Même type deux fois le même jour : ids en collision. Même ressource : pas de chevauchement.
fn check_slot_pairs(slots: &[EventSlot]) -> Result<()> {
    for (i, a) in slots.iter().enumerate() {
        for b in &slots[i + 1..] {
            if !a.days.iter().any(|d| b.days.contains(d)) {
                continue;
            }
            ensure!(
                a.event_type != b.event_type,
                "event type {} is scheduled twice on the same day",
                a.event_type
            );
            if let (Some(ra), Some(rb)) = (&a.resource, &b.resource) {
                let ((a0, a1), (b0, b1)) = (a.span(), b.span());
                ensure!(
                    ra != rb || a1 <= b0 || b1 <= a0,
                    "slots {} and {} both hold resource {ra}",
                    a.event_type,
                    b.event_type
                );
            }
        }
    }
    Ok(())
}
