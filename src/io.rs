use crate::metrics::Metrics;
use crate::model::{Assignment, Event, Person, PersonId, Unavailability, Workspace};
use crate::solution::{ConstraintViolation, Solution, UnmetRequirement};
use anyhow::{bail, Context};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const ICS_STAMP: &str = "%Y%m%dT%H%M%SZ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverInfo {
    pub name: String,
    pub version: String,
}

impl Default for SolverInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMeta {
    pub generated_at: DateTime<Utc>,
    pub solver: SolverInfo,
}

/// Format d'échange d'une solution : métadonnées + contenu de la `Solution`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionBundle {
    pub meta: BundleMeta,
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub unmet: Vec<UnmetRequirement>,
    #[serde(default)]
    pub violations: Vec<ConstraintViolation>,
    pub metrics: Metrics,
    #[serde(default)]
    pub incomplete: bool,
}

impl SolutionBundle {
    pub fn new(solution: &Solution, generated_at: DateTime<Utc>) -> Self {
        Self {
            meta: BundleMeta {
                generated_at,
                solver: SolverInfo::default(),
            },
            assignments: solution.assignments.clone(),
            unmet: solution.unmet.clone(),
            violations: solution.violations.clone(),
            metrics: solution.metrics.clone(),
            incomplete: solution.incomplete,
        }
    }

    pub fn into_solution(self) -> Solution {
        Solution {
            assignments: self.assignments,
            unmet: self.unmet,
            violations: self.violations,
            metrics: self.metrics,
            incomplete: self.incomplete,
        }
    }
}

pub fn render_bundle_json(bundle: &SolutionBundle) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(bundle)?)
}

pub fn write_bundle_json<P: AsRef<Path>>(path: P, bundle: &SolutionBundle) -> anyhow::Result<()> {
    let path = path.as_ref();
    fs::write(path, render_bundle_json(bundle)?)
        .with_context(|| format!("writing {}", path.display()))
}

pub fn load_bundle<P: AsRef<Path>>(path: P) -> anyhow::Result<SolutionBundle> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing bundle {}", path.display()))
}

/// Événements triés par début puis identifiant.
fn events_in_order(ws: &Workspace) -> Vec<&Event> {
    let mut events: Vec<&Event> = ws.events.iter().collect();
    events.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
    events
}

/// Export CSV des affectations, une ligne par événement :
/// header `event_id,event_type,start,end,assignees,assignee_ids,resource_id,team_ids`
pub fn render_assignments_csv(ws: &Workspace, solution: &Solution) -> anyhow::Result<String> {
    let mut w = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    w.write_record([
        "event_id",
        "event_type",
        "start",
        "end",
        "assignees",
        "assignee_ids",
        "resource_id",
        "team_ids",
    ])?;
    for e in events_in_order(ws) {
        let mut held: Vec<&Assignment> = solution.assignments_for(&e.id).collect();
        held.sort_by(|a, b| a.role.cmp(&b.role).then(a.person_id.cmp(&b.person_id)));
        let assignees = held
            .iter()
            .map(|a| {
                let name = ws
                    .find_person_by_id(&a.person_id)
                    .map(|p| p.name.as_str())
                    .unwrap_or(a.person_id.as_str());
                format!("{name} ({})", a.role)
            })
            .collect::<Vec<_>>()
            .join("; ");
        let assignee_ids = held
            .iter()
            .map(|a| a.person_id.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let start = e.start.to_rfc3339();
        let end = e.end().to_rfc3339();
        let teams = e.teams.join(";");
        w.write_record([
            e.id.as_str(),
            e.event_type.as_str(),
            start.as_str(),
            end.as_str(),
            assignees.as_str(),
            assignee_ids.as_str(),
            e.resource.as_deref().unwrap_or(""),
            teams.as_str(),
        ])?;
    }
    w.flush()?;
    let bytes = w.into_inner().map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn write_assignments_csv<P: AsRef<Path>>(
    path: P,
    ws: &Workspace,
    solution: &Solution,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    fs::write(path, render_assignments_csv(ws, solution)?)
        .with_context(|| format!("writing {}", path.display()))
}

fn ics_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Calendrier iCalendar : un VEVENT par événement, lignes terminées par CRLF.
pub fn render_ics(ws: &Workspace, solution: &Solution, stamp: DateTime<Utc>) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:-//{}//{}//EN", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        "CALSCALE:GREGORIAN".to_string(),
    ];
    let dtstamp = stamp.format(ICS_STAMP).to_string();
    for e in events_in_order(ws) {
        let mut held: Vec<&Assignment> = solution.assignments_for(&e.id).collect();
        held.sort_by(|a, b| a.role.cmp(&b.role).then(a.person_id.cmp(&b.person_id)));
        let description = held
            .iter()
            .map(|a| format!("{}: {}", a.role, a.person_id.as_str()))
            .collect::<Vec<_>>()
            .join("\n");
        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("UID:{}@{}", ics_escape(e.id.as_str()), env!("CARGO_PKG_NAME")));
        lines.push(format!("DTSTAMP:{dtstamp}"));
        lines.push(format!("DTSTART:{}", e.start.format(ICS_STAMP)));
        lines.push(format!("DTEND:{}", e.end().format(ICS_STAMP)));
        lines.push(format!("SUMMARY:{}", ics_escape(&e.event_type)));
        if !description.is_empty() {
            lines.push(format!("DESCRIPTION:{}", ics_escape(&description)));
        }
        if let Some(resource) = &e.resource {
            lines.push(format!("LOCATION:{}", ics_escape(resource)));
        }
        lines.push("END:VEVENT".to_string());
    }
    lines.push("END:VCALENDAR".to_string());
    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

pub fn write_ics<P: AsRef<Path>>(
    path: P,
    ws: &Workspace,
    solution: &Solution,
    stamp: DateTime<Utc>,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    fs::write(path, render_ics(ws, solution, stamp))
        .with_context(|| format!("writing {}", path.display()))
}

pub fn render_metrics_json(metrics: &Metrics) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(metrics)?)
}

pub fn write_metrics_json<P: AsRef<Path>>(path: P, metrics: &Metrics) -> anyhow::Result<()> {
    let path = path.as_ref();
    fs::write(path, render_metrics_json(metrics)?)
        .with_context(|| format!("writing {}", path.display()))
}

/// Import de personnes depuis CSV: header `id,name[,roles][,unavailable][,team]`
///
/// `roles` séparés par `;` ; `unavailable` : plages `début/fin` (ou `début..fin`)
/// séparées par `;`, dates (fin incluse) ou RFC3339.
pub fn import_people_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Person>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let raw_id = rec.get(0).context("missing id")?.trim();
        let name = rec.get(1).context("missing name")?.trim();
        if name.is_empty() {
            bail!("invalid people row (empty name)");
        }
        // id vide : identifiant généré
        let id = if raw_id.is_empty() {
            PersonId::random()
        } else {
            PersonId::new(raw_id)
        };
        let mut person = Person::new(id.as_str(), name);
        if let Some(roles) = rec.get(2) {
            person = person.with_roles(
                roles
                    .split(';')
                    .map(str::trim)
                    .filter(|r| !r.is_empty()),
            );
        }
        if let Some(ranges) = rec.get(3) {
            let ranges = ranges.trim();
            if !ranges.is_empty() {
                person.unavailable = parse_unavailability(ranges)
                    .with_context(|| format!("invalid unavailable value for {}", id.as_str()))?;
            }
        }
        if let Some(team) = rec.get(4) {
            let team = team.trim();
            if !team.is_empty() {
                person.team = Some(team.to_string());
            }
        }
        out.push(person);
    }
    Ok(out)
}

fn parse_unavailability(raw: &str) -> anyhow::Result<Vec<Unavailability>> {
    raw.split(';')
        .filter(|chunk| !chunk.trim().is_empty())
        .map(|chunk| parse_unavailability_chunk(chunk.trim()))
        .collect()
}

fn parse_unavailability_chunk(chunk: &str) -> anyhow::Result<Unavailability> {
    if let Some((start_raw, end_raw)) = chunk.split_once('/').or_else(|| chunk.split_once("..")) {
        let (start, _) = parse_point(start_raw.trim())?;
        let (mut end, end_was_date) = parse_point(end_raw.trim())?;
        if end_was_date {
            end += Duration::days(1);
        }
        Unavailability::new(start, end).map_err(anyhow::Error::msg)
    } else {
        let (start, _) = parse_point(chunk)?;
        let end = start + Duration::days(1);
        Unavailability::new(start, end).map_err(anyhow::Error::msg)
    }
}

fn parse_point(raw: &str) -> anyhow::Result<(DateTime<Utc>, bool)> {
    if let Ok(dt) = raw.parse::<DateTime<Utc>>() {
        return Ok((dt, false));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date/datetime: {raw}"))?;
    let datetime = date
        .and_hms_opt(0, 0, 0)
        .context("invalid midnight conversion")?;
    Ok((Utc.from_utc_datetime(&datetime), true))
}
