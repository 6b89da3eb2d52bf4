#![forbid(unsafe_code)]
mod common;

use chrono::NaiveDate;
use common::{at, event, person, unavailable, workspace};
use roster_solver::model::{
    Assignment, BlackoutRule, Constraint, ConstraintKind, EventId, Holiday, PersonId, Resource,
    Scope, Severity, Team, Workspace,
};
use roster_solver::scheduler::{SchedError, SolveOptions, Solver, Verdict};
use roster_solver::solution::ViolationKind;

fn verdict(ws: &Workspace, person: &str, event: &str, role: &str, held: &[Assignment]) -> Verdict {
    Solver::new(ws, SolveOptions::default())
        .unwrap()
        .evaluate(&PersonId::new(person), &EventId::new(event), role, held)
        .unwrap()
}

fn held(event: &str, person: &str, role: &str) -> Assignment {
    Assignment::new(EventId::new(event), PersonId::new(person), role)
}

fn hard_kind(v: &Verdict) -> ViolationKind {
    match v {
        Verdict::HardViolation { kind, .. } => *kind,
        other => panic!("expected hard violation, got {other:?}"),
    }
}

#[test]
fn free_qualified_person_is_ok() {
    let ws = workspace(
        vec![person("a", &["staff"])],
        vec![event("e", at(2025, 6, 2, 9), 60, "staff", 1)],
    );
    assert_eq!(verdict(&ws, "a", "e", "staff", &[]), Verdict::Ok);
}

#[test]
fn unavailable_person_is_rejected() {
    let a = unavailable(person("a", &["staff"]), at(2025, 6, 2, 0), at(2025, 6, 3, 0));
    let ws = workspace(vec![a], vec![event("e", at(2025, 6, 2, 9), 60, "staff", 1)]);
    let v = verdict(&ws, "a", "e", "staff", &[]);
    assert_eq!(hard_kind(&v), ViolationKind::Availability);
}

#[test]
fn unavailability_touching_the_event_edge_does_not_block() {
    let a = unavailable(person("a", &["staff"]), at(2025, 6, 2, 0), at(2025, 6, 2, 9));
    let ws = workspace(vec![a], vec![event("e", at(2025, 6, 2, 9), 60, "staff", 1)]);
    assert_eq!(verdict(&ws, "a", "e", "staff", &[]), Verdict::Ok);
}

#[test]
fn unqualified_person_is_rejected() {
    let ws = workspace(
        vec![person("a", &["staff"]), person("b", &["lead"])],
        vec![event("e", at(2025, 6, 2, 9), 60, "lead", 1)],
    );
    let v = verdict(&ws, "a", "e", "lead", &[]);
    assert_eq!(hard_kind(&v), ViolationKind::RoleQualification);
}

#[test]
fn overlapping_events_cannot_share_a_person() {
    let ws = workspace(
        vec![person("a", &["staff"])],
        vec![
            event("e1", at(2025, 6, 2, 9), 120, "staff", 1),
            event("e2", at(2025, 6, 2, 10), 120, "staff", 1),
        ],
    );
    let v = verdict(&ws, "a", "e2", "staff", &[held("e1", "a", "staff")]);
    assert_eq!(hard_kind(&v), ViolationKind::DoubleBooking);

    // même événement, même rôle
    let v = verdict(&ws, "a", "e1", "staff", &[held("e1", "a", "staff")]);
    assert_eq!(hard_kind(&v), ViolationKind::DoubleBooking);
}

#[test]
fn multi_role_events_accept_a_second_role() {
    let mut e = event("e", at(2025, 6, 2, 9), 60, "staff", 1).with_requirement("lead", 1);
    e.allow_multi_role = true;
    let ws = workspace(vec![person("a", &["staff", "lead"])], vec![e]);
    let v = verdict(&ws, "a", "e", "lead", &[held("e", "a", "staff")]);
    assert!(!v.is_hard());
}

#[test]
fn shared_resource_cannot_be_double_used() {
    let mut ws = workspace(
        vec![person("a", &["staff"]), person("b", &["staff"])],
        vec![
            event("e1", at(2025, 6, 2, 9), 120, "staff", 1).with_resource("room"),
            event("e2", at(2025, 6, 2, 10), 120, "staff", 1).with_resource("room"),
        ],
    );
    ws.resources.push(Resource {
        id: "room".into(),
        name: "Salle".into(),
    });
    let v = verdict(&ws, "b", "e2", "staff", &[held("e1", "a", "staff")]);
    assert_eq!(hard_kind(&v), ViolationKind::ResourceExclusivity);
}

#[test]
fn blackout_window_blocks_matching_event_types() {
    let mut ws = workspace(
        vec![person("a", &["staff"])],
        vec![event("e", at(2025, 12, 25, 9), 60, "staff", 1)],
    );
    ws.holidays.push(Holiday {
        name: "noel".into(),
        start: NaiveDate::from_ymd_opt(2025, 12, 24).unwrap(),
        end: NaiveDate::from_ymd_opt(2025, 12, 26).unwrap(),
        rule: BlackoutRule::FullBlock,
        event_types: vec!["shift".into()],
    });
    let v = verdict(&ws, "a", "e", "staff", &[]);
    assert_eq!(hard_kind(&v), ViolationKind::Blackout);

    ws.holidays[0].event_types = vec!["training".into()];
    assert_eq!(verdict(&ws, "a", "e", "staff", &[]), Verdict::Ok);
}

#[test]
fn minimum_rest_interval_is_enforced() {
    let mut ws = workspace(
        vec![person("a", &["staff"])],
        vec![
            event("day", at(2025, 6, 2, 8), 720, "staff", 1),
            event("night", at(2025, 6, 3, 2), 360, "staff", 1),
        ],
    );
    ws.constraints.push(Constraint::new(
        "rest-11h",
        Severity::Hard,
        ConstraintKind::CustomInterval { min_rest_hours: 11 },
    ));
    let v = verdict(&ws, "a", "night", "staff", &[held("day", "a", "staff")]);
    assert_eq!(hard_kind(&v), ViolationKind::CustomInterval);
}

#[test]
fn person_scoped_constraint_only_binds_that_person() {
    let mut ws = workspace(
        vec![person("a", &["staff"]), person("b", &["staff"])],
        vec![
            event("day", at(2025, 6, 2, 8), 720, "staff", 2),
            event("night", at(2025, 6, 3, 2), 360, "staff", 2),
        ],
    );
    ws.constraints.push(
        Constraint::new(
            "b-rest",
            Severity::Hard,
            ConstraintKind::CustomInterval { min_rest_hours: 11 },
        )
        .scoped(Scope::Person(PersonId::new("b"))),
    );
    let prior = [held("day", "a", "staff"), held("day", "b", "staff")];
    assert!(!verdict(&ws, "a", "night", "staff", &prior).is_hard());
    let v = verdict(&ws, "b", "night", "staff", &prior);
    assert_eq!(hard_kind(&v), ViolationKind::CustomInterval);
}

#[test]
fn team_scoped_constraint_only_binds_members() {
    let mut ws = workspace(
        vec![person("a", &["staff"]), person("b", &["staff"])],
        vec![
            event("day", at(2025, 6, 2, 8), 720, "staff", 2),
            event("night", at(2025, 6, 3, 2), 360, "staff", 2),
        ],
    );
    ws.teams.push(Team {
        id: "night-crew".into(),
        name: "Night crew".into(),
        members: vec![PersonId::new("a")],
    });
    ws.constraints.push(
        Constraint::new(
            "crew-rest",
            Severity::Hard,
            ConstraintKind::CustomInterval { min_rest_hours: 11 },
        )
        .scoped(Scope::Team("night-crew".into())),
    );
    let prior = [held("day", "a", "staff"), held("day", "b", "staff")];
    let v = verdict(&ws, "a", "night", "staff", &prior);
    assert_eq!(hard_kind(&v), ViolationKind::CustomInterval);
    assert!(!verdict(&ws, "b", "night", "staff", &prior).is_hard());
}

#[test]
fn resource_scoped_constraint_only_binds_events_on_that_resource() {
    let mut ws = workspace(
        vec![person("a", &["staff"])],
        vec![
            event("day", at(2025, 6, 2, 8), 720, "staff", 1),
            event("lab-night", at(2025, 6, 3, 2), 360, "staff", 1).with_resource("lab"),
            event("desk-night", at(2025, 6, 3, 2), 360, "staff", 1),
        ],
    );
    ws.resources.push(Resource {
        id: "lab".into(),
        name: "Labo".into(),
    });
    ws.constraints.push(
        Constraint::new(
            "lab-rest",
            Severity::Hard,
            ConstraintKind::CustomInterval { min_rest_hours: 11 },
        )
        .scoped(Scope::Resource("lab".into())),
    );
    let prior = [held("day", "a", "staff")];
    let v = verdict(&ws, "a", "lab-night", "staff", &prior);
    assert_eq!(hard_kind(&v), ViolationKind::CustomInterval);
    assert!(!verdict(&ws, "a", "desk-night", "staff", &prior).is_hard());
}

#[test]
fn overloaded_person_gets_a_fairness_penalty() {
    let ws = workspace(
        vec![person("a", &["staff"]), person("b", &["staff"])],
        vec![
            event("e1", at(2025, 6, 2, 9), 60, "staff", 1),
            event("e2", at(2025, 6, 3, 9), 60, "staff", 1),
            event("e3", at(2025, 6, 4, 9), 60, "staff", 1),
        ],
    );
    let prior = [held("e1", "a", "staff"), held("e2", "a", "staff")];
    // a passerait à 3 pour une moyenne de 1.5
    let v = verdict(&ws, "a", "e3", "staff", &prior);
    assert!(matches!(v, Verdict::SoftPenalty { .. }));
    assert!((v.penalty() - 1.5).abs() < 1e-9);
    assert_eq!(verdict(&ws, "b", "e3", "staff", &prior), Verdict::Ok);
}

#[test]
fn hard_fairness_threshold_rejects_overload() {
    let mut ws = workspace(
        vec![person("a", &["staff"]), person("b", &["staff"])],
        vec![
            event("e1", at(2025, 6, 2, 9), 60, "staff", 1),
            event("e2", at(2025, 6, 3, 9), 60, "staff", 1),
            event("e3", at(2025, 6, 4, 9), 60, "staff", 1),
        ],
    );
    ws.constraints.push(Constraint::new(
        "fair",
        Severity::Hard,
        ConstraintKind::FairnessThreshold {
            max_above_mean: 1.0,
        },
    ));
    let prior = [held("e1", "a", "staff"), held("e2", "a", "staff")];
    let v = verdict(&ws, "a", "e3", "staff", &prior);
    assert_eq!(hard_kind(&v), ViolationKind::Fairness);
}

#[test]
fn hard_rule_declared_soft_only_costs_a_penalty() {
    let a = unavailable(person("a", &["staff"]), at(2025, 6, 2, 0), at(2025, 6, 3, 0));
    let mut ws = workspace(vec![a], vec![event("e", at(2025, 6, 2, 9), 60, "staff", 1)]);
    ws.constraints.push(Constraint::new(
        "availability-pref",
        Severity::Soft,
        ConstraintKind::Availability,
    ));
    let v = verdict(&ws, "a", "e", "staff", &[]);
    assert!((v.penalty() - 10.0).abs() < 1e-9);
}

#[test]
fn unknown_ids_are_errors() {
    let ws = workspace(
        vec![person("a", &["staff"])],
        vec![event("e", at(2025, 6, 2, 9), 60, "staff", 1)],
    );
    let solver = Solver::new(&ws, SolveOptions::default()).unwrap();
    let err = solver
        .evaluate(&PersonId::new("ghost"), &EventId::new("e"), "staff", &[])
        .unwrap_err();
    assert!(matches!(err, SchedError::UnknownPerson(_)));
}
