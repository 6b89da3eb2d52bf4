#![forbid(unsafe_code)]
mod common;

use chrono::{Duration, NaiveDate};
use common::{at, daily_events, event, person, pool, unavailable, workspace};
use roster_solver::model::{
    Assignment, BlackoutRule, Event, EventId, Holiday, PersonId, Workspace,
};
use roster_solver::scheduler::{LoadError, SchedError, SolveOptions, Solver};
use roster_solver::solution::{Solution, ViolationKind};

fn solve(ws: &Workspace) -> Solution {
    Solver::new(ws, SolveOptions::default())
        .unwrap()
        .solve(&[])
        .unwrap()
}

fn assert_invariants(ws: &Workspace, solution: &Solution) {
    // capacité
    for e in &ws.events {
        for req in &e.requirements {
            let held = solution
                .assignments
                .iter()
                .filter(|a| a.event_id == e.id && a.role == req.role)
                .count();
            assert!(held as u32 <= req.count, "{} over capacity", e.id.as_str());
        }
    }
    // toute affectation invalide est déclarée
    let solver = Solver::new(ws, SolveOptions::default()).unwrap();
    for (i, a) in solution.assignments.iter().enumerate() {
        let mut others = solution.assignments.clone();
        others.remove(i);
        let verdict = solver
            .evaluate(&a.person_id, &a.event_id, &a.role, &others)
            .unwrap();
        if verdict.is_hard() {
            assert!(solution.violations.iter().any(|v| {
                v.is_hard()
                    && v.event_id.as_ref() == Some(&a.event_id)
                    && v.person_id.as_ref() == Some(&a.person_id)
            }));
        }
    }
}

#[test]
fn twenty_people_eight_events_fully_covered() {
    let ws = workspace(pool(20, "staff"), daily_events(8, "staff", 7));
    let solution = solve(&ws);

    assert_eq!(solution.assignments.len(), 56);
    assert!(solution.unmet.is_empty());
    assert!(ws.events.iter().all(|e| solution.is_fully_covered(&e.id)));
    assert_eq!(solution.metrics.hard_violations, 0);
    assert_eq!(solution.metrics.health_score, 100);
    assert!(!solution.metrics.health_provisional);
    assert!((solution.metrics.fairness.stdev - 0.4).abs() < 1e-9);
    assert!(!solution.incomplete);
    assert_invariants(&ws, &solution);
}

#[test]
fn three_tier_daily_on_call_is_perfectly_balanced() {
    let people = (1..=12)
        .map(|i| person(&format!("p{i:02}"), &["primary", "secondary", "tertiary"]))
        .collect();
    let events = (0..12)
        .map(|i| {
            Event::new(
                format!("oncall-{i:02}"),
                "oncall",
                at(2025, 3, 3, 8) + Duration::days(i),
                720,
            )
            .with_requirement("primary", 1)
            .with_requirement("secondary", 1)
            .with_requirement("tertiary", 1)
        })
        .collect();
    let ws = workspace(people, events);
    let solution = solve(&ws);

    assert_eq!(solution.assignments.len(), 36);
    assert!(solution.unmet.is_empty());
    assert_eq!(solution.metrics.hard_violations, 0);
    assert_eq!(solution.metrics.health_score, 100);
    assert_eq!(solution.metrics.fairness.stdev, 0.0);
    for p in &ws.people {
        assert_eq!(solution.metrics.count_for(&p.id), 3, "{}", p.id.as_str());
    }
    assert_invariants(&ws, &solution);
}

#[test]
fn long_weekend_blackout_leaves_one_gap() {
    // lundi 2 juin → mercredi 11 juin ; le pont ne bloque que le vendredi 6
    let mut ws = workspace(pool(40, "staff"), daily_events(10, "staff", 4));
    ws.holidays.push(Holiday {
        name: "pont".into(),
        start: NaiveDate::from_ymd_opt(2025, 6, 6).unwrap(),
        end: NaiveDate::from_ymd_opt(2025, 6, 8).unwrap(),
        rule: BlackoutRule::LongWeekend,
        event_types: Vec::new(),
    });
    let solution = solve(&ws);

    let covered = ws
        .events
        .iter()
        .filter(|e| solution.is_fully_covered(&e.id))
        .count();
    assert_eq!(covered, 9);
    assert_eq!(solution.unmet.len(), 1);
    assert_eq!(solution.unmet[0].event_id.as_str(), "day-2025-06-06");
    assert_eq!(solution.unmet[0].shortfall, 4);
    assert_eq!(solution.metrics.hard_violations, 1);
    assert_eq!(solution.metrics.health_score, 0);

    let gap = solution.hard_violations().next().unwrap();
    assert_eq!(gap.kind, ViolationKind::CoverageGap);
    assert!(gap.message.contains("blackout"), "{}", gap.message);
    assert_invariants(&ws, &solution);
}

#[test]
fn locked_assignments_survive_a_resolve() {
    let ws = workspace(pool(20, "staff"), daily_events(4, "staff", 5));
    let first = solve(&ws);
    assert_eq!(first.assignments.len(), 20);

    let locked: Vec<Assignment> = first
        .assignments
        .iter()
        .take(5)
        .cloned()
        .map(Assignment::locked)
        .collect();
    let locked_people: Vec<&PersonId> = locked.iter().map(|a| &a.person_id).collect();

    // une personne non verrouillée devient indisponible sur toute la période
    let mut changed = ws.clone();
    let target = changed
        .people
        .iter()
        .position(|p| !locked_people.contains(&&p.id))
        .unwrap();
    let target_id = changed.people[target].id.clone();
    let p = changed.people.remove(target);
    changed
        .people
        .insert(target, unavailable(p, at(2025, 6, 1, 0), at(2025, 7, 1, 0)));

    let mut seed = locked.clone();
    // les affectations non verrouillées de l'entrée sont ignorées
    seed.extend(first.assignments.iter().skip(5).cloned());
    let second = Solver::new(&changed, SolveOptions::default())
        .unwrap()
        .solve(&seed)
        .unwrap();

    for l in &locked {
        let kept = second
            .assignments
            .iter()
            .find(|a| a.same_slot_holder(l))
            .unwrap();
        assert_eq!(
            serde_json::to_string(kept).unwrap(),
            serde_json::to_string(l).unwrap()
        );
    }
    assert_eq!(second.locked().count(), 5);
    assert!(second.assignments.iter().all(|a| a.person_id != target_id));
    assert!(second.unmet.is_empty());
    assert_invariants(&changed, &second);
}

#[test]
fn same_input_gives_identical_solution() {
    let ws = workspace(pool(9, "staff"), daily_events(6, "staff", 4));
    let a = solve(&ws);
    let b = solve(&ws);
    assert_eq!(a.assignments, b.assignments);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn extra_eligible_person_never_increases_dispersion() {
    let events = vec![
        event("big", at(2025, 6, 2, 9), 120, "staff", 3),
        event("small", at(2025, 6, 3, 9), 120, "staff", 1),
    ];
    let without = solve(&workspace(pool(2, "staff"), events.clone()));
    let with = solve(&workspace(pool(3, "staff"), events));

    assert_eq!(without.unmet.len(), 1);
    assert!(with.unmet.is_empty());
    assert!(with.metrics.fairness.stdev <= without.metrics.fairness.stdev);
}

#[test]
fn repair_is_idempotent() {
    let ws = workspace(pool(5, "staff"), daily_events(5, "staff", 3));
    let solver = Solver::new(&ws, SolveOptions::default()).unwrap();
    let solved = solver.solve(&[]).unwrap();
    let once = solver.repair(&solved).unwrap();
    let twice = solver.repair(&once).unwrap();
    assert_eq!(once, solved);
    assert_eq!(twice, once);
}

#[test]
fn repair_moves_a_blocking_assignment_to_close_a_gap() {
    // seul lead possible : lead, déjà pris sur un créneau qui chevauche
    let ws = workspace(
        vec![person("lead", &["staff", "lead"]), person("helper", &["staff"])],
        vec![
            event("desk", at(2025, 6, 2, 9), 120, "staff", 1),
            event("briefing", at(2025, 6, 2, 10), 120, "lead", 1),
        ],
    );
    let solver = Solver::new(&ws, SolveOptions::default()).unwrap();
    let start = solver.finalize(vec![Assignment::new(
        EventId::new("desk"),
        PersonId::new("lead"),
        "staff",
    )]);
    assert_eq!(start.unmet.len(), 1);

    let repaired = solver.repair(&start).unwrap();
    assert!(repaired.unmet.is_empty());
    assert_eq!(repaired.metrics.hard_violations, 0);
    let holder = |event: &str| {
        repaired
            .assignments
            .iter()
            .find(|a| a.event_id.as_str() == event)
            .map(|a| a.person_id.as_str().to_string())
            .unwrap()
    };
    assert_eq!(holder("briefing"), "lead");
    assert_eq!(holder("desk"), "helper");
}

#[test]
fn exhausted_budget_returns_flagged_partial_solution() {
    let ws = workspace(pool(20, "staff"), daily_events(8, "staff", 7));
    let opts = SolveOptions {
        max_iterations: Some(3),
        ..SolveOptions::default()
    };
    let solution = Solver::new(&ws, opts).unwrap().solve(&[]).unwrap();

    assert!(solution.incomplete);
    assert_eq!(solution.assignments.len(), 3);
    assert!(!solution.unmet.is_empty());
    assert!(solution
        .violations
        .iter()
        .filter(|v| v.kind == ViolationKind::CoverageGap)
        .all(|v| v.message.contains("not attempted")));
}

#[test]
fn infeasible_slot_is_data_not_an_error() {
    let ws = workspace(
        vec![person("solo", &["staff"])],
        vec![event("crowd", at(2025, 6, 2, 9), 60, "staff", 3)],
    );
    let solution = solve(&ws);
    assert_eq!(solution.assignments.len(), 1);
    assert_eq!(solution.unmet[0].shortfall, 2);
    assert_eq!(solution.metrics.health_score, 0);
}

#[test]
fn malformed_workspace_fails_before_solving() {
    let ws = workspace(
        vec![person("a", &["staff"])],
        vec![event("e", at(2025, 6, 2, 9), 60, "pilot", 1)],
    );
    let err = Solver::new(&ws, SolveOptions::default()).unwrap_err();
    assert!(matches!(err, LoadError::UndefinedRole { .. }));

    let dup = workspace(
        vec![person("a", &["staff"]), person("a", &["staff"])],
        Vec::new(),
    );
    assert!(matches!(
        Solver::new(&dup, SolveOptions::default()),
        Err(LoadError::DuplicatePerson(_))
    ));
}

#[test]
fn inconsistent_locked_input_is_rejected() {
    let ws = workspace(pool(3, "staff"), daily_events(1, "staff", 1));
    let solver = Solver::new(&ws, SolveOptions::default()).unwrap();
    let e = ws.events[0].id.clone();
    let locked = vec![
        Assignment::new(e.clone(), PersonId::new("p01"), "staff").locked(),
        Assignment::new(e, PersonId::new("p02"), "staff").locked(),
    ];
    let err = solver.solve(&locked).unwrap_err();
    assert!(matches!(
        err,
        SchedError::Load(LoadError::LockedOverCapacity { .. })
    ));
}
