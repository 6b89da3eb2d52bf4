#![forbid(unsafe_code)]
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use roster_solver::model::RoleRequirement;
use roster_solver::template::export_template_json;
use roster_solver::{generate_events, load_template_from_file, EventSlot, Template};
use tempfile::tempdir;

fn slot(event_type: &str, start: u32, end: u32, days: Vec<u8>) -> EventSlot {
    EventSlot {
        event_type: event_type.into(),
        start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
        days,
        requirements: vec![RoleRequirement::new("oncall", 1)],
        resource: None,
        teams: Vec::new(),
        allow_multi_role: false,
    }
}

fn sample_template() -> Template {
    Template {
        id: "weekend-2p".into(),
        name: "Week-end 2 personnes".into(),
        description: Some("Rotation week-end".into()),
        rotation_cycle_days: 7,
        slots: vec![
            slot("night", 18, 9, vec![6, 7]),
            EventSlot {
                requirements: vec![
                    RoleRequirement::new("oncall", 1),
                    RoleRequirement::new("backup", 1),
                ],
                ..slot("day", 9, 18, vec![6, 7])
            },
        ],
    }
}

#[test]
fn save_and_load_template_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("weekend.json");
    let template = sample_template();
    export_template_json(&path, &template).unwrap();

    let loaded = load_template_from_file(&path).unwrap();
    assert_eq!(loaded.id, template.id);
    assert_eq!(loaded.slots.len(), template.slots.len());
}

#[test]
fn generate_events_from_template() {
    let template = sample_template();
    let start = NaiveDate::from_ymd_opt(2025, 10, 24).unwrap(); // vendredi
    let end = NaiveDate::from_ymd_opt(2025, 10, 28).unwrap(); // mardi

    let events = generate_events(&template, start, end).unwrap();
    let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "day-2025-10-25",
            "night-2025-10-25",
            "day-2025-10-26",
            "night-2025-10-26"
        ]
    );

    let night = &events[1];
    assert_eq!(night.start, Utc.with_ymd_and_hms(2025, 10, 25, 18, 0, 0).unwrap());
    assert_eq!(night.end(), Utc.with_ymd_and_hms(2025, 10, 26, 9, 0, 0).unwrap());
    assert_eq!(events[0].required("backup"), 1);
    assert_eq!(night.required("backup"), 0);
}

#[test]
fn cycle_days_repeat_from_the_start_date() {
    let template = Template {
        rotation_cycle_days: 2,
        slots: vec![slot("watch", 8, 20, vec![8])],
        ..sample_template()
    };
    let start = NaiveDate::from_ymd_opt(2025, 10, 27).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 11, 2).unwrap();
    let events = generate_events(&template, start, end).unwrap();
    let days: Vec<String> = events.iter().map(|e| e.date().to_string()).collect();
    assert_eq!(days, ["2025-10-27", "2025-10-29", "2025-10-31", "2025-11-02"]);
}

#[test]
fn same_type_twice_a_day_is_rejected() {
    let template = Template {
        slots: vec![slot("night", 18, 22, vec![1]), slot("night", 22, 6, vec![1, 2])],
        ..sample_template()
    };
    assert!(template.validate().is_err());
}

#[test]
fn weekday_and_cycle_day_on_the_same_date_are_rejected() {
    let template = Template {
        slots: vec![slot("watch", 8, 12, vec![1]), slot("watch", 14, 18, vec![8])],
        ..sample_template()
    };
    assert!(template.validate().is_ok());

    // le 27/10/2025 est un lundi et le premier jour du cycle
    let monday = NaiveDate::from_ymd_opt(2025, 10, 27).unwrap();
    let err = generate_events(&template, monday, monday).unwrap_err();
    assert!(err.to_string().contains("watch-2025-10-27"), "{err}");

    // départ un mardi : aucun lundi dans la période, le jour 8 tombe le mardi
    let tuesday = NaiveDate::from_ymd_opt(2025, 10, 28).unwrap();
    let sunday = NaiveDate::from_ymd_opt(2025, 11, 2).unwrap();
    assert_eq!(generate_events(&template, tuesday, sunday).unwrap().len(), 1);
}

#[test]
fn resource_slots_must_not_overlap() {
    let mut a = slot("desk-am", 8, 13, vec![1]);
    a.resource = Some("desk".into());
    let mut b = slot("desk-mid", 12, 16, vec![1]);
    b.resource = Some("desk".into());
    let template = Template {
        slots: vec![a, b],
        ..sample_template()
    };
    assert!(template.validate().is_err());
}

#[test]
fn reversed_range_is_rejected() {
    let template = sample_template();
    let start = NaiveDate::from_ymd_opt(2025, 10, 28).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 10, 24).unwrap();
    assert!(generate_events(&template, start, end).is_err());
}
