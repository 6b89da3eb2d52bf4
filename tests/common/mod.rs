#![allow(dead_code)]
use chrono::{DateTime, Duration, TimeZone, Utc};
use roster_solver::model::{Event, Person, Unavailability, Workspace};

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn person(id: &str, roles: &[&str]) -> Person {
    Person::new(id, id.to_uppercase()).with_roles(roles.iter().copied())
}

pub fn unavailable(p: Person, start: DateTime<Utc>, end: DateTime<Utc>) -> Person {
    p.with_unavailability(Unavailability::new(start, end).unwrap())
}

/// Événement d'un rôle unique.
pub fn event(id: &str, start: DateTime<Utc>, minutes: u32, role: &str, count: u32) -> Event {
    Event::new(id, "shift", start, minutes).with_requirement(role, count)
}

/// `n` personnes `p01..pNN` qualifiées pour `role`.
pub fn pool(n: usize, role: &str) -> Vec<Person> {
    (1..=n).map(|i| person(&format!("p{i:02}"), &[role])).collect()
}

/// `n` événements journaliers de 4h à 9h UTC à partir du 2 juin 2025, chacun exigeant `count` × `role`.
pub fn daily_events(n: u32, role: &str, count: u32) -> Vec<Event> {
    (0..n)
        .map(|i| {
            let start = at(2025, 6, 2, 9) + Duration::days(i64::from(i));
            event(
                &format!("day-{}", start.format("%Y-%m-%d")),
                start,
                240,
                role,
                count,
            )
        })
        .collect()
}

pub fn workspace(people: Vec<Person>, events: Vec<Event>) -> Workspace {
    Workspace {
        people,
        events,
        ..Workspace::default()
    }
}
