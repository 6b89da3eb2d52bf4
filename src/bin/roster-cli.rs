#![forbid(unsafe_code)]
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use roster_solver::{
    io::{self, SolutionBundle},
    model::{Assignment, EventId, PersonId},
    scheduler::{Edit, SolveOptions, Solver},
    storage::{JsonStorage, Storage},
    template,
};
use std::collections::BTreeSet;
use std::time::Duration;
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// CLI du solveur de rosters (workspace JSON local)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Fichier JSON du workspace
    #[arg(long, global = true, default_value = "workspace.json")]
    workspace: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Charger et valider le workspace
    Check,

    /// Importer des personnes depuis un CSV
    ImportPeople {
        #[arg(long)]
        csv: String,
    },

    /// Ajouter les événements générés par un template
    Generate {
        #[arg(long)]
        template: String,
        /// YYYY-MM-DD
        #[arg(long)]
        from: String,
        /// YYYY-MM-DD (inclus)
        #[arg(long)]
        to: String,
    },

    /// Résoudre et exporter
    Solve {
        /// Bundle dont les affectations verrouillées sont conservées
        #[arg(long)]
        locked: Option<String>,
        #[arg(long)]
        out_json: Option<String>,
        #[arg(long)]
        out_csv: Option<String>,
        #[arg(long)]
        out_ics: Option<String>,
        #[arg(long)]
        out_metrics: Option<String>,
        #[arg(long)]
        max_iterations: Option<usize>,
        #[arg(long)]
        time_budget_ms: Option<u64>,
        #[arg(long)]
        repair_threshold: Option<f64>,
    },

    /// Valider des éditions (les retraits sont appliqués avant les ajouts)
    ValidateEdit {
        #[arg(long)]
        solution: String,
        /// EVENT:PERSON:ROLE
        #[arg(long)]
        assign: Vec<String>,
        /// EVENT:PERSON:ROLE
        #[arg(long)]
        unassign: Vec<String>,
    },

    /// Suggestions pour une violation d'une solution
    Suggest {
        #[arg(long)]
        solution: String,
        /// Index dans la liste `violations` du bundle
        #[arg(long)]
        violation: usize,
    },
}

fn parse_slot(raw: &str) -> Result<(EventId, PersonId, String)> {
    let mut parts = raw.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(e), Some(p), Some(r)) if !e.is_empty() && !p.is_empty() && !r.is_empty() => {
            Ok((EventId::new(e), PersonId::new(p), r.to_string()))
        }
        _ => bail!("expected EVENT:PERSON:ROLE, got {raw}"),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("invalid date: {raw}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let storage = JsonStorage::open(&cli.workspace)?;

    let code = match cli.cmd {
        Commands::Check => {
            let ws = storage.load()?;
            Solver::new(&ws, SolveOptions::default())?;
            println!(
                "OK: {} people, {} events, {} constraints",
                ws.people.len(),
                ws.events.len(),
                ws.constraints.len()
            );
            0
        }
        Commands::ImportPeople { csv } => {
            let mut ws = storage.load_or_default()?;
            let people = io::import_people_csv(csv)?;
            println!(
                "Imported {} people into {}",
                people.len(),
                storage.path().display()
            );
            ws.people.extend(people);
            storage.save(&ws)?;
            0
        }
        Commands::Generate {
            template: path,
            from,
            to,
        } => {
            let mut ws = storage.load_or_default()?;
            let tpl = template::load_template_from_file(&path)?;
            let events = template::generate_events(&tpl, parse_date(&from)?, parse_date(&to)?)?;
            let known: BTreeSet<EventId> = ws.events.iter().map(|e| e.id.clone()).collect();
            let fresh: Vec<_> = events.into_iter().filter(|e| !known.contains(&e.id)).collect();
            println!("Generated {} event(s) from template {}", fresh.len(), tpl.id);
            ws.events.extend(fresh);
            storage.save(&ws)?;
            0
        }
        Commands::Solve {
            locked,
            out_json,
            out_csv,
            out_ics,
            out_metrics,
            max_iterations,
            time_budget_ms,
            repair_threshold,
        } => {
            let ws = storage.load()?;
            let mut opts = SolveOptions {
                max_iterations,
                time_budget: time_budget_ms.map(Duration::from_millis),
                ..SolveOptions::default()
            };
            if let Some(t) = repair_threshold {
                opts.repair_threshold = t;
            }
            let seed: Vec<Assignment> = match locked {
                Some(path) => io::load_bundle(path)?
                    .assignments
                    .into_iter()
                    .filter(|a| a.locked)
                    .collect(),
                None => Vec::new(),
            };
            let solver = Solver::new(&ws, opts)?;
            let solution = solver.with_suggestions(&solver.solve(&seed)?);
            let now = Utc::now();

            if let Some(path) = out_json {
                io::write_bundle_json(path, &SolutionBundle::new(&solution, now))?;
            }
            if let Some(path) = out_csv {
                io::write_assignments_csv(path, &ws, &solution)?;
            }
            if let Some(path) = out_ics {
                io::write_ics(path, &ws, &solution, now)?;
            }
            if let Some(path) = out_metrics {
                io::write_metrics_json(path, &solution.metrics)?;
            }

            println!(
                "assignments: {} | unmet: {} | hard violations: {} | health: {}{}",
                solution.assignments.len(),
                solution.unmet.len(),
                solution.metrics.hard_violations,
                solution.metrics.health_score,
                if solution.metrics.health_provisional {
                    " (provisional)"
                } else {
                    ""
                }
            );
            for v in solution.hard_violations() {
                eprintln!("[{}] {}", v.kind.as_str(), v.message);
            }
            if solution.incomplete || solution.metrics.hard_violations > 0 {
                // Code 2 = WARNING/INCOMPLETE
                2
            } else {
                0
            }
        }
        Commands::ValidateEdit {
            solution,
            assign,
            unassign,
        } => {
            let ws = storage.load()?;
            let current = io::load_bundle(solution)?.into_solution();
            let mut edits = Vec::new();
            for raw in &unassign {
                let (event_id, person_id, role) = parse_slot(raw)?;
                edits.push(Edit::Unassign {
                    event_id,
                    person_id,
                    role,
                });
            }
            for raw in &assign {
                let (event_id, person_id, role) = parse_slot(raw)?;
                edits.push(Edit::Assign(Assignment::new(event_id, person_id, role)));
            }
            let solver = Solver::new(&ws, SolveOptions::default())?;
            let validation = solver.validate(&current, &edits)?;
            println!("{}", serde_json::to_string_pretty(&validation)?);
            if validation.is_valid {
                0
            } else {
                2
            }
        }
        Commands::Suggest {
            solution,
            violation,
        } => {
            let ws = storage.load()?;
            let current = io::load_bundle(solution)?.into_solution();
            let target = current
                .violations
                .get(violation)
                .with_context(|| format!("no violation at index {violation}"))?;
            let solver = Solver::new(&ws, SolveOptions::default())?;
            let suggestions = solver.suggest(&current, target);
            println!("{}", serde_json::to_string_pretty(&suggestions)?);
            0
        }
    };

    std::process::exit(code);
}
