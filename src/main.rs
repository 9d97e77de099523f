use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;

use progress_analytics::anomaly::{detect_anomalies_with, detect_goal_anomalies};
use progress_analytics::compare::{
    calculate_goal_summaries, calculate_skill_area_summaries, calculate_student_comparisons_with,
    rank_students,
};
use progress_analytics::config::AnalyticsConfig;
use progress_analytics::forecast::{predict_future_values, project_dates};
use progress_analytics::models::{Anomaly, DatedForecast, GoalSummary, ProgressLog};
use progress_analytics::snapshot::Snapshot;
use progress_analytics::summary::generate_summary;
use progress_analytics::timeseries::{
    calculate_moving_average, generate_time_series_data, generate_time_series_ending_today,
};
use progress_analytics::trend::NumericSeries;
use progress_analytics::{db, logging, report};

#[derive(Parser)]
#[command(name = "progress-analytics")]
#[command(about = "Progress analytics for special-education goal tracking", long_about = None)]
#[command(group(
    ArgGroup::new("source")
        .args(["snapshot", "csv_dir"])
        .multiple(false)
))]
struct Cli {
    /// JSON snapshot with `students`, `goals` and `logs` arrays
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,
    /// Directory holding students.csv, goals.csv and logs.csv
    #[arg(long, global = true)]
    csv_dir: Option<PathBuf>,
    /// TOML file overriding analytics thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Restrict every computation to one student
    #[arg(long, global = true)]
    student: Option<String>,
    /// Only read logs from the last N days (database source only)
    #[arg(long, global = true)]
    since_days: Option<i64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dashboard roll-up: on-track, completion and data quality
    Summary {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Per-student comparison rows
    Compare {
        /// Print top performers and struggling students instead of all rows
        #[arg(long)]
        rank: Option<usize>,
    },
    /// Statistics and trend per skill area
    Areas,
    /// Trend, forecast and anomalies for a single goal
    Goal {
        #[arg(long)]
        id: String,
        #[arg(long, default_value_t = 5)]
        forecast: usize,
        #[arg(long, default_value_t = 7)]
        cadence_days: i64,
    },
    /// Daily averages with a moving average, across all goals unless one is named
    Timeseries {
        #[arg(long)]
        goal: Option<String>,
        #[arg(long, default_value_t = 30)]
        days: usize,
        #[arg(long, default_value_t = 7)]
        window: usize,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Statistically unusual observations per goal
    Anomalies,
    /// Generate a markdown report
    Report {
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GoalDetail<'a> {
    summary: &'a GoalSummary,
    forecast: Vec<DatedForecast>,
    anomalies: Vec<Anomaly>,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

async fn load_snapshot(cli: &Cli) -> anyhow::Result<Snapshot> {
    let snapshot = if let Some(path) = &cli.snapshot {
        Snapshot::from_json_path(path)?
    } else if let Some(dir) = &cli.csv_dir {
        Snapshot::from_csv_dir(dir)?
    } else {
        let database_url = std::env::var("DATABASE_URL").context(
            "DATABASE_URL must be set when neither --snapshot nor --csv-dir is given",
        )?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .context("failed to connect to Postgres")?;
        let since = cli
            .since_days
            .and_then(|days| Duration::try_days(days.max(1)))
            .and_then(|span| today().checked_sub_signed(span));
        db::fetch_snapshot(&pool, cli.student.as_deref(), since).await?
    };

    Ok(match &cli.student {
        Some(student_id) => snapshot.scoped_to_student(student_id),
        None => snapshot,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging("info")?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AnalyticsConfig::load(path)?,
        None => AnalyticsConfig::default(),
    };
    let snapshot = load_snapshot(&cli).await?;
    let Snapshot {
        students,
        goals,
        logs,
        ..
    } = &snapshot;

    match cli.command {
        Commands::Summary { as_of } => {
            let as_of = as_of.unwrap_or_else(today);
            print_json(&generate_summary(students, goals, logs, as_of, &config))?;
        }
        Commands::Compare { rank } => {
            let rows = calculate_student_comparisons_with(students, goals, logs, &config.trend);
            match rank {
                Some(limit) => print_json(&rank_students(
                    &rows,
                    limit,
                    config.summary.struggling_threshold,
                ))?,
                None => print_json(&rows)?,
            }
        }
        Commands::Areas => {
            print_json(&calculate_skill_area_summaries(goals, logs, &config.trend))?;
        }
        Commands::Goal {
            id,
            forecast,
            cadence_days,
        } => {
            let goal = goals
                .iter()
                .find(|goal| goal.id == id)
                .with_context(|| format!("no goal with id {id}"))?;
            let history: Vec<ProgressLog> = logs
                .iter()
                .filter(|log| log.goal_id == goal.id)
                .cloned()
                .collect();

            let summaries = calculate_goal_summaries(
                std::slice::from_ref(goal),
                &history,
                &config.trend,
                &config.summary,
            );
            let scores = NumericSeries::from_logs(&history).values();
            let last_date = history.iter().map(|log| log.date).max().unwrap_or_else(today);
            let projected = predict_future_values(&scores, forecast);

            if let Some(summary) = summaries.first() {
                print_json(&GoalDetail {
                    summary,
                    forecast: project_dates(last_date, cadence_days, &projected),
                    anomalies: detect_anomalies_with(&history, &config.anomaly),
                })?;
            }
        }
        Commands::Timeseries {
            goal,
            days,
            window,
            end,
        } => {
            let selected: Vec<ProgressLog> = match &goal {
                Some(goal_id) => logs
                    .iter()
                    .filter(|log| &log.goal_id == goal_id)
                    .cloned()
                    .collect(),
                None => logs.clone(),
            };
            let series = match end {
                Some(end) => generate_time_series_data(&selected, days, end),
                None => generate_time_series_ending_today(&selected, days),
            };
            print_json(&calculate_moving_average(&series, window))?;
        }
        Commands::Anomalies => {
            print_json(&detect_goal_anomalies(goals, logs, &config.anomaly))?;
        }
        Commands::Report { as_of, out } => {
            let as_of = as_of.unwrap_or_else(today);
            let report = report::build_report(cli.student.as_deref(), as_of, &snapshot, &config);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            tracing::info!(path = %out.display(), "Report written");
            println!("Report written to {}.", out.display());
        }
    }

    if !snapshot.rejected.is_empty() {
        tracing::warn!(
            rejected = snapshot.rejected.len(),
            "Some records were skipped as invalid"
        );
    }

    Ok(())
}
