use std::fmt;

use chrono::{DateTime, Duration, Utc};
use storage::repository::{MasteryRepository, Storage, TestSummaryRepository};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tutor_core::difficulty::DifficultyLevel;
use tutor_core::mastery::MasteryPercentage;
use tutor_core::model::{TestSessionSummary, TopicId, TopicMasteryRecord, UserId};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user_id: UserId,
    topics: u32,
    summaries: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidCount { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user-id value: {raw}"),
            ArgsError::InvalidCount { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn parse_count(flag: &'static str, value: String) -> Result<u32, ArgsError> {
    value
        .parse::<u32>()
        .map_err(|_| ArgsError::InvalidCount { flag, raw: value })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("TUTOR_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3?mode=rwc".into());
        let mut user_id = std::env::var("TUTOR_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok())
            .unwrap_or_else(|| UserId::new(1));
        let mut topics = env_u32("TUTOR_TOPICS", 6);
        let mut summaries = env_u32("TUTOR_SUMMARIES", 3);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user-id" => {
                    let value = require_value(&mut args, "--user-id")?;
                    user_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                }
                "--topics" => {
                    topics = parse_count("--topics", require_value(&mut args, "--topics")?)?;
                }
                "--summaries" => {
                    summaries =
                        parse_count("--summaries", require_value(&mut args, "--summaries")?)?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            topics,
            summaries,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3?mode=rwc)");
    eprintln!("  --user-id <id>            Learner to seed (default: 1)");
    eprintln!("  --topics <n>              Topics with mastery records (default: 6)");
    eprintln!("  --summaries <n>           Completed tests to append (default: 3)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  TUTOR_DB_URL, TUTOR_USER_ID, TUTOR_TOPICS, TUTOR_SUMMARIES, RUST_LOG");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Two observations per topic so seeded records show a blended value.
const SAMPLES: [(u8, u8); 4] = [(92, 85), (40, 70), (20, 35), (0, 0)];

/// Topic ids `1..=count`, each paired with the next sample, wrapping around.
fn topic_samples(count: u32) -> impl Iterator<Item = (TopicId, u8, u8)> {
    (1..=count)
        .zip(SAMPLES.iter().copied().cycle())
        .map(|(id, (first, second))| (TopicId::new(u64::from(id)), first, second))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    for (topic_id, first, second) in topic_samples(args.topics) {
        let existing = storage.mastery.get_mastery(args.user_id, topic_id).await?;

        let record = TopicMasteryRecord::observe(
            existing.as_ref(),
            args.user_id,
            topic_id,
            MasteryPercentage::try_new(first)?,
            now - Duration::days(1),
        )
        .blend(MasteryPercentage::try_new(second)?, now);

        storage.mastery.upsert_mastery(&record).await?;
        info!(
            topic = %topic_id,
            progress = %record.progress(),
            label = %record.label(),
            "seeded topic mastery"
        );
    }

    for i in 0..args.summaries {
        let started_at = now - Duration::days(i64::from(i) * 2) - Duration::minutes(10);
        let completed_at = started_at + Duration::minutes(6);
        let summary = TestSessionSummary::from_persisted(
            args.user_id,
            started_at,
            completed_at,
            8,
            5,
            DifficultyLevel::MEDIUM,
            DifficultyLevel::HARD,
        )?;
        let id = storage.test_summaries.append_summary(&summary).await?;
        info!(summary_id = id, "seeded test summary");
    }

    println!(
        "Seeded user {} with {} topics and {} test summaries into {}",
        args.user_id, args.topics, args.summaries, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
