use std::fmt;

use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{Difficulty, Question, QuestionId, SubjectId, Test, TestId};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    test_id: Option<TestId>,
    subject_id: Option<SubjectId>,
    title: String,
    questions: u32,
    time_limit: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidTestId { raw: String },
    InvalidSubjectId { raw: String },
    InvalidQuestions { raw: String },
    InvalidTimeLimit { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidTestId { raw } => write!(f, "invalid --test-id value: {raw}"),
            ArgsError::InvalidSubjectId { raw } => write!(f, "invalid --subject-id value: {raw}"),
            ArgsError::InvalidQuestions { raw } => write!(f, "invalid --questions value: {raw}"),
            ArgsError::InvalidTimeLimit { raw } => write!(f, "invalid --time-limit value: {raw}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut test_id = None;
        let mut subject_id = None;
        let mut title = std::env::var("QUIZ_TEST_TITLE").unwrap_or_else(|_| "Algebra".into());
        let mut questions = std::env::var("QUIZ_QUESTIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(5);
        let mut time_limit = std::env::var("QUIZ_TIME_LIMIT")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(10);
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
                "--test-id" => {
                    let value = require_value(&mut args, "--test-id")?;
                    test_id = Some(
                        value
                            .parse::<TestId>()
                            .map_err(|_| ArgsError::InvalidTestId { raw: value })?,
                    );
                }
                "--subject-id" => {
                    let value = require_value(&mut args, "--subject-id")?;
                    subject_id = Some(
                        value
                            .parse::<SubjectId>()
                            .map_err(|_| ArgsError::InvalidSubjectId { raw: value })?,
                    );
                }
                "--title" => {
                    title = require_value(&mut args, "--title")?;
                }
                "--questions" => {
                    let value = require_value(&mut args, "--questions")?;
                    questions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidQuestions { raw: value })?;
                }
                "--time-limit" => {
                    let value = require_value(&mut args, "--time-limit")?;
                    time_limit = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidTimeLimit { raw: value })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    now = Some(
                        DateTime::parse_from_rfc3339(&value)
                            .map_err(|_| ArgsError::InvalidNow { raw: value })?
                            .with_timezone(&Utc),
                    );
                }
                "-h" | "--help" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            test_id,
            subject_id,
            title,
            questions,
            time_limit,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --test-id <uuid>          Test id to upsert (default: random)");
    eprintln!("  --subject-id <uuid>       Owning subject id (default: random)");
    eprintln!("  --title <name>            Test title (default: Algebra)");
    eprintln!("  --questions <n>           Number of sample questions (default: 5)");
    eprintln!("  --time-limit <minutes>    Time limit in minutes (default: 10)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL, QUIZ_TEST_TITLE, QUIZ_QUESTIONS, QUIZ_TIME_LIMIT");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let test_id = args.test_id.unwrap_or_else(TestId::generate);
    let subject_id = args.subject_id.unwrap_or_else(SubjectId::generate);
    let test = Test::new(
        test_id,
        subject_id,
        args.title.clone(),
        Some("Seeded sample test".into()),
        Difficulty::Medium,
        args.time_limit,
        args.questions,
        now,
    )?;
    storage.tests.upsert_test(&test).await?;

    let samples = [
        ("What is 7 x 8?", ["54", "56", "58", "64"], 1),
        ("What is 12 / 4?", ["2", "3", "4", "6"], 1),
        ("What is 9 + 15?", ["21", "23", "24", "26"], 2),
        ("What is 100 - 37?", ["63", "67", "73", "77"], 0),
        ("What is 5^2?", ["10", "20", "25", "52"], 2),
    ];
    for i in 0..args.questions {
        let (prompt, options, correct) = samples[(i as usize) % samples.len()];
        let question = Question::new(
            QuestionId::generate(),
            test_id,
            prompt,
            options.iter().map(|o| (*o).to_string()).collect(),
            correct,
            None,
            // stagger creation times so the fetch order is stable
            now + Duration::seconds(i64::from(i)),
        )?;
        storage.questions.upsert_question(&question).await?;
    }

    println!(
        "Seeded test {} ({} questions, {} minute limit) into {}",
        test_id, args.questions, args.time_limit, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
