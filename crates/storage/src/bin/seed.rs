use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use storage::repository::Storage;
use surge_core::model::{Chapter, ChapterId, ChapterProgress, Module, ModuleId, StudentId};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    modules: u32,
    chapters: u32,
    student: Option<StudentId>,
    unlock: bool,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidModules { raw: String },
    InvalidChapters { raw: String },
    InvalidStudent { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidModules { raw } => write!(f, "invalid --modules value: {raw}"),
            ArgsError::InvalidChapters { raw } => write!(f, "invalid --chapters value: {raw}"),
            ArgsError::InvalidStudent { raw } => {
                write!(f, "invalid --student value (expected UUID): {raw}")
            }
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
            std::env::var("SURGE_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut modules = std::env::var("SURGE_SEED_MODULES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(2);
        let mut chapters = std::env::var("SURGE_SEED_CHAPTERS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);
        let mut student: Option<StudentId> = None;
        let mut unlock = false;
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
                "--modules" => {
                    let value = require_value(&mut args, "--modules")?;
                    modules = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidModules { raw: value.clone() })?;
                }
                "--chapters" => {
                    let value = require_value(&mut args, "--chapters")?;
                    chapters = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidChapters { raw: value.clone() })?;
                }
                "--student" => {
                    let value = require_value(&mut args, "--student")?;
                    let parsed = StudentId::from_str(&value)
                        .map_err(|_| ArgsError::InvalidStudent { raw: value.clone() })?;
                    student = Some(parsed);
                }
                "--unlock" => {
                    unlock = true;
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
            modules,
            chapters,
            student,
            unlock,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>   SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --modules <n>       Number of modules to create (default: 2)");
    eprintln!("  --chapters <n>      Chapters per module (default: 3)");
    eprintln!("  --student <uuid>    Also create progress records for this student");
    eprintln!("  --unlock            Mark the student's seeded chapters complete");
    eprintln!("  --now <rfc3339>     Fixed current time for deterministic seeding");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  SURGE_DB_URL, SURGE_SEED_MODULES, SURGE_SEED_CHAPTERS");
}

const MODULE_TITLES: [&str; 4] = [
    "Founding Mindset",
    "Spotting Opportunities",
    "Building Resilience",
    "Leading a Venture",
];

const CHAPTER_TITLES: [&str; 4] = [
    "Why this matters",
    "Stories from the field",
    "Your turn to reflect",
    "Putting it into practice",
];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let mut progress_records = 0_u32;
    for m in 0..args.modules {
        let title = MODULE_TITLES[(m as usize) % MODULE_TITLES.len()];
        let module = Module::new(ModuleId::new(), title)?;
        storage.modules.insert_module(&module).await?;

        for c in 0..args.chapters {
            let chapter_title = CHAPTER_TITLES[(c as usize) % CHAPTER_TITLES.len()];
            // The last chapter of every module carries the reflective AI chat.
            let ai_enabled = c + 1 == args.chapters;
            let chapter = Chapter::new(
                ChapterId::new(),
                module.id(),
                chapter_title,
                c,
                ai_enabled,
            )?;
            storage.modules.insert_chapter(&chapter).await?;

            if let Some(student) = args.student {
                let mut progress = ChapterProgress::locked(student, module.id(), chapter.id());
                if args.unlock {
                    progress.mark_complete(now);
                }
                storage.progress.upsert_progress(&progress).await?;
                progress_records += 1;
            }
        }
    }

    println!(
        "Seeded {} modules x {} chapters ({} progress records) into {}",
        args.modules, args.chapters, progress_records, args.db_url
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
