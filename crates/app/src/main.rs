use std::fmt;

use course_core::format_time;
use course_core::model::{
    ActivityKind, ChapterId, ParseIdError, QuizFilter, QuizId, QuizPatch, SubjectKey,
};
use services::{AppServices, Clock, ProgressService, StudySession};

mod config;
mod logging;

use config::Database;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidId(ParseIdError),
    InvalidNumber { name: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidId(err) => write!(f, "{err}"),
            ArgsError::InvalidNumber { name, raw } => write!(f, "invalid <{name}> value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<ParseIdError> for ArgsError {
    fn from(err: ParseIdError) -> Self {
        Self::InvalidId(err)
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app [--db <sqlite_url>] summary");
    eprintln!("  app [--db <sqlite_url>] study <subject> <chapter> <seconds>");
    eprintln!("  app [--db <sqlite_url>] complete <subject> <chapter>");
    eprintln!("  app [--db <sqlite_url>] reopen <subject> <chapter>");
    eprintln!("  app [--db <sqlite_url>] quiz <subject> <quiz> <score>");
    eprintln!("  app [--db <sqlite_url>] quizzes [--query <text>] [--subject <subject>]");
    eprintln!("  app [--db <sqlite_url>] reset");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {}", config::DEFAULT_DB_FILE);
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {}, {}", config::DB_ENV, logging::LOG_ENV);
}

#[derive(Debug)]
enum Command {
    Summary,
    Study {
        subject: SubjectKey,
        chapter: ChapterId,
        seconds: u64,
    },
    SetCompleted {
        subject: SubjectKey,
        chapter: ChapterId,
        completed: bool,
    },
    Quiz {
        subject: SubjectKey,
        quiz: QuizId,
        score: u8,
    },
    Quizzes(QuizFilter),
    Reset,
}

struct Args {
    database: Database,
    command: Command,
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn positional(positionals: &[String], index: usize, name: &'static str) -> Result<String, ArgsError> {
    positionals
        .get(index)
        .cloned()
        .ok_or(ArgsError::MissingArgument { name })
}

fn number<T: std::str::FromStr>(raw: String, name: &'static str) -> Result<T, ArgsError> {
    raw.parse()
        .map_err(|_| ArgsError::InvalidNumber { name, raw })
}

impl Args {
    /// Returns `None` when help was requested.
    fn parse(argv: impl IntoIterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut database = Database::from_env();
        let mut query = None;
        let mut subject_filter = None;
        let mut positionals = Vec::new();

        let mut iter = argv.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut iter, "--db")?;
                    database = Database::parse(&value)
                        .ok_or(ArgsError::InvalidDbUrl { raw: value })?;
                }
                "--query" => query = Some(require_value(&mut iter, "--query")?),
                "--subject" => {
                    let value = require_value(&mut iter, "--subject")?;
                    subject_filter = Some(value.parse::<SubjectKey>()?);
                }
                "--help" | "-h" => return Ok(None),
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positionals.push(arg),
            }
        }

        let (name, rest) = match positionals.split_first() {
            None => ("summary", &[][..]),
            Some((first, rest)) => (first.as_str(), rest),
        };
        let arity = match name {
            "summary" | "reset" | "quizzes" => 0,
            "complete" | "reopen" => 2,
            _ => 3,
        };
        if let Some(extra) = rest.get(arity) {
            return Err(ArgsError::UnknownArg(extra.clone()));
        }

        let command = match name {
            "summary" => Command::Summary,
            "reset" => Command::Reset,
            "quizzes" => Command::Quizzes(QuizFilter {
                query,
                subject: subject_filter,
            }),
            "study" => Command::Study {
                subject: positional(rest, 0, "subject")?.parse()?,
                chapter: positional(rest, 1, "chapter")?.parse()?,
                seconds: number(positional(rest, 2, "seconds")?, "seconds")?,
            },
            "complete" | "reopen" => Command::SetCompleted {
                subject: positional(rest, 0, "subject")?.parse()?,
                chapter: positional(rest, 1, "chapter")?.parse()?,
                completed: name == "complete",
            },
            "quiz" => Command::Quiz {
                subject: positional(rest, 0, "subject")?.parse()?,
                quiz: positional(rest, 1, "quiz")?.parse()?,
                score: number(positional(rest, 2, "score")?, "score")?,
            },
            other => return Err(ArgsError::UnknownCommand(other.to_string())),
        };

        Ok(Some(Self { database, command }))
    }
}

fn print_summary(progress: &ProgressService) {
    let snapshot = progress.snapshot();
    println!("Overall progress: {}%", progress.overall_progress());
    println!("Total time: {}", format_time(progress.total_time_spent()));
    println!("Streak: {} day(s)", progress.streak_days());

    for (key, subject) in &snapshot.subjects {
        let done = subject
            .chapters_progress
            .values()
            .filter(|c| c.completed)
            .count();
        println!(
            "  {key:<18} {:>3}%  {}  chapters {done}/{}  quizzes {}",
            subject.overall_progress,
            format_time(subject.time_spent()),
            subject.chapters_progress.len(),
            subject.quizzes_progress.len(),
        );
    }

    let recent = progress.recent_activities(5);
    if !recent.is_empty() {
        println!("Recent activity:");
        for event in recent {
            let kind = match event.kind {
                ActivityKind::Chapter => "chapter",
                ActivityKind::Quiz => "quiz",
            };
            println!(
                "  {}  {kind:<7} {}/{}",
                event.timestamp.format("%Y-%m-%d %H:%M"),
                event.subject,
                event.id
            );
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let Some(args) = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?
    else {
        print_usage();
        return Ok(());
    };

    let db_url = args.database.into_url()?;
    let app = AppServices::new_sqlite(&db_url, Clock::system()).await?;
    let progress = app.progress();
    tracing::debug!(db = %db_url, "services ready");

    match args.command {
        Command::Summary => print_summary(&progress),
        Command::Study {
            subject,
            chapter,
            seconds,
        } => {
            let session = StudySession::open(progress, subject, chapter);
            if session.is_paused() {
                println!("{} is completed; study time is not counted.", session.chapter());
            }
            session.tick(std::time::Duration::from_secs(seconds));
            let record = session.close().await;
            println!("Time spent: {}", format_time(record.time_spent));
        }
        Command::SetCompleted {
            subject,
            chapter,
            completed,
        } => {
            let record = progress
                .set_chapter_completed(&subject, &chapter, completed)
                .await;
            println!(
                "{subject}/{chapter}: {} ({})",
                if record.completed { "completed" } else { "in progress" },
                format_time(record.time_spent)
            );
        }
        Command::Quiz {
            subject,
            quiz,
            score,
        } => {
            let record = progress
                .update_quiz_progress(&subject, &quiz, QuizPatch::attempt(score))
                .await?;
            println!("{subject}/{quiz}: best score {}%", record.score);
        }
        Command::Quizzes(filter) => {
            let listings = app.catalogue().search_with_progress(&filter, &progress);
            if listings.is_empty() {
                println!("No quiz matches.");
            }
            for listing in listings {
                let status = listing
                    .progress
                    .filter(|p| p.completed)
                    .map_or_else(|| "-".to_string(), |p| format!("{}%", p.score));
                println!(
                    "  {:<22} {:<18} {:>2} questions  {status:>4}  {}",
                    listing.entry.id,
                    listing.entry.subject,
                    listing.entry.question_count,
                    listing.entry.title
                );
            }
        }
        Command::Reset => {
            progress.reset_all().await;
            println!("Progress reset.");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    logging::init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
