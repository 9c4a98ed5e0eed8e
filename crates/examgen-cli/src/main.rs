mod config;
mod ingest;
mod openai;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use examgen_core::{
    grade, AttemptStore, Difficulty, GenerateRequest, Quiz, QuizGenerator,
};
use examgen_store::SqliteStore;

use crate::config::Config;
use crate::openai::OpenAiModel;

#[derive(Parser)]
#[command(
    name = "examgen",
    version,
    about = "Practice-exam generator grounded in your own document corpus"
)]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load corpus documents for a subject (.txt/.md)
    Ingest {
        /// Subject label the documents belong to
        #[arg(short, long)]
        subject: String,

        /// Directory containing the documents
        dir: PathBuf,
    },

    /// Generate a quiz and save it
    Generate {
        /// Subject to draw questions from
        #[arg(short, long)]
        subject: String,

        /// Number of questions
        #[arg(short = 'n', long, default_value = "8")]
        questions: usize,

        /// Difficulty level
        #[arg(short, long, default_value = "medium")]
        difficulty: CliDifficulty,
    },

    /// Grade answers against a saved quiz and record the attempt
    Submit {
        /// Quiz id as printed by `generate`
        #[arg(short, long)]
        quiz: i64,

        /// Marked answers, e.g. MAT-1-x7k2qf=B,MAT-2-9d31aa=C
        #[arg(short, long)]
        answers: String,
    },

    /// List recent attempts
    History {
        /// Maximum rows
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show the stored feedback for one attempt
    Review {
        /// Attempt id
        attempt_id: i64,
    },

    /// List corpus subjects and chunk counts
    Subjects,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliDifficulty {
    Easy,
    Medium,
    Hard,
}

impl From<CliDifficulty> for Difficulty {
    fn from(val: CliDifficulty) -> Self {
        match val {
            CliDifficulty::Easy => Difficulty::Easy,
            CliDifficulty::Medium => Difficulty::Medium,
            CliDifficulty::Hard => Difficulty::Hard,
        }
    }
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("dev", "examgen", "examgen")
        .map(|dirs| dirs.data_dir().join("examgen.db"))
        .unwrap_or_else(|| PathBuf::from("examgen.db"))
}

fn open_store(db: Option<PathBuf>, config: &Config) -> Result<SqliteStore> {
    let path = db
        .or_else(|| config.store.path.as_ref().map(PathBuf::from))
        .unwrap_or_else(default_db_path);
    SqliteStore::new(&path).context("failed to open database")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config()?;
    let store = open_store(cli.db, &config)?;

    match cli.command {
        Commands::Ingest { subject, dir } => cmd_ingest(&store, &subject, &dir),
        Commands::Generate {
            subject,
            questions,
            difficulty,
        } => cmd_generate(&store, &config, subject, questions, difficulty.into()),
        Commands::Submit { quiz, answers } => cmd_submit(&store, quiz, &answers),
        Commands::History { limit } => cmd_history(&store, limit),
        Commands::Review { attempt_id } => cmd_review(&store, attempt_id),
        Commands::Subjects => cmd_subjects(&store),
    }
}

fn cmd_ingest(store: &SqliteStore, subject: &str, dir: &Path) -> Result<()> {
    let files = ingest::load_directory(dir)?;
    if files.is_empty() {
        bail!("no .txt/.md files in {}", dir.display());
    }

    let mut total = 0;
    for (name, content) in &files {
        let chunks = ingest::split_chunks(content, ingest::CHUNK_SIZE, ingest::CHUNK_OVERLAP);
        let stored = store.add_chunks(subject, name, &chunks)?;
        println!("{name}: {stored} chunks");
        total += stored;
    }

    println!(
        "Ingested {total} chunks for {subject:?} ({} total in partition)",
        store.count_chunks(subject)?
    );
    Ok(())
}

fn cmd_generate(
    store: &SqliteStore,
    config: &Config,
    subject: String,
    n_questions: usize,
    difficulty: Difficulty,
) -> Result<()> {
    if !(3..=30).contains(&n_questions) {
        bail!("--questions must be between 3 and 30");
    }

    let model = OpenAiModel::from_config(&config.model)?;
    let generator = QuizGenerator::new(store, &model).with_limits(
        config.retrieval.top_k,
        config.retrieval.max_context_chars,
    );

    let request = GenerateRequest {
        subject,
        n_questions,
        difficulty,
    };
    let quiz = generator
        .generate(&request)
        .context("quiz generation failed — nothing was saved, try again")?;
    let quiz_id = store.save_quiz(&quiz.subject, &quiz)?;

    println!("Quiz #{quiz_id} — {} ({difficulty})\n", quiz.subject);
    print_quiz(&quiz);
    println!("Submit with: examgen submit --quiz {quiz_id} --answers <id>=<letter>,...");
    Ok(())
}

/// Print the questions without the answer key.
fn print_quiz(quiz: &Quiz) {
    for (i, q) in quiz.questions.iter().enumerate() {
        println!("Question {} [{}]  ({})", i + 1, q.id, q.topic);
        println!("{}", q.stem);
        for (letter, text) in &q.options {
            println!("  {letter}) {text}");
        }
        println!();
    }
}

fn cmd_submit(store: &SqliteStore, quiz_id: i64, answers_spec: &str) -> Result<()> {
    let answers = parse_answers(answers_spec)?;

    let Some(quiz) = store.load_quiz(quiz_id)? else {
        bail!("quiz #{quiz_id} not found");
    };

    let graded = grade(&quiz, &answers);
    let attempt_id = store.save_attempt(quiz_id, &answers, graded.score, &graded.feedback)?;

    println!(
        "Attempt #{attempt_id}: {}/{} correct\n",
        graded.score,
        quiz.questions.len()
    );
    for f in &graded.feedback {
        let marked = f.marked.as_deref().unwrap_or("—");
        if f.is_correct {
            println!("  ✓ {}  ({marked})", f.id);
        } else {
            println!("  ✗ {}  marked {marked}, correct {}", f.id, f.correct);
            println!("      {}", f.explanation);
        }
    }
    Ok(())
}

/// Parse `id=letter` pairs separated by commas. Letters are
/// upper-cased here so the shell input is forgiving; grading itself
/// stays case-sensitive.
fn parse_answers(spec: &str) -> Result<BTreeMap<String, String>> {
    let mut answers = BTreeMap::new();
    for pair in spec.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((id, letter)) = pair.split_once('=') else {
            bail!("malformed answer {pair:?}, expected <question-id>=<letter>");
        };
        answers.insert(id.trim().to_string(), letter.trim().to_uppercase());
    }
    Ok(answers)
}

fn cmd_history(store: &SqliteStore, limit: usize) -> Result<()> {
    let attempts = store.list_attempts(limit)?;
    if attempts.is_empty() {
        println!("No attempts recorded yet.");
        return Ok(());
    }

    for a in &attempts {
        println!(
            "#{:<5} quiz #{:<5} {}  score {:<3} {}",
            a.attempt_id,
            a.quiz_id,
            a.submitted_at.format("%Y-%m-%d %H:%M"),
            a.score,
            a.subject
        );
    }
    Ok(())
}

fn cmd_review(store: &SqliteStore, attempt_id: i64) -> Result<()> {
    let Some(record) = store.load_attempt(attempt_id)? else {
        println!("Attempt #{attempt_id} not found.");
        return Ok(());
    };

    println!(
        "Attempt #{} — {} — {}/{} correct ({})",
        record.attempt_id,
        record.subject,
        record.score,
        record.feedback.len(),
        record.submitted_at.format("%Y-%m-%d %H:%M"),
    );
    println!();

    for (i, f) in record.feedback.iter().enumerate() {
        let mark = if f.is_correct { "✓" } else { "✗" };
        let marked = f.marked.as_deref().unwrap_or("unanswered");
        println!("{mark} Question {} [{}]", i + 1, f.id);
        println!("  {}", f.stem);
        println!("  marked: {marked}, correct: {}", f.correct);
        println!("  {}", f.explanation);
        println!();
    }
    Ok(())
}

fn cmd_subjects(store: &SqliteStore) -> Result<()> {
    let subjects = store.list_subjects()?;
    if subjects.is_empty() {
        println!("Corpus is empty — run `examgen ingest` first.");
        return Ok(());
    }

    for (subject, count) in &subjects {
        println!("{subject}: {count} chunks");
    }
    Ok(())
}
