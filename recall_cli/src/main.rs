use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use recall_core::*;
use serde_json::json;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Spaced-repetition review scheduler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the record of a new card
    New {
        /// Card id (defaults to the current epoch milliseconds)
        #[arg(long)]
        id: Option<i64>,
    },

    /// Review a card and print the updated card with its review log
    Review {
        /// Card record file, or '-' for stdin
        #[arg(long)]
        card: PathBuf,

        /// again, hard, good or easy (or 1-4)
        #[arg(long)]
        rating: Rating,

        /// Review time (ISO-8601, defaults to now)
        #[arg(long, value_parser = parse_at)]
        at: Option<DateTime<Utc>>,

        /// Time spent on the review in milliseconds
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Seed for interval fuzzing
        #[arg(long)]
        seed: Option<u64>,

        /// Write the updated card back to the card file
        #[arg(long)]
        in_place: bool,
    },

    /// Show what each rating would do to a card
    Preview {
        /// Card record file, or '-' for stdin
        #[arg(long)]
        card: PathBuf,

        /// Review time (ISO-8601, defaults to now)
        #[arg(long, value_parser = parse_at)]
        at: Option<DateTime<Utc>>,

        /// Seed for interval fuzzing
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

fn parse_at(s: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(s)
}

fn main() -> Result<()> {
    // Keep stdout for records
    recall_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) if path.exists() => Config::load_from(path)?,
        Some(ref path) if !is_save_command(&cli.command) => Config::load_from(path)?,
        Some(_) => Config::default(),
        None => Config::load()?,
    };

    match cli.command {
        Commands::New { id } => cmd_new(id),
        Commands::Review {
            card,
            rating,
            at,
            duration_ms,
            seed,
            in_place,
        } => cmd_review(&card, rating, at, duration_ms, seed, in_place, &config),
        Commands::Preview { card, at, seed } => cmd_preview(&card, at, seed, &config),
        Commands::Config { save } => cmd_config(&config, save, cli.config.as_deref()),
    }
}

fn cmd_new(id: Option<i64>) -> Result<()> {
    let card = match id {
        Some(id) => Card::with_id(id),
        None => Card::new(),
    };

    println!("{}", serde_json::to_string_pretty(&card.to_value()?)?);
    Ok(())
}

fn cmd_review(
    card_path: &Path,
    rating: Rating,
    at: Option<DateTime<Utc>>,
    duration_ms: Option<u64>,
    seed: Option<u64>,
    in_place: bool,
    config: &Config,
) -> Result<()> {
    if in_place && is_stdin(card_path) {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "--in-place needs a card file, not stdin",
        )));
    }

    let card = read_card(card_path)?;
    let mut scheduler = build_scheduler(config, seed);

    let (next, review_log) = scheduler.review_card(&card, rating, at, duration_ms);
    tracing::info!(
        "Card {} is now {:?}, due {}",
        next.id,
        next.state(),
        next.due
    );

    if in_place {
        next.save_to(card_path)?;
    }

    let output = json!({
        "card": next.to_value()?,
        "review_log": review_log.to_value()?,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn cmd_preview(
    card_path: &Path,
    at: Option<DateTime<Utc>>,
    seed: Option<u64>,
    config: &Config,
) -> Result<()> {
    let card = read_card(card_path)?;
    let now = at.unwrap_or_else(Utc::now);
    let mut scheduler = build_scheduler(config, seed);

    println!(
        "Card {} ({:?}, due {})",
        card.id,
        card.state(),
        format_timestamp(&card.due)
    );
    println!();

    for (rating, outcome) in scheduler.preview(&card, Some(now)) {
        let interval = match outcome.current_interval() {
            Some(days) if outcome.state() == State::Review => format!("{} d", days),
            _ => format_wait(outcome.due - now),
        };
        println!(
            "  {:<6} → {:<10} {:<10} due {}",
            rating.to_string(),
            format!("{:?}", outcome.state()),
            interval,
            format_timestamp(&outcome.due)
        );
    }

    Ok(())
}

fn cmd_config(config: &Config, save: bool, path: Option<&Path>) -> Result<()> {
    for finding in config.scheduler.validate() {
        eprintln!("warning: {}", finding);
    }

    print!("{}", config.to_toml()?);

    if save {
        match path {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
    }
    Ok(())
}

fn is_save_command(command: &Commands) -> bool {
    matches!(command, Commands::Config { save: true })
}

fn build_scheduler(config: &Config, seed: Option<u64>) -> Scheduler {
    match seed.or(config.fuzz.seed) {
        Some(seed) => Scheduler::with_seed(config.scheduler.clone(), seed),
        None => Scheduler::new(config.scheduler.clone()),
    }
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_card(path: &Path) -> Result<Card> {
    if !is_stdin(path) {
        return Card::load_from(path);
    }

    let mut contents = String::new();
    io::stdin().read_to_string(&mut contents)?;
    Card::from_json(&contents)
}

fn format_wait(wait: chrono::Duration) -> String {
    if wait.num_days() >= 1 {
        format!("{} d", wait.num_days())
    } else if wait.num_hours() >= 1 {
        format!("{} h", wait.num_hours())
    } else if wait.num_minutes() >= 1 {
        format!("{} m", wait.num_minutes())
    } else {
        format!("{} s", wait.num_seconds())
    }
}
