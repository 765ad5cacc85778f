use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use conjecture_cli::inventory::Inventory;
use conjecture_core::blob::{decode_blob, encode_blob};
use conjecture_core::config::{DATABASE_VAR, REPLAY_VAR, SEED_VAR};
use conjecture_core::{choices_from_bytes, decode_failure};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Conjecture property testing CLI
#[derive(Parser)]
#[command(name = "cargo")]
#[command(bin_name = "cargo")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run Conjecture property tests and inspect their example databases
    Conjecture(ConjectureArgs),
}

#[derive(Parser)]
struct ConjectureArgs {
    #[command(subcommand)]
    action: Option<ConjectureAction>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    List,
    Json,
}

#[derive(Subcommand)]
enum ConjectureAction {
    /// Run property tests (default)
    ///
    /// The seed, replay blobs and database directory reach the test binaries
    /// as CONJECTURE_SEED, CONJECTURE_REPLAY and CONJECTURE_DATABASE. Only
    /// tests that build their settings with `Config::from_env()` read them;
    /// `Config::default()` ignores them.
    #[command(alias = "t")]
    Test {
        /// Test name pattern to run
        #[arg(short, long)]
        test: Option<String>,

        /// Seed for every run in this invocation
        #[arg(long)]
        seed: Option<u64>,

        /// Reproduction blob to replay before generating (repeatable)
        #[arg(long)]
        replay: Vec<String>,

        /// Example database directory the tests should use
        #[arg(long)]
        database: Option<PathBuf>,

        /// Run tests in release mode
        #[arg(long)]
        release: bool,
    },

    /// Inspect a directory example database
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Convert between reproduction blobs and raw buffers
    Blob {
        #[command(subcommand)]
        action: BlobAction,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// List stored keys with entry counts
    List {
        /// Database directory
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "list")]
        format: OutputFormat,
    },

    /// Decode the entries stored under a key or test name
    Show {
        /// Key directory name, or the name of the test
        key: String,

        /// Database directory
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Show the secondary entries superseded by shrinking
        #[arg(long)]
        secondary: bool,
    },

    /// Delete the entries stored under a key or test name
    Prune {
        /// Key directory name, or the name of the test
        key: String,

        /// Only delete this value file
        #[arg(long)]
        value: Option<String>,

        /// Database directory
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Remove temporary files left by interrupted writes
    Clean {
        /// Database directory
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum BlobAction {
    /// Wrap a hex-encoded buffer in a reproduction blob
    Encode {
        /// The buffer as hex digits
        hex: String,
    },

    /// Unpack a reproduction blob and list its choices
    Decode {
        /// The reproduction blob
        blob: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    // A second initialisation only happens in tests; ignore it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Colour only for terminals, unless explicitly requested or refused.
    let should_use_colors = std::env::var("FORCE_COLOR").is_ok()
        || (atty::is(atty::Stream::Stdout)
            && std::env::var("NO_COLOR").is_err()
            && std::env::var("TERM").unwrap_or_default() != "dumb");

    colored::control::set_override(should_use_colors);

    let cli = Cli::parse();

    match cli.command {
        Commands::Conjecture(args) => {
            init_logging(args.verbose);
            handle_conjecture(args).await
        }
    }
}

async fn handle_conjecture(args: ConjectureArgs) -> Result<()> {
    let verbose = args.verbose;
    match args.action {
        Some(ConjectureAction::Test {
            test,
            seed,
            replay,
            database,
            release,
        }) => run_tests(test, seed, replay, database, release, verbose).await,
        Some(ConjectureAction::Db { action }) => handle_db(action),
        Some(ConjectureAction::Blob { action }) => handle_blob(action),
        None => run_tests(None, None, Vec::new(), None, false, verbose).await,
    }
}

async fn run_tests(
    test_pattern: Option<String>,
    seed: Option<u64>,
    replay: Vec<String>,
    database: Option<PathBuf>,
    release: bool,
    verbose: bool,
) -> Result<()> {
    println!("{}", conjecture_cli::format_header());

    if verbose {
        println!(
            "{}",
            conjecture_cli::format_config_output(seed, &replay, release, test_pattern.as_deref())
        );
    }

    // Reject damaged blobs here rather than inside every test binary.
    for blob in &replay {
        decode_failure(blob).map_err(|e| anyhow::anyhow!("invalid --replay blob {:?}: {}", blob, e))?;
    }

    let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let mut test_cmd = Command::new(cargo);
    test_cmd.arg("test");

    if release {
        test_cmd.arg("--release");
    }

    if let Some(pattern) = &test_pattern {
        test_cmd.arg(pattern);
    }

    if let Some(seed) = seed {
        test_cmd.env(SEED_VAR, seed.to_string());
    }
    if !replay.is_empty() {
        test_cmd.env(REPLAY_VAR, replay.join(","));
    }
    if let Some(database) = &database {
        test_cmd.env(DATABASE_VAR, database);
    }

    info!(?test_pattern, ?seed, replays = replay.len(), release, "running cargo test");
    let output = test_cmd.output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(status = ?output.status, "cargo test finished");

    if output.status.success() {
        if verbose {
            println!("{}", conjecture_cli::enhance_test_output(&stdout, ""));
        }
        println!("{}", conjecture_cli::format_success());
        Ok(())
    } else {
        println!("{}", conjecture_cli::enhance_test_output(&stdout, &stderr));
        println!("{}", conjecture_cli::format_failure());
        std::process::exit(output.status.code().unwrap_or(1));
    }
}

fn open_inventory(path: Option<PathBuf>) -> Inventory {
    let root = conjecture_cli::database_root(path, std::env::var(DATABASE_VAR).ok());
    debug!(root = %root.display(), "opening example database");
    Inventory::open(root)
}

fn handle_db(action: DbAction) -> Result<()> {
    match action {
        DbAction::List { path, format } => list_keys(open_inventory(path), format),
        DbAction::Show { key, path, secondary } => show_key(open_inventory(path), &key, secondary),
        DbAction::Prune { key, value, path } => {
            let inventory = open_inventory(path);
            let hash = inventory.resolve(&key, false);
            let removed = inventory.prune(&hash, value.as_deref())?;
            println!(
                "Removed {} {} from {}",
                removed.to_string().bright_yellow(),
                if removed == 1 { "entry" } else { "entries" },
                hash.bright_cyan()
            );
            Ok(())
        }
        DbAction::Clean { path } => {
            let removed = open_inventory(path).clean()?;
            println!("Removed {} stray temporary files", removed.to_string().bright_yellow());
            Ok(())
        }
    }
}

fn list_keys(inventory: Inventory, format: OutputFormat) -> Result<()> {
    let keys = inventory.keys()?;
    let stray = inventory.stray_files().len();
    let root = inventory.root().display().to_string();

    match format {
        OutputFormat::List => {
            println!("{}", conjecture_cli::format_database_header(&root));

            if keys.is_empty() {
                println!("No stored examples in {}", root);
                return Ok(());
            }

            for key in &keys {
                let modified = key
                    .modified
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "  {}  {} entries, {} bytes, last modified {}",
                    key.hash.bright_green(),
                    key.entries.to_string().bright_yellow(),
                    key.bytes,
                    modified.bright_blue()
                );
            }
            println!();
            println!(
                "Total: {} keys, {} entries",
                keys.len().to_string().bright_green().bold(),
                keys.iter().map(|k| k.entries).sum::<usize>()
            );
            if stray > 0 {
                println!(
                    "{} stray temporary files; run `cargo conjecture db clean`",
                    stray.to_string().bright_red()
                );
            }
        }
        OutputFormat::Json => {
            let total = keys.len();
            let json_output = serde_json::json!({
                "root": root,
                "keys": keys,
                "total": total,
                "stray_files": stray,
            });
            println!("{}", serde_json::to_string_pretty(&json_output)?);
        }
    }

    Ok(())
}

fn show_key(inventory: Inventory, key: &str, secondary: bool) -> Result<()> {
    let hash = inventory.resolve(key, secondary);
    let entries = inventory.show(&hash)?;

    if entries.is_empty() {
        println!("No entries stored under {}", hash.bright_cyan());
        return Ok(());
    }

    println!("{} ({} entries)", hash.bright_cyan().bold(), entries.len());
    for entry in &entries {
        println!();
        let modified = entry
            .modified
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{}  {} bytes, {}", entry.name.bright_green(), entry.size, modified);
        match &entry.choices {
            Ok(choices) => {
                print!("{}", conjecture_cli::format_choices(choices));
                println!("  Reproduce with {}={}", REPLAY_VAR, entry.blob.bright_yellow());
            }
            Err(reason) => println!("  {} {}", "undecodable:".bright_red(), reason),
        }
    }
    Ok(())
}

fn handle_blob(action: BlobAction) -> Result<()> {
    match action {
        BlobAction::Encode { hex } => {
            let bytes = conjecture_cli::parse_hex(&hex)?;
            println!("{}", encode_blob(&bytes));
        }
        BlobAction::Decode { blob } => {
            let bytes = decode_blob(&blob)?;
            println!("{} bytes: {}", bytes.len(), conjecture_cli::to_hex(&bytes).bright_blue());
            match choices_from_bytes(&bytes) {
                Ok(choices) => print!("{}", conjecture_cli::format_choices(&choices)),
                Err(e) => println!("  {} {}", "not a choice sequence:".bright_red(), e),
            }
        }
    }
    Ok(())
}
