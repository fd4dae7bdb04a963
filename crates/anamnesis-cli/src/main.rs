// ABOUTME: Command-line boundary: init/learn/analyze/watch/check/setup/server.
// ABOUTME: Grounded on codegraph-cli/src/main.rs's clap-derive + colored-output shape.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use anamnesis_core::config::AnamnesisConfig;
use anamnesis_core::logging::init_logging;
use anamnesis_services::{CodebaseService, LearningOptions, LearningService};
use anamnesis_storage::sync::SyncStorage;

#[derive(Parser)]
#[command(name = "anamnesis")]
#[command(about = "Semantic code-intelligence engine: learn a codebase and recall it later", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the local database for a project
    Init {
        /// Project path (defaults to the current directory)
        path: Option<PathBuf>,
    },

    /// Crawl a project and persist its learned intelligence
    Learn {
        path: Option<PathBuf>,

        /// Re-learn even if intelligence already exists for this path
        #[arg(long)]
        force: bool,
    },

    /// Analyze a project without persisting new intelligence
    Analyze {
        path: Option<PathBuf>,
    },

    /// Watch a project and re-learn changed files until interrupted
    Watch {
        path: Option<PathBuf>,
    },

    /// Report codebase health
    Check {
        path: Option<PathBuf>,

        #[arg(long)]
        verbose: bool,

        #[arg(long)]
        validate: bool,

        #[arg(long)]
        performance: bool,
    },

    /// Print the resolved configuration
    Setup {
        #[arg(long)]
        interactive: bool,
    },

    /// Run the JSON-RPC tool-server loop over stdio
    Server {
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = AnamnesisConfig::from_env();
    init_logging(&config.logging.level, config.logging.mcp_server);

    let result = match &cli.command {
        Commands::Init { path } => run_init(path.as_deref()),
        Commands::Learn { path, force } => run_learn(path.as_deref(), *force, cli.verbose),
        Commands::Analyze { path } => run_analyze(path.as_deref(), cli.verbose),
        Commands::Watch { path } => run_watch(path.as_deref()),
        Commands::Check { path, verbose, validate, performance } => run_check(path.as_deref(), cli.verbose || *verbose, *validate, *performance),
        Commands::Setup { interactive } => run_setup(*interactive, &config),
        Commands::Server { path } => run_server(path.as_deref(), &config).await,
    };

    if let Err(e) = result {
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn resolve_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
}

fn db_path_for(project_path: &Path, config: &AnamnesisConfig) -> PathBuf {
    project_path.join(&config.database.filename)
}

fn open_storage(project_path: &Path, config: &AnamnesisConfig) -> Result<SyncStorage> {
    SyncStorage::connect(&db_path_for(project_path, config)).context("failed to open the intelligence database")
}

fn run_init(path: Option<&Path>) -> Result<()> {
    let project_path = resolve_path(path);
    std::fs::create_dir_all(&project_path).context("failed to create project directory")?;
    let config = AnamnesisConfig::from_env();
    open_storage(&project_path, &config)?;
    println!("{} initialized {}", "✓".green(), project_path.display());
    Ok(())
}

fn run_learn(path: Option<&Path>, force: bool, verbose: bool) -> Result<()> {
    let project_path = resolve_path(path);
    let config = AnamnesisConfig::from_env();
    let storage = open_storage(&project_path, &config)?;
    let service = LearningService::new(Some(&storage));
    let options = LearningOptions { force, ..LearningOptions::default() };

    let mut print_progress = |phase: u32, total: u32, message: &str| {
        if verbose {
            println!("{} [{phase}/{total}] {message}", "·".cyan());
        }
    };
    let result = service.learn_from_codebase(&project_path, &options, Some(&mut print_progress));

    if !result.success {
        anyhow::bail!(result.error.unwrap_or_else(|| "learning failed".to_string()));
    }

    println!(
        "{} learned {} concept(s) and {} pattern(s) in {}ms",
        "✓".green(),
        result.concepts_learned,
        result.patterns_learned,
        result.time_elapsed_ms
    );
    for insight in &result.insights {
        println!("  {} {insight}", "-".dimmed());
    }
    Ok(())
}

fn run_analyze(path: Option<&Path>, verbose: bool) -> Result<()> {
    let project_path = resolve_path(path);
    let service = CodebaseService::new();
    let mut analyses = Vec::new();

    for entry in walkdir::WalkDir::new(&project_path).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(source) = std::fs::read_to_string(entry.path()) else { continue };
        if let Some(analysis) = service.analyze_file(entry.path(), &source, true) {
            if verbose {
                println!("{} {} ({})", "·".cyan(), analysis.file_path, analysis.language);
            }
            analyses.push(analysis);
        }
    }

    let health = service.codebase_health(&analyses);
    print_health(&health, analyses.len());
    if !health.healthy {
        anyhow::bail!("codebase analysis found issues");
    }
    Ok(())
}

fn run_watch(path: Option<&Path>) -> Result<()> {
    use notify::{RecursiveMode, Watcher};

    let project_path = resolve_path(path);
    let config = AnamnesisConfig::from_env();
    let storage = open_storage(&project_path, &config)?;
    let service = LearningService::new(Some(&storage));

    let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();
    let mut watcher = notify::recommended_watcher(move |event| {
        let _ = tx.send(event);
    })
    .context("failed to start the file watcher")?;
    watcher.watch(&project_path, RecursiveMode::Recursive).context("failed to watch project path")?;

    println!("{} watching {} (Ctrl-C to stop)", "✓".green(), project_path.display());
    for event in rx {
        match event {
            Ok(event) if matches!(event.kind, notify::EventKind::Create(_) | notify::EventKind::Modify(_) | notify::EventKind::Remove(_)) => {
                let result = service.learn_from_codebase(&project_path, &LearningOptions { force: true, ..LearningOptions::default() }, None);
                println!("{} re-learned {} concept(s) after a file change", "·".cyan(), result.concepts_learned);
            }
            Ok(_) => {}
            Err(e) => eprintln!("{} watcher error: {e}", "Error:".red().bold()),
        }
    }
    Ok(())
}

fn run_check(path: Option<&Path>, verbose: bool, validate: bool, performance: bool) -> Result<()> {
    let project_path = resolve_path(path);
    let config = AnamnesisConfig::from_env();
    let storage = open_storage(&project_path, &config)?;

    let concept_count = storage.count_concepts_by_file_prefix(&project_path.to_string_lossy()).context("failed to query stored intelligence")?;
    println!("{} {concept_count} learned concept(s) on record", "·".cyan());

    if validate {
        if concept_count == 0 {
            println!("{} no intelligence has been learned for this path yet", "!".yellow());
        } else {
            println!("{} intelligence is present", "✓".green());
        }
    }

    if performance {
        println!("{} batch_size={} max_concurrent_files={}", "·".cyan(), config.performance.batch_size, config.performance.max_concurrent_files);
    }

    if verbose {
        println!("{} db={}", "·".cyan(), db_path_for(&project_path, &config).display());
    }

    let healthy = concept_count > 0 || !validate;
    if healthy {
        println!("{} codebase check passed", "✓".green());
        Ok(())
    } else {
        anyhow::bail!("codebase check failed: no learned intelligence found");
    }
}

fn run_setup(interactive: bool, config: &AnamnesisConfig) -> Result<()> {
    if interactive {
        println!("{}", "Anamnesis setup".bold());
    }
    println!("database.filename     = {}", config.database.filename);
    println!("performance.batch_size = {}", config.performance.batch_size);
    println!("performance.max_concurrent_files = {}", config.performance.max_concurrent_files);
    println!("logging.level         = {:?}", config.logging.level);
    println!("{} configuration resolved", "✓".green());
    Ok(())
}

async fn run_server(path: Option<&Path>, config: &AnamnesisConfig) -> Result<()> {
    let project_path = resolve_path(path);
    let storage = open_storage(&project_path, config)?;
    let server = anamnesis_mcp::McpServer::new(storage, env!("CARGO_PKG_VERSION"));
    anamnesis_mcp::server::announce_startup(env!("CARGO_PKG_VERSION"));
    server.run().await.context("tool-server loop exited with an error")
}

fn print_health(health: &anamnesis_services::CodebaseHealth, files_analyzed: usize) {
    let marker = if health.healthy { "✓".green() } else { "✗".red() };
    println!("{marker} analyzed {files_analyzed} file(s), health score {:.0}/100", health.score);
    for issue in &health.issues {
        println!("  {} {issue}", "!".yellow());
    }
    for recommendation in &health.recommendations {
        println!("  {} {recommendation}", "-".dimmed());
    }
}
