use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ontopath::config::{self, Config, ConfigError};
use ontopath::consensus::build_strategy;
use ontopath::data::DataError;
use ontopath::eval::{EvaluationRecord, evaluate};
use ontopath::llm::{LlmError, client_from_config};
use ontopath::ontology::{self, OntologyError, OntologyGraph};
use ontopath::results::{self, ResultsError};
use ontopath::{Annotator, CancellationToken, Dataset, LlmOracle, Oracle, PromptMode};
use tracing::{info, warn};

/// ontopath - annotate table columns with ontology classes
#[derive(Parser)]
#[command(name = "ontopath")]
#[command(about = "Hierarchical ontology annotation of table columns with LLM consensus")]
#[command(version)]
struct Cli {
    /// Config file (defaults to {config_dir}/ontopath/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate every labelled column and write predictions.json
    Run(RunCommand),
    /// Score predictions.json against the labels
    Eval,
    /// Print metrics from an existing results.json
    Report,
    /// Print ontology statistics
    Inspect,
}

#[derive(Parser)]
struct RunCommand {
    /// Decision mode: llm, cot or edm (overrides the config)
    #[arg(short, long, value_name = "MODE")]
    mode: Option<PromptMode>,

    /// Maximum search depth (overrides the config)
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Seed for ensemble agent sampling (overrides the config)
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    // a missing .env is fine
    let _ = dotenvy::dotenv();

    let result = load_config(cli.config.as_ref()).and_then(|config| match &cli.command {
        Commands::Run(cmd) => handle_run(config, cmd),
        Commands::Eval => handle_eval(&config),
        Commands::Report => handle_report(&config),
        Commands::Inspect => handle_inspect(&config),
    });

    if let Err(e) = result {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Bad input (config, data files, ontology, client settings) is a user error;
/// everything else is internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.is::<ConfigError>()
            || cause.is::<DataError>()
            || cause.is::<OntologyError>()
            || cause.is::<ResultsError>()
            || matches!(
                cause.downcast_ref::<LlmError>(),
                Some(LlmError::Config(_) | LlmError::InvalidUrl(_))
            )
    })
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    let config = Config::load(&path)?;
    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

fn load_ontology(config: &Config) -> Result<OntologyGraph> {
    let graph = ontology::load(&config.data.ontology)?;
    let orphans = graph.unreachable().len();
    if orphans > 0 {
        warn!(orphans, "Ontology has classes unreachable from the root");
    }
    Ok(graph)
}

fn handle_run(mut config: Config, cmd: &RunCommand) -> Result<()> {
    if let Some(mode) = cmd.mode {
        config.experiment.mode = mode;
    }
    if let Some(depth) = cmd.max_depth {
        config.experiment.max_depth = depth;
    }
    if cmd.seed.is_some() {
        config.experiment.seed = cmd.seed;
    }
    config.validate()?;

    let dataset = Dataset::load(&config.data.tables, &config.data.labels)?;
    let graph = load_ontology(&config)?;

    let client = client_from_config(&config.llm)?;
    let mode = config.experiment.mode;
    info!(model = client.model_name(), %mode, "Starting annotation");

    let oracle: Arc<dyn Oracle> = Arc::new(LlmOracle::new(client, mode));
    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone());
    let strategy = build_strategy(
        mode,
        config.experiment.ensemble_params(),
        config.experiment.seed,
        oracle,
        cancel.clone(),
    )?;

    let run = Annotator::new(&dataset, &graph, strategy.as_ref())
        .max_depth(config.experiment.max_depth)
        .sample_rows(config.experiment.sample_rows)
        .with_cancellation(cancel)
        .annotate_all();

    let path = results::write_predictions(&config.results_dir(), &run.predictions)
        .context("Failed to write predictions")?;
    println!(
        "Wrote {} predictions to {}",
        run.predictions.len(),
        path.display()
    );
    if run.cancelled {
        println!("Run was cancelled; predictions are partial");
    }
    Ok(())
}

/// First Ctrl-C cancels the run so partial predictions still get written;
/// a second one exits immediately.
fn install_interrupt_handler(cancel: CancellationToken) {
    let installed = ctrlc::set_handler(move || {
        if on_interrupt(&cancel) {
            std::process::exit(130);
        }
    });
    if let Err(e) = installed {
        warn!(error = %e, "Could not install Ctrl-C handler; interrupting will lose the run");
    }
}

/// Returns true when the run was already cancelled and the process should exit.
fn on_interrupt(cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return true;
    }
    eprintln!("Interrupted: keeping finished paths and writing partial predictions (Ctrl-C again to abort)");
    cancel.cancel();
    false
}

fn handle_eval(config: &Config) -> Result<()> {
    let dir = config.results_dir();
    let predictions = results::read_predictions(&dir)?;
    let dataset = Dataset::load(&config.data.tables, &config.data.labels)?;
    let graph = load_ontology(config)?;

    let mut records = Vec::with_capacity(predictions.len());
    for prediction in &predictions {
        match dataset.label_for(&prediction.table_id, prediction.column_id) {
            Some(label) => records.push(EvaluationRecord::from_prediction(prediction, label, &graph)),
            None => warn!(
                table_id = %prediction.table_id,
                column_id = prediction.column_id,
                "No label for prediction; skipped"
            ),
        }
    }

    results::write_results(&dir, &records).context("Failed to write results")?;
    let report = evaluate(&records);
    results::append_report(&dir, &report).context("Failed to write report")?;
    print!("{report}");
    Ok(())
}

fn handle_report(config: &Config) -> Result<()> {
    let records = results::read_results(&config.results_dir())?;
    print!("{}", evaluate(&records));
    Ok(())
}

fn handle_inspect(config: &Config) -> Result<()> {
    let graph = load_ontology(config)?;
    let stats = graph.stats();

    println!("Ontology: {}", config.data.ontology.display());
    println!("  Classes:     {}", stats.classes);
    println!("  Edges:       {}", stats.edges);
    println!("  Max depth:   {}", stats.max_depth);
    println!("  Unreachable: {}", stats.unreachable);
    println!("  Classes per depth:");
    for (depth, count) in &stats.depth_counts {
        println!("    {depth}: {count}");
    }

    let mut top: Vec<&str> = graph
        .children_of(graph.root_id())
        .iter()
        .filter_map(|id| graph.name_of(id))
        .collect();
    top.sort_unstable();
    println!("  Top-level classes ({}): {}", top.len(), top.join(", "));
    Ok(())
}
