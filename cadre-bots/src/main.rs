//! cadre: run and inspect a self-optimizing team of content workers.
//!
//!   cadre run --cycles 3         Run full cycles (needs ANTHROPIC_API_KEY)
//!   cadre decide --state f.json  Print the next decisions without applying them
//!   cadre show                   Show the committed roster
//!   cadre history                List stored snapshots
//!
//! Without ANTHROPIC_API_KEY, `decide` falls back to static ideation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cadre_bots::crew::LlmCrew;
use cadre_bots::gateway::LlmIdeation;
use cadre_bots::llm::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, LlmClient};
use cadre_core::canonical;
use cadre_core::config::CadreConfig;
use cadre_core::ideation::{IdeationGateway, StaticIdeation};
use cadre_core::orchestrator::{CycleReport, NoEngagement, Orchestrator};
use cadre_core::policy::PolicyEngine;
use cadre_core::refine::Refiner;
use cadre_core::roster::Roster;
use cadre_core::store::{self, SnapshotStore};
use cadre_core::types::{DecisionBatch, RosterState};

#[derive(Parser)]
#[command(name = "cadre", about = "Self-optimizing team of LLM content workers")]
struct Args {
    /// SQLite database for snapshots and decision logs
    #[arg(long, env = "CADRE_DB", default_value = "cadre.db", global = true)]
    db: String,

    /// TOML config file (thresholds, refinement, topics, brief)
    #[arg(long, env = "CADRE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Anthropic API key (or set ANTHROPIC_API_KEY env var)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Claude model to use
    #[arg(long, env = "CADRE_MODEL", default_value = DEFAULT_MODEL, global = true)]
    model: String,

    /// Reply token limit per model call
    #[arg(long, env = "CADRE_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS, global = true)]
    max_tokens: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run full cycles: decide, apply, produce content, persist
    Run {
        #[arg(long, default_value_t = 1)]
        cycles: u32,
        /// Seed from a RosterState JSON file instead of the latest snapshot
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Print the decisions the policy engine would make, without applying them
    Decide {
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Show the committed roster (latest snapshot by default)
    Show {
        #[arg(long)]
        iteration: Option<u64>,
    },
    /// List stored snapshots
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs with CADRE_LOG_JSON=1, human-readable otherwise
    let json_logs = std::env::var("CADRE_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cadre=info,cadre_core=info,cadre_bots=info"));
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let args = Args::parse();
    let config = CadreConfig::load(args.config.as_deref())?;

    match &args.command {
        Command::Run { cycles, state } => run(&args, &config, *cycles, state.as_deref()).await,
        Command::Decide { state } => decide(&args, &config, state.as_deref()).await,
        Command::Show { iteration } => show(&args, *iteration),
        Command::History => history(&args),
    }
}

fn client(args: &Args, api_key: String) -> LlmClient {
    LlmClient::new(api_key)
        .with_model(&args.model)
        .with_max_tokens(args.max_tokens)
}

fn open_store(args: &Args) -> Result<SnapshotStore> {
    SnapshotStore::open(&args.db).with_context(|| format!("Failed to open store {}", args.db))
}

/// `--state` file, else the latest snapshot, else a fresh roster seeded with
/// the configured brief.
fn starting_state(store: &SnapshotStore, path: Option<&Path>, config: &CadreConfig) -> Result<RosterState> {
    if let Some(path) = path {
        return store::load_state_file(path).context("Refusing to start from a malformed state file");
    }
    if let Some(state) = store.load_latest().context("Refusing to start from a malformed snapshot")? {
        tracing::info!(iteration = state.iteration, workers = state.workers.len(), "Resuming");
        return Ok(state);
    }
    let mut state = RosterState::default();
    config.brief.apply_to(&mut state);
    tracing::info!("No snapshot found, starting with an empty roster");
    Ok(state)
}

async fn run(args: &Args, config: &CadreConfig, cycles: u32, state: Option<&Path>) -> Result<()> {
    let Some(api_key) = args.api_key.clone() else {
        bail!("`run` needs ANTHROPIC_API_KEY: content is written and scored by the model");
    };
    let llm = client(args, api_key);
    tracing::info!(cycles, model = llm.model(), max_tokens = args.max_tokens, "Starting run");

    let store = open_store(args)?;
    let state = starting_state(&store, state, config)?;
    let roster = Roster::new(state, config.policies.team_cap).context("Committed roster breaks invariants")?;

    let policy = PolicyEngine::new(LlmIdeation::new(llm.clone()), config.policies.clone())
        .with_ideation_timeout(config.ideation_timeout());
    let refiner = Refiner::new(LlmCrew::new(llm), config.refine.clone());
    let orchestrator = Orchestrator::new(policy, refiner, NoEngagement, roster, store, config.orchestrator.clone());

    let reports = orchestrator.run(cycles).await?;
    for report in &reports {
        print_report(report);
    }
    Ok(())
}

async fn decide(args: &Args, config: &CadreConfig, state: Option<&Path>) -> Result<()> {
    let store = open_store(args)?;
    let state = starting_state(&store, state, config)?;

    let batch = match &args.api_key {
        Some(key) => {
            decide_with(LlmIdeation::new(client(args, key.clone())), config, &state).await
        }
        None => {
            tracing::info!("No API key, using static ideation");
            decide_with(StaticIdeation, config, &state).await
        }
    };

    println!("{}", serde_json::to_string_pretty(&batch)?);
    println!("digest: {}", canonical::fingerprint(&batch)?);

    let roster = Roster::new(state, config.policies.team_cap)?;
    roster.apply(&batch).context("Batch would break roster invariants")?;
    println!("roster after apply: {} workers", roster.snapshot().workers.len());
    Ok(())
}

async fn decide_with<G: IdeationGateway>(gateway: G, config: &CadreConfig, state: &RosterState) -> DecisionBatch {
    PolicyEngine::new(gateway, config.policies.clone())
        .with_ideation_timeout(config.ideation_timeout())
        .decide(state)
        .await
}

fn show(args: &Args, iteration: Option<u64>) -> Result<()> {
    let store = open_store(args)?;
    let state = match iteration {
        Some(i) => store.load_snapshot(i)?,
        None => store.load_latest()?,
    };
    let Some(state) = state else {
        println!("No snapshot stored in {}", args.db);
        return Ok(());
    };

    println!("iteration {}  cooldown {}", state.iteration, state.cooldown_counter);
    println!("goal: {}", state.project_goal);
    println!();
    println!("{:<18} {:<22} {:>7} {:>7}  core", "worker", "role", "utility", "overall");
    for w in &state.workers {
        let overall = w.overall().map_or("-".to_string(), |o| format!("{o:.2}"));
        let core = if state.is_core(w) { "yes" } else { "" };
        println!("{:<18} {:<22} {:>7.2} {:>7}  {core}", w.name, w.role, w.utility, overall);
    }

    let history = &state.score_history;
    if let Some(avg) = history.latest_overall() {
        println!();
        println!("avg overall (latest): {avg:.3}");
        for (dim, score) in &history.dims_mean {
            println!("  {dim:<13} {score:.2}");
        }
    }
    for record in history.content_history.iter().take(5) {
        println!(
            "{}  rounds={}  overall={:.2}  {}",
            record.content_id, record.rounds, record.internal_scores.overall, record.topic
        );
    }
    Ok(())
}

fn history(args: &Args) -> Result<()> {
    let store = open_store(args)?;
    let snapshots = store.list_snapshots()?;
    if snapshots.is_empty() {
        println!("No snapshots stored in {}", args.db);
        return Ok(());
    }
    for snap in snapshots {
        // Decisions are logged under the iteration they were made at.
        let decisions = store.decisions_for(snap.iteration.saturating_sub(1))?;
        let hires: usize = decisions.iter().map(|d| d.batch.hire_plan.len()).sum();
        let prunes: usize = decisions.iter().map(|d| d.batch.prune_list.len()).sum();
        println!(
            "iteration {:>4}  {}  {}  hires={hires} prunes={prunes}",
            snap.iteration,
            &snap.digest[..12.min(snap.digest.len())],
            snap.created_at
        );
    }
    Ok(())
}

fn print_report(r: &CycleReport) {
    let avg = r.avg_overall.map_or("-".to_string(), |a| format!("{a:.3}"));
    println!(
        "cycle {:>3}: roster={} hired={:?} pruned={:?} merged={:?} coached={:?} produced={} aborted={} failed={} avg={avg}",
        r.iteration,
        r.roster_size,
        r.hired,
        r.pruned,
        r.merged,
        r.coached,
        r.produced.len(),
        r.safety_aborts,
        r.failed,
    );
}
