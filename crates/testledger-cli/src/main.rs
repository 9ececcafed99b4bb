use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use testledger_core::auth::AllowAll;
use testledger_core::engine::RecordingEngine;
use testledger_core::errors::{try_map_error, LedgerErrorKind};
use testledger_core::evidence::{EvidenceRegistry, LocalBlobStore};
use testledger_core::model::{Campaign, CaseKey, CaseSubmission, TestContent};
use testledger_core::storage::Store;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "testledger",
    version,
    about = "Test execution ledger: record runs, track history, report progress"
)]
struct Cli {
    #[arg(long, default_value = "ledger.yaml", global = true)]
    config: PathBuf,
    /// overrides db_path from the config file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[arg(long, default_value = "cli", env = "TESTLEDGER_USER", global = true)]
    user: String,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    Init(InitArgs),
    Seed(SeedArgs),
    Record(RecordArgs),
    Conduct(ConductArgs),
    Progress(ProgressArgs),
    Forecast(ForecastArgs),
    Evidence(EvidenceArgs),
    Version,
}

#[derive(Parser)]
struct InitArgs {
    /// generate .gitignore entries for the db and evidence root
    #[arg(long)]
    gitignore: bool,
}

#[derive(Parser)]
struct SeedArgs {
    /// JSON file with test contents and an optional campaign
    file: PathBuf,
}

#[derive(Parser)]
struct RecordArgs {
    /// JSON file with one recording batch
    file: PathBuf,
}

#[derive(Parser)]
struct ConductArgs {
    #[arg(long)]
    group: i64,
    #[arg(long)]
    tid: String,
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct ProgressArgs {
    #[arg(long)]
    group: i64,
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct ForecastArgs {
    #[arg(long)]
    group: i64,
    /// clamp the campaign window at this date (defaults to today)
    #[arg(long)]
    as_of: Option<NaiveDate>,
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct EvidenceArgs {
    #[command(subcommand)]
    cmd: EvidenceSub,
    #[arg(long)]
    group: i64,
    #[arg(long)]
    tid: String,
    #[arg(long)]
    case: i64,
    #[arg(long)]
    history: i64,
}

#[derive(Subcommand)]
enum EvidenceSub {
    Attach {
        file: PathBuf,
    },
    Detach {
        #[arg(long)]
        no: i64,
    },
}

/// Seed file: the planned test contents plus an optional campaign window.
#[derive(Deserialize)]
struct SeedFile {
    contents: Vec<TestContent>,
    #[serde(default)]
    campaign: Option<CampaignSeed>,
}

#[derive(Deserialize)]
struct CampaignSeed {
    group_id: i64,
    #[serde(flatten)]
    campaign: Campaign,
}

#[derive(Deserialize)]
struct BatchFile {
    group_id: i64,
    tid: String,
    submissions: Vec<CaseSubmission>,
}

mod exit_codes {
    pub const OK: i32 = 0;
    pub const REJECTED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            // validation and permission rejections carry structured detail
            if let Some(le) = try_map_error(&e) {
                eprintln!("error: {le}");
                match le.kind {
                    LedgerErrorKind::Validation | LedgerErrorKind::Permission => {
                        exit_codes::REJECTED
                    }
                    _ => exit_codes::CONFIG_ERROR,
                }
            } else {
                eprintln!("fatal: {e:?}");
                exit_codes::CONFIG_ERROR
            }
        }
    };
    std::process::exit(code);
}

fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Init(args) => cmd_init(&cli.config, args),
        Command::Seed(args) => cmd_seed(&cli.config, &cli.db, args),
        Command::Record(args) => cmd_record(&cli.config, &cli.db, &cli.user, args),
        Command::Conduct(args) => cmd_conduct(&cli.config, &cli.db, &cli.user, args),
        Command::Progress(args) => cmd_progress(&cli.config, &cli.db, &cli.user, args),
        Command::Forecast(args) => cmd_forecast(&cli.config, &cli.db, &cli.user, args),
        Command::Evidence(args) => cmd_evidence(&cli.config, &cli.db, &cli.user, args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

fn open_store(config: &Path, db: &Option<PathBuf>) -> anyhow::Result<(Store, PathBuf)> {
    let cfg = if config.exists() {
        testledger_core::config::load_config(config)?
    } else {
        testledger_core::config::LedgerConfig::default()
    };
    let db_path = db.clone().unwrap_or(cfg.db_path);
    ensure_parent_dir(&db_path)?;
    let store = Store::open(&db_path)?;
    store.init_schema()?;
    Ok((store, cfg.evidence_root))
}

fn cmd_init(config: &Path, args: InitArgs) -> anyhow::Result<i32> {
    if !config.exists() {
        if let Some(parent) = config.parent() {
            std::fs::create_dir_all(parent)?;
        }
        testledger_core::config::write_sample_config(config)?;
        eprintln!("created {}", config.display());
    } else {
        eprintln!("note: {} already exists", config.display());
    }

    if args.gitignore {
        let gi_path = Path::new(".gitignore");
        if !gi_path.exists() {
            std::fs::write(gi_path, "/.ledger/\n*.db\n*.db-shm\n*.db-wal\n")?;
            eprintln!("created .gitignore");
        } else {
            eprintln!("note: .gitignore already exists (skipped)");
        }
    }

    Ok(exit_codes::OK)
}

fn cmd_seed(config: &Path, db: &Option<PathBuf>, args: SeedArgs) -> anyhow::Result<i32> {
    let (store, _) = open_store(config, db)?;
    let raw = std::fs::read_to_string(&args.file)?;
    let seed: SeedFile = serde_json::from_str(&raw)?;

    for content in &seed.contents {
        store.put_content(content)?;
    }
    eprintln!("seeded {} test contents", seed.contents.len());

    if let Some(c) = seed.campaign {
        store.put_campaign(c.group_id, &c.campaign)?;
        eprintln!("set campaign for group {}", c.group_id);
    }
    Ok(exit_codes::OK)
}

fn cmd_record(
    config: &Path,
    db: &Option<PathBuf>,
    user: &str,
    args: RecordArgs,
) -> anyhow::Result<i32> {
    let (store, _) = open_store(config, db)?;
    let raw = std::fs::read_to_string(&args.file)?;
    let batch: BatchFile = serde_json::from_str(&raw)?;

    let engine = RecordingEngine::new(store);
    engine.submit_batch(
        &AllowAll,
        user,
        batch.group_id,
        &batch.tid,
        &batch.submissions,
    )?;
    eprintln!(
        "recorded {} submissions for {}",
        batch.submissions.len(),
        batch.tid
    );
    Ok(exit_codes::OK)
}

fn cmd_conduct(
    config: &Path,
    db: &Option<PathBuf>,
    user: &str,
    args: ConductArgs,
) -> anyhow::Result<i32> {
    let (store, _) = open_store(config, db)?;
    let view = testledger_core::view::conduct_view(&store, &AllowAll, user, args.group, &args.tid)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(exit_codes::OK);
    }

    println!(
        "{} (group {}) latest run: {}",
        view.tid, view.group_id, view.latest_display_history_count
    );
    for case in &view.cases {
        let judgment = case
            .current
            .as_ref()
            .and_then(|r| r.payload.judgment)
            .map(|j| j.as_str())
            .unwrap_or("-");
        println!(
            "  #{:<4} {:<12} runs={:<3} {}",
            case.content.case_no,
            judgment,
            case.history.len(),
            case.content.test_case
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_progress(
    config: &Path,
    db: &Option<PathBuf>,
    user: &str,
    args: ProgressArgs,
) -> anyhow::Result<i32> {
    let (store, _) = open_store(config, db)?;
    let rows = testledger_metrics::progress_for_group(&store, &AllowAll, user, args.group)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(exit_codes::OK);
    }

    println!(
        "{:<16} {:<16} {:>6} {:>7} {:>6} {:>5} {:>5} {:>9} {:>9}",
        "first", "second", "total", "target", "done", "ok", "ng", "ok_rate", "progress"
    );
    for r in &rows {
        println!(
            "{:<16} {:<16} {:>6} {:>7} {:>6} {:>5} {:>5} {:>8.1}% {:>8.1}%",
            r.first_layer,
            r.second_layer,
            r.total,
            r.target,
            r.completed,
            r.ok,
            r.ng,
            r.ok_rate * 100.0,
            r.progress_rate * 100.0
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_forecast(
    config: &Path,
    db: &Option<PathBuf>,
    user: &str,
    args: ForecastArgs,
) -> anyhow::Result<i32> {
    let (store, _) = open_store(config, db)?;
    let as_of = args
        .as_of
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let report =
        testledger_metrics::forecast_for_group(&store, &AllowAll, user, args.group, as_of)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(exit_codes::OK);
    }

    println!(
        "campaign {} .. {} (planned defects: {})",
        report.start_date, report.end_date, report.ng_plan_count
    );
    println!(
        "{:<12} {:>4} {:>6} {:>10} {:>12} {:>10}",
        "date", "ng", "cum", "remaining", "pred_remain", "pred_ng"
    );
    for p in &report.points {
        println!(
            "{:<12} {:>4} {:>6} {:>10} {:>12.1} {:>10.1}",
            p.date,
            p.daily_defect_count,
            p.cumulative_defect_count,
            p.actual_remaining_tests,
            p.predicted_remaining_tests,
            p.predicted_defects
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_evidence(
    config: &Path,
    db: &Option<PathBuf>,
    user: &str,
    args: EvidenceArgs,
) -> anyhow::Result<i32> {
    let (store, evidence_root) = open_store(config, db)?;
    let registry = EvidenceRegistry::new(store, Arc::new(LocalBlobStore::new(evidence_root)));
    let key = CaseKey::new(args.group, &args.tid, args.case);

    match args.cmd {
        EvidenceSub::Attach { file } => {
            let bytes = std::fs::read(&file)?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("evidence.bin");
            let record = registry.attach(&AllowAll, user, &key, args.history, name, &bytes)?;
            eprintln!(
                "attached evidence {} as {}",
                record.evidence_no, record.path
            );
        }
        EvidenceSub::Detach { no } => {
            registry.detach(&AllowAll, user, &key, args.history, no)?;
            eprintln!("detached evidence {no}");
        }
    }
    Ok(exit_codes::OK)
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
