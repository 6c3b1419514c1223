//! RFQAI Ingestion Runner
//!
//! Run one ingest-and-reprocess cycle against the configured source and
//! database.
//!
//! Usage:
//!   cargo run --bin rfqai-ingest -- cron
//!   cargo run --bin rfqai-ingest -- backfill --limit 500
//!   cargo run --bin rfqai-ingest -- cron --batch-size 2000 --skip-vectors
//!
//! Exits 0 when the run and reprocessing fully succeed, 2 otherwise.

use std::env;
use std::process::ExitCode;

use tracing::{error, info};

use rfqai_core::{IngestMode, NoopExtractor, Result, Settings, TableContracts};
use rfqai_db::Database;
use rfqai_embed::GeminiEmbedder;
use rfqai_pipeline::{
    ChunkParams, IngestOrchestrator, ReprocessOrchestrator, ReprocessScope,
};
use rfqai_source::{SourceClient, SourceConfig};

#[derive(Debug)]
struct Args {
    mode: IngestMode,
    batch_size: Option<i64>,
    limit: i64,
    skip_vectors: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            mode: IngestMode::Cron,
            batch_size: None,
            limit: 0,
            skip_vectors: false,
        }
    }
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = env::args().collect();
    let mut result = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "cron" => result.mode = IngestMode::Cron,
            "backfill" => result.mode = IngestMode::Backfill,
            "--batch-size" | "-b" => {
                i += 1;
                if i < args.len() {
                    result.batch_size = args[i].parse().ok();
                }
            }
            "--limit" | "-l" => {
                i += 1;
                if i < args.len() {
                    result.limit = args[i].parse().unwrap_or(0);
                }
            }
            "--skip-vectors" => result.skip_vectors = true,
            "--help" | "-h" => {
                print_help();
                return None;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_help();
                return None;
            }
        }
        i += 1;
    }
    Some(result)
}

fn print_help() {
    println!(
        "rfqai-ingest — run one ingest-and-reprocess cycle

USAGE:
    rfqai-ingest [cron|backfill] [OPTIONS]

MODES:
    cron        Incremental run; reprocess only RFQs changed in this run (default)
    backfill    Full run; reprocess every ingested RFQ

OPTIONS:
    -b, --batch-size <N>   Rows per source API call (clamped to the API ceiling)
    -l, --limit <N>        Backfill: cap on RFQs reprocessed (0 = all)
        --skip-vectors     Ingest only; skip embedding and reconciliation
    -h, --help             Show this help"
    );
}

async fn execute(args: Args) -> Result<bool> {
    let settings = Settings::from_env();
    settings.validate()?;

    let contracts = match &settings.source_contracts_path {
        Some(path) => {
            let doc = std::fs::read_to_string(path)
                .map_err(|e| rfqai_core::Error::Config(format!("cannot read {path}: {e}")))?;
            TableContracts::from_json(&doc)?
        }
        None => TableContracts::identity(),
    };

    let db = Database::connect(&settings.database_url).await?;
    db.migrate().await?;

    let client = SourceClient::new(SourceConfig::from_settings(&settings)?)?;
    let page_size_hint = args.batch_size.unwrap_or(settings.source_max_rows_per_call);

    let orchestrator =
        IngestOrchestrator::new(&client, &db.runs, &db.entities, &contracts, page_size_hint);
    let report = orchestrator.run(args.mode).await?;

    info!(
        subsystem = "cli",
        component = "rfqai-ingest",
        op = "ingest_done",
        run_id = %report.run_id,
        status = %report.status,
        changed_rfq_count = report.changed_rfq_count,
        "Ingest phase finished"
    );

    if !report.succeeded() {
        return Ok(false);
    }
    if args.skip_vectors {
        return Ok(true);
    }

    let embedder = GeminiEmbedder::from_settings(&settings)?;
    let extractor = NoopExtractor;
    let chunk_params = ChunkParams {
        size: settings.chunk_size,
        overlap: settings.chunk_overlap,
    };
    let reprocessor = ReprocessOrchestrator::new(
        &db.runs,
        &db.bundles,
        &db.vectors,
        &embedder,
        &extractor,
        &contracts,
        chunk_params,
    )
    .changed_batch_size(settings.changed_batch_size);

    let scope = match args.mode {
        IngestMode::Cron => ReprocessScope::ChangedInRun(report.run_id),
        IngestMode::Backfill => ReprocessScope::AllRfqs { limit: args.limit },
    };
    let reprocess_report = reprocessor.run(scope).await?;

    info!(
        subsystem = "cli",
        component = "rfqai-ingest",
        op = "reprocess_done",
        ok = reprocess_report.ok,
        failed = reprocess_report.failed,
        "Reprocess phase finished"
    );
    Ok(reprocess_report.succeeded())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let Some(args) = parse_args() else {
        return ExitCode::SUCCESS;
    };

    match execute(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!(
                subsystem = "cli",
                component = "rfqai-ingest",
                error = %e,
                "Run aborted"
            );
            ExitCode::from(2)
        }
    }
}
