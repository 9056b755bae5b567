use crate::cli::Commands;
use chrono::NaiveDate;
use deadpool_postgres::{ManagerConfig, RecyclingMethod};
use dotenv::var;
use serde::Deserialize;
use std::path::Path;
use tidemark_engine::{
    apply_results, select_candidates, Eligibility, ExtractionOutcome, FailureKind,
    PgWatermarkStore, SelectOptions, SymbolBase, WatermarkStore,
};
use tracing::{debug, info, trace};

/// Run one watermark operation against the ledger database.
pub(crate) async fn dispatch(command: Commands) -> anyhow::Result<()> {
    let store = connect().await?;

    match command {
        Commands::Init { source, universe } => init(store, &source, &universe).await,
        Commands::Plan {
            source,
            exchange,
            limit,
            skip_recent_hours,
            staleness_days,
        } => {
            plan(
                store,
                &source,
                SelectOptions {
                    exchange,
                    max_candidates: limit,
                    skip_recent_hours,
                    staleness_days,
                },
            )
            .await
        }
        Commands::Apply { source, results } => apply(store, &source, &results).await,
        Commands::Status { source } => status(store, &source).await,
    }
}

async fn connect() -> anyhow::Result<PgWatermarkStore> {
    trace!("creating postgres connection pool config");
    let mut pg_config = deadpool_postgres::Config::new();
    pg_config.url = Some(var("WATERMARK_DB_URL")?);
    pg_config.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = pg_config.create_pool(
        Some(deadpool_postgres::Runtime::Tokio1),
        tokio_postgres::NoTls,
    )?;
    debug!("watermark ledger connection pool established");

    let store = PgWatermarkStore::new(pool);
    store.ensure_schema().await?;
    Ok(store)
}

// init
// ----------------------------------------------------------------------------

async fn init(mut store: PgWatermarkStore, source: &str, path: &Path) -> anyhow::Result<()> {
    let profile = tidemark_engine::profile(source)
        .ok_or_else(|| anyhow::anyhow!("unknown data source {source}"))?;

    trace!("reading universe snapshot at {}", path.display());
    let bytes = tokio::fs::read(path).await?;
    let universe: Vec<SymbolBase> = serde_json::from_slice(&bytes)?;
    info!("onboarding {source} from {} listed symbols", universe.len());

    let rule = profile.universe;
    let merged = store
        .initialize_source(source, &universe, &|base| rule.allows(base))
        .await?;

    println!("{source}: {merged} watermark records on file");
    Ok(())
}

// plan
// ----------------------------------------------------------------------------

async fn plan(
    store: PgWatermarkStore,
    source: &str,
    options: SelectOptions,
) -> anyhow::Result<()> {
    let candidates = select_candidates(&store, source, &options).await?;
    info!("{source}: {} candidates selected", candidates.len());

    for candidate in &candidates {
        println!(
            "{}\t{}\t{}",
            candidate.symbol_id,
            candidate.symbol,
            candidate.mode.as_str()
        );
    }
    Ok(())
}

// apply
// ----------------------------------------------------------------------------

// one row of the extraction driver's outcome file
#[derive(Debug, Deserialize)]
struct OutcomeRow {
    symbol_id: i64,
    outcome: String,
    #[serde(default)]
    min_observed: Option<NaiveDate>,
    #[serde(default)]
    max_observed: Option<NaiveDate>,
    #[serde(default)]
    error: Option<String>,
}

impl OutcomeRow {
    fn into_outcome(self) -> anyhow::Result<ExtractionOutcome> {
        match self.outcome.as_str() {
            "success" => Ok(ExtractionOutcome::Success {
                symbol_id: self.symbol_id,
                min_observed: self.min_observed,
                max_observed: self.max_observed,
            }),
            "failure" => {
                let kind = match self.error.as_deref() {
                    Some("network") => FailureKind::Network,
                    Some("api") => FailureKind::Api,
                    Some("parse") => FailureKind::Parse,
                    other => anyhow::bail!(
                        "unrecognized error kind {other:?} for symbol {}",
                        self.symbol_id
                    ),
                };
                Ok(ExtractionOutcome::Failure {
                    symbol_id: self.symbol_id,
                    kind,
                })
            }
            other => anyhow::bail!("unrecognized outcome {other:?} for symbol {}", self.symbol_id),
        }
    }
}

async fn apply(mut store: PgWatermarkStore, source: &str, path: &Path) -> anyhow::Result<()> {
    trace!("reading outcome file at {}", path.display());
    let bytes = tokio::fs::read(path).await?;
    let rows: Vec<OutcomeRow> = serde_json::from_slice(&bytes)?;
    let results = rows
        .into_iter()
        .map(OutcomeRow::into_outcome)
        .collect::<anyhow::Result<Vec<_>>>()?;
    info!("applying {} outcomes to {source}", results.len());

    let summary = apply_results(&mut store, source, &results).await?;
    println!(
        "{source}: {} succeeded, {} failed, {} missing",
        summary.successes.len(),
        summary.failures.len(),
        summary.missing.len()
    );
    for err in summary.not_found(source) {
        println!("  {err}; run `tidemark init` first");
    }
    Ok(())
}

// status
// ----------------------------------------------------------------------------

async fn status(store: PgWatermarkStore, source: &str) -> anyhow::Result<()> {
    let records = store.query(source, &|_| true).await?;
    if records.is_empty() {
        println!("{source}: no watermark records; run `tidemark init`");
        return Ok(());
    }

    let mut eligible = 0;
    let mut out_of_scope = 0;
    let mut retired = 0;
    let mut never_run = 0;
    let mut failing = 0;
    let mut high_water: Option<NaiveDate> = None;
    for record in &records {
        match record.api_eligible {
            Eligibility::Yes => eligible += 1,
            Eligibility::No => out_of_scope += 1,
            Eligibility::Del => retired += 1,
        }
        if record.last_successful_run.is_none() {
            never_run += 1;
        }
        if record.consecutive_failures > 0 {
            failing += 1;
        }
        high_water = match (high_water, record.last_fiscal_date) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, None) => a,
            (None, b) => b,
        };
    }

    println!("{source}: {} watermark records", records.len());
    println!("  eligible:      {eligible}");
    println!("  out of scope:  {out_of_scope}");
    println!("  retired (DEL): {retired}");
    println!("  never run:     {never_run}");
    println!("  failing:       {failing}");
    match high_water {
        Some(date) => println!("  latest fiscal date: {date}"),
        None => println!("  latest fiscal date: none"),
    }
    Ok(())
}
