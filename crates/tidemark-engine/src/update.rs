use crate::error::WatermarkError;
use crate::store::{validate_table_name, WatermarkStore, WatermarkUpdate};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error};

// outcomes
// ----------------------------------------------------------------------------

/// Classified failure reported by the extraction driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Api,
    Parse,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Api => "api",
            FailureKind::Parse => "parse",
        }
    }
}

/// Per-symbol outcome of one extraction attempt.
///
/// "No data found" is a success with both observed dates `None`; only
/// transport, API and parse errors count as failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Success {
        symbol_id: i64,
        min_observed: Option<NaiveDate>,
        max_observed: Option<NaiveDate>,
    },
    Failure {
        symbol_id: i64,
        kind: FailureKind,
    },
}

impl ExtractionOutcome {
    pub fn symbol_id(&self) -> i64 {
        match self {
            ExtractionOutcome::Success { symbol_id, .. } => *symbol_id,
            ExtractionOutcome::Failure { symbol_id, .. } => *symbol_id,
        }
    }
}

impl From<&ExtractionOutcome> for WatermarkUpdate {
    fn from(outcome: &ExtractionOutcome) -> Self {
        match outcome {
            ExtractionOutcome::Success {
                symbol_id,
                min_observed,
                max_observed,
            } => WatermarkUpdate {
                symbol_id: *symbol_id,
                success: true,
                min_observed: *min_observed,
                max_observed: *max_observed,
            },
            ExtractionOutcome::Failure { symbol_id, .. } => WatermarkUpdate {
                symbol_id: *symbol_id,
                success: false,
                min_observed: None,
                max_observed: None,
            },
        }
    }
}

// summary
// ----------------------------------------------------------------------------

/// A failure recorded against the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FailureRecord {
    pub symbol_id: i64,
    pub kind: FailureKind,
}

/// Outcome report of one [`apply_results`] call; every input symbol lands in
/// exactly one of the three lists.
#[derive(Clone, Debug, Default)]
pub struct UpdateSummary {
    /// Success outcomes folded into the ledger.
    pub successes: Vec<i64>,
    /// Failure outcomes folded into the ledger.
    pub failures: Vec<FailureRecord>,
    /// Symbol ids with no watermark record; nothing was applied for these.
    pub missing: Vec<i64>,
}

impl UpdateSummary {
    /// Rows actually written.
    pub fn applied(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn all_found(&self) -> bool {
        self.missing.is_empty()
    }

    /// Materialize the per-symbol lookup misses as errors, for driver-side
    /// diagnostics.
    pub fn not_found<'a>(
        &'a self,
        table_name: &'a str,
    ) -> impl Iterator<Item = WatermarkError> + 'a {
        self.missing
            .iter()
            .map(move |&symbol_id| WatermarkError::WatermarkNotFound {
                table_name: table_name.to_string(),
                symbol_id,
            })
    }
}

// apply
// ----------------------------------------------------------------------------

/// Fold a batch of extraction outcomes into the watermark ledger.
///
/// Unknown symbol ids never abort the batch: updates land for the rows that
/// exist and the strays are reported in the summary.
pub async fn apply_results<S: WatermarkStore>(
    store: &mut S,
    table_name: &str,
    results: &[ExtractionOutcome],
) -> Result<UpdateSummary, WatermarkError> {
    apply_results_at(store, table_name, results, Utc::now()).await
}

/// [`apply_results`] against an explicit clock reading. Replaying the same
/// batch with the same reading leaves the ledger unchanged.
pub async fn apply_results_at<S: WatermarkStore>(
    store: &mut S,
    table_name: &str,
    results: &[ExtractionOutcome],
    now: DateTime<Utc>,
) -> Result<UpdateSummary, WatermarkError> {
    validate_table_name(table_name)?;
    if results.is_empty() {
        return Ok(UpdateSummary::default());
    }

    for outcome in results {
        if let ExtractionOutcome::Success {
            symbol_id,
            min_observed: Some(min),
            max_observed: Some(max),
        } = outcome
        {
            if min > max {
                return Err(WatermarkError::Configuration(format!(
                    "observed range inverted for symbol {symbol_id}: {min} > {max}"
                )));
            }
        }
    }

    // the driver may report a symbol twice (e.g. a retry); last occurrence wins
    let mut deduped: Vec<&ExtractionOutcome> = Vec::with_capacity(results.len());
    let mut position: HashMap<i64, usize> = HashMap::with_capacity(results.len());
    for outcome in results {
        match position.get(&outcome.symbol_id()) {
            Some(&idx) => deduped[idx] = outcome,
            None => {
                position.insert(outcome.symbol_id(), deduped.len());
                deduped.push(outcome);
            }
        }
    }
    if deduped.len() < results.len() {
        debug!(
            "{table_name}: {} duplicate outcomes collapsed",
            results.len() - deduped.len()
        );
    }

    let staged: Vec<WatermarkUpdate> = deduped.iter().map(|outcome| (*outcome).into()).collect();
    let matched: HashSet<i64> = store
        .bulk_upsert(table_name, &staged, now)
        .await?
        .into_iter()
        .collect();

    let mut summary = UpdateSummary::default();
    for outcome in deduped {
        let symbol_id = outcome.symbol_id();
        if !matched.contains(&symbol_id) {
            error!("no watermark record for ({table_name}, {symbol_id}); source never initialized?");
            summary.missing.push(symbol_id);
            continue;
        }
        match outcome {
            ExtractionOutcome::Success { .. } => summary.successes.push(symbol_id),
            ExtractionOutcome::Failure { kind, .. } => summary.failures.push(FailureRecord {
                symbol_id,
                kind: *kind,
            }),
        }
    }

    debug!(
        "{table_name}: {} outcomes applied ({} successes, {} failures), {} missing",
        summary.applied(),
        summary.successes.len(),
        summary.failures.len(),
        summary.missing.len()
    );

    Ok(summary)
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
fn test_base(symbol_id: i64, symbol: &str) -> crate::record::SymbolBase {
    crate::record::SymbolBase {
        symbol_id,
        symbol: symbol.to_string(),
        exchange: "NYSE".to_string(),
        asset_type: "Stock".to_string(),
        status: "Active".to_string(),
        ipo_date: None,
        delisting_date: None,
    }
}

#[tokio::test]
async fn duplicate_outcomes_last_wins() {
    use crate::store::MemoryWatermarkStore;

    let source = "BALANCE_SHEET";
    let now = chrono::Utc::now();
    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(source, &[test_base(1, "AAA")], &|_| true)
        .await
        .unwrap();

    // a failure retried into a success within one batch
    let summary = apply_results_at(
        &mut store,
        source,
        &[
            ExtractionOutcome::Failure {
                symbol_id: 1,
                kind: FailureKind::Network,
            },
            ExtractionOutcome::Success {
                symbol_id: 1,
                min_observed: None,
                max_observed: None,
            },
        ],
        now,
    )
    .await
    .unwrap();

    assert_eq!(summary.successes, vec![1]);
    assert!(summary.failures.is_empty());
    let record = store.get(source, 1).unwrap();
    assert_eq!(record.consecutive_failures, 0);
    assert_eq!(record.last_successful_run, Some(now));
}

#[tokio::test]
async fn inverted_observed_range_is_rejected() {
    use crate::store::MemoryWatermarkStore;

    let now = chrono::Utc::now();
    let today = now.date_naive();
    let mut store = MemoryWatermarkStore::new();

    let result = apply_results_at(
        &mut store,
        "BALANCE_SHEET",
        &[ExtractionOutcome::Success {
            symbol_id: 1,
            min_observed: Some(today),
            max_observed: Some(today - chrono::Duration::days(1)),
        }],
        now,
    )
    .await;

    assert!(matches!(result, Err(WatermarkError::Configuration(_))));
}
