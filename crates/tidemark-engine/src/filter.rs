use crate::error::WatermarkError;
use crate::record::{Eligibility, WatermarkRecord};
use crate::source::{self, FetchMode, Refresh};
use crate::store::{validate_table_name, WatermarkStore};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

// select
// ----------------------------------------------------------------------------

/// Caller-tunable knobs for a single candidate selection run.
#[derive(Clone, Debug, Default)]
pub struct SelectOptions {
    /// Restrict to records listed on this exchange.
    pub exchange: Option<String>,
    /// Cap the batch size (test runs).
    pub max_candidates: Option<usize>,
    /// Exclude records refreshed within the last N hours.
    pub skip_recent_hours: Option<i64>,
    /// Override the source's default staleness threshold (days).
    pub staleness_days: Option<i64>,
}

/// A (symbol, mode) pair scheduled for extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub symbol_id: i64,
    pub symbol: String,
    pub mode: FetchMode,
}

/// Select the extraction batch for `table_name`.
pub async fn select_candidates<S: WatermarkStore>(
    store: &S,
    table_name: &str,
    options: &SelectOptions,
) -> Result<Vec<Candidate>, WatermarkError> {
    select_candidates_at(store, table_name, options, Utc::now()).await
}

/// [`select_candidates`] against an explicit clock reading.
pub async fn select_candidates_at<S: WatermarkStore>(
    store: &S,
    table_name: &str,
    options: &SelectOptions,
    now: DateTime<Utc>,
) -> Result<Vec<Candidate>, WatermarkError> {
    let (staleness_days, refresh) = resolve_profile(table_name, options)?;

    let records = store
        .query(table_name, &|record: &WatermarkRecord| {
            record.api_eligible == Eligibility::Yes
        })
        .await?;
    trace!("{table_name}: {} eligible watermark rows", records.len());

    let stale_before = now.date_naive() - Duration::days(staleness_days);
    let recent_floor = options
        .skip_recent_hours
        .map(|hours| now - Duration::hours(hours));

    let mut candidates = Vec::new();
    for record in records {
        if let Some(exchange) = &options.exchange {
            if &record.exchange != exchange {
                continue;
            }
        }

        // a record never successfully run is always eligible on this axis
        if let (Some(floor), Some(last_run)) = (recent_floor, record.last_successful_run) {
            if last_run >= floor {
                continue;
            }
        }

        let mode = match refresh {
            Refresh::Incremental => match record.last_fiscal_date {
                None => FetchMode::Full,
                Some(last) if last < stale_before => FetchMode::Full,
                Some(_) => FetchMode::Compact,
            },
            Refresh::Snapshot => {
                if let Some(last) = record.last_fiscal_date {
                    if last > stale_before {
                        continue;
                    }
                }
                FetchMode::Full
            }
        };

        candidates.push(Candidate {
            symbol_id: record.symbol_id,
            symbol: record.symbol,
            mode,
        });
    }

    // stable order so capped test batches are reproducible
    candidates.sort_by(|a, b| {
        a.symbol
            .cmp(&b.symbol)
            .then(a.symbol_id.cmp(&b.symbol_id))
    });
    if let Some(cap) = options.max_candidates {
        candidates.truncate(cap);
    }

    debug!(
        "{table_name}: {} candidates selected (staleness {staleness_days}d)",
        candidates.len()
    );

    Ok(candidates)
}

fn resolve_profile(
    table_name: &str,
    options: &SelectOptions,
) -> Result<(i64, Refresh), WatermarkError> {
    validate_table_name(table_name)?;
    if let Some(days) = options.staleness_days {
        if days < 0 {
            return Err(WatermarkError::Configuration(format!(
                "staleness_days must not be negative, got {days}"
            )));
        }
    }
    if let Some(hours) = options.skip_recent_hours {
        if hours < 0 {
            return Err(WatermarkError::Configuration(format!(
                "skip_recent_hours must not be negative, got {hours}"
            )));
        }
    }

    let profile = source::profile(table_name);
    let staleness_days = options
        .staleness_days
        .or(profile.map(|p| p.staleness_days))
        .ok_or_else(|| {
            WatermarkError::Configuration(format!(
                "unknown data source {table_name} and no staleness_days override"
            ))
        })?;
    let refresh = profile.map(|p| p.refresh).unwrap_or(Refresh::Snapshot);

    Ok((staleness_days, refresh))
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
async fn mode_tracks_staleness() {
    use crate::store::MemoryWatermarkStore;
    use crate::update::{apply_results_at, ExtractionOutcome};

    let source = "TIME_SERIES_DAILY_ADJUSTED";
    let now = chrono::Utc::now();
    let today = now.date_naive();

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(
            source,
            &[test_base(1, "AAA"), test_base(2, "BBB"), test_base(3, "CCC")],
            &|_| true,
        )
        .await
        .unwrap();

    // AAA last saw data 10 days ago, BBB 2 days ago, CCC never ran
    apply_results_at(
        &mut store,
        source,
        &[
            ExtractionOutcome::Success {
                symbol_id: 1,
                min_observed: Some(today - chrono::Duration::days(400)),
                max_observed: Some(today - chrono::Duration::days(10)),
            },
            ExtractionOutcome::Success {
                symbol_id: 2,
                min_observed: Some(today - chrono::Duration::days(400)),
                max_observed: Some(today - chrono::Duration::days(2)),
            },
        ],
        now,
    )
    .await
    .unwrap();

    let candidates = select_candidates_at(&store, source, &SelectOptions::default(), now)
        .await
        .unwrap();

    assert_eq!(candidates.len(), 3);
    assert_eq!(candidates[0].symbol, "AAA");
    assert_eq!(candidates[0].mode, FetchMode::Full);
    assert_eq!(candidates[1].symbol, "BBB");
    assert_eq!(candidates[1].mode, FetchMode::Compact);
    assert_eq!(candidates[2].symbol, "CCC");
    assert_eq!(candidates[2].mode, FetchMode::Full);
}

#[tokio::test]
async fn skip_recent_hours_excludes_fresh_runs() {
    use crate::store::MemoryWatermarkStore;
    use crate::update::{apply_results_at, ExtractionOutcome};

    let source = "TIME_SERIES_DAILY_ADJUSTED";
    let now = chrono::Utc::now();
    let today = now.date_naive();

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(
            source,
            &[test_base(1, "AAA"), test_base(2, "BBB"), test_base(3, "CCC")],
            &|_| true,
        )
        .await
        .unwrap();

    let success = |symbol_id| ExtractionOutcome::Success {
        symbol_id,
        min_observed: Some(today - chrono::Duration::days(1)),
        max_observed: Some(today - chrono::Duration::days(1)),
    };

    // AAA refreshed an hour ago, BBB thirty hours ago, CCC never
    apply_results_at(&mut store, source, &[success(1)], now - chrono::Duration::hours(1))
        .await
        .unwrap();
    apply_results_at(&mut store, source, &[success(2)], now - chrono::Duration::hours(30))
        .await
        .unwrap();

    let options = SelectOptions {
        skip_recent_hours: Some(24),
        ..Default::default()
    };
    let candidates = select_candidates_at(&store, source, &options, now)
        .await
        .unwrap();

    let symbols: Vec<&str> = candidates.iter().map(|c| c.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BBB", "CCC"]);
}
