use chrono::{Duration, NaiveDate, Utc};
use tidemark_engine::{
    apply_results_at, select_candidates_at, ExtractionOutcome, FetchMode, MemoryWatermarkStore,
    SelectOptions, SymbolBase, WatermarkError, WatermarkStore,
};

// Candidate selection rules against the in-process store.

fn listing(symbol_id: i64, symbol: &str, exchange: &str, asset_type: &str) -> SymbolBase {
    SymbolBase {
        symbol_id,
        symbol: symbol.to_string(),
        exchange: exchange.to_string(),
        asset_type: asset_type.to_string(),
        status: "Active".to_string(),
        ipo_date: None,
        delisting_date: None,
    }
}

fn success(symbol_id: i64, max: NaiveDate) -> ExtractionOutcome {
    ExtractionOutcome::Success {
        symbol_id,
        min_observed: Some(max - Duration::days(365)),
        max_observed: Some(max),
    }
}

#[tokio::test]
async fn ineligible_rows_never_surface() {
    let source = "BALANCE_SHEET";
    let now = Utc::now();

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(
            source,
            &[
                listing(1, "AAA", "NYSE", "Stock"),
                listing(2, "SPY", "NYSE", "ETF"),
            ],
            &|base| base.asset_type == "Stock",
        )
        .await
        .unwrap();

    // the ETF stays invisible no matter how the knobs are turned
    let variants = [
        SelectOptions::default(),
        SelectOptions {
            exchange: Some("NYSE".to_string()),
            ..Default::default()
        },
        SelectOptions {
            skip_recent_hours: Some(1),
            max_candidates: Some(10),
            ..Default::default()
        },
    ];
    for options in variants {
        let candidates = select_candidates_at(&store, source, &options, now)
            .await
            .unwrap();
        assert!(candidates.iter().all(|c| c.symbol_id == 1), "{options:?}");
    }
}

#[tokio::test]
async fn exchange_filter_restricts_the_batch() {
    let source = "TIME_SERIES_DAILY_ADJUSTED";
    let now = Utc::now();

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(
            source,
            &[
                listing(1, "AAA", "NYSE", "Stock"),
                listing(2, "BBB", "NASDAQ", "Stock"),
                listing(3, "CCC", "NYSE", "Stock"),
            ],
            &|_| true,
        )
        .await
        .unwrap();

    let options = SelectOptions {
        exchange: Some("NYSE".to_string()),
        ..Default::default()
    };
    let candidates = select_candidates_at(&store, source, &options, now)
        .await
        .unwrap();
    let symbols: Vec<&str> = candidates.iter().map(|c| c.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AAA", "CCC"]);
}

#[tokio::test]
async fn capped_batches_are_reproducible() {
    let source = "TIME_SERIES_DAILY_ADJUSTED";
    let now = Utc::now();

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(
            source,
            &[
                listing(5, "EEE", "NYSE", "Stock"),
                listing(3, "CCC", "NYSE", "Stock"),
                listing(1, "AAA", "NYSE", "Stock"),
                listing(4, "DDD", "NYSE", "Stock"),
                listing(2, "BBB", "NYSE", "Stock"),
            ],
            &|_| true,
        )
        .await
        .unwrap();

    let options = SelectOptions {
        max_candidates: Some(2),
        ..Default::default()
    };
    let first = select_candidates_at(&store, source, &options, now)
        .await
        .unwrap();
    let second = select_candidates_at(&store, source, &options, now)
        .await
        .unwrap();

    assert_eq!(first, second);
    let symbols: Vec<&str> = first.iter().map(|c| c.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AAA", "BBB"]);
}

#[tokio::test]
async fn snapshot_staleness_gates_candidacy() {
    let source = "BALANCE_SHEET"; // staleness 135d, complete history every fetch
    let now = Utc::now();
    let today = now.date_naive();

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(
            source,
            &[
                listing(1, "FRESH", "NYSE", "Stock"),
                listing(2, "STALE", "NYSE", "Stock"),
                listing(3, "NEW", "NYSE", "Stock"),
            ],
            &|_| true,
        )
        .await
        .unwrap();

    apply_results_at(
        &mut store,
        source,
        &[
            success(1, today - Duration::days(10)),
            success(2, today - Duration::days(200)),
        ],
        now,
    )
    .await
    .unwrap();

    let candidates = select_candidates_at(&store, source, &SelectOptions::default(), now)
        .await
        .unwrap();

    let symbols: Vec<&str> = candidates.iter().map(|c| c.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["NEW", "STALE"]);
    assert!(candidates.iter().all(|c| c.mode == FetchMode::Full));
}

#[tokio::test]
async fn bad_options_are_configuration_errors() {
    let now = Utc::now();
    let store = MemoryWatermarkStore::new();

    let negative_staleness = SelectOptions {
        staleness_days: Some(-1),
        ..Default::default()
    };
    assert!(matches!(
        select_candidates_at(&store, "BALANCE_SHEET", &negative_staleness, now).await,
        Err(WatermarkError::Configuration(_))
    ));

    let negative_recency = SelectOptions {
        skip_recent_hours: Some(-24),
        ..Default::default()
    };
    assert!(matches!(
        select_candidates_at(&store, "BALANCE_SHEET", &negative_recency, now).await,
        Err(WatermarkError::Configuration(_))
    ));

    assert!(matches!(
        select_candidates_at(&store, "TYPO_SOURCE", &SelectOptions::default(), now).await,
        Err(WatermarkError::Configuration(_))
    ));

    assert!(matches!(
        select_candidates_at(&store, "  ", &SelectOptions::default(), now).await,
        Err(WatermarkError::Configuration(_))
    ));
}

#[tokio::test]
async fn unknown_source_allowed_with_explicit_staleness() {
    let source = "VENDOR_SPECIALS";
    let now = Utc::now();

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(source, &[listing(1, "AAA", "NYSE", "Stock")], &|_| true)
        .await
        .unwrap();

    let options = SelectOptions {
        staleness_days: Some(30),
        ..Default::default()
    };
    let candidates = select_candidates_at(&store, source, &options, now)
        .await
        .unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].mode, FetchMode::Full);
}
