use chrono::{Duration, NaiveDate, Utc};
use tidemark_engine::{
    apply_results_at, profile, select_candidates_at, Eligibility, ExtractionOutcome, FailureKind,
    MemoryWatermarkStore, SelectOptions, SymbolBase, WatermarkStore,
};

// Watermark ledger lifecycle, end to end on the in-process store.

fn stock(symbol_id: i64, symbol: &str) -> SymbolBase {
    SymbolBase {
        symbol_id,
        symbol: symbol.to_string(),
        exchange: "NYSE".to_string(),
        asset_type: "Stock".to_string(),
        status: "Active".to_string(),
        ipo_date: NaiveDate::from_ymd_opt(2005, 6, 1),
        delisting_date: None,
    }
}

fn success(symbol_id: i64, min: NaiveDate, max: NaiveDate) -> ExtractionOutcome {
    ExtractionOutcome::Success {
        symbol_id,
        min_observed: Some(min),
        max_observed: Some(max),
    }
}

#[tokio::test]
async fn onboarding_scenario() {
    let source = "BALANCE_SHEET";
    let now = Utc::now();
    let yesterday = now.date_naive() - Duration::days(1);

    let etf = SymbolBase {
        asset_type: "ETF".to_string(),
        ..stock(2, "BBB")
    };
    let delisted = SymbolBase {
        status: "Delisted".to_string(),
        delisting_date: Some(yesterday),
        ..stock(3, "CCC")
    };

    let rule = profile(source).unwrap().universe;
    let mut store = MemoryWatermarkStore::new();
    let merged = store
        .initialize_source(
            source,
            &[stock(1, "AAA"), etf, delisted],
            &|base| rule.allows(base),
        )
        .await
        .unwrap();
    assert_eq!(merged, 3);

    // the ETF and the already-delisted stock are out of scope, not DEL:
    // DEL is reserved for the transition after a successful capture
    assert_eq!(store.get(source, 1).unwrap().api_eligible, Eligibility::Yes);
    assert_eq!(store.get(source, 2).unwrap().api_eligible, Eligibility::No);
    assert_eq!(store.get(source, 3).unwrap().api_eligible, Eligibility::No);

    let candidates = select_candidates_at(&store, source, &SelectOptions::default(), now)
        .await
        .unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].symbol, "AAA");
}

#[tokio::test]
async fn reinitialization_preserves_progress() {
    let source = "BALANCE_SHEET";
    let now = Utc::now();
    let fiscal = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(source, &[stock(1, "AAA"), stock(2, "BBB")], &|_| true)
        .await
        .unwrap();

    apply_results_at(&mut store, source, &[success(1, fiscal, fiscal)], now)
        .await
        .unwrap();

    // a fresh universe snapshot moves AAA to a new exchange
    let moved = SymbolBase {
        exchange: "NASDAQ".to_string(),
        ..stock(1, "AAA")
    };
    store
        .initialize_source(source, &[moved, stock(2, "BBB")], &|_| true)
        .await
        .unwrap();

    assert_eq!(store.len(), 2);
    let record = store.get(source, 1).unwrap();
    assert_eq!(record.exchange, "NASDAQ");
    assert_eq!(record.first_fiscal_date, Some(fiscal));
    assert_eq!(record.last_fiscal_date, Some(fiscal));
    assert_eq!(record.last_successful_run, Some(now));
}

#[tokio::test]
async fn delisting_retires_after_final_capture() {
    let source = "TIME_SERIES_DAILY_ADJUSTED";
    let now = Utc::now();
    let today = now.date_naive();

    // the time-series universe keeps delisted tickers so their final prices
    // can be captured
    let fading = SymbolBase {
        status: "Delisted".to_string(),
        delisting_date: Some(today - Duration::days(3)),
        ..stock(7, "GGG")
    };

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(source, &[fading], &|_| true)
        .await
        .unwrap();
    assert_eq!(store.get(source, 7).unwrap().api_eligible, Eligibility::Yes);

    let summary = apply_results_at(
        &mut store,
        source,
        &[success(7, today - Duration::days(30), today - Duration::days(3))],
        now,
    )
    .await
    .unwrap();
    assert_eq!(summary.successes, vec![7]);
    assert_eq!(store.get(source, 7).unwrap().api_eligible, Eligibility::Del);

    // retired rows never reappear in a batch, and re-onboarding keeps them DEL
    let candidates = select_candidates_at(&store, source, &SelectOptions::default(), now)
        .await
        .unwrap();
    assert!(candidates.is_empty());

    let relisted = SymbolBase {
        status: "Active".to_string(),
        ..stock(7, "GGG")
    };
    store
        .initialize_source(source, &[relisted], &|_| true)
        .await
        .unwrap();
    assert_eq!(store.get(source, 7).unwrap().api_eligible, Eligibility::Del);
}

#[tokio::test]
async fn failure_streaks_count_and_reset() {
    let source = "CASH_FLOW";
    let now = Utc::now();
    let today = now.date_naive();

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(source, &[stock(1, "AAA")], &|_| true)
        .await
        .unwrap();

    for attempt in 1..=3 {
        let summary = apply_results_at(
            &mut store,
            source,
            &[ExtractionOutcome::Failure {
                symbol_id: 1,
                kind: FailureKind::Network,
            }],
            now,
        )
        .await
        .unwrap();
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(store.get(source, 1).unwrap().consecutive_failures, attempt);
    }

    // failures never touch the fiscal window or the run timestamp
    let record = store.get(source, 1).unwrap();
    assert_eq!(record.last_successful_run, None);
    assert_eq!(record.last_fiscal_date, None);

    apply_results_at(
        &mut store,
        source,
        &[success(1, today - Duration::days(90), today - Duration::days(90))],
        now,
    )
    .await
    .unwrap();
    assert_eq!(store.get(source, 1).unwrap().consecutive_failures, 0);
}

#[tokio::test]
async fn fiscal_window_is_monotonic() {
    let source = "TIME_SERIES_DAILY_ADJUSTED";
    let now = Utc::now();
    let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(source, &[stock(1, "AAA")], &|_| true)
        .await
        .unwrap();

    apply_results_at(
        &mut store,
        source,
        &[success(1, d("2024-01-02"), d("2025-06-30"))],
        now,
    )
    .await
    .unwrap();

    // a later compact fetch sees a narrower, older window
    apply_results_at(
        &mut store,
        source,
        &[success(1, d("2025-05-01"), d("2025-05-30"))],
        now,
    )
    .await
    .unwrap();

    let record = store.get(source, 1).unwrap();
    assert_eq!(record.first_fiscal_date, Some(d("2024-01-02")));
    assert_eq!(record.last_fiscal_date, Some(d("2025-06-30")));
}

#[tokio::test]
async fn replaying_a_batch_is_idempotent() {
    let source = "INCOME_STATEMENT";
    let now = Utc::now();
    let d = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(source, &[stock(1, "AAA")], &|_| true)
        .await
        .unwrap();

    let batch = [success(1, d, d)];
    apply_results_at(&mut store, source, &batch, now).await.unwrap();
    let first_pass = store.get(source, 1).unwrap().clone();

    apply_results_at(&mut store, source, &batch, now).await.unwrap();
    assert_eq!(store.get(source, 1).unwrap(), &first_pass);
}

#[tokio::test]
async fn strays_are_reported_not_fatal() {
    let source = "OVERVIEW";
    let now = Utc::now();
    let today = now.date_naive();

    let mut store = MemoryWatermarkStore::new();
    store
        .initialize_source(source, &[stock(1, "AAA")], &|_| true)
        .await
        .unwrap();

    let summary = apply_results_at(
        &mut store,
        source,
        &[
            success(1, today, today),
            success(99, today, today),
            ExtractionOutcome::Failure {
                symbol_id: 98,
                kind: FailureKind::Parse,
            },
        ],
        now,
    )
    .await
    .unwrap();

    assert_eq!(summary.successes, vec![1]);
    assert!(summary.failures.is_empty());
    assert_eq!(summary.missing, vec![99, 98]);
    assert!(!summary.all_found());
    assert_eq!(summary.applied(), 1);

    let diagnostics: Vec<String> = summary.not_found(source).map(|e| e.to_string()).collect();
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics[0].contains("(OVERVIEW, 99)"));

    // the found row was still updated
    assert_eq!(store.get(source, 1).unwrap().last_successful_run, Some(now));
}

#[test]
fn universe_snapshot_shape() {
    let raw = r#"{
        "symbol_id": 31415,
        "symbol": "AAPL",
        "exchange": "NASDAQ",
        "asset_type": "Stock",
        "status": "Active",
        "ipo_date": "1980-12-12",
        "delisting_date": null
    }"#;
    let base: SymbolBase = serde_json::from_str(raw).unwrap();
    assert_eq!(base.symbol_id, 31415);
    assert_eq!(base.ipo_date, NaiveDate::from_ymd_opt(1980, 12, 12));
    assert_eq!(base.delisting_date, None);
}
