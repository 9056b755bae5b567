/// Error taxonomy for every engine operation.
pub mod error;

/// Candidate selection: which (source, symbol) pairs to attempt this run,
/// and in which fetch mode.
pub mod filter;

/// Watermark and symbol-universe record types.
pub mod record;

/// Per-source extraction profiles (staleness thresholds, refresh semantics,
/// universe rules).
pub mod source;

/// The persistence boundary: the `WatermarkStore` trait and its PostgreSQL
/// and in-memory implementations.
pub mod store;

/// Post-extraction bookkeeping: fold a batch of per-symbol outcomes into the
/// watermark ledger.
pub mod update;

pub use error::WatermarkError;
pub use filter::{select_candidates, select_candidates_at, Candidate, SelectOptions};
pub use record::{Eligibility, SymbolBase, WatermarkRecord};
pub use source::{profile, FetchMode, Refresh, SourceProfile, UniverseRule};
pub use store::{MemoryWatermarkStore, PgWatermarkStore, WatermarkStore, WatermarkUpdate};
pub use update::{
    apply_results, apply_results_at, ExtractionOutcome, FailureKind, FailureRecord, UpdateSummary,
};

/// Elapsed-time suffix for debug logs.
pub(crate) fn time_elapsed(time: std::time::Instant) -> String {
    format!(
        "\x1b[38;5;208melapsed time: {} ms\x1b[0m",
        time.elapsed().as_millis()
    )
}
