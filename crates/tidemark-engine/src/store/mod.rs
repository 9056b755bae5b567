mod sql;

/// In-process ledger for hermetic tests and dev runs.
pub mod memory;

/// PostgreSQL-backed ledger; the production persistence layer.
pub mod pg;

pub use memory::MemoryWatermarkStore;
pub use pg::PgWatermarkStore;

use crate::error::WatermarkError;
use crate::record::{SymbolBase, WatermarkRecord};
use chrono::{DateTime, NaiveDate, Utc};

/// One staged row of a bulk watermark merge.
///
/// A success row carries the observed fiscal-date span (both `None` when the
/// source produced no dated records); a failure row only bumps the failure
/// counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatermarkUpdate {
    pub symbol_id: i64,
    pub success: bool,
    pub min_observed: Option<NaiveDate>,
    pub max_observed: Option<NaiveDate>,
}

/// Sole boundary to the persisted watermark ledger. No other component may
/// write to the underlying table.
///
/// The operational model assumes one extraction run per data source at a
/// time; sequential `bulk_upsert` calls for the same key apply in call order,
/// and the store takes no locks against racing drivers.
#[allow(async_fn_in_trait)]
pub trait WatermarkStore {
    /// Onboard (or re-onboard) `table_name`: one ledger row per universe
    /// symbol, with eligibility computed by `predicate`.
    ///
    /// Re-running refreshes descriptive attributes only; extraction progress
    /// survives, and a `Del` row stays `Del`. Returns the number of rows
    /// merged.
    async fn initialize_source(
        &mut self,
        table_name: &str,
        universe: &[SymbolBase],
        predicate: &dyn Fn(&SymbolBase) -> bool,
    ) -> Result<u64, WatermarkError>;

    /// Read-only filtered scan of one source's ledger rows.
    async fn query(
        &self,
        table_name: &str,
        predicate: &dyn Fn(&WatermarkRecord) -> bool,
    ) -> Result<Vec<WatermarkRecord>, WatermarkError>;

    /// The only mutation path: merge a staged batch of extraction results
    /// into the ledger in a single storage round-trip.
    ///
    /// Returns the symbol ids that matched an existing row; ids absent from
    /// the ledger are left to the caller to report. `updates` must not
    /// contain duplicate symbol ids.
    async fn bulk_upsert(
        &mut self,
        table_name: &str,
        updates: &[WatermarkUpdate],
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, WatermarkError>;
}

pub(crate) fn validate_table_name(table_name: &str) -> Result<(), WatermarkError> {
    if table_name.trim().is_empty() {
        return Err(WatermarkError::Configuration(
            "table_name must not be empty".to_string(),
        ));
    }
    Ok(())
}
