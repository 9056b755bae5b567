use super::{validate_table_name, WatermarkStore, WatermarkUpdate};
use crate::error::WatermarkError;
use crate::record::{Eligibility, SymbolBase, WatermarkRecord};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// In-process watermark ledger with the same merge semantics as
/// [`PgWatermarkStore`](super::PgWatermarkStore); backs the hermetic test
/// suite and doubles as a dev backend.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    rows: BTreeMap<(String, i64), WatermarkRecord>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Direct row lookup, for assertions.
    pub fn get(&self, table_name: &str, symbol_id: i64) -> Option<&WatermarkRecord> {
        self.rows.get(&(table_name.to_string(), symbol_id))
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    async fn initialize_source(
        &mut self,
        table_name: &str,
        universe: &[SymbolBase],
        predicate: &dyn Fn(&SymbolBase) -> bool,
    ) -> Result<u64, WatermarkError> {
        validate_table_name(table_name)?;
        let now = Utc::now();

        let mut merged = 0u64;
        for base in universe {
            let api_eligible = if predicate(base) {
                Eligibility::Yes
            } else {
                Eligibility::No
            };
            let key = (table_name.to_string(), base.symbol_id);
            match self.rows.entry(key) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().refresh_descriptive(base, api_eligible, now)
                }
                Entry::Vacant(entry) => {
                    entry.insert(WatermarkRecord::seeded(table_name, base, api_eligible, now));
                }
            }
            merged += 1;
        }

        Ok(merged)
    }

    async fn query(
        &self,
        table_name: &str,
        predicate: &dyn Fn(&WatermarkRecord) -> bool,
    ) -> Result<Vec<WatermarkRecord>, WatermarkError> {
        validate_table_name(table_name)?;
        Ok(self
            .rows
            .values()
            .filter(|record| record.table_name == table_name && predicate(record))
            .cloned()
            .collect())
    }

    async fn bulk_upsert(
        &mut self,
        table_name: &str,
        updates: &[WatermarkUpdate],
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, WatermarkError> {
        validate_table_name(table_name)?;
        let today = now.date_naive();

        let mut matched = Vec::with_capacity(updates.len());
        for update in updates {
            let key = (table_name.to_string(), update.symbol_id);
            let Some(record) = self.rows.get_mut(&key) else {
                continue;
            };

            if update.success {
                if record.first_fiscal_date.is_none() {
                    record.first_fiscal_date = update.min_observed;
                }
                record.last_fiscal_date = max_date(record.last_fiscal_date, update.max_observed);
                record.last_successful_run = Some(now);
                record.consecutive_failures = 0;
                if record.api_eligible == Eligibility::Yes {
                    if let Some(delisted) = record.delisting_date {
                        if delisted <= today {
                            record.api_eligible = Eligibility::Del;
                        }
                    }
                }
            } else {
                record.consecutive_failures += 1;
            }
            record.updated_at = now;
            matched.push(update.symbol_id);
        }

        Ok(matched)
    }
}

fn max_date(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
