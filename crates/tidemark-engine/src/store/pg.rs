use super::sql;
use super::{validate_table_name, WatermarkStore, WatermarkUpdate};
use crate::error::WatermarkError;
use crate::record::{Eligibility, SymbolBase, WatermarkRecord};
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use futures::{stream, StreamExt};
use tracing::{debug, error, trace};

/// PostgreSQL-backed watermark ledger, pooled via [`deadpool_postgres`].
///
/// Both mutation paths stage their rows into a TEMP table inside one
/// transaction and apply a single merge statement; the live table is never
/// updated row by row.
pub struct PgWatermarkStore {
    pool: Pool,
}

impl PgWatermarkStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create the `etl` schema and watermark table if they are missing.
    pub async fn ensure_schema(&self) -> Result<(), WatermarkError> {
        let client = self.pool.get().await?;
        client.batch_execute(sql::ENSURE_SCHEMA).await.map_err(|err| {
            error!("failed to create etl.watermarks, error({err})");
            err
        })?;
        debug!("etl.watermarks schema ready");
        Ok(())
    }
}

impl WatermarkStore for PgWatermarkStore {
    async fn initialize_source(
        &mut self,
        table_name: &str,
        universe: &[SymbolBase],
        predicate: &dyn Fn(&SymbolBase) -> bool,
    ) -> Result<u64, WatermarkError> {
        validate_table_name(table_name)?;
        let time = std::time::Instant::now();
        let now = Utc::now();

        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        tx.batch_execute(sql::CREATE_SEED_STAGE).await.map_err(|err| {
            error!("failed to create seed staging table for {table_name}, error({err})");
            err
        })?;

        // stage the universe snapshot
        let insert = tx.prepare(sql::INSERT_SEED_ROW).await?;
        let mut stream = stream::iter(universe);
        while let Some(base) = stream.next().await {
            let api_eligible = if predicate(base) {
                Eligibility::Yes
            } else {
                Eligibility::No
            };
            let api_eligible = api_eligible.as_str();
            tx.execute(
                &insert,
                &[
                    &base.symbol_id,
                    &base.symbol,
                    &base.exchange,
                    &base.asset_type,
                    &base.status,
                    &api_eligible,
                    &base.ipo_date,
                    &base.delisting_date,
                ],
            )
            .await
            .map_err(|err| {
                error!(
                    "failed to stage universe row for [{}] {}, error({err})",
                    base.symbol_id, base.symbol
                );
                err
            })?;
            trace!("staged universe row for [{}] {}", base.symbol_id, base.symbol);
        }

        // one merge for the whole batch
        let merged = tx
            .execute(sql::MERGE_SEED, &[&table_name, &now])
            .await
            .map_err(|err| {
                error!("failed to merge universe into {table_name} watermarks, error({err})");
                err
            })?;

        tx.commit().await.map_err(|err| {
            error!("failed to commit onboarding transaction for {table_name}, error({err})");
            err
        })?;

        debug!(
            "{table_name} onboarded: {merged} watermark rows merged. {}",
            crate::time_elapsed(time)
        );

        Ok(merged)
    }

    async fn query(
        &self,
        table_name: &str,
        predicate: &dyn Fn(&WatermarkRecord) -> bool,
    ) -> Result<Vec<WatermarkRecord>, WatermarkError> {
        validate_table_name(table_name)?;

        let client = self.pool.get().await?;
        let rows = client
            .query(sql::SELECT_SOURCE, &[&table_name])
            .await
            .map_err(|err| {
                error!("failed to fetch etl.watermarks for {table_name}, error({err})");
                err
            })?;

        let scanned = rows.len();
        let mut records = Vec::with_capacity(scanned);
        for row in rows {
            let record = row_to_record(&row)?;
            if predicate(&record) {
                records.push(record);
            }
        }
        trace!(
            "{table_name}: {} of {scanned} watermark rows matched",
            records.len()
        );

        Ok(records)
    }

    async fn bulk_upsert(
        &mut self,
        table_name: &str,
        updates: &[WatermarkUpdate],
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, WatermarkError> {
        validate_table_name(table_name)?;
        if updates.is_empty() {
            return Ok(Vec::new());
        }
        let time = std::time::Instant::now();
        let today = now.date_naive();

        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        tx.batch_execute(sql::CREATE_RESULT_STAGE)
            .await
            .map_err(|err| {
                error!("failed to create result staging table for {table_name}, error({err})");
                err
            })?;

        // stage the result batch
        let insert = tx.prepare(sql::INSERT_RESULT_ROW).await?;
        let mut stream = stream::iter(updates);
        while let Some(update) = stream.next().await {
            tx.execute(
                &insert,
                &[
                    &update.symbol_id,
                    &update.success,
                    &update.min_observed,
                    &update.max_observed,
                ],
            )
            .await
            .map_err(|err| {
                error!(
                    "failed to stage result row for [{}], error({err})",
                    update.symbol_id
                );
                err
            })?;
        }

        // one merge for the whole batch
        let rows = tx
            .query(sql::MERGE_RESULTS, &[&table_name, &now, &today])
            .await
            .map_err(|err| {
                error!("failed to merge results into {table_name} watermarks, error({err})");
                err
            })?;

        tx.commit().await.map_err(|err| {
            error!("failed to commit result transaction for {table_name}, error({err})");
            err
        })?;

        let matched: Vec<i64> = rows.into_iter().map(|row| row.get(0)).collect();
        debug!(
            "{table_name} watermark merge: {} of {} staged rows matched. {}",
            matched.len(),
            updates.len(),
            crate::time_elapsed(time)
        );

        Ok(matched)
    }
}

fn row_to_record(row: &tokio_postgres::Row) -> Result<WatermarkRecord, WatermarkError> {
    let raw: String = row.get(6);
    let api_eligible = Eligibility::parse(&raw).ok_or_else(|| {
        WatermarkError::Configuration(format!(
            "unrecognized api_eligible value '{raw}' in etl.watermarks"
        ))
    })?;
    Ok(WatermarkRecord {
        table_name: row.get(0),
        symbol_id: row.get(1),
        symbol: row.get(2),
        exchange: row.get(3),
        asset_type: row.get(4),
        status: row.get(5),
        api_eligible,
        ipo_date: row.get(7),
        delisting_date: row.get(8),
        first_fiscal_date: row.get(9),
        last_fiscal_date: row.get(10),
        last_successful_run: row.get(11),
        consecutive_failures: row.get(12),
        created_at: row.get(13),
        updated_at: row.get(14),
    })
}
