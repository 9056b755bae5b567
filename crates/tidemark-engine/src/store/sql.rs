//////////////////////////////////////////////////////////////////
// schema
//////////////////////////////////////////////////////////////////

/// `etl.watermarks` is the per-(data source, symbol) processing ledger that
/// drives incremental extraction.
pub(crate) const ENSURE_SCHEMA: &'static str = "
    CREATE SCHEMA IF NOT EXISTS etl;
    CREATE TABLE IF NOT EXISTS etl.watermarks (
        table_name           VARCHAR     NOT NULL,
        symbol_id            BIGINT      NOT NULL,
        symbol               VARCHAR     NOT NULL,
        exchange             VARCHAR     NOT NULL,
        asset_type           VARCHAR     NOT NULL,
        status               VARCHAR     NOT NULL,
        api_eligible         VARCHAR     NOT NULL,
        ipo_date             DATE,
        delisting_date       DATE,
        first_fiscal_date    DATE,
        last_fiscal_date     DATE,
        last_successful_run  TIMESTAMPTZ,
        consecutive_failures INT         NOT NULL DEFAULT 0,
        created_at           TIMESTAMPTZ NOT NULL,
        updated_at           TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (table_name, symbol_id)
    );
";

//////////////////////////////////////////////////////////////////
// onboarding
//////////////////////////////////////////////////////////////////

pub(crate) const CREATE_SEED_STAGE: &'static str = "
    CREATE TEMP TABLE _watermark_seed (
        symbol_id      BIGINT  PRIMARY KEY,
        symbol         VARCHAR NOT NULL,
        exchange       VARCHAR NOT NULL,
        asset_type     VARCHAR NOT NULL,
        status         VARCHAR NOT NULL,
        api_eligible   VARCHAR NOT NULL,
        ipo_date       DATE,
        delisting_date DATE
    ) ON COMMIT DROP
";

pub(crate) const INSERT_SEED_ROW: &'static str = "
    INSERT INTO _watermark_seed (
        symbol_id, symbol, exchange, asset_type, status,
        api_eligible, ipo_date, delisting_date
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
";

/// Merge the staged universe into the ledger. Descriptive fields refresh
/// from the snapshot; fiscal dates, run timestamps and failure counts
/// survive; a DEL row never reopens.
pub(crate) const MERGE_SEED: &'static str = "
    INSERT INTO etl.watermarks AS w (
        table_name, symbol_id, symbol, exchange, asset_type, status,
        api_eligible, ipo_date, delisting_date, created_at, updated_at
    )
    SELECT $1, s.symbol_id, s.symbol, s.exchange, s.asset_type, s.status,
           s.api_eligible, s.ipo_date, s.delisting_date, $2, $2
    FROM _watermark_seed s
    ON CONFLICT (table_name, symbol_id) DO UPDATE SET
        symbol = EXCLUDED.symbol,
        exchange = EXCLUDED.exchange,
        asset_type = EXCLUDED.asset_type,
        status = EXCLUDED.status,
        ipo_date = EXCLUDED.ipo_date,
        delisting_date = EXCLUDED.delisting_date,
        api_eligible = CASE
            WHEN w.api_eligible = 'DEL' THEN 'DEL'
            ELSE EXCLUDED.api_eligible
        END,
        updated_at = EXCLUDED.updated_at
";

//////////////////////////////////////////////////////////////////
// reads
//////////////////////////////////////////////////////////////////

pub(crate) const SELECT_SOURCE: &'static str = "
    SELECT table_name, symbol_id, symbol, exchange, asset_type, status,
           api_eligible, ipo_date, delisting_date, first_fiscal_date,
           last_fiscal_date, last_successful_run, consecutive_failures,
           created_at, updated_at
    FROM etl.watermarks
    WHERE table_name = $1
";

//////////////////////////////////////////////////////////////////
// extraction results
//////////////////////////////////////////////////////////////////

pub(crate) const CREATE_RESULT_STAGE: &'static str = "
    CREATE TEMP TABLE _watermark_stage (
        symbol_id    BIGINT  PRIMARY KEY,
        success      BOOLEAN NOT NULL,
        min_observed DATE,
        max_observed DATE
    ) ON COMMIT DROP
";

pub(crate) const INSERT_RESULT_ROW: &'static str = "
    INSERT INTO _watermark_stage (symbol_id, success, min_observed, max_observed)
    VALUES ($1, $2, $3, $4)
";

/// Single-statement merge of a result batch. COALESCE/GREATEST keep the
/// fiscal window monotonic and make replays of the same batch idempotent;
/// a success against a past delisting date retires the row to DEL.
pub(crate) const MERGE_RESULTS: &'static str = "
    UPDATE etl.watermarks w SET
        first_fiscal_date = CASE WHEN s.success
            THEN COALESCE(w.first_fiscal_date, s.min_observed)
            ELSE w.first_fiscal_date END,
        last_fiscal_date = CASE WHEN s.success
            THEN GREATEST(w.last_fiscal_date, s.max_observed)
            ELSE w.last_fiscal_date END,
        last_successful_run = CASE WHEN s.success
            THEN $2
            ELSE w.last_successful_run END,
        consecutive_failures = CASE WHEN s.success
            THEN 0
            ELSE w.consecutive_failures + 1 END,
        api_eligible = CASE WHEN s.success
                AND w.api_eligible = 'YES'
                AND w.delisting_date IS NOT NULL
                AND w.delisting_date <= $3
            THEN 'DEL'
            ELSE w.api_eligible END,
        updated_at = $2
    FROM _watermark_stage s
    WHERE w.table_name = $1 AND w.symbol_id = s.symbol_id
    RETURNING w.symbol_id
";
