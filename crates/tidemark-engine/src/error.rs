use thiserror::Error;

/// Failure modes of the watermark engine.
#[derive(Debug, Error)]
pub enum WatermarkError {
    /// The caller supplied options or inputs that can never succeed; fix the
    /// configuration rather than retry.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// An extraction result referenced a `(table_name, symbol_id)` pair that
    /// was never initialized for this source.
    #[error("no watermark record for ({table_name}, {symbol_id})")]
    WatermarkNotFound { table_name: String, symbol_id: i64 },

    /// The underlying PostgreSQL call failed. Retry policy belongs to the
    /// caller, not the engine.
    #[error("storage failure: {0}")]
    Storage(#[from] tokio_postgres::Error),

    /// No connection could be checked out of the pool.
    #[error("connection pool failure: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
}
