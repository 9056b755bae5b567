use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

//////////////////////////////////////////////////////////////////
// eligibility
//////////////////////////////////////////////////////////////////

/// Tri-state flag gating whether automated extraction may ever attempt a
/// (source, symbol) pair.
///
/// `Del` is one-way: once a delisted symbol's final data has been captured,
/// no automated transition reopens it. Relisting a symbol is an operator
/// decision taken directly against the database.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eligibility {
    /// Eligible for processing.
    Yes,
    /// Permanently out of scope for this data source (e.g. an ETF when the
    /// source covers stock fundamentals only).
    No,
    /// Was eligible; excluded after the delisted symbol's final data was
    /// captured.
    Del,
}

impl Eligibility {
    /// Text form persisted in the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            Eligibility::Yes => "YES",
            Eligibility::No => "NO",
            Eligibility::Del => "DEL",
        }
    }

    /// Parse the persisted text form.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "YES" => Some(Eligibility::Yes),
            "NO" => Some(Eligibility::No),
            "DEL" => Some(Eligibility::Del),
            _ => None,
        }
    }
}

//////////////////////////////////////////////////////////////////
// symbol universe
//////////////////////////////////////////////////////////////////

/// One row of the symbol reference universe, as supplied by the listing
/// snapshot.
///
/// `symbol_id` is an opaque, pre-computed cross-system join key; the engine
/// never derives it from the ticker itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolBase {
    pub symbol_id: i64,
    pub symbol: String,
    pub exchange: String,
    pub asset_type: String,
    pub status: String,
    pub ipo_date: Option<NaiveDate>,
    pub delisting_date: Option<NaiveDate>,
}

//////////////////////////////////////////////////////////////////
// watermarks
//////////////////////////////////////////////////////////////////

/// One row of the watermark ledger: the processing state of a single
/// (data source, symbol) pair.
///
/// Primary key is `(table_name, symbol_id)`. `first_fiscal_date` and
/// `last_fiscal_date` bound the data-point dates observed across all
/// successful extractions; `last_fiscal_date` never moves backwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatermarkRecord {
    pub table_name: String,
    pub symbol_id: i64,
    pub symbol: String,
    pub exchange: String,
    pub asset_type: String,
    pub status: String,
    pub api_eligible: Eligibility,
    pub ipo_date: Option<NaiveDate>,
    pub delisting_date: Option<NaiveDate>,
    pub first_fiscal_date: Option<NaiveDate>,
    pub last_fiscal_date: Option<NaiveDate>,
    pub last_successful_run: Option<DateTime<Utc>>,
    pub consecutive_failures: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WatermarkRecord {
    /// Fresh ledger row for a newly onboarded (source, symbol) pair.
    pub fn seeded(
        table_name: &str,
        base: &SymbolBase,
        api_eligible: Eligibility,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            table_name: table_name.to_string(),
            symbol_id: base.symbol_id,
            symbol: base.symbol.clone(),
            exchange: base.exchange.clone(),
            asset_type: base.asset_type.clone(),
            status: base.status.clone(),
            api_eligible,
            ipo_date: base.ipo_date,
            delisting_date: base.delisting_date,
            first_fiscal_date: None,
            last_fiscal_date: None,
            last_successful_run: None,
            consecutive_failures: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh descriptive attributes from a newer universe snapshot.
    ///
    /// Extraction progress (`first_fiscal_date`, `last_fiscal_date`,
    /// `last_successful_run`, `consecutive_failures`) survives, and a `Del`
    /// record stays `Del`.
    pub(crate) fn refresh_descriptive(
        &mut self,
        base: &SymbolBase,
        api_eligible: Eligibility,
        now: DateTime<Utc>,
    ) {
        self.symbol = base.symbol.clone();
        self.exchange = base.exchange.clone();
        self.asset_type = base.asset_type.clone();
        self.status = base.status.clone();
        self.ipo_date = base.ipo_date;
        self.delisting_date = base.delisting_date;
        if self.api_eligible != Eligibility::Del {
            self.api_eligible = api_eligible;
        }
        self.updated_at = now;
    }
}
