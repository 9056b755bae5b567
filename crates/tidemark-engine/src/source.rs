use crate::record::SymbolBase;
use std::collections::HashMap;

/// Fetch granularity for incrementally updatable sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    /// Only recent data is needed.
    Compact,
    /// The complete available history is refetched.
    Full,
}

impl FetchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMode::Compact => "compact",
            FetchMode::Full => "full",
        }
    }
}

/// How a data source refreshes previously captured history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refresh {
    /// Recent data can be fetched on its own; staleness picks compact vs
    /// full mode.
    Incremental,
    /// Every fetch returns the complete reported history; staleness instead
    /// gates whether the symbol is attempted at all.
    Snapshot,
}

/// Which slice of the symbol universe a source onboards by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniverseRule {
    /// Every listed symbol.
    All,
    /// Common stocks with an Active listing status; reported fundamentals do
    /// not exist for ETFs or delisted tickers.
    ActiveStocksOnly,
}

impl UniverseRule {
    pub fn allows(&self, base: &SymbolBase) -> bool {
        match self {
            UniverseRule::All => true,
            UniverseRule::ActiveStocksOnly => {
                base.asset_type == "Stock" && base.status == "Active"
            }
        }
    }
}

/// Default extraction profile of one upstream data source.
#[derive(Clone, Copy, Debug)]
pub struct SourceProfile {
    /// Age (days) beyond which captured data warrants refetching.
    pub staleness_days: i64,
    pub refresh: Refresh,
    pub universe: UniverseRule,
}

lazy_static::lazy_static! {
    /// Static profile table for the supported upstream sources; daily prices
    /// go stale within a week, quarterly fundamentals sit for ~4.5 months
    /// between reports, company overviews churn roughly yearly.
    pub static ref SOURCE_PROFILES: HashMap<&'static str, SourceProfile> = {
        let mut map = HashMap::new();
        map.insert("TIME_SERIES_DAILY_ADJUSTED", SourceProfile {
            staleness_days: 5,
            refresh: Refresh::Incremental,
            universe: UniverseRule::All,
        });
        map.insert("BALANCE_SHEET", SourceProfile {
            staleness_days: 135,
            refresh: Refresh::Snapshot,
            universe: UniverseRule::ActiveStocksOnly,
        });
        map.insert("CASH_FLOW", SourceProfile {
            staleness_days: 135,
            refresh: Refresh::Snapshot,
            universe: UniverseRule::ActiveStocksOnly,
        });
        map.insert("INCOME_STATEMENT", SourceProfile {
            staleness_days: 135,
            refresh: Refresh::Snapshot,
            universe: UniverseRule::ActiveStocksOnly,
        });
        map.insert("OVERVIEW", SourceProfile {
            staleness_days: 365,
            refresh: Refresh::Snapshot,
            universe: UniverseRule::ActiveStocksOnly,
        });
        map.insert("INSIDER_TRANSACTIONS", SourceProfile {
            staleness_days: 45,
            refresh: Refresh::Snapshot,
            universe: UniverseRule::ActiveStocksOnly,
        });
        map
    };
}

/// Look up the default profile for a data source.
pub fn profile(table_name: &str) -> Option<&'static SourceProfile> {
    SOURCE_PROFILES.get(table_name)
}
