//! Table and field names of the shipped store schema.
//!
//! Raw tables are populated by the ingestion pipeline; the derived tables at the bottom
//! are owned by the compositors.

/// Trading calendar, one row per exchange date.
pub mod trading_calendar {
    /// Table name
    pub const TABLE: &str = "trading_calendar";
    /// 1 when the exchange is open, 0 otherwise
    pub const OPEN: &str = "open";
}

/// Daily stock quotes.
pub mod stock_daily {
    /// Table name
    pub const TABLE: &str = "stock_daily";
    /// Opening price
    pub const OPEN: &str = "open";
    /// Daily high
    pub const HIGH: &str = "high";
    /// Daily low
    pub const LOW: &str = "low";
    /// Closing price
    pub const CLOSE: &str = "close";
    /// Traded volume
    pub const VOLUME: &str = "volume";
}

/// Cumulative adjustment factors, one row per change event.
pub mod adj_factor {
    /// Table name
    pub const TABLE: &str = "adj_factor";
    /// Cumulative factor effective from the row date
    pub const ADJ_FACTOR: &str = "adj_factor";
}

/// Listed stocks, keyed by listing date.
pub mod stock_list {
    /// Table name
    pub const TABLE: &str = "stock_list";
    /// Security name at listing
    pub const NAME: &str = "name";
    /// Delisting date (ISO text) when the stock left the exchange
    pub const DELIST_DATE: &str = "delist_date";
}

/// Security name history, one row per rename.
pub mod stock_name {
    /// Table name
    pub const TABLE: &str = "stock_name";
    /// Security name effective from the row date
    pub const NAME: &str = "name";
}

/// Trading suspensions, one row per suspended day.
pub mod suspension {
    /// Table name
    pub const TABLE: &str = "suspension";
    /// Suspension kind as reported by the exchange
    pub const SUSPENSION_TYPE: &str = "suspension_type";
}

/// Listed funds, keyed by listing date.
pub mod fund_list {
    /// Table name
    pub const TABLE: &str = "fund_list";
    /// Fund name
    pub const NAME: &str = "name";
}

/// Fund distributions, keyed by record date.
pub mod fund_dividend {
    /// Table name
    pub const TABLE: &str = "fund_dividend";
    /// Distribution per unit
    pub const DIVIDEND: &str = "dividend";
}

/// Net asset value of over-the-counter funds.
pub mod otc_fund_nav {
    /// Table name
    pub const TABLE: &str = "otc_fund_nav";
    /// Unit net asset value
    pub const UNIT_NAV: &str = "unit_nav";
}

/// Daily quotes of exchange-traded funds.
pub mod exchange_fund_daily {
    /// Table name
    pub const TABLE: &str = "exchange_fund_daily";
    /// Closing price
    pub const CLOSE: &str = "close";
}

/// Consolidated balance sheets, keyed by announcement date and report period.
pub mod balance_sheet {
    /// Table name
    pub const TABLE: &str = "balance_sheet";
    /// Cash and equivalents, present on every statement
    pub const CASH: &str = "cash";
    /// Total assets
    pub const TOTAL_ASSETS: &str = "total_assets";
    /// Total shareholders' equity
    pub const TOTAL_EQUITY: &str = "total_equity";
}

/// Consolidated income statements, year-to-date cumulative.
pub mod income_statement {
    /// Table name
    pub const TABLE: &str = "income_statement";
    /// Total operating revenue
    pub const REVENUE: &str = "revenue";
    /// Net profit attributable to shareholders
    pub const NET_PROFIT: &str = "net_profit";
}

/// Free float share counts, one row per change event.
pub mod free_float_shares {
    /// Table name
    pub const TABLE: &str = "free_float_shares";
    /// Number of free float shares
    pub const SHARES: &str = "free_float_shares";
}

/// Derived: one-word limit boards.
pub mod limit_moves {
    /// Table name
    pub const TABLE: &str = "limit_moves";
    /// `limit-up` or `limit-down`
    pub const LIMIT_MOVE: &str = "limit_move";
}

/// Derived: daily returns of self-defined indexes.
pub mod custom_index {
    /// Table name
    pub const TABLE: &str = "custom_index";
    /// Daily index return
    pub const RETURN: &str = "return";
}
