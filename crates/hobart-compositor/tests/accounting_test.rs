//! Date cache construction, accounting factors and rolling beta.

use approx::assert_relative_eq;
use chrono::{Datelike, NaiveDate, Weekday};
use hobart_compositor::{
    AccountingDateCacheCompositor, AccountingFactor, AccountingMode, BetaCompositor, Compositor,
    CompositorContext, DateCacheSnapshot, StatementRef,
};
use hobart_data::tables::{balance_sheet, custom_index};
use hobart_data::{Calendar, Record, SqliteStore, TableStore, TradingCalendar, frame};
use hobart_factors::{ContinuousFactor, Factor, FactorQuery};
use std::rc::Rc;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn weekdays(start: NaiveDate, end: NaiveDate) -> TradingCalendar {
    TradingCalendar::new(
        start
            .iter_days()
            .take_while(|date| *date <= end)
            .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)),
    )
}

fn statement(announced: NaiveDate, period: NaiveDate, cash: f64) -> Record {
    Record::new(announced, "A", balance_sheet::CASH, cash).with_report_period(period)
}

fn statement_store() -> SqliteStore {
    let store = SqliteStore::in_memory().unwrap();
    store
        .upsert(
            balance_sheet::TABLE,
            &[
                statement(d(2019, 8, 20), d(2019, 6, 30), 8.0),
                statement(d(2020, 4, 28), d(2020, 3, 31), 10.0),
                // Announced on a Saturday
                statement(d(2020, 8, 29), d(2020, 6, 30), 12.0),
            ],
        )
        .unwrap();
    store
}

#[test]
fn test_date_cache_build_and_resolve() {
    let store = statement_store();
    let calendar = weekdays(d(2019, 1, 1), d(2020, 12, 31));
    let ctx = CompositorContext::new(&store, &calendar, &store);
    let dir = tempfile::tempdir().unwrap();
    let compositor = AccountingDateCacheCompositor::new(dir.path().join("date_cache.json.gz"));

    let summary = compositor.update(&ctx).unwrap();
    assert_eq!(summary.rows_written, 3);

    let cache = DateCacheSnapshot::load(compositor.path()).unwrap();
    assert_eq!(cache.watermark("A"), d(2020, 8, 29));
    assert!(cache.entry("A", d(2020, 8, 31)).is_some());
    assert!(cache.entry("A", d(2020, 8, 29)).is_none());

    let (date, entry) = cache.resolve("A", d(2020, 8, 30)).unwrap();
    assert_eq!(date, d(2020, 4, 28));
    assert_eq!(entry.current.period, d(2020, 3, 31));
    assert_eq!(entry.q1, None);

    let (_, entry) = cache.resolve("A", d(2020, 9, 1)).unwrap();
    assert_eq!(entry.current, StatementRef::new(d(2020, 8, 29), d(2020, 6, 30)));
    assert_eq!(entry.q1, Some(StatementRef::new(d(2020, 4, 28), d(2020, 3, 31))));
    assert_eq!(entry.yoy, Some(StatementRef::new(d(2019, 8, 20), d(2019, 6, 30))));

    let rerun = compositor.update(&ctx).unwrap();
    assert_eq!(rerun.rows_written, 0);
    assert_eq!(DateCacheSnapshot::load(compositor.path()).unwrap(), cache);
}

#[test]
fn test_date_cache_appends_new_announcements() {
    let store = statement_store();
    let calendar = weekdays(d(2019, 1, 1), d(2020, 12, 31));
    let ctx = CompositorContext::new(&store, &calendar, &store);
    let dir = tempfile::tempdir().unwrap();
    let compositor = AccountingDateCacheCompositor::new(dir.path().join("date_cache.json.gz"));
    compositor.update(&ctx).unwrap();
    let before = DateCacheSnapshot::load(compositor.path()).unwrap();

    store
        .upsert(balance_sheet::TABLE, &[statement(d(2020, 10, 30), d(2020, 9, 30), 13.0)])
        .unwrap();
    let summary = compositor.update(&ctx).unwrap();
    assert_eq!(summary.rows_written, 1);

    let after = DateCacheSnapshot::load(compositor.path()).unwrap();
    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(after.watermark("A"), d(2020, 10, 30));
    for (date, entry) in &before.entries["A"] {
        assert_eq!(after.entry("A", *date), Some(entry));
    }
    let latest = after.entry("A", d(2020, 10, 30)).unwrap();
    assert_eq!(latest.q1.map(|s| s.period), Some(d(2020, 6, 30)));
    assert_eq!(latest.q2.map(|s| s.period), Some(d(2020, 3, 31)));
}

#[test]
fn test_date_cache_weekend_announcements_split_across_runs() {
    let calendar = weekdays(d(2020, 1, 1), d(2020, 12, 31));
    let saturday = statement(d(2020, 8, 29), d(2020, 3, 31), 10.0);
    let sunday = statement(d(2020, 8, 30), d(2020, 6, 30), 12.0);
    let dir = tempfile::tempdir().unwrap();

    let single_store = SqliteStore::in_memory().unwrap();
    single_store
        .upsert(balance_sheet::TABLE, &[saturday.clone(), sunday.clone()])
        .unwrap();
    let single = AccountingDateCacheCompositor::new(dir.path().join("single.json.gz"));
    single
        .update(&CompositorContext::new(&single_store, &calendar, &single_store))
        .unwrap();

    let split_store = SqliteStore::in_memory().unwrap();
    let ctx = CompositorContext::new(&split_store, &calendar, &split_store);
    let split = AccountingDateCacheCompositor::new(dir.path().join("split.json.gz"));
    split_store.upsert(balance_sheet::TABLE, &[saturday]).unwrap();
    assert_eq!(split.update(&ctx).unwrap().rows_written, 1);
    split_store.upsert(balance_sheet::TABLE, &[sunday]).unwrap();
    assert_eq!(split.update(&ctx).unwrap().rows_written, 1);
    assert_eq!(split.update(&ctx).unwrap().rows_written, 0);

    let expected = DateCacheSnapshot::load(single.path()).unwrap();
    let cache = DateCacheSnapshot::load(split.path()).unwrap();
    assert_eq!(cache, expected);
    let (date, entry) = cache.resolve("A", d(2020, 8, 31)).unwrap();
    assert_eq!(date, d(2020, 8, 31));
    assert_eq!(entry.current.period, d(2020, 6, 30));
    assert_eq!(entry.q1.map(|s| s.period), Some(d(2020, 3, 31)));
}

#[test]
fn test_accounting_factor_modes() {
    let store = statement_store();
    let calendar = weekdays(d(2019, 1, 1), d(2020, 12, 31));
    let ctx = CompositorContext::new(&store, &calendar, &store);
    let dir = tempfile::tempdir().unwrap();
    let compositor = AccountingDateCacheCompositor::new(dir.path().join("date_cache.json.gz"));
    compositor.update(&ctx).unwrap();
    let cache = Rc::new(DateCacheSnapshot::load(compositor.path()).unwrap());

    let query = FactorQuery::on([d(2020, 6, 1), d(2020, 9, 1)]).ids(["A"]);
    let value = |mode: AccountingMode| {
        let factor =
            AccountingFactor::new(balance_sheet::TABLE, balance_sheet::CASH, mode, cache.clone());
        frame::panel(&factor.get_data(&ctx.factors(), &query).unwrap(), frame::VALUE).unwrap()
    };

    let latest = value(AccountingMode::Latest);
    assert_eq!(latest[&(d(2020, 6, 1), "A".to_string())], 10.0);
    assert_eq!(latest[&(d(2020, 9, 1), "A".to_string())], 12.0);

    let qoq = value(AccountingMode::QoQ);
    assert_eq!(qoq.len(), 1);
    assert_relative_eq!(qoq[&(d(2020, 9, 1), "A".to_string())], 0.2, epsilon = 1e-12);

    let yoy = value(AccountingMode::YoY);
    assert_relative_eq!(yoy[&(d(2020, 9, 1), "A".to_string())], 0.5, epsilon = 1e-12);

    let ttm = AccountingFactor::new(
        balance_sheet::TABLE,
        balance_sheet::CASH,
        AccountingMode::Ttm,
        cache,
    );
    assert_eq!(ttm.name(), "cash_ttm");
}

#[test]
fn test_beta_recovers_known_slope() {
    let start = d(2020, 1, 1);
    let calendar = weekdays(start, d(2020, 6, 30));
    let store = SqliteStore::in_memory().unwrap();

    let mut market = Vec::new();
    let mut stocks = Vec::new();
    for (i, date) in calendar.dates().iter().enumerate() {
        let ret = 0.01 * ((i % 7) as f64 - 3.0);
        market.push(Record::new(*date, "H00001", custom_index::RETURN, ret));
        stocks.push(Record::new(*date, "A", "ret", 1.2 * ret + 0.001));
    }
    // The other entity exists only from June
    let june = calendar.trading_dates(d(2020, 6, 1), d(2020, 6, 30));
    for (i, date) in june.iter().enumerate() {
        stocks.push(Record::new(*date, "B", "ret", 0.01 * i as f64));
    }
    store.upsert(custom_index::TABLE, &market).unwrap();
    store.upsert("daily_return", &stocks).unwrap();
    let ctx = CompositorContext::new(&store, &calendar, &store);

    let beta = BetaCompositor::new(
        ContinuousFactor::new("daily_return", "ret"),
        ContinuousFactor::new(custom_index::TABLE, custom_index::RETURN),
        "H00001",
    );
    assert_eq!(beta.name(), "beta_H00001");

    let dates = [d(2020, 1, 2), d(2020, 4, 1), d(2020, 6, 3)];
    let ids = ["A".to_string(), "B".to_string()];
    let df = beta.compute(&ctx.factors(), &ids, &dates).unwrap();
    let panel = frame::panel(&df, frame::VALUE).unwrap();

    // Nothing precedes the first date; B has two June points before the 3rd
    assert!(!panel.contains_key(&(d(2020, 1, 2), "A".to_string())));
    assert!(!panel.contains_key(&(d(2020, 6, 3), "B".to_string())));
    assert_relative_eq!(panel[&(d(2020, 4, 1), "A".to_string())], 1.2, epsilon = 1e-9);
    assert_relative_eq!(panel[&(d(2020, 6, 3), "A".to_string())], 1.2, epsilon = 1e-9);
    assert_eq!(panel.len(), 2);

    let via_factor = beta
        .get_data(&ctx.factors(), &FactorQuery::on([d(2020, 4, 1)]).ids(["A"]))
        .unwrap();
    assert_eq!(via_factor.height(), 1);
    assert!(beta.get_data(&ctx.factors(), &FactorQuery::on_date(d(2020, 4, 1))).is_err());
}
