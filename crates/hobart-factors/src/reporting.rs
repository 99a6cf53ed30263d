//! Reporting-period arithmetic.
//!
//! Report periods are fiscal quarter ends: March 31, June 30, September 30 and
//! December 31. The functions here also accept any other date and treat it by its
//! calendar month and day.

use chrono::{Datelike, NaiveDate};

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    ymd(next_year, next_month, 1)
        .pred_opt()
        .unwrap_or(NaiveDate::MIN)
}

/// Fiscal quarter (1 to 4) containing `date`.
pub fn quarter_of(date: NaiveDate) -> u32 {
    (date.month0() / 3) + 1
}

/// Whether `date` is a fiscal year end.
pub fn is_annual(date: NaiveDate) -> bool {
    date.month() == 12 && date.day() == 31
}

/// End of the quarter that precedes the quarter containing `date`.
///
/// `2020-09-30` maps to `2020-06-30`, `2020-03-31` to `2019-12-31`.
pub fn qoq_date(date: NaiveDate) -> NaiveDate {
    let quarter = quarter_of(date);
    if quarter == 1 {
        ymd(date.year() - 1, 12, 31)
    } else {
        last_day_of_month(date.year(), (quarter - 1) * 3)
    }
}

/// Same month and day one year earlier; February 29 maps to February 28.
pub fn yoy_date(date: NaiveDate) -> NaiveDate {
    let year = date.year() - 1;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .unwrap_or_else(|| last_day_of_month(year, date.month()))
}

/// Fiscal year end `years` years before the year of `date`.
///
/// `yearly_dates_offset(2020-12-31, 3)` is `2017-12-31`; with `years = 1` on an interim
/// period it gives the previous annual report.
pub fn yearly_dates_offset(date: NaiveDate, years: i32) -> NaiveDate {
    ymd(date.year() - years, 12, 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[rstest]
    #[case(d(2020, 9, 30), d(2020, 6, 30))]
    #[case(d(2020, 6, 30), d(2020, 3, 31))]
    #[case(d(2020, 3, 31), d(2019, 12, 31))]
    #[case(d(2020, 12, 31), d(2020, 9, 30))]
    #[case(d(2020, 5, 15), d(2020, 3, 31))]
    fn test_qoq_date(#[case] date: NaiveDate, #[case] expected: NaiveDate) {
        assert_eq!(qoq_date(date), expected);
    }

    #[rstest]
    #[case(d(2020, 9, 30), d(2019, 9, 30))]
    #[case(d(2020, 12, 31), d(2019, 12, 31))]
    #[case(d(2020, 2, 29), d(2019, 2, 28))]
    fn test_yoy_date(#[case] date: NaiveDate, #[case] expected: NaiveDate) {
        assert_eq!(yoy_date(date), expected);
    }

    #[rstest]
    #[case(d(2020, 12, 31), 3, d(2017, 12, 31))]
    #[case(d(2020, 12, 31), 5, d(2015, 12, 31))]
    #[case(d(2020, 6, 30), 1, d(2019, 12, 31))]
    fn test_yearly_dates_offset(
        #[case] date: NaiveDate,
        #[case] years: i32,
        #[case] expected: NaiveDate,
    ) {
        assert_eq!(yearly_dates_offset(date, years), expected);
    }

    #[test]
    fn test_quarters() {
        assert_eq!(quarter_of(d(2020, 1, 1)), 1);
        assert_eq!(quarter_of(d(2020, 9, 30)), 3);
        assert_eq!(quarter_of(d(2020, 12, 31)), 4);
        assert!(is_annual(d(2020, 12, 31)));
        assert!(!is_annual(d(2020, 9, 30)));
    }

    #[test]
    fn test_qoq_chain_walks_back_a_year() {
        let mut date = d(2020, 12, 31);
        for _ in 0..4 {
            date = qoq_date(date);
        }
        assert_eq!(date, d(2019, 12, 31));
    }
}
