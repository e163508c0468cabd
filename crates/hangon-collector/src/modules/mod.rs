//! 데이터 수집 모듈.

pub mod correlation;
pub mod credit_balance;
pub mod earnings_tracker;
pub mod earnings_updater;
pub mod holidays;
pub mod monitored_stocks;

use chrono::{NaiveDate, Utc};

pub use correlation::{run_correlation, run_correlation_at};
pub use credit_balance::run_credit_balance;
pub use earnings_tracker::{run_earnings_tracker, run_earnings_tracker_at};
pub use earnings_updater::{run_earnings_updater, run_earnings_updater_at};
pub use holidays::{run_holidays, run_holidays_at, HolidayCalendar, HolidayEntry, HolidayKind};
pub use monitored_stocks::{run_monitored_stocks, run_monitored_stocks_at};

/// 한국 시간 기준 오늘
pub fn today_kst() -> NaiveDate {
    Utc::now().with_timezone(&chrono_tz::Asia::Seoul).date_naive()
}

/// 심볼 접미사로 국가 추정
pub fn country_of(symbol: &str) -> &'static str {
    let upper = symbol.to_uppercase();
    if upper.ends_with(".KS") || upper.ends_with(".KQ") {
        "KR"
    } else {
        "US"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_of() {
        assert_eq!(country_of("005930.KS"), "KR");
        assert_eq!(country_of("035720.kq"), "KR");
        assert_eq!(country_of("AAPL"), "US");
    }
}
