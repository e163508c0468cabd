//! 회계 분기 매칭과 매출액 표기.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 분기 매칭 기본 창 (일).
pub const DEFAULT_QUARTER_WINDOW_DAYS: i64 = 120;

/// 분기 실적 한 건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterFigure {
    /// 분기 종료일
    pub end_date: NaiveDate,
    pub revenue: Option<f64>,
    pub eps: Option<f64>,
}

impl QuarterFigure {
    fn populated_count(&self) -> usize {
        [self.revenue, self.eps]
            .iter()
            .filter(|v| matches!(v, Some(x) if *x != 0.0 && x.is_finite()))
            .count()
    }
}

/// 실적 발표일에 해당하는 분기 찾기.
///
/// 분기 종료일 `e`가 `e < report_date < e + window_days`를 만족하는 후보 중
/// 발표일과의 간격이 가장 작은 분기를 선택합니다. 같은 간격이면 값이 더
/// 많이 채워진 분기, 그다음 입력 순서가 앞선 분기가 이깁니다.
/// 후보가 없으면 `None`.
pub fn match_fiscal_quarter<'a>(
    report_date: NaiveDate,
    quarters: &'a [QuarterFigure],
    window_days: i64,
) -> Option<&'a QuarterFigure> {
    let mut best: Option<(i64, usize, &QuarterFigure)> = None;

    for quarter in quarters {
        let delta = (report_date - quarter.end_date).num_days();
        if delta <= 0 || delta >= window_days {
            continue;
        }
        let populated = quarter.populated_count();
        let better = match best {
            None => true,
            Some((best_delta, best_populated, _)) => {
                delta < best_delta || (delta == best_delta && populated > best_populated)
            }
        };
        if better {
            best = Some((delta, populated, quarter));
        }
    }

    best.map(|(_, _, quarter)| quarter)
}

/// 매출액을 한국식 단위로 표기.
///
/// 값이 없거나 0이면 `"N/A"`.
pub fn format_revenue(value: Option<f64>, country: &str) -> String {
    let value = match value {
        Some(v) if v != 0.0 && v.is_finite() => v,
        _ => return "N/A".to_string(),
    };

    let us = country.eq_ignore_ascii_case("US");
    let currency = if us { "달러" } else { "원" };
    if value >= 1e12 {
        format!("{:.1}조 {}", value / 1e12, currency)
    } else if value >= 1e8 {
        format!("{:.1}억 {}", value / 1e8, currency)
    } else if us {
        format!("${}", group_thousands(value))
    } else {
        format!("{}원", group_thousands(value))
    }
}

fn group_thousands(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
