//! 코스피-S&P500 상관관계 수집.
//!
//! 한국 T일 코스피 수익률과 미국 T-1 거래일 S&P500 수익률의 20일 이동
//! 상관계수를 계산해 `market_correlations`에 저장합니다. 저장되는 지수
//! 값과 등락률은 둘 다 T일 당일 값입니다.

use std::time::Instant;

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Weekday};
use hangon_core::{
    reconcile, sync_span, FetchWindow, ReconcileOutcome, TableSchema, TimeSeriesRecord,
    MARKET_CORRELATIONS, MARKET_HOLIDAYS,
};
use hangon_data::{FieldPreservingUpserter, PricePoint, RowFilter};
use tracing::Instrument;

use super::today_kst;
use crate::{CollectionStats, CollectorContext, Result};

pub const KOSPI_SYMBOL: &str = "^KS11";
pub const SP500_SYMBOL: &str = "^GSPC";
pub const CORRELATION_TYPE: &str = "KOSPI_SP500_20D";
pub const FRONTEND_PATH: &str = "/market-correlation";

/// 상관관계 한 행
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationRow {
    pub date: NaiveDate,
    pub kospi_value: f64,
    pub sp500_value: f64,
    /// 코스피 등락률 (%)
    pub kospi_change: f64,
    /// 같은 날 S&P500 등락률 (%)
    pub sp500_change: f64,
    pub correlation_value: f64,
}

impl CorrelationRow {
    /// 프론트엔드가 읽는 필드 이름 그대로 저장합니다.
    pub fn to_record(&self) -> TimeSeriesRecord {
        TimeSeriesRecord::composite(self.date.format("%Y-%m-%d").to_string(), CORRELATION_TYPE)
            .with_field("correlation_value", round_dp(self.correlation_value, 4))
            .with_field("kospi_value", round_dp(self.kospi_value, 2))
            .with_field("sp500_value", round_dp(self.sp500_value, 2))
            .with_field("kospi_change", round_dp(self.kospi_change, 2))
            .with_field("sp500_change", round_dp(self.sp500_change, 2))
    }
}

fn round_dp(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}

/// 피어슨 상관계수 (분산이 0이면 `None`)
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// 일별 등락률 (%) 계산. 첫 행은 제외됩니다.
fn daily_changes(points: &[PricePoint]) -> Vec<(NaiveDate, f64, f64)> {
    points
        .windows(2)
        .filter(|w| w[0].close > 0.0)
        .map(|w| (w[1].date, w[1].close, (w[1].close / w[0].close - 1.0) * 100.0))
        .collect()
}

/// 이동 상관계수 계산.
///
/// 양쪽 시장이 모두 열린 날만 사용합니다. 코스피 T일 행마다 같은 날
/// S&P500 종가/등락률을 붙이고, 상관계수에는 T일보다 앞선 가장 최근
/// 미국 거래일의 등락률을 씁니다. 최근 `window`개 쌍으로 상관계수를
/// 구하며 값이 모두 정의된 행만 반환합니다 (날짜 오름차순).
pub fn compute_correlation_rows(
    kospi: &[PricePoint],
    sp500: &[PricePoint],
    window: usize,
) -> Vec<CorrelationRow> {
    if window < 2 {
        return Vec::new();
    }

    let mut kospi = kospi.to_vec();
    kospi.sort_by_key(|p| p.date);
    let mut sp500 = sp500.to_vec();
    sp500.sort_by_key(|p| p.date);

    let kospi_changes = daily_changes(&kospi);
    let sp_changes = daily_changes(&sp500);

    // (당일 행, 직전 미국 거래일 등락률)
    let pairs: Vec<(CorrelationRow, f64)> = kospi_changes
        .into_iter()
        .filter_map(|(date, kospi_value, kospi_change)| {
            let idx = sp_changes.partition_point(|(d, _, _)| *d < date);
            let &(same_day, sp500_value, sp500_change) = sp_changes.get(idx)?;
            if same_day != date {
                return None;
            }
            let (_, _, lagged_change) = *sp_changes.get(idx.checked_sub(1)?)?;
            let row = CorrelationRow {
                date,
                kospi_value,
                sp500_value,
                kospi_change,
                sp500_change,
                correlation_value: 0.0,
            };
            Some((row, lagged_change))
        })
        .collect();

    if pairs.len() < window {
        return Vec::new();
    }

    (window..=pairs.len())
        .filter_map(|end| {
            let slice = &pairs[end - window..end];
            let xs: Vec<f64> = slice.iter().map(|(row, _)| row.kospi_change).collect();
            let ys: Vec<f64> = slice.iter().map(|(_, lagged)| *lagged).collect();
            let correlation_value = pearson(&xs, &ys)?;
            Some(CorrelationRow {
                correlation_value,
                ..slice[window - 1].0.clone()
            })
        })
        .collect()
}

/// 직전 평일
fn previous_weekday(date: NaiveDate) -> NaiveDate {
    let mut day = date - ChronoDuration::days(1);
    while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
        day = day - ChronoDuration::days(1);
    }
    day
}

fn is_full_holiday(holidays: &[TimeSeriesRecord], date: NaiveDate, country: &str) -> bool {
    let key = date.format("%Y-%m-%d").to_string();
    holidays.iter().any(|h| {
        h.key() == key
            && h.natural_key.secondary_key.as_deref() == Some(country)
            && h.payload.get_str("kind") != Some("half_day")
    })
}

/// 오늘 수집을 건너뛸 이유 (주말, 한국 휴장일, 직전 미국 거래일 휴장)
pub fn skip_reason(today: NaiveDate, holidays: &[TimeSeriesRecord]) -> Option<&'static str> {
    if matches!(today.weekday(), Weekday::Sat | Weekday::Sun) {
        return Some("주말");
    }
    if is_full_holiday(holidays, today, "KR") {
        return Some("한국 증시 휴장일");
    }
    if is_full_holiday(holidays, previous_weekday(today), "US") {
        return Some("직전 미국 거래일 휴장");
    }
    None
}

/// 시장 상관관계 수집 (한국 시간 오늘 기준)
pub async fn run_correlation(ctx: &CollectorContext) -> Result<CollectionStats> {
    run_correlation_at(ctx, today_kst()).await
}

/// 지정한 날짜 기준 시장 상관관계 수집
pub async fn run_correlation_at(ctx: &CollectorContext, today: NaiveDate) -> Result<CollectionStats> {
    collect(ctx, today)
        .instrument(sync_span!("correlation", MARKET_CORRELATIONS))
        .await
}

async fn collect(ctx: &CollectorContext, today: NaiveDate) -> Result<CollectionStats> {
    let start = Instant::now();
    let mut stats = CollectionStats::new();
    let config = &ctx.config.correlation;

    // 1. 휴장일 확인
    let filter = RowFilter::new()
        .key_from(previous_weekday(today).format("%Y-%m-%d").to_string())
        .key_before((today + ChronoDuration::days(1)).format("%Y-%m-%d").to_string());
    let holidays = ctx.store.rows_matching(MARKET_HOLIDAYS, &filter).await?;
    if let Some(reason) = skip_reason(today, &holidays) {
        tracing::info!(%today, reason, "상관관계 수집 건너뜀");
        stats.skipped += 1;
        stats.elapsed = start.elapsed();
        return Ok(stats);
    }

    // 2. 지수 히스토리
    let history = async {
        let kospi = ctx.quotes.fetch_history(KOSPI_SYMBOL, config.history_days).await?;
        let sp500 = ctx.quotes.fetch_history(SP500_SYMBOL, config.history_days).await?;
        Ok::<_, hangon_data::DataError>((kospi, sp500))
    };
    let (kospi, sp500) = match history.await {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!(error = %e, transient = e.is_transient(), "지수 시세 소스 사용 불가");
            stats.errors += 1;
            stats.elapsed = start.elapsed();
            return Ok(stats);
        }
    };

    // 3. 계산 + 조회 범위 적용
    let rows = compute_correlation_rows(&kospi, &sp500, config.window);
    let watermark = ctx.store.latest_key(MARKET_CORRELATIONS).await?;
    let window = FetchWindow::for_watermark(
        watermark.as_deref(),
        config.backfill_days,
        config.incremental_days,
    );
    let keep = window.size() as usize;
    let records: Vec<TimeSeriesRecord> = rows[rows.len().saturating_sub(keep)..]
        .iter()
        .map(CorrelationRow::to_record)
        .collect();
    stats.fetched = records.len();

    // 4. 신규 행 저장
    let reconciled = reconcile(watermark.as_deref(), records);
    match reconciled.outcome {
        ReconcileOutcome::SourceEmpty => {
            tracing::warn!(kospi = kospi.len(), sp500 = sp500.len(), "계산된 상관관계 없음");
            stats.empty += 1;
        }
        ReconcileOutcome::NothingNew => {
            tracing::info!(watermark = ?watermark, "신규 상관관계 없음");
            stats.skipped += 1;
        }
        ReconcileOutcome::NewRecords(count) => {
            let upserter =
                FieldPreservingUpserter::new(ctx.store.clone(), TableSchema::market_correlations());
            let report = upserter.apply_batch(&reconciled.new_records).await;
            stats.absorb(&report);
            tracing::info!(count, next_watermark = ?reconciled.next_watermark, "상관관계 저장");

            if report.written() > 0 {
                ctx.revalidator.revalidate_path(FRONTEND_PATH).await;
            }
        }
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}
