//! 발표된 실적 채우기.
//!
//! 발표일이 지났지만 `revenue_actual`이 비어 있는 행에 분기 실적을 매칭해
//! 채우고, 종가가 없는 행에는 최근 종가를 기록합니다.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use hangon_core::{
    format_revenue, match_fiscal_quarter, sync_span, QuarterFigure, TableSchema, TimeSeriesRecord,
    EARNINGS_CALENDAR,
};
use hangon_data::{FieldPreservingUpserter, RowFilter};
use tracing::Instrument;

use super::earnings_tracker::CACHE_TAG;
use super::{country_of, today_kst};
use crate::{CollectionStats, CollectorContext, Result};

/// 보조 키(종목) 기준 그룹
fn group_by_symbol(rows: Vec<TimeSeriesRecord>) -> BTreeMap<String, Vec<TimeSeriesRecord>> {
    let mut groups: BTreeMap<String, Vec<TimeSeriesRecord>> = BTreeMap::new();
    for row in rows {
        if let Some(symbol) = row.natural_key.secondary_key.clone() {
            groups.entry(symbol).or_default().push(row);
        }
    }
    groups
}

/// 분기 실적을 행에 매칭한 갱신 레코드.
///
/// 매칭되는 분기가 없거나 매출이 없으면 `None`.
pub fn actuals_record(
    row: &TimeSeriesRecord,
    quarters: &[QuarterFigure],
    window_days: i64,
) -> Option<TimeSeriesRecord> {
    let report_date = NaiveDate::parse_from_str(row.key(), "%Y-%m-%d").ok()?;
    let quarter = match_fiscal_quarter(report_date, quarters, window_days)?;
    let revenue = quarter.revenue?;

    let symbol = row.natural_key.secondary_key.clone()?;
    let country = row
        .payload
        .get_str("country")
        .map(str::to_string)
        .unwrap_or_else(|| country_of(&symbol).to_string());

    let mut record = TimeSeriesRecord::composite(row.key(), symbol)
        .with_field("revenue_actual", revenue)
        .with_field("revenue_actual_formatted", format_revenue(Some(revenue), &country))
        .with_field("fiscal_quarter_end", quarter.end_date.format("%Y-%m-%d").to_string());
    if let Some(eps) = quarter.eps {
        record = record.with_field("eps_actual", eps);
    }
    Some(record)
}

/// 발표 실적 채우기 (한국 시간 오늘 기준)
pub async fn run_earnings_updater(ctx: &CollectorContext) -> Result<CollectionStats> {
    run_earnings_updater_at(ctx, today_kst()).await
}

pub async fn run_earnings_updater_at(ctx: &CollectorContext, today: NaiveDate) -> Result<CollectionStats> {
    collect(ctx, today)
        .instrument(sync_span!("earnings_updater", EARNINGS_CALENDAR))
        .await
}

async fn collect(ctx: &CollectorContext, today: NaiveDate) -> Result<CollectionStats> {
    let start = Instant::now();
    let mut stats = CollectionStats::new();
    let upserter = FieldPreservingUpserter::new(ctx.store.clone(), TableSchema::earnings_calendar());
    let today_key = today.format("%Y-%m-%d").to_string();
    let delay = ctx.config.request_delay();
    let window_days = ctx.config.earnings.quarter_window_days;

    // 1. 실적 매칭
    let pending = ctx
        .store
        .rows_matching(
            EARNINGS_CALENDAR,
            &RowFilter::new().key_before(today_key.clone()).missing("revenue_actual"),
        )
        .await?;
    tracing::info!(rows = pending.len(), "실적 미기록 행");

    for (i, (symbol, rows)) in group_by_symbol(pending).into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }

        let quarters = match ctx.earnings.quarterly_figures(&symbol).await {
            Ok(quarters) => quarters,
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "분기 실적 조회 실패");
                stats.errors += 1;
                continue;
            }
        };
        stats.fetched += quarters.len();

        let mut records = Vec::new();
        for row in &rows {
            match actuals_record(row, &quarters, window_days) {
                Some(record) => records.push(record),
                None => {
                    tracing::debug!(symbol = %symbol, date = row.key(), "매칭되는 분기 없음");
                    stats.skipped += 1;
                }
            }
        }

        let report = upserter.apply_batch(&records).await;
        stats.absorb(&report);
    }

    // 2. 종가 채우기
    let missing_price = ctx
        .store
        .rows_matching(
            EARNINGS_CALENDAR,
            &RowFilter::new().key_before(today_key).missing("current_price"),
        )
        .await?;

    for (symbol, rows) in group_by_symbol(missing_price) {
        let point = match ctx.quotes.fetch_point(&symbol).await {
            Ok(Some(point)) => point,
            Ok(None) => {
                stats.empty += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "종가 조회 실패");
                stats.errors += 1;
                continue;
            }
        };

        let records: Vec<TimeSeriesRecord> = rows
            .iter()
            .map(|row| {
                TimeSeriesRecord::composite(row.key(), symbol.clone())
                    .with_field("current_price", point.close)
            })
            .collect();
        let report = upserter.apply_batch(&records).await;
        stats.absorb(&report);
    }

    if stats.written() > 0 {
        ctx.revalidator.revalidate_tag(CACHE_TAG).await;
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}
