//! 신용융자 잔고 수집 및 분석.
//!
//! 1. 워터마크 이후 행만 저장 (첫 실행은 백필 페이지 수만큼)
//! 2. 분석 마커가 워터마크보다 뒤처져 있으면 재계산
//! 3. 재계산 성공 시 알림 + 캐시 무효화

use std::time::Instant;

use hangon_core::{
    reconcile, sync_span, CoreError, FetchWindow, ReconcileOutcome, TableSchema, TimeSeriesRecord,
    CREDIT_BALANCE_HISTORY,
};
use hangon_data::{
    AnalysisRecomputer, DataError, FieldPreservingUpserter, RecomputeConfig, RecomputeOutcome,
};
use hangon_notification::{Notification, NotificationCategory};
use tracing::Instrument;

use crate::{CollectionStats, CollectorContext, Result};

/// `analysis_results.subject`
pub const ANALYSIS_SUBJECT: &str = "credit_balance";
pub const FRONTEND_PATH: &str = "/credit-balance";

/// 신용융자 잔고 수집
pub async fn run_credit_balance(ctx: &CollectorContext) -> Result<CollectionStats> {
    collect(ctx)
        .instrument(sync_span!("credit_balance", CREDIT_BALANCE_HISTORY))
        .await
}

async fn collect(ctx: &CollectorContext) -> Result<CollectionStats> {
    let start = Instant::now();
    let mut stats = CollectionStats::new();
    let generator = ctx.require_generator()?;
    let config = &ctx.config.credit_balance;

    // 1. 워터마크 및 조회 범위
    let watermark = ctx.store.latest_key(CREDIT_BALANCE_HISTORY).await?;
    let window = FetchWindow::for_watermark(
        watermark.as_deref(),
        config.backfill_pages,
        config.incremental_pages,
    );
    tracing::info!(watermark = ?watermark, ?window, "신용잔고 수집 시작");

    // 2. 수집 + 신규 행 저장
    match ctx.credit_source.fetch_pages(window.size()).await {
        Ok(rows) => {
            stats.fetched = rows.len();
            let records: Vec<TimeSeriesRecord> = rows.iter().map(|r| r.to_record()).collect();
            let reconciled = reconcile(watermark.as_deref(), records);

            match reconciled.outcome {
                ReconcileOutcome::SourceEmpty => {
                    tracing::warn!("신용잔고 소스가 빈 결과 반환");
                    stats.empty += 1;
                }
                ReconcileOutcome::NothingNew => {
                    tracing::info!("신규 신용잔고 데이터 없음");
                    stats.skipped += 1;
                }
                ReconcileOutcome::NewRecords(count) => {
                    let upserter = FieldPreservingUpserter::new(
                        ctx.store.clone(),
                        TableSchema::credit_balance_history(),
                    );
                    let report = upserter.apply_batch(&reconciled.new_records).await;
                    stats.absorb(&report);
                    tracing::info!(
                        count,
                        next_watermark = ?reconciled.next_watermark,
                        "신용잔고 신규 데이터 저장"
                    );
                }
            }
        }
        Err(e) => {
            // 재계산은 저장된 데이터 기준이므로 계속 진행
            tracing::warn!(error = %e, transient = e.is_transient(), "신용잔고 소스 사용 불가");
            stats.errors += 1;
        }
    }

    // 3. 분석 재계산
    let recomputer = AnalysisRecomputer::new(
        ctx.store.clone(),
        generator,
        RecomputeConfig::new(ANALYSIS_SUBJECT, CREDIT_BALANCE_HISTORY)
            .with_max_attempts(ctx.config.llm.max_attempts)
            .with_context_rows(config.context_rows),
    );

    match recomputer.run(build_prompt).await {
        Ok(RecomputeOutcome::Recomputed(record)) => {
            stats.recomputed += 1;
            announce(ctx, &record.analyzed_key).await;
        }
        Ok(RecomputeOutcome::Failed { attempts, last_error }) => {
            tracing::error!(attempts, error = %last_error, "신용잔고 분석 실패, 다음 실행에서 재시도");
            stats.errors += 1;
        }
        Ok(RecomputeOutcome::UpToDate) => {}
        Err(DataError::Domain(e @ CoreError::WatermarkInvariant { .. })) => {
            tracing::error!(error = %e, "신용잔고 워터마크 불변식 위반");
            stats.invariant_violations += 1;
        }
        Err(e) => return Err(e.into()),
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// 새 분석 알림 및 캐시 무효화
async fn announce(ctx: &CollectorContext, analyzed_key: &str) {
    let notification = Notification::new(
        NotificationCategory::CreditBalance,
        "🏦 신용융자 잔고 업데이트",
        format!(
            "신규 데이터({})가 수집되었습니다. 시장의 '빚투' 심리 분석을 확인하세요.",
            analyzed_key
        ),
    )
    .with_url(FRONTEND_PATH);

    if let Err(e) = ctx.notifier.notify(&notification).await {
        tracing::warn!(error = %e, "신용잔고 알림 전송 실패");
    }
    ctx.revalidator.revalidate_path(FRONTEND_PATH).await;
}

/// 조원 단위 표기
fn trillions(won: f64) -> String {
    format!("{:.2}조", won / 1_0000_0000_0000.0)
}

/// 분석 프롬프트 (행은 날짜 오름차순)
pub fn build_prompt(rows: &[TimeSeriesRecord]) -> String {
    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        let deposit = row.payload.get_f64("customer_deposit").unwrap_or(0.0);
        let total = row.payload.get_f64("total").unwrap_or(0.0);
        let ratio = if deposit > 0.0 { total / deposit * 100.0 } else { 0.0 };
        lines.push(format!(
            "- {}: 고객예탁금 {}, 신용융자 {}, 예탁금 대비 신용 {:.2}%",
            row.key(),
            trillions(deposit),
            trillions(total),
            ratio
        ));
    }

    format!(
        "다음은 최근 {}일간 한국 증시의 고객예탁금과 신용융자 잔고입니다.\n{}\n\n\
         개인 투자자의 '빚투' 심리를 분석하고 다음 JSON 형식으로만 답하세요:\n\
         {{\"title\": string, \"summary\": string, \"analysis\": string, \"recommendation\": [string]}}",
        rows.len(),
        lines.join("\n")
    )
}
