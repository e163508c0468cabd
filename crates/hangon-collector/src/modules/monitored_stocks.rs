//! 모니터링 종목 유니버스 동기화.
//!
//! 유니버스에서 빠진 종목은 삭제하지 않고 `inactive`로 전환합니다. 다른
//! 테이블의 과거 데이터는 그대로 남습니다.

use std::time::Instant;

use chrono::{DateTime, Utc};
use hangon_core::{diff_membership, sync_span, EntityStatus, MonitoredEntity};
use tracing::Instrument;

use crate::{CollectionStats, CollectorContext, Result};

/// 모니터링 종목 동기화
pub async fn run_monitored_stocks(ctx: &CollectorContext) -> Result<CollectionStats> {
    run_monitored_stocks_at(ctx, Utc::now()).await
}

pub async fn run_monitored_stocks_at(ctx: &CollectorContext, now: DateTime<Utc>) -> Result<CollectionStats> {
    collect(ctx, now)
        .instrument(sync_span!("monitored_stocks", "monitored_stocks"))
        .await
}

async fn collect(ctx: &CollectorContext, now: DateTime<Utc>) -> Result<CollectionStats> {
    let start = Instant::now();
    let mut stats = CollectionStats::new();

    // 1. 현재 유니버스
    let universe = match ctx.universe.fetch_universe().await {
        Ok(universe) => universe,
        Err(e) => {
            tracing::warn!(error = %e, transient = e.is_transient(), "유니버스 소스 사용 불가");
            stats.errors += 1;
            stats.elapsed = start.elapsed();
            return Ok(stats);
        }
    };
    stats.fetched = universe.len();

    // 빈 유니버스를 "전부 제외"로 해석하지 않음
    if universe.is_empty() {
        tracing::warn!("유니버스가 비어 있음, 멤버십 비교 중단");
        stats.empty += 1;
        stats.elapsed = start.elapsed();
        return Ok(stats);
    }

    // 2. 저장된 종목과 비교
    let stored = ctx.store.monitored_entities().await?;
    let diff = diff_membership(&universe, &stored);
    if diff.is_empty() {
        tracing::info!(symbols = universe.len(), "유니버스 변경 없음");
        stats.unchanged = universe.len();
        stats.elapsed = start.elapsed();
        return Ok(stats);
    }

    tracing::info!(
        added = diff.added.len(),
        reactivated = diff.reactivated.len(),
        confirmed = diff.confirmed.len(),
        removed = diff.removed.len(),
        "유니버스 변경 감지"
    );

    // 3. 신규 편입
    for member in &diff.added {
        let entity = MonitoredEntity {
            symbol: member.symbol.clone(),
            company_name: member.company_name.clone(),
            country: Some(member.country.clone()),
            status: EntityStatus::Active { since: now },
        };
        match ctx.store.insert_entity(&entity).await {
            Ok(()) => stats.inserted += 1,
            Err(e) => {
                tracing::warn!(symbol = %member.symbol, error = %e, "종목 추가 실패");
                stats.errors += 1;
            }
        }
    }

    // 4. 재편입: 이번 실행은 대기 상태로만 전환
    for member in &diff.reactivated {
        match ctx
            .store
            .set_entity_status(&member.symbol, EntityStatus::PendingReactivation { since: now })
            .await
        {
            Ok(()) => {
                tracing::info!(symbol = %member.symbol, "종목 재활성화 대기");
                stats.updated += 1;
            }
            Err(e) => {
                tracing::warn!(symbol = %member.symbol, error = %e, "종목 재활성화 대기 전환 실패");
                stats.errors += 1;
            }
        }
    }

    // 대기 종목이 다시 확인되면 활성화
    for member in &diff.confirmed {
        match ctx
            .store
            .set_entity_status(&member.symbol, EntityStatus::Active { since: now })
            .await
        {
            Ok(()) => {
                tracing::info!(symbol = %member.symbol, "종목 재활성화");
                stats.updated += 1;
            }
            Err(e) => {
                tracing::warn!(symbol = %member.symbol, error = %e, "종목 재활성화 실패");
                stats.errors += 1;
            }
        }
    }

    // 5. 제외 (soft delete)
    for symbol in &diff.removed {
        match ctx
            .store
            .set_entity_status(symbol, EntityStatus::Inactive { since: now })
            .await
        {
            Ok(()) => {
                tracing::info!(symbol = %symbol, "종목 비활성화");
                stats.updated += 1;
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "종목 비활성화 실패");
                stats.errors += 1;
            }
        }
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}
