//! 트래커 실행 순서.

use std::fmt;
use std::str::FromStr;

use crate::error::CollectorError;
use crate::{modules, CollectionStats, CollectorContext, Result};

/// 수집 트래커
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracker {
    MonitoredStocks,
    Holidays,
    CreditBalance,
    Correlation,
    EarningsTracker,
    EarningsUpdater,
}

impl Tracker {
    /// 전체 워크플로우 순서 (유니버스 → 휴장일 → 시계열 → 실적)
    pub const ALL: [Tracker; 6] = [
        Tracker::MonitoredStocks,
        Tracker::Holidays,
        Tracker::CreditBalance,
        Tracker::Correlation,
        Tracker::EarningsTracker,
        Tracker::EarningsUpdater,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::MonitoredStocks => "monitored-stocks",
            Self::Holidays => "holidays",
            Self::CreditBalance => "credit-balance",
            Self::Correlation => "correlation",
            Self::EarningsTracker => "earnings",
            Self::EarningsUpdater => "earnings-update",
        }
    }

    /// 텍스트 생성기가 반드시 필요한지
    pub fn requires_generator(&self) -> bool {
        matches!(self, Self::CreditBalance)
    }

    pub async fn run(&self, ctx: &CollectorContext) -> Result<CollectionStats> {
        match self {
            Self::MonitoredStocks => modules::run_monitored_stocks(ctx).await,
            Self::Holidays => modules::run_holidays(ctx).await,
            Self::CreditBalance => modules::run_credit_balance(ctx).await,
            Self::Correlation => modules::run_correlation(ctx).await,
            Self::EarningsTracker => modules::run_earnings_tracker(ctx).await,
            Self::EarningsUpdater => modules::run_earnings_updater(ctx).await,
        }
    }
}

impl fmt::Display for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tracker {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| CollectorError::Config(format!("알 수 없는 트래커: {}", s)))
    }
}

/// 실행 전 설정 검증 (작업 시작 전에 실패)
pub fn ensure_ready(ctx: &CollectorContext, trackers: &[Tracker]) -> Result<()> {
    if let Some(tracker) = trackers.iter().find(|t| t.requires_generator()) {
        if ctx.generator.is_none() {
            return Err(CollectorError::Config(format!(
                "{} 트래커에는 GEMINI_API_KEY가 필요합니다",
                tracker
            )));
        }
    }
    Ok(())
}

/// 트래커를 순서대로 실행합니다. 한 트래커의 실패는 다음 트래커를 막지 않습니다.
pub async fn run_trackers(
    ctx: &CollectorContext,
    trackers: &[Tracker],
) -> Vec<(Tracker, Result<CollectionStats>)> {
    let mut results = Vec::with_capacity(trackers.len());

    for (i, tracker) in trackers.iter().enumerate() {
        tracing::info!("Step {}/{}: {}", i + 1, trackers.len(), tracker);
        let result = tracker.run(ctx).await;
        match &result {
            Ok(stats) => stats.log_summary(tracker.name()),
            Err(e) => tracing::error!(tracker = %tracker, error = %e, "트래커 실행 실패"),
        }
        results.push((*tracker, result));
    }

    results
}
