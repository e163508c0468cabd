//! 수집 통계 구조체.

use hangon_data::UpsertReport;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 소스에서 받은 레코드 수
    pub fetched: usize,
    /// 신규 저장
    pub inserted: usize,
    /// 기존 행 갱신
    pub updated: usize,
    /// 변경 없음
    pub unchanged: usize,
    /// 에러 횟수
    pub errors: usize,
    /// 건너뛴 횟수 (이미 최신 데이터)
    pub skipped: usize,
    /// 빈 데이터 (조회 성공, 데이터 없음)
    pub empty: usize,
    /// 분석 재계산 횟수
    pub recomputed: usize,
    /// 워터마크 불변식 위반 횟수
    pub invariant_violations: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// upsert 결과 반영
    pub fn absorb(&mut self, report: &UpsertReport) {
        self.inserted += report.inserted;
        self.updated += report.updated;
        self.unchanged += report.unchanged;
        self.errors += report.failed;
    }

    /// 저장된 행 수 (신규 + 갱신)
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        let attempted = self.written() + self.unchanged + self.errors;
        if attempted == 0 {
            0.0
        } else {
            ((self.written() + self.unchanged) as f64 / attempted as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            fetched = self.fetched,
            inserted = self.inserted,
            updated = self.updated,
            unchanged = self.unchanged,
            errors = self.errors,
            skipped = self.skipped,
            empty = self.empty,
            recomputed = self.recomputed,
            invariant_violations = self.invariant_violations,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}
