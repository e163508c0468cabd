//! 워터마크와 수집 범위.
//!
//! 워터마크는 특정 소스/테이블 쌍에 대해 영구 저장된 가장 큰 키입니다.
//! 분석 마커(`latest_analyzed_key`)는 값비싼 후속 작업(LLM 요약)이
//! 마지막으로 처리한 키입니다.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// 수집/분석 진행 상태.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkState {
    /// 저장소에 존재하는 최대 키
    pub latest_captured_key: Option<String>,
    /// 분석이 완료된 최대 키
    pub latest_analyzed_key: Option<String>,
}

impl WatermarkState {
    pub fn new(captured: Option<String>, analyzed: Option<String>) -> Self {
        Self {
            latest_captured_key: captured,
            latest_analyzed_key: analyzed,
        }
    }

    /// `latest_analyzed_key <= latest_captured_key` 검증.
    ///
    /// 분석 마커가 수집 워터마크보다 앞서 있으면 분석이 데이터 수집보다
    /// 먼저 실행된 것이므로 오류입니다.
    pub fn check_invariant(&self) -> CoreResult<()> {
        match (&self.latest_analyzed_key, &self.latest_captured_key) {
            (None, _) => Ok(()),
            (Some(analyzed), Some(captured)) if analyzed <= captured => Ok(()),
            (Some(analyzed), captured) => Err(CoreError::WatermarkInvariant {
                analyzed: analyzed.clone(),
                captured: captured.clone(),
            }),
        }
    }
}

/// 소스 요청 범위.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchWindow {
    /// 콜드 스타트: 넓은 과거 범위
    Backfill(u32),
    /// 정상 상태: 기존 범위와 겹치는 좁은 범위
    Incremental(u32),
}

impl FetchWindow {
    /// 워터마크 유무에 따라 요청 범위 결정.
    pub fn for_watermark(watermark: Option<&str>, backfill: u32, incremental: u32) -> Self {
        match watermark {
            None => Self::Backfill(backfill),
            Some(_) => Self::Incremental(incremental),
        }
    }

    /// 요청 크기 (페이지 수 또는 일수).
    pub fn size(&self) -> u32 {
        match self {
            Self::Backfill(n) | Self::Incremental(n) => *n,
        }
    }

    pub fn is_backfill(&self) -> bool {
        matches!(self, Self::Backfill(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_holds_when_analysis_behind() {
        let state = WatermarkState::new(Some("2024-03-05".into()), Some("2024-03-01".into()));
        assert!(state.check_invariant().is_ok());

        let never_analyzed = WatermarkState::new(Some("2024-03-05".into()), None);
        assert!(never_analyzed.check_invariant().is_ok());
    }

    #[test]
    fn test_invariant_violated_when_analysis_ahead() {
        let state = WatermarkState::new(Some("2024-03-01".into()), Some("2024-03-05".into()));
        assert!(matches!(
            state.check_invariant(),
            Err(CoreError::WatermarkInvariant { .. })
        ));

        let no_capture = WatermarkState::new(None, Some("2024-03-05".into()));
        assert!(no_capture.check_invariant().is_err());
    }

    #[test]
    fn test_fetch_window_backfill_on_cold_start() {
        assert_eq!(FetchWindow::for_watermark(None, 15, 1), FetchWindow::Backfill(15));
        assert_eq!(
            FetchWindow::for_watermark(Some("2024-03-01"), 15, 1),
            FetchWindow::Incremental(1)
        );
        assert_eq!(FetchWindow::Incremental(5).size(), 5);
    }
}
