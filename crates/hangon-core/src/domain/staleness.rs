//! 분석 재계산 상태 판정.

use crate::domain::watermark::WatermarkState;

/// 워터마크 비교로 결정되는 재계산 필요 여부.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecomputeState {
    /// 분석이 최신 데이터와 일치 (또는 분석할 데이터 없음)
    UpToDate,
    /// `target_key`까지 다시 분석해야 함
    NeedsRecompute { target_key: String },
}

impl RecomputeState {
    pub fn evaluate(state: &WatermarkState) -> Self {
        match (&state.latest_captured_key, &state.latest_analyzed_key) {
            (None, _) => Self::UpToDate,
            (Some(captured), Some(analyzed)) if captured == analyzed => Self::UpToDate,
            (Some(captured), _) => Self::NeedsRecompute {
                target_key: captured.clone(),
            },
        }
    }

    pub fn needs_recompute(&self) -> bool {
        matches!(self, Self::NeedsRecompute { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate() {
        let fresh = WatermarkState::new(Some("2024-03-05".into()), Some("2024-03-05".into()));
        assert_eq!(RecomputeState::evaluate(&fresh), RecomputeState::UpToDate);

        let stale = WatermarkState::new(Some("2024-03-05".into()), Some("2024-03-04".into()));
        assert_eq!(
            RecomputeState::evaluate(&stale),
            RecomputeState::NeedsRecompute {
                target_key: "2024-03-05".into()
            }
        );

        let never = WatermarkState::new(Some("2024-03-05".into()), None);
        assert!(RecomputeState::evaluate(&never).needs_recompute());

        let empty = WatermarkState::default();
        assert_eq!(RecomputeState::evaluate(&empty), RecomputeState::UpToDate);
    }
}
