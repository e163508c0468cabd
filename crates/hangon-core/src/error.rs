//! 도메인 에러 타입.

use thiserror::Error;

/// 순수 도메인 계층 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 분석 마커가 수집 워터마크보다 앞섬
    #[error("워터마크 불변식 위반: analyzed={analyzed} > captured={captured:?}")]
    WatermarkInvariant {
        analyzed: String,
        captured: Option<String>,
    },

    /// LLM 응답이 분석 스키마와 불일치
    #[error("분석 스키마 위반: {0}")]
    AnalysisSchema(String),

    /// 잘못된 키 또는 값
    #[error("잘못된 값: {0}")]
    InvalidValue(String),
}

/// 도메인 작업 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// 같은 입력으로 재시도하면 결과가 달라질 수 있는 에러인지 확인.
    ///
    /// LLM 응답은 호출마다 달라지므로 스키마 위반은 재시도 대상입니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::AnalysisSchema(_))
    }
}
