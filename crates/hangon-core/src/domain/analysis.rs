//! LLM 분석 결과 스키마.
//!
//! 모델 응답은 엄격한 JSON 스키마로만 파싱합니다. 코드 펜스 등
//! 문자열 휴리스틱으로 응답을 잘라내지 않습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::record::Payload;
use crate::error::{CoreError, CoreResult};

/// 분석 본문.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisContent {
    pub title: String,
    pub summary: String,
    pub analysis: String,
    pub recommendation: Vec<String>,
}

impl AnalysisContent {
    /// 모델 응답 텍스트를 파싱하고 검증.
    ///
    /// JSON 배열이면 첫 번째 원소만 사용합니다.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let value: Value = serde_json::from_str(text.trim())
            .map_err(|e| CoreError::AnalysisSchema(format!("JSON 파싱 실패: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> CoreResult<Self> {
        let value = match value {
            Value::Array(mut items) => {
                if items.is_empty() {
                    return Err(CoreError::AnalysisSchema("빈 배열 응답".into()));
                }
                items.swap_remove(0)
            }
            other => other,
        };

        let content: Self = serde_json::from_value(value)
            .map_err(|e| CoreError::AnalysisSchema(format!("필드 불일치: {}", e)))?;
        content.validate()?;
        Ok(content)
    }

    /// 필수 필드 검증.
    pub fn validate(&self) -> CoreResult<()> {
        for (name, text) in [
            ("title", &self.title),
            ("summary", &self.summary),
            ("analysis", &self.analysis),
        ] {
            if text.trim().is_empty() {
                return Err(CoreError::AnalysisSchema(format!("{} 필드가 비어 있음", name)));
            }
        }
        if self.recommendation.iter().all(|r| r.trim().is_empty()) {
            return Err(CoreError::AnalysisSchema("recommendation 필드가 비어 있음".into()));
        }
        Ok(())
    }
}

/// 저장된 분석 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// 분석 대상 (예: `credit_balance`)
    pub subject: String,
    /// 분석에 사용된 최대 키
    pub analyzed_key: String,
    pub content: AnalysisContent,
    /// 분석 시점의 최신 레코드
    pub latest_data: Payload,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "title": "신용융자 증가",
        "summary": "레버리지 확대",
        "analysis": "예탁금 대비 신용 비율 상승",
        "recommendation": ["분할 매수"]
    }"#;

    #[test]
    fn test_parse_valid_object() {
        let content = AnalysisContent::parse(VALID).unwrap();
        assert_eq!(content.title, "신용융자 증가");
        assert_eq!(content.recommendation.len(), 1);
    }

    #[test]
    fn test_parse_array_uses_first_element() {
        let text = format!("[{}, {{}}]", VALID);
        assert!(AnalysisContent::parse(&text).is_ok());
        assert!(AnalysisContent::parse("[]").is_err());
    }

    #[test]
    fn test_rejects_fenced_or_incomplete_responses() {
        let fenced = format!("```json\n{}\n```", VALID);
        assert!(matches!(
            AnalysisContent::parse(&fenced),
            Err(CoreError::AnalysisSchema(_))
        ));

        let missing = r#"{"title": "t", "summary": "s", "analysis": "a"}"#;
        assert!(AnalysisContent::parse(missing).is_err());

        let blank = r#"{"title": " ", "summary": "s", "analysis": "a", "recommendation": ["x"]}"#;
        assert!(AnalysisContent::parse(blank).is_err());

        let no_recs = r#"{"title": "t", "summary": "s", "analysis": "a", "recommendation": []}"#;
        assert!(AnalysisContent::parse(no_recs).is_err());
    }
}
