//! 워터마크 기반 분석 재계산.
//!
//! 수집 워터마크가 분석 마커보다 앞서 있을 때만 LLM을 호출합니다.
//! 재시도가 모두 실패하면 아무것도 쓰지 않으므로, 마커는 그대로 남고
//! 다음 스케줄 실행에서 다시 시도됩니다.

use std::sync::Arc;

use chrono::Utc;
use hangon_core::{
    AnalysisContent, AnalysisRecord, NaturalKey, RecomputeState, TimeSeriesRecord, WatermarkState,
};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use crate::error::{DataError, Result};
use crate::provider::{ResponseFormat, TextGenerator};
use crate::storage::TableStore;

/// 재계산 설정.
#[derive(Debug, Clone)]
pub struct RecomputeConfig {
    /// 분석 대상 (`analysis_results.subject`)
    pub subject: String,
    /// 워터마크를 읽을 히스토리 테이블
    pub history_table: &'static str,
    /// LLM 호출 최대 횟수
    pub max_attempts: u32,
    /// 프롬프트에 넣을 최신 행 수 (최소 1)
    pub context_rows: usize,
}

impl RecomputeConfig {
    pub fn new(subject: impl Into<String>, history_table: &'static str) -> Self {
        Self {
            subject: subject.into(),
            history_table,
            max_attempts: 3,
            context_rows: 30,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_context_rows(mut self, context_rows: usize) -> Self {
        self.context_rows = context_rows.max(1);
        self
    }
}

/// 재계산 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum RecomputeOutcome {
    /// 분석이 이미 최신
    UpToDate,
    /// 새 분석 저장 완료
    Recomputed(AnalysisRecord),
    /// 재시도 소진, 저장하지 않음
    Failed { attempts: u32, last_error: String },
}

/// 분석 재계산 실행기.
pub struct AnalysisRecomputer<S: TableStore + ?Sized, G: TextGenerator + ?Sized> {
    store: Arc<S>,
    generator: Arc<G>,
    config: RecomputeConfig,
}

impl<S: TableStore + ?Sized, G: TextGenerator + ?Sized> AnalysisRecomputer<S, G> {
    pub fn new(store: Arc<S>, generator: Arc<G>, config: RecomputeConfig) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    /// 현재 워터마크 상태.
    pub async fn watermark_state(&self) -> Result<WatermarkState> {
        let captured = self.store.latest_key(self.config.history_table).await?;
        let analyzed = self
            .store
            .load_analysis(&self.config.subject)
            .await?
            .map(|a| a.analyzed_key);
        Ok(WatermarkState::new(captured, analyzed))
    }

    /// 필요하면 재계산.
    ///
    /// `prompt_builder`는 최신 `context_rows`개 행(키 오름차순)을 받습니다.
    pub async fn run<F>(&self, prompt_builder: F) -> Result<RecomputeOutcome>
    where
        F: Fn(&[TimeSeriesRecord]) -> String + Send + Sync,
    {
        let subject = self.config.subject.as_str();
        let state = self.watermark_state().await?;
        if let Err(e) = state.check_invariant() {
            error!(subject, error = %e, "분석 마커가 수집 워터마크보다 앞섬");
            return Err(e.into());
        }

        let target_key = match RecomputeState::evaluate(&state) {
            RecomputeState::UpToDate => {
                info!(subject, analyzed = ?state.latest_analyzed_key, "분석이 이미 최신");
                return Ok(RecomputeOutcome::UpToDate);
            }
            RecomputeState::NeedsRecompute { target_key } => target_key,
        };

        info!(
            subject,
            from = ?state.latest_analyzed_key,
            to = %target_key,
            "분석 재계산 필요"
        );

        // 워터마크 행은 키로 직접 읽음 (컨텍스트 창 크기와 무관)
        let Some(mut latest_data) = self
            .store
            .select_by_key(self.config.history_table, &NaturalKey::new(target_key.clone()))
            .await?
        else {
            error!(subject, key = %target_key, "워터마크 행을 찾을 수 없음");
            return Err(DataError::NotFound(format!(
                "{}:{}",
                self.config.history_table, target_key
            )));
        };
        if !latest_data.contains("date") {
            latest_data.insert("date", target_key.clone());
        }

        let rows = self
            .store
            .latest_rows(self.config.history_table, self.config.context_rows.max(1))
            .await?;

        let prompt = prompt_builder(&rows);
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            let content = match self.generator.generate(&prompt, ResponseFormat::Json).await {
                Ok(text) => AnalysisContent::parse(&text).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match content {
                Ok(content) => {
                    let record = AnalysisRecord {
                        subject: subject.to_string(),
                        analyzed_key: target_key.clone(),
                        content,
                        latest_data,
                        updated_at: Utc::now(),
                    };
                    self.store.save_analysis(&record).await?;
                    info!(subject, key = %target_key, attempt, "분석 저장 완료");
                    return Ok(RecomputeOutcome::Recomputed(record));
                }
                Err(e) => {
                    warn!(
                        subject,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        generator = self.generator.name(),
                        error = %e,
                        "분석 생성 실패"
                    );
                    last_error = e;
                }
            }
        }

        warn!(subject, key = %target_key, "분석 재시도 소진, 다음 실행에서 재시도");
        Ok(RecomputeOutcome::Failed {
            attempts: self.config.max_attempts,
            last_error,
        })
    }
}

/// JSON 응답 생성, 모든 시도가 실패하면 `fallback` 반환.
///
/// 워터마크로 보호되지 않는 생성(예: 휴장일 이름 번역)에만 사용합니다.
pub async fn generate_json_or<G, T>(generator: &G, prompt: &str, attempts: u32, fallback: T) -> T
where
    G: TextGenerator + ?Sized,
    T: DeserializeOwned,
{
    for attempt in 1..=attempts.max(1) {
        match generator.generate(prompt, ResponseFormat::Json).await {
            Ok(text) => match serde_json::from_str::<T>(text.trim()) {
                Ok(value) => return value,
                Err(e) => warn!(attempt, error = %e, "JSON 응답 파싱 실패"),
            },
            Err(e) => warn!(attempt, error = %e, "텍스트 생성 실패"),
        }
    }

    warn!(generator = generator.name(), "생성 실패, 기본값 사용");
    fallback
}
