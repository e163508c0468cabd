//! # Hangon Core
//!
//! 시장 데이터 수집기의 순수 도메인 계층입니다. I/O가 없습니다.
//!
//! - 시계열 레코드, 자연 키, payload
//! - 워터마크 기반 소스 조정 (`reconcile`)
//! - 보호 필드를 유지하는 upsert 계획
//! - 분석 재계산 상태와 LLM 응답 스키마
//! - 모니터링 종목 상태 (소프트 삭제)
//! - 회계 분기 매칭
//! - 로깅 초기화

pub mod domain;
pub mod error;
pub mod logging;

pub use domain::*;
pub use error::*;
pub use logging::*;
