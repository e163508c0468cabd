//! Hangon 시장 데이터 수집기.
//!
//! 스케줄 실행되는 트래커 모음:
//! - 신용융자 잔고 수집 + LLM 분석 (워터마크 기반 재계산)
//! - 코스피-S&P500 이동 상관계수
//! - 실적 발표 일정 (예상치) 및 발표 실적 채우기
//! - 모니터링 종목 유니버스 동기화
//! - 증시 휴장일 동기화 및 알림

pub mod config;
pub mod context;
pub mod error;
pub mod modules;
pub mod stats;
pub mod workflow;

pub use config::CollectorConfig;
pub use context::CollectorContext;
pub use error::{CollectorError, Result};
pub use stats::CollectionStats;
pub use workflow::{ensure_ready, run_trackers, Tracker};
