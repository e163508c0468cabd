//! 외부 데이터 소스.
//!
//! 수집 정책은 이 모듈에 없습니다. 각 trait은 소스 하나를 감싸는 얇은
//! 어댑터이며, 트래커는 trait에만 의존합니다.
//!
//! ## Yahoo Finance
//! - `YahooQuoteProvider`: 일봉 종가 (`yahoo_finance_api`)
//! - `YahooEarningsProvider`: 실적 발표 일정, 분기 매출 (quoteSummary)
//!
//! ## 네이버 금융
//! - `NaverFinanceFetcher`: 신용융자 잔고, 코스피 시가총액 상위 종목
//!
//! ## 위키백과
//! - `WikipediaIndexFetcher`: S&P 100 구성 종목
//!
//! `IndexUniverse`는 두 크롤러를 묶어 모니터링 유니버스를 만듭니다.
//!
//! ## Gemini
//! - `GeminiClient`: 분석/번역 텍스트 생성

pub mod gemini;
pub mod naver;
pub mod universe;
pub mod wikipedia;
pub mod yahoo;

use async_trait::async_trait;
use chrono::NaiveDate;
use hangon_core::{QuarterFigure, UniverseMember};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use gemini::GeminiClient;
pub use naver::{CreditBalanceRow, NaverFinanceFetcher};
pub use universe::IndexUniverse;
pub use wikipedia::WikipediaIndexFetcher;
pub use yahoo::{YahooEarningsProvider, YahooQuoteProvider};

/// 일별 종가.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// 거래소 현지 날짜
    pub date: NaiveDate,
    pub close: f64,
}

/// 예정된 실적 발표.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsEvent {
    pub date: NaiveDate,
    pub eps_estimate: Option<f64>,
    pub revenue_estimate: Option<f64>,
}

/// 종목 기본 정보.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_name: Option<String>,
    /// 회사 홈페이지 (로고 도메인 추출용)
    pub website: Option<String>,
}

/// 시세 소스.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// 최근 `days`일(달력 기준)의 일봉 종가 (날짜 오름차순).
    async fn fetch_history(&self, symbol: &str, days: u32) -> Result<Vec<PricePoint>>;

    /// 가장 최근 종가.
    async fn fetch_point(&self, symbol: &str) -> Result<Option<PricePoint>>;
}

/// 실적 데이터 소스.
#[async_trait]
pub trait EarningsProvider: Send + Sync {
    /// 예정된 실적 발표 일정과 예상치.
    async fn upcoming_earnings(&self, symbol: &str) -> Result<Vec<EarningsEvent>>;

    /// 분기별 실제 매출/EPS.
    async fn quarterly_figures(&self, symbol: &str) -> Result<Vec<QuarterFigure>>;

    /// 회사명, 홈페이지.
    async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile>;
}

/// 신용융자 잔고 소스.
#[async_trait]
pub trait CreditBalanceSource: Send + Sync {
    /// 1페이지부터 `pages`페이지까지 수집. 실패한 페이지는 건너뜁니다.
    async fn fetch_pages(&self, pages: u32) -> Result<Vec<CreditBalanceRow>>;
}

/// 모니터링 유니버스 소스.
#[async_trait]
pub trait UniverseSource: Send + Sync {
    async fn fetch_universe(&self) -> Result<Vec<UniverseMember>>;
}

/// 응답 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

/// 텍스트 생성기 (LLM).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 한 번 호출. 재시도는 호출자가 담당합니다.
    async fn generate(&self, prompt: &str, format: ResponseFormat) -> Result<String>;

    fn name(&self) -> &str;
}
