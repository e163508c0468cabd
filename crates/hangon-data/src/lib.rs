//! 저장소와 외부 데이터 소스.
//!
//! 이 crate는 다음을 제공합니다:
//! - `TableStore` 저장소 trait (PostgreSQL / 메모리 구현)
//! - 보호 필드를 유지하는 upsert 실행기
//! - 워터마크 기반 분석 재계산 실행기
//! - Yahoo Finance, 네이버 금융, 위키백과, Gemini 어댑터

pub mod error;
pub mod provider;
pub mod recompute;
pub mod storage;
pub mod upsert;

pub use error::{DataError, Result};

pub use provider::{
    CompanyProfile, CreditBalanceRow, CreditBalanceSource, EarningsEvent, EarningsProvider,
    GeminiClient, IndexUniverse, NaverFinanceFetcher, PricePoint, QuoteProvider, ResponseFormat,
    TextGenerator, UniverseSource, WikipediaIndexFetcher, YahooEarningsProvider,
    YahooQuoteProvider,
};
pub use recompute::{generate_json_or, AnalysisRecomputer, RecomputeConfig, RecomputeOutcome};
pub use storage::{
    Database, DatabaseConfig, MemoryTableStore, PgTableStore, RowFilter, TableStore, WriteKind,
};
pub use upsert::{FieldPreservingUpserter, UpsertOutcome, UpsertReport};
