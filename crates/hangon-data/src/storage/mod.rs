//! 테이블 저장소.
//!
//! 수집기가 쓰는 모든 영구 저장 연산을 `TableStore` trait 하나로 모읍니다.
//! - `PgTableStore`: PostgreSQL (sqlx)
//! - `MemoryTableStore`: 테스트/드라이런용 메모리 구현

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use hangon_core::{AnalysisRecord, EntityStatus, MonitoredEntity, NaturalKey, Payload, TimeSeriesRecord};

use crate::error::Result;

pub use memory::MemoryTableStore;
pub use postgres::{Database, DatabaseConfig, PgTableStore};

/// 충돌 시 덮어쓰기 upsert 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Inserted,
    Updated,
}

/// 행 조회 조건.
///
/// 모든 조건은 AND로 결합됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    /// `key < key_before`
    pub key_before: Option<String>,
    /// `key >= key_from`
    pub key_from: Option<String>,
    /// 이 필드가 채워지지 않은 행만
    pub missing_field: Option<String>,
    /// 보조 키 일치
    pub secondary_key: Option<String>,
}

impl RowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_before(mut self, key: impl Into<String>) -> Self {
        self.key_before = Some(key.into());
        self
    }

    pub fn key_from(mut self, key: impl Into<String>) -> Self {
        self.key_from = Some(key.into());
        self
    }

    pub fn missing(mut self, field: impl Into<String>) -> Self {
        self.missing_field = Some(field.into());
        self
    }

    pub fn secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary_key = Some(secondary.into());
        self
    }

    /// 행 판정. 모든 저장소 구현이 같은 기준(`is_populated`)을 쓰도록
    /// PostgreSQL 구현도 키 범위로 좁힌 뒤 이 함수로 거릅니다.
    pub fn matches(&self, record: &TimeSeriesRecord) -> bool {
        if let Some(before) = &self.key_before {
            if record.key() >= before.as_str() {
                return false;
            }
        }
        if let Some(from) = &self.key_from {
            if record.key() < from.as_str() {
                return false;
            }
        }
        if let Some(field) = &self.missing_field {
            if record.payload.is_field_populated(field) {
                return false;
            }
        }
        if let Some(secondary) = &self.secondary_key {
            if record.natural_key.secondary_or_empty() != secondary {
                return false;
            }
        }
        true
    }
}

/// 관계형 저장소 연산.
///
/// 모든 쓰기는 개별적으로 커밋됩니다. 배치 트랜잭션은 없습니다.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// 자연 키 충돌 시 보낸 필드만 덮어쓰는 upsert.
    async fn upsert_on_conflict(&self, table: &str, record: &TimeSeriesRecord) -> Result<WriteKind>;

    /// 새 행 삽입 (충돌 시 `DuplicateError`).
    async fn insert(&self, table: &str, record: &TimeSeriesRecord) -> Result<()>;

    /// 자연 키로 기존 행 조회.
    async fn select_by_key(&self, table: &str, key: &NaturalKey) -> Result<Option<Payload>>;

    /// 기존 행의 일부 필드 갱신. 보내지 않은 필드는 그대로 둡니다.
    async fn update_fields(&self, table: &str, key: &NaturalKey, patch: &Payload) -> Result<()>;

    /// 테이블의 최대 키 (워터마크).
    async fn latest_key(&self, table: &str) -> Result<Option<String>>;

    /// 최신 `limit`개 행 (키 오름차순).
    async fn latest_rows(&self, table: &str, limit: usize) -> Result<Vec<TimeSeriesRecord>>;

    /// 조건에 맞는 행 (키 오름차순).
    async fn rows_matching(&self, table: &str, filter: &RowFilter) -> Result<Vec<TimeSeriesRecord>>;

    /// 저장된 분석 결과.
    async fn load_analysis(&self, subject: &str) -> Result<Option<AnalysisRecord>>;

    /// 분석 결과 저장 (subject 기준 덮어쓰기).
    async fn save_analysis(&self, record: &AnalysisRecord) -> Result<()>;

    /// 모니터링 종목 전체 (상태 무관).
    async fn monitored_entities(&self) -> Result<Vec<MonitoredEntity>>;

    /// 종목 상태 전이. 행은 지우지 않습니다.
    async fn set_entity_status(&self, symbol: &str, status: EntityStatus) -> Result<()>;

    /// 새 모니터링 종목 삽입.
    async fn insert_entity(&self, entity: &MonitoredEntity) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_filter_matches() {
        let past = TimeSeriesRecord::composite("2024-04-25", "MSFT").with_field("revenue_actual", 0);
        let filled = TimeSeriesRecord::composite("2024-04-25", "AAPL").with_field("revenue_actual", 10);
        let future = TimeSeriesRecord::composite("2024-07-25", "MSFT");

        let filter = RowFilter::new().key_before("2024-05-01").missing("revenue_actual");

        assert!(filter.matches(&past));
        assert!(!filter.matches(&filled));
        assert!(!filter.matches(&future));
        assert!(RowFilter::new().secondary("MSFT").matches(&future));
    }

    #[test]
    fn test_missing_field_follows_populated_rule() {
        let filter = RowFilter::new().missing("revenue_actual");
        let row = |value: serde_json::Value| {
            TimeSeriesRecord::composite("2024-04-25", "MSFT").with_field("revenue_actual", value)
        };

        assert!(filter.matches(&row(serde_json::json!("   "))));
        assert!(filter.matches(&row(serde_json::json!(0.0))));
        assert!(filter.matches(&row(serde_json::Value::Null)));
        assert!(!filter.matches(&row(serde_json::json!("0.00"))));
        assert!(!filter.matches(&row(serde_json::json!(false))));
    }
}
