//! 메모리 `TableStore`.
//!
//! 테스트와 `--dry-run` 실행에서 사용합니다. 특정 키에 대한 쓰기 실패를
//! 주입할 수 있습니다.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use hangon_core::{AnalysisRecord, EntityStatus, MonitoredEntity, NaturalKey, Payload, TimeSeriesRecord};
use tokio::sync::RwLock;

use super::{RowFilter, TableStore, WriteKind};
use crate::error::{DataError, Result};

type Table = BTreeMap<NaturalKey, Payload>;

/// 메모리 저장소.
#[derive(Default)]
pub struct MemoryTableStore {
    tables: RwLock<HashMap<String, Table>>,
    analyses: RwLock<HashMap<String, AnalysisRecord>>,
    entities: RwLock<BTreeMap<String, MonitoredEntity>>,
    failing_keys: RwLock<HashSet<NaturalKey>>,
    analysis_writes: AtomicUsize,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 테이블에 행을 직접 넣습니다 (테스트 준비용).
    pub async fn seed(&self, table: &str, records: impl IntoIterator<Item = TimeSeriesRecord>) {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        for record in records {
            rows.insert(record.natural_key, record.payload);
        }
    }

    pub async fn seed_entity(&self, entity: MonitoredEntity) {
        self.entities.write().await.insert(entity.symbol.clone(), entity);
    }

    /// 이 키에 대한 모든 쓰기를 실패시킵니다.
    pub async fn fail_writes_for(&self, key: NaturalKey) {
        self.failing_keys.write().await.insert(key);
    }

    /// 테이블 전체 (키 오름차순).
    pub async fn rows(&self, table: &str) -> Vec<TimeSeriesRecord> {
        self.tables
            .read()
            .await
            .get(table)
            .map(|rows| {
                rows.iter()
                    .map(|(key, payload)| TimeSeriesRecord {
                        natural_key: key.clone(),
                        payload: payload.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `save_analysis` 호출 횟수.
    pub fn analysis_writes(&self) -> usize {
        self.analysis_writes.load(Ordering::SeqCst)
    }

    async fn check_writable(&self, key: &NaturalKey) -> Result<()> {
        if self.failing_keys.read().await.contains(key) {
            return Err(DataError::QueryError(format!("injected failure: {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn upsert_on_conflict(&self, table: &str, record: &TimeSeriesRecord) -> Result<WriteKind> {
        self.check_writable(&record.natural_key).await?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        match rows.get_mut(&record.natural_key) {
            Some(existing) => {
                existing.merge(&record.payload);
                Ok(WriteKind::Updated)
            }
            None => {
                rows.insert(record.natural_key.clone(), record.payload.clone());
                Ok(WriteKind::Inserted)
            }
        }
    }

    async fn insert(&self, table: &str, record: &TimeSeriesRecord) -> Result<()> {
        self.check_writable(&record.natural_key).await?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(&record.natural_key) {
            return Err(DataError::DuplicateError(format!("{}:{}", table, record.natural_key)));
        }
        rows.insert(record.natural_key.clone(), record.payload.clone());
        Ok(())
    }

    async fn select_by_key(&self, table: &str, key: &NaturalKey) -> Result<Option<Payload>> {
        Ok(self
            .tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.get(key).cloned()))
    }

    async fn update_fields(&self, table: &str, key: &NaturalKey, patch: &Payload) -> Result<()> {
        self.check_writable(key).await?;
        let mut tables = self.tables.write().await;
        let existing = tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(key))
            .ok_or_else(|| DataError::NotFound(format!("{}:{}", table, key)))?;
        existing.merge(patch);
        Ok(())
    }

    async fn latest_key(&self, table: &str) -> Result<Option<String>> {
        Ok(self
            .tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.keys().map(|k| k.key.clone()).max()))
    }

    async fn latest_rows(&self, table: &str, limit: usize) -> Result<Vec<TimeSeriesRecord>> {
        let rows = self.rows(table).await;
        let skip = rows.len().saturating_sub(limit);
        Ok(rows.into_iter().skip(skip).collect())
    }

    async fn rows_matching(&self, table: &str, filter: &RowFilter) -> Result<Vec<TimeSeriesRecord>> {
        Ok(self
            .rows(table)
            .await
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    async fn load_analysis(&self, subject: &str) -> Result<Option<AnalysisRecord>> {
        Ok(self.analyses.read().await.get(subject).cloned())
    }

    async fn save_analysis(&self, record: &AnalysisRecord) -> Result<()> {
        self.analysis_writes.fetch_add(1, Ordering::SeqCst);
        self.analyses
            .write()
            .await
            .insert(record.subject.clone(), record.clone());
        Ok(())
    }

    async fn monitored_entities(&self) -> Result<Vec<MonitoredEntity>> {
        Ok(self.entities.read().await.values().cloned().collect())
    }

    async fn set_entity_status(&self, symbol: &str, status: EntityStatus) -> Result<()> {
        let mut entities = self.entities.write().await;
        let entity = entities
            .get_mut(symbol)
            .ok_or_else(|| DataError::NotFound(format!("monitored_stocks:{}", symbol)))?;
        entity.status = status;
        Ok(())
    }

    async fn insert_entity(&self, entity: &MonitoredEntity) -> Result<()> {
        let mut entities = self.entities.write().await;
        if entities.contains_key(&entity.symbol) {
            return Err(DataError::DuplicateError(format!("monitored_stocks:{}", entity.symbol)));
        }
        entities.insert(entity.symbol.clone(), entity.clone());
        Ok(())
    }
}
