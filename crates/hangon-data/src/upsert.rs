//! 보호 필드를 유지하는 upsert 실행기.
//!
//! 보호 필드가 없는 테이블은 `upsert_on_conflict` 한 번으로 끝나고,
//! 보호 필드가 있는 테이블은 조회 → 계획 → 삽입/부분 갱신 순서로 처리합니다.
//! 레코드별로 독립 커밋되며, 실패한 레코드는 기록만 하고 배치를 계속합니다.

use std::sync::Arc;

use hangon_core::{TableSchema, TimeSeriesRecord, UpsertPlan};
use tracing::{debug, warn};

use crate::error::Result;
use crate::storage::{TableStore, WriteKind};

/// 레코드 하나의 처리 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// 배치 처리 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl UpsertReport {
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }

    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// 테이블 하나에 대한 upsert 실행기.
pub struct FieldPreservingUpserter<S: TableStore + ?Sized> {
    store: Arc<S>,
    schema: TableSchema,
}

impl<S: TableStore + ?Sized> FieldPreservingUpserter<S> {
    pub fn new(store: Arc<S>, schema: TableSchema) -> Self {
        Self { store, schema }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// 레코드 하나 처리.
    pub async fn apply(&self, record: &TimeSeriesRecord) -> Result<UpsertOutcome> {
        let table = self.schema.name;

        if !self.schema.has_protected_fields() {
            return Ok(match self.store.upsert_on_conflict(table, record).await? {
                WriteKind::Inserted => UpsertOutcome::Inserted,
                WriteKind::Updated => UpsertOutcome::Updated,
            });
        }

        let existing = self.store.select_by_key(table, &record.natural_key).await?;
        match UpsertPlan::for_record(&self.schema, record, existing.as_ref()) {
            UpsertPlan::Insert(_) => {
                self.store.insert(table, record).await?;
                Ok(UpsertOutcome::Inserted)
            }
            UpsertPlan::Update(patch) => {
                self.store
                    .update_fields(table, &record.natural_key, &patch)
                    .await?;
                Ok(UpsertOutcome::Updated)
            }
            UpsertPlan::Skip => Ok(UpsertOutcome::Unchanged),
        }
    }

    /// 배치 처리. 실패한 레코드가 있어도 중단하지 않습니다.
    pub async fn apply_batch(&self, records: &[TimeSeriesRecord]) -> UpsertReport {
        let mut report = UpsertReport::default();

        for record in records {
            match self.apply(record).await {
                Ok(outcome) => {
                    debug!(table = self.schema.name, key = %record.natural_key, ?outcome, "upsert");
                    report.record(outcome);
                }
                Err(e) => {
                    warn!(
                        table = self.schema.name,
                        key = %record.natural_key,
                        error = %e,
                        "레코드 저장 실패"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}
